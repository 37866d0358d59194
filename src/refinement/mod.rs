// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Adaptive refinement
//!
//! Data model and machinery for the review-adjust-retry loop: a reviewer
//! scores each step's output and decides whether to accept it, adjust
//! parameters, restructure the pipeline, or give up.

mod adaptive;
mod artifacts;
mod optimizer;
mod reviewer;
mod tracker;

pub use adaptive::AdaptiveExecutor;
pub use artifacts::ArtifactManager;
pub use optimizer::ParameterOptimizer;
pub use reviewer::{AutoAcceptReviewer, ReviewRequest, Reviewer};
pub use tracker::RefinementTracker;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Default cap on iterations per step during refinement
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// Reviewer quality judgement for one step output
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum QualityScore {
    Unusable,
    Poor,
    Acceptable,
    Good,
    Excellent,
}

impl QualityScore {
    pub fn is_acceptable(&self) -> bool {
        *self >= Self::Acceptable
    }
}

impl std::fmt::Display for QualityScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unusable => "unusable",
            Self::Poor => "poor",
            Self::Acceptable => "acceptable",
            Self::Good => "good",
            Self::Excellent => "excellent",
        };
        write!(f, "{s}")
    }
}

/// What the reviewer wants done with the step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefinementAction {
    /// Keep the current output and move on
    Accept,
    /// Retry the step with changed parameters
    AdjustParams,
    /// Drop the step from the pipeline entirely
    RemoveTool,
    /// A new step should be inserted; recorded, not applied mid-run
    AddTool,
    /// The step's tool should be swapped; recorded, not applied mid-run
    ReplaceTool,
    /// Give up on the step
    Fail,
}

impl std::fmt::Display for RefinementAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Accept => "accept",
            Self::AdjustParams => "adjust_params",
            Self::RemoveTool => "remove_tool",
            Self::AddTool => "add_tool",
            Self::ReplaceTool => "replace_tool",
            Self::Fail => "fail",
        };
        write!(f, "{s}")
    }
}

/// One proposed parameter adjustment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterChange {
    pub name: String,
    pub old_value: Option<Value>,
    pub new_value: Value,
    /// Reviewer's rationale for the change
    #[serde(default)]
    pub reason: String,
}

impl ParameterChange {
    pub fn new(name: &str, old_value: Option<Value>, new_value: Value, reason: &str) -> Self {
        Self {
            name: name.to_string(),
            old_value,
            new_value,
            reason: reason.to_string(),
        }
    }
}

/// Complete reviewer verdict for one iteration of one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementDecision {
    pub step_id: String,
    pub tool_id: String,
    /// 1-based iteration the verdict applies to
    pub iteration: u32,
    pub quality_score: QualityScore,
    /// Free-text assessment of the output
    #[serde(default)]
    pub assessment: String,
    pub action: RefinementAction,
    /// Reviewer confidence in [0, 1]
    pub confidence: f64,
    #[serde(default)]
    pub parameter_changes: Vec<ParameterChange>,
    /// Tool to add or substitute, for the restructuring actions
    #[serde(default)]
    pub suggested_tool_id: Option<String>,
    /// Where an added tool should go, relative to this step
    #[serde(default)]
    pub suggested_position: Option<String>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl RefinementDecision {
    pub fn accept(step_id: &str, tool_id: &str, iteration: u32, score: QualityScore) -> Self {
        Self {
            step_id: step_id.to_string(),
            tool_id: tool_id.to_string(),
            iteration,
            quality_score: score,
            assessment: String::new(),
            action: RefinementAction::Accept,
            confidence: 1.0,
            parameter_changes: Vec::new(),
            suggested_tool_id: None,
            suggested_position: None,
            reasoning: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_reasoning(mut self, reasoning: &str) -> Self {
        self.reasoning = reasoning.to_string();
        self
    }
}

/// Record of one attempt at a step during refinement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepIteration {
    /// 1-based
    pub iteration: u32,
    pub inputs: HashMap<String, Value>,
    pub outputs: HashMap<String, Value>,
    pub accepted: bool,
    pub quality_score: Option<QualityScore>,
    /// Reviewer commentary or loop bookkeeping, empty when uneventful
    #[serde(default)]
    pub notes: String,
    /// Wall-clock time spent resolving inputs and running the tool
    #[serde(default)]
    pub duration_secs: f64,
    /// Resolution or tool error when the attempt failed outright
    #[serde(default)]
    pub error: Option<String>,
    pub executed_at: DateTime<Utc>,
}

/// Kinds of structural pipeline change made or proposed by refinement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModificationKind {
    Added,
    Removed,
    Replaced,
}

/// A structural change to the pipeline recorded during refinement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolModification {
    pub kind: ModificationKind,
    pub step_id: String,
    pub tool_id: String,
    /// Replacement or inserted tool, for `Replaced` and `Added`
    #[serde(default)]
    pub new_tool_id: Option<String>,
    #[serde(default)]
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

impl ToolModification {
    pub fn new(kind: ModificationKind, step_id: &str, tool_id: &str, reason: &str) -> Self {
        Self {
            kind,
            step_id: step_id.to_string(),
            tool_id: tool_id.to_string(),
            new_tool_id: None,
            reason: reason.to_string(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_new_tool(mut self, new_tool_id: &str) -> Self {
        self.new_tool_id = Some(new_tool_id.to_string());
        self
    }
}

/// Refinement history of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRefinementHistory {
    pub step_id: String,
    pub tool_id: String,
    pub iterations: Vec<StepIteration>,
    pub final_action: Option<RefinementAction>,
    pub removed: bool,
}

impl StepRefinementHistory {
    pub fn new(step_id: &str, tool_id: &str) -> Self {
        Self {
            step_id: step_id.to_string(),
            tool_id: tool_id.to_string(),
            iterations: Vec::new(),
            final_action: None,
            removed: false,
        }
    }

    pub fn total_iterations(&self) -> u32 {
        self.iterations.len() as u32
    }

    /// Whether the step needed anything beyond a first accepted attempt
    pub fn had_refinements(&self) -> bool {
        self.iterations.len() > 1 || self.removed
    }
}

/// Summary of a refined pipeline run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefinementReport {
    pub step_histories: Vec<StepRefinementHistory>,
    pub modifications: Vec<ToolModification>,
    pub total_iterations: u32,
    pub steps_refined: u32,
    pub tools_removed: u32,
    pub tools_added: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RefinementReport {
    pub fn add_step_history(&mut self, history: StepRefinementHistory) {
        self.total_iterations += history.total_iterations();
        if history.had_refinements() {
            self.steps_refined += 1;
        }
        self.step_histories.push(history);
    }

    pub fn add_modification(&mut self, modification: ToolModification) {
        match modification.kind {
            ModificationKind::Removed => self.tools_removed += 1,
            ModificationKind::Added => self.tools_added += 1,
            ModificationKind::Replaced => {}
        }
        self.modifications.push(modification);
    }

    pub fn get_step_history(&self, step_id: &str) -> Option<&StepRefinementHistory> {
        self.step_histories.iter().find(|h| h.step_id == step_id)
    }

    /// Human-readable run summary
    pub fn summary_text(&self) -> String {
        let mut lines = vec![
            "Refinement summary".to_string(),
            format!("  steps tracked:    {}", self.step_histories.len()),
            format!("  total iterations: {}", self.total_iterations),
            format!("  steps refined:    {}", self.steps_refined),
            format!("  tools removed:    {}", self.tools_removed),
            format!("  tools added:      {}", self.tools_added),
        ];
        for history in &self.step_histories {
            if history.had_refinements() {
                lines.push(format!(
                    "  - {} ({}): {} iteration(s){}",
                    history.step_id,
                    history.tool_id,
                    history.total_iterations(),
                    if history.removed { ", removed" } else { "" }
                ));
            }
        }
        lines.join("\n")
    }
}
