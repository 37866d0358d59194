// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Refinement bookkeeping
//!
//! Accumulates per-step iteration histories and structural modifications
//! during an adaptive run and produces the final report.

use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::refinement::{
    ModificationKind, QualityScore, RefinementAction, RefinementReport, StepIteration,
    StepRefinementHistory, ToolModification,
};

/// Collects refinement history as an adaptive run progresses
#[derive(Default)]
pub struct RefinementTracker {
    report: RefinementReport,
    active: Option<StepRefinementHistory>,
}

impl RefinementTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_execution(&mut self) {
        self.report.started_at = Some(Utc::now());
    }

    pub fn end_execution(&mut self) {
        self.report.completed_at = Some(Utc::now());
    }

    /// Begin tracking a step; finalizes any step left open
    pub fn start_step(&mut self, step_id: &str, tool_id: &str) {
        if self.active.is_some() {
            self.finalize_step(None);
        }
        self.active = Some(StepRefinementHistory::new(step_id, tool_id));
    }

    /// Record one attempt at the current step
    #[allow(clippy::too_many_arguments)]
    pub fn record_iteration(
        &mut self,
        inputs: HashMap<String, Value>,
        outputs: HashMap<String, Value>,
        accepted: bool,
        quality_score: Option<QualityScore>,
        notes: &str,
        duration_secs: f64,
        error: Option<&str>,
    ) {
        let Some(history) = &mut self.active else {
            debug!("iteration recorded with no active step");
            return;
        };
        let iteration = history.iterations.len() as u32 + 1;
        history.iterations.push(StepIteration {
            iteration,
            inputs,
            outputs,
            accepted,
            quality_score,
            notes: notes.to_string(),
            duration_secs,
            error: error.map(str::to_string),
            executed_at: Utc::now(),
        });
    }

    /// Close out the current step and fold it into the report
    pub fn finalize_step(&mut self, final_action: Option<RefinementAction>) {
        let Some(mut history) = self.active.take() else {
            return;
        };
        history.final_action = final_action;
        history.removed = final_action == Some(RefinementAction::RemoveTool);
        self.report.add_step_history(history);
    }

    pub fn record_tool_removal(&mut self, step_id: &str, tool_id: &str, reason: &str) {
        self.report.add_modification(ToolModification::new(
            ModificationKind::Removed,
            step_id,
            tool_id,
            reason,
        ));
    }

    pub fn record_tool_addition(
        &mut self,
        step_id: &str,
        tool_id: &str,
        new_tool_id: &str,
        reason: &str,
    ) {
        self.report.add_modification(
            ToolModification::new(ModificationKind::Added, step_id, tool_id, reason)
                .with_new_tool(new_tool_id),
        );
    }

    pub fn record_tool_replacement(
        &mut self,
        step_id: &str,
        tool_id: &str,
        new_tool_id: &str,
        reason: &str,
    ) {
        self.report.add_modification(
            ToolModification::new(ModificationKind::Replaced, step_id, tool_id, reason)
                .with_new_tool(new_tool_id),
        );
    }

    /// Consume the tracker, finalizing any step left open
    pub fn report(mut self) -> RefinementReport {
        self.finalize_step(None);
        if self.report.completed_at.is_none() {
            self.report.completed_at = Some(Utc::now());
        }
        self.report
    }

    /// Human-readable summary of what the run recorded so far
    pub fn summary_text(&self) -> String {
        self.report.summary_text()
    }
}
