// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Pipeline definition structures
//!
//! A pipeline is an ordered collection of steps, each bound to a registered
//! tool. Step inputs are a tagged union: a static value, a reference to a
//! prior step's output, or a deferred user input. The `FromStep` bindings
//! induce the dependency DAG.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::errors::ToolflowError;

/// Where a step input gets its value from
///
/// Exactly one payload per variant, validated at construction — there are no
/// nullable companion fields to keep in sync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum StepInput {
    /// A value provided directly in the definition
    Static {
        value: Value,
        /// Marks the value as user-authoritative: the refinement loop must
        /// not alter it
        #[serde(default)]
        locked: bool,
    },

    /// The named output of another step
    FromStep { step_id: String, output: String },

    /// A value supplied at runtime by the caller
    UserInput {
        #[serde(default)]
        prompt: String,
    },
}

impl StepInput {
    /// Static value, adjustable by refinement
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Static {
            value: value.into(),
            locked: false,
        }
    }

    /// Static value the refinement loop may never change
    pub fn locked(value: impl Into<Value>) -> Self {
        Self::Static {
            value: value.into(),
            locked: true,
        }
    }

    /// Binding to another step's output
    pub fn from_step(step_id: &str, output: &str) -> Self {
        Self::FromStep {
            step_id: step_id.to_string(),
            output: output.to_string(),
        }
    }

    /// Deferred user input with an optional prompt
    pub fn from_user(prompt: &str) -> Self {
        Self::UserInput {
            prompt: prompt.to_string(),
        }
    }

    /// The step this input references, if it is a `FromStep` binding
    pub fn references_step(&self) -> Option<&str> {
        match self {
            Self::FromStep { step_id, .. } => Some(step_id),
            _ => None,
        }
    }
}

/// Execution status of a pipeline step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

/// A single step in a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStep {
    /// Step identifier, unique within the pipeline
    #[serde(default = "short_id")]
    pub step_id: String,

    /// Human-readable step name
    pub name: String,

    /// Registered tool to execute
    pub tool_id: String,

    /// Input bindings keyed by input name
    #[serde(default)]
    pub inputs: HashMap<String, StepInput>,

    /// Execution status, mutated in place by the executor
    #[serde(default)]
    pub status: StepStatus,

    /// Error message if the step failed
    #[serde(default)]
    pub error_message: Option<String>,

    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

fn short_id() -> String {
    uuid::Uuid::new_v4().to_string()[..8].to_string()
}

impl PipelineStep {
    pub fn new(name: &str, tool_id: &str) -> Self {
        Self {
            step_id: short_id(),
            name: name.to_string(),
            tool_id: tool_id.to_string(),
            inputs: HashMap::new(),
            status: StepStatus::Pending,
            error_message: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_id(mut self, step_id: &str) -> Self {
        self.step_id = step_id.to_string();
        self
    }

    pub fn with_input(mut self, name: &str, input: StepInput) -> Self {
        self.inputs.insert(name.to_string(), input);
        self
    }
}

/// Complete pipeline definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(default = "full_id")]
    pub pipeline_id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Steps in definition order (execution order is derived from bindings)
    #[serde(default)]
    pub steps: Vec<PipelineStep>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub modified_at: DateTime<Utc>,
}

fn full_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl Pipeline {
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Self {
            pipeline_id: full_id(),
            name: name.to_string(),
            description: String::new(),
            steps: Vec::new(),
            created_at: now,
            modified_at: now,
        }
    }

    /// Load a pipeline from a JSON or YAML file, dispatched on extension
    pub fn from_file(path: &Path) -> Result<Self, ToolflowError> {
        if !path.exists() {
            return Err(ToolflowError::PipelineNotFound {
                path: path.to_path_buf(),
            });
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| ToolflowError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ToolflowError> {
        serde_json::from_str(json).map_err(Into::into)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ToolflowError> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    pub fn to_json(&self) -> Result<String, ToolflowError> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    pub fn to_yaml(&self) -> Result<String, ToolflowError> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    /// Get a step by id
    pub fn get_step(&self, step_id: &str) -> Option<&PipelineStep> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    pub fn get_step_mut(&mut self, step_id: &str) -> Option<&mut PipelineStep> {
        self.steps.iter_mut().find(|s| s.step_id == step_id)
    }

    /// Get a step by its human-readable name
    pub fn get_step_by_name(&self, name: &str) -> Option<&PipelineStep> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Resolve a step reference that may be an id or a name
    fn find_step_id(&self, step: &str) -> Option<String> {
        self.get_step(step)
            .or_else(|| self.get_step_by_name(step))
            .map(|s| s.step_id.clone())
    }

    pub fn add_step(&mut self, step: PipelineStep) {
        self.steps.push(step);
        self.modified_at = Utc::now();
    }

    /// Connect an output of one step to an input of another
    ///
    /// Both ends may be referenced by id or name.
    pub fn connect(
        &mut self,
        from_step: &str,
        output_name: &str,
        to_step: &str,
        input_name: &str,
    ) -> Result<(), ToolflowError> {
        let source_id = self.find_step_id(from_step).ok_or_else(|| {
            ToolflowError::StepNotFound {
                step: from_step.to_string(),
            }
        })?;
        let target_id = self.find_step_id(to_step).ok_or_else(|| {
            ToolflowError::StepNotFound {
                step: to_step.to_string(),
            }
        })?;

        let target = self
            .get_step_mut(&target_id)
            .ok_or_else(|| ToolflowError::StepNotFound {
                step: target_id.clone(),
            })?;
        target
            .inputs
            .insert(input_name.to_string(), StepInput::from_step(&source_id, output_name));
        self.modified_at = Utc::now();
        Ok(())
    }

    /// Set a static parameter value on a step
    pub fn set_static(
        &mut self,
        step: &str,
        input_name: &str,
        value: Value,
    ) -> Result<(), ToolflowError> {
        let step_id = self
            .find_step_id(step)
            .ok_or_else(|| ToolflowError::StepNotFound {
                step: step.to_string(),
            })?;
        if let Some(target) = self.get_step_mut(&step_id) {
            target
                .inputs
                .insert(input_name.to_string(), StepInput::value(value));
        }
        self.modified_at = Utc::now();
        Ok(())
    }

    /// Mark a parameter as requiring user input at runtime
    pub fn set_user_input(
        &mut self,
        step: &str,
        input_name: &str,
        prompt: &str,
    ) -> Result<(), ToolflowError> {
        let step_id = self
            .find_step_id(step)
            .ok_or_else(|| ToolflowError::StepNotFound {
                step: step.to_string(),
            })?;
        if let Some(target) = self.get_step_mut(&step_id) {
            target
                .inputs
                .insert(input_name.to_string(), StepInput::from_user(prompt));
        }
        self.modified_at = Utc::now();
        Ok(())
    }

    /// Remove a step and drop any bindings that referenced its outputs
    pub fn remove_step(&mut self, step: &str) -> bool {
        let Some(step_id) = self.find_step_id(step) else {
            return false;
        };

        for other in &mut self.steps {
            other
                .inputs
                .retain(|_, input| input.references_step() != Some(step_id.as_str()));
        }

        let before = self.steps.len();
        self.steps.retain(|s| s.step_id != step_id);
        let removed = self.steps.len() != before;
        if removed {
            self.modified_at = Utc::now();
        }
        removed
    }
}
