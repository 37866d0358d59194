// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Error types for pipeline validation, resolution, and execution
//!
//! Errors carry diagnostic codes and help text so a caller (or the CLI)
//! can render actionable messages rather than bare strings.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for toolflow operations
pub type ToolflowResult<T> = Result<T, ToolflowError>;

/// Main error type for toolflow
#[derive(Error, Debug, Diagnostic)]
pub enum ToolflowError {
    // ─────────────────────────────────────────────────────────────────────────
    // Registry Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Tool '{tool_id}' is not registered")]
    #[diagnostic(
        code(toolflow::unknown_tool),
        help("List available tools with 'toolflow tools'")
    )]
    UnknownTool { tool_id: String },

    #[error("Tool '{tool_id}' declares duplicate {kind} name '{name}'")]
    #[diagnostic(
        code(toolflow::duplicate_port),
        help("Input and output names must be unique within a tool schema")
    )]
    DuplicatePort {
        tool_id: String,
        kind: &'static str,
        name: String,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline file not found: {path}")]
    #[diagnostic(code(toolflow::pipeline_not_found))]
    PipelineNotFound { path: PathBuf },

    #[error("Invalid pipeline: {reason}")]
    #[diagnostic(code(toolflow::invalid_pipeline))]
    InvalidPipeline {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Step '{step}' not found in pipeline")]
    #[diagnostic(code(toolflow::step_not_found))]
    StepNotFound { step: String },

    #[error("Circular dependency detected")]
    #[diagnostic(
        code(toolflow::circular_dependency),
        help("Review the step-output bindings to remove the cycle")
    )]
    CircularDependency { steps: Vec<String> },

    // ─────────────────────────────────────────────────────────────────────────
    // Resolution Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Step '{step}' has not been executed")]
    #[diagnostic(code(toolflow::step_not_executed))]
    StepNotExecuted { step: String },

    #[error("Step '{step}' produced no output named '{output}'")]
    #[diagnostic(code(toolflow::missing_output))]
    MissingOutput { step: String, output: String },

    #[error("Step '{step}' was removed from the pipeline during refinement")]
    #[diagnostic(
        code(toolflow::step_removed),
        help("A downstream binding still references the removed step's output")
    )]
    StepRemoved { step: String },

    #[error("User input required for '{input}' on step '{step}' but none was provided")]
    #[diagnostic(
        code(toolflow::missing_user_input),
        help("Pass the value in the user-inputs map or install a user-input handler")
    )]
    MissingUserInput { step: String, input: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Tool '{tool_id}' failed: {message}")]
    #[diagnostic(code(toolflow::tool_execution_failed))]
    ToolExecutionFailed { tool_id: String, message: String },

    #[error("Review call failed: {message}")]
    #[diagnostic(code(toolflow::review_failed))]
    ReviewFailed { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(toolflow::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(toolflow::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(toolflow::io_error))]
    Io { message: String },

    #[error("JSON error: {message}")]
    #[diagnostic(code(toolflow::json_error))]
    Json { message: String },

    #[error("YAML error: {message}")]
    #[diagnostic(code(toolflow::yaml_error))]
    Yaml { message: String },
}

impl From<std::io::Error> for ToolflowError {
    fn from(e: std::io::Error) -> Self {
        Self::Io {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for ToolflowError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json {
            message: e.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for ToolflowError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: e.to_string(),
        }
    }
}

impl ToolflowError {
    /// Tool failure with a human-readable message
    pub fn tool_failed(tool_id: &str, message: impl Into<String>) -> Self {
        Self::ToolExecutionFailed {
            tool_id: tool_id.to_string(),
            message: message.into(),
        }
    }

    /// Invalid-pipeline error without extra help text
    pub fn invalid_pipeline(reason: impl Into<String>) -> Self {
        Self::InvalidPipeline {
            reason: reason.into(),
            help: None,
        }
    }
}
