// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Pipeline definition, validation, and execution

mod dag;
mod definition;
mod executor;
mod schema;
mod validation;

pub use dag::DagBuilder;
pub use definition::{Pipeline, PipelineStep, StepInput, StepStatus};
pub use executor::{
    PipelineExecutor, PipelineResult, PipelineStatus, RunOptions, StepResult, UserInputHandler,
};
pub use schema::{DataType, InputSpec, OutputSpec, ToolSchema};
pub use validation::{PipelineValidator, ValidationIssue, ValidationReport};

pub(crate) use executor::ExecutionContext;
