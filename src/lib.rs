// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! # toolflow - Tool Pipeline Orchestrator
//!
//! `toolflow` defines, validates, and runs typed tool pipelines with optional
//! adaptive refinement of step outputs.
//!
//! ## Features
//!
//! - **Typed tool contracts** - Tools declare named, typed inputs and outputs
//! - **Pipeline orchestration** - Chain tools with dependency management
//! - **Validation first** - Structural, type, and cycle checks before any tool runs
//! - **Adaptive refinement** - Review, adjust, and retry steps until acceptable
//! - **Iteration artifacts** - Every refinement attempt persisted on disk
//!
//! ## Quick Start
//!
//! ```bash
//! # Check a pipeline definition
//! toolflow validate pipeline.json
//!
//! # Run it
//! toolflow run pipeline.json
//!
//! # Run with adaptive refinement
//! toolflow run pipeline.json --refine
//!
//! # Inspect the dependency graph
//! toolflow graph pipeline.json --format mermaid
//! ```

pub mod cli;
pub mod errors;
pub mod pipeline;
pub mod refinement;
pub mod registry;
pub mod store;
pub mod tools;

// Re-export commonly used types
pub use errors::{ToolflowError, ToolflowResult};
pub use pipeline::{
    DataType, InputSpec, OutputSpec, Pipeline, PipelineExecutor, PipelineResult, PipelineStatus,
    PipelineStep, PipelineValidator, RunOptions, StepInput, StepStatus, ToolSchema,
};
pub use refinement::{AdaptiveExecutor, RefinementReport, Reviewer};
pub use registry::{ToolImplementation, ToolRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
