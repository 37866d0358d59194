// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for toolflow.

pub mod graph;
pub mod run;
pub mod tools;
pub mod validate;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tool pipeline orchestrator
///
/// Define, validate, and run typed tool pipelines with optional adaptive
/// refinement.
#[derive(Parser, Debug)]
#[clap(
    name = "toolflow",
    version,
    about = "Typed tool-pipeline orchestrator with adaptive refinement",
    long_about = None,
    after_help = "Examples:\n\
        toolflow validate pipeline.json      Check a pipeline definition\n\
        toolflow run pipeline.json           Execute a pipeline\n\
        toolflow run pipeline.json --refine  Execute with review iterations\n\
        toolflow graph pipeline.json         Show the dependency graph\n\
        toolflow tools list                  List registered tools\n\n\
        See 'toolflow <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a pipeline definition against the tool registry
    Validate {
        /// Pipeline file (JSON or YAML)
        pipeline: PathBuf,
    },

    /// Run a pipeline
    Run {
        /// Pipeline file (JSON or YAML)
        pipeline: PathBuf,

        /// Enable adaptive refinement of step outputs
        #[clap(long)]
        refine: bool,

        /// Iteration cap per step when refining
        #[clap(long, default_value = "3")]
        max_iterations: u32,

        /// Keep running independent steps after a failure
        #[clap(long)]
        continue_on_error: bool,

        /// Session name for output organization
        #[clap(short, long)]
        session: Option<String>,

        /// Directory for iteration artifacts (enables saving them)
        #[clap(long, value_name = "DIR")]
        artifacts: Option<PathBuf>,

        /// Supply a user input as step.input=value (repeatable)
        #[clap(short, long, value_name = "STEP.INPUT=VALUE")]
        input: Vec<String>,

        /// Free-text context forwarded to the reviewer
        #[clap(long)]
        context: Option<String>,
    },

    /// Show a pipeline's dependency graph
    Graph {
        /// Pipeline file (JSON or YAML)
        pipeline: PathBuf,

        /// Output format
        #[clap(short, long, default_value = "text", value_enum)]
        format: GraphFormat,
    },

    /// Inspect the tool registry
    Tools {
        #[clap(subcommand)]
        action: ToolsAction,
    },
}

/// Tool registry actions
#[derive(Subcommand, Debug, Clone)]
pub enum ToolsAction {
    /// List registered tools
    List {
        /// Filter by category
        #[clap(short, long)]
        category: Option<String>,
    },

    /// Search tools by name, description, or tag
    Search {
        /// Search query
        query: String,

        /// Filter by category
        #[clap(short, long)]
        category: Option<String>,
    },

    /// Show one tool's full contract
    Show {
        /// Tool identifier
        tool_id: String,
    },
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

/// Build the default registry with the builtin toolset
pub(crate) fn default_registry() -> miette::Result<std::sync::Arc<crate::registry::ToolRegistry>> {
    let mut registry = crate::registry::ToolRegistry::new();
    crate::tools::register_builtin_tools(&mut registry)
        .map_err(|e| miette::miette!("Failed to register builtin tools: {}", e))?;
    Ok(std::sync::Arc::new(registry))
}
