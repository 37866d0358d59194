// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! toolflow - Tool Pipeline Orchestrator
//!
//! Define, validate, and run typed tool pipelines with adaptive refinement.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use toolflow::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "toolflow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    // Dispatch to command handlers
    match cli.command {
        Commands::Validate { pipeline } => toolflow::cli::validate::run(pipeline, cli.verbose).await,
        Commands::Run {
            pipeline,
            refine,
            max_iterations,
            continue_on_error,
            session,
            artifacts,
            input,
            context,
        } => {
            toolflow::cli::run::run(
                toolflow::cli::run::RunArgs {
                    pipeline,
                    refine,
                    max_iterations,
                    continue_on_error,
                    session,
                    artifacts,
                    input,
                    context,
                },
                cli.verbose,
            )
            .await
        }
        Commands::Graph { pipeline, format } => {
            toolflow::cli::graph::run(pipeline, format, cli.verbose).await
        }
        Commands::Tools { action } => toolflow::cli::tools::run(action, cli.verbose).await,
    }
}
