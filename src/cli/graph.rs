// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Graph command - render a pipeline's dependency graph

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::GraphFormat;
use crate::pipeline::{DagBuilder, Pipeline};

/// Run the graph command
pub async fn run(pipeline_path: PathBuf, format: GraphFormat, _verbose: bool) -> Result<()> {
    let pipeline = Pipeline::from_file(&pipeline_path)
        .map_err(|e| miette::miette!("Failed to load pipeline: {}", e))?;

    let dag = DagBuilder::build(&pipeline);

    match format {
        GraphFormat::Mermaid => print!("{}", dag.to_mermaid(&pipeline)),
        GraphFormat::Dot => print!("{}", dag.to_dot(&pipeline)),
        GraphFormat::Text => {
            println!("{} {}", "Pipeline:".bold(), pipeline.name.cyan());
            println!();
            let listing = dag
                .to_text(&pipeline)
                .map_err(|e| miette::miette!("Cannot order pipeline: {}", e))?;
            print!("{listing}");
        }
    }

    Ok(())
}
