// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Validate command - check a pipeline definition

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use crate::pipeline::{DagBuilder, Pipeline, PipelineValidator};

/// Run the validate command
pub async fn run(pipeline_path: PathBuf, verbose: bool) -> Result<()> {
    println!("{}", "Validating pipeline...".bold());
    println!();

    if !pipeline_path.exists() {
        return Err(miette::miette!(
            "Pipeline file not found: {}",
            pipeline_path.display()
        ));
    }

    let pipeline = match Pipeline::from_file(&pipeline_path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("  {} Failed to parse pipeline", "✗".red());
            eprintln!();
            return Err(miette::miette!("Parse error: {}", e));
        }
    };

    println!("  {} Pipeline file parsed", "✓".green());

    let registry = super::default_registry()?;
    let validator = PipelineValidator::new(registry);
    let report = validator.validate(&pipeline);

    if !report.errors.is_empty() {
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &report.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    if !report.warnings.is_empty() {
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &report.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }

    if verbose {
        println!();
        println!("{}:", "Pipeline summary".bold());
        println!("  Name: {}", pipeline.name);
        println!("  Steps: {}", pipeline.steps.len());
        if report.is_valid() {
            let dag = DagBuilder::build(&pipeline);
            if let Ok(listing) = dag.to_text(&pipeline) {
                for line in listing.lines() {
                    println!("    {}", line.dimmed());
                }
            }
        }
    }

    println!();

    if report.is_valid() {
        if report.has_warnings() {
            println!("{}", "Pipeline is valid but has warnings.".yellow().bold());
        } else {
            println!("{}", "Pipeline is valid!".green().bold());
        }
        Ok(())
    } else {
        Err(miette::miette!("Pipeline validation failed"))
    }
}
