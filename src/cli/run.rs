// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Run command - execute a pipeline, optionally with refinement

use colored::Colorize;
use miette::Result;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use crate::pipeline::{
    Pipeline, PipelineExecutor, PipelineResult, PipelineStatus, RunOptions, StepStatus,
};
use crate::refinement::{AdaptiveExecutor, ArtifactManager, AutoAcceptReviewer};

pub struct RunArgs {
    pub pipeline: PathBuf,
    pub refine: bool,
    pub max_iterations: u32,
    pub continue_on_error: bool,
    pub session: Option<String>,
    pub artifacts: Option<PathBuf>,
    pub input: Vec<String>,
    pub context: Option<String>,
}

/// Run the run command
pub async fn run(args: RunArgs, verbose: bool) -> Result<()> {
    let mut pipeline = Pipeline::from_file(&args.pipeline)
        .map_err(|e| miette::miette!("Failed to load pipeline: {}", e))?;

    println!(
        "{} {} ({} steps)",
        "Running pipeline".bold(),
        pipeline.name.cyan(),
        pipeline.steps.len()
    );
    println!();

    let mut options = RunOptions {
        stop_on_error: !args.continue_on_error,
        context: args.context.clone(),
        ..Default::default()
    };
    for raw in &args.input {
        let (step, input, value) = parse_input_override(raw)?;
        options = options.with_user_input(&step, &input, value);
    }

    let registry = super::default_registry()?;
    let session = args.session.as_deref().unwrap_or("default");

    let result = if args.refine {
        let executor = AdaptiveExecutor::new(registry, Arc::new(AutoAcceptReviewer))
            .with_max_iterations(args.max_iterations);

        let mut manager = args
            .artifacts
            .as_ref()
            .map(|dir| ArtifactManager::new(dir, session, &pipeline.name));

        let (result, refinement) = executor
            .execute(&mut pipeline, &options, manager.as_mut())
            .await;

        if refinement.total_iterations > 0 {
            println!("{}", refinement.summary_text());
            println!();
        }
        result
    } else {
        let executor = PipelineExecutor::new(registry);
        executor.execute(&mut pipeline, &options)
    };

    report_result(&pipeline, &result, verbose);

    match result.status {
        PipelineStatus::Completed => Ok(()),
        _ => Err(miette::miette!(
            "Pipeline {}: {} of {} steps completed, {} failed",
            result.status,
            result.completed_steps,
            result.total_steps,
            result.failed_steps
        )),
    }
}

fn report_result(pipeline: &Pipeline, result: &PipelineResult, verbose: bool) {
    for step_result in &result.step_results {
        let name = pipeline
            .get_step(&step_result.step_id)
            .map(|s| s.name.as_str())
            .unwrap_or(step_result.step_id.as_str());

        if step_result.is_completed() {
            println!("  {} {}", "✓".green(), name);
            if verbose {
                for (key, value) in &step_result.outputs {
                    println!("      {} = {}", key.dimmed(), value);
                }
            }
        } else {
            println!(
                "  {} {}: {}",
                "✗".red(),
                name,
                step_result.error_message.as_deref().unwrap_or("failed")
            );
        }
    }

    let skipped: Vec<&str> = pipeline
        .steps
        .iter()
        .filter(|s| s.status == StepStatus::Skipped)
        .map(|s| s.name.as_str())
        .collect();
    if !skipped.is_empty() {
        println!("  {} skipped: {}", "⚠".yellow(), skipped.join(", "));
    }

    println!();
    match result.status {
        PipelineStatus::Completed => {
            println!("{}", "Pipeline completed.".green().bold());
            if let Some(outputs) = result.final_outputs() {
                println!("{}:", "Final outputs".bold());
                for (key, value) in outputs {
                    println!("  {} = {}", key, value);
                }
            }
        }
        _ => println!("{}", "Pipeline failed.".red().bold()),
    }
}

/// Parse a `step.input=value` override; the value is JSON when it parses,
/// a plain string otherwise
fn parse_input_override(raw: &str) -> Result<(String, String, Value)> {
    let (target, value) = raw
        .split_once('=')
        .ok_or_else(|| miette::miette!("Invalid input override '{}', expected step.input=value", raw))?;
    let (step, input) = target
        .split_once('.')
        .ok_or_else(|| miette::miette!("Invalid input override '{}', expected step.input=value", raw))?;

    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((step.to_string(), input.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_input_override() {
        let (step, input, value) = parse_input_override("load.image_path=cells.png").unwrap();
        assert_eq!(step, "load");
        assert_eq!(input, "image_path");
        assert_eq!(value, json!("cells.png"));

        let (_, _, value) = parse_input_override("thresh.threshold_value=80").unwrap();
        assert_eq!(value, json!(80));
    }

    #[test]
    fn test_parse_input_override_rejects_malformed() {
        assert!(parse_input_override("no_equals").is_err());
        assert!(parse_input_override("nodot=5").is_err());
    }
}
