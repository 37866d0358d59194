// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Tools command - inspect the tool registry

use colored::Colorize;
use miette::Result;

use super::ToolsAction;
use crate::pipeline::ToolSchema;

/// Run the tools command
pub async fn run(action: ToolsAction, verbose: bool) -> Result<()> {
    let registry = super::default_registry()?;

    match action {
        ToolsAction::List { category } => {
            let tools = registry.list(category.as_deref());
            if tools.is_empty() {
                println!("No tools registered.");
                return Ok(());
            }
            print_tool_table(&tools, verbose);
        }

        ToolsAction::Search { query, category } => {
            let tools = registry.search(&query, category.as_deref());
            if tools.is_empty() {
                println!("No tools match '{}'.", query);
                return Ok(());
            }
            print_tool_table(&tools, verbose);
        }

        ToolsAction::Show { tool_id } => {
            let Some(schema) = registry.get_schema(&tool_id) else {
                return Err(miette::miette!("Unknown tool: {}", tool_id));
            };
            println!("{}", schema.describe());
        }
    }

    Ok(())
}

fn print_tool_table(tools: &[&ToolSchema], verbose: bool) {
    for schema in tools {
        println!(
            "  {} [{}] {}",
            schema.tool_id.cyan().bold(),
            schema.category.dimmed(),
            schema.description
        );
        if verbose {
            for input in &schema.inputs {
                let req = if input.required { "required" } else { "optional" };
                println!(
                    "      in:  {} ({}, {})",
                    input.name,
                    input.data_type,
                    req.dimmed()
                );
            }
            for output in &schema.outputs {
                println!("      out: {} ({})", output.name, output.data_type);
            }
        }
    }
}
