// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Builtin reference tools
//!
//! A small imaging-flavored toolset for demos and tests. The implementations
//! pass file paths through rather than doing real image processing; they
//! exist to exercise validation, execution, and refinement end to end.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::errors::{ToolflowError, ToolflowResult};
use crate::pipeline::{DataType, InputSpec, OutputSpec, ToolSchema};
use crate::registry::ToolRegistry;

fn string_input(inputs: &HashMap<String, Value>, name: &str, tool_id: &str) -> ToolflowResult<String> {
    inputs
        .get(name)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ToolflowError::tool_failed(tool_id, &format!("missing input '{name}'")))
}

/// Register the builtin toolset into a registry
pub fn register_builtin_tools(registry: &mut ToolRegistry) -> ToolflowResult<()> {
    registry.register(
        ToolSchema::new("load_image", "Load Image", "Load an image file from disk")
            .with_category("io")
            .with_tags(&["image", "input"])
            .with_input(
                InputSpec::required("image_path", DataType::Path)
                    .with_description("Path to the image file"),
            )
            .with_output(OutputSpec::new("image", DataType::Image)),
        Arc::new(|inputs: &HashMap<String, Value>| {
            let path = string_input(inputs, "image_path", "load_image")?;
            if !Path::new(&path).is_file() {
                return Err(ToolflowError::tool_failed(
                    "load_image",
                    &format!("image not found: {path}"),
                ));
            }
            Ok(json!({ "image": path }))
        }),
    )?;

    registry.register(
        ToolSchema::new("gaussian_blur", "Gaussian Blur", "Smooth an image before segmentation")
            .with_category("preprocessing")
            .with_tags(&["image", "smoothing"])
            .with_input(InputSpec::required("image", DataType::Image))
            .with_input(
                InputSpec::optional("kernel_size", DataType::Int, json!(5))
                    .with_bounds(1.0, 99.0)
                    .with_description("Odd kernel size in pixels"),
            )
            .with_output(OutputSpec::new("image", DataType::Image)),
        Arc::new(|inputs: &HashMap<String, Value>| {
            let image = string_input(inputs, "image", "gaussian_blur")?;
            Ok(json!({ "image": image }))
        }),
    )?;

    registry.register(
        ToolSchema::new("threshold", "Threshold", "Binarize an image into a mask")
            .with_category("segmentation")
            .with_tags(&["mask", "binarize"])
            .with_input(InputSpec::required("image", DataType::Image))
            .with_input(
                InputSpec::optional("method", DataType::String, json!("otsu"))
                    .with_choices(&["otsu", "adaptive", "binary"]),
            )
            .with_input(
                InputSpec::optional("threshold_value", DataType::Int, json!(127))
                    .with_bounds(0.0, 255.0)
                    .with_description("Cutoff for the binary method"),
            )
            .with_output(OutputSpec::new("mask", DataType::Mask)),
        Arc::new(|inputs: &HashMap<String, Value>| {
            let image = string_input(inputs, "image", "threshold")?;
            Ok(json!({ "mask": image }))
        }),
    )?;

    registry.register(
        ToolSchema::new("find_contours", "Find Contours", "Find and count objects in a mask")
            .with_category("measurement")
            .with_tags(&["count", "objects"])
            .with_input(InputSpec::required("mask", DataType::Mask))
            .with_input(
                InputSpec::optional("min_area", DataType::Float, json!(0.0))
                    .with_description("Smallest object area to keep, in pixels"),
            )
            .with_output(OutputSpec::new("contours", DataType::List))
            .with_output(OutputSpec::new("object_count", DataType::Int)),
        Arc::new(|inputs: &HashMap<String, Value>| {
            string_input(inputs, "mask", "find_contours")?;
            Ok(json!({ "contours": [], "object_count": 0 }))
        }),
    )?;

    registry.register(
        ToolSchema::new("save_image", "Save Image", "Copy an image to a destination path")
            .with_category("io")
            .with_tags(&["image", "output"])
            .with_input(InputSpec::required("image", DataType::Image))
            .with_input(InputSpec::required("output_path", DataType::Path))
            .with_output(OutputSpec::new("saved_path", DataType::Path)),
        Arc::new(|inputs: &HashMap<String, Value>| {
            let image = string_input(inputs, "image", "save_image")?;
            let output_path = string_input(inputs, "output_path", "save_image")?;

            if let Some(parent) = Path::new(&output_path).parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ToolflowError::tool_failed("save_image", &e.to_string())
                })?;
            }
            std::fs::copy(&image, &output_path)
                .map_err(|e| ToolflowError::tool_failed("save_image", &e.to_string()))?;
            Ok(json!({ "saved_path": output_path }))
        }),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Pipeline, PipelineExecutor, PipelineStatus, PipelineStep, RunOptions, StepInput};
    use tempfile::TempDir;

    fn builtin_registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry).unwrap();
        Arc::new(registry)
    }

    #[test]
    fn test_all_builtins_registered() {
        let registry = builtin_registry();
        for tool in ["load_image", "gaussian_blur", "threshold", "find_contours", "save_image"] {
            assert!(registry.has(tool), "{tool} missing");
        }
        assert!(registry.categories().contains(&"io".to_string()));
    }

    #[test]
    fn test_counting_pipeline_end_to_end() {
        let tmp = TempDir::new().unwrap();
        let image = tmp.path().join("cells.png");
        std::fs::write(&image, b"fake image").unwrap();

        let mut pipeline = Pipeline::new("count cells");
        pipeline.add_step(
            PipelineStep::new("Load", "load_image")
                .with_id("load")
                .with_input("image_path", StepInput::value(json!(image.to_str().unwrap()))),
        );
        pipeline.add_step(
            PipelineStep::new("Blur", "gaussian_blur")
                .with_id("blur")
                .with_input("image", StepInput::from_step("load", "image")),
        );
        pipeline.add_step(
            PipelineStep::new("Threshold", "threshold")
                .with_id("thresh")
                .with_input("image", StepInput::from_step("blur", "image")),
        );
        pipeline.add_step(
            PipelineStep::new("Count", "find_contours")
                .with_id("count")
                .with_input("mask", StepInput::from_step("thresh", "mask")),
        );

        let executor = PipelineExecutor::new(builtin_registry());
        let result = executor.execute(&mut pipeline, &RunOptions::default());

        assert_eq!(result.status, PipelineStatus::Completed);
        assert!(
            result.get_step_result("count").unwrap().outputs["object_count"]
                .as_i64()
                .unwrap()
                >= 0
        );
    }

    #[test]
    fn test_load_missing_image_fails() {
        let executor = PipelineExecutor::new(builtin_registry());
        let mut pipeline = Pipeline::new("missing");
        pipeline.add_step(
            PipelineStep::new("Load", "load_image")
                .with_id("load")
                .with_input("image_path", StepInput::value(json!("/no/such/file.png"))),
        );

        let result = executor.execute(&mut pipeline, &RunOptions::default());
        assert_eq!(result.status, PipelineStatus::Failed);
        assert!(result
            .get_step_result("load")
            .unwrap()
            .error_message
            .as_deref()
            .unwrap()
            .contains("not found"));
    }

    #[test]
    fn test_save_image_copies_file() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("in.png");
        std::fs::write(&source, b"img").unwrap();
        let dest = tmp.path().join("out/copy.png");

        let registry = builtin_registry();
        let implementation = registry.get_implementation("save_image").unwrap();
        let inputs = HashMap::from([
            ("image".to_string(), json!(source.to_str().unwrap())),
            ("output_path".to_string(), json!(dest.to_str().unwrap())),
        ]);

        let out = implementation.invoke(&inputs).unwrap();
        assert_eq!(out["saved_path"], json!(dest.to_str().unwrap()));
        assert!(dest.is_file());
    }
}
