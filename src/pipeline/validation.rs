// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Pipeline validation
//!
//! Ordered, short-circuiting phases: structure, tool references, input
//! completeness, type compatibility, cycle detection. Structural errors stop
//! the later phases since they would only produce noise.

use std::collections::HashSet;
use std::sync::Arc;

use crate::errors::ToolflowError;
use crate::pipeline::{DagBuilder, DataType, Pipeline, PipelineStep, StepInput};
use crate::registry::ToolRegistry;

/// A single validation finding with optional step/field context
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub message: String,
    pub step_id: Option<String>,
    pub field: Option<String>,
}

impl ValidationIssue {
    fn new(message: String, step_id: Option<&str>, field: Option<&str>) -> Self {
        Self {
            message,
            step_id: step_id.map(str::to_string),
            field: field.map(str::to_string),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(step) = &self.step_id {
            write!(f, "[step: {step}] ")?;
        }
        if let Some(field) = &self.field {
            write!(f, "[{field}] ")?;
        }
        write!(f, "{}", self.message)
    }
}

/// Result of pipeline validation
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    fn add_error(&mut self, message: String, step_id: Option<&str>, field: Option<&str>) {
        self.errors.push(ValidationIssue::new(message, step_id, field));
    }

    fn add_warning(&mut self, message: String, step_id: Option<&str>, field: Option<&str>) {
        self.warnings.push(ValidationIssue::new(message, step_id, field));
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if !self.errors.is_empty() {
            writeln!(f, "Errors:")?;
            for e in &self.errors {
                writeln!(f, "  - {e}")?;
            }
        }
        if !self.warnings.is_empty() {
            writeln!(f, "Warnings:")?;
            for w in &self.warnings {
                writeln!(f, "  - {w}")?;
            }
        }
        if self.is_valid() {
            writeln!(f, "Pipeline is valid.")?;
        }
        Ok(())
    }
}

/// Source output types accepted by a given target input type
///
/// Asymmetric by design: a mask satisfies an image input, an int satisfies a
/// float input, but not the reverse. Exact matches always pass.
fn compatible_sources(target: DataType) -> &'static [DataType] {
    use DataType::*;
    match target {
        Image => &[Image, Path, Mask],
        Mask => &[Mask, Image, Path],
        Path => &[Path, Image, Mask, String],
        Array => &[Array],
        Float => &[Float, Int],
        Int => &[Int],
        String => &[String, Path],
        Bool => &[Bool],
        List => &[List],
        Map => &[Map, Parameters, Measurements],
        Measurements => &[Measurements, Map],
        Parameters => &[Parameters, Map],
        Instructions => &[Instructions, String],
    }
}

fn types_compatible(source: DataType, target: DataType) -> bool {
    source == target || compatible_sources(target).contains(&source)
}

/// Validates pipeline definitions against a tool registry
pub struct PipelineValidator {
    registry: Arc<ToolRegistry>,
}

impl PipelineValidator {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Validate a pipeline definition
    ///
    /// Re-validating an unchanged pipeline yields an identical report.
    pub fn validate(&self, pipeline: &Pipeline) -> ValidationReport {
        let mut report = ValidationReport::default();

        self.validate_structure(pipeline, &mut report);
        if !report.errors.is_empty() {
            return report;
        }

        self.validate_tool_references(pipeline, &mut report);
        self.validate_inputs(pipeline, &mut report);
        self.validate_type_compatibility(pipeline, &mut report);
        self.validate_no_cycles(pipeline, &mut report);

        report
    }

    fn validate_structure(&self, pipeline: &Pipeline, report: &mut ValidationReport) {
        if pipeline.steps.is_empty() {
            report.add_warning("Pipeline has no steps".to_string(), None, None);
            return;
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        let mut seen_names: HashSet<&str> = HashSet::new();

        for step in &pipeline.steps {
            if !seen_ids.insert(&step.step_id) {
                report.add_error(
                    format!("Duplicate step id: {}", step.step_id),
                    Some(&step.step_id),
                    None,
                );
            }
            if !seen_names.insert(&step.name) {
                report.add_warning(
                    format!("Duplicate step name: {}", step.name),
                    Some(&step.step_id),
                    None,
                );
            }
        }
    }

    fn validate_tool_references(&self, pipeline: &Pipeline, report: &mut ValidationReport) {
        for step in &pipeline.steps {
            if !self.registry.has(&step.tool_id) {
                report.add_error(
                    format!("Unknown tool: {}", step.tool_id),
                    Some(&step.step_id),
                    Some("tool_id"),
                );
            }
        }
    }

    fn validate_inputs(&self, pipeline: &Pipeline, report: &mut ValidationReport) {
        let step_ids: HashSet<&str> =
            pipeline.steps.iter().map(|s| s.step_id.as_str()).collect();

        for step in &pipeline.steps {
            let Some(schema) = self.registry.get_schema(&step.tool_id) else {
                continue; // reported in the tool-reference phase
            };

            for spec in &schema.inputs {
                match step.inputs.get(&spec.name) {
                    None => {
                        if spec.required && spec.default.is_none() {
                            report.add_error(
                                format!("Missing required input: {}", spec.name),
                                Some(&step.step_id),
                                Some(&format!("inputs.{}", spec.name)),
                            );
                        }
                    }
                    Some(input) => {
                        self.validate_input_binding(step, input, &spec.name, &step_ids, report);
                    }
                }
            }
        }
    }

    fn validate_input_binding(
        &self,
        step: &PipelineStep,
        input: &StepInput,
        input_name: &str,
        step_ids: &HashSet<&str>,
        report: &mut ValidationReport,
    ) {
        let field = format!("inputs.{input_name}");

        match input {
            StepInput::FromStep { step_id, output } => {
                if !step_ids.contains(step_id.as_str()) {
                    report.add_error(
                        format!("Input '{input_name}' references unknown step: {step_id}"),
                        Some(&step.step_id),
                        Some(&field),
                    );
                } else if output.is_empty() {
                    report.add_error(
                        format!("Input '{input_name}' has an empty source output name"),
                        Some(&step.step_id),
                        Some(&field),
                    );
                }
            }
            StepInput::Static { value, .. } => {
                if value.is_null() {
                    report.add_warning(
                        format!("Input '{input_name}' has a null static value"),
                        Some(&step.step_id),
                        Some(&field),
                    );
                }
            }
            StepInput::UserInput { .. } => {}
        }
    }

    fn validate_type_compatibility(&self, pipeline: &Pipeline, report: &mut ValidationReport) {
        for step in &pipeline.steps {
            let Some(schema) = self.registry.get_schema(&step.tool_id) else {
                continue;
            };

            for (input_name, input) in &step.inputs {
                let StepInput::FromStep { step_id, output } = input else {
                    continue;
                };
                let field = format!("inputs.{input_name}");

                let Some(input_spec) = schema.get_input(input_name) else {
                    report.add_error(
                        format!("Unknown input: {input_name}"),
                        Some(&step.step_id),
                        Some(&field),
                    );
                    continue;
                };

                let Some(source_step) = pipeline.get_step(step_id) else {
                    continue; // reported in the input phase
                };
                let Some(source_schema) = self.registry.get_schema(&source_step.tool_id) else {
                    continue;
                };

                let Some(output_spec) = source_schema.get_output(output) else {
                    report.add_error(
                        format!(
                            "Source step '{}' has no output '{}'",
                            source_step.name, output
                        ),
                        Some(&step.step_id),
                        Some(&field),
                    );
                    continue;
                };

                if !types_compatible(output_spec.data_type, input_spec.data_type) {
                    report.add_error(
                        format!(
                            "Type mismatch: {} -> {}",
                            output_spec.data_type, input_spec.data_type
                        ),
                        Some(&step.step_id),
                        Some(&field),
                    );
                }
            }
        }
    }

    fn validate_no_cycles(&self, pipeline: &Pipeline, report: &mut ValidationReport) {
        let dag = DagBuilder::build(pipeline);
        if let Err(ToolflowError::CircularDependency { steps }) = dag.validate_acyclic() {
            report.add_error(
                format!(
                    "Pipeline contains a cycle (circular dependency): {}",
                    steps.join(" -> ")
                ),
                None,
                None,
            );
        }
    }

    /// Topologically sorted step ids for execution
    ///
    /// Fails with a cycle error on cyclic graphs instead of looping.
    pub fn execution_order(&self, pipeline: &Pipeline) -> Result<Vec<String>, ToolflowError> {
        DagBuilder::build(pipeline).topological_order()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{InputSpec, OutputSpec, PipelineStep, ToolSchema};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn noop() -> Arc<dyn crate::registry::ToolImplementation> {
        Arc::new(|_inputs: &HashMap<String, serde_json::Value>| Ok(json!({})))
    }

    fn test_registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();

        registry
            .register(
                ToolSchema::new("producer", "Producer", "Emits a string")
                    .with_input(InputSpec::required("input", DataType::String))
                    .with_output(OutputSpec::new("output", DataType::String)),
                noop(),
            )
            .unwrap();
        registry
            .register(
                ToolSchema::new("consumer", "Consumer", "Consumes a string")
                    .with_input(InputSpec::required("input", DataType::String))
                    .with_output(OutputSpec::new("output", DataType::String)),
                noop(),
            )
            .unwrap();
        registry
            .register(
                ToolSchema::new("masker", "Masker", "Emits a mask")
                    .with_input(InputSpec::required("image", DataType::Image))
                    .with_output(OutputSpec::new("mask", DataType::Mask)),
                noop(),
            )
            .unwrap();
        registry
            .register(
                ToolSchema::new("counter", "Counter", "Counts objects in a mask")
                    .with_input(InputSpec::required("mask", DataType::Mask))
                    .with_input(InputSpec::optional("min_area", DataType::Float, json!(0.0)))
                    .with_output(OutputSpec::new("object_count", DataType::Int)),
                noop(),
            )
            .unwrap();

        Arc::new(registry)
    }

    fn two_step_pipeline() -> Pipeline {
        let mut pipeline = Pipeline::new("test");
        pipeline.add_step(
            PipelineStep::new("Step 1", "producer")
                .with_id("s1")
                .with_input("input", StepInput::value(json!("hello"))),
        );
        pipeline.add_step(
            PipelineStep::new("Step 2", "consumer")
                .with_id("s2")
                .with_input("input", StepInput::from_step("s1", "output")),
        );
        pipeline
    }

    #[test]
    fn test_valid_pipeline() {
        let validator = PipelineValidator::new(test_registry());
        let report = validator.validate(&two_step_pipeline());
        assert!(report.is_valid(), "{report}");
    }

    #[test]
    fn test_empty_pipeline_warns() {
        let validator = PipelineValidator::new(test_registry());
        let report = validator.validate(&Pipeline::new("empty"));
        assert!(report.is_valid());
        assert!(report.has_warnings());
    }

    #[test]
    fn test_duplicate_step_id_is_error() {
        let mut pipeline = Pipeline::new("dup");
        pipeline.add_step(
            PipelineStep::new("A", "producer")
                .with_id("s1")
                .with_input("input", StepInput::value(json!("x"))),
        );
        pipeline.add_step(
            PipelineStep::new("B", "producer")
                .with_id("s1")
                .with_input("input", StepInput::value(json!("y"))),
        );

        let validator = PipelineValidator::new(test_registry());
        let report = validator.validate(&pipeline);
        assert!(!report.is_valid());
        assert!(report.errors[0].message.contains("Duplicate step id"));
    }

    #[test]
    fn test_unknown_tool_is_error() {
        let mut pipeline = Pipeline::new("bad");
        pipeline.add_step(PipelineStep::new("A", "nonexistent").with_id("s1"));

        let validator = PipelineValidator::new(test_registry());
        let report = validator.validate(&pipeline);
        assert!(!report.is_valid());
        assert!(report.errors.iter().any(|e| e.message.contains("Unknown tool")));
    }

    #[test]
    fn test_missing_required_input_names_input_and_step() {
        // Scenario: required input "input" with no binding and no default
        let mut pipeline = Pipeline::new("missing");
        pipeline.add_step(PipelineStep::new("A", "producer").with_id("s1"));

        let validator = PipelineValidator::new(test_registry());
        let report = validator.validate(&pipeline);
        assert!(!report.is_valid());

        let issue = &report.errors[0];
        assert!(issue.message.contains("input"));
        assert_eq!(issue.step_id.as_deref(), Some("s1"));
    }

    #[test]
    fn test_from_step_unknown_source_is_error() {
        let mut pipeline = Pipeline::new("dangling");
        pipeline.add_step(
            PipelineStep::new("A", "consumer")
                .with_id("s1")
                .with_input("input", StepInput::from_step("ghost", "output")),
        );

        let validator = PipelineValidator::new(test_registry());
        let report = validator.validate(&pipeline);
        assert!(!report.is_valid());
        assert!(report
            .errors
            .iter()
            .any(|e| e.message.contains("unknown step: ghost")));
    }

    #[test]
    fn test_from_step_unknown_output_is_error() {
        let mut pipeline = Pipeline::new("no-output");
        pipeline.add_step(
            PipelineStep::new("A", "producer")
                .with_id("s1")
                .with_input("input", StepInput::value(json!("x"))),
        );
        pipeline.add_step(
            PipelineStep::new("B", "consumer")
                .with_id("s2")
                .with_input("input", StepInput::from_step("s1", "no_such_output")),
        );

        let validator = PipelineValidator::new(test_registry());
        let report = validator.validate(&pipeline);
        assert!(!report.is_valid());
        assert!(report
            .errors
            .iter()
            .any(|e| e.message.contains("no output 'no_such_output'")));
    }

    #[test]
    fn test_mask_satisfies_image_input() {
        let mut pipeline = Pipeline::new("mask-to-image");
        pipeline.add_step(
            PipelineStep::new("Mask", "masker")
                .with_id("m1")
                .with_input("image", StepInput::value(json!("a.png"))),
        );
        pipeline.add_step(
            PipelineStep::new("Mask again", "masker")
                .with_id("m2")
                .with_input("image", StepInput::from_step("m1", "mask")),
        );

        let validator = PipelineValidator::new(test_registry());
        let report = validator.validate(&pipeline);
        assert!(report.is_valid(), "{report}");
    }

    #[test]
    fn test_int_output_rejected_for_mask_input() {
        let mut pipeline = Pipeline::new("type-mismatch");
        pipeline.add_step(
            PipelineStep::new("Count", "counter")
                .with_id("c1")
                .with_input("mask", StepInput::value(json!("m.png"))),
        );
        pipeline.add_step(
            PipelineStep::new("Count again", "counter")
                .with_id("c2")
                .with_input("mask", StepInput::from_step("c1", "object_count")),
        );

        let validator = PipelineValidator::new(test_registry());
        let report = validator.validate(&pipeline);
        assert!(!report.is_valid());
        assert!(report
            .errors
            .iter()
            .any(|e| e.message.contains("Type mismatch")));
    }

    #[test]
    fn test_two_step_cycle_is_error() {
        // A's input bound to B's output, B's input bound to A's output
        let mut pipeline = Pipeline::new("cycle");
        pipeline.add_step(
            PipelineStep::new("A", "producer")
                .with_id("a")
                .with_input("input", StepInput::from_step("b", "output")),
        );
        pipeline.add_step(
            PipelineStep::new("B", "consumer")
                .with_id("b")
                .with_input("input", StepInput::from_step("a", "output")),
        );

        let validator = PipelineValidator::new(test_registry());
        let report = validator.validate(&pipeline);
        assert!(!report.is_valid());
        assert!(report.errors.iter().any(|e| e.message.contains("cycle")));
        assert!(validator.execution_order(&pipeline).is_err());
    }

    #[test]
    fn test_validation_is_idempotent() {
        let validator = PipelineValidator::new(test_registry());
        let pipeline = two_step_pipeline();

        let first = validator.validate(&pipeline);
        let second = validator.validate(&pipeline);

        assert_eq!(first.is_valid(), second.is_valid());
        assert_eq!(first.errors.len(), second.errors.len());
        assert_eq!(first.warnings.len(), second.warnings.len());
    }

    #[test]
    fn test_execution_order_respects_edges() {
        let validator = PipelineValidator::new(test_registry());
        let order = validator.execution_order(&two_step_pipeline()).unwrap();
        assert_eq!(order, vec!["s1", "s2"]);
    }
}
