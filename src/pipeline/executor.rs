// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Pipeline execution
//!
//! Validates, orders, and runs pipeline steps one at a time, threading each
//! step's outputs to its dependents. Execution is synchronous; the adaptive
//! executor layers review iterations on top of the same resolution logic.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::errors::{ToolflowError, ToolflowResult};
use crate::pipeline::{
    InputSpec, Pipeline, PipelineStep, PipelineValidator, StepInput, StepStatus,
};
use crate::registry::ToolRegistry;

/// Handler invoked for `UserInput` bindings not pre-supplied in the options
///
/// Receives the input name and prompt; returns the value to bind.
pub type UserInputHandler = Box<dyn Fn(&str, &str) -> ToolflowResult<Value> + Send + Sync>;

/// Caller-provided options for a pipeline run
pub struct RunOptions {
    /// Pre-supplied values for `UserInput` bindings, keyed by step id then
    /// input name
    pub user_inputs: HashMap<String, HashMap<String, Value>>,

    /// Stop at the first failed step instead of running what remains
    pub stop_on_error: bool,

    /// Free-text context forwarded to reviewers during refinement
    pub context: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            user_inputs: HashMap::new(),
            stop_on_error: true,
            context: None,
        }
    }
}

impl RunOptions {
    pub fn with_user_input(mut self, step_id: &str, input: &str, value: Value) -> Self {
        self.user_inputs
            .entry(step_id.to_string())
            .or_default()
            .insert(input.to_string(), value);
        self
    }
}

/// Outcome of a single executed step
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub step_id: String,
    pub tool_id: String,
    pub status: StepStatus,
    /// Input values as they were passed to the tool, after defaults and
    /// upstream bindings were applied
    pub resolved_inputs: HashMap<String, Value>,
    pub outputs: HashMap<String, Value>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StepResult {
    pub(crate) fn completed(
        step_id: &str,
        tool_id: &str,
        resolved_inputs: HashMap<String, Value>,
        outputs: HashMap<String, Value>,
    ) -> Self {
        Self {
            step_id: step_id.to_string(),
            tool_id: tool_id.to_string(),
            status: StepStatus::Completed,
            resolved_inputs,
            outputs,
            error_message: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub(crate) fn failed(
        step_id: &str,
        tool_id: &str,
        resolved_inputs: HashMap<String, Value>,
        error: String,
    ) -> Self {
        Self {
            step_id: step_id.to_string(),
            tool_id: tool_id.to_string(),
            status: StepStatus::Failed,
            resolved_inputs,
            outputs: HashMap::new(),
            error_message: Some(error),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == StepStatus::Completed
    }
}

/// Overall status of a pipeline run
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    Pending,
    Completed,
    Failed,
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Aggregate result of a pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub pipeline_id: String,
    pub pipeline_name: String,
    pub status: PipelineStatus,
    /// Results in execution order
    pub step_results: Vec<StepResult>,
    pub total_steps: usize,
    pub completed_steps: usize,
    pub failed_steps: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PipelineResult {
    pub(crate) fn new(pipeline: &Pipeline) -> Self {
        Self {
            pipeline_id: pipeline.pipeline_id.clone(),
            pipeline_name: pipeline.name.clone(),
            status: PipelineStatus::Pending,
            step_results: Vec::new(),
            total_steps: pipeline.steps.len(),
            completed_steps: 0,
            failed_steps: 0,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn get_step_result(&self, step_id: &str) -> Option<&StepResult> {
        self.step_results.iter().find(|r| r.step_id == step_id)
    }

    /// Outputs of the last completed step, in execution order
    pub fn final_outputs(&self) -> Option<&HashMap<String, Value>> {
        self.step_results
            .iter()
            .rev()
            .find(|r| r.is_completed())
            .map(|r| &r.outputs)
    }

    pub(crate) fn push(&mut self, result: StepResult) {
        match result.status {
            StepStatus::Completed => self.completed_steps += 1,
            StepStatus::Failed => self.failed_steps += 1,
            _ => {}
        }
        self.step_results.push(result);
    }

    pub(crate) fn finalize(&mut self, executed: usize) {
        self.completed_at = Some(Utc::now());
        self.status = if self.failed_steps > 0 {
            PipelineStatus::Failed
        } else if executed > 0 && self.completed_steps == executed {
            PipelineStatus::Completed
        } else {
            PipelineStatus::Pending
        };
    }

    pub(crate) fn validation_failure(pipeline: &Pipeline, errors: Vec<String>) -> Self {
        let mut result = Self::new(pipeline);
        result.push(StepResult::failed(
            "validation",
            "",
            HashMap::new(),
            format!("Pipeline validation failed: {}", errors.join("; ")),
        ));
        result.status = PipelineStatus::Failed;
        result.completed_at = Some(Utc::now());
        result
    }
}

/// Shared state threaded through a run: upstream outputs and removed steps
#[derive(Default)]
pub(crate) struct ExecutionContext {
    outputs: HashMap<String, HashMap<String, Value>>,
    removed: Vec<String>,
    /// First image path seen among resolved inputs, used for artifact naming
    pub(crate) input_image_path: Option<String>,
}

impl ExecutionContext {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_outputs(&mut self, step_id: &str, outputs: HashMap<String, Value>) {
        self.outputs.insert(step_id.to_string(), outputs);
    }

    /// Mark a step as removed by refinement
    ///
    /// Later lookups against it fail with a removal error rather than a
    /// generic not-executed one.
    pub(crate) fn mark_removed(&mut self, step_id: &str) {
        self.outputs.remove(step_id);
        self.removed.push(step_id.to_string());
    }

    pub(crate) fn get_output(&self, step_id: &str, output: &str) -> ToolflowResult<Value> {
        if self.removed.iter().any(|s| s == step_id) {
            return Err(ToolflowError::StepRemoved {
                step: step_id.to_string(),
            });
        }
        let step_outputs =
            self.outputs
                .get(step_id)
                .ok_or_else(|| ToolflowError::StepNotExecuted {
                    step: step_id.to_string(),
                })?;
        step_outputs
            .get(output)
            .cloned()
            .ok_or_else(|| ToolflowError::MissingOutput {
                step: step_id.to_string(),
                output: output.to_string(),
            })
    }
}

/// Executes validated pipelines against a tool registry
pub struct PipelineExecutor {
    registry: Arc<ToolRegistry>,
    user_input_handler: Option<UserInputHandler>,
}

impl PipelineExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            user_input_handler: None,
        }
    }

    /// Install a handler for `UserInput` bindings not covered by the options
    pub fn with_user_input_handler(mut self, handler: UserInputHandler) -> Self {
        self.user_input_handler = Some(handler);
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Run a pipeline
    ///
    /// Validation happens first; an invalid pipeline produces a failed result
    /// with a single pseudo step named `validation` and no tools are invoked.
    /// Step statuses are written back into the pipeline as it runs.
    pub fn execute(&self, pipeline: &mut Pipeline, options: &RunOptions) -> PipelineResult {
        let validator = PipelineValidator::new(self.registry.clone());
        let report = validator.validate(pipeline);
        if !report.is_valid() {
            warn!(pipeline = %pipeline.name, errors = report.errors.len(), "validation failed");
            return PipelineResult::validation_failure(
                pipeline,
                report.errors.iter().map(|e| e.to_string()).collect(),
            );
        }

        let order = match validator.execution_order(pipeline) {
            Ok(order) => order,
            Err(e) => return PipelineResult::validation_failure(pipeline, vec![e.to_string()]),
        };

        info!(pipeline = %pipeline.name, steps = order.len(), "executing pipeline");

        let mut result = PipelineResult::new(pipeline);
        let mut ctx = ExecutionContext::new();
        let mut halted = false;

        for step_id in &order {
            if halted {
                if let Some(step) = pipeline.get_step_mut(step_id) {
                    step.status = StepStatus::Skipped;
                }
                continue;
            }

            let step_result = self.execute_step(pipeline, step_id, options, &mut ctx);
            let failed = !step_result.is_completed();
            result.push(step_result);

            if failed && options.stop_on_error {
                halted = true;
            }
        }

        result.finalize(result.step_results.len());
        info!(
            pipeline = %pipeline.name,
            status = %result.status,
            completed = result.completed_steps,
            failed = result.failed_steps,
            "pipeline finished"
        );
        result
    }

    /// Execute one step: resolve inputs, invoke the tool, record outputs
    pub(crate) fn execute_step(
        &self,
        pipeline: &mut Pipeline,
        step_id: &str,
        options: &RunOptions,
        ctx: &mut ExecutionContext,
    ) -> StepResult {
        let started = Utc::now();
        let (tool_id, step_name) = match pipeline.get_step_mut(step_id) {
            Some(step) => {
                step.status = StepStatus::Running;
                step.started_at = Some(started);
                (step.tool_id.clone(), step.name.clone())
            }
            None => {
                return StepResult::failed(
                    step_id,
                    "",
                    HashMap::new(),
                    format!("step not found: {step_id}"),
                )
            }
        };

        debug!(step = %step_name, tool = %tool_id, "running step");

        let mut resolved_inputs = HashMap::new();
        let outcome = self.run_tool(pipeline, step_id, &tool_id, options, ctx, &mut resolved_inputs);
        let completed = Utc::now();

        let mut result = match outcome {
            Ok(outputs) => {
                ctx.record_outputs(step_id, outputs.clone());
                StepResult::completed(step_id, &tool_id, resolved_inputs, outputs)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(step = %step_name, error = %message, "step failed");
                StepResult::failed(step_id, &tool_id, resolved_inputs, message)
            }
        };
        result.started_at = Some(started);
        result.completed_at = Some(completed);

        if let Some(step) = pipeline.get_step_mut(step_id) {
            step.status = result.status;
            step.error_message = result.error_message.clone();
            step.completed_at = result.completed_at;
        }
        result
    }

    fn run_tool(
        &self,
        pipeline: &Pipeline,
        step_id: &str,
        tool_id: &str,
        options: &RunOptions,
        ctx: &mut ExecutionContext,
        resolved: &mut HashMap<String, Value>,
    ) -> ToolflowResult<HashMap<String, Value>> {
        let step = pipeline
            .get_step(step_id)
            .ok_or_else(|| ToolflowError::StepNotFound {
                step: step_id.to_string(),
            })?;
        let inputs = self.resolve_inputs(step, options, ctx)?;
        *resolved = inputs.clone();
        let implementation = self
            .registry
            .get_implementation(tool_id)
            .ok_or_else(|| ToolflowError::UnknownTool {
                tool_id: tool_id.to_string(),
            })?;

        let raw = implementation
            .invoke(&inputs)
            .map_err(|e| ToolflowError::ToolExecutionFailed {
                tool_id: tool_id.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self::normalize_outputs(raw))
    }

    /// Resolve a step's inputs: defaults first, then the declared binding
    pub(crate) fn resolve_inputs(
        &self,
        step: &PipelineStep,
        options: &RunOptions,
        ctx: &mut ExecutionContext,
    ) -> ToolflowResult<HashMap<String, Value>> {
        let schema = self
            .registry
            .get_schema(&step.tool_id)
            .ok_or_else(|| ToolflowError::UnknownTool {
                tool_id: step.tool_id.clone(),
            })?;

        let mut resolved = HashMap::new();

        for spec in &schema.inputs {
            if let Some(default) = &spec.default {
                resolved.insert(spec.name.clone(), default.clone());
            }

            let Some(binding) = step.inputs.get(&spec.name) else {
                continue;
            };

            let value = match binding {
                StepInput::Static { value, .. } => value.clone(),
                StepInput::FromStep { step_id, output } => ctx.get_output(step_id, output)?,
                StepInput::UserInput { prompt } => {
                    self.resolve_user_input(step, &spec.name, prompt, options)?
                }
            };

            Self::track_image_path(spec, &value, ctx);
            resolved.insert(spec.name.clone(), value);
        }

        Ok(resolved)
    }

    fn resolve_user_input(
        &self,
        step: &PipelineStep,
        input_name: &str,
        prompt: &str,
        options: &RunOptions,
    ) -> ToolflowResult<Value> {
        if let Some(value) = options
            .user_inputs
            .get(&step.step_id)
            .and_then(|m| m.get(input_name))
        {
            return Ok(value.clone());
        }
        if let Some(handler) = &self.user_input_handler {
            return handler(input_name, prompt);
        }
        Err(ToolflowError::MissingUserInput {
            step: step.step_id.clone(),
            input: input_name.to_string(),
        })
    }

    fn track_image_path(spec: &InputSpec, value: &Value, ctx: &mut ExecutionContext) {
        use crate::pipeline::DataType;
        if ctx.input_image_path.is_none()
            && matches!(spec.data_type, DataType::Image | DataType::Path)
        {
            if let Value::String(path) = value {
                ctx.input_image_path = Some(path.clone());
            }
        }
    }

    /// Object returns become the output map; anything else is wrapped under
    /// a single `result` key
    pub(crate) fn normalize_outputs(raw: Value) -> HashMap<String, Value> {
        match raw {
            Value::Object(map) => map.into_iter().collect(),
            other => HashMap::from([("result".to_string(), other)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{DataType, InputSpec, OutputSpec, ToolSchema};
    use serde_json::json;

    fn imaging_registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();

        registry
            .register(
                ToolSchema::new("load_image", "Load Image", "Load an image from disk")
                    .with_category("io")
                    .with_input(InputSpec::required("image_path", DataType::Path))
                    .with_output(OutputSpec::new("image", DataType::Image)),
                Arc::new(|inputs: &HashMap<String, Value>| {
                    Ok(json!({ "image": inputs["image_path"] }))
                }),
            )
            .unwrap();

        registry
            .register(
                ToolSchema::new("threshold", "Threshold", "Binarize an image")
                    .with_category("segmentation")
                    .with_input(InputSpec::required("image", DataType::Image))
                    .with_input(
                        InputSpec::optional("threshold_value", DataType::Int, json!(127))
                            .with_bounds(0.0, 255.0),
                    )
                    .with_output(OutputSpec::new("mask", DataType::Mask)),
                Arc::new(|inputs: &HashMap<String, Value>| {
                    Ok(json!({
                        "mask": format!("mask_of_{}", inputs["image"].as_str().unwrap_or("?")),
                        "threshold_used": inputs["threshold_value"],
                    }))
                }),
            )
            .unwrap();

        registry
            .register(
                ToolSchema::new("find_contours", "Find Contours", "Count objects in a mask")
                    .with_category("measurement")
                    .with_input(InputSpec::required("mask", DataType::Mask))
                    .with_input(InputSpec::optional("min_area", DataType::Float, json!(0.0)))
                    .with_output(OutputSpec::new("contours", DataType::List))
                    .with_output(OutputSpec::new("object_count", DataType::Int)),
                Arc::new(|_inputs: &HashMap<String, Value>| {
                    Ok(json!({ "contours": [], "object_count": 0 }))
                }),
            )
            .unwrap();

        registry
            .register(
                ToolSchema::new("scalar", "Scalar", "Returns a bare number")
                    .with_input(InputSpec::optional("n", DataType::Int, json!(5)))
                    .with_output(OutputSpec::new("result", DataType::Int)),
                Arc::new(|inputs: &HashMap<String, Value>| Ok(inputs["n"].clone())),
            )
            .unwrap();

        registry
            .register(
                ToolSchema::new("always_fails", "Always Fails", "Fails on purpose")
                    .with_output(OutputSpec::new("nothing", DataType::String)),
                Arc::new(|_inputs: &HashMap<String, Value>| {
                    Err(crate::errors::ToolflowError::tool_failed(
                        "always_fails",
                        "boom",
                    ))
                }),
            )
            .unwrap();

        Arc::new(registry)
    }

    fn counting_pipeline() -> Pipeline {
        let mut pipeline = Pipeline::new("count objects");
        pipeline.add_step(
            PipelineStep::new("Load", "load_image")
                .with_id("load")
                .with_input("image_path", StepInput::value(json!("cells.png"))),
        );
        pipeline.add_step(
            PipelineStep::new("Threshold", "threshold")
                .with_id("thresh")
                .with_input("image", StepInput::from_step("load", "image")),
        );
        pipeline.add_step(
            PipelineStep::new("Count", "find_contours")
                .with_id("count")
                .with_input("mask", StepInput::from_step("thresh", "mask")),
        );
        pipeline
    }

    #[test]
    fn test_three_step_pipeline_completes() {
        let executor = PipelineExecutor::new(imaging_registry());
        let mut pipeline = counting_pipeline();

        let result = executor.execute(&mut pipeline, &RunOptions::default());

        assert_eq!(result.status, PipelineStatus::Completed);
        assert_eq!(result.step_results.len(), 3);
        assert_eq!(result.completed_steps, 3);

        let count = result.get_step_result("count").unwrap();
        assert!(count.outputs["object_count"].as_i64().unwrap() >= 0);
        assert_eq!(pipeline.get_step("count").unwrap().status, StepStatus::Completed);
    }

    #[test]
    fn test_outputs_flow_between_steps() {
        let executor = PipelineExecutor::new(imaging_registry());
        let mut pipeline = counting_pipeline();

        let result = executor.execute(&mut pipeline, &RunOptions::default());
        let thresh = result.get_step_result("thresh").unwrap();

        assert_eq!(thresh.outputs["mask"], json!("mask_of_cells.png"));
    }

    #[test]
    fn test_default_applied_when_unbound() {
        let executor = PipelineExecutor::new(imaging_registry());
        let mut pipeline = counting_pipeline();

        let result = executor.execute(&mut pipeline, &RunOptions::default());
        let thresh = result.get_step_result("thresh").unwrap();

        assert_eq!(thresh.outputs["threshold_used"], json!(127));
        assert_eq!(thresh.resolved_inputs["threshold_value"], json!(127));
        assert_eq!(thresh.resolved_inputs["image"], json!("cells.png"));
    }

    #[test]
    fn test_non_object_return_wrapped_under_result() {
        let executor = PipelineExecutor::new(imaging_registry());
        let mut pipeline = Pipeline::new("scalar");
        pipeline.add_step(PipelineStep::new("Scalar", "scalar").with_id("s"));

        let result = executor.execute(&mut pipeline, &RunOptions::default());

        assert_eq!(result.status, PipelineStatus::Completed);
        assert_eq!(result.get_step_result("s").unwrap().outputs["result"], json!(5));
    }

    #[test]
    fn test_invalid_pipeline_yields_validation_pseudo_step() {
        let executor = PipelineExecutor::new(imaging_registry());
        let mut pipeline = Pipeline::new("bad");
        pipeline.add_step(PipelineStep::new("Nope", "no_such_tool").with_id("s1"));

        let result = executor.execute(&mut pipeline, &RunOptions::default());

        assert_eq!(result.status, PipelineStatus::Failed);
        assert_eq!(result.step_results.len(), 1);
        assert_eq!(result.step_results[0].step_id, "validation");
        assert!(result.step_results[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("validation failed"));
    }

    #[test]
    fn test_stop_on_error_skips_downstream() {
        let executor = PipelineExecutor::new(imaging_registry());
        let mut pipeline = Pipeline::new("fails");
        // Both downstream steps depend on the failing one
        pipeline.add_step(PipelineStep::new("Boom", "always_fails").with_id("boom"));
        pipeline.add_step(
            PipelineStep::new("Load", "load_image")
                .with_id("load")
                .with_input("image_path", StepInput::from_step("boom", "nothing")),
        );
        pipeline.add_step(
            PipelineStep::new("Count", "find_contours")
                .with_id("count")
                .with_input("mask", StepInput::from_step("load", "image")),
        );

        let result = executor.execute(&mut pipeline, &RunOptions::default());

        assert_eq!(result.status, PipelineStatus::Failed);
        assert_eq!(result.failed_steps, 1);
        assert_eq!(result.step_results.len(), 1);
        assert_eq!(result.step_results[0].step_id, "boom");
        assert_eq!(pipeline.get_step("load").unwrap().status, StepStatus::Skipped);
        assert_eq!(pipeline.get_step("count").unwrap().status, StepStatus::Skipped);
    }

    #[test]
    fn test_continue_on_error_runs_independent_steps() {
        let executor = PipelineExecutor::new(imaging_registry());
        let mut pipeline = Pipeline::new("fails");
        pipeline.add_step(PipelineStep::new("Boom", "always_fails").with_id("boom"));
        pipeline.add_step(
            PipelineStep::new("Load", "load_image")
                .with_id("load")
                .with_input("image_path", StepInput::value(json!("a.png"))),
        );

        let options = RunOptions {
            stop_on_error: false,
            ..Default::default()
        };
        let result = executor.execute(&mut pipeline, &options);

        assert_eq!(result.status, PipelineStatus::Failed);
        assert_eq!(result.step_results.len(), 2);
        assert!(result.get_step_result("load").unwrap().is_completed());
    }

    #[test]
    fn test_missing_user_input_fails_step() {
        let executor = PipelineExecutor::new(imaging_registry());
        let mut pipeline = Pipeline::new("needs input");
        pipeline.add_step(
            PipelineStep::new("Load", "load_image")
                .with_id("load")
                .with_input("image_path", StepInput::from_user("Which image?")),
        );

        let result = executor.execute(&mut pipeline, &RunOptions::default());

        assert_eq!(result.status, PipelineStatus::Failed);
        let failed = result.get_step_result("load").unwrap();
        assert!(failed.error_message.as_deref().unwrap().contains("image_path"));
    }

    #[test]
    fn test_user_input_from_options() {
        let executor = PipelineExecutor::new(imaging_registry());
        let mut pipeline = Pipeline::new("needs input");
        pipeline.add_step(
            PipelineStep::new("Load", "load_image")
                .with_id("load")
                .with_input("image_path", StepInput::from_user("Which image?")),
        );

        let options =
            RunOptions::default().with_user_input("load", "image_path", json!("supplied.png"));
        let result = executor.execute(&mut pipeline, &options);

        assert_eq!(result.status, PipelineStatus::Completed);
        assert_eq!(
            result.get_step_result("load").unwrap().outputs["image"],
            json!("supplied.png")
        );
    }

    #[test]
    fn test_user_input_handler_fallback() {
        let executor = PipelineExecutor::new(imaging_registry()).with_user_input_handler(
            Box::new(|_name, _prompt| Ok(json!("from_handler.png"))),
        );
        let mut pipeline = Pipeline::new("needs input");
        pipeline.add_step(
            PipelineStep::new("Load", "load_image")
                .with_id("load")
                .with_input("image_path", StepInput::from_user("Which image?")),
        );

        let result = executor.execute(&mut pipeline, &RunOptions::default());

        assert_eq!(result.status, PipelineStatus::Completed);
    }

    #[test]
    fn test_context_rejects_removed_step_lookup() {
        let mut ctx = ExecutionContext::new();
        ctx.record_outputs("a", HashMap::from([("x".to_string(), json!(1))]));
        ctx.mark_removed("a");

        let err = ctx.get_output("a", "x").unwrap_err();
        assert!(matches!(err, ToolflowError::StepRemoved { .. }));
    }
}
