// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Adaptive execution
//!
//! Wraps the base executor in a review-adjust-retry loop. Each step runs,
//! gets reviewed, and is re-run with adjusted parameters until the reviewer
//! accepts it or the iteration cap is hit. Reviewers can also remove a step
//! outright or give up on it.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::pipeline::{
    ExecutionContext, Pipeline, PipelineExecutor, PipelineResult, RunOptions, StepResult,
    StepStatus, ToolSchema, UserInputHandler,
};
use crate::refinement::{
    ArtifactManager, ParameterOptimizer, RefinementAction, RefinementReport, RefinementTracker,
    ReviewRequest, Reviewer, DEFAULT_MAX_ITERATIONS,
};
use crate::registry::ToolRegistry;

enum StepOutcome {
    Finished {
        result: StepResult,
        final_action: RefinementAction,
    },
    Removed,
}

/// Pipeline executor with per-step review and refinement
pub struct AdaptiveExecutor {
    base: PipelineExecutor,
    registry: Arc<ToolRegistry>,
    reviewer: Arc<dyn Reviewer>,
    refinement_enabled: bool,
    max_iterations: u32,
    legacy_heuristic: bool,
}

impl AdaptiveExecutor {
    pub fn new(registry: Arc<ToolRegistry>, reviewer: Arc<dyn Reviewer>) -> Self {
        Self {
            base: PipelineExecutor::new(registry.clone()),
            registry,
            reviewer,
            refinement_enabled: true,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            legacy_heuristic: false,
        }
    }

    /// Cap iterations per step; clamped to at least one
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Disable review entirely; every first attempt is accepted
    pub fn with_refinement(mut self, enabled: bool) -> Self {
        self.refinement_enabled = enabled;
        self
    }

    pub fn with_user_input_handler(mut self, handler: UserInputHandler) -> Self {
        self.base = self.base.with_user_input_handler(handler);
        self
    }

    /// Treat round-looking static values as locked, for old pipelines that
    /// predate the explicit flag
    pub fn with_legacy_heuristic(mut self) -> Self {
        self.legacy_heuristic = true;
        self
    }

    /// Run a pipeline with adaptive refinement
    ///
    /// Steps removed by the reviewer contribute no step result and are
    /// excluded from the completion accounting; anything still depending on
    /// a removed step fails with an error naming it. When an artifact
    /// manager is given, every iteration's image outputs are persisted.
    pub async fn execute(
        &self,
        pipeline: &mut Pipeline,
        options: &RunOptions,
        mut artifacts: Option<&mut ArtifactManager>,
    ) -> (PipelineResult, RefinementReport) {
        let validator =
            crate::pipeline::PipelineValidator::new(self.registry.clone());
        let report = validator.validate(pipeline);
        if !report.is_valid() {
            warn!(pipeline = %pipeline.name, errors = report.errors.len(), "validation failed");
            let result = PipelineResult::validation_failure(
                pipeline,
                report.errors.iter().map(|e| e.to_string()).collect(),
            );
            return (result, RefinementReport::default());
        }

        let order = match validator.execution_order(pipeline) {
            Ok(order) => order,
            Err(e) => {
                let result = PipelineResult::validation_failure(pipeline, vec![e.to_string()]);
                return (result, RefinementReport::default());
            }
        };

        info!(
            pipeline = %pipeline.name,
            steps = order.len(),
            max_iterations = self.max_iterations,
            "executing pipeline with refinement"
        );

        let mut result = PipelineResult::new(pipeline);
        let mut ctx = ExecutionContext::new();
        let mut tracker = RefinementTracker::new();
        let mut optimizer = if self.legacy_heuristic {
            ParameterOptimizer::new().with_legacy_heuristic()
        } else {
            ParameterOptimizer::new()
        };
        tracker.start_execution();

        let mut halted = false;
        let mut removed = 0usize;

        for step_id in &order {
            if halted {
                if let Some(step) = pipeline.get_step_mut(step_id) {
                    step.status = StepStatus::Skipped;
                }
                continue;
            }

            let tool_id = pipeline
                .get_step(step_id)
                .map(|s| s.tool_id.clone())
                .unwrap_or_default();
            tracker.start_step(step_id, &tool_id);

            let outcome = self
                .run_step(
                    pipeline,
                    step_id,
                    options,
                    &mut ctx,
                    &mut tracker,
                    &mut optimizer,
                    artifacts.as_deref_mut(),
                )
                .await;

            match outcome {
                StepOutcome::Removed => {
                    removed += 1;
                    tracker.finalize_step(Some(RefinementAction::RemoveTool));
                }
                StepOutcome::Finished {
                    result: step_result,
                    final_action,
                } => {
                    tracker.finalize_step(Some(final_action));
                    let failed = !step_result.is_completed();
                    result.push(step_result);
                    if failed && options.stop_on_error {
                        halted = true;
                    }
                }
            }
        }

        tracker.end_execution();
        result.total_steps = result.total_steps.saturating_sub(removed);
        result.finalize(result.step_results.len());

        let refinement = tracker.report();
        info!(
            pipeline = %pipeline.name,
            status = %result.status,
            iterations = refinement.total_iterations,
            refined = refinement.steps_refined,
            "refined pipeline finished"
        );
        (result, refinement)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_step(
        &self,
        pipeline: &mut Pipeline,
        step_id: &str,
        options: &RunOptions,
        ctx: &mut ExecutionContext,
        tracker: &mut RefinementTracker,
        optimizer: &mut ParameterOptimizer,
        mut artifacts: Option<&mut ArtifactManager>,
    ) -> StepOutcome {
        let (tool_id, step_name) = {
            let Some(step) = pipeline.get_step_mut(step_id) else {
                return self.finish_failed(
                    pipeline,
                    step_id,
                    "",
                    HashMap::new(),
                    format!("step not found: {step_id}"),
                );
            };
            step.status = StepStatus::Running;
            step.started_at = Some(chrono::Utc::now());
            (step.tool_id.clone(), step.name.clone())
        };

        let Some(schema) = self.registry.get_schema(&tool_id).cloned() else {
            return self.finish_failed(
                pipeline,
                step_id,
                &tool_id,
                HashMap::new(),
                format!("unknown tool: {tool_id}"),
            );
        };
        let Some(implementation) = self.registry.get_implementation(&tool_id) else {
            return self.finish_failed(
                pipeline,
                step_id,
                &tool_id,
                HashMap::new(),
                format!("unknown tool: {tool_id}"),
            );
        };

        let mut iteration: u32 = 1;
        loop {
            let attempt_started = Instant::now();
            let step_snapshot = match pipeline.get_step(step_id) {
                Some(step) => step.clone(),
                None => {
                    return self.finish_failed(
                        pipeline,
                        step_id,
                        &tool_id,
                        HashMap::new(),
                        format!("step not found: {step_id}"),
                    )
                }
            };

            let inputs = match self.base.resolve_inputs(&step_snapshot, options, ctx) {
                Ok(inputs) => inputs,
                Err(e) => {
                    let message = e.to_string();
                    let duration_secs = attempt_started.elapsed().as_secs_f64();
                    self.persist_metadata(
                        artifacts.as_deref_mut(),
                        &step_name,
                        iteration,
                        &HashMap::new(),
                        &HashMap::new(),
                        false,
                        "",
                        duration_secs,
                        Some(message.as_str()),
                        None,
                    );
                    tracker.record_iteration(
                        HashMap::new(),
                        HashMap::new(),
                        false,
                        None,
                        "",
                        duration_secs,
                        Some(message.as_str()),
                    );
                    return self.finish_failed(
                        pipeline,
                        step_id,
                        &tool_id,
                        HashMap::new(),
                        message,
                    );
                }
            };

            debug!(step = %step_name, iteration, "running step attempt");

            // A hard tool failure ends the step; retrying identical inputs
            // would fail identically.
            let raw = match implementation.invoke(&inputs) {
                Ok(raw) => raw,
                Err(e) => {
                    let message = e.to_string();
                    let duration_secs = attempt_started.elapsed().as_secs_f64();
                    self.persist_metadata(
                        artifacts.as_deref_mut(),
                        &step_name,
                        iteration,
                        &inputs,
                        &HashMap::new(),
                        false,
                        "",
                        duration_secs,
                        Some(message.as_str()),
                        None,
                    );
                    tracker.record_iteration(
                        inputs.clone(),
                        HashMap::new(),
                        false,
                        None,
                        "",
                        duration_secs,
                        Some(message.as_str()),
                    );
                    return self.finish_failed(pipeline, step_id, &tool_id, inputs, message);
                }
            };
            let outputs = PipelineExecutor::normalize_outputs(raw);
            let duration_secs = attempt_started.elapsed().as_secs_f64();

            if let Some(manager) = artifacts.as_deref_mut() {
                if let Err(e) = manager.save_iteration_outputs(&step_name, iteration, &outputs) {
                    warn!(step = %step_name, error = %e, "failed to save iteration outputs");
                }
            }

            if !self.should_review(&schema) {
                self.persist_metadata(
                    artifacts.as_deref_mut(),
                    &step_name,
                    iteration,
                    &inputs,
                    &outputs,
                    true,
                    "",
                    duration_secs,
                    None,
                    Some("accept"),
                );
                tracker.record_iteration(
                    inputs.clone(),
                    outputs.clone(),
                    true,
                    None,
                    "",
                    duration_secs,
                    None,
                );
                self.mark_final(artifacts.as_deref_mut(), &step_name, iteration, iteration);
                return self.finish_completed(
                    pipeline,
                    step_id,
                    &tool_id,
                    inputs,
                    outputs,
                    ctx,
                    RefinementAction::Accept,
                );
            }

            let request = ReviewRequest {
                step_id: step_id.to_string(),
                step_name: step_name.clone(),
                tool_schema: schema.clone(),
                iteration,
                max_iterations: self.max_iterations,
                inputs: inputs.clone(),
                outputs: outputs.clone(),
                locked_params: optimizer.identify_locked_params(&step_snapshot, &schema),
                input_image_path: ctx.input_image_path.clone(),
                context: options.context.clone(),
            };

            let decision = match self.reviewer.review(&request).await {
                Ok(decision) => decision,
                Err(e) => {
                    // The reviewer is advisory; its failure must not sink an
                    // otherwise successful step.
                    warn!(step = %step_name, error = %e, "review failed, accepting output");
                    let notes = format!("review failed, accepted at confidence 0.5: {e}");
                    self.persist_metadata(
                        artifacts.as_deref_mut(),
                        &step_name,
                        iteration,
                        &inputs,
                        &outputs,
                        true,
                        &notes,
                        duration_secs,
                        None,
                        Some("accept"),
                    );
                    tracker.record_iteration(
                        inputs.clone(),
                        outputs.clone(),
                        true,
                        None,
                        &notes,
                        duration_secs,
                        None,
                    );
                    self.mark_final(artifacts.as_deref_mut(), &step_name, iteration, iteration);
                    return self.finish_completed(
                        pipeline,
                        step_id,
                        &tool_id,
                        inputs,
                        outputs,
                        ctx,
                        RefinementAction::Accept,
                    );
                }
            };

            debug!(
                step = %step_name,
                iteration,
                action = %decision.action,
                score = %decision.quality_score,
                "review verdict"
            );

            match decision.action {
                RefinementAction::Accept => {
                    self.persist_metadata(
                        artifacts.as_deref_mut(),
                        &step_name,
                        iteration,
                        &inputs,
                        &outputs,
                        true,
                        &decision.assessment,
                        duration_secs,
                        None,
                        Some("accept"),
                    );
                    tracker.record_iteration(
                        inputs.clone(),
                        outputs.clone(),
                        true,
                        Some(decision.quality_score),
                        &decision.assessment,
                        duration_secs,
                        None,
                    );
                    self.mark_final(artifacts.as_deref_mut(), &step_name, iteration, iteration);
                    return self.finish_completed(
                        pipeline,
                        step_id,
                        &tool_id,
                        inputs,
                        outputs,
                        ctx,
                        RefinementAction::Accept,
                    );
                }

                RefinementAction::Fail => {
                    self.persist_metadata(
                        artifacts.as_deref_mut(),
                        &step_name,
                        iteration,
                        &inputs,
                        &outputs,
                        false,
                        &decision.assessment,
                        duration_secs,
                        None,
                        Some("fail"),
                    );
                    tracker.record_iteration(
                        inputs.clone(),
                        outputs,
                        false,
                        Some(decision.quality_score),
                        &decision.assessment,
                        duration_secs,
                        None,
                    );
                    let message = if decision.reasoning.is_empty() {
                        format!("rejected by reviewer at iteration {iteration}")
                    } else {
                        decision.reasoning.clone()
                    };
                    return self.finish_failed(pipeline, step_id, &tool_id, inputs, message);
                }

                RefinementAction::RemoveTool => {
                    self.persist_metadata(
                        artifacts.as_deref_mut(),
                        &step_name,
                        iteration,
                        &inputs,
                        &outputs,
                        false,
                        &decision.assessment,
                        duration_secs,
                        None,
                        Some("remove_tool"),
                    );
                    tracker.record_iteration(
                        inputs,
                        outputs,
                        false,
                        Some(decision.quality_score),
                        &decision.assessment,
                        duration_secs,
                        None,
                    );
                    tracker.record_tool_removal(step_id, &tool_id, &decision.reasoning);
                    ctx.mark_removed(step_id);
                    if let Some(step) = pipeline.get_step_mut(step_id) {
                        step.status = StepStatus::Skipped;
                        step.completed_at = Some(chrono::Utc::now());
                    }
                    info!(step = %step_name, "step removed by reviewer");
                    return StepOutcome::Removed;
                }

                // Structural additions cannot be applied mid-run; the output
                // stands and the proposal is recorded for the caller.
                RefinementAction::AddTool | RefinementAction::ReplaceTool => {
                    let suggested = decision.suggested_tool_id.as_deref().unwrap_or("");
                    if decision.action == RefinementAction::AddTool {
                        tracker.record_tool_addition(
                            step_id,
                            &tool_id,
                            suggested,
                            &decision.reasoning,
                        );
                    } else {
                        tracker.record_tool_replacement(
                            step_id,
                            &tool_id,
                            suggested,
                            &decision.reasoning,
                        );
                    }
                    let notes = format!("{} proposed: {}", decision.action, suggested);
                    let decision_name = decision.action.to_string();
                    self.persist_metadata(
                        artifacts.as_deref_mut(),
                        &step_name,
                        iteration,
                        &inputs,
                        &outputs,
                        true,
                        &notes,
                        duration_secs,
                        None,
                        Some(decision_name.as_str()),
                    );
                    tracker.record_iteration(
                        inputs.clone(),
                        outputs.clone(),
                        true,
                        Some(decision.quality_score),
                        &notes,
                        duration_secs,
                        None,
                    );
                    self.mark_final(artifacts.as_deref_mut(), &step_name, iteration, iteration);
                    return self.finish_completed(
                        pipeline,
                        step_id,
                        &tool_id,
                        inputs,
                        outputs,
                        ctx,
                        decision.action,
                    );
                }

                RefinementAction::AdjustParams => {
                    if iteration >= self.max_iterations {
                        // Out of budget; the current output stands unaccepted
                        self.persist_metadata(
                            artifacts.as_deref_mut(),
                            &step_name,
                            iteration,
                            &inputs,
                            &outputs,
                            false,
                            "iteration limit reached, keeping last output",
                            duration_secs,
                            None,
                            Some("adjust_params"),
                        );
                        tracker.record_iteration(
                            inputs.clone(),
                            outputs.clone(),
                            false,
                            Some(decision.quality_score),
                            "iteration limit reached, keeping last output",
                            duration_secs,
                            None,
                        );
                        self.mark_final(
                            artifacts.as_deref_mut(),
                            &step_name,
                            iteration,
                            iteration,
                        );
                        return self.finish_completed(
                            pipeline,
                            step_id,
                            &tool_id,
                            inputs,
                            outputs,
                            ctx,
                            RefinementAction::AdjustParams,
                        );
                    }

                    let applied = match pipeline.get_step_mut(step_id) {
                        Some(step) => optimizer.apply_changes(
                            step,
                            &schema,
                            &decision.parameter_changes,
                            &inputs,
                        ),
                        None => Vec::new(),
                    };

                    if applied.is_empty() {
                        // Nothing changed; re-running would be identical
                        self.persist_metadata(
                            artifacts.as_deref_mut(),
                            &step_name,
                            iteration,
                            &inputs,
                            &outputs,
                            true,
                            "no applicable parameter changes, keeping output",
                            duration_secs,
                            None,
                            Some("accept"),
                        );
                        tracker.record_iteration(
                            inputs.clone(),
                            outputs.clone(),
                            true,
                            Some(decision.quality_score),
                            "no applicable parameter changes, keeping output",
                            duration_secs,
                            None,
                        );
                        self.mark_final(
                            artifacts.as_deref_mut(),
                            &step_name,
                            iteration,
                            iteration,
                        );
                        return self.finish_completed(
                            pipeline,
                            step_id,
                            &tool_id,
                            inputs,
                            outputs,
                            ctx,
                            RefinementAction::Accept,
                        );
                    }

                    self.persist_metadata(
                        artifacts.as_deref_mut(),
                        &step_name,
                        iteration,
                        &inputs,
                        &outputs,
                        false,
                        &decision.assessment,
                        duration_secs,
                        None,
                        Some("adjust_params"),
                    );
                    tracker.record_iteration(
                        inputs,
                        outputs,
                        false,
                        Some(decision.quality_score),
                        &decision.assessment,
                        duration_secs,
                        None,
                    );
                    iteration += 1;
                }
            }
        }
    }

    fn should_review(&self, schema: &ToolSchema) -> bool {
        self.refinement_enabled && schema.category != "io" && schema.has_image_output()
    }

    /// Write the iteration's metadata sidecar once its verdict is known
    #[allow(clippy::too_many_arguments)]
    fn persist_metadata(
        &self,
        artifacts: Option<&mut ArtifactManager>,
        step_name: &str,
        iteration: u32,
        inputs: &HashMap<String, Value>,
        outputs: &HashMap<String, Value>,
        accepted: bool,
        notes: &str,
        duration_secs: f64,
        error: Option<&str>,
        decision: Option<&str>,
    ) {
        if let Some(manager) = artifacts {
            let metadata = ArtifactManager::iteration_metadata(
                inputs,
                outputs,
                accepted,
                notes,
                duration_secs,
                error,
                decision,
            );
            if let Err(e) = manager.save_metadata(step_name, iteration, &metadata) {
                warn!(step = %step_name, error = %e, "failed to save iteration metadata");
            }
        }
    }

    fn mark_final(
        &self,
        artifacts: Option<&mut ArtifactManager>,
        step_name: &str,
        accepted_iteration: u32,
        total_iterations: u32,
    ) {
        if let Some(manager) = artifacts {
            if let Err(e) = manager.mark_final(step_name, accepted_iteration, total_iterations) {
                warn!(step = %step_name, error = %e, "failed to mark final artifacts");
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_completed(
        &self,
        pipeline: &mut Pipeline,
        step_id: &str,
        tool_id: &str,
        inputs: HashMap<String, Value>,
        outputs: HashMap<String, Value>,
        ctx: &mut ExecutionContext,
        final_action: RefinementAction,
    ) -> StepOutcome {
        if let Some(step) = pipeline.get_step_mut(step_id) {
            step.status = StepStatus::Completed;
            step.error_message = None;
            step.completed_at = Some(chrono::Utc::now());
        }
        ctx.record_outputs(step_id, outputs.clone());
        StepOutcome::Finished {
            result: StepResult::completed(step_id, tool_id, inputs, outputs),
            final_action,
        }
    }

    fn finish_failed(
        &self,
        pipeline: &mut Pipeline,
        step_id: &str,
        tool_id: &str,
        inputs: HashMap<String, Value>,
        message: String,
    ) -> StepOutcome {
        warn!(step = %step_id, error = %message, "step failed");
        if let Some(step) = pipeline.get_step_mut(step_id) {
            step.status = StepStatus::Failed;
            step.error_message = Some(message.clone());
            step.completed_at = Some(chrono::Utc::now());
        }
        StepOutcome::Finished {
            result: StepResult::failed(step_id, tool_id, inputs, message),
            final_action: RefinementAction::Fail,
        }
    }
}
