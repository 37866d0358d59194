// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Reviewer seam
//!
//! The adaptive executor delegates quality judgement to a `Reviewer`. The
//! trait is async so implementations can call out to a vision model or other
//! remote service; `AutoAcceptReviewer` is the trivial local implementation.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

use crate::errors::ToolflowResult;
use crate::pipeline::ToolSchema;
use crate::refinement::{QualityScore, RefinementDecision};

/// Everything a reviewer gets to see about one step attempt
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub step_id: String,
    pub step_name: String,
    pub tool_schema: ToolSchema,
    /// 1-based iteration being reviewed
    pub iteration: u32,
    pub max_iterations: u32,
    pub inputs: HashMap<String, Value>,
    pub outputs: HashMap<String, Value>,
    /// Parameters the reviewer must not propose changes to
    pub locked_params: Vec<String>,
    /// Original input image path, when the run has one
    pub input_image_path: Option<String>,
    /// Caller-supplied context describing the goal of the run
    pub context: Option<String>,
}

/// Judges step outputs and decides how refinement proceeds
#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(&self, request: &ReviewRequest) -> ToolflowResult<RefinementDecision>;
}

/// Accepts every output at full confidence
///
/// Useful as a default and for exercising the refinement plumbing without a
/// model behind it.
pub struct AutoAcceptReviewer;

#[async_trait]
impl Reviewer for AutoAcceptReviewer {
    async fn review(&self, request: &ReviewRequest) -> ToolflowResult<RefinementDecision> {
        Ok(RefinementDecision::accept(
            &request.step_id,
            &request.tool_schema.tool_id,
            request.iteration,
            QualityScore::Acceptable,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refinement::RefinementAction;

    #[tokio::test]
    async fn test_auto_accept() {
        let request = ReviewRequest {
            step_id: "s1".to_string(),
            step_name: "Threshold".to_string(),
            tool_schema: ToolSchema::new("threshold", "Threshold", "Binarize"),
            iteration: 1,
            max_iterations: 3,
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            locked_params: Vec::new(),
            input_image_path: None,
            context: None,
        };

        let decision = AutoAcceptReviewer.review(&request).await.unwrap();
        assert_eq!(decision.action, RefinementAction::Accept);
        assert_eq!(decision.iteration, 1);
    }
}
