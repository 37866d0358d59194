// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Parameter adjustment
//!
//! Applies reviewer-proposed parameter changes to a step's bindings while
//! enforcing the schema constraints and the locked-parameter rules.

use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::pipeline::{DataType, InputSpec, PipelineStep, StepInput, ToolSchema};
use crate::refinement::ParameterChange;

/// Validates and applies parameter changes between refinement iterations
///
/// Locked parameters are never changed: required inputs without a default are
/// always locked (the user had to supply them deliberately), as is any static
/// binding carrying the `locked` flag. The round-number heuristic that older
/// configurations relied on is available behind `with_legacy_heuristic` and
/// off by default.
pub struct ParameterOptimizer {
    legacy_heuristic: bool,
    adjustments: Vec<ParameterChange>,
}

impl ParameterOptimizer {
    pub fn new() -> Self {
        Self {
            legacy_heuristic: false,
            adjustments: Vec::new(),
        }
    }

    /// Also treat round-looking static numbers as user-specified
    pub fn with_legacy_heuristic(mut self) -> Self {
        self.legacy_heuristic = true;
        self
    }

    /// All changes applied so far, across steps
    pub fn adjustment_history(&self) -> &[ParameterChange] {
        &self.adjustments
    }

    /// Names of the step's parameters that must not be adjusted
    pub fn identify_locked_params(&self, step: &PipelineStep, schema: &ToolSchema) -> Vec<String> {
        let mut locked = Vec::new();

        for spec in &schema.inputs {
            if spec.required && spec.default.is_none() {
                locked.push(spec.name.clone());
                continue;
            }

            match step.inputs.get(&spec.name) {
                Some(StepInput::Static { locked: true, .. }) => locked.push(spec.name.clone()),
                Some(StepInput::Static { value, locked: false }) if self.legacy_heuristic => {
                    if Self::looks_user_specified(value) {
                        locked.push(spec.name.clone());
                    }
                }
                _ => {}
            }
        }

        locked
    }

    /// Heuristic from before the explicit `locked` flag existed: round
    /// numbers and short strings were assumed deliberate
    fn looks_user_specified(value: &Value) -> bool {
        match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i % 5 == 0
                } else if let Some(f) = n.as_f64() {
                    (f * 10.0).fract().abs() < f64::EPSILON
                } else {
                    false
                }
            }
            Value::String(s) => s.len() <= 16,
            Value::Bool(_) => true,
            _ => false,
        }
    }

    /// Check a single proposed change against the schema and locked set
    ///
    /// Returns the coerced value to apply, or a rejection reason.
    pub fn validate_change(
        &self,
        change: &ParameterChange,
        schema: &ToolSchema,
        locked: &[String],
    ) -> Result<Value, String> {
        if locked.iter().any(|l| l == &change.name) {
            return Err(format!("parameter '{}' is locked", change.name));
        }

        let Some(spec) = schema.get_input(&change.name) else {
            return Err(format!(
                "tool '{}' has no parameter '{}'",
                schema.tool_id, change.name
            ));
        };

        let value = Self::coerce(&change.new_value, spec.data_type)
            .ok_or_else(|| {
                format!(
                    "value {} is not a valid {}",
                    change.new_value, spec.data_type
                )
            })?;

        if let Some(n) = value.as_f64() {
            if let Some(min) = spec.min_value {
                if n < min {
                    return Err(format!("{} is below the minimum {min}", change.name));
                }
            }
            if let Some(max) = spec.max_value {
                if n > max {
                    return Err(format!("{} is above the maximum {max}", change.name));
                }
            }
        }

        if let Some(choices) = &spec.choices {
            let Some(s) = value.as_str() else {
                return Err(format!("{} must be one of {:?}", change.name, choices));
            };
            if !choices.iter().any(|c| c == s) {
                return Err(format!(
                    "'{s}' is not an allowed value for {} ({:?})",
                    change.name, choices
                ));
            }
        }

        Ok(value)
    }

    fn coerce(value: &Value, target: DataType) -> Option<Value> {
        match target {
            DataType::Int => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
                // Whole-valued floats are common in model output
                Value::Number(n) => n.as_f64().and_then(|f| {
                    (f.fract() == 0.0).then(|| Value::from(f as i64))
                }),
                _ => None,
            },
            DataType::Float => value.as_f64().map(Value::from),
            DataType::Bool => value.as_bool().map(Value::from),
            DataType::String | DataType::Instructions => {
                value.as_str().map(|s| Value::from(s.to_string()))
            }
            _ => Some(value.clone()),
        }
    }

    /// Apply the valid subset of proposed changes to a step's bindings
    ///
    /// Invalid changes are skipped with a debug log; the step keeps its
    /// current binding for those parameters. Returns the changes actually
    /// applied.
    pub fn apply_changes(
        &mut self,
        step: &mut PipelineStep,
        schema: &ToolSchema,
        changes: &[ParameterChange],
        current_inputs: &HashMap<String, Value>,
    ) -> Vec<ParameterChange> {
        let locked = self.identify_locked_params(step, schema);
        let mut applied = Vec::new();

        for change in changes {
            match self.validate_change(change, schema, &locked) {
                Ok(value) => {
                    let recorded = ParameterChange::new(
                        &change.name,
                        current_inputs.get(&change.name).cloned(),
                        value.clone(),
                        &change.reason,
                    );
                    step.inputs
                        .insert(change.name.clone(), StepInput::value(value));
                    self.adjustments.push(recorded.clone());
                    applied.push(recorded);
                }
                Err(reason) => {
                    debug!(parameter = %change.name, %reason, "rejected parameter change");
                }
            }
        }

        applied
    }

    /// Propose values to try for a numeric parameter, spread within bounds
    pub fn suggest_alternative_values(&self, spec: &InputSpec) -> Vec<Value> {
        let (Some(min), Some(max)) = (spec.min_value, spec.max_value) else {
            return Vec::new();
        };

        let candidates = [0.25, 0.5, 0.75].map(|t| min + (max - min) * t);
        match spec.data_type {
            DataType::Int => candidates.iter().map(|v| Value::from(*v as i64)).collect(),
            DataType::Float => candidates.iter().map(|v| Value::from(*v)).collect(),
            _ => Vec::new(),
        }
    }
}

impl Default for ParameterOptimizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn threshold_schema() -> ToolSchema {
        ToolSchema::new("threshold", "Threshold", "Binarize")
            .with_input(InputSpec::required("image", DataType::Image))
            .with_input(
                InputSpec::optional("threshold_value", DataType::Int, json!(127))
                    .with_bounds(0.0, 255.0),
            )
            .with_input(
                InputSpec::optional("method", DataType::String, json!("otsu"))
                    .with_choices(&["otsu", "adaptive", "binary"]),
            )
    }

    fn step() -> PipelineStep {
        PipelineStep::new("Threshold", "threshold")
            .with_id("t")
            .with_input("image", StepInput::from_step("load", "image"))
            .with_input("threshold_value", StepInput::value(json!(100)))
    }

    #[test]
    fn test_required_without_default_is_locked() {
        let optimizer = ParameterOptimizer::new();
        let locked = optimizer.identify_locked_params(&step(), &threshold_schema());
        assert_eq!(locked, vec!["image"]);
    }

    #[test]
    fn test_locked_flag_respected() {
        let optimizer = ParameterOptimizer::new();
        let s = step().with_input("method", StepInput::locked(json!("binary")));

        let locked = optimizer.identify_locked_params(&s, &threshold_schema());
        assert!(locked.contains(&"method".to_string()));
    }

    #[test]
    fn test_locked_change_never_applied() {
        let mut optimizer = ParameterOptimizer::new();
        let schema = threshold_schema();
        let mut s = step().with_input("method", StepInput::locked(json!("binary")));

        let applied = optimizer.apply_changes(
            &mut s,
            &schema,
            &[ParameterChange::new("method", None, json!("otsu"), "try otsu")],
            &HashMap::new(),
        );

        assert!(applied.is_empty());
        assert_eq!(s.inputs["method"], StepInput::locked(json!("binary")));
    }

    #[test]
    fn test_bounds_rejected() {
        let optimizer = ParameterOptimizer::new();
        let err = optimizer
            .validate_change(
                &ParameterChange::new("threshold_value", None, json!(300), ""),
                &threshold_schema(),
                &[],
            )
            .unwrap_err();
        assert!(err.contains("above the maximum"));
    }

    #[test]
    fn test_choices_rejected() {
        let optimizer = ParameterOptimizer::new();
        assert!(optimizer
            .validate_change(
                &ParameterChange::new("method", None, json!("magic"), ""),
                &threshold_schema(),
                &[],
            )
            .is_err());
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let optimizer = ParameterOptimizer::new();
        assert!(optimizer
            .validate_change(
                &ParameterChange::new("nope", None, json!(1), ""),
                &threshold_schema(),
                &[],
            )
            .is_err());
    }

    #[test]
    fn test_whole_float_coerced_to_int() {
        let optimizer = ParameterOptimizer::new();
        let value = optimizer
            .validate_change(
                &ParameterChange::new("threshold_value", None, json!(90.0), ""),
                &threshold_schema(),
                &[],
            )
            .unwrap();
        assert_eq!(value, json!(90));
    }

    #[test]
    fn test_apply_records_old_value() {
        let mut optimizer = ParameterOptimizer::new();
        let schema = threshold_schema();
        let mut s = step();
        let current = HashMap::from([("threshold_value".to_string(), json!(100))]);

        let applied = optimizer.apply_changes(
            &mut s,
            &schema,
            &[ParameterChange::new("threshold_value", None, json!(80), "too bright")],
            &current,
        );

        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].old_value, Some(json!(100)));
        assert_eq!(s.inputs["threshold_value"], StepInput::value(json!(80)));
        assert_eq!(optimizer.adjustment_history().len(), 1);
    }

    #[test]
    fn test_legacy_heuristic_locks_round_numbers() {
        let optimizer = ParameterOptimizer::new().with_legacy_heuristic();
        let s = step(); // threshold_value = 100, divisible by 5

        let locked = optimizer.identify_locked_params(&s, &threshold_schema());
        assert!(locked.contains(&"threshold_value".to_string()));

        // Off by default
        let plain = ParameterOptimizer::new();
        let locked = plain.identify_locked_params(&s, &threshold_schema());
        assert!(!locked.contains(&"threshold_value".to_string()));
    }

    #[test]
    fn test_suggest_alternatives_within_bounds() {
        let optimizer = ParameterOptimizer::new();
        let spec = InputSpec::optional("threshold_value", DataType::Int, json!(127))
            .with_bounds(0.0, 255.0);

        let suggestions = optimizer.suggest_alternative_values(&spec);
        assert_eq!(suggestions.len(), 3);
        for v in &suggestions {
            let n = v.as_i64().unwrap();
            assert!((0..=255).contains(&n));
        }
    }
}
