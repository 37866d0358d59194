// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Tool registry
//!
//! Catalog mapping a tool id to its declared schema and a callable
//! implementation. Populated at startup; safe for concurrent reads once
//! populated, so share it as `Arc<ToolRegistry>` across executions.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{ToolflowError, ToolflowResult};
use crate::pipeline::ToolSchema;

/// A callable tool implementation
///
/// Takes the resolved input map and returns an output value. Object returns
/// are used as the output map directly; any other value is wrapped by the
/// executor under a single `"result"` key.
pub trait ToolImplementation: Send + Sync {
    fn invoke(&self, inputs: &HashMap<String, Value>) -> ToolflowResult<Value>;
}

impl<F> ToolImplementation for F
where
    F: Fn(&HashMap<String, Value>) -> ToolflowResult<Value> + Send + Sync,
{
    fn invoke(&self, inputs: &HashMap<String, Value>) -> ToolflowResult<Value> {
        self(inputs)
    }
}

struct RegisteredTool {
    schema: ToolSchema,
    implementation: Arc<dyn ToolImplementation>,
}

/// Central registry for all available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, skipping silently if the id is already taken
    pub fn register(
        &mut self,
        schema: ToolSchema,
        implementation: Arc<dyn ToolImplementation>,
    ) -> ToolflowResult<()> {
        self.register_with(schema, implementation, false)
    }

    /// Register a tool, optionally replacing an existing registration
    ///
    /// Schemas with duplicate input or output names are rejected here so the
    /// invariant holds registry-wide.
    pub fn register_with(
        &mut self,
        schema: ToolSchema,
        implementation: Arc<dyn ToolImplementation>,
        replace: bool,
    ) -> ToolflowResult<()> {
        Self::check_unique_ports(&schema)?;

        if self.tools.contains_key(&schema.tool_id) && !replace {
            return Ok(());
        }

        tracing::debug!(tool_id = %schema.tool_id, "registering tool");
        self.tools.insert(
            schema.tool_id.clone(),
            RegisteredTool {
                schema,
                implementation,
            },
        );
        Ok(())
    }

    fn check_unique_ports(schema: &ToolSchema) -> ToolflowResult<()> {
        let mut seen = std::collections::HashSet::new();
        for input in &schema.inputs {
            if !seen.insert(input.name.as_str()) {
                return Err(ToolflowError::DuplicatePort {
                    tool_id: schema.tool_id.clone(),
                    kind: "input",
                    name: input.name.clone(),
                });
            }
        }
        seen.clear();
        for output in &schema.outputs {
            if !seen.insert(output.name.as_str()) {
                return Err(ToolflowError::DuplicatePort {
                    tool_id: schema.tool_id.clone(),
                    kind: "output",
                    name: output.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Remove a tool from the registry
    pub fn unregister(&mut self, tool_id: &str) -> bool {
        self.tools.remove(tool_id).is_some()
    }

    pub fn has(&self, tool_id: &str) -> bool {
        self.tools.contains_key(tool_id)
    }

    /// Get the schema for a registered tool
    pub fn get_schema(&self, tool_id: &str) -> Option<&ToolSchema> {
        self.tools.get(tool_id).map(|t| &t.schema)
    }

    /// Get the implementation for a registered tool
    pub fn get_implementation(&self, tool_id: &str) -> Option<Arc<dyn ToolImplementation>> {
        self.tools.get(tool_id).map(|t| t.implementation.clone())
    }

    /// List registered tools, sorted by id, optionally filtered by category
    pub fn list(&self, category: Option<&str>) -> Vec<&ToolSchema> {
        let mut tools: Vec<&ToolSchema> = self
            .tools
            .values()
            .map(|t| &t.schema)
            .filter(|s| category.map_or(true, |c| s.category == c))
            .collect();
        tools.sort_by(|a, b| a.tool_id.cmp(&b.tool_id));
        tools
    }

    /// All distinct categories, sorted
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = self
            .tools
            .values()
            .map(|t| t.schema.category.clone())
            .collect();
        categories.sort();
        categories.dedup();
        categories
    }

    /// Search tools by name, description, or tags (case-insensitive)
    pub fn search(&self, query: &str, category: Option<&str>) -> Vec<&ToolSchema> {
        let query = query.to_lowercase();
        let mut results: Vec<&ToolSchema> = self
            .tools
            .values()
            .map(|t| &t.schema)
            .filter(|s| category.map_or(true, |c| s.category == c))
            .filter(|s| {
                s.name.to_lowercase().contains(&query)
                    || s.description.to_lowercase().contains(&query)
                    || s.tags.iter().any(|t| t.to_lowercase().contains(&query))
            })
            .collect();
        results.sort_by(|a, b| a.tool_id.cmp(&b.tool_id));
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{DataType, InputSpec, OutputSpec};
    use serde_json::json;

    fn noop() -> Arc<dyn ToolImplementation> {
        Arc::new(|_inputs: &HashMap<String, Value>| Ok(json!({})))
    }

    fn schema(id: &str, category: &str) -> ToolSchema {
        ToolSchema::new(id, id, "test tool").with_category(category)
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = ToolRegistry::new();
        registry
            .register(schema("t", "general").with_tags(&["first"]), noop())
            .unwrap();
        registry
            .register(schema("t", "general").with_tags(&["second"]), noop())
            .unwrap();

        assert_eq!(registry.get_schema("t").unwrap().tags, vec!["first"]);
    }

    #[test]
    fn test_register_with_replace() {
        let mut registry = ToolRegistry::new();
        registry
            .register(schema("t", "general").with_tags(&["first"]), noop())
            .unwrap();
        registry
            .register_with(schema("t", "general").with_tags(&["second"]), noop(), true)
            .unwrap();

        assert_eq!(registry.get_schema("t").unwrap().tags, vec!["second"]);
    }

    #[test]
    fn test_duplicate_input_name_rejected() {
        let mut registry = ToolRegistry::new();
        let bad = schema("dup", "general")
            .with_input(InputSpec::required("x", DataType::Int))
            .with_input(InputSpec::required("x", DataType::Float));

        let err = registry.register(bad, noop()).unwrap_err();
        assert!(matches!(
            err,
            ToolflowError::DuplicatePort { kind: "input", .. }
        ));
    }

    #[test]
    fn test_duplicate_output_name_rejected() {
        let mut registry = ToolRegistry::new();
        let bad = schema("dup", "general")
            .with_output(OutputSpec::new("y", DataType::Image))
            .with_output(OutputSpec::new("y", DataType::Mask));

        assert!(registry.register(bad, noop()).is_err());
    }

    #[test]
    fn test_list_sorted_and_filtered() {
        let mut registry = ToolRegistry::new();
        registry.register(schema("b_tool", "io"), noop()).unwrap();
        registry.register(schema("a_tool", "io"), noop()).unwrap();
        registry
            .register(schema("c_tool", "segmentation"), noop())
            .unwrap();

        let all: Vec<&str> = registry.list(None).iter().map(|s| s.tool_id.as_str()).collect();
        assert_eq!(all, vec!["a_tool", "b_tool", "c_tool"]);

        let io: Vec<&str> = registry
            .list(Some("io"))
            .iter()
            .map(|s| s.tool_id.as_str())
            .collect();
        assert_eq!(io, vec!["a_tool", "b_tool"]);
    }

    #[test]
    fn test_missing_tool_is_none() {
        let registry = ToolRegistry::new();
        assert!(registry.get_schema("nope").is_none());
        assert!(registry.get_implementation("nope").is_none());
        assert!(!registry.has("nope"));
    }

    #[test]
    fn test_search_matches_tags() {
        let mut registry = ToolRegistry::new();
        registry
            .register(schema("blur", "preprocessing").with_tags(&["smoothing"]), noop())
            .unwrap();

        assert_eq!(registry.search("smooth", None).len(), 1);
        assert_eq!(registry.search("smooth", Some("io")).len(), 0);
    }
}
