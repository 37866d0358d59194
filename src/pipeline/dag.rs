// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! DAG (Directed Acyclic Graph) builder for step dependencies
//!
//! Treats every `FromStep` binding as a directed edge from the source step to
//! the consuming step, providing cycle detection and topological ordering.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};

use crate::errors::ToolflowError;
use crate::pipeline::Pipeline;

/// Builder for step dependency DAGs
pub struct DagBuilder {
    graph: DiGraph<usize, ()>,
    id_to_index: HashMap<String, NodeIndex>,
    index_to_id: HashMap<NodeIndex, String>,
}

impl DagBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            id_to_index: HashMap::new(),
            index_to_id: HashMap::new(),
        }
    }

    /// Build a DAG from a pipeline's `FromStep` bindings
    ///
    /// Bindings that reference a step id not present in the pipeline are
    /// skipped here; the validator reports them as input errors.
    pub fn build(pipeline: &Pipeline) -> Self {
        let mut builder = Self::new();

        for (idx, step) in pipeline.steps.iter().enumerate() {
            let node = builder.graph.add_node(idx);
            builder.id_to_index.insert(step.step_id.clone(), node);
            builder.index_to_id.insert(node, step.step_id.clone());
        }

        for step in &pipeline.steps {
            let step_node = builder.id_to_index[&step.step_id];

            for input in step.inputs.values() {
                if let Some(source_id) = input.references_step() {
                    if let Some(source_node) = builder.id_to_index.get(source_id) {
                        if !builder.graph.contains_edge(*source_node, step_node) {
                            builder.graph.add_edge(*source_node, step_node, ());
                        }
                    }
                }
            }
        }

        builder
    }

    /// Validate that the graph is acyclic
    pub fn validate_acyclic(&self) -> Result<(), ToolflowError> {
        match toposort(&self.graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => Err(ToolflowError::CircularDependency {
                steps: self.find_cycle_members(cycle.node_id()),
            }),
        }
    }

    /// Step ids on the cycle through the reported node
    ///
    /// Walks depth-first from the node keeping the current path; the path at
    /// the moment an edge leads back to the node is exactly the cycle, so
    /// steps on dead-end branches never appear in the result.
    fn find_cycle_members(&self, start: NodeIndex) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        if self.walk_cycle(start, start, &mut visited, &mut path) {
            path.iter().map(|n| self.index_to_id[n].clone()).collect()
        } else {
            vec![self.index_to_id[&start].clone()]
        }
    }

    fn walk_cycle(
        &self,
        node: NodeIndex,
        target: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        path: &mut Vec<NodeIndex>,
    ) -> bool {
        visited.insert(node);
        path.push(node);
        for next in self.graph.neighbors(node) {
            if next == target {
                return true;
            }
            if !visited.contains(&next) && self.walk_cycle(next, target, visited, path) {
                return true;
            }
        }
        path.pop();
        false
    }

    /// Get topologically sorted step ids
    pub fn topological_order(&self) -> Result<Vec<String>, ToolflowError> {
        toposort(&self.graph, None)
            .map(|nodes| {
                nodes
                    .into_iter()
                    .map(|n| self.index_to_id[&n].clone())
                    .collect()
            })
            .map_err(|cycle| ToolflowError::CircularDependency {
                steps: self.find_cycle_members(cycle.node_id()),
            })
    }

    /// Step ids that must run before the given step
    pub fn dependencies(&self, step_id: &str) -> Option<Vec<String>> {
        let node = self.id_to_index.get(step_id)?;
        Some(
            self.graph
                .neighbors_directed(*node, petgraph::Direction::Incoming)
                .map(|n| self.index_to_id[&n].clone())
                .collect(),
        )
    }

    /// Step ids that consume the given step's outputs
    pub fn dependents(&self, step_id: &str) -> Option<Vec<String>> {
        let node = self.id_to_index.get(step_id)?;
        Some(
            self.graph
                .neighbors_directed(*node, petgraph::Direction::Outgoing)
                .map(|n| self.index_to_id[&n].clone())
                .collect(),
        )
    }

    /// Generate a Mermaid diagram of the DAG
    pub fn to_mermaid(&self, pipeline: &Pipeline) -> String {
        let mut out = String::from("graph TD\n");

        for step in &pipeline.steps {
            out.push_str(&format!("    {}[{}]\n", step.step_id, step.name));
        }

        for edge in self.graph.edge_indices() {
            if let Some((from, to)) = self.graph.edge_endpoints(edge) {
                out.push_str(&format!(
                    "    {} --> {}\n",
                    self.index_to_id[&from], self.index_to_id[&to]
                ));
            }
        }

        out
    }

    /// Generate a DOT diagram of the DAG
    pub fn to_dot(&self, pipeline: &Pipeline) -> String {
        let mut out = String::from("digraph pipeline {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for edge in self.graph.edge_indices() {
            if let Some((from, to)) = self.graph.edge_endpoints(edge) {
                out.push_str(&format!(
                    "    \"{}\" -> \"{}\";\n",
                    self.index_to_id[&from], self.index_to_id[&to]
                ));
            }
        }

        for step in &pipeline.steps {
            let node = self.id_to_index[&step.step_id];
            if self.graph.neighbors_undirected(node).count() == 0 {
                out.push_str(&format!("    \"{}\";\n", step.step_id));
            }
        }

        out.push_str("}\n");
        out
    }

    /// Generate a text listing of the execution order
    pub fn to_text(&self, pipeline: &Pipeline) -> Result<String, ToolflowError> {
        let order = self.topological_order()?;
        let mut out = String::new();

        for (i, step_id) in order.iter().enumerate() {
            let Some(step) = pipeline.get_step(step_id) else {
                continue;
            };
            let deps = self.dependencies(step_id).unwrap_or_default();

            out.push_str(&format!("{}. {} ({})", i + 1, step.name, step.tool_id));
            if !deps.is_empty() {
                out.push_str(&format!(" [depends: {}]", deps.join(", ")));
            }
            out.push('\n');
        }

        Ok(out)
    }
}

impl Default for DagBuilder {
    fn default() -> Self {
        Self::new()
    }
}
