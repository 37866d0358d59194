// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 toolflow contributors

//! Tool schemas
//!
//! A tool schema is the contract between a registered implementation and the
//! pipeline system: named, typed inputs (with defaults and constraints) and
//! named, typed outputs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Data types a tool input or output can carry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// File path to an image
    Image,
    /// Binary mask image path
    Mask,
    Int,
    Float,
    String,
    Bool,
    List,
    /// Dictionary/JSON object
    Map,
    /// Generic file path
    Path,
    /// Dense numeric array, stored as a file
    Array,
    /// Measurement results
    Measurements,
    /// Parameter dictionary
    Parameters,
    /// Text instructions for agent-backed tools
    Instructions,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Image => "image",
            Self::Mask => "mask",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Bool => "bool",
            Self::List => "list",
            Self::Map => "map",
            Self::Path => "path",
            Self::Array => "array",
            Self::Measurements => "measurements",
            Self::Parameters => "parameters",
            Self::Instructions => "instructions",
        };
        write!(f, "{s}")
    }
}

/// Schema for a single tool input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSpec {
    /// Input parameter name
    pub name: String,

    /// Data type of the input
    #[serde(rename = "type")]
    pub data_type: DataType,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Whether the input must be bound (or defaulted) for execution
    #[serde(default = "default_true")]
    pub required: bool,

    /// Default value applied when the input is unbound
    #[serde(default)]
    pub default: Option<Value>,

    /// Minimum value for numeric inputs
    #[serde(default)]
    pub min_value: Option<f64>,

    /// Maximum value for numeric inputs
    #[serde(default)]
    pub max_value: Option<f64>,

    /// Allowed values for string/enum inputs
    #[serde(default)]
    pub choices: Option<Vec<String>>,
}

fn default_true() -> bool {
    true
}

impl InputSpec {
    /// Required input with no default
    pub fn required(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            description: String::new(),
            required: true,
            default: None,
            min_value: None,
            max_value: None,
            choices: None,
        }
    }

    /// Optional input with a default value
    pub fn optional(name: &str, data_type: DataType, default: Value) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            description: String::new(),
            required: false,
            default: Some(default),
            min_value: None,
            max_value: None,
            choices: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }

    pub fn with_choices(mut self, choices: &[&str]) -> Self {
        self.choices = Some(choices.iter().map(|c| c.to_string()).collect());
        self
    }
}

/// Schema for a single tool output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Output name
    pub name: String,

    /// Data type of the output
    #[serde(rename = "type")]
    pub data_type: DataType,

    /// Human-readable description
    #[serde(default)]
    pub description: String,
}

impl OutputSpec {
    pub fn new(name: &str, data_type: DataType) -> Self {
        Self {
            name: name.to_string(),
            data_type,
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }
}

/// Complete schema for a registered tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub tool_id: String,

    /// Human-readable tool name
    pub name: String,

    /// What the tool does
    #[serde(default)]
    pub description: String,

    /// Category for organization (e.g. "io", "segmentation")
    #[serde(default = "default_category")]
    pub category: String,

    /// Ordered input parameters
    #[serde(default)]
    pub inputs: Vec<InputSpec>,

    /// Ordered output values
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,

    /// Tool version
    #[serde(default = "default_version")]
    pub version: String,

    /// Searchable tags
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_category() -> String {
    "general".to_string()
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl ToolSchema {
    pub fn new(tool_id: &str, name: &str, description: &str) -> Self {
        Self {
            tool_id: tool_id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            category: default_category(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            version: default_version(),
            tags: Vec::new(),
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_string();
        self
    }

    pub fn with_input(mut self, input: InputSpec) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_output(mut self, output: OutputSpec) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Get an input spec by name
    pub fn get_input(&self, name: &str) -> Option<&InputSpec> {
        self.inputs.iter().find(|i| i.name == name)
    }

    /// Get an output spec by name
    pub fn get_output(&self, name: &str) -> Option<&OutputSpec> {
        self.outputs.iter().find(|o| o.name == name)
    }

    /// Whether any declared output is image-like (image or mask)
    pub fn has_image_output(&self) -> bool {
        self.outputs
            .iter()
            .any(|o| matches!(o.data_type, DataType::Image | DataType::Mask))
    }

    /// Generate a human-readable description of the tool contract
    pub fn describe(&self) -> String {
        let mut lines = vec![
            format!("Tool: {} ({})", self.name, self.tool_id),
            format!("Description: {}", self.description),
            format!("Category: {}", self.category),
            "Inputs:".to_string(),
        ];
        for inp in &self.inputs {
            let req = if inp.required {
                "required".to_string()
            } else {
                format!("optional, default={:?}", inp.default)
            };
            lines.push(format!(
                "  - {} ({}): {} [{}]",
                inp.name, inp.data_type, inp.description, req
            ));
        }
        lines.push("Outputs:".to_string());
        for out in &self.outputs {
            lines.push(format!(
                "  - {} ({}): {}",
                out.name, out.data_type, out.description
            ));
        }
        lines.join("\n")
    }
}
