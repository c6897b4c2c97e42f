//! Capability catalog
//!
//! A catalog is built in one step from a discovery response and never
//! mutated afterwards. Re-discovery builds a new catalog and swaps it in.

use serde::Serialize;
use serde_json::{json, Value};

/// A tool as reported by the MCP server, before defaults are applied
#[derive(Debug, Clone)]
pub struct RemoteTool {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Option<Value>,
}

/// A discovered tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    /// Tool name, unique within one catalog
    pub name: String,
    /// Human-readable description (empty if the server gave none)
    pub description: String,
    /// Input schema, passed through verbatim
    pub input_schema: Value,
}

/// Schema used when the server omits one: an object with no properties
pub fn empty_object_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

impl From<RemoteTool> for ToolDescriptor {
    fn from(tool: RemoteTool) -> Self {
        Self {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            input_schema: tool.input_schema.unwrap_or_else(empty_object_schema),
        }
    }
}

/// Ordered, immutable snapshot of discovered tools
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tools: Vec<ToolDescriptor>,
}

impl Catalog {
    /// Build a catalog from a discovery response, preserving order
    ///
    /// When a name repeats, the first occurrence wins and later ones are
    /// dropped with a warning.
    pub fn from_remote(tools: Vec<RemoteTool>) -> Self {
        let mut descriptors: Vec<ToolDescriptor> = Vec::with_capacity(tools.len());

        for tool in tools {
            if descriptors.iter().any(|d| d.name == tool.name) {
                tracing::warn!(tool = %tool.name, "Duplicate tool name in discovery response, keeping first");
                continue;
            }
            descriptors.push(tool.into());
        }

        Self { tools: descriptors }
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
