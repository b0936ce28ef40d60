use std::collections::HashMap;

use super::dyn_tool::{DynTool, FnTool};
use super::spec::ToolSpec;
use super::tool::Tool;
use crate::error::{MediatorError, Result};
use llm::ToolDefinition;
use serde_json::{Map, Value};
use tracing::debug;

/// A registered operation together with its declaration
pub struct RegisteredTool {
    spec: ToolSpec,
    tool: Box<dyn DynTool>,
}

impl RegisteredTool {
    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    pub fn tool(&self) -> &dyn DynTool {
        self.tool.as_ref()
    }
}

/// Registry of the operations the model may request
///
/// Declarations are offered to the model in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type-erased operation
    pub fn register(&mut self, tool: Box<dyn DynTool>) -> Result<()> {
        let spec = tool.spec();
        spec.validate()?;

        if self.tools.contains_key(&spec.name) {
            return Err(MediatorError::DuplicateName(spec.name));
        }

        debug!(
            "Registered operation '{}' with {} parameter(s)",
            spec.name,
            spec.parameters.len()
        );
        self.order.push(spec.name.clone());
        self.tools
            .insert(spec.name.clone(), RegisteredTool { spec, tool });
        Ok(())
    }

    /// Register a typed operation
    pub fn register_tool<T: Tool>(&mut self, tool: T) -> Result<()> {
        self.register(Box::new(tool))
    }

    /// Register a synchronous closure under the given declaration
    pub fn register_fn<F>(&mut self, spec: ToolSpec, func: F) -> Result<()>
    where
        F: Fn(Map<String, Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.register(Box::new(FnTool::new(spec, func)))
    }

    /// Get an operation by name
    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Function declarations to offer the model
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|registered| registered.spec.to_definition())
            .collect()
    }
}
