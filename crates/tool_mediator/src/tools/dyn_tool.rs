use super::spec::ToolSpec;
use super::tool::Tool;
use anyhow::Result;
use serde_json::{Map, Value};

/// Type-erased operation interface for storing heterogeneous operations in the registry
#[async_trait::async_trait]
pub trait DynTool: Send + Sync + 'static {
    /// Get the declaration for this operation
    fn spec(&self) -> ToolSpec;

    /// Invoke the operation with already validated JSON arguments
    async fn invoke(&self, args: Map<String, Value>) -> Result<Value>;
}

/// Automatic implementation of DynTool for any type that implements Tool
#[async_trait::async_trait]
impl<T: Tool> DynTool for T {
    fn spec(&self) -> ToolSpec {
        Tool::spec(self)
    }

    async fn invoke(&self, args: Map<String, Value>) -> Result<Value> {
        let input: T::Input = serde_json::from_value(Value::Object(args))
            .map_err(|e| anyhow::anyhow!("Failed to parse parameters: {e}"))?;

        let output = self.execute(input).await?;

        serde_json::to_value(output).map_err(|e| anyhow::anyhow!("Failed to serialize output: {e}"))
    }
}

type BoxedFn = Box<dyn Fn(Map<String, Value>) -> Result<Value> + Send + Sync>;

/// Operation backed by a plain synchronous closure over JSON arguments
pub struct FnTool {
    spec: ToolSpec,
    func: BoxedFn,
}

impl FnTool {
    pub fn new<F>(spec: ToolSpec, func: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            spec,
            func: Box::new(func),
        }
    }
}

#[async_trait::async_trait]
impl DynTool for FnTool {
    fn spec(&self) -> ToolSpec {
        self.spec.clone()
    }

    async fn invoke(&self, args: Map<String, Value>) -> Result<Value> {
        (self.func)(args)
    }
}
