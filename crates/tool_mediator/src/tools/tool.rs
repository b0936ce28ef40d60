use super::spec::ToolSpec;
use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Core trait for operations, defining the execution interface
///
/// Input is deserialized from the validated arguments of a call request. The output
/// is serialized back to JSON and relayed to the model unmodified.
#[async_trait::async_trait]
pub trait Tool: Send + Sync + 'static {
    /// Input type for this operation, must be deserializable from JSON
    type Input: DeserializeOwned + Send;

    /// Output type for this operation, must be serializable to JSON
    type Output: Serialize + Send;

    /// Get the declaration for this operation
    fn spec(&self) -> ToolSpec;

    /// Execute the operation with the given input
    ///
    /// An error is reported back to the model as an error result.
    async fn execute(&self, input: Self::Input) -> Result<Self::Output>;
}
