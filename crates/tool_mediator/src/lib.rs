//! Mediates function calling between a hosted reasoning service and local operations
//!
//! Operations are declared with a [`ToolSpec`] and registered with a [`ToolMediator`].
//! The mediator presents the declarations to the service, extracts the calls it suggests,
//! validates and runs them, and folds the results back into the [`Conversation`] until
//! the service produces a final answer.

pub mod conversation;
pub mod error;
pub mod mediator;
pub mod tools;

#[cfg(test)]
mod tests;

pub use conversation::{CallRequest, CallResult, Conversation, TurnState};
pub use error::{MediatorError, Result};
pub use mediator::{FinalResponse, MediatorConfig, ToolMediator};
pub use tools::{DynTool, FnTool, ParamType, ParameterSpec, Tool, ToolRegistry, ToolSpec};
