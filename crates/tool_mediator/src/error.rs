use crate::tools::ParamType;
use serde_json::Value;
use thiserror::Error;

/// Failures surfaced by the mediator
///
/// Execution failures of a registered operation are not errors at this level. They are
/// captured as [`crate::CallResult::Error`] and relayed to the model as data.
#[derive(Error, Debug)]
pub enum MediatorError {
    #[error("Operation already registered: {0}")]
    DuplicateName(String),

    #[error("Invalid operation schema: {0}")]
    InvalidSchema(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Missing required argument(s) for {operation}: {}", .missing.join(", "))]
    MissingArguments {
        operation: String,
        missing: Vec<String>,
    },

    #[error("Invalid argument '{parameter}' for {operation}: expected {expected}, got {value}")]
    InvalidArgument {
        operation: String,
        parameter: String,
        expected: ParamType,
        value: Value,
    },

    #[error("Remote service error: {0}")]
    RemoteService(#[source] anyhow::Error),

    #[error("No final response after {0} iteration(s)")]
    IterationLimit(usize),

    #[error("Conversation has no turns to submit")]
    EmptyConversation,
}

impl MediatorError {
    /// The classified service error, if this failure came from the remote service
    pub fn api_error(&self) -> Option<&llm::ApiError> {
        match self {
            MediatorError::RemoteService(error) => error.downcast_ref::<llm::ApiError>(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, MediatorError>;
