use llm::{ContentBlock, Message, MessageRole};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;

/// A function call suggested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub id: String,
    pub name: String,
    pub args: Map<String, Value>,
    /// Opaque signature that has to be echoed back with the call
    pub thought_signature: Option<String>,
}

impl CallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
            thought_signature: None,
        }
    }

    /// Extract a call request from a `ToolUse` block
    pub fn from_block(block: &ContentBlock) -> Option<Self> {
        let ContentBlock::ToolUse {
            id,
            name,
            input,
            thought_signature,
        } = block
        else {
            return None;
        };

        let args = match input {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                warn!("Arguments for '{name}' are not an object, ignoring: {other}");
                Map::new()
            }
        };

        Some(Self {
            id: id.clone(),
            name: name.clone(),
            args,
            thought_signature: thought_signature.clone(),
        })
    }

    pub fn to_block(&self) -> ContentBlock {
        ContentBlock::ToolUse {
            id: self.id.clone(),
            name: self.name.clone(),
            input: Value::Object(self.args.clone()),
            thought_signature: self.thought_signature.clone(),
        }
    }
}

/// Outcome of invoking an operation
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    Success(Value),
    /// The operation ran but failed; relayed to the model as data
    Error { message: String },
}

impl CallResult {
    pub fn error(message: impl Into<String>) -> Self {
        CallResult::Error {
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CallResult::Error { .. })
    }

    /// Payload sent back as the function response
    pub fn to_response_value(&self) -> Value {
        match self {
            CallResult::Success(value) => json!({ "result": value }),
            CallResult::Error { message } => json!({ "error": message }),
        }
    }

    pub fn to_block(&self, request: &CallRequest) -> ContentBlock {
        ContentBlock::ToolResult {
            tool_use_id: request.id.clone(),
            name: request.name.clone(),
            content: self.to_response_value(),
            is_error: self.is_error().then_some(true),
        }
    }
}

/// Where a conversation stands in the call/result cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Nothing has been said yet
    AwaitingPrompt,
    /// The last turn is user input that has not been answered
    AwaitingRemoteResponse,
    /// The model asked for calls that have no results yet
    CallRequested,
    /// Calls are executing
    Dispatched,
    /// Results were appended and the model has not seen them yet
    ResultAppended,
    /// The model answered without asking for a call
    NoCallRequested,
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::NoCallRequested)
    }
}

/// Ordered, append-only sequence of turns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn push_user_text(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    /// Append a model turn; empty content is dropped since the service rejects empty turns
    pub fn push_model_content(&mut self, content: Vec<ContentBlock>) {
        if content.is_empty() {
            return;
        }
        self.messages.push(Message::model(content));
    }

    pub fn push_tool_results(&mut self, results: Vec<ContentBlock>) {
        if results.is_empty() {
            return;
        }
        self.messages.push(Message::tool(results));
    }

    pub fn state(&self) -> TurnState {
        match self.messages.last() {
            None => TurnState::AwaitingPrompt,
            Some(message) => match message.role {
                MessageRole::User => TurnState::AwaitingRemoteResponse,
                MessageRole::Tool => TurnState::ResultAppended,
                MessageRole::Model if message.has_tool_use() => TurnState::CallRequested,
                MessageRole::Model => TurnState::NoCallRequested,
            },
        }
    }

    /// Calls of a trailing model turn that still wait for results
    pub fn pending_calls(&self) -> Vec<CallRequest> {
        match self.messages.last() {
            Some(message) if message.role == MessageRole::Model => message
                .blocks()
                .iter()
                .filter_map(CallRequest::from_block)
                .collect(),
            _ => Vec::new(),
        }
    }
}
