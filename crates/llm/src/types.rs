use serde::{Deserialize, Serialize};

/// Tracks token usage for a request/response pair
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
pub struct Usage {
    /// Number of tokens in the input (prompt)
    pub input_tokens: u32,
    /// Number of tokens in the output (candidates)
    pub output_tokens: u32,
    /// Total as reported by the service (may include thinking tokens)
    #[serde(default)]
    pub total_tokens: u32,
}

impl Usage {
    pub fn zero() -> Self {
        Usage::default()
    }

    /// Add the usage of another request to this one, saturating at `u32::MAX`
    pub fn accumulate(&mut self, other: &Usage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
        self.total_tokens = self.total_tokens.saturating_add(other.total_tokens);
    }
}

/// Declaration of a callable function as presented to the model
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Controls whether the model may, must or must not suggest function calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionCallingMode {
    /// The model decides between text and a function call
    #[default]
    Auto,
    /// The model is forced to suggest a function call
    Any,
    /// Function calling is disabled, declarations are still sent
    None,
}

impl FunctionCallingMode {
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            FunctionCallingMode::Auto => "AUTO",
            FunctionCallingMode::Any => "ANY",
            FunctionCallingMode::None => "NONE",
        }
    }
}

/// Tools executed on the service side rather than locally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuiltinTool {
    CodeExecution,
    GoogleSearch,
    UrlContext,
}

/// Generic request structure that can be mapped to different providers
#[derive(Debug, Clone, Default)]
pub struct LLMRequest {
    pub messages: Vec<Message>,
    pub system_prompt: Option<String>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub builtin_tools: Vec<BuiltinTool>,
    pub function_calling_mode: Option<FunctionCallingMode>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: MessageContent,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn model(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: MessageRole::Model,
            content: MessageContent::Structured(blocks),
        }
    }

    pub fn tool(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: MessageContent::Structured(blocks),
        }
    }

    /// Content blocks of this message, with plain text presented as a single text block
    pub fn blocks(&self) -> Vec<ContentBlock> {
        match &self.content {
            MessageContent::Text(text) => vec![ContentBlock::Text { text: text.clone() }],
            MessageContent::Structured(blocks) => blocks.clone(),
        }
    }

    pub fn has_tool_use(&self) -> bool {
        matches!(&self.content, MessageContent::Structured(blocks)
            if blocks.iter().any(|b| matches!(b, ContentBlock::ToolUse { .. })))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Model,
    /// Results of locally executed functions
    Tool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Structured(Vec<ContentBlock>),
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
        /// Opaque signature the service expects to see echoed with the call
        #[serde(skip_serializing_if = "Option::is_none", default)]
        thought_signature: Option<String>,
    },

    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        name: String,
        content: serde_json::Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },

    /// Code generated by the service's code execution tool
    #[serde(rename = "executable_code")]
    ExecutableCode { language: String, code: String },

    /// Output of running generated code on the service side
    #[serde(rename = "code_execution_result")]
    CodeExecutionResult { outcome: String, output: String },
}

/// Generic response structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct LLMResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl LLMResponse {
    /// Concatenated text of all text parts
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// All function call suggestions in the order the service presented them
    pub fn function_calls(&self) -> impl Iterator<Item = &ContentBlock> {
        self.content
            .iter()
            .filter(|block| matches!(block, ContentBlock::ToolUse { .. }))
    }

    pub fn has_function_calls(&self) -> bool {
        self.function_calls().next().is_some()
    }
}

/// Common error types for all LLM providers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ApiError {
    pub fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ApiError::Timeout(error.to_string())
        } else {
            ApiError::NetworkError(error.to_string())
        }
    }
}
