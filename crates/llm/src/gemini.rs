use crate::{config::GeminiConfig, types::*, utils, ApiError, LLMProvider};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, trace, warn};

#[derive(Debug, Serialize)]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    contents: Vec<GeminiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Parts,
}

#[derive(Debug, Serialize)]
struct Parts {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thought_signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<GeminiFunctionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    executable_code: Option<GeminiExecutableCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code_execution_result: Option<GeminiCodeExecutionResult>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiExecutableCode {
    #[serde(default)]
    language: String,
    code: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiCodeExecutionResult {
    #[serde(default)]
    outcome: String,
    #[serde(default)]
    output: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
    #[allow(dead_code)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

/// Client for the Gemini `generateContent` endpoint
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn get_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn convert_message(message: &Message) -> GeminiMessage {
        // Function responses travel back to the service as user content
        let role = Some(match message.role {
            MessageRole::User | MessageRole::Tool => "user".to_string(),
            MessageRole::Model => "model".to_string(),
        });

        let parts = match &message.content {
            MessageContent::Text(text) => vec![GeminiPart {
                text: Some(text.clone()),
                ..Default::default()
            }],
            MessageContent::Structured(blocks) => blocks.iter().map(Self::convert_block).collect(),
        };

        GeminiMessage { role, parts }
    }

    fn convert_block(block: &ContentBlock) -> GeminiPart {
        match block {
            ContentBlock::Text { text } => GeminiPart {
                text: Some(text.clone()),
                ..Default::default()
            },
            ContentBlock::ToolUse {
                name,
                input,
                thought_signature,
                ..
            } => GeminiPart {
                thought_signature: thought_signature.clone(),
                function_call: Some(GeminiFunctionCall {
                    name: name.clone(),
                    args: input.clone(),
                }),
                ..Default::default()
            },
            ContentBlock::ToolResult { name, content, .. } => GeminiPart {
                function_response: Some(GeminiFunctionResponse {
                    name: name.clone(),
                    // The response field must be a JSON object
                    response: if content.is_object() {
                        content.clone()
                    } else {
                        json!({ "result": content })
                    },
                }),
                ..Default::default()
            },
            ContentBlock::ExecutableCode { language, code } => GeminiPart {
                executable_code: Some(GeminiExecutableCode {
                    language: language.clone(),
                    code: code.clone(),
                }),
                ..Default::default()
            },
            ContentBlock::CodeExecutionResult { outcome, output } => GeminiPart {
                code_execution_result: Some(GeminiCodeExecutionResult {
                    outcome: outcome.clone(),
                    output: output.clone(),
                }),
                ..Default::default()
            },
        }
    }

    fn build_request(request: LLMRequest) -> GeminiRequest {
        let mut tools = Vec::new();

        if let Some(definitions) = request.tools.filter(|tools| !tools.is_empty()) {
            tools.push(json!({
                "function_declarations": definitions.into_iter().map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    })
                }).collect::<Vec<_>>()
            }));
        }

        tools.extend(request.builtin_tools.iter().map(|tool| match tool {
            BuiltinTool::CodeExecution => json!({ "code_execution": {} }),
            BuiltinTool::GoogleSearch => json!({ "google_search": {} }),
            BuiltinTool::UrlContext => json!({ "url_context": {} }),
        }));

        GeminiRequest {
            system_instruction: request
                .system_prompt
                .map(|text| SystemInstruction { parts: Parts { text } }),
            contents: request.messages.iter().map(Self::convert_message).collect(),
            tools,
            tool_config: request.function_calling_mode.map(|mode| {
                json!({
                    "function_calling_config": {
                        "mode": mode.as_wire_str(),
                    }
                })
            }),
        }
    }

    fn convert_response(response: GeminiResponse) -> LLMResponse {
        let candidate = response.candidates.into_iter().next();
        let finish_reason = candidate.as_ref().and_then(|c| c.finish_reason.clone());
        let parts = candidate
            .and_then(|c| c.content)
            .map(|content| content.parts)
            .unwrap_or_default();

        // The service does not identify calls; results are matched by order
        let mut call_counter = 0;
        let content = parts
            .into_iter()
            .filter_map(|part| {
                if let Some(function_call) = part.function_call {
                    call_counter += 1;
                    Some(ContentBlock::ToolUse {
                        id: format!("call-{call_counter}"),
                        name: function_call.name,
                        input: function_call.args,
                        thought_signature: part.thought_signature,
                    })
                } else if let Some(code) = part.executable_code {
                    Some(ContentBlock::ExecutableCode {
                        language: code.language,
                        code: code.code,
                    })
                } else if let Some(result) = part.code_execution_result {
                    Some(ContentBlock::CodeExecutionResult {
                        outcome: result.outcome,
                        output: result.output,
                    })
                } else if let Some(text) = part.text {
                    if part.thought == Some(true) {
                        trace!("Skipping thought summary part");
                        None
                    } else {
                        Some(ContentBlock::Text { text })
                    }
                } else {
                    warn!("Ignoring response part without known content");
                    None
                }
            })
            .collect();

        LLMResponse {
            content,
            usage: response
                .usage_metadata
                .map(|usage| Usage {
                    input_tokens: usage.prompt_token_count,
                    output_tokens: usage.candidates_token_count,
                    total_tokens: usage.total_token_count,
                })
                .unwrap_or_default(),
            finish_reason,
        }
    }

    async fn try_send_request(&self, request: &GeminiRequest) -> Result<LLMResponse> {
        let url = self.get_url();

        trace!(
            "Sending Gemini request to {}:\n{}",
            self.model,
            serde_json::to_string_pretty(request)?
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;

        let response = utils::check_response_error(response).await?;

        let response_text = response.text().await.map_err(ApiError::from_reqwest)?;
        trace!("Gemini response: {}", response_text);

        let gemini_response: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| ApiError::Unknown(format!("Failed to parse response: {e}")))?;

        let response = Self::convert_response(gemini_response);
        debug!(
            "Gemini returned {} part(s), finish reason {:?}, usage {:?}",
            response.content.len(),
            response.finish_reason,
            response.usage
        );

        Ok(response)
    }
}

#[async_trait]
impl LLMProvider for GeminiClient {
    async fn send_message(&self, request: LLMRequest) -> Result<LLMResponse> {
        let gemini_request = Self::build_request(request);
        self.try_send_request(&gemini_request).await
    }
}

/*
Communicating function call results back to the model (including parallel calls).
There is no ID associated with each call/result, only the order.

{ "role": "user",  "parts": [{ "text": "Temperature and population of Tokyo?" }] },
{ "role": "model", "parts": [
    { "functionCall": { "name": "get_current_temperature", "args": { "city": "Tokyo" } } },
    { "functionCall": { "name": "get_population", "args": { "city": "Tokyo" } } } ] },
{ "role": "user",  "parts": [
    { "functionResponse": { "name": "get_current_temperature", "response": { "result": { ... } } } },
    { "functionResponse": { "name": "get_population", "response": { "result": { ... } } } } ] }
*/
