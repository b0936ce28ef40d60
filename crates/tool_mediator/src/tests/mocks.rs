use crate::tools::{ParamType, ParameterSpec, Tool, ToolSpec};
use anyhow::Result;
use async_trait::async_trait;
use llm::{ContentBlock, LLMProvider, LLMRequest, LLMResponse, Usage};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Provider that replays scripted responses and records every request
#[derive(Default, Clone)]
pub struct MockLLMProvider {
    requests: Arc<Mutex<Vec<LLMRequest>>>,
    responses: Arc<Mutex<Vec<Result<LLMResponse>>>>,
}

impl MockLLMProvider {
    /// Responses are returned in the given order
    pub fn new(mut responses: Vec<Result<LLMResponse>>) -> Self {
        responses.reverse();
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            responses: Arc::new(Mutex::new(responses)),
        }
    }

    pub fn get_requests(&self) -> Vec<LLMRequest> {
        self.requests.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn print_requests(&self) {
        let requests = self.requests.lock().unwrap();
        println!("\nTotal number of requests: {}", requests.len());
        for (i, request) in requests.iter().enumerate() {
            println!("\nRequest {i}:");
            for (j, message) in request.messages.iter().enumerate() {
                println!("  Message {j}:");
                let indented = format!("{message}")
                    .lines()
                    .map(|line| format!("    {line}"))
                    .collect::<Vec<String>>()
                    .join("\n");
                println!("{indented}");
            }
        }
    }
}

#[async_trait]
impl LLMProvider for MockLLMProvider {
    async fn send_message(&self, request: LLMRequest) -> Result<LLMResponse> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop()
            .unwrap_or(Err(anyhow::anyhow!("No more mock responses")))
    }
}

pub fn tool_use(id: &str, name: &str, input: serde_json::Value) -> ContentBlock {
    ContentBlock::ToolUse {
        id: id.to_string(),
        name: name.to_string(),
        input,
        thought_signature: None,
    }
}

// Response suggesting the given calls, in order
pub fn create_call_response(calls: Vec<(&str, serde_json::Value)>) -> LLMResponse {
    LLMResponse {
        content: calls
            .into_iter()
            .enumerate()
            .map(|(i, (name, input))| tool_use(&format!("call-{}", i + 1), name, input))
            .collect(),
        usage: Usage {
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: 15,
        },
        finish_reason: Some("STOP".to_string()),
    }
}

pub fn create_text_response(text: &str) -> LLMResponse {
    LLMResponse {
        content: vec![ContentBlock::Text {
            text: text.to_string(),
        }],
        usage: Usage {
            input_tokens: 20,
            output_tokens: 7,
            total_tokens: 27,
        },
        finish_reason: Some("STOP".to_string()),
    }
}

#[derive(Deserialize)]
pub struct AddInput {
    pub a: i64,
    pub b: i64,
}

#[derive(Serialize)]
pub struct AddOutput {
    pub sum: i64,
}

/// Integer addition that counts its invocations
#[derive(Clone, Default)]
pub struct CountingAddTool {
    pub calls: Arc<AtomicUsize>,
}

impl CountingAddTool {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for CountingAddTool {
    type Input = AddInput;
    type Output = AddOutput;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new("add", "Adds two integers")
            .param(ParameterSpec::required("a", ParamType::Integer, "First summand"))
            .param(ParameterSpec::required("b", ParamType::Integer, "Second summand"))
    }

    async fn execute(&self, input: AddInput) -> Result<AddOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AddOutput {
            sum: input.a + input.b,
        })
    }
}

#[derive(Deserialize)]
pub struct EchoInput {
    pub value: String,
}

/// Echoes its input after a delay and records the order in which calls complete
pub struct DelayedEchoTool {
    pub name: &'static str,
    pub delay: Duration,
    pub completed: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl Tool for DelayedEchoTool {
    type Input = EchoInput;
    type Output = String;

    fn spec(&self) -> ToolSpec {
        ToolSpec::new(self.name, "Echoes the value after a delay")
            .param(ParameterSpec::required("value", ParamType::String, "Value to echo"))
    }

    async fn execute(&self, input: EchoInput) -> Result<String> {
        tokio::time::sleep(self.delay).await;
        self.completed.lock().unwrap().push(self.name);
        Ok(format!("{}: {}", self.name, input.value))
    }
}
