use super::*;
use anyhow::Result;
use axum::extract::{Path, RawQuery};
use axum::http::StatusCode;
use axum::{response::IntoResponse, routing::post, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
struct CapturedRequest {
    path: String,
    query: Option<String>,
    body: Value,
}

// Canned reply of the mock server
#[derive(Clone)]
struct MockReply {
    status: StatusCode,
    body: Value,
    delay: Option<Duration>,
}

impl MockReply {
    fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
            delay: None,
        }
    }

    fn error(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            body: json!({ "error": { "code": status.as_u16(), "message": message } }),
            delay: None,
        }
    }
}

struct MockServer {
    base_url: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl MockServer {
    fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn client(&self) -> GeminiClient {
        let mut config = GeminiConfig::new("test-key");
        config.model = "gemini-test".to_string();
        config.base_url = self.base_url.clone();
        config.timeout_secs = 1;
        GeminiClient::new(&config).unwrap()
    }
}

// Helper to create a mock server answering every POST with the same reply
async fn create_mock_server(reply: MockReply) -> MockServer {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let captured = requests.clone();

    let app = Router::new().route(
        "/*path",
        post(
            move |Path(path): Path<String>,
                  RawQuery(query): RawQuery,
                  axum::extract::Json(body): axum::extract::Json<Value>| {
                let reply = reply.clone();
                let captured = captured.clone();
                async move {
                    captured.lock().unwrap().push(CapturedRequest { path, query, body });
                    if let Some(delay) = reply.delay {
                        tokio::time::sleep(delay).await;
                    }
                    (reply.status, axum::Json(reply.body)).into_response()
                }
            },
        ),
    );

    let addr = SocketAddr::from(([127, 0, 0, 1], 0));
    let listener = TcpListener::bind(addr).await.unwrap();
    let server_addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockServer {
        base_url: format!("http://{server_addr}/v1beta"),
        requests,
    }
}

fn weather_tool() -> ToolDefinition {
    ToolDefinition {
        name: "get_current_temperature".to_string(),
        description: "Gets the current temperature for a given city".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "city": { "type": "string", "description": "The name of the city" }
            },
            "required": ["city"]
        }),
    }
}

#[tokio::test]
async fn text_response_is_mapped() -> Result<()> {
    let server = create_mock_server(MockReply::ok(json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": "Hi! " }, { "text": "How can I help?" }] },
            "finishReason": "STOP",
            "index": 0
        }],
        "usageMetadata": { "promptTokenCount": 10, "candidatesTokenCount": 8, "totalTokenCount": 18 },
        "modelVersion": "gemini-test"
    })))
    .await;

    let response = server
        .client()
        .send_message(LLMRequest {
            messages: vec![Message::user("Hello")],
            system_prompt: Some("You are a helpful assistant.".to_string()),
            ..Default::default()
        })
        .await?;

    assert_eq!(response.text(), "Hi! How can I help?");
    assert!(!response.has_function_calls());
    assert_eq!(response.finish_reason.as_deref(), Some("STOP"));
    assert_eq!(
        response.usage,
        Usage {
            input_tokens: 10,
            output_tokens: 8,
            total_tokens: 18
        }
    );

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "v1beta/models/gemini-test:generateContent");
    assert_eq!(requests[0].query.as_deref(), Some("key=test-key"));

    let body = &requests[0].body;
    assert_eq!(body["contents"][0]["role"], "user");
    assert_eq!(body["contents"][0]["parts"][0]["text"], "Hello");
    assert_eq!(
        body["system_instruction"]["parts"]["text"],
        "You are a helpful assistant."
    );
    assert!(body.get("tools").is_none());
    assert!(body.get("tool_config").is_none());
    Ok(())
}

#[tokio::test]
async fn function_call_is_mapped_to_tool_use() -> Result<()> {
    let server = create_mock_server(MockReply::ok(json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [{
                    "functionCall": { "name": "get_current_temperature", "args": { "city": "Tokyo" } },
                    "thoughtSignature": "sig-abc"
                }]
            },
            "finishReason": "STOP"
        }],
        "usageMetadata": { "promptTokenCount": 15, "candidatesTokenCount": 12, "totalTokenCount": 27 }
    })))
    .await;

    let response = server
        .client()
        .send_message(LLMRequest {
            messages: vec![Message::user("How warm is it in Tokyo?")],
            tools: Some(vec![weather_tool()]),
            function_calling_mode: Some(FunctionCallingMode::Any),
            ..Default::default()
        })
        .await?;

    assert_eq!(
        response.content,
        vec![ContentBlock::ToolUse {
            id: "call-1".to_string(),
            name: "get_current_temperature".to_string(),
            input: json!({ "city": "Tokyo" }),
            thought_signature: Some("sig-abc".to_string()),
        }]
    );

    let body = &server.requests()[0].body;
    let declarations = &body["tools"][0]["function_declarations"];
    assert_eq!(declarations[0]["name"], "get_current_temperature");
    assert_eq!(declarations[0]["parameters"]["required"][0], "city");
    assert_eq!(body["tool_config"]["function_calling_config"]["mode"], "ANY");
    Ok(())
}

#[tokio::test]
async fn parallel_function_calls_keep_their_order() -> Result<()> {
    let server = create_mock_server(MockReply::ok(json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [
                    { "functionCall": { "name": "get_current_temperature", "args": { "city": "Tokyo" } } },
                    { "functionCall": { "name": "get_population", "args": { "city": "Tokyo" } } }
                ]
            }
        }]
    })))
    .await;

    let response = server
        .client()
        .send_message(LLMRequest {
            messages: vec![Message::user("Tokyo facts please")],
            tools: Some(vec![weather_tool()]),
            ..Default::default()
        })
        .await?;

    let calls: Vec<(&str, &str)> = response
        .function_calls()
        .filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, .. } => Some((id.as_str(), name.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(
        calls,
        vec![
            ("call-1", "get_current_temperature"),
            ("call-2", "get_population")
        ]
    );
    assert_eq!(response.usage, Usage::zero());
    Ok(())
}

#[tokio::test]
async fn conversation_with_results_is_serialized_in_order() -> Result<()> {
    let server = create_mock_server(MockReply::ok(json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": "It is 28°C." }] } }]
    })))
    .await;

    let messages = vec![
        Message::user("How warm is it in Tokyo?"),
        Message::model(vec![ContentBlock::ToolUse {
            id: "call-1".to_string(),
            name: "get_current_temperature".to_string(),
            input: json!({ "city": "Tokyo" }),
            thought_signature: Some("sig-abc".to_string()),
        }]),
        Message::tool(vec![
            ContentBlock::ToolResult {
                tool_use_id: "call-1".to_string(),
                name: "get_current_temperature".to_string(),
                content: json!({ "result": { "temp": 28 } }),
                is_error: None,
            },
            ContentBlock::ToolResult {
                tool_use_id: "call-2".to_string(),
                name: "echo".to_string(),
                content: json!("plain"),
                is_error: None,
            },
        ]),
    ];

    let response = server
        .client()
        .send_message(LLMRequest {
            messages,
            tools: Some(vec![weather_tool()]),
            ..Default::default()
        })
        .await?;
    assert_eq!(response.text(), "It is 28°C.");

    let contents = &server.requests()[0].body["contents"];
    assert_eq!(contents[0]["role"], "user");
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(
        contents[1]["parts"][0]["functionCall"]["name"],
        "get_current_temperature"
    );
    assert_eq!(contents[1]["parts"][0]["thoughtSignature"], "sig-abc");
    assert_eq!(contents[2]["role"], "user");
    assert_eq!(
        contents[2]["parts"][0]["functionResponse"]["response"],
        json!({ "result": { "temp": 28 } })
    );
    // Non-object results are wrapped so the response field stays an object
    assert_eq!(
        contents[2]["parts"][1]["functionResponse"]["response"],
        json!({ "result": "plain" })
    );
    Ok(())
}

#[tokio::test]
async fn builtin_tools_and_code_execution_parts() -> Result<()> {
    let server = create_mock_server(MockReply::ok(json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [
                    { "text": "Let me compute that.", "thought": true },
                    { "executableCode": { "language": "PYTHON", "code": "print(3.14159 * 7 ** 2)" } },
                    { "codeExecutionResult": { "outcome": "OUTCOME_OK", "output": "153.93791\n" } },
                    { "text": "The area is about 153.94." }
                ]
            }
        }]
    })))
    .await;

    let response = server
        .client()
        .send_message(LLMRequest {
            messages: vec![Message::user("Area of a circle with radius 7?")],
            builtin_tools: vec![BuiltinTool::CodeExecution, BuiltinTool::GoogleSearch],
            ..Default::default()
        })
        .await?;

    assert_eq!(
        response.content,
        vec![
            ContentBlock::ExecutableCode {
                language: "PYTHON".to_string(),
                code: "print(3.14159 * 7 ** 2)".to_string(),
            },
            ContentBlock::CodeExecutionResult {
                outcome: "OUTCOME_OK".to_string(),
                output: "153.93791\n".to_string(),
            },
            ContentBlock::Text {
                text: "The area is about 153.94.".to_string(),
            },
        ]
    );

    let tools = &server.requests()[0].body["tools"];
    assert_eq!(tools, &json!([{ "code_execution": {} }, { "google_search": {} }]));
    Ok(())
}

#[tokio::test]
async fn http_errors_are_classified_and_not_retried() {
    let cases = [
        (StatusCode::BAD_REQUEST, "Invalid request"),
        (StatusCode::UNAUTHORIZED, "Authentication failed"),
        (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded"),
        (StatusCode::SERVICE_UNAVAILABLE, "Service error"),
    ];

    for (status, expected_prefix) in cases {
        let server = create_mock_server(MockReply::error(status, "nope")).await;
        let err = server
            .client()
            .send_message(LLMRequest {
                messages: vec![Message::user("Hello")],
                ..Default::default()
            })
            .await
            .unwrap_err();

        let api_error = err.downcast_ref::<ApiError>().expect("ApiError");
        assert!(
            api_error.to_string().starts_with(expected_prefix),
            "{status}: {api_error}"
        );
        assert_eq!(server.requests().len(), 1, "{status} must not be retried");
    }
}

#[tokio::test]
async fn slow_service_hits_the_timeout() {
    let mut reply = MockReply::ok(json!({ "candidates": [] }));
    reply.delay = Some(Duration::from_secs(5));
    let server = create_mock_server(reply).await;

    let err = server
        .client()
        .send_message(LLMRequest {
            messages: vec![Message::user("Hello")],
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ApiError>(),
        Some(ApiError::Timeout(_))
    ));
}

#[tokio::test]
async fn malformed_body_is_reported() {
    let server = create_mock_server(MockReply::ok(json!({ "candidates": "not-a-list" }))).await;

    let err = server
        .client()
        .send_message(LLMRequest {
            messages: vec![Message::user("Hello")],
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ApiError>(),
        Some(ApiError::Unknown(_))
    ));
}

#[test]
fn content_blocks_round_trip_through_serde() {
    let block = ContentBlock::ToolResult {
        tool_use_id: "call-1".to_string(),
        name: "add".to_string(),
        content: json!({ "error": "boom" }),
        is_error: Some(true),
    };
    let value = serde_json::to_value(&block).unwrap();
    assert_eq!(value["type"], "tool_result");
    let back: ContentBlock = serde_json::from_value(value).unwrap();
    assert_eq!(back, block);

    let role: MessageRole = serde_json::from_value(json!("tool")).unwrap();
    assert_eq!(role, MessageRole::Tool);
}

#[test]
fn usage_accumulation_saturates() {
    let mut usage = Usage {
        input_tokens: u32::MAX - 5,
        output_tokens: 10,
        total_tokens: u32::MAX,
    };
    usage.accumulate(&Usage {
        input_tokens: 100,
        output_tokens: 5,
        total_tokens: 1,
    });

    assert_eq!(usage.input_tokens, u32::MAX);
    assert_eq!(usage.output_tokens, 15);
    assert_eq!(usage.total_tokens, u32::MAX);
}
