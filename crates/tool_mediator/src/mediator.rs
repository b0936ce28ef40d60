use crate::conversation::{CallRequest, CallResult, Conversation, TurnState};
use crate::error::{MediatorError, Result};
use crate::tools::{DynTool, RegisteredTool, Tool, ToolRegistry, ToolSpec};
use futures::future::join_all;
use futures::FutureExt;
use llm::{BuiltinTool, ContentBlock, FunctionCallingMode, LLMProvider, LLMRequest, LLMResponse, Usage};
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{debug, info, warn};

/// Settings that shape every request the mediator sends
#[derive(Debug, Clone)]
pub struct MediatorConfig {
    pub system_prompt: Option<String>,
    /// `None` leaves the decision to the service default
    pub function_calling_mode: Option<FunctionCallingMode>,
    pub builtin_tools: Vec<BuiltinTool>,
    /// Upper bound on remote calls made by a single `converge`
    pub max_iterations: usize,
}

impl Default for MediatorConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            function_calling_mode: None,
            builtin_tools: Vec::new(),
            max_iterations: 10,
        }
    }
}

/// The model's answer once no further calls are requested
#[derive(Debug, Clone, PartialEq)]
pub struct FinalResponse {
    pub text: String,
    /// All parts of the final response, including code execution parts
    pub content: Vec<ContentBlock>,
    /// Usage summed over every remote call made while converging
    pub usage: Usage,
    /// Number of remote calls made while converging
    pub iterations: usize,
    pub finish_reason: Option<String>,
}

/// A call request that passed validation and is ready to run
struct PreparedCall<'a> {
    request: &'a CallRequest,
    registered: &'a RegisteredTool,
    args: Map<String, Value>,
}

/// Mediates between the remote reasoning service and locally registered operations
pub struct ToolMediator {
    provider: Box<dyn LLMProvider>,
    registry: ToolRegistry,
    config: MediatorConfig,
}

impl ToolMediator {
    pub fn new(provider: Box<dyn LLMProvider>, config: MediatorConfig) -> Self {
        Self::with_registry(provider, ToolRegistry::new(), config)
    }

    pub fn with_registry(
        provider: Box<dyn LLMProvider>,
        registry: ToolRegistry,
        config: MediatorConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &MediatorConfig {
        &self.config
    }

    pub fn register(&mut self, tool: Box<dyn DynTool>) -> Result<()> {
        self.registry.register(tool)
    }

    pub fn register_tool<T: Tool>(&mut self, tool: T) -> Result<()> {
        self.registry.register_tool(tool)
    }

    pub fn register_fn<F>(&mut self, spec: ToolSpec, func: F) -> Result<()>
    where
        F: Fn(Map<String, Value>) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.registry.register_fn(spec, func)
    }

    fn build_request(&self, conversation: &Conversation) -> LLMRequest {
        let definitions = self.registry.definitions();
        LLMRequest {
            messages: conversation.messages().to_vec(),
            system_prompt: self.config.system_prompt.clone(),
            tools: (!definitions.is_empty()).then_some(definitions),
            builtin_tools: self.config.builtin_tools.clone(),
            function_calling_mode: self.config.function_calling_mode,
        }
    }

    async fn send(&self, conversation: &Conversation) -> Result<LLMResponse> {
        let request = self.build_request(conversation);
        debug!(
            "Sending conversation with {} turn(s) and {} declaration(s)",
            request.messages.len(),
            request.tools.as_ref().map_or(0, Vec::len)
        );

        self.provider
            .send_message(request)
            .await
            .map_err(MediatorError::RemoteService)
    }

    /// Append the prompt as a user turn and send the conversation
    ///
    /// The response is returned as is and not appended; use [`Self::append_result`] or
    /// [`Self::converge`] to continue.
    pub async fn submit(
        &self,
        conversation: &mut Conversation,
        prompt: impl Into<String>,
    ) -> Result<LLMResponse> {
        conversation.push_user_text(prompt);
        self.send(conversation).await
    }

    /// The call request carried by the first response part, if any
    pub fn extract_call_request(response: &LLMResponse) -> Option<CallRequest> {
        response.content.first().and_then(CallRequest::from_block)
    }

    /// Every call request in the response, in the order the model suggested them
    pub fn extract_call_requests(response: &LLMResponse) -> Vec<CallRequest> {
        response
            .function_calls()
            .filter_map(CallRequest::from_block)
            .collect()
    }

    fn prepare<'a>(&'a self, request: &'a CallRequest) -> Result<PreparedCall<'a>> {
        let registered = self
            .registry
            .get(&request.name)
            .ok_or_else(|| MediatorError::UnknownOperation(request.name.clone()))?;

        let args = registered.spec().prepare_arguments(&request.args)?;

        Ok(PreparedCall {
            request,
            registered,
            args,
        })
    }

    async fn invoke(prepared: PreparedCall<'_>) -> CallResult {
        let name = &prepared.request.name;
        debug!("Invoking '{name}' ({})", prepared.request.id);

        let outcome = AssertUnwindSafe(prepared.registered.tool().invoke(prepared.args))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(value)) => CallResult::Success(value),
            Ok(Err(e)) => {
                warn!("Operation '{name}' failed: {e:#}");
                CallResult::error(format!("{e:#}"))
            }
            Err(payload) => {
                let message = panic_message(payload);
                warn!("Operation '{name}' panicked: {message}");
                CallResult::error(format!("Operation panicked: {message}"))
            }
        }
    }

    /// Validate and run a single call request
    ///
    /// Structural problems (unknown name, missing or uncoercible arguments) are errors and
    /// the operation is not invoked. Failures of the operation itself become
    /// [`CallResult::Error`].
    pub async fn dispatch(&self, request: &CallRequest) -> Result<CallResult> {
        let prepared = self.prepare(request)?;
        Ok(Self::invoke(prepared).await)
    }

    /// Validate every request, then run them concurrently
    ///
    /// Nothing runs if any request fails validation. Results are in request order.
    pub async fn dispatch_all(&self, requests: &[CallRequest]) -> Result<Vec<CallResult>> {
        let prepared = requests
            .iter()
            .map(|request| self.prepare(request))
            .collect::<Result<Vec<_>>>()?;

        debug!("{:?}: running {} call(s)", TurnState::Dispatched, prepared.len());
        Ok(join_all(prepared.into_iter().map(Self::invoke)).await)
    }

    /// Append the call suggestion and its result as two turns
    pub fn append_result(conversation: &mut Conversation, request: &CallRequest, result: &CallResult) {
        conversation.push_model_content(vec![request.to_block()]);
        conversation.push_tool_results(vec![result.to_block(request)]);
    }

    /// Append the model's full content followed by one turn holding all results
    ///
    /// The model content is kept as returned so opaque fields are echoed back.
    pub fn append_results(
        conversation: &mut Conversation,
        model_content: Vec<ContentBlock>,
        results: &[(CallRequest, CallResult)],
    ) {
        conversation.push_model_content(model_content);
        conversation.push_tool_results(
            results
                .iter()
                .map(|(request, result)| result.to_block(request))
                .collect(),
        );
    }

    /// Keep resolving call requests until the model answers without one
    ///
    /// Calls left pending by a trailing model turn are dispatched first. The final
    /// model turn is appended to the conversation.
    pub async fn converge(&self, conversation: &mut Conversation) -> Result<FinalResponse> {
        if conversation.is_empty() {
            return Err(MediatorError::EmptyConversation);
        }

        if conversation.state() == TurnState::CallRequested {
            let pending = conversation.pending_calls();
            debug!("Resolving {} pending call(s) before submitting", pending.len());
            let results = self.dispatch_all(&pending).await?;
            conversation.push_tool_results(
                pending
                    .iter()
                    .zip(&results)
                    .map(|(request, result)| result.to_block(request))
                    .collect(),
            );
        }

        let mut usage = Usage::zero();
        for iteration in 1..=self.config.max_iterations {
            let response = self.send(conversation).await?;
            usage.accumulate(&response.usage);

            let requests = Self::extract_call_requests(&response);
            if requests.is_empty() {
                info!("Final response after {iteration} iteration(s)");
                let text = response.text();
                conversation.push_model_content(response.content.clone());
                return Ok(FinalResponse {
                    text,
                    content: response.content,
                    usage,
                    iterations: iteration,
                    finish_reason: response.finish_reason,
                });
            }

            info!(
                "Iteration {iteration}: model requested {}",
                requests
                    .iter()
                    .map(|r| r.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );

            let results = self.dispatch_all(&requests).await?;
            let pairs: Vec<(CallRequest, CallResult)> = requests.into_iter().zip(results).collect();
            Self::append_results(conversation, response.content, &pairs);
        }

        Err(MediatorError::IterationLimit(self.config.max_iterations))
    }

    /// Append the prompt and converge on a final answer
    pub async fn respond(
        &self,
        conversation: &mut Conversation,
        prompt: impl Into<String>,
    ) -> Result<FinalResponse> {
        conversation.push_user_text(prompt);
        self.converge(conversation).await
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
