mod cli;
mod demo_tools;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use cli::Args;
use llm::{ContentBlock, GeminiClient, GeminiConfig};
use tool_mediator::{Conversation, FinalResponse, ToolMediator};
use tracing::{debug, info, warn};

fn gemini_config(args: &Args) -> Result<GeminiConfig> {
    let mut config =
        GeminiConfig::load(args.config.clone()).context("Failed to load Gemini configuration")?;

    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(timeout_secs) = args.timeout_secs {
        config.timeout_secs = timeout_secs;
    }
    Ok(config)
}

/// Submit the prompt, resolve the first call by hand, then let the mediator finish
///
/// When the model suggests several calls at once they are all resolved together.
async fn run_manual(
    mediator: &ToolMediator,
    conversation: &mut Conversation,
    prompt: &str,
) -> Result<FinalResponse> {
    let response = mediator.submit(conversation, prompt).await?;

    let Some(request) = ToolMediator::extract_call_request(&response) else {
        info!("No operation call requested");
        let text = response.text();
        conversation.push_model_content(response.content.clone());
        return Ok(FinalResponse {
            text,
            content: response.content,
            usage: response.usage,
            iterations: 1,
            finish_reason: response.finish_reason,
        });
    };

    let requests = ToolMediator::extract_call_requests(&response);
    if requests.len() > 1 {
        warn!(
            "Model requested {} calls at once, resolving all of them",
            requests.len()
        );
        let results = mediator.dispatch_all(&requests).await?;
        let pairs: Vec<_> = requests.into_iter().zip(results).collect();
        for (request, result) in &pairs {
            debug!("{}: {}", request.name, result.to_response_value());
        }
        ToolMediator::append_results(conversation, response.content.clone(), &pairs);
    } else {
        info!("Model requested {} with {}", request.name, serde_json::Value::Object(request.args.clone()));
        let result = mediator.dispatch(&request).await?;
        debug!("Result: {}", result.to_response_value());
        ToolMediator::append_result(conversation, &request, &result);
    }

    let mut final_response = mediator.converge(conversation).await?;
    final_response.usage.accumulate(&response.usage);
    final_response.iterations += 1;
    Ok(final_response)
}

fn print_response(response: &FinalResponse) {
    for block in &response.content {
        match block {
            ContentBlock::Text { text } => println!("{text}"),
            ContentBlock::ExecutableCode { language, code } => {
                println!("```{}\n{code}\n```", language.to_lowercase())
            }
            ContentBlock::CodeExecutionResult { outcome, output } => {
                println!("[{outcome}]\n{output}")
            }
            _ => {}
        }
    }

    info!(
        "Finished after {} request(s), {} input / {} output tokens, finish reason {:?}",
        response.iterations,
        response.usage.input_tokens,
        response.usage.output_tokens,
        response.finish_reason
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    logging::setup_logging(args.verbose);

    let config = gemini_config(&args)?;
    let client = GeminiClient::new(&config)?;
    info!("Using model {}", client.model());

    let mut mediator = ToolMediator::new(Box::new(client), args.mediator_config());
    demo_tools::register_all(&mut mediator).context("Failed to register demo operations")?;

    let mut conversation = Conversation::new();
    let response = if args.manual {
        run_manual(&mediator, &mut conversation, &args.prompt).await?
    } else {
        mediator.respond(&mut conversation, args.prompt.as_str()).await?
    };

    for message in conversation.messages() {
        debug!("{message}");
    }
    print_response(&response);
    Ok(())
}
