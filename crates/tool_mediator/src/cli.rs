use clap::{Parser, ValueEnum};
use llm::{BuiltinTool, FunctionCallingMode};
use std::path::PathBuf;
use tool_mediator::MediatorConfig;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// The model decides whether to call an operation
    Auto,
    /// The model must call an operation
    Any,
    /// Operations are declared but never called
    None,
}

impl From<ModeArg> for FunctionCallingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Auto => FunctionCallingMode::Auto,
            ModeArg::Any => FunctionCallingMode::Any,
            ModeArg::None => FunctionCallingMode::None,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinArg {
    CodeExecution,
    GoogleSearch,
    UrlContext,
}

impl From<BuiltinArg> for BuiltinTool {
    fn from(tool: BuiltinArg) -> Self {
        match tool {
            BuiltinArg::CodeExecution => BuiltinTool::CodeExecution,
            BuiltinArg::GoogleSearch => BuiltinTool::GoogleSearch,
            BuiltinArg::UrlContext => BuiltinTool::UrlContext,
        }
    }
}

/// Ask Gemini a question it can answer with the tutorial operations
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// The question to ask
    pub prompt: String,

    /// Model name to use
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// API base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Path to a gemini.json configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Function calling mode
    #[arg(long)]
    pub mode: Option<ModeArg>,

    /// Maximum number of requests while resolving operation calls
    #[arg(long, default_value_t = 10)]
    pub max_iterations: usize,

    /// Timeout for a single request in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Enable a tool that runs on the service side (may be repeated)
    #[arg(long)]
    pub builtin: Vec<BuiltinArg>,

    /// System instruction sent with every request
    #[arg(long)]
    pub system_prompt: Option<String>,

    /// Resolve the first call step by step instead of looping automatically
    #[arg(long)]
    pub manual: bool,

    /// Enable verbose logging (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn mediator_config(&self) -> MediatorConfig {
        MediatorConfig {
            system_prompt: self.system_prompt.clone(),
            function_calling_mode: self.mode.map(Into::into),
            builtin_tools: self.builtin.iter().copied().map(Into::into).collect(),
            max_iterations: self.max_iterations,
        }
    }
}
