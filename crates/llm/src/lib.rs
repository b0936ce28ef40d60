//! LLM integration module providing the boundary to a hosted reasoning service
//!
//! This module implements:
//! - Common interface for LLM interactions via the LLMProvider trait
//! - Provider-neutral conversation types (messages, function calls, function results)
//! - The Gemini `generateContent` client with function calling and built-in tools
//! - Connection configuration loaded from files or the environment

#[cfg(test)]
mod tests;

mod utils;

pub mod config;
pub mod display;
pub mod gemini;
pub mod types;

pub use config::GeminiConfig;
pub use gemini::GeminiClient;
pub use types::*;

use anyhow::Result;
use async_trait::async_trait;

/// Trait for different LLM provider implementations
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Sends a request to the LLM service
    ///
    /// Failures are reported as `ApiError` inside the returned error and are never retried.
    async fn send_message(&self, request: LLMRequest) -> Result<LLMResponse>;
}
