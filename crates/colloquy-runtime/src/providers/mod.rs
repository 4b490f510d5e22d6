//! Completion-service abstractions for colloquy-runtime.
//!
//! This module defines the trait every LLM backend implements plus the
//! request/response model shared by the orchestrator, the judge engine,
//! and the batch evaluator. The Anthropic implementation lives behind
//! the `anthropic` feature.
//!
//! ## Security
//!
//! All providers use the [`secrets`] module for secure credential handling.
//! See [`ApiCredential`] for the recommended patterns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

mod factory;
pub mod secrets;

#[cfg(feature = "anthropic")]
mod anthropic;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicProvider, AnthropicProviderFactory};

/// Errors from completion providers.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Token budget exhausted for {0}")]
    BudgetExhausted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Whether a retry of the same request could plausibly succeed.
    ///
    /// Transient failures cover the network layer and server-side
    /// pressure. Auth, parse, budget, and configuration failures are
    /// deterministic and retrying them only burns quota.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::HttpError(_)
            | ProviderError::RateLimited { .. }
            | ProviderError::Timeout(_) => true,
            ProviderError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Error-analysis bucket this failure is reported under.
    pub fn category(&self) -> colloquy_core::ErrorCategory {
        use colloquy_core::ErrorCategory;
        match self {
            ProviderError::ParseError(_) => ErrorCategory::Format,
            ProviderError::AuthError | ProviderError::NotConfigured(_) => ErrorCategory::Other,
            _ => ErrorCategory::Transport,
        }
    }
}

/// Configuration for a completion request.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    /// Model to use
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Temperature (0.0 for deterministic)
    pub temperature: f32,

    /// Request timeout
    pub timeout: Duration,

    /// Enable prompt caching (Anthropic-specific)
    pub prompt_caching: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5-20250514".to_string(),
            max_tokens: 1024,
            temperature: 0.2,
            timeout: Duration::from_secs(30),
            prompt_caching: true,
        }
    }
}

/// A chat message in a completion transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "user" or "assistant"
    pub role: String,

    /// Message content
    pub content: String,
}

impl ChatMessage {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A tool the model may request during a completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name as exposed to the model
    pub name: String,

    /// What the tool does, shown to the model
    pub description: String,

    /// JSON Schema of the tool arguments
    pub input_schema: serde_json::Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Provider-assigned call id, echoed back with the result
    pub id: String,

    /// Name of the requested tool
    pub name: String,

    /// Arguments as a JSON object
    pub arguments: serde_json::Value,
}

/// One completion request.
///
/// System-level instructions travel separately from the transcript so
/// providers can map them to their native system slot.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System instructions for this call
    pub instructions: String,

    /// Conversation so far, oldest first
    pub transcript: Vec<ChatMessage>,

    /// Tools the model may request; empty disables tool use
    pub tools: Vec<ToolSpec>,
}

impl CompletionRequest {
    /// Create a request with instructions and an empty transcript.
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            transcript: Vec::new(),
            tools: Vec::new(),
        }
    }

    /// Replace the transcript.
    pub fn with_transcript(mut self, transcript: Vec<ChatMessage>) -> Self {
        self.transcript = transcript;
        self
    }

    /// Replace the tool set.
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }
}

/// Response from a completion.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    /// Generated text
    pub text: String,

    /// Tool invocations the model asked for, in request order
    pub tool_calls_requested: Vec<ToolCallRequest>,

    /// Token usage
    pub usage: TokenUsage,

    /// Model used
    pub model: String,

    /// Stop reason
    pub stop_reason: Option<String>,
}

/// Token usage from a completion.
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u32,

    /// Tokens in the completion
    pub completion_tokens: u32,

    /// Tokens read from cache (Anthropic)
    pub cache_read_tokens: u32,

    /// Tokens written to cache (Anthropic)
    pub cache_creation_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used.
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Backend abstraction shared by every component that talks to a model.
///
/// The orchestrator, judge engine, and batch evaluator all speak through
/// this trait, so tests substitute scripted implementations and nothing
/// else in the crate touches the network.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Execute a completion.
    async fn complete(
        &self,
        request: &CompletionRequest,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Check if the provider is healthy.
    async fn health_check(&self) -> bool;

    /// Get provider name for logs and metrics.
    fn name(&self) -> &str;

    /// Estimate tokens for a prompt.
    fn estimate_tokens(&self, text: &str) -> u32 {
        // Simple estimate: ~4 chars per token
        (text.len() / 4) as u32
    }
}
