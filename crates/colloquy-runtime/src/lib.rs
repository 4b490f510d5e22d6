//! # colloquy-runtime
//!
//! Model-facing runtime of the Colloquy research assistant.
//!
//! Where `colloquy-core` is deterministic and async-free, this crate
//! owns everything that talks to a completion provider:
//! - the multi-role pipeline turning one query into a cited response
//! - the LLM-as-judge engine scoring responses per perspective
//! - the batch evaluator running query sets into one report
//! - provider clients plus the retry, admission, budget, and cache
//!   plumbing around them
//!
//! ## Key Guarantees
//!
//! 1. **Fail-safe sessions**: `run_session` always returns a
//!    [`Session`](colloquy_core::Session), never an error
//! 2. **Bounded**: revision loops, tool rounds, concurrent calls, and
//!    token spend all have configured limits
//! 3. **One retry**: transient provider failures are retried exactly
//!    once, then surfaced
//!
//! ## Example
//!
//! ```rust,ignore
//! use colloquy_core::Query;
//! use colloquy_runtime::{load_config, AgentOrchestrator, ProviderRegistry};
//!
//! let (config, settings) = load_config("config.yaml")?;
//! let service = ProviderRegistry::with_defaults().create(&settings)?;
//!
//! let orchestrator = AgentOrchestrator::builder()
//!     .service(service)
//!     .pipeline(config.pipeline.clone())
//!     .completion(settings.completion_config())
//!     .build()?;
//!
//! let session = orchestrator
//!     .run_session(Query::new(1, "How does usability testing work?"))
//!     .await;
//! ```

pub mod cache;
pub mod config;
pub mod evaluator;
pub mod judge;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod tools;

// Re-export main types at crate root
pub use cache::{ScoreCache, ScoreCacheKey};
pub use config::{load_config, BudgetSettings, CacheSettings, ProviderSettings};
pub use evaluator::{BatchEvaluator, CancelFlag};
pub use judge::JudgeEngine;
pub use orchestrator::{AgentOrchestrator, OrchestratorBuilder, RuntimeError, ERROR_PLACEHOLDER};
pub use providers::{
    ChatMessage, CompletionConfig, CompletionRequest, CompletionResponse, CompletionService,
    ProviderError, ProviderFactory, ProviderRegistry, TokenUsage, ToolCallRequest, ToolSpec,
};
pub use resilience::{AdmissionGate, BudgetTracker, LlmUsage};
pub use tools::{NullTools, PaperResult, ResearchTools, ToolOutcome, WebResult};
