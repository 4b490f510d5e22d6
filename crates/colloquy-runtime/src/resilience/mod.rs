//! Resilience patterns for colloquy-runtime.
//!
//! This module provides:
//! - Admission bounding for concurrent provider calls
//! - Token budget management
//! - The one-immediate-retry policy for transient failures

mod admission;
mod budget;
mod retry;

pub use admission::AdmissionGate;
pub use budget::{BudgetTracker, LlmUsage, TokenBudget};
pub use retry::{transport_retry_policy, with_transport_retry};
