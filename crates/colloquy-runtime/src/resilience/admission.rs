//! Admission bounding for concurrent completion calls.
//!
//! One gate is shared by the orchestrator, the judge, and the batch
//! evaluator so the configured `max_concurrent_requests` holds across
//! everything that talks to the provider.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds in-flight completion calls with a semaphore.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl AdmissionGate {
    /// Create a gate admitting at most `limit` concurrent calls.
    pub fn new(limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Wait for a slot. The permit releases the slot on drop.
    pub async fn admit(&self) -> OwnedSemaphorePermit {
        // The semaphore is never closed, so acquisition cannot fail
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("admission semaphore closed")
    }

    /// Configured concurrency limit.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Currently free slots.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
