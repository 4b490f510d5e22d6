//! Retry policy for transient completion failures.
//!
//! The policy is deliberately narrow: one immediate retry, transient
//! failures only. Sessions that fail twice fall back to their error
//! placeholder instead of burning further quota.

use std::future::Future;
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};

use crate::providers::ProviderError;

/// One immediate retry, no delay.
pub fn transport_retry_policy() -> ConstantBuilder {
    ConstantBuilder::default()
        .with_delay(Duration::ZERO)
        .with_max_times(1)
}

/// Run an operation, retrying once on a transient failure.
pub async fn with_transport_retry<T, F, Fut>(op: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    op.retry(transport_retry_policy())
        .when(ProviderError::is_transient)
        .notify(|err: &ProviderError, _: Duration| {
            tracing::warn!(error = %err, "transient completion failure, retrying once");
        })
        .await
}
