// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Bounded calls to external capabilities.
//!
//! Every capability call is wrapped in a timeout. A transient failure
//! (timeout, rate limit, network) gets exactly one retry after a fixed
//! backoff; anything else is returned immediately.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::capability::CapabilityError;
use crate::domain::error::AnalysisError;

pub async fn call_with_retry<T, F, Fut>(
    operation: &str,
    timeout: Duration,
    backoff: Duration,
    mut call: F,
) -> Result<T, CapabilityError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CapabilityError>>,
{
    match bounded(timeout, call()).await {
        Err(err) if err.is_transient() => {
            warn!(operation, error = %err, "Transient capability failure, retrying once");
            tokio::time::sleep(backoff).await;
            let retried = bounded(timeout, call()).await;
            if let Err(err) = &retried {
                debug!(operation, error = %err, "Retry failed");
            }
            retried
        }
        other => other,
    }
}

/// Reason text for a failure returned by [`call_with_retry`]
pub fn escalate(err: CapabilityError) -> String {
    if err.is_transient() {
        AnalysisError::TransientCollaborator(err).to_string()
    } else {
        err.to_string()
    }
}

async fn bounded<T, Fut>(timeout: Duration, fut: Fut) -> Result<T, CapabilityError>
where
    Fut: Future<Output = Result<T, CapabilityError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(CapabilityError::Timeout(timeout)),
    }
}
