// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Issue Embedder
//!
//! Maps issues to vectors through the injected `TextEmbedder` and caches the
//! result per (issue id, model version, text digest). A re-evaluated
//! conversation reuses issue ids, so the digest of the embedded text is part
//! of the key. A model version bump misses the cache without any explicit
//! invalidation.

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::application::resilience::call_with_retry;
use crate::domain::capability::{CapabilityError, TextEmbedder};
use crate::domain::config::{EmbeddingConfig, TimeoutConfig};
use crate::domain::issue::{Issue, IssueId};

const EMBED_CONCURRENCY: usize = 8;

/// An issue paired with its vector
#[derive(Debug, Clone)]
pub struct EmbeddedIssue {
    pub issue: Arc<Issue>,
    pub vector: Arc<Vec<f32>>,
}

#[derive(Debug, Default)]
pub struct EmbeddingOutcome {
    /// Embedded issues, in input order
    pub embedded: Vec<EmbeddedIssue>,
    pub failed: usize,
}

type CacheKey = (IssueId, String, [u8; 32]);

pub struct IssueEmbedder {
    backend: Arc<dyn TextEmbedder>,
    cache: DashMap<CacheKey, Arc<Vec<f32>>>,
    include_context: bool,
    timeout: Duration,
    retry_backoff: Duration,
}

impl IssueEmbedder {
    pub fn new(backend: Arc<dyn TextEmbedder>, config: &EmbeddingConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            backend,
            cache: DashMap::new(),
            include_context: config.include_context,
            timeout: timeouts.embedding,
            retry_backoff: timeouts.retry_backoff,
        }
    }

    pub fn model_version(&self) -> &str {
        self.backend.model_version()
    }

    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub async fn embed_issue(&self, issue: &Issue) -> Result<Arc<Vec<f32>>, CapabilityError> {
        let text = issue.embedding_text(self.include_context);
        let digest: [u8; 32] = Sha256::digest(text.as_bytes()).into();
        let key = (issue.id, self.backend.model_version().to_string(), digest);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.clone());
        }

        let vector = call_with_retry("embed", self.timeout, self.retry_backoff, || self.backend.embed(&text)).await?;

        let expected = self.backend.dimension();
        if vector.len() != expected {
            return Err(CapabilityError::InvalidOutput(format!(
                "expected {} dimensions, got {}",
                expected,
                vector.len()
            )));
        }

        let vector = Arc::new(vector);
        self.cache.insert(key, vector.clone());
        Ok(vector)
    }

    /// Embed a batch; issues that cannot be embedded are skipped and counted
    pub async fn embed_all(&self, issues: Vec<Issue>) -> EmbeddingOutcome {
        let results: Vec<(Issue, Result<Arc<Vec<f32>>, CapabilityError>)> = stream::iter(issues)
            .map(|issue| async move {
                let vector = self.embed_issue(&issue).await;
                (issue, vector)
            })
            .buffered(EMBED_CONCURRENCY)
            .collect()
            .await;

        let mut outcome = EmbeddingOutcome::default();
        for (issue, result) in results {
            match result {
                Ok(vector) => outcome.embedded.push(EmbeddedIssue { issue: Arc::new(issue), vector }),
                Err(err) => {
                    warn!(issue_id = %issue.id, error = %err, "Failed to embed issue, skipping");
                    metrics::counter!("refinery_issues_dropped_total", "reason" => "embedding").increment(1);
                    outcome.failed += 1;
                }
            }
        }

        debug!(cache_entries = self.cache.len(), "Embedding cache size");
        info!(
            embedded = outcome.embedded.len(),
            failed = outcome.failed,
            model_version = self.backend.model_version(),
            "Embedded issues"
        );
        outcome
    }
}
