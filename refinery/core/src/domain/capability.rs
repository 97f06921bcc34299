// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Capability
//!
//! Narrow interfaces to the external backends the refinery depends on.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption boundary for embedding, generation and agent execution
//!
//! Production backends and deterministic test doubles implement the same
//! traits and are injected at construction. Nothing in the application
//! layer inspects which implementation it was given.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::artifact::{ArtifactContent, ArtifactKind, ArtifactVersion};
use super::evaluation::ConversationId;
use super::issue::IssueId;
use super::regression::Scenario;

/// Errors reported by any external capability
#[derive(Debug, Clone, thiserror::Error)]
pub enum CapabilityError {
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limit exceeded")]
    RateLimit,

    #[error("network error: {0}")]
    Network(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("invalid output: {0}")]
    InvalidOutput(String),
}

impl CapabilityError {
    /// Transient errors get exactly one bounded retry
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CapabilityError::Timeout(_) | CapabilityError::RateLimit | CapabilityError::Network(_)
        )
    }
}

/// Text embedding backend.
///
/// Identical input text must yield an identical vector.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Version of the underlying model; cached vectors are keyed by it
    fn model_version(&self) -> &str;

    /// Output dimension
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CapabilityError>;
}

/// One piece of evidence shown to the generator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub issue_id: IssueId,
    pub conversation_id: ConversationId,
    pub issue_type: String,
    pub description: String,
    pub context: Vec<String>,
    pub suggested_fix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub artifact_kind: ArtifactKind,
    pub failure_pattern_seed: String,
    pub evidence: Vec<EvidenceItem>,
    pub original_content: ArtifactContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub proposed_content: String,
    pub rationale: String,
    /// Refined label for the pattern; the seed is used when absent
    #[serde(default)]
    pub failure_pattern: Option<String>,
}

/// Drafts an artifact edit for a failure pattern
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, CapabilityError>;
}

/// Executes the agent under a given artifact version and grades the run
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Aggregate score of one scenario run
    async fn run(&self, version: &ArtifactVersion, scenario: &Scenario) -> Result<f64, CapabilityError>;
}
