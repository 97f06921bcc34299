// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for the state the refinery owns, plus the read-only
//! source of evaluation input. One repository per aggregate, interface in
//! the domain layer, implementations in `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `ProposalRepository` | `Proposal` | `InMemoryProposalRepository` |
//! | `ArtifactRepository` | `ArtifactVersion` ledger | `InMemoryArtifactRepository` |
//! | `RegressionReportRepository` | `RegressionReport` | `InMemoryRegressionReportRepository` |
//! | `EvaluationSource` | evaluation input (read-only) | `InMemoryEvaluationSource` |
//!
//! ## Concurrency
//!
//! Writes that guard a state change are compare-and-swap operations and
//! report [`RepositoryError::Conflict`] when the expected state no longer
//! holds. Callers surface the conflict; they do not retry it.

use async_trait::async_trait;

use crate::domain::artifact::{ArtifactContent, ArtifactKind, ArtifactVersion};
use crate::domain::evaluation::{Conversation, ConversationId, EvaluationResult};
use crate::domain::proposal::{Proposal, ProposalId, ProposalStatus};
use crate::domain::regression::RegressionReport;

/// Append-only proposal ledger
#[async_trait]
pub trait ProposalRepository: Send + Sync {
    /// Insert a new proposal; fails if the id already exists
    async fn insert(&self, proposal: &Proposal) -> Result<(), RepositoryError>;

    /// Find proposal by ID
    async fn find_by_id(&self, id: ProposalId) -> Result<Option<Proposal>, RepositoryError>;

    /// List proposals, optionally filtered by status, oldest first
    async fn list(&self, status: Option<ProposalStatus>) -> Result<Vec<Proposal>, RepositoryError>;

    /// Replace the stored proposal only if its stored status is still `expected`
    async fn update_if_status(
        &self,
        proposal: &Proposal,
        expected: ProposalStatus,
    ) -> Result<(), RepositoryError>;
}

/// Per-kind artifact version ledger with a single active pointer
#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    /// Currently active version of `kind`
    async fn active(&self, kind: ArtifactKind) -> Result<Option<ArtifactVersion>, RepositoryError>;

    /// Look up one version
    async fn find_version(
        &self,
        kind: ArtifactKind,
        version_id: u32,
    ) -> Result<Option<ArtifactVersion>, RepositoryError>;

    /// Full ledger of `kind`, oldest first
    async fn history(&self, kind: ArtifactKind) -> Result<Vec<ArtifactVersion>, RepositoryError>;

    /// Append a version and make it active, provided the active pointer still
    /// equals `expected_active` (`None` = ledger empty)
    async fn commit(
        &self,
        content: ArtifactContent,
        expected_active: Option<u32>,
        source_proposal_id: Option<ProposalId>,
    ) -> Result<ArtifactVersion, RepositoryError>;

    /// Point the active pointer at an existing version
    async fn activate(&self, kind: ArtifactKind, version_id: u32) -> Result<ArtifactVersion, RepositoryError>;
}

/// Append-only audit ledger of regression reports
#[async_trait]
pub trait RegressionReportRepository: Send + Sync {
    async fn append(&self, report: &RegressionReport) -> Result<(), RepositoryError>;

    /// Reports for one proposal, oldest first
    async fn find_by_proposal(&self, proposal_id: ProposalId) -> Result<Vec<RegressionReport>, RepositoryError>;
}

/// Read-only view of evaluation output and conversations
#[async_trait]
pub trait EvaluationSource: Send + Sync {
    /// Most recent evaluation results, newest first
    async fn list_evaluations(&self, limit: usize) -> Result<Vec<EvaluationResult>, RepositoryError>;

    async fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
