// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Improvement proposals
//!
//! A [`Proposal`] is a reviewable edit to one agent artifact that addresses
//! one failure pattern. Its status only moves forward:
//!
//! ```text
//! Draft ──apply──▶ Applied ──verify──▶ Verified
//!   │
//!   └──reject──▶ Rejected
//! ```
//!
//! Proposals are never deleted; the ledger is the audit history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use super::artifact::{ArtifactContent, ArtifactKind};
use super::cluster::ClusterId;
use super::evaluation::ConversationId;
use super::issue::IssueId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalId(pub Uuid);

impl ProposalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProposalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalType {
    Prompt,
    Tool,
}

impl ProposalType {
    pub fn artifact_kind(&self) -> ArtifactKind {
        match self {
            ProposalType::Prompt => ArtifactKind::Prompt,
            ProposalType::Tool => ArtifactKind::ToolSchema,
        }
    }

    pub fn for_kind(kind: ArtifactKind) -> Self {
        match kind {
            ArtifactKind::Prompt => ProposalType::Prompt,
            ArtifactKind::ToolSchema => ProposalType::Tool,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    Draft,
    Applied,
    Verified,
    Rejected,
}

impl ProposalStatus {
    pub fn can_transition_to(&self, next: ProposalStatus) -> bool {
        matches!(
            (self, next),
            (ProposalStatus::Draft, ProposalStatus::Applied)
                | (ProposalStatus::Applied, ProposalStatus::Verified)
                | (ProposalStatus::Draft, ProposalStatus::Rejected)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Draft => "draft",
            ProposalStatus::Applied => "applied",
            ProposalStatus::Verified => "verified",
            ProposalStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProposalTransitionError {
    #[error("proposal cannot move from {from} to {to}")]
    IllegalTransition { from: ProposalStatus, to: ProposalStatus },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: ProposalId,
    #[serde(rename = "type")]
    pub proposal_type: ProposalType,
    pub status: ProposalStatus,
    pub failure_pattern: String,
    pub original_content: ArtifactContent,
    pub proposed_content: ArtifactContent,
    pub rationale: String,
    /// Number of issues in the source cluster
    pub evidence_count: usize,
    pub confidence: f64,
    pub source_cluster_id: ClusterId,
    pub evidence_issue_ids: Vec<IssueId>,
    pub evidence_conversation_ids: Vec<ConversationId>,
    /// Active version of the artifact when the proposal was drafted
    pub base_version: Option<u32>,
    /// Version created by `apply`
    pub applied_version: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Proposal {
    pub fn artifact_kind(&self) -> ArtifactKind {
        self.proposal_type.artifact_kind()
    }

    fn transition(&mut self, next: ProposalStatus) -> Result<(), ProposalTransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(ProposalTransitionError::IllegalTransition { from: self.status, to: next });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_applied(&mut self, version_id: u32) -> Result<(), ProposalTransitionError> {
        self.transition(ProposalStatus::Applied)?;
        self.applied_version = Some(version_id);
        Ok(())
    }

    pub fn mark_verified(&mut self) -> Result<(), ProposalTransitionError> {
        self.transition(ProposalStatus::Verified)
    }

    pub fn reject(&mut self) -> Result<(), ProposalTransitionError> {
        self.transition(ProposalStatus::Rejected)
    }

    /// Fraction of this proposal's evidence issues that also back `other`
    pub fn evidence_overlap(&self, other: &[IssueId]) -> f64 {
        if self.evidence_issue_ids.is_empty() {
            return 0.0;
        }
        let shared = self.evidence_issue_ids.iter().filter(|id| other.contains(id)).count();
        shared as f64 / self.evidence_issue_ids.len() as f64
    }
}
