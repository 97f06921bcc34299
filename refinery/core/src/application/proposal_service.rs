// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Proposal Service
//!
//! Owns the proposal state machine and the artifact-version ledger.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** apply / reject / verify / rollback
//! - **Collaborators:**
//!   - Domain: `Proposal`, `ArtifactVersion`, `RegressionReport`
//!   - Repositories: `ProposalRepository`, `ArtifactRepository`, `RegressionReportRepository`
//!   - Application: `RegressionVerifier`
//!   - Infrastructure: `EventBus`
//!
//! # Concurrency
//!
//! `apply` commits against the version the proposal was drafted from. If the
//! active pointer has moved the commit fails with `Conflict`, so two applies
//! racing on the same artifact kind never both succeed. Status changes are
//! compare-and-swap updates as well. Conflicts are surfaced, never retried.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::application::regression_verifier::RegressionVerifier;
use crate::domain::artifact::{ArtifactKind, ArtifactVersion};
use crate::domain::error::AnalysisError;
use crate::domain::events::AnalysisEvent;
use crate::domain::proposal::{Proposal, ProposalId, ProposalStatus, ProposalTransitionError};
use crate::domain::regression::RegressionReport;
use crate::domain::repository::{ArtifactRepository, ProposalRepository, RegressionReportRepository};
use crate::infrastructure::event_bus::EventBus;

/// Operations on drafted proposals and the artifacts they edit
#[async_trait]
pub trait ProposalStore: Send + Sync {
    /// Make a draft the active version of its artifact
    ///
    /// # Errors
    ///
    /// - `NotFound`: unknown proposal id
    /// - `Conflict`: proposal is not a draft, or the active version moved since drafting
    async fn apply(&self, proposal_id: ProposalId) -> Result<ArtifactVersion, AnalysisError>;

    /// Close a draft without applying it
    async fn reject(&self, proposal_id: ProposalId) -> Result<Proposal, AnalysisError>;

    /// Compare the applied version against the one it replaced and record the report
    ///
    /// # Errors
    ///
    /// - `NotFound`: unknown proposal id
    /// - `Conflict`: proposal is not applied
    /// - `RegressionAborted`: more than half the battery could not be scored
    async fn verify(&self, proposal_id: ProposalId) -> Result<RegressionReport, AnalysisError>;

    /// Point the active pointer of `kind` back at an existing version
    async fn rollback(&self, kind: ArtifactKind, version_id: u32) -> Result<ArtifactVersion, AnalysisError>;

    async fn get(&self, proposal_id: ProposalId) -> Result<Proposal, AnalysisError>;

    async fn list(&self, status: Option<ProposalStatus>) -> Result<Vec<Proposal>, AnalysisError>;

    async fn reports(&self, proposal_id: ProposalId) -> Result<Vec<RegressionReport>, AnalysisError>;
}

pub struct StandardProposalService {
    proposals: Arc<dyn ProposalRepository>,
    artifacts: Arc<dyn ArtifactRepository>,
    reports: Arc<dyn RegressionReportRepository>,
    verifier: Arc<RegressionVerifier>,
    event_bus: Arc<EventBus>,
}

impl StandardProposalService {
    pub fn new(
        proposals: Arc<dyn ProposalRepository>,
        artifacts: Arc<dyn ArtifactRepository>,
        reports: Arc<dyn RegressionReportRepository>,
        verifier: Arc<RegressionVerifier>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            proposals,
            artifacts,
            reports,
            verifier,
            event_bus,
        }
    }

    async fn load(&self, proposal_id: ProposalId) -> Result<Proposal, AnalysisError> {
        self.proposals
            .find_by_id(proposal_id)
            .await?
            .ok_or_else(|| AnalysisError::NotFound(format!("proposal {}", proposal_id)))
    }

    async fn load_version(&self, kind: ArtifactKind, version_id: u32) -> Result<ArtifactVersion, AnalysisError> {
        self.artifacts
            .find_version(kind, version_id)
            .await?
            .ok_or_else(|| AnalysisError::NotFound(format!("{} version {}", kind, version_id)))
    }
}

fn ensure_transition(proposal: &Proposal, next: ProposalStatus) -> Result<(), AnalysisError> {
    if proposal.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(ProposalTransitionError::IllegalTransition { from: proposal.status, to: next }.into())
    }
}

#[async_trait]
impl ProposalStore for StandardProposalService {
    async fn apply(&self, proposal_id: ProposalId) -> Result<ArtifactVersion, AnalysisError> {
        let proposal = self.load(proposal_id).await?;
        ensure_transition(&proposal, ProposalStatus::Applied)?;
        let kind = proposal.artifact_kind();

        let version = self
            .artifacts
            .commit(proposal.proposed_content.clone(), proposal.base_version, Some(proposal_id))
            .await?;

        let mut applied = proposal.clone();
        applied.mark_applied(version.version_id)?;
        if let Err(err) = self.proposals.update_if_status(&applied, ProposalStatus::Draft).await {
            // Status moved under us (e.g. a concurrent reject): restore the previous pointer
            if let Some(base) = proposal.base_version {
                if let Err(revert) = self.artifacts.activate(kind, base).await {
                    error!(%proposal_id, error = %revert, "Failed to restore active artifact after lost status update");
                }
            }
            return Err(err.into());
        }

        info!(
            %proposal_id,
            artifact_kind = %kind,
            new_version = version.version_id,
            "Applied proposal"
        );
        self.event_bus.publish(AnalysisEvent::ProposalApplied {
            proposal_id,
            artifact_kind: kind,
            previous_version: proposal.base_version,
            new_version: version.version_id,
            timestamp: chrono::Utc::now(),
        });

        Ok(version)
    }

    async fn reject(&self, proposal_id: ProposalId) -> Result<Proposal, AnalysisError> {
        let mut proposal = self.load(proposal_id).await?;
        proposal.reject()?;
        self.proposals.update_if_status(&proposal, ProposalStatus::Draft).await?;

        info!(%proposal_id, "Rejected proposal");
        self.event_bus.publish(AnalysisEvent::ProposalRejected {
            proposal_id,
            timestamp: chrono::Utc::now(),
        });
        Ok(proposal)
    }

    async fn verify(&self, proposal_id: ProposalId) -> Result<RegressionReport, AnalysisError> {
        let proposal = self.load(proposal_id).await?;
        ensure_transition(&proposal, ProposalStatus::Verified)?;
        let kind = proposal.artifact_kind();

        let candidate_id = proposal
            .applied_version
            .ok_or_else(|| AnalysisError::Conflict(format!("proposal {} has no applied version", proposal_id)))?;
        let baseline_id = proposal.base_version.ok_or_else(|| {
            AnalysisError::Validation(format!("proposal {} was drafted without a baseline version", proposal_id))
        })?;

        let baseline = self.load_version(kind, baseline_id).await?;
        let candidate = self.load_version(kind, candidate_id).await?;

        let report = match self.verifier.compare(proposal_id, &baseline, &candidate).await {
            Ok(report) => report,
            Err(err) => {
                warn!(%proposal_id, error = %err, "Verification did not produce a report");
                return Err(err);
            }
        };

        // The status swap guards the single report per proposal; a lost report
        // hands the proposal back as applied so it can be verified again
        let mut verified = proposal.clone();
        verified.mark_verified()?;
        self.proposals.update_if_status(&verified, ProposalStatus::Applied).await?;
        if let Err(err) = self.reports.append(&report).await {
            error!(%proposal_id, error = %err, "Failed to store regression report, reverting to applied");
            if let Err(revert) = self.proposals.update_if_status(&proposal, ProposalStatus::Verified).await {
                error!(%proposal_id, error = %revert, "Failed to revert proposal status");
            }
            return Err(err.into());
        }

        info!(
            %proposal_id,
            test_cases = report.test_cases_count,
            overall_improvement = report.overall_improvement,
            "Verified proposal"
        );
        self.event_bus.publish(AnalysisEvent::ProposalVerified {
            proposal_id,
            report_id: report.id,
            test_cases_count: report.test_cases_count,
            overall_improvement: report.overall_improvement,
            timestamp: chrono::Utc::now(),
        });

        Ok(report)
    }

    async fn rollback(&self, kind: ArtifactKind, version_id: u32) -> Result<ArtifactVersion, AnalysisError> {
        let current = self.artifacts.active(kind).await?;
        if let Some(current) = current.as_ref().filter(|v| v.version_id == version_id) {
            return Ok(current.clone());
        }

        let version = self.artifacts.activate(kind, version_id).await?;
        info!(artifact_kind = %kind, to_version = version_id, "Rolled back artifact");
        self.event_bus.publish(AnalysisEvent::ArtifactRolledBack {
            artifact_kind: kind,
            from_version: current.map(|v| v.version_id),
            to_version: version_id,
            timestamp: chrono::Utc::now(),
        });
        Ok(version)
    }

    async fn get(&self, proposal_id: ProposalId) -> Result<Proposal, AnalysisError> {
        self.load(proposal_id).await
    }

    async fn list(&self, status: Option<ProposalStatus>) -> Result<Vec<Proposal>, AnalysisError> {
        Ok(self.proposals.list(status).await?)
    }

    async fn reports(&self, proposal_id: ProposalId) -> Result<Vec<RegressionReport>, AnalysisError> {
        Ok(self.reports.find_by_proposal(proposal_id).await?)
    }
}
