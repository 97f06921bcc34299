// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Error taxonomy of the refinery.
//!
//! Per-item failures (`Validation`, `GenerationFailure`,
//! `RegressionExecutionFailure`) are recovered inside a batch and only
//! counted. A transient failure that outlives its retry becomes a
//! `TransientCollaborator`, which then escalates into the per-item failure. `Conflict`, `NotFound`, `RegressionAborted`, `Repository` and
//! `Configuration` are surfaced to the caller.

use thiserror::Error;

use super::capability::CapabilityError;
use super::cluster::ClusterId;
use super::proposal::ProposalTransitionError;
use super::repository::RepositoryError;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("generation failed for cluster {cluster_id}: {reason}")]
    GenerationFailure { cluster_id: ClusterId, reason: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("collaborator still failing after retry: {0}")]
    TransientCollaborator(#[source] CapabilityError),

    #[error("regression case '{test_id}' could not be scored: {reason}")]
    RegressionExecutionFailure { test_id: String, reason: String },

    #[error("regression aborted: {failed} of {total} cases could not be scored")]
    RegressionAborted { failed: usize, total: usize },

    #[error("repository error: {0}")]
    Repository(RepositoryError),

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl From<RepositoryError> for AnalysisError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => AnalysisError::NotFound(what),
            RepositoryError::Conflict(what) => AnalysisError::Conflict(what),
            other => AnalysisError::Repository(other),
        }
    }
}

impl From<ProposalTransitionError> for AnalysisError {
    fn from(err: ProposalTransitionError) -> Self {
        AnalysisError::Conflict(err.to_string())
    }
}

impl AnalysisError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, AnalysisError::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AnalysisError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::proposal::ProposalStatus;

    #[test]
    fn test_repository_error_mapping() {
        assert!(AnalysisError::from(RepositoryError::Conflict("moved".into())).is_conflict());
        assert!(AnalysisError::from(RepositoryError::NotFound("p".into())).is_not_found());
        assert!(matches!(
            AnalysisError::from(RepositoryError::Storage("disk".into())),
            AnalysisError::Repository(_)
        ));
    }

    #[test]
    fn test_transition_error_is_conflict() {
        let err = ProposalTransitionError::IllegalTransition {
            from: ProposalStatus::Rejected,
            to: ProposalStatus::Applied,
        };
        assert!(AnalysisError::from(err).is_conflict());
    }
}
