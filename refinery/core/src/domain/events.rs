// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain events for the refinery
//! Published to the EventBus for observability and audit

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::artifact::ArtifactKind;
use super::cluster::ClusterId;
use super::proposal::{ProposalId, ProposalType};
use super::regression::RegressionReportId;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisEvent {
    /// An analysis cycle finished
    CycleCompleted {
        evaluations_reviewed: usize,
        issues_collected: usize,
        issues_dropped: usize,
        clusters_found: usize,
        proposals_drafted: usize,
        generation_failures: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A proposal was drafted for a cluster
    ProposalDrafted {
        proposal_id: ProposalId,
        cluster_id: ClusterId,
        proposal_type: ProposalType,
        confidence: f64,
        timestamp: DateTime<Utc>,
    },

    /// Generation for a cluster failed or produced a degenerate edit
    GenerationFailed {
        cluster_id: ClusterId,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A proposal became the active artifact version
    ProposalApplied {
        proposal_id: ProposalId,
        artifact_kind: ArtifactKind,
        previous_version: Option<u32>,
        new_version: u32,
        timestamp: DateTime<Utc>,
    },

    ProposalRejected {
        proposal_id: ProposalId,
        timestamp: DateTime<Utc>,
    },

    /// A regression comparison was recorded for an applied proposal
    ProposalVerified {
        proposal_id: ProposalId,
        report_id: RegressionReportId,
        test_cases_count: usize,
        overall_improvement: bool,
        timestamp: DateTime<Utc>,
    },

    /// The active pointer was moved back to an earlier version
    ArtifactRolledBack {
        artifact_kind: ArtifactKind,
        from_version: Option<u32>,
        to_version: u32,
        timestamp: DateTime<Utc>,
    },
}

impl AnalysisEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            AnalysisEvent::CycleCompleted { timestamp, .. } => *timestamp,
            AnalysisEvent::ProposalDrafted { timestamp, .. } => *timestamp,
            AnalysisEvent::GenerationFailed { timestamp, .. } => *timestamp,
            AnalysisEvent::ProposalApplied { timestamp, .. } => *timestamp,
            AnalysisEvent::ProposalRejected { timestamp, .. } => *timestamp,
            AnalysisEvent::ProposalVerified { timestamp, .. } => *timestamp,
            AnalysisEvent::ArtifactRolledBack { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            AnalysisEvent::CycleCompleted { .. } => "cycle_completed",
            AnalysisEvent::ProposalDrafted { .. } => "proposal_drafted",
            AnalysisEvent::GenerationFailed { .. } => "generation_failed",
            AnalysisEvent::ProposalApplied { .. } => "proposal_applied",
            AnalysisEvent::ProposalRejected { .. } => "proposal_rejected",
            AnalysisEvent::ProposalVerified { .. } => "proposal_verified",
            AnalysisEvent::ArtifactRolledBack { .. } => "artifact_rolled_back",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = AnalysisEvent::ProposalApplied {
            proposal_id: ProposalId::new(),
            artifact_kind: ArtifactKind::Prompt,
            previous_version: Some(1),
            new_version: 2,
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"proposal_applied\""));
        let deserialized: AnalysisEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(event.event_type(), deserialized.event_type());
        assert_eq!(event.timestamp(), deserialized.timestamp());
    }
}
