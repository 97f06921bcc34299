// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

mod common;

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use refinery_core::application::{ProposalStore, RegressionVerifier, StandardProposalService};
use refinery_core::domain::artifact::{ArtifactContent, ArtifactKind};
use refinery_core::domain::cluster::ClusterId;
use refinery_core::domain::config::{RegressionConfig, TimeoutConfig};
use refinery_core::domain::error::AnalysisError;
use refinery_core::domain::events::AnalysisEvent;
use refinery_core::domain::proposal::{Proposal, ProposalId, ProposalStatus, ProposalType};
use refinery_core::domain::regression::RegressionReport;
use refinery_core::domain::repository::{
    ArtifactRepository, ProposalRepository, RegressionReportRepository, RepositoryError,
};
use refinery_core::infrastructure::event_bus::EventBus;
use refinery_core::infrastructure::repositories::{
    InMemoryArtifactRepository, InMemoryProposalRepository, InMemoryRegressionReportRepository,
};
use uuid::Uuid;

use common::{battery, initial_prompt, initial_tool_schema, ScriptedRunner};

struct Harness {
    store: StandardProposalService,
    proposals: Arc<InMemoryProposalRepository>,
    artifacts: Arc<InMemoryArtifactRepository>,
    event_bus: Arc<EventBus>,
}

/// Report store whose first append fails
#[derive(Default)]
struct FlakyReports {
    failed_once: AtomicBool,
    inner: InMemoryRegressionReportRepository,
}

#[async_trait]
impl RegressionReportRepository for FlakyReports {
    async fn append(&self, report: &RegressionReport) -> Result<(), RepositoryError> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(RepositoryError::Storage("disk full".to_string()));
        }
        self.inner.append(report).await
    }

    async fn find_by_proposal(&self, proposal_id: ProposalId) -> Result<Vec<RegressionReport>, RepositoryError> {
        self.inner.find_by_proposal(proposal_id).await
    }
}

fn harness(runner: ScriptedRunner, battery_size: usize) -> Harness {
    harness_with_reports(runner, battery_size, Arc::new(InMemoryRegressionReportRepository::new()))
}

fn harness_with_reports(
    runner: ScriptedRunner,
    battery_size: usize,
    reports: Arc<dyn RegressionReportRepository>,
) -> Harness {
    let proposals = Arc::new(InMemoryProposalRepository::new());
    let artifacts = Arc::new(InMemoryArtifactRepository::seeded([initial_prompt(), initial_tool_schema()]));
    let event_bus = Arc::new(EventBus::new(100));
    let verifier = Arc::new(RegressionVerifier::new(
        Arc::new(runner),
        Arc::new(battery(battery_size)),
        RegressionConfig::default(),
        TimeoutConfig::default(),
    ));
    let store = StandardProposalService::new(
        proposals.clone(),
        artifacts.clone(),
        reports,
        verifier,
        event_bus.clone(),
    );
    Harness { store, proposals, artifacts, event_bus }
}

fn wins(wins: usize) -> ScriptedRunner {
    ScriptedRunner { candidate_version: 2, wins, broken: vec![] }
}

async fn draft(h: &Harness, text: &str) -> ProposalId {
    let now = Utc::now();
    let proposal = Proposal {
        id: ProposalId::new(),
        proposal_type: ProposalType::Prompt,
        status: ProposalStatus::Draft,
        failure_pattern: "context_loss: forgot the destination".to_string(),
        original_content: initial_prompt(),
        proposed_content: ArtifactContent::Prompt(text.to_string()),
        rationale: "Users had to repeat themselves".to_string(),
        evidence_count: 3,
        confidence: 0.4,
        source_cluster_id: ClusterId(Uuid::new_v4()),
        evidence_issue_ids: vec![],
        evidence_conversation_ids: vec![],
        base_version: Some(1),
        applied_version: None,
        created_at: now,
        updated_at: now,
    };
    h.proposals.insert(&proposal).await.unwrap();
    proposal.id
}

#[tokio::test]
async fn test_apply_appends_version_and_moves_pointer() {
    let h = harness(wins(11), 20);
    let id = draft(&h, "You are a travel booking assistant. Keep track of the destination.").await;

    let version = h.store.apply(id).await.unwrap();
    assert_eq!(version.artifact_kind, ArtifactKind::Prompt);
    assert_eq!(version.version_id, 2);
    assert!(version.active);
    assert_eq!(version.source_proposal_id, Some(id));

    let history = h.artifacts.history(ArtifactKind::Prompt).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(!history[0].active);
    assert_eq!(history[0].content, initial_prompt());

    // The other kind is untouched
    let tools = h.artifacts.active(ArtifactKind::ToolSchema).await.unwrap().unwrap();
    assert_eq!(tools.version_id, 1);

    let stored = h.store.get(id).await.unwrap();
    assert_eq!(stored.status, ProposalStatus::Applied);
    assert_eq!(stored.applied_version, Some(2));
}

#[tokio::test]
async fn test_verify_majority_wins_is_improvement() {
    let h = harness(wins(11), 20);
    let id = draft(&h, "Keep track of the destination.").await;
    h.store.apply(id).await.unwrap();

    let report = h.store.verify(id).await.unwrap();
    assert_eq!(report.test_cases_count, 20);
    assert_eq!(report.baseline_version, 1);
    assert_eq!(report.candidate_version, 2);
    assert_eq!(report.score_deltas.iter().filter(|d| d.is_improvement).count(), 11);
    assert!(report.overall_improvement);

    assert_eq!(h.store.get(id).await.unwrap().status, ProposalStatus::Verified);
    assert_eq!(h.store.reports(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_verify_even_split_is_not_improvement() {
    let h = harness(wins(10), 20);
    let id = draft(&h, "Keep track of the destination.").await;
    h.store.apply(id).await.unwrap();

    let report = h.store.verify(id).await.unwrap();
    assert_eq!(report.test_cases_count, 20);
    assert!(!report.overall_improvement);
    // Recorded, not enforced
    assert_eq!(h.store.get(id).await.unwrap().status, ProposalStatus::Verified);
    assert_eq!(h.artifacts.active(ArtifactKind::Prompt).await.unwrap().unwrap().version_id, 2);
}

#[tokio::test]
async fn test_verify_excludes_failed_cases() {
    let h = harness(ScriptedRunner { candidate_version: 2, wins: 20, broken: vec![0, 5, 9] }, 20);
    let id = draft(&h, "Keep track of the destination.").await;
    h.store.apply(id).await.unwrap();

    let report = h.store.verify(id).await.unwrap();
    assert_eq!(report.test_cases_count, 17);
    assert_eq!(report.failed_cases.len(), 3);
}

#[tokio::test]
async fn test_verify_aborts_when_most_cases_fail() {
    let h = harness(ScriptedRunner { candidate_version: 2, wins: 20, broken: (0..11).collect() }, 20);
    let id = draft(&h, "Keep track of the destination.").await;
    h.store.apply(id).await.unwrap();

    let err = h.store.verify(id).await.unwrap_err();
    assert!(matches!(err, AnalysisError::RegressionAborted { failed: 11, total: 20 }));
    assert_eq!(h.store.get(id).await.unwrap().status, ProposalStatus::Applied);
    assert!(h.store.reports(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_illegal_transitions_conflict() {
    let h = harness(wins(11), 20);

    let draft_id = draft(&h, "Keep track of the destination.").await;
    assert!(h.store.verify(draft_id).await.unwrap_err().is_conflict());

    let rejected = draft(&h, "Confirm dates before booking.").await;
    let proposal = h.store.reject(rejected).await.unwrap();
    assert_eq!(proposal.status, ProposalStatus::Rejected);
    assert!(h.store.apply(rejected).await.unwrap_err().is_conflict());
    assert!(h.store.verify(rejected).await.unwrap_err().is_conflict());
    assert!(h.store.reject(rejected).await.unwrap_err().is_conflict());

    h.store.apply(draft_id).await.unwrap();
    h.store.verify(draft_id).await.unwrap();
    assert!(h.store.apply(draft_id).await.unwrap_err().is_conflict());
    assert!(h.store.verify(draft_id).await.unwrap_err().is_conflict());
    assert!(h.store.reject(draft_id).await.unwrap_err().is_conflict());
}

#[tokio::test]
async fn test_unknown_proposal_is_not_found() {
    let h = harness(wins(11), 20);
    assert!(h.store.apply(ProposalId::new()).await.unwrap_err().is_not_found());
    assert!(h.store.reject(ProposalId::new()).await.unwrap_err().is_not_found());
    assert!(h.store.verify(ProposalId::new()).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_concurrent_apply_exactly_one_wins() {
    let h = harness(wins(11), 20);
    let first = draft(&h, "Keep track of the destination.").await;
    let second = draft(&h, "Confirm dates before booking.").await;

    let (a, b) = tokio::join!(h.store.apply(first), h.store.apply(second));
    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes.iter().filter(|r| matches!(r, Err(e) if e.is_conflict())).count(),
        1
    );

    let history = h.artifacts.history(ArtifactKind::Prompt).await.unwrap();
    assert_eq!(history.len(), 2);
    let drafts = h.proposals.list(Some(ProposalStatus::Draft)).await.unwrap();
    assert_eq!(drafts.len(), 1);
}

#[tokio::test]
async fn test_concurrent_apply_across_tasks() {
    let h = Arc::new(harness(wins(11), 20));
    let ids = [
        draft(&h, "Keep track of the destination.").await,
        draft(&h, "Confirm dates before booking.").await,
        draft(&h, "Repeat the itinerary back.").await,
    ];

    let handles: Vec<_> = ids
        .iter()
        .map(|id| {
            let h = h.clone();
            let id = *id;
            tokio::spawn(async move { h.store.apply(id).await })
        })
        .collect();

    let mut applied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => applied += 1,
            Err(err) => assert!(err.is_conflict()),
        }
    }
    assert_eq!(applied, 1);
    assert_eq!(h.artifacts.history(ArtifactKind::Prompt).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_rollback_reactivates_earlier_version() {
    let h = harness(wins(11), 20);
    let mut events = h.event_bus.subscribe();
    let id = draft(&h, "Keep track of the destination.").await;
    h.store.apply(id).await.unwrap();

    let restored = h.store.rollback(ArtifactKind::Prompt, 1).await.unwrap();
    assert!(restored.active);
    assert_eq!(restored.content, initial_prompt());
    assert_eq!(h.artifacts.history(ArtifactKind::Prompt).await.unwrap().len(), 2);

    // Already active: no-op
    let again = h.store.rollback(ArtifactKind::Prompt, 1).await.unwrap();
    assert_eq!(again.version_id, 1);

    assert!(h.store.rollback(ArtifactKind::Prompt, 7).await.unwrap_err().is_not_found());

    let mut rollbacks = 0;
    while let Ok(event) = events.try_recv() {
        if let AnalysisEvent::ArtifactRolledBack { from_version, to_version, .. } = event {
            assert_eq!(from_version, Some(2));
            assert_eq!(to_version, 1);
            rollbacks += 1;
        }
    }
    assert_eq!(rollbacks, 1);
}

#[tokio::test]
async fn test_apply_after_rollback_conflicts_for_stale_draft() {
    let h = harness(wins(11), 20);
    let first = draft(&h, "Keep track of the destination.").await;
    let stale = draft(&h, "Confirm dates before booking.").await;

    h.store.apply(first).await.unwrap();
    // The stale draft was written against version 1; version 2 is active
    assert!(h.store.apply(stale).await.unwrap_err().is_conflict());
    assert_eq!(h.store.get(stale).await.unwrap().status, ProposalStatus::Draft);
}

#[tokio::test]
async fn test_verify_runs_on_spawned_task() {
    let h = Arc::new(harness(wins(11), 20));
    let id = draft(&h, "Keep track of the destination.").await;
    h.store.apply(id).await.unwrap();

    let task = {
        let h = h.clone();
        tokio::spawn(async move { h.store.verify(id).await })
    };
    let report = task.await.unwrap().unwrap();
    assert_eq!(report.test_cases_count, 20);
    assert_eq!(h.store.get(id).await.unwrap().status, ProposalStatus::Verified);
}

#[tokio::test]
async fn test_lost_report_leaves_proposal_applied() {
    let h = harness_with_reports(wins(11), 20, Arc::new(FlakyReports::default()));
    let id = draft(&h, "Keep track of the destination.").await;
    h.store.apply(id).await.unwrap();

    let err = h.store.verify(id).await.unwrap_err();
    assert!(matches!(err, AnalysisError::Repository(_)));
    assert_eq!(h.store.get(id).await.unwrap().status, ProposalStatus::Applied);
    assert!(h.store.reports(id).await.unwrap().is_empty());

    h.store.verify(id).await.unwrap();
    assert_eq!(h.store.get(id).await.unwrap().status, ProposalStatus::Verified);
    assert_eq!(h.store.reports(id).await.unwrap().len(), 1);
}
