// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Analysis Service
//!
//! Runs one analysis cycle end to end.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Orchestrate collection, embedding, clustering, scoring and drafting
//! - **Collaborators:**
//!   - Repositories: `EvaluationSource`, `ProposalRepository`, `ArtifactRepository`
//!   - Application: `IssueCollector`, `IssueEmbedder`, `ClusterEngine`, `ProposalGenerator`
//!   - Infrastructure: `EventBus`
//!
//! # Flow
//!
//! 1. Read the most recent evaluation results
//! 2. Resolve the conversations that carry issues (concurrently)
//! 3. Collect issues and drop duplicates by id
//! 4. Embed, cluster and rank
//! 5. Draft proposals against the active artifacts, skipping open duplicates
//! 6. Persist drafts and publish `CycleCompleted`
//!
//! Per-item failures are counted and logged. Repository failures abort the cycle.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

use crate::application::cluster_engine::ClusterEngine;
use crate::application::embedder::{EmbeddedIssue, IssueEmbedder};
use crate::application::issue_collector::IssueCollector;
use crate::application::proposal_generator::ProposalGenerator;
use crate::application::significance::SignificanceScorer;
use crate::domain::artifact::ArtifactKind;
use crate::domain::capability::{ContentGenerator, TextEmbedder};
use crate::domain::config::AnalysisConfig;
use crate::domain::error::AnalysisError;
use crate::domain::evaluation::{Conversation, ConversationId};
use crate::domain::events::AnalysisEvent;
use crate::domain::proposal::{Proposal, ProposalStatus};
use crate::domain::repository::{ArtifactRepository, EvaluationSource, ProposalRepository};
use crate::infrastructure::event_bus::EventBus;

const FETCH_CONCURRENCY: usize = 8;

pub struct AnalysisService {
    source: Arc<dyn EvaluationSource>,
    proposals: Arc<dyn ProposalRepository>,
    artifacts: Arc<dyn ArtifactRepository>,
    collector: IssueCollector,
    embedder: IssueEmbedder,
    engine: ClusterEngine,
    generator: ProposalGenerator,
    event_bus: Arc<EventBus>,
}

impl AnalysisService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &AnalysisConfig,
        source: Arc<dyn EvaluationSource>,
        proposals: Arc<dyn ProposalRepository>,
        artifacts: Arc<dyn ArtifactRepository>,
        text_embedder: Arc<dyn TextEmbedder>,
        content_generator: Arc<dyn ContentGenerator>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            source,
            proposals,
            artifacts,
            collector: IssueCollector::new(&config.collector),
            embedder: IssueEmbedder::new(text_embedder, &config.embedding, &config.timeouts),
            engine: ClusterEngine::new(config.clustering.clone(), SignificanceScorer::new(&config.scoring)),
            generator: ProposalGenerator::new(content_generator, config.generation.clone(), config.timeouts.clone()),
            event_bus,
        }
    }

    /// Analyze up to `limit` recent evaluations and persist the drafted proposals
    #[instrument(skip(self))]
    pub async fn run_analysis_cycle(&self, limit: usize) -> Result<Vec<Proposal>, AnalysisError> {
        let started = Instant::now();

        let evaluations = self.source.list_evaluations(limit).await?;
        let conversations = self.resolve_conversations(&evaluations).await?;

        let collected = self.collector.collect(&evaluations, &conversations);
        let issues_dropped = collected.dropped();
        let mut seen = HashSet::new();
        let issues: Vec<_> = collected.issues.into_iter().filter(|issue| seen.insert(issue.id)).collect();
        let issues_collected = issues.len();

        let embedding = self.embedder.embed_all(issues).await;
        let clusters = self.engine.cluster(&embedding.embedded);
        let members: HashMap<_, EmbeddedIssue> = embedding
            .embedded
            .into_iter()
            .map(|member| (member.issue.id, member))
            .collect();

        let mut active = HashMap::new();
        for kind in ArtifactKind::ALL {
            if let Some(version) = self.artifacts.active(kind).await? {
                active.insert(kind, version);
            }
        }
        let open_drafts = self.proposals.list(Some(ProposalStatus::Draft)).await?;

        let run = self.generator.draft_all(&clusters, &members, &active, &open_drafts).await;

        for proposal in &run.proposals {
            self.proposals.insert(proposal).await?;
            self.event_bus.publish(AnalysisEvent::ProposalDrafted {
                proposal_id: proposal.id,
                cluster_id: proposal.source_cluster_id,
                proposal_type: proposal.proposal_type,
                confidence: proposal.confidence,
                timestamp: chrono::Utc::now(),
            });
        }
        for (cluster_id, reason) in &run.failures {
            self.event_bus.publish(AnalysisEvent::GenerationFailed {
                cluster_id: *cluster_id,
                reason: reason.clone(),
                timestamp: chrono::Utc::now(),
            });
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            evaluations = evaluations.len(),
            issues = issues_collected,
            dropped = issues_dropped + embedding.failed,
            clusters = clusters.len(),
            proposals = run.proposals.len(),
            duration_ms,
            "Analysis cycle completed"
        );
        self.event_bus.publish(AnalysisEvent::CycleCompleted {
            evaluations_reviewed: evaluations.len(),
            issues_collected,
            issues_dropped: issues_dropped + embedding.failed,
            clusters_found: clusters.len(),
            proposals_drafted: run.proposals.len(),
            generation_failures: run.failures.len(),
            duration_ms,
            timestamp: chrono::Utc::now(),
        });

        Ok(run.proposals)
    }

    async fn resolve_conversations(
        &self,
        evaluations: &[crate::domain::evaluation::EvaluationResult],
    ) -> Result<HashMap<ConversationId, Conversation>, AnalysisError> {
        let wanted: BTreeSet<&ConversationId> = evaluations
            .iter()
            .filter(|evaluation| evaluation.has_issues())
            .map(|evaluation| &evaluation.conversation_id)
            .collect();

        let fetches: Vec<_> = wanted.into_iter().map(|id| self.source.get_conversation(id)).collect();
        let found: Vec<Option<Conversation>> = stream::iter(fetches)
            .buffer_unordered(FETCH_CONCURRENCY)
            .try_collect()
            .await?;

        Ok(found
            .into_iter()
            .flatten()
            .map(|conversation| (conversation.conversation_id.clone(), conversation))
            .collect())
    }
}
