// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Proposal Generator
//!
//! Drafts one artifact edit per significant cluster.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Turn a ranked cluster into a `Draft` proposal
//! - **Collaborators:**
//!   - Domain: `Cluster`, `Proposal`, `ArtifactVersion`
//!   - Capability: `ContentGenerator`
//!
//! # Flow
//!
//! 1. Classify the target artifact from the dominant issue type
//! 2. Pick the members closest to the centroid as evidence
//! 3. Build a failure-pattern seed and call the generator (timeout + one retry)
//! 4. Discard empty, unchanged or unparseable output
//! 5. Normalize significance into a confidence
//!
//! A failing cluster is recorded and skipped. It never aborts the batch.

use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::embedder::EmbeddedIssue;
use crate::application::resilience::{call_with_retry, escalate};
use crate::domain::artifact::{ArtifactContent, ArtifactKind, ArtifactVersion};
use crate::domain::capability::{ContentGenerator, EvidenceItem, GenerationRequest};
use crate::domain::cluster::{cosine_similarity, Cluster, ClusterId};
use crate::domain::config::{GenerationConfig, TimeoutConfig};
use crate::domain::error::AnalysisError;
use crate::domain::issue::IssueId;
use crate::domain::proposal::{Proposal, ProposalId, ProposalStatus, ProposalType};

/// Result of drafting a batch of clusters
#[derive(Debug, Default)]
pub struct GenerationRun {
    /// Drafted proposals, in cluster rank order
    pub proposals: Vec<Proposal>,
    pub failures: Vec<(ClusterId, String)>,
    /// Clusters already covered by an open draft
    pub skipped_duplicates: usize,
    /// Clusters whose target artifact has no active version
    pub skipped_without_artifact: usize,
}

pub struct ProposalGenerator {
    generator: Arc<dyn ContentGenerator>,
    config: GenerationConfig,
    timeouts: TimeoutConfig,
}

impl ProposalGenerator {
    pub fn new(generator: Arc<dyn ContentGenerator>, config: GenerationConfig, timeouts: TimeoutConfig) -> Self {
        Self { generator, config, timeouts }
    }

    pub fn classify(&self, cluster: &Cluster) -> ArtifactKind {
        cluster
            .dominant_issue_type()
            .and_then(|label| self.config.issue_type_artifacts.get(label).copied())
            .unwrap_or(ArtifactKind::Prompt)
    }

    pub fn confidence(&self, significance_score: f64) -> f64 {
        (significance_score / self.config.confidence_cap).clamp(0.0, 1.0)
    }

    /// Members closest to the centroid; ties by issue id
    pub fn select_evidence<'a>(
        &self,
        cluster: &Cluster,
        members: &'a HashMap<IssueId, EmbeddedIssue>,
    ) -> Vec<&'a EmbeddedIssue> {
        let mut ranked: Vec<(f64, &EmbeddedIssue)> = cluster
            .member_issue_ids
            .iter()
            .filter_map(|id| members.get(id))
            .map(|member| (cosine_similarity(&cluster.centroid, &member.vector), member))
            .collect();
        ranked.sort_by(|(sa, a), (sb, b)| sb.total_cmp(sa).then_with(|| a.issue.id.cmp(&b.issue.id)));
        ranked
            .into_iter()
            .take(self.config.evidence_size)
            .map(|(_, member)| member)
            .collect()
    }

    /// Whether an open draft already addresses this cluster
    pub fn is_duplicate(&self, cluster: &Cluster, kind: ArtifactKind, open_drafts: &[Proposal]) -> bool {
        open_drafts.iter().any(|draft| {
            draft.status == ProposalStatus::Draft
                && draft.artifact_kind() == kind
                && (draft.source_cluster_id == cluster.id
                    || draft.evidence_overlap(&cluster.member_issue_ids) >= self.config.duplicate_evidence_overlap)
        })
    }

    pub async fn draft(
        &self,
        cluster: &Cluster,
        members: &HashMap<IssueId, EmbeddedIssue>,
        active: &ArtifactVersion,
    ) -> Result<Proposal, AnalysisError> {
        let kind = active.artifact_kind;
        let failure = |reason: String| AnalysisError::GenerationFailure { cluster_id: cluster.id, reason };

        let evidence = self.select_evidence(cluster, members);
        if evidence.is_empty() {
            return Err(failure("cluster has no resolvable members".to_string()));
        }

        let request = GenerationRequest {
            artifact_kind: kind,
            failure_pattern_seed: failure_pattern_seed(cluster, &evidence),
            evidence: evidence.iter().map(|member| evidence_item(member)).collect(),
            original_content: active.content.clone(),
        };

        let output = call_with_retry("generate", self.timeouts.generation, self.timeouts.retry_backoff, || {
            self.generator.generate(&request)
        })
        .await
        .map_err(|err| failure(escalate(err)))?;

        let proposed = ArtifactContent::parse(kind, &output.proposed_content).map_err(failure)?;
        if proposed.is_empty() {
            return Err(failure("generator returned empty content".to_string()));
        }
        if proposed.is_equivalent(&active.content) {
            return Err(failure("proposed content is identical to the active artifact".to_string()));
        }

        let failure_pattern = output
            .failure_pattern
            .filter(|label| !label.trim().is_empty())
            .unwrap_or(request.failure_pattern_seed);

        let evidence_conversation_ids: Vec<_> = evidence
            .iter()
            .map(|member| member.issue.conversation_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let now = chrono::Utc::now();
        Ok(Proposal {
            id: ProposalId::new(),
            proposal_type: ProposalType::for_kind(kind),
            status: ProposalStatus::Draft,
            failure_pattern,
            original_content: active.content.clone(),
            proposed_content: proposed,
            rationale: output.rationale,
            evidence_count: cluster.member_count(),
            confidence: self.confidence(cluster.significance_score),
            source_cluster_id: cluster.id,
            evidence_issue_ids: evidence.iter().map(|member| member.issue.id).collect(),
            evidence_conversation_ids,
            base_version: Some(active.version_id),
            applied_version: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Draft every cluster with bounded concurrency, preserving rank order
    pub async fn draft_all(
        &self,
        clusters: &[Cluster],
        members: &HashMap<IssueId, EmbeddedIssue>,
        active: &HashMap<ArtifactKind, ArtifactVersion>,
        open_drafts: &[Proposal],
    ) -> GenerationRun {
        let mut run = GenerationRun::default();
        let mut targets = Vec::new();

        for cluster in clusters {
            let kind = self.classify(cluster);
            let Some(version) = active.get(&kind) else {
                warn!(cluster_id = %cluster.id, artifact_kind = %kind, "No active artifact, skipping cluster");
                run.skipped_without_artifact += 1;
                continue;
            };
            if self.config.skip_duplicate_drafts && self.is_duplicate(cluster, kind, open_drafts) {
                debug!(cluster_id = %cluster.id, "Cluster already covered by an open draft");
                run.skipped_duplicates += 1;
                continue;
            }
            targets.push((cluster, version));
        }

        let drafts: Vec<_> = targets
            .into_iter()
            .map(|(cluster, version)| self.draft(cluster, members, version))
            .collect();
        let results: Vec<Result<Proposal, AnalysisError>> = stream::iter(drafts)
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        for result in results {
            match result {
                Ok(proposal) => run.proposals.push(proposal),
                Err(AnalysisError::GenerationFailure { cluster_id, reason }) => {
                    warn!(cluster_id = %cluster_id, reason = %reason, "Generation failed, skipping cluster");
                    metrics::counter!("refinery_generation_failures_total").increment(1);
                    run.failures.push((cluster_id, reason));
                }
                Err(other) => {
                    warn!(error = %other, "Unexpected drafting error");
                    metrics::counter!("refinery_generation_failures_total").increment(1);
                }
            }
        }

        info!(
            drafted = run.proposals.len(),
            failed = run.failures.len(),
            duplicates = run.skipped_duplicates,
            "Drafted proposals"
        );
        run
    }
}

/// Label handed to the generator: dominant type, most central description, spread
pub fn failure_pattern_seed(cluster: &Cluster, evidence: &[&EmbeddedIssue]) -> String {
    let dominant = cluster.dominant_issue_type().unwrap_or("unknown");
    let central = evidence.first().map(|m| m.issue.description.as_str()).unwrap_or("");
    format!(
        "{}: {} ({} issues across {} conversations)",
        dominant,
        central,
        cluster.member_count(),
        cluster.conversation_coverage()
    )
}

fn evidence_item(member: &EmbeddedIssue) -> EvidenceItem {
    let issue = &member.issue;
    EvidenceItem {
        issue_id: issue.id,
        conversation_id: issue.conversation_id.clone(),
        issue_type: issue.issue_type.raw_label().to_string(),
        description: issue.description.clone(),
        context: issue.context_window.iter().map(|turn| turn.render()).collect(),
        suggested_fix: issue.suggested_fix.clone(),
    }
}
