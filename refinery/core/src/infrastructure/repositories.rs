// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! In-memory implementations of the repository traits declared in
//! `crate::domain::repository`.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Hold the proposal, artifact and report ledgers and serve evaluation input
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! - **InMemoryProposalRepository** - Insertion-ordered proposal ledger with CAS status updates
//! - **InMemoryArtifactRepository** - Per-kind version ledger with a CAS active pointer
//! - **InMemoryRegressionReportRepository** - Append-only report ledger
//! - **InMemoryEvaluationSource** - Evaluation results and conversations, loadable from JSON
//!
//! Every compare-and-swap runs under a single write lock, so the check and
//! the write are atomic with respect to other callers.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::domain::artifact::{ArtifactContent, ArtifactKind, ArtifactVersion};
use crate::domain::evaluation::{Conversation, ConversationId, EvaluationResult};
use crate::domain::proposal::{Proposal, ProposalId, ProposalStatus};
use crate::domain::regression::RegressionReport;
use crate::domain::repository::{
    ArtifactRepository, EvaluationSource, ProposalRepository, RegressionReportRepository, RepositoryError,
};

#[derive(Clone, Default)]
pub struct InMemoryProposalRepository {
    proposals: Arc<RwLock<Vec<Proposal>>>,
}

impl InMemoryProposalRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProposalRepository for InMemoryProposalRepository {
    async fn insert(&self, proposal: &Proposal) -> Result<(), RepositoryError> {
        let mut proposals = self.proposals.write();
        if proposals.iter().any(|p| p.id == proposal.id) {
            return Err(RepositoryError::Conflict(format!("proposal {} already exists", proposal.id)));
        }
        proposals.push(proposal.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ProposalId) -> Result<Option<Proposal>, RepositoryError> {
        let proposals = self.proposals.read();
        Ok(proposals.iter().find(|p| p.id == id).cloned())
    }

    async fn list(&self, status: Option<ProposalStatus>) -> Result<Vec<Proposal>, RepositoryError> {
        let proposals = self.proposals.read();
        Ok(proposals
            .iter()
            .filter(|p| status.map_or(true, |s| p.status == s))
            .cloned()
            .collect())
    }

    async fn update_if_status(&self, proposal: &Proposal, expected: ProposalStatus) -> Result<(), RepositoryError> {
        let mut proposals = self.proposals.write();
        let stored = proposals
            .iter_mut()
            .find(|p| p.id == proposal.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("proposal {}", proposal.id)))?;
        if stored.status != expected {
            return Err(RepositoryError::Conflict(format!(
                "proposal {} is {}, expected {}",
                proposal.id, stored.status, expected
            )));
        }
        *stored = proposal.clone();
        Ok(())
    }
}

#[derive(Default)]
struct Ledger {
    versions: Vec<ArtifactVersion>,
    active: Option<u32>,
}

impl Ledger {
    fn view(&self, version: &ArtifactVersion) -> ArtifactVersion {
        ArtifactVersion {
            active: self.active == Some(version.version_id),
            ..version.clone()
        }
    }

    fn get(&self, version_id: u32) -> Option<ArtifactVersion> {
        self.versions
            .iter()
            .find(|v| v.version_id == version_id)
            .map(|v| self.view(v))
    }

    fn append(&mut self, content: ArtifactContent, source_proposal_id: Option<ProposalId>) -> ArtifactVersion {
        let version = ArtifactVersion {
            artifact_kind: content.kind(),
            version_id: self.versions.len() as u32 + 1,
            content,
            created_at: Utc::now(),
            active: false,
            source_proposal_id,
        };
        self.active = Some(version.version_id);
        self.versions.push(version.clone());
        ArtifactVersion { active: true, ..version }
    }
}

/// Version ledgers keyed by artifact kind
///
/// Stored versions are never modified; the `active` flag of a returned
/// version reflects the pointer at read time.
#[derive(Clone, Default)]
pub struct InMemoryArtifactRepository {
    ledgers: Arc<RwLock<HashMap<ArtifactKind, Ledger>>>,
}

impl InMemoryArtifactRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository whose ledgers start with the given contents as version 1
    pub fn seeded(initial: impl IntoIterator<Item = ArtifactContent>) -> Self {
        let repo = Self::new();
        {
            let mut ledgers = repo.ledgers.write();
            for content in initial {
                ledgers.entry(content.kind()).or_default().append(content, None);
            }
        }
        repo
    }
}

#[async_trait]
impl ArtifactRepository for InMemoryArtifactRepository {
    async fn active(&self, kind: ArtifactKind) -> Result<Option<ArtifactVersion>, RepositoryError> {
        let ledgers = self.ledgers.read();
        Ok(ledgers
            .get(&kind)
            .and_then(|ledger| ledger.active.and_then(|id| ledger.get(id))))
    }

    async fn find_version(&self, kind: ArtifactKind, version_id: u32) -> Result<Option<ArtifactVersion>, RepositoryError> {
        let ledgers = self.ledgers.read();
        Ok(ledgers.get(&kind).and_then(|ledger| ledger.get(version_id)))
    }

    async fn history(&self, kind: ArtifactKind) -> Result<Vec<ArtifactVersion>, RepositoryError> {
        let ledgers = self.ledgers.read();
        Ok(ledgers
            .get(&kind)
            .map(|ledger| ledger.versions.iter().map(|v| ledger.view(v)).collect())
            .unwrap_or_default())
    }

    async fn commit(
        &self,
        content: ArtifactContent,
        expected_active: Option<u32>,
        source_proposal_id: Option<ProposalId>,
    ) -> Result<ArtifactVersion, RepositoryError> {
        let kind = content.kind();
        let mut ledgers = self.ledgers.write();
        let ledger = ledgers.entry(kind).or_default();
        if ledger.active != expected_active {
            return Err(RepositoryError::Conflict(format!(
                "active {} version is {:?}, expected {:?}",
                kind, ledger.active, expected_active
            )));
        }
        Ok(ledger.append(content, source_proposal_id))
    }

    async fn activate(&self, kind: ArtifactKind, version_id: u32) -> Result<ArtifactVersion, RepositoryError> {
        let mut ledgers = self.ledgers.write();
        let ledger = ledgers
            .get_mut(&kind)
            .filter(|ledger| ledger.versions.iter().any(|v| v.version_id == version_id))
            .ok_or_else(|| RepositoryError::NotFound(format!("{} version {}", kind, version_id)))?;
        ledger.active = Some(version_id);
        ledger
            .get(version_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("{} version {}", kind, version_id)))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryRegressionReportRepository {
    reports: Arc<RwLock<Vec<RegressionReport>>>,
}

impl InMemoryRegressionReportRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegressionReportRepository for InMemoryRegressionReportRepository {
    async fn append(&self, report: &RegressionReport) -> Result<(), RepositoryError> {
        self.reports.write().push(report.clone());
        Ok(())
    }

    async fn find_by_proposal(&self, proposal_id: ProposalId) -> Result<Vec<RegressionReport>, RepositoryError> {
        let reports = self.reports.read();
        Ok(reports.iter().filter(|r| r.proposal_id == proposal_id).cloned().collect())
    }
}

/// Evaluation input held in memory
#[derive(Clone, Default)]
pub struct InMemoryEvaluationSource {
    evaluations: Arc<RwLock<Vec<EvaluationResult>>>,
    conversations: Arc<RwLock<HashMap<ConversationId, Conversation>>>,
}

impl InMemoryEvaluationSource {
    pub fn new(evaluations: Vec<EvaluationResult>, conversations: Vec<Conversation>) -> Self {
        Self {
            evaluations: Arc::new(RwLock::new(evaluations)),
            conversations: Arc::new(RwLock::new(
                conversations
                    .into_iter()
                    .map(|c| (c.conversation_id.clone(), c))
                    .collect(),
            )),
        }
    }

    /// Parse JSON arrays of evaluation results and conversations
    pub fn from_json(evaluations: &str, conversations: &str) -> Result<Self, RepositoryError> {
        let evaluations: Vec<EvaluationResult> = serde_json::from_str(evaluations)?;
        let conversations: Vec<Conversation> = serde_json::from_str(conversations)?;
        Ok(Self::new(evaluations, conversations))
    }

    pub fn from_json_files(
        evaluations_path: impl AsRef<Path>,
        conversations_path: impl AsRef<Path>,
    ) -> Result<Self, RepositoryError> {
        let read = |path: &Path| {
            std::fs::read_to_string(path)
                .map_err(|e| RepositoryError::Storage(format!("failed to read {}: {}", path.display(), e)))
        };
        let evaluations = read(evaluations_path.as_ref())?;
        let conversations = read(conversations_path.as_ref())?;
        Self::from_json(&evaluations, &conversations)
    }

    pub fn add_evaluation(&self, evaluation: EvaluationResult) {
        self.evaluations.write().push(evaluation);
    }

    pub fn add_conversation(&self, conversation: Conversation) {
        self.conversations
            .write()
            .insert(conversation.conversation_id.clone(), conversation);
    }
}

#[async_trait]
impl EvaluationSource for InMemoryEvaluationSource {
    async fn list_evaluations(&self, limit: usize) -> Result<Vec<EvaluationResult>, RepositoryError> {
        let mut evaluations = self.evaluations.read().clone();
        evaluations.sort_by(|a, b| b.evaluated_at.cmp(&a.evaluated_at));
        evaluations.truncate(limit);
        Ok(evaluations)
    }

    async fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>, RepositoryError> {
        Ok(self.conversations.read().get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_commit_moves_pointer_and_keeps_history() {
        let repo = InMemoryArtifactRepository::seeded([ArtifactContent::Prompt("v1".to_string())]);

        let v2 = repo
            .commit(ArtifactContent::Prompt("v2".to_string()), Some(1), None)
            .await
            .unwrap();
        assert_eq!(v2.version_id, 2);
        assert!(v2.active);

        let history = repo.history(ArtifactKind::Prompt).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(!history[0].active);
        assert_eq!(history[0].content, ArtifactContent::Prompt("v1".to_string()));
        assert!(history[1].active);
    }

    #[tokio::test]
    async fn test_commit_rejects_stale_expectation() {
        let repo = InMemoryArtifactRepository::seeded([ArtifactContent::Prompt("v1".to_string())]);
        repo.commit(ArtifactContent::Prompt("v2".to_string()), Some(1), None).await.unwrap();

        let stale = repo.commit(ArtifactContent::Prompt("v2b".to_string()), Some(1), None).await;
        assert!(matches!(stale, Err(RepositoryError::Conflict(_))));
        assert_eq!(repo.history(ArtifactKind::Prompt).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_activate_unknown_version() {
        let repo = InMemoryArtifactRepository::seeded([ArtifactContent::ToolSchema(serde_json::json!({"tools": []}))]);
        assert!(matches!(
            repo.activate(ArtifactKind::ToolSchema, 9).await,
            Err(RepositoryError::NotFound(_))
        ));
        assert!(matches!(
            repo.activate(ArtifactKind::Prompt, 1).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_evaluation_source_from_json_files() {
        let evaluations = r#"[
            {"conversation_id": "c1", "evaluations": [], "aggregate_score": 1.0, "evaluated_at": "2026-03-01T10:00:00Z"},
            {"conversation_id": "c2", "evaluations": [], "aggregate_score": 0.4, "evaluated_at": "2026-03-02T10:00:00Z"}
        ]"#;
        let conversations = r#"[{"conversation_id": "c1", "turns": [{"turn_id": 1, "role": "user", "content": "hi"}]}]"#;

        let mut eval_file = tempfile::NamedTempFile::new().unwrap();
        eval_file.write_all(evaluations.as_bytes()).unwrap();
        let mut conv_file = tempfile::NamedTempFile::new().unwrap();
        conv_file.write_all(conversations.as_bytes()).unwrap();

        let source = InMemoryEvaluationSource::from_json_files(eval_file.path(), conv_file.path()).unwrap();
        let recent = source.list_evaluations(1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].conversation_id.as_str(), "c2");
        assert!(source.get_conversation(&ConversationId::new("c1")).await.unwrap().is_some());
        assert!(source.get_conversation(&ConversationId::new("c9")).await.unwrap().is_none());
    }
}
