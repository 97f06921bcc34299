// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod resilience;
pub mod issue_collector;
pub mod embedder;
pub mod significance;
pub mod cluster_engine;
pub mod proposal_generator;
pub mod regression_verifier;
pub mod proposal_service;
pub mod analysis_service;

// Re-export services for convenience
pub use issue_collector::{CollectionOutcome, IssueCollector};
pub use embedder::{EmbeddedIssue, EmbeddingOutcome, IssueEmbedder};
pub use significance::SignificanceScorer;
pub use cluster_engine::ClusterEngine;
pub use proposal_generator::{GenerationRun, ProposalGenerator};
pub use regression_verifier::RegressionVerifier;
pub use proposal_service::{ProposalStore, StandardProposalService};
pub use analysis_service::AnalysisService;
