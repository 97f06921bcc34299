// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Significance Scorer
//!
//! `score = Σ weight(issue_type) × count × (1 + ln(conversation_coverage))`
//!
//! Ranking is descending by score, then larger coverage, then earlier
//! creation index.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::domain::cluster::Cluster;
use crate::domain::config::ScoringConfig;

#[derive(Debug, Clone)]
pub struct SignificanceScorer {
    weights: HashMap<String, f64>,
    default_weight: f64,
}

impl SignificanceScorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            weights: config.issue_type_weights.clone(),
            default_weight: config.default_weight,
        }
    }

    /// Weight of an issue type label; unlisted labels (including "unknown") use the default
    pub fn weight(&self, issue_type: &str) -> f64 {
        self.weights.get(issue_type).copied().unwrap_or(self.default_weight)
    }

    pub fn score(&self, cluster: &Cluster) -> f64 {
        let weight_sum: f64 = cluster
            .issue_type_distribution
            .iter()
            .map(|(label, count)| self.weight(label) * *count as f64)
            .sum();

        let coverage = cluster.conversation_coverage();
        if coverage == 0 {
            return weight_sum;
        }
        weight_sum * (1.0 + (coverage as f64).ln())
    }

    pub fn compare(a: &Cluster, b: &Cluster) -> Ordering {
        b.significance_score
            .total_cmp(&a.significance_score)
            .then_with(|| b.conversation_coverage().cmp(&a.conversation_coverage()))
            .then_with(|| a.creation_index.cmp(&b.creation_index))
    }

    /// Score every cluster in place and sort by rank
    pub fn rank(&self, clusters: &mut [Cluster]) {
        for cluster in clusters.iter_mut() {
            cluster.significance_score = self.score(cluster);
        }
        clusters.sort_by(Self::compare);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cluster::ClusterId;
    use crate::domain::evaluation::ConversationId;
    use std::collections::{BTreeMap, BTreeSet};
    use uuid::Uuid;

    fn cluster(creation_index: usize, types: &[(&str, usize)], conversations: &[&str]) -> Cluster {
        Cluster {
            id: ClusterId(Uuid::new_v4()),
            creation_index,
            member_issue_ids: vec![],
            centroid: vec![],
            issue_type_distribution: types.iter().map(|(t, n)| (t.to_string(), *n)).collect::<BTreeMap<_, _>>(),
            conversation_ids: conversations.iter().map(|c| ConversationId::new(*c)).collect::<BTreeSet<_>>(),
            significance_score: 0.0,
        }
    }

    #[test]
    fn test_score_formula() {
        let scorer = SignificanceScorer::new(&ScoringConfig::default());

        let hallucinations = cluster(0, &[("tool_hallucination", 3)], &["c1", "c2", "c3"]);
        assert!((scorer.score(&hallucinations) - 9.0 * (1.0 + 3f64.ln())).abs() < 1e-9);

        let single = cluster(1, &[("format_error", 2)], &["c4"]);
        assert!((scorer.score(&single) - 2.0).abs() < 1e-9);

        let unknown = cluster(2, &[("unknown", 2)], &["c4"]);
        assert!((scorer.score(&unknown) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_new_conversation_outweighs_repeat() {
        let scorer = SignificanceScorer::new(&ScoringConfig::default());
        let base = cluster(0, &[("context_loss", 2)], &["c1", "c2"]);
        let repeat = cluster(0, &[("context_loss", 3)], &["c1", "c2"]);
        let spread = cluster(0, &[("context_loss", 3)], &["c1", "c2", "c3"]);

        let base_score = scorer.score(&base);
        assert!(scorer.score(&spread) - base_score > scorer.score(&repeat) - base_score);
    }

    #[test]
    fn test_rank_tie_breaks() {
        let scorer = SignificanceScorer::new(&ScoringConfig {
            issue_type_weights: HashMap::new(),
            default_weight: 1.0,
        });
        // Same score (2 × 1 × (1 + ln 1) = 2), different creation order
        let mut clusters = vec![
            cluster(3, &[("a", 2)], &["c1"]),
            cluster(1, &[("b", 2)], &["c2"]),
            cluster(0, &[("c", 4)], &["c3", "c4"]),
        ];
        scorer.rank(&mut clusters);

        let order: Vec<usize> = clusters.iter().map(|c| c.creation_index).collect();
        assert_eq!(order, vec![0, 1, 3]);
    }
}
