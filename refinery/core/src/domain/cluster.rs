// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Failure-pattern clusters
//!
//! Clusters are ephemeral: they are recomputed from scratch every analysis
//! cycle and carry no identity across cycles beyond an id derived from
//! their members.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

use super::evaluation::ConversationId;
use super::issue::IssueId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterId(pub Uuid);

impl ClusterId {
    /// Derive the id from the member set so identical input yields identical ids
    pub fn from_members(members: &[IssueId]) -> Self {
        let mut sorted: Vec<&IssueId> = members.iter().collect();
        sorted.sort();
        let mut name = String::from("cluster");
        for id in sorted {
            name.push('/');
            name.push_str(&id.0.to_string());
        }
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    /// Order in which the greedy pass opened this cluster
    pub creation_index: usize,
    pub member_issue_ids: Vec<IssueId>,
    /// Running mean of member vectors
    pub centroid: Vec<f32>,
    pub issue_type_distribution: BTreeMap<String, usize>,
    pub conversation_ids: BTreeSet<ConversationId>,
    pub significance_score: f64,
}

impl Cluster {
    pub fn member_count(&self) -> usize {
        self.member_issue_ids.len()
    }

    /// Number of distinct conversations the members come from
    pub fn conversation_coverage(&self) -> usize {
        self.conversation_ids.len()
    }

    /// Most frequent member issue type; ties resolve to the lexically smallest label
    pub fn dominant_issue_type(&self) -> Option<&str> {
        let mut best: Option<(&str, usize)> = None;
        for (label, count) in &self.issue_type_distribution {
            match best {
                Some((_, best_count)) if *count <= best_count => {}
                _ => best = Some((label.as_str(), *count)),
            }
        }
        best.map(|(label, _)| label)
    }
}

/// Cosine similarity in [-1, 1]; zero-length or mismatched vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-9);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cluster_id_ignores_member_order() {
        let a = IssueId(Uuid::new_v4());
        let b = IssueId(Uuid::new_v4());
        assert_eq!(ClusterId::from_members(&[a, b]), ClusterId::from_members(&[b, a]));
    }

    #[test]
    fn test_dominant_issue_type_tie_break() {
        let mut distribution = BTreeMap::new();
        distribution.insert("invalid_param".to_string(), 2);
        distribution.insert("context_loss".to_string(), 2);
        distribution.insert("format_error".to_string(), 1);
        let cluster = Cluster {
            id: ClusterId(Uuid::new_v4()),
            creation_index: 0,
            member_issue_ids: vec![],
            centroid: vec![],
            issue_type_distribution: distribution,
            conversation_ids: BTreeSet::new(),
            significance_score: 0.0,
        };
        assert_eq!(cluster.dominant_issue_type(), Some("context_loss"));
    }
}
