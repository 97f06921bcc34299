// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Cluster Engine
//!
//! Single-pass greedy grouping of issue vectors by cosine similarity to
//! each cluster's running centroid.
//!
//! # Determinism
//!
//! Input is sorted by (issue type, detected_at, issue id) before the pass,
//! similarity ties go to the cluster opened first, and cluster ids derive
//! from sorted member ids. The same input always yields the same clusters
//! in the same order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::application::embedder::EmbeddedIssue;
use crate::application::significance::SignificanceScorer;
use crate::domain::cluster::{cosine_similarity, Cluster, ClusterId};
use crate::domain::config::ClusteringConfig;

pub struct ClusterEngine {
    config: ClusteringConfig,
    scorer: SignificanceScorer,
}

struct Group {
    creation_index: usize,
    members: Vec<usize>,
    sum: Vec<f64>,
    centroid: Vec<f32>,
}

impl Group {
    fn open(creation_index: usize, member: usize, vector: &[f32]) -> Self {
        Self {
            creation_index,
            members: vec![member],
            sum: vector.iter().map(|x| *x as f64).collect(),
            centroid: vector.to_vec(),
        }
    }

    fn absorb(&mut self, member: usize, vector: &[f32]) {
        self.members.push(member);
        for (acc, x) in self.sum.iter_mut().zip(vector) {
            *acc += *x as f64;
        }
        let n = self.members.len() as f64;
        self.centroid = self.sum.iter().map(|acc| (acc / n) as f32).collect();
    }
}

impl ClusterEngine {
    pub fn new(config: ClusteringConfig, scorer: SignificanceScorer) -> Self {
        Self { config, scorer }
    }

    pub fn scorer(&self) -> &SignificanceScorer {
        &self.scorer
    }

    /// Group issues into scored clusters, ranked by significance
    pub fn cluster(&self, issues: &[EmbeddedIssue]) -> Vec<Cluster> {
        let mut order: Vec<usize> = (0..issues.len()).collect();
        order.sort_by(|a, b| stable_order(&issues[*a], &issues[*b]));

        let mut groups: Vec<Group> = Vec::new();
        for index in order {
            let vector = issues[index].vector.as_slice();

            let mut best: Option<(usize, f64)> = None;
            for (slot, group) in groups.iter().enumerate() {
                let similarity = cosine_similarity(&group.centroid, vector);
                if similarity < self.config.similarity_threshold {
                    continue;
                }
                // Strict comparison keeps the earlier group on ties
                if best.map_or(true, |(_, best_similarity)| similarity > best_similarity) {
                    best = Some((slot, similarity));
                }
            }

            match best {
                Some((slot, _)) => groups[slot].absorb(index, vector),
                None => {
                    let creation_index = groups.len();
                    groups.push(Group::open(creation_index, index, vector));
                }
            }
        }

        let opened = groups.len();
        let mut clusters: Vec<Cluster> = groups
            .into_iter()
            .filter(|group| group.members.len() >= self.config.min_support)
            .map(|group| build_cluster(group, issues))
            .collect();
        debug!(opened, supported = clusters.len(), "Greedy pass finished");

        self.scorer.rank(&mut clusters);
        if clusters.len() > self.config.max_clusters {
            debug!(
                surviving = clusters.len(),
                max_clusters = self.config.max_clusters,
                "Truncating to the most significant clusters"
            );
            clusters.truncate(self.config.max_clusters);
        }

        metrics::histogram!("refinery_cluster_count").record(clusters.len() as f64);
        info!(issues = issues.len(), clusters = clusters.len(), "Clustered issues");
        clusters
    }
}

fn stable_order(a: &EmbeddedIssue, b: &EmbeddedIssue) -> Ordering {
    a.issue
        .issue_type
        .as_str()
        .cmp(b.issue.issue_type.as_str())
        .then_with(|| a.issue.detected_at.cmp(&b.issue.detected_at))
        .then_with(|| a.issue.id.cmp(&b.issue.id))
}

fn build_cluster(group: Group, issues: &[EmbeddedIssue]) -> Cluster {
    let mut distribution: BTreeMap<String, usize> = BTreeMap::new();
    let mut conversations = BTreeSet::new();
    let mut member_ids = Vec::with_capacity(group.members.len());

    for index in &group.members {
        let issue = &issues[*index].issue;
        *distribution.entry(issue.issue_type.as_str().to_string()).or_insert(0) += 1;
        conversations.insert(issue.conversation_id.clone());
        member_ids.push(issue.id);
    }

    Cluster {
        id: ClusterId::from_members(&member_ids),
        creation_index: group.creation_index,
        member_issue_ids: member_ids,
        centroid: group.centroid,
        issue_type_distribution: distribution,
        conversation_ids: conversations,
        significance_score: 0.0,
    }
}
