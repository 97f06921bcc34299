// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Regression battery and reports
//!
//! A [`RegressionBattery`] is a fixed, ordered, versionable set of scenarios.
//! Both sides of a comparison always run the full battery, so reports from
//! different verification runs stay comparable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::proposal::ProposalId;

/// Input handed to the agent-execution capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub input: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTestCase {
    pub test_id: String,
    pub scenario: Scenario,
    /// Grading rubric consumed by the evaluator stack behind the runner
    pub rubric: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionBattery {
    pub name: String,
    pub version: String,
    pub cases: Vec<RegressionTestCase>,
}

impl RegressionBattery {
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDelta {
    pub test_id: String,
    pub baseline_score: f64,
    pub candidate_score: f64,
    pub is_improvement: bool,
}

impl ScoreDelta {
    pub fn new(test_id: impl Into<String>, baseline_score: f64, candidate_score: f64) -> Self {
        Self {
            test_id: test_id.into(),
            baseline_score,
            candidate_score,
            is_improvement: candidate_score > baseline_score,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegressionReportId(pub Uuid);

impl RegressionReportId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RegressionReportId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionReport {
    pub id: RegressionReportId,
    pub proposal_id: ProposalId,
    pub battery_version: String,
    pub baseline_version: u32,
    pub candidate_version: u32,
    /// Successfully scored cases only
    pub test_cases_count: usize,
    pub score_deltas: Vec<ScoreDelta>,
    /// Cases that could not be scored on either side
    pub failed_cases: Vec<String>,
    pub mean_baseline: f64,
    pub mean_candidate: f64,
    pub overall_improvement: bool,
    pub created_at: DateTime<Utc>,
}

/// Aggregate verdict over the scored cases of one comparison
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionVerdict {
    pub improvement_ratio: f64,
    pub mean_baseline: f64,
    pub mean_candidate: f64,
    pub overall_improvement: bool,
}

impl RegressionVerdict {
    /// More than half the scored cases must improve, and the mean candidate
    /// score may not drop below the mean baseline by more than `epsilon`.
    /// The mean guard keeps many marginal wins from hiding a severe loss.
    pub fn evaluate(deltas: &[ScoreDelta], epsilon: f64) -> Self {
        if deltas.is_empty() {
            return Self {
                improvement_ratio: 0.0,
                mean_baseline: 0.0,
                mean_candidate: 0.0,
                overall_improvement: false,
            };
        }
        let n = deltas.len() as f64;
        let wins = deltas.iter().filter(|d| d.is_improvement).count() as f64;
        let mean_baseline = deltas.iter().map(|d| d.baseline_score).sum::<f64>() / n;
        let mean_candidate = deltas.iter().map(|d| d.candidate_score).sum::<f64>() / n;
        let improvement_ratio = wins / n;
        Self {
            improvement_ratio,
            mean_baseline,
            mean_candidate,
            overall_improvement: improvement_ratio > 0.5 && mean_candidate >= mean_baseline - epsilon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_majority_with_mean_guard() {
        let deltas = vec![
            ScoreDelta::new("a", 0.5, 0.6),
            ScoreDelta::new("b", 0.5, 0.6),
            ScoreDelta::new("c", 0.5, 0.4),
        ];
        let verdict = RegressionVerdict::evaluate(&deltas, 0.05);
        assert!(verdict.overall_improvement);
        assert!((verdict.improvement_ratio - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_marginal_wins_do_not_mask_severe_regression() {
        let deltas = vec![
            ScoreDelta::new("a", 0.50, 0.51),
            ScoreDelta::new("b", 0.50, 0.51),
            ScoreDelta::new("c", 0.90, 0.10),
        ];
        let verdict = RegressionVerdict::evaluate(&deltas, 0.05);
        assert!(verdict.improvement_ratio > 0.5);
        assert!(!verdict.overall_improvement);
    }

    #[test]
    fn test_exact_half_is_not_improvement() {
        let deltas = vec![ScoreDelta::new("a", 0.5, 0.9), ScoreDelta::new("b", 0.5, 0.5)];
        assert!(!RegressionVerdict::evaluate(&deltas, 0.0).overall_improvement);
    }

    #[test]
    fn test_equal_scores_are_not_improvements() {
        assert!(!ScoreDelta::new("a", 0.7, 0.7).is_improvement);
    }
}
