// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Regression Verifier
//!
//! Runs the fixed battery against a baseline and a candidate artifact
//! version and computes the verdict.
//!
//! Both sides of a comparison always see the same cases. Scenario runs go
//! through a bounded pool; the verdict is computed only once every case has
//! finished. A case whose baseline or candidate run fails after its retry
//! is excluded from the deltas. When more than half the battery fails the
//! comparison is aborted.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::resilience::{call_with_retry, escalate};
use crate::domain::artifact::ArtifactVersion;
use crate::domain::capability::AgentRunner;
use crate::domain::config::{RegressionConfig, TimeoutConfig};
use crate::domain::error::AnalysisError;
use crate::domain::proposal::ProposalId;
use crate::domain::regression::{
    RegressionBattery, RegressionReport, RegressionReportId, RegressionTestCase, RegressionVerdict, ScoreDelta,
};

pub struct RegressionVerifier {
    runner: Arc<dyn AgentRunner>,
    battery: Arc<RegressionBattery>,
    config: RegressionConfig,
    timeouts: TimeoutConfig,
}

impl RegressionVerifier {
    pub fn new(
        runner: Arc<dyn AgentRunner>,
        battery: Arc<RegressionBattery>,
        config: RegressionConfig,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self { runner, battery, config, timeouts }
    }

    pub fn battery(&self) -> &RegressionBattery {
        &self.battery
    }

    pub async fn compare(
        &self,
        proposal_id: ProposalId,
        baseline: &ArtifactVersion,
        candidate: &ArtifactVersion,
    ) -> Result<RegressionReport, AnalysisError> {
        if self.battery.is_empty() {
            return Err(AnalysisError::Configuration(format!(
                "regression battery '{}' has no test cases",
                self.battery.name
            )));
        }

        // Collected first: a borrowing `map` closure inside the stream makes this future non-Send
        let runs: Vec<_> = self
            .battery
            .cases
            .iter()
            .map(|case| self.run_case(case, baseline, candidate))
            .collect();
        let outcomes: Vec<Result<ScoreDelta, AnalysisError>> = stream::iter(runs)
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut deltas = Vec::with_capacity(outcomes.len());
        let mut failed_cases = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(delta) => deltas.push(delta),
                Err(AnalysisError::RegressionExecutionFailure { test_id, reason }) => {
                    warn!(%proposal_id, test_id = %test_id, reason = %reason, "Regression case could not be scored");
                    metrics::counter!("refinery_regression_case_failures_total").increment(1);
                    failed_cases.push(test_id);
                }
                Err(other) => return Err(other),
            }
        }

        let total = self.battery.len();
        if failed_cases.len() * 2 > total {
            return Err(AnalysisError::RegressionAborted { failed: failed_cases.len(), total });
        }

        let verdict = RegressionVerdict::evaluate(&deltas, self.config.epsilon);
        info!(
            %proposal_id,
            scored = deltas.len(),
            failed = failed_cases.len(),
            improvement_ratio = verdict.improvement_ratio,
            overall_improvement = verdict.overall_improvement,
            "Regression comparison finished"
        );

        Ok(RegressionReport {
            id: RegressionReportId::new(),
            proposal_id,
            battery_version: self.battery.version.clone(),
            baseline_version: baseline.version_id,
            candidate_version: candidate.version_id,
            test_cases_count: deltas.len(),
            score_deltas: deltas,
            failed_cases,
            mean_baseline: verdict.mean_baseline,
            mean_candidate: verdict.mean_candidate,
            overall_improvement: verdict.overall_improvement,
            created_at: chrono::Utc::now(),
        })
    }

    async fn run_case(
        &self,
        case: &RegressionTestCase,
        baseline: &ArtifactVersion,
        candidate: &ArtifactVersion,
    ) -> Result<ScoreDelta, AnalysisError> {
        let timeout = self.timeouts.agent_run;
        let backoff = self.timeouts.retry_backoff;

        let (base, cand) = tokio::join!(
            call_with_retry("agent_run", timeout, backoff, || self.runner.run(baseline, &case.scenario)),
            call_with_retry("agent_run", timeout, backoff, || self.runner.run(candidate, &case.scenario)),
        );

        let failure = |side: &str, err: crate::domain::capability::CapabilityError| {
            AnalysisError::RegressionExecutionFailure {
                test_id: case.test_id.clone(),
                reason: format!("{} run failed: {}", side, escalate(err)),
            }
        };
        let base = base.map_err(|err| failure("baseline", err))?;
        let cand = cand.map_err(|err| failure("candidate", err))?;

        Ok(ScoreDelta::new(case.test_id.clone(), base, cand))
    }
}
