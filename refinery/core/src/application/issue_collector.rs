// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Issue Collector
//!
//! Flattens per-evaluator output into `Issue` records and attaches the
//! surrounding conversation turns.
//!
//! # DDD Pattern: Domain Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Normalize raw evaluation output
//! - **Collaborators:** `EvaluationResult`, `Conversation`
//!
//! # Soft failures
//!
//! - Conversation not found: every issue of that evaluation is dropped
//! - Bad turn reference, empty description, unknown severity: the record is
//!   skipped as a validation error
//!
//! Both are counted and the batch continues.

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::domain::config::CollectorConfig;
use crate::domain::error::AnalysisError;
use crate::domain::evaluation::{Conversation, ConversationId, EvaluationResult, RawIssue, Turn};
use crate::domain::issue::{Issue, IssueId, IssueType, Severity};

#[derive(Debug, Default)]
pub struct CollectionOutcome {
    pub issues: Vec<Issue>,
    /// Issues dropped because their conversation could not be resolved
    pub unresolved: usize,
    /// Records rejected by validation
    pub invalid: usize,
}

impl CollectionOutcome {
    pub fn dropped(&self) -> usize {
        self.unresolved + self.invalid
    }
}

pub struct IssueCollector {
    context_radius: usize,
}

impl IssueCollector {
    pub fn new(config: &CollectorConfig) -> Self {
        Self { context_radius: config.context_radius }
    }

    pub fn collect(
        &self,
        evaluations: &[EvaluationResult],
        conversations: &HashMap<ConversationId, Conversation>,
    ) -> CollectionOutcome {
        let mut outcome = CollectionOutcome::default();

        for evaluation in evaluations.iter().filter(|e| e.has_issues()) {
            let Some(conversation) = conversations.get(&evaluation.conversation_id) else {
                let lost = evaluation.issue_count();
                warn!(
                    conversation_id = %evaluation.conversation_id,
                    issues = lost,
                    "Conversation not found, dropping its issues"
                );
                metrics::counter!("refinery_issues_dropped_total", "reason" => "unresolved_conversation")
                    .increment(lost as u64);
                outcome.unresolved += lost;
                continue;
            };

            for evaluator in &evaluation.evaluations {
                for (ordinal, raw) in evaluator.issues.iter().enumerate() {
                    match self.normalize(evaluation, &evaluator.evaluator_name, ordinal, raw, conversation) {
                        Ok(issue) => outcome.issues.push(issue),
                        Err(err) => {
                            debug!(
                                conversation_id = %evaluation.conversation_id,
                                evaluator = %evaluator.evaluator_name,
                                ordinal,
                                error = %err,
                                "Skipping invalid issue record"
                            );
                            metrics::counter!("refinery_issues_dropped_total", "reason" => "validation")
                                .increment(1);
                            outcome.invalid += 1;
                        }
                    }
                }
            }
        }

        if outcome.dropped() > 0 {
            warn!(
                unresolved = outcome.unresolved,
                invalid = outcome.invalid,
                "Some issue records were dropped during collection"
            );
        }

        outcome
    }

    fn normalize(
        &self,
        evaluation: &EvaluationResult,
        evaluator_name: &str,
        ordinal: usize,
        raw: &RawIssue,
        conversation: &Conversation,
    ) -> Result<Issue, AnalysisError> {
        let description = raw.description.trim();
        if description.is_empty() {
            return Err(AnalysisError::Validation("issue description is empty".to_string()));
        }

        let severity: Severity = raw.severity.parse().map_err(AnalysisError::Validation)?;
        let context_window = context_window(conversation, raw.turn_id, self.context_radius)?;

        Ok(Issue {
            id: IssueId::derive(&evaluation.conversation_id, evaluator_name, ordinal),
            conversation_id: evaluation.conversation_id.clone(),
            turn_id: raw.turn_id,
            evaluator_name: evaluator_name.to_string(),
            issue_type: IssueType::parse(&raw.issue_type),
            severity,
            description: description.to_string(),
            suggested_fix: raw.suggested_fix.clone().filter(|fix| !fix.trim().is_empty()),
            detected_at: evaluation.evaluated_at,
            context_window,
        })
    }
}

/// Turns within `radius` positions of `turn_id`, in conversation order.
///
/// No turn reference yields an empty window; a reference to a turn the
/// conversation does not contain is a validation error.
pub fn context_window(
    conversation: &Conversation,
    turn_id: Option<u32>,
    radius: usize,
) -> Result<Vec<Turn>, AnalysisError> {
    let Some(turn_id) = turn_id else {
        return Ok(Vec::new());
    };
    let position = conversation.position_of(turn_id).ok_or_else(|| {
        AnalysisError::Validation(format!(
            "turn {} does not exist in conversation {}",
            turn_id, conversation.conversation_id
        ))
    })?;

    let start = position.saturating_sub(radius);
    let end = (position + radius + 1).min(conversation.turns.len());
    Ok(conversation.turns[start..end].to_vec())
}
