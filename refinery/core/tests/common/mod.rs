// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Deterministic capability doubles and fixtures shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;

use refinery_core::domain::artifact::{ArtifactContent, ArtifactVersion};
use refinery_core::domain::capability::{
    AgentRunner, CapabilityError, ContentGenerator, GenerationOutput, GenerationRequest, TextEmbedder,
};
use refinery_core::domain::evaluation::{
    Conversation, ConversationId, EvaluationResult, EvaluatorResult, RawIssue, Role, Turn,
};
use refinery_core::domain::regression::{RegressionBattery, RegressionTestCase, Scenario};

/// One-hot embedder: dimension `i` is set when the text contains `KEYWORDS[i]`
pub struct KeywordEmbedder;

pub const KEYWORDS: [&str; 13] = [
    "refund", "mm/dd", "forgot", "currency", "timezone", "baggage", "loyalty", "seat", "visa", "insurance",
    "upgrade", "meal", "weather",
];

#[async_trait]
impl TextEmbedder for KeywordEmbedder {
    fn model_version(&self) -> &str {
        "keyword-v1"
    }

    fn dimension(&self) -> usize {
        KEYWORDS.len()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CapabilityError> {
        let text = text.to_lowercase();
        Ok(KEYWORDS
            .iter()
            .map(|k| if text.contains(k) { 1.0 } else { 0.0 })
            .collect())
    }
}

/// Appends a rule to prompts and a note to tool schemas; fails for seeds in `fail_on`
#[derive(Default)]
pub struct ScriptedGenerator {
    pub fail_on: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn failing_on(issue_type: &str) -> Self {
        Self {
            fail_on: HashSet::from([issue_type.to_string()]),
            calls: Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, CapabilityError> {
        self.calls.lock().push(request.failure_pattern_seed.clone());
        if self.fail_on.iter().any(|t| request.failure_pattern_seed.starts_with(t.as_str())) {
            return Err(CapabilityError::Provider("model refused".to_string()));
        }

        let proposed_content = match &request.original_content {
            ArtifactContent::Prompt(text) => format!("{}\nRule: address {}", text, request.failure_pattern_seed),
            ArtifactContent::ToolSchema(doc) => {
                let mut doc = doc.clone();
                doc["notes"] = serde_json::json!(format!("address {}", request.failure_pattern_seed));
                doc.to_string()
            }
        };
        Ok(GenerationOutput {
            proposed_content,
            rationale: format!("{} evidence items point at the same gap", request.evidence.len()),
            failure_pattern: None,
        })
    }
}

/// Scores scenario `i`: candidate version wins on `i < wins`, case `i` fails for `i` in `broken`
pub struct ScriptedRunner {
    pub candidate_version: u32,
    pub wins: usize,
    pub broken: Vec<usize>,
}

#[async_trait]
impl AgentRunner for ScriptedRunner {
    async fn run(&self, version: &ArtifactVersion, scenario: &Scenario) -> Result<f64, CapabilityError> {
        let index: usize = scenario
            .input
            .parse()
            .map_err(|_| CapabilityError::InvalidOutput("scenario input is not an index".to_string()))?;
        if self.broken.contains(&index) {
            return Err(CapabilityError::Provider("sandbox crashed".to_string()));
        }
        if version.version_id != self.candidate_version {
            return Ok(0.70);
        }
        Ok(if index < self.wins { 0.80 } else { 0.69 })
    }
}

pub fn battery(size: usize) -> RegressionBattery {
    RegressionBattery {
        name: "travel-agent".to_string(),
        version: "2026.03".to_string(),
        cases: (0..size)
            .map(|i| RegressionTestCase {
                test_id: format!("case-{:02}", i),
                scenario: Scenario { input: i.to_string(), metadata: serde_json::Value::Null },
                rubric: "completes the booking without inventing tools".to_string(),
            })
            .collect(),
    }
}

pub fn initial_prompt() -> ArtifactContent {
    ArtifactContent::Prompt("You are a travel booking assistant.".to_string())
}

pub fn initial_tool_schema() -> ArtifactContent {
    ArtifactContent::ToolSchema(serde_json::json!({
        "tools": [{"name": "search_flights", "parameters": {"origin": "string", "destination": "string"}}]
    }))
}

pub fn conversation(id: &str, turns: u32) -> Conversation {
    Conversation {
        conversation_id: ConversationId::new(id),
        turns: (1..=turns)
            .map(|n| Turn {
                turn_id: n,
                role: if n % 2 == 1 { Role::User } else { Role::Assistant },
                content: format!("{} turn {}", id, n),
                tool_calls: vec![],
            })
            .collect(),
        metadata: serde_json::Value::Null,
    }
}

pub fn raw(issue_type: &str, severity: &str, description: &str, turn_id: u32) -> RawIssue {
    RawIssue {
        issue_type: issue_type.to_string(),
        severity: severity.to_string(),
        description: description.to_string(),
        turn_id: Some(turn_id),
        suggested_fix: None,
    }
}

/// Evaluation of conversation `cN`, evaluated `n` minutes after a fixed epoch
pub fn evaluation(n: u32, issues: Vec<RawIssue>) -> EvaluationResult {
    EvaluationResult {
        conversation_id: ConversationId::new(format!("c{}", n)),
        evaluations: vec![EvaluatorResult { evaluator_name: "llm_judge".to_string(), issues }],
        aggregate_score: 0.5,
        evaluated_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(n as i64),
    }
}

/// 15 conversations, 18 issues: three recurring patterns plus ten one-offs
///
/// - tool_hallucination × 3 in c1, c2, c3 (weight 3, coverage 3)
/// - format_error × 2 in c4 (weight 1, coverage 1)
/// - context_loss × 3 in c5, c5, c6 (weight 2, coverage 2)
/// - one unrelated issue in each of c6..c15
pub fn scenario() -> (Vec<EvaluationResult>, Vec<Conversation>) {
    let singletons = [
        ("low_helpfulness", "price shown without currency"),
        ("low_quality", "times given in the wrong timezone"),
        ("low_helpfulness", "ignored the baggage question"),
        ("missing_field", "loyalty number not requested"),
        ("low_quality", "seat map described incorrectly"),
        ("low_factuality", "wrong visa requirements"),
        ("low_helpfulness", "travel insurance never offered"),
        ("inconsistent_response", "upgrade price changed mid-conversation"),
        ("missing_field", "meal preference not recorded"),
        ("low_helpfulness", "answered with the weather instead of flights"),
    ];

    let mut evaluations = vec![
        evaluation(1, vec![raw("tool_hallucination", "high", "Called a refund tool that does not exist", 2)]),
        evaluation(2, vec![raw("tool_hallucination", "high", "Invented refund tool to cancel booking", 4)]),
        evaluation(3, vec![raw("tool_hallucination", "critical", "Promised a refund tool call", 2)]),
        evaluation(
            4,
            vec![
                raw("format_error", "low", "Departure date written as MM/DD", 2),
                raw("format_error", "low", "Return date written as MM/DD", 4),
            ],
        ),
        evaluation(
            5,
            vec![
                raw("context_loss", "medium", "Forgot the destination city", 4),
                raw("context_loss", "medium", "Forgot the passenger count", 6),
            ],
        ),
    ];

    let mut c6_issues = vec![raw("context_loss", "medium", "Forgot the travel dates", 2)];
    c6_issues.push(raw(singletons[0].0, "low", singletons[0].1, 4));
    evaluations.push(evaluation(6, c6_issues));

    for (offset, (issue_type, description)) in singletons.iter().enumerate().skip(1) {
        let n = 6 + offset as u32;
        evaluations.push(evaluation(n, vec![raw(issue_type, "low", description, 2)]));
    }

    let conversations = (1..=15).map(|n| conversation(&format!("c{}", n), 6)).collect();
    (evaluations, conversations)
}
