// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Evaluation inputs consumed from external collaborators.
//!
//! Conversations and evaluation results are produced upstream (ingestion and
//! the evaluator stack). The refinery only reads them, keyed by
//! [`ConversationId`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// A single turn of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub turn_id: u32,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl Turn {
    /// Render the turn as a single line, including tool names when present
    pub fn render(&self) -> String {
        let role = match self.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        if self.tool_calls.is_empty() {
            format!("{}: {}", role, self.content)
        } else {
            let tools: Vec<&str> = self.tool_calls.iter().map(|t| t.tool_name.as_str()).collect();
            format!("{}: {} | Tools used: {}", role, self.content, tools.join(", "))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: ConversationId,
    pub turns: Vec<Turn>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Conversation {
    pub fn position_of(&self, turn_id: u32) -> Option<usize> {
        self.turns.iter().position(|t| t.turn_id == turn_id)
    }
}

/// Issue-like record as emitted by an evaluator, before normalization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawIssue {
    pub issue_type: String,
    pub severity: String,
    pub description: String,
    #[serde(default)]
    pub turn_id: Option<u32>,
    #[serde(default)]
    pub suggested_fix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorResult {
    pub evaluator_name: String,
    #[serde(default)]
    pub issues: Vec<RawIssue>,
}

/// Complete evaluation of one conversation across all evaluators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub conversation_id: ConversationId,
    #[serde(default)]
    pub evaluations: Vec<EvaluatorResult>,
    #[serde(default)]
    pub aggregate_score: f64,
    pub evaluated_at: DateTime<Utc>,
}

impl EvaluationResult {
    pub fn has_issues(&self) -> bool {
        self.evaluations.iter().any(|e| !e.issues.is_empty())
    }

    pub fn issue_count(&self) -> usize {
        self.evaluations.iter().map(|e| e.issues.len()).sum()
    }
}
