// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Normalized evaluation issues
//!
//! An [`Issue`] is one detected defect instance tied to a conversation and
//! optionally a turn. Issues are immutable once collected and are referenced
//! by id from clusters and proposals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::evaluation::{ConversationId, Turn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IssueId(pub Uuid);

impl IssueId {
    /// Stable id for the `ordinal`-th record an evaluator reported on a conversation
    pub fn derive(conversation_id: &ConversationId, evaluator_name: &str, ordinal: usize) -> Self {
        let name = format!("issue/{}/{}/{}", conversation_id, evaluator_name, ordinal);
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()))
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            // evaluators that know a fourth level fold into the top one
            "high" | "critical" => Ok(Severity::High),
            other => Err(format!("unrecognised severity '{}'", other)),
        }
    }
}

/// Issue categories known to the evaluator stack.
///
/// Labels outside this set are kept as [`IssueType::Unknown`]; whether they
/// matter is decided by clustering and scoring, not at collection time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    // heuristic
    MissingField,
    FormatError,
    LatencyExceeded,
    // tool calls
    InvalidTool,
    InvalidParam,
    MissingParam,
    ToolHallucination,
    ExecutionFailed,
    // coherence
    ContextLoss,
    InconsistentResponse,
    ReferenceError,
    // llm judge
    LowHelpfulness,
    LowFactuality,
    LowQuality,
    Unknown(String),
}

impl IssueType {
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "missing_field" => IssueType::MissingField,
            "format_error" => IssueType::FormatError,
            "latency_exceeded" => IssueType::LatencyExceeded,
            "invalid_tool" => IssueType::InvalidTool,
            "invalid_param" => IssueType::InvalidParam,
            "missing_param" => IssueType::MissingParam,
            "tool_hallucination" => IssueType::ToolHallucination,
            "execution_failed" => IssueType::ExecutionFailed,
            "context_loss" => IssueType::ContextLoss,
            "inconsistent_response" => IssueType::InconsistentResponse,
            "reference_error" => IssueType::ReferenceError,
            "low_helpfulness" => IssueType::LowHelpfulness,
            "low_factuality" => IssueType::LowFactuality,
            "low_quality" => IssueType::LowQuality,
            _ => IssueType::Unknown(label.trim().to_string()),
        }
    }

    /// Canonical label; every unrecognised type shares the "unknown" tag
    pub fn as_str(&self) -> &str {
        match self {
            IssueType::MissingField => "missing_field",
            IssueType::FormatError => "format_error",
            IssueType::LatencyExceeded => "latency_exceeded",
            IssueType::InvalidTool => "invalid_tool",
            IssueType::InvalidParam => "invalid_param",
            IssueType::MissingParam => "missing_param",
            IssueType::ToolHallucination => "tool_hallucination",
            IssueType::ExecutionFailed => "execution_failed",
            IssueType::ContextLoss => "context_loss",
            IssueType::InconsistentResponse => "inconsistent_response",
            IssueType::ReferenceError => "reference_error",
            IssueType::LowHelpfulness => "low_helpfulness",
            IssueType::LowFactuality => "low_factuality",
            IssueType::LowQuality => "low_quality",
            IssueType::Unknown(_) => "unknown",
        }
    }

    /// Label as reported by the evaluator
    pub fn raw_label(&self) -> &str {
        match self {
            IssueType::Unknown(raw) => raw,
            known => known.as_str(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, IssueType::Unknown(_))
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub conversation_id: ConversationId,
    pub turn_id: Option<u32>,
    pub evaluator_name: String,
    pub issue_type: IssueType,
    pub severity: Severity,
    pub description: String,
    pub suggested_fix: Option<String>,
    pub detected_at: DateTime<Utc>,
    /// Ordered turns surrounding `turn_id`; empty when the issue has no turn
    pub context_window: Vec<Turn>,
}

impl Issue {
    /// Text handed to the embedding capability.
    ///
    /// Kept high level by default so that patterns group together even when
    /// user-specific values in the conversation differ.
    pub fn embedding_text(&self, include_context: bool) -> String {
        let mut text = format!("Type: {} | Issue: {}", self.issue_type.as_str(), self.description);
        if include_context && !self.context_window.is_empty() {
            let context: Vec<String> = self.context_window.iter().map(Turn::render).collect();
            text.push_str(" | Context: ");
            text.push_str(&context.join(" / "));
        }
        text
    }
}
