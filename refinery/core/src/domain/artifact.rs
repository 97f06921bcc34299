// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Versioned agent artifacts
//!
//! The agent under evaluation consumes two artifacts: its instruction prompt
//! and its tool schema. Each kind has an append-only ledger of
//! [`ArtifactVersion`]s with exactly one active version. Rollback reactivates
//! an earlier entry; no entry is ever mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::proposal::ProposalId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Prompt,
    ToolSchema,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Prompt, ArtifactKind::ToolSchema];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Prompt => "prompt",
            ArtifactKind::ToolSchema => "tool_schema",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Artifact payload, tagged by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum ArtifactContent {
    Prompt(String),
    ToolSchema(serde_json::Value),
}

impl ArtifactContent {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            ArtifactContent::Prompt(_) => ArtifactKind::Prompt,
            ArtifactContent::ToolSchema(_) => ArtifactKind::ToolSchema,
        }
    }

    /// Parse generated text into content of the given kind
    pub fn parse(kind: ArtifactKind, text: &str) -> Result<Self, String> {
        match kind {
            ArtifactKind::Prompt => Ok(ArtifactContent::Prompt(text.to_string())),
            ArtifactKind::ToolSchema => serde_json::from_str(text.trim())
                .map(ArtifactContent::ToolSchema)
                .map_err(|e| format!("tool schema is not valid JSON: {}", e)),
        }
    }

    /// Text form handed to generation and agent-execution capabilities
    pub fn render(&self) -> String {
        match self {
            ArtifactContent::Prompt(text) => text.clone(),
            ArtifactContent::ToolSchema(doc) => {
                serde_json::to_string_pretty(doc).unwrap_or_else(|_| doc.to_string())
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ArtifactContent::Prompt(text) => text.trim().is_empty(),
            ArtifactContent::ToolSchema(serde_json::Value::Null) => true,
            ArtifactContent::ToolSchema(serde_json::Value::Object(map)) => map.is_empty(),
            ArtifactContent::ToolSchema(serde_json::Value::Array(items)) => items.is_empty(),
            ArtifactContent::ToolSchema(_) => false,
        }
    }

    /// Whether two payloads would leave the agent's behaviour unchanged.
    ///
    /// Prompts compare with surrounding whitespace ignored; tool schemas
    /// compare as JSON documents, so key order and formatting do not count.
    pub fn is_equivalent(&self, other: &ArtifactContent) -> bool {
        match (self, other) {
            (ArtifactContent::Prompt(a), ArtifactContent::Prompt(b)) => a.trim() == b.trim(),
            (ArtifactContent::ToolSchema(a), ArtifactContent::ToolSchema(b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactVersion {
    pub artifact_kind: ArtifactKind,
    /// Per-kind sequence number starting at 1
    pub version_id: u32,
    pub content: ArtifactContent,
    pub created_at: DateTime<Utc>,
    pub active: bool,
    pub source_proposal_id: Option<ProposalId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_schema_equivalence_ignores_formatting() {
        let a = ArtifactContent::parse(ArtifactKind::ToolSchema, r#"{"name":"search","params":{"q":"string"}}"#).unwrap();
        let b = ArtifactContent::parse(
            ArtifactKind::ToolSchema,
            "{\n  \"params\": {\"q\": \"string\"},\n  \"name\": \"search\"\n}",
        )
        .unwrap();
        assert!(a.is_equivalent(&b));
    }

    #[test]
    fn test_invalid_tool_schema_rejected() {
        assert!(ArtifactContent::parse(ArtifactKind::ToolSchema, "not json").is_err());
    }

    #[test]
    fn test_prompt_equivalence_and_emptiness() {
        let a = ArtifactContent::Prompt("You are helpful.\n".to_string());
        let b = ArtifactContent::Prompt("You are helpful.".to_string());
        assert!(a.is_equivalent(&b));
        assert!(ArtifactContent::Prompt("   ".to_string()).is_empty());
        assert!(ArtifactContent::ToolSchema(json!({})).is_empty());
        assert!(!a.is_equivalent(&ArtifactContent::ToolSchema(json!("You are helpful."))));
    }

    #[test]
    fn test_content_serialization_is_tagged() {
        let content = ArtifactContent::Prompt("hi".to_string());
        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(value, json!({"kind": "prompt", "content": "hi"}));
    }
}
