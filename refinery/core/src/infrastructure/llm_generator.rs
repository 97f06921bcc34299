// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! LLM Content Generator
//!
//! Adapts a domain `LLMProvider` to the `ContentGenerator` capability.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Render the drafting prompt with Handlebars, call the model, parse its JSON reply
//!
//! # Reply format
//!
//! ```json
//! {"proposed_content": "...", "rationale": "...", "failure_pattern": "..."}
//! ```
//!
//! The reply may be wrapped in a markdown code fence. For tool schemas
//! `proposed_content` may be an inline JSON document instead of a string.
//! `proposed_snippet` is accepted as an alias of `proposed_content`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::domain::artifact::ArtifactKind;
use crate::domain::capability::{
    CapabilityError, ContentGenerator, EvidenceItem, GenerationOutput, GenerationRequest,
};
use crate::domain::llm::{GenerationOptions, LLMProvider};

const TEMPLATE_NAME: &str = "proposal";

pub const DEFAULT_TEMPLATE: &str = r#"You are an expert {{role}}.
Your task is to fix a systemic AI agent failure through a localized modification of the {{artifact}}.

Systemic Failure Pattern:
{{failure_pattern}}

Evidence:
{{#each evidence}}
- [{{this.issue_type}}] {{this.description}}
{{#each this.context}}
    > {{this}}
{{/each}}
{{#if this.suggested_fix}}
    Evaluator suggestion: {{this.suggested_fix}}
{{/if}}
{{/each}}

Current {{artifact}}:
---
{{original_content}}
---

Return a JSON object with:
- "proposed_content": the complete new version of the {{artifact}}{{#if tool_schema}} as a JSON document{{/if}}.
- "rationale": a clear explanation of why this change fixes the pattern.
- "failure_pattern": a one-line name for the failure pattern.

Constraints:
- Keep changes localized.
- Do not break existing functionality.

Response:"#;

#[derive(Serialize)]
struct TemplateContext<'a> {
    role: &'static str,
    artifact: &'static str,
    tool_schema: bool,
    failure_pattern: &'a str,
    evidence: &'a [EvidenceItem],
    original_content: String,
}

impl<'a> TemplateContext<'a> {
    fn from_request(request: &'a GenerationRequest) -> Self {
        let (role, artifact, tool_schema) = match request.artifact_kind {
            ArtifactKind::Prompt => ("Prompt Engineer", "system prompt", false),
            ArtifactKind::ToolSchema => ("Tool Interface Designer", "tool schema", true),
        };
        Self {
            role,
            artifact,
            tool_schema,
            failure_pattern: &request.failure_pattern_seed,
            evidence: &request.evidence,
            original_content: request.original_content.render(),
        }
    }
}

pub struct LlmContentGenerator {
    provider: Arc<dyn LLMProvider>,
    templates: Handlebars<'static>,
    options: GenerationOptions,
}

impl LlmContentGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Result<Self> {
        Self::with_template(provider, DEFAULT_TEMPLATE)
    }

    /// Use a custom drafting template (same context fields as `DEFAULT_TEMPLATE`)
    pub fn with_template(provider: Arc<dyn LLMProvider>, template: &str) -> Result<Self> {
        let mut templates = Handlebars::new();
        templates.set_strict_mode(false);
        templates.register_escape_fn(handlebars::no_escape);
        templates
            .register_template_string(TEMPLATE_NAME, template)
            .context("Invalid Handlebars template syntax")?;

        Ok(Self {
            provider,
            templates,
            options: GenerationOptions {
                temperature: Some(0.2),
                json_response: true,
                ..GenerationOptions::default()
            },
        })
    }

    pub fn render_prompt(&self, request: &GenerationRequest) -> Result<String, CapabilityError> {
        self.templates
            .render(TEMPLATE_NAME, &TemplateContext::from_request(request))
            .map_err(|e| CapabilityError::Provider(format!("failed to render drafting prompt: {}", e)))
    }
}

#[async_trait]
impl ContentGenerator for LlmContentGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, CapabilityError> {
        let prompt = self.render_prompt(request)?;
        let response = self.provider.generate(&prompt, &self.options).await?;
        debug!(model = %response.model, chars = response.text.len(), "Drafting reply received");
        parse_reply(&response.text)
    }
}

/// Parse the model reply into a `GenerationOutput`
pub fn parse_reply(text: &str) -> Result<GenerationOutput, CapabilityError> {
    let json = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    let value: Value = serde_json::from_str(&json)
        .map_err(|e| CapabilityError::InvalidOutput(format!("reply is not JSON: {}", e)))?;

    let proposed_content = match value.get("proposed_content").or_else(|| value.get("proposed_snippet")) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => {
            return Err(CapabilityError::InvalidOutput("reply has no proposed_content".to_string()))
        }
        Some(document) => document.to_string(),
    };

    let text_field = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
    Ok(GenerationOutput {
        proposed_content,
        rationale: text_field("rationale").unwrap_or_default(),
        failure_pattern: text_field("failure_pattern"),
    })
}

/// Contents of the first fenced code block, preferring a ```json fence
fn extract_json(text: &str) -> Option<String> {
    for marker in ["```json", "```"] {
        if let Some(start) = text.find(marker) {
            let content_start = start + marker.len();
            if let Some(end_offset) = text[content_start..].find("```") {
                let content_end = content_start + end_offset;
                return Some(text[content_start..content_end].trim().to_string());
            }
        }
    }
    None
}
