// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Llm
//!
//! Provides the LLM provider interface used by text-generation adapters.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Vendor-neutral completion interface

// Concrete vendors live outside this crate. The refinery only needs a
// completion call; `infrastructure::llm_generator` turns it into a
// `ContentGenerator`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::capability::CapabilityError;

/// Domain interface for LLM providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion from the LLM
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResponse, LLMError>;
}

/// Options for LLM generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: Option<f32>,

    /// Ask the provider for a JSON object reply
    pub json_response: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: Some(4096),
            temperature: Some(0.7),
            json_response: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationResponse {
    /// Generated text
    pub text: String,

    /// Model used (e.g., "gpt-4o", "llama3.2")
    pub model: String,
}

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),
}

impl From<LLMError> for CapabilityError {
    fn from(err: LLMError) -> Self {
        match err {
            LLMError::Network(msg) => CapabilityError::Network(msg),
            LLMError::RateLimit => CapabilityError::RateLimit,
            other => CapabilityError::Provider(other.to_string()),
        }
    }
}
