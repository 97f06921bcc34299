// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Embedding Client
//!
//! Local embedding backend based on token feature hashing.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Deterministic `TextEmbedder` that needs no model server
//!
//! Each lowercase alphanumeric token is hashed with SHA-256 into one of
//! `dimension` buckets with a ±1 sign; the sum is L2-normalized. Texts that
//! share vocabulary land close together, identical texts land on identical
//! vectors, and a text without tokens maps to the zero vector.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::domain::capability::{CapabilityError, TextEmbedder};

/// Matches all-MiniLM-L6-v2 so vectors stay swappable with a model backend
pub const DEFAULT_DIMENSION: usize = 384;

pub struct HashEmbedder {
    dimension: usize,
    model_version: String,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            model_version: format!("feature-hash-sha256-{}", dimension),
        }
    }

    /// Synchronous core of `embed`
    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket_bytes = [0u8; 8];
            bucket_bytes.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in vector.iter_mut() {
                *x /= norm;
            }
        }
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[async_trait]
impl TextEmbedder for HashEmbedder {
    fn model_version(&self) -> &str {
        &self.model_version
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, CapabilityError> {
        Ok(self.vectorize(text))
    }
}
