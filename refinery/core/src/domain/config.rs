// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Analysis Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) holding every
// tunable of the analysis pipeline:
// - Issue collection (context window radius)
// - Embedding text composition
// - Clustering thresholds
// - Significance weights per issue type
// - Proposal generation (artifact mapping, evidence, concurrency, dedup)
// - Regression verdict tolerance
// - Timeouts for external capabilities

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::artifact::ArtifactKind;

pub const API_VERSION: &str = "refinery/v1";
pub const KIND: &str = "AnalysisConfig";

/// Top-level configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfigManifest {
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub collector: CollectorConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub clustering: ClusteringConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub regression: RegressionConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Turns kept on each side of the issue's turn
    #[serde(default = "default_context_radius")]
    pub context_radius: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Append the context window to the embedded text
    #[serde(default)]
    pub include_context: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    #[serde(default = "default_min_support")]
    pub min_support: usize,

    #[serde(default = "default_max_clusters")]
    pub max_clusters: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Weight per issue type label; unlisted types use `default_weight`
    #[serde(default = "default_issue_type_weights")]
    pub issue_type_weights: HashMap<String, f64>,

    #[serde(default = "default_weight")]
    pub default_weight: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Artifact a cluster's dominant issue type is fixed in; unmapped types target the prompt
    #[serde(default = "default_issue_type_artifacts")]
    pub issue_type_artifacts: HashMap<String, ArtifactKind>,

    /// Members closest to the centroid shown as evidence (2 or 3)
    #[serde(default = "default_evidence_size")]
    pub evidence_size: usize,

    /// Significance score mapped to confidence 1.0
    #[serde(default = "default_confidence_cap")]
    pub confidence_cap: f64,

    /// Concurrent generation calls across clusters
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Skip clusters already covered by an open draft
    #[serde(default = "default_true")]
    pub skip_duplicate_drafts: bool,

    /// Evidence overlap at which a draft counts as covering a cluster
    #[serde(default = "default_duplicate_overlap")]
    pub duplicate_evidence_overlap: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionConfig {
    /// Tolerated drop of the mean candidate score
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    /// Concurrent scenario runs
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_embedding_timeout", with = "humantime_serde")]
    pub embedding: Duration,

    #[serde(default = "default_generation_timeout", with = "humantime_serde")]
    pub generation: Duration,

    #[serde(default = "default_agent_run_timeout", with = "humantime_serde")]
    pub agent_run: Duration,

    /// Pause before the single retry of a transient failure
    #[serde(default = "default_retry_backoff", with = "humantime_serde")]
    pub retry_backoff: Duration,
}

fn default_true() -> bool {
    true
}

fn default_context_radius() -> usize {
    2
}

fn default_similarity_threshold() -> f64 {
    0.8
}

fn default_min_support() -> usize {
    2
}

fn default_max_clusters() -> usize {
    10
}

fn default_weight() -> f64 {
    1.0
}

fn default_issue_type_weights() -> HashMap<String, f64> {
    HashMap::from([
        ("tool_hallucination".to_string(), 3.0),
        ("execution_failed".to_string(), 3.0),
        ("invalid_tool".to_string(), 3.0),
        ("low_factuality".to_string(), 3.0),
        ("invalid_param".to_string(), 2.0),
        ("missing_param".to_string(), 2.0),
        ("context_loss".to_string(), 2.0),
        ("inconsistent_response".to_string(), 2.0),
        ("reference_error".to_string(), 2.0),
        ("missing_field".to_string(), 1.5),
        ("low_helpfulness".to_string(), 1.5),
        ("low_quality".to_string(), 1.5),
        ("format_error".to_string(), 1.0),
        ("latency_exceeded".to_string(), 1.0),
    ])
}

fn default_issue_type_artifacts() -> HashMap<String, ArtifactKind> {
    HashMap::from([
        ("invalid_tool".to_string(), ArtifactKind::ToolSchema),
        ("invalid_param".to_string(), ArtifactKind::ToolSchema),
        ("missing_param".to_string(), ArtifactKind::ToolSchema),
        ("tool_hallucination".to_string(), ArtifactKind::ToolSchema),
        ("execution_failed".to_string(), ArtifactKind::ToolSchema),
    ])
}

fn default_evidence_size() -> usize {
    3
}

fn default_confidence_cap() -> f64 {
    50.0
}

fn default_concurrency() -> usize {
    4
}

fn default_duplicate_overlap() -> f64 {
    0.5
}

fn default_epsilon() -> f64 {
    0.02
}

fn default_embedding_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_generation_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_agent_run_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_retry_backoff() -> Duration {
    Duration::from_millis(500)
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self { context_radius: default_context_radius() }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            min_support: default_min_support(),
            max_clusters: default_max_clusters(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            issue_type_weights: default_issue_type_weights(),
            default_weight: default_weight(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            issue_type_artifacts: default_issue_type_artifacts(),
            evidence_size: default_evidence_size(),
            confidence_cap: default_confidence_cap(),
            concurrency: default_concurrency(),
            skip_duplicate_drafts: true,
            duplicate_evidence_overlap: default_duplicate_overlap(),
        }
    }
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            epsilon: default_epsilon(),
            concurrency: default_concurrency(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            embedding: default_embedding_timeout(),
            generation: default_generation_timeout(),
            agent_run: default_agent_run_timeout(),
            retry_backoff: default_retry_backoff(),
        }
    }
}

impl AnalysisConfig {
    /// Validate value ranges
    pub fn validate(&self) -> anyhow::Result<()> {
        let clustering = &self.clustering;
        if !(clustering.similarity_threshold > 0.0 && clustering.similarity_threshold < 1.0) {
            anyhow::bail!(
                "clustering.similarity_threshold must be in (0, 1), got {}",
                clustering.similarity_threshold
            );
        }
        if clustering.min_support < 2 {
            anyhow::bail!("clustering.min_support must be at least 2, got {}", clustering.min_support);
        }
        if clustering.max_clusters == 0 {
            anyhow::bail!("clustering.max_clusters must be at least 1");
        }

        if self.scoring.default_weight <= 0.0 {
            anyhow::bail!("scoring.default_weight must be positive");
        }
        if let Some((label, weight)) = self.scoring.issue_type_weights.iter().find(|(_, w)| **w <= 0.0) {
            anyhow::bail!("scoring weight for '{}' must be positive, got {}", label, weight);
        }

        let generation = &self.generation;
        if !(2..=3).contains(&generation.evidence_size) {
            anyhow::bail!("generation.evidence_size must be 2 or 3, got {}", generation.evidence_size);
        }
        if generation.confidence_cap <= 0.0 {
            anyhow::bail!("generation.confidence_cap must be positive");
        }
        if generation.concurrency == 0 {
            anyhow::bail!("generation.concurrency must be at least 1");
        }
        if !(0.0..=1.0).contains(&generation.duplicate_evidence_overlap) {
            anyhow::bail!("generation.duplicate_evidence_overlap must be in [0, 1]");
        }

        if self.regression.epsilon < 0.0 {
            anyhow::bail!("regression.epsilon must not be negative");
        }
        if self.regression.concurrency == 0 {
            anyhow::bail!("regression.concurrency must be at least 1");
        }

        Ok(())
    }
}

impl Default for AnalysisConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "refinery".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: AnalysisConfig::default(),
        }
    }
}

impl AnalysisConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Configuration file named by `REFINERY_CONFIG_PATH`, else `./refinery-config.yaml`
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("REFINERY_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./refinery-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        None
    }

    /// Load configuration with discovery, fallback to default, then validate
    pub fn load_or_default(explicit_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = if let Some(path) = explicit_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?
        } else if let Some(path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", path);
            Self::from_yaml_file(path)?
        } else {
            tracing::warn!("No configuration file found. Using defaults.");
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the clustering thresholds
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("REFINERY_SIMILARITY_THRESHOLD") {
            match val.parse::<f64>() {
                Ok(threshold) => {
                    tracing::info!("Environment override: REFINERY_SIMILARITY_THRESHOLD={}", threshold);
                    self.spec.clustering.similarity_threshold = threshold;
                }
                Err(_) => tracing::warn!("Invalid value for REFINERY_SIMILARITY_THRESHOLD: '{}'. Ignoring.", val),
            }
        }

        if let Ok(val) = std::env::var("REFINERY_MIN_SUPPORT") {
            match val.parse::<usize>() {
                Ok(min_support) => {
                    tracing::info!("Environment override: REFINERY_MIN_SUPPORT={}", min_support);
                    self.spec.clustering.min_support = min_support;
                }
                Err(_) => tracing::warn!("Invalid value for REFINERY_MIN_SUPPORT: '{}'. Ignoring.", val),
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!("Invalid apiVersion: '{}'. Must be '{}'", self.api_version, API_VERSION);
        }
        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }
        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }
        self.spec.validate()
    }
}
