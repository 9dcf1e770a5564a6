//! Run configuration.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! command-line flags (applied in `main`). Every section uses
//! `#[serde(default)]` so a config file only needs the keys it changes:
//!
//! ```yaml
//! pipeline:
//!   delay_ms: 3000
//! summarize:
//!   length: short
//! backend:
//!   kind: chat
//!   endpoint: http://localhost:8080/v1
//!   model: qwen2.5-7b-instruct
//! ```

use crate::errors::SetupError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, instrument};

/// Most items a pooled run may process at once.
pub const MAX_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub fetch: FetchConfig,
    pub resolve: ResolveConfig,
    pub extract: ExtractConfig,
    pub summarize: SummarizeConfig,
    pub backend: BackendConfig,
    pub pipeline: PipelineConfig,
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolveConfig {
    /// Upper bound on the whole resolution, all hops included.
    pub timeout_ms: u64,
    /// Pause between navigation checks while a client-side hop is pending.
    pub poll_interval_ms: u64,
    pub max_hops: usize,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            poll_interval_ms: 250,
            max_hops: 10,
        }
    }
}

impl ResolveConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Extracted bodies shorter than this (in chars) are rejected.
    pub min_length: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self { min_length: 50 }
    }
}

/// Named summary length presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LengthProfile {
    Short,
    #[default]
    Medium,
    Long,
}

/// Length bounds handed to a summarization backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetLength {
    pub max_length: usize,
    pub min_length: usize,
}

impl LengthProfile {
    pub fn target(self) -> TargetLength {
        let (max_length, min_length) = match self {
            Self::Short => (150, 60),
            Self::Medium => (1000, 100),
            Self::Long => (1000, 150),
        };
        TargetLength {
            max_length,
            min_length,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SummarizeConfig {
    /// Inputs shorter than this (in chars) are "too short to summarize".
    pub min_length: usize,
    /// Upper bound on one chunk sent to the backend, in chars.
    pub max_chunk_size: usize,
    /// How many leading chunks are summarized in the map pass.
    pub max_chunks: usize,
    /// The reduce pass runs when the joined chunk summaries exceed
    /// `reduce_factor * max_length`.
    pub reduce_factor: usize,
    /// Floor for per-chunk length targets.
    pub min_chunk_target: usize,
    pub keyword_limit: usize,
    pub length: LengthProfile,
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            min_length: 50,
            max_chunk_size: 1000,
            max_chunks: 5,
            reduce_factor: 2,
            min_chunk_target: 30,
            keyword_limit: 10,
            length: LengthProfile::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Offline sentence-selection summaries.
    #[default]
    Extractive,
    /// An OpenAI-compatible chat completions endpoint.
    Chat,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Base URL of the chat API, e.g. `http://localhost:8080/v1`.
    pub endpoint: Option<String>,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Extra attempts per backend call. Zero keeps stages retry-free.
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
    /// Sentence cap per call for the extractive backend.
    pub extractive_sentences: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Extractive,
            endpoint: None,
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            timeout_secs: 60,
            max_retries: 0,
            retry_base_delay_ms: 1000,
            extractive_sentences: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pause between items (sequential) or between requests to one host (pooled).
    pub delay_ms: u64,
    /// Cap for the delay once it grows after consecutive failures.
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
    /// Items processed at once; clamped to `1..=MAX_CONCURRENCY`.
    pub concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            delay_ms: 2000,
            max_delay_ms: 30_000,
            jitter_ms: 250,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub feed_url: String,
    pub language: String,
    pub country: String,
    pub edition: String,
    pub max_retries: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            feed_url: "https://news.google.com/rss/search".to_string(),
            language: "en-IN".to_string(),
            country: "IN".to_string(),
            edition: "IN:en".to_string(),
            max_retries: 2,
        }
    }
}

impl Config {
    /// Load a config file, or the defaults when `path` is `None`.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, SetupError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let shown = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| SetupError::ConfigRead {
            path: shown.clone(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|source| SetupError::ConfigParse {
            path: shown.clone(),
            source,
        })?;
        info!(path = %shown, "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Reject settings no run could succeed with.
    pub fn validate(&self) -> Result<(), SetupError> {
        let s = &self.summarize;
        if s.max_chunk_size == 0 {
            return Err(SetupError::Invalid("summarize.max_chunk_size must be positive".into()));
        }
        if s.max_chunks == 0 {
            return Err(SetupError::Invalid("summarize.max_chunks must be positive".into()));
        }
        if s.reduce_factor == 0 {
            return Err(SetupError::Invalid("summarize.reduce_factor must be positive".into()));
        }
        if self.resolve.timeout_ms == 0 {
            return Err(SetupError::Invalid("resolve.timeout_ms must be positive".into()));
        }
        if self.backend.kind == BackendKind::Chat && self.backend.endpoint.is_none() {
            return Err(SetupError::Invalid(
                "backend.endpoint is required for the chat backend".into(),
            ));
        }
        Ok(())
    }

    /// Concurrency after clamping to the supported range.
    pub fn concurrency(&self) -> usize {
        self.pipeline.concurrency.clamp(1, MAX_CONCURRENCY)
    }
}
