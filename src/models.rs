//! Data models for the pipeline and its persisted batch report.
//!
//! This module defines the values that flow between stages:
//! - [`SourceUrl`] / [`ResolvedUrl`]: where an item starts and where it lands
//! - [`ArticleContent`] / [`ArticleMetadata`]: what the extractor produces
//! - [`SummaryResult`]: what the summarizer produces
//! - [`PipelineRecord`] / [`BatchReport`]: what the orchestrator aggregates
//!
//! Stage components never hold references into a report; they take inputs
//! and return new values, and the orchestrator assembles records from them.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use url::Url;

/// Placeholder written for metadata that could not be found.
pub const NOT_FOUND: &str = "not found";

/// A URL an item starts from. May be an indirection link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceUrl(String);

impl SourceUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The final destination of a [`SourceUrl`].
///
/// Always an absolute URL with a scheme and a host. `unresolved` is set when
/// the resolver gave up waiting for navigation to settle and fell back to
/// the source address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    url: Url,
    unresolved: bool,
}

impl ResolvedUrl {
    /// Accept `url` only if it is absolute (has a host).
    pub fn new(url: Url, unresolved: bool) -> Option<Self> {
        if url.host_str().is_some_and(|h| !h.is_empty()) {
            Some(Self { url, unresolved })
        } else {
            None
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn is_unresolved(&self) -> bool {
        self.unresolved
    }
}

/// Best-effort article metadata. Missing fields never fail an item.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ArticleMetadata {
    #[serde(serialize_with = "or_not_found")]
    pub title: Option<String>,
    pub authors: Vec<String>,
    #[serde(serialize_with = "or_not_found")]
    pub publish_date: Option<DateTime<FixedOffset>>,
    #[serde(serialize_with = "or_not_found")]
    pub lead_image_url: Option<String>,
    pub word_count: usize,
}

fn or_not_found<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(v) => v.serialize(serializer),
        None => serializer.serialize_str(NOT_FOUND),
    }
}

/// Plain-text article body extracted from one resolved page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleContent {
    /// The page this text was extracted from.
    pub url: Url,
    /// Whitespace-normalized body text.
    pub text: String,
    /// Name of the extraction strategy that produced `text`.
    pub strategy: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    /// `positive` above 0.1, `negative` below -0.1, `neutral` otherwise.
    pub fn from_polarity(polarity: f64) -> Self {
        if polarity > 0.1 {
            Self::Positive
        } else if polarity < -0.1 {
            Self::Negative
        } else {
            Self::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectivityLabel {
    Objective,
    Subjective,
}

impl ObjectivityLabel {
    pub fn from_subjectivity(subjectivity: f64) -> Self {
        if subjectivity >= 0.5 {
            Self::Subjective
        } else {
            Self::Objective
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        })
    }
}

impl fmt::Display for ObjectivityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Objective => "objective",
            Self::Subjective => "subjective",
        })
    }
}

/// Whether the backend actually produced the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    Summarized,
    /// Input was below the minimum length; no backend call was made.
    TooShort,
}

/// Polarity and subjectivity scores plus their labels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sentiment {
    pub polarity: f64,
    pub subjectivity: f64,
    pub sentiment_label: SentimentLabel,
    pub objectivity_label: ObjectivityLabel,
}

impl Sentiment {
    pub fn new(polarity: f64, subjectivity: f64) -> Self {
        let polarity = round3(polarity.clamp(-1.0, 1.0));
        let subjectivity = round3(subjectivity.clamp(0.0, 1.0));
        Self {
            polarity,
            subjectivity,
            sentiment_label: SentimentLabel::from_polarity(polarity),
            objectivity_label: ObjectivityLabel::from_subjectivity(subjectivity),
        }
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Everything derived from an [`ArticleContent`] by the summarizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryResult {
    pub summary: String,
    pub status: SummaryStatus,
    pub sentiment_analysis: Sentiment,
    pub keywords: Vec<String>,
    /// Number of chunks sent to the backend in the map pass (0 if unchunked).
    pub chunks_summarized: usize,
    /// Whether a second pass compressed the concatenated chunk summaries.
    pub reduced: bool,
    pub original_length: usize,
    pub summary_length: usize,
    pub compression_ratio: String,
}

/// Lifecycle stage of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Pending,
    Resolving,
    Fetching,
    Extracting,
    Summarizing,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Resolving => "resolving",
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Summarizing => "summarizing",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

/// A search result that produced a [`SourceUrl`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub source_name: Option<String>,
    pub source_url: Option<String>,
    pub published: Option<String>,
}

/// Why an item failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordError {
    pub stage: Stage,
    pub message: String,
}

/// One item's outcome. Written once, when the item finishes.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRecord {
    pub index: usize,
    pub source_url: SourceUrl,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_hit: Option<SearchHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_url: Option<String>,
    pub unresolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ArticleMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_result: Option<SummaryResult>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RecordError>,
}

/// The aggregate of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub search_query: String,
    pub timestamp: DateTime<Utc>,
    pub total_items: usize,
    pub succeeded_count: usize,
    /// Set when the batch was cancelled before every item ran.
    pub aborted: bool,
    pub items: Vec<PipelineRecord>,
}

impl BatchReport {
    /// Seal a finished batch, deriving the counts from its records.
    pub fn finalize(search_query: impl Into<String>, items: Vec<PipelineRecord>, aborted: bool) -> Self {
        let succeeded_count = items.iter().filter(|r| r.success).count();
        Self {
            search_query: search_query.into(),
            timestamp: Utc::now(),
            total_items: items.len(),
            succeeded_count,
            aborted,
            items,
        }
    }

    pub fn failed_count(&self) -> usize {
        self.total_items - self.succeeded_count
    }
}
