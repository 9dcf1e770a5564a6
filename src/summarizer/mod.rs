//! Article summarization.
//!
//! Short inputs are reported as too short without calling the backend.
//! Long inputs are split on sentence boundaries, each leading chunk is
//! summarized (map), and if the joined chunk summaries are still much longer
//! than the target they are summarized once more (reduce). Sentiment and
//! keywords are always computed over the full input text.

pub mod backend;
pub mod chunking;
pub mod keywords;
pub mod sentiment;

use crate::config::{LengthProfile, SummarizeConfig};
use crate::errors::SummarizeError;
use crate::models::{SummaryResult, SummaryStatus};
use backend::{SummarizationBackend, SummaryRequest};
use chunking::{chunk_sentences, chunk_target};
use tracing::{debug, info, instrument};

pub const TOO_SHORT_MESSAGE: &str = "Text too short to summarize meaningfully.";

pub struct Summarizer<B> {
    backend: B,
    config: SummarizeConfig,
}

impl<B: SummarizationBackend> Summarizer<B> {
    pub fn new(backend: B, config: SummarizeConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Summarize `text` toward the bounds of `profile`.
    ///
    /// # Errors
    ///
    /// Backend failures are passed through; an empty backend reply is
    /// reported as [`SummarizeError::MalformedResponse`].
    #[instrument(level = "info", skip_all, fields(backend = self.backend.name(), ?profile))]
    pub async fn summarize(&self, text: &str, profile: LengthProfile) -> Result<SummaryResult, SummarizeError> {
        let text = text.trim();
        let original_length = text.chars().count();
        let sentiment_analysis = sentiment::analyze(text);
        let keywords = keywords::extract_keywords(text, self.config.keyword_limit);

        let (summary, status, chunks_summarized, reduced) = if original_length < self.config.min_length {
            info!(original_length, minimum = self.config.min_length, "Text too short to summarize");
            (TOO_SHORT_MESSAGE.to_string(), SummaryStatus::TooShort, 0, false)
        } else {
            let (summary, chunks, reduced) = self.map_reduce(text, profile).await?;
            (summary, SummaryStatus::Summarized, chunks, reduced)
        };

        let summary_length = summary.chars().count();
        Ok(SummaryResult {
            summary,
            status,
            sentiment_analysis,
            keywords,
            chunks_summarized,
            reduced,
            original_length,
            summary_length,
            compression_ratio: compression_ratio(summary_length, original_length),
        })
    }

    /// Returns the summary, the number of chunks summarized in the map pass
    /// (0 when the text fit in one call), and whether a reduce pass ran.
    async fn map_reduce(&self, text: &str, profile: LengthProfile) -> Result<(String, usize, bool), SummarizeError> {
        let target = profile.target();

        if text.chars().count() <= self.config.max_chunk_size {
            let summary = self.call(text, target.max_length, target.min_length).await?;
            return Ok((summary, 0, false));
        }

        let chunks = chunk_sentences(text, self.config.max_chunk_size);
        let used = chunks.len().min(self.config.max_chunks);
        let per_chunk = chunk_target(target, used, self.config.min_chunk_target);
        debug!(
            chunks = chunks.len(),
            used,
            per_chunk_max = per_chunk.max_length,
            "Summarizing in chunks"
        );

        let mut parts = Vec::with_capacity(used);
        for chunk in chunks.iter().take(used) {
            parts.push(self.call(chunk, per_chunk.max_length, per_chunk.min_length).await?);
        }
        let combined = parts.join(" ");

        if combined.chars().count() > self.config.reduce_factor * target.max_length {
            debug!(combined_length = combined.chars().count(), "Reducing chunk summaries");
            let reduced = self.call(&combined, target.max_length, target.min_length).await?;
            return Ok((reduced, used, true));
        }
        Ok((combined, used, false))
    }

    async fn call(&self, text: &str, max_length: usize, min_length: usize) -> Result<String, SummarizeError> {
        let request = SummaryRequest {
            text,
            max_length,
            min_length,
        };
        let summary = self.backend.summarize(&request).await?;
        let summary = summary.trim();
        if summary.is_empty() {
            return Err(SummarizeError::MalformedResponse(format!(
                "{} backend returned an empty summary",
                self.backend.name()
            )));
        }
        Ok(summary.to_string())
    }
}

fn compression_ratio(summary_length: usize, original_length: usize) -> String {
    if original_length == 0 {
        return "0.0%".to_string();
    }
    format!("{:.1}%", summary_length as f64 / original_length as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarizer::backend::ExtractiveBackend;
    use crate::summarizer::chunking::split_sentences;
    use std::sync::Mutex;

    /// Records every request and answers with a fixed reply.
    struct Recording {
        reply: String,
        requests: Mutex<Vec<(usize, usize, usize)>>,
    }

    impl Recording {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(usize, usize, usize)> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl SummarizationBackend for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn summarize(&self, request: &SummaryRequest<'_>) -> Result<String, SummarizeError> {
            self.requests.lock().unwrap().push((
                request.text.chars().count(),
                request.max_length,
                request.min_length,
            ));
            Ok(self.reply.clone())
        }
    }

    struct Failing;

    impl SummarizationBackend for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn summarize(&self, _: &SummaryRequest<'_>) -> Result<String, SummarizeError> {
            Err(SummarizeError::Backend("model unavailable".into()))
        }
    }

    fn long_text(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("Sentence {i:03} reports strong growth in the regional market. "))
            .collect::<String>()
    }

    #[tokio::test]
    async fn test_short_input_skips_backend() {
        let summarizer = Summarizer::new(Recording::new("unused"), SummarizeConfig::default());
        let text = "a".repeat(40);
        let result = summarizer.summarize(&text, LengthProfile::Medium).await.unwrap();
        assert_eq!(result.status, SummaryStatus::TooShort);
        assert_eq!(result.summary, TOO_SHORT_MESSAGE);
        assert_eq!(result.original_length, 40);
        assert!(summarizer.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn test_single_call_when_text_fits() {
        let summarizer = Summarizer::new(Recording::new("Growth was strong."), SummarizeConfig::default());
        let text = long_text(5);
        let result = summarizer.summarize(&text, LengthProfile::Short).await.unwrap();
        assert_eq!(result.status, SummaryStatus::Summarized);
        assert_eq!(result.summary, "Growth was strong.");
        assert_eq!(result.chunks_summarized, 0);
        assert!(!result.reduced);
        assert_eq!(summarizer.backend().calls(), vec![(text.trim().chars().count(), 150, 60)]);
    }

    #[tokio::test]
    async fn test_map_pass_caps_chunks() {
        let summarizer = Summarizer::new(Recording::new("Chunk summary."), SummarizeConfig::default());
        // 100 sentences of ~61 chars is about 6 KB, well over five chunks.
        let result = summarizer.summarize(&long_text(100), LengthProfile::Medium).await.unwrap();
        let calls = summarizer.backend().calls();
        assert_eq!(calls.len(), 5);
        assert!(calls.iter().all(|&(len, max, min)| len <= 1000 && max == 200 && min == 20));
        assert_eq!(result.chunks_summarized, 5);
        assert!(!result.reduced);
        assert_eq!(result.summary, vec!["Chunk summary."; 5].join(" "));
    }

    #[tokio::test]
    async fn test_reduce_pass_runs_when_combined_is_long() {
        let reply = "x".repeat(100);
        let summarizer = Summarizer::new(Recording::new(&reply), SummarizeConfig::default());
        let result = summarizer.summarize(&long_text(100), LengthProfile::Short).await.unwrap();
        let calls = summarizer.backend().calls();
        // Five map calls of 100 chars each exceed 2 x 150, so one reduce call follows.
        assert_eq!(calls.len(), 6);
        assert_eq!(calls[0].1, 30);
        assert_eq!(calls[5], (5 * 100 + 4, 150, 60));
        assert!(result.reduced);
    }

    #[tokio::test]
    async fn test_backend_failure_propagates() {
        let summarizer = Summarizer::new(Failing, SummarizeConfig::default());
        let err = summarizer.summarize(&long_text(3), LengthProfile::Medium).await.unwrap_err();
        assert!(matches!(err, SummarizeError::Backend(_)));
    }

    #[tokio::test]
    async fn test_empty_reply_is_malformed() {
        let summarizer = Summarizer::new(Recording::new("   "), SummarizeConfig::default());
        let err = summarizer.summarize(&long_text(3), LengthProfile::Medium).await.unwrap_err();
        assert!(matches!(err, SummarizeError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_extractive_end_to_end_fields() {
        let summarizer = Summarizer::new(ExtractiveBackend::default(), SummarizeConfig::default());
        let text = "Acme posted excellent results. Revenue grew by a record margin. \
                    Analysts were impressed. The stock rose sharply in early trade.";
        let result = summarizer.summarize(text, LengthProfile::Short).await.unwrap();
        assert_eq!(result.status, SummaryStatus::Summarized);
        assert!(!result.summary.is_empty());
        assert_eq!(result.original_length, text.chars().count());
        assert!(result.compression_ratio.ends_with('%'));
        assert!(result.keywords.len() <= 10);
        assert!(result.sentiment_analysis.polarity > 0.0);
    }

    #[tokio::test]
    async fn test_default_extractive_compresses_multi_chunk_article() {
        let summarizer = Summarizer::new(ExtractiveBackend::default(), SummarizeConfig::default());
        let text = long_text(50);
        let result = summarizer.summarize(&text, LengthProfile::Medium).await.unwrap();
        assert_eq!(result.original_length, 2949);
        assert_eq!(result.chunks_summarized, 4);
        assert!(!result.reduced);
        // Three sentences from each of the three full chunks, two from the tail.
        assert_eq!(split_sentences(&result.summary).len(), 11);
        assert!(result.summary_length * 2 < result.original_length);
        assert_ne!(result.compression_ratio, "100.0%");
    }

    #[test]
    fn test_compression_ratio_format() {
        assert_eq!(compression_ratio(25, 100), "25.0%");
        assert_eq!(compression_ratio(1, 3), "33.3%");
        assert_eq!(compression_ratio(0, 0), "0.0%");
    }
}
