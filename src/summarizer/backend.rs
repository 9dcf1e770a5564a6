//! Summarization backends.
//!
//! A backend turns one piece of text into a shorter one within a word
//! budget. Two are provided:
//! - [`ExtractiveBackend`]: offline, deterministic sentence selection
//! - [`ChatBackend`]: an OpenAI-compatible `/chat/completions` endpoint
//!
//! [`RetryBackend`] decorates any backend with exponential backoff, and
//! [`Backend`] picks one from configuration.

use super::chunking::split_sentences;
use crate::backoff::{Backoff, retry_with_backoff};
use crate::config::{BackendConfig, BackendKind};
use crate::errors::{SetupError, SummarizeError};
use crate::utils::truncate_for_log;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

const SYSTEM_PROMPT: &str = "Write a concise, professionally worded summary for a business news article.";

/// One backend call. Lengths are in words.
#[derive(Debug, Clone, Copy)]
pub struct SummaryRequest<'a> {
    pub text: &'a str,
    pub max_length: usize,
    pub min_length: usize,
}

/// Text in, shorter text out.
pub trait SummarizationBackend {
    fn name(&self) -> &str;

    async fn summarize(&self, request: &SummaryRequest<'_>) -> Result<String, SummarizeError>;
}

fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

pub const DEFAULT_EXTRACTIVE_SENTENCES: usize = 3;

/// Picks evenly spaced sentences, always starting with the lead, as many as
/// fit in the word budget and never more than `max_sentences`.
///
/// The minimum length is honored only as far as the cap allows.
#[derive(Debug, Clone, Copy)]
pub struct ExtractiveBackend {
    max_sentences: usize,
}

impl Default for ExtractiveBackend {
    fn default() -> Self {
        Self::new(DEFAULT_EXTRACTIVE_SENTENCES)
    }
}

impl ExtractiveBackend {
    pub fn new(max_sentences: usize) -> Self {
        Self {
            max_sentences: max_sentences.max(1),
        }
    }

    fn select(&self, sentences: &[&str], max_words: usize, min_words: usize) -> Vec<usize> {
        let n = sentences.len();
        let cap = self.max_sentences.min(n);
        let words: Vec<usize> = sentences.iter().map(|s| word_count(s)).collect();

        let mut chosen: Vec<usize> = (1..=cap)
            .rev()
            .map(|k| (0..k).map(|j| j * n / k).collect::<Vec<_>>())
            .find(|picks| picks.iter().map(|&i| words[i]).sum::<usize>() <= max_words)
            .unwrap_or_default();

        let mut total: usize = chosen.iter().map(|&i| words[i]).sum();
        for i in 0..n {
            if total >= min_words || chosen.len() >= cap {
                break;
            }
            if !chosen.contains(&i) && total + words[i] <= max_words {
                chosen.push(i);
                total += words[i];
            }
        }
        chosen.sort_unstable();
        chosen
    }
}

impl SummarizationBackend for ExtractiveBackend {
    fn name(&self) -> &str {
        "extractive"
    }

    async fn summarize(&self, request: &SummaryRequest<'_>) -> Result<String, SummarizeError> {
        let max_words = request.max_length.max(1);
        let sentences = split_sentences(request.text);
        if sentences.is_empty() {
            return Ok(String::new());
        }

        let chosen = self.select(&sentences, max_words, request.min_length);
        if chosen.is_empty() {
            // Even the lead sentence is over budget: cut it at the word limit.
            let lead = sentences[0].split_whitespace().take(max_words).collect::<Vec<_>>();
            return Ok(lead.join(" "));
        }
        Ok(chosen.iter().map(|&i| sentences[i]).collect::<Vec<_>>().join(" "))
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// An OpenAI-compatible chat completions client.
#[derive(Clone)]
pub struct ChatBackend {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl fmt::Debug for ChatBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatBackend")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ChatBackend {
    pub fn new(
        endpoint: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SetupError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}/chat/completions", endpoint.trim_end_matches('/')),
            model: model.into(),
            api_key,
        })
    }

    fn system_prompt(request: &SummaryRequest<'_>) -> String {
        format!(
            "{SYSTEM_PROMPT} Use between {} and {} words. Reply with the summary only.",
            request.min_length, request.max_length
        )
    }
}

impl SummarizationBackend for ChatBackend {
    fn name(&self) -> &str {
        "chat"
    }

    #[instrument(level = "info", skip_all, fields(model = %self.model, max = request.max_length))]
    async fn summarize(&self, request: &SummaryRequest<'_>) -> Result<String, SummarizeError> {
        let t0 = Instant::now();
        let system = Self::system_prompt(request);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: request.text,
                },
            ],
            // Roughly two tokens per word leaves room to finish the last sentence.
            max_tokens: (request.max_length * 2).max(64),
            temperature: 0.2,
        };

        let mut call = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }
        let response = call
            .send()
            .await
            .map_err(|e| SummarizeError::Backend(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Chat endpoint returned an error status");
            return Err(SummarizeError::Backend(format!("http status {}", status.as_u16())));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| SummarizeError::MalformedResponse(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| SummarizeError::MalformedResponse("no completion content".into()))?;

        debug!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            words = word_count(&content),
            preview = %truncate_for_log(&content, 120),
            "Chat summary received"
        );
        Ok(content)
    }
}

/// Retries the wrapped backend with exponential backoff and jitter.
pub struct RetryBackend<T> {
    inner: T,
    max_retries: usize,
    backoff: Backoff,
}

impl<T> RetryBackend<T> {
    pub fn new(inner: T, max_retries: usize, backoff: Backoff) -> Self {
        Self {
            inner,
            max_retries,
            backoff,
        }
    }
}

impl<T> fmt::Debug for RetryBackend<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryBackend")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl<T: SummarizationBackend> SummarizationBackend for RetryBackend<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn summarize(&self, request: &SummaryRequest<'_>) -> Result<String, SummarizeError> {
        retry_with_backoff(self.inner.name(), self.max_retries, self.backoff, || {
            self.inner.summarize(request)
        })
        .await
    }
}

/// The backend chosen for a run.
#[derive(Debug)]
pub enum Backend {
    Extractive(ExtractiveBackend),
    Chat(RetryBackend<ChatBackend>),
}

impl Backend {
    pub fn from_config(config: &BackendConfig) -> Result<Self, SetupError> {
        match config.kind {
            BackendKind::Extractive => Ok(Self::Extractive(ExtractiveBackend::new(config.extractive_sentences))),
            BackendKind::Chat => {
                let endpoint = config.endpoint.as_deref().ok_or_else(|| {
                    SetupError::Invalid("backend.endpoint is required for the chat backend".into())
                })?;
                let chat = ChatBackend::new(
                    endpoint,
                    config.model.clone(),
                    config.api_key.clone(),
                    Duration::from_secs(config.timeout_secs),
                )?;
                let base = Duration::from_millis(config.retry_base_delay_ms);
                let backoff = Backoff::new(base, Duration::from_secs(30), Duration::from_millis(250));
                Ok(Self::Chat(RetryBackend::new(chat, config.max_retries, backoff)))
            }
        }
    }
}

impl SummarizationBackend for Backend {
    fn name(&self) -> &str {
        match self {
            Self::Extractive(b) => b.name(),
            Self::Chat(b) => b.name(),
        }
    }

    async fn summarize(&self, request: &SummaryRequest<'_>) -> Result<String, SummarizeError> {
        match self {
            Self::Extractive(b) => b.summarize(request).await,
            Self::Chat(b) => b.summarize(request).await,
        }
    }
}
