//! Command-line interface definitions for News Digest.
//!
//! Flags override values from the optional YAML config file, which in turn
//! override the built-in defaults. Secrets can come from the environment.

use crate::config::{BackendKind, Config, LengthProfile};
use clap::Parser;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input};
use std::path::PathBuf;

/// Default number of articles taken from a search.
pub const DEFAULT_MAX_ITEMS: usize = 3;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Search and summarize the top three articles, asking before saving
/// news_digest "Tata Motors"
///
/// # Summarize specific pages and always save
/// news_digest --url https://example.com/a --url https://example.com/b --save
///
/// # Use a local chat model
/// news_digest "acme" --backend chat --chat-endpoint http://localhost:8080/v1
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Company or topic to search the news for
    pub query: Option<String>,

    /// Number of search results to process
    #[arg(short = 'n', long)]
    pub max_items: Option<usize>,

    /// Process this article URL instead of searching (repeatable)
    #[arg(short, long = "url")]
    pub urls: Vec<String>,

    /// Summary length profile
    #[arg(short, long, value_enum)]
    pub length: Option<LengthProfile>,

    /// Optional path to a config.yaml file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Write the JSON report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory for reports saved under the default file name
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Save the JSON report without asking
    #[arg(short, long)]
    pub save: bool,

    /// Never prompt; missing answers take their defaults
    #[arg(long)]
    pub no_prompt: bool,

    /// Items processed at once (1 to 4)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Pause between items, in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Summarization backend
    #[arg(long, value_enum)]
    pub backend: Option<BackendKind>,

    /// Base URL of an OpenAI-compatible chat API
    #[arg(long, env = "NEWS_DIGEST_CHAT_ENDPOINT")]
    pub chat_endpoint: Option<String>,

    /// Model name sent to the chat API
    #[arg(long, env = "NEWS_DIGEST_CHAT_MODEL")]
    pub chat_model: Option<String>,

    /// Bearer key for the chat API
    #[arg(long, env = "NEWS_DIGEST_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

impl Cli {
    /// Layer the flags that were given over `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(length) = self.length {
            config.summarize.length = length;
        }
        if let Some(concurrency) = self.concurrency {
            config.pipeline.concurrency = concurrency;
        }
        if let Some(delay_ms) = self.delay_ms {
            config.pipeline.delay_ms = delay_ms;
        }
        if let Some(kind) = self.backend {
            config.backend.kind = kind;
        }
        if let Some(endpoint) = &self.chat_endpoint {
            config.backend.endpoint = Some(endpoint.clone());
        }
        if let Some(model) = &self.chat_model {
            config.backend.model = model.clone();
        }
        if let Some(key) = &self.api_key {
            config.backend.api_key = Some(key.clone());
        }
    }

    /// Whether the caller already decided to save, so no question is needed.
    pub fn save_decided(&self) -> bool {
        self.save || self.output.is_some()
    }
}

/// Asks for whatever the flags left open.
///
/// When not interactive every question takes its default without touching
/// the terminal.
#[derive(Debug, Clone, Copy)]
pub struct Prompter {
    interactive: bool,
}

impl Prompter {
    pub fn new(interactive: bool) -> Self {
        Self { interactive }
    }

    fn theme(&self) -> ColorfulTheme {
        ColorfulTheme::default()
    }

    /// The search query, asked for when none was given. Empty when there is
    /// no one to ask.
    pub fn query(&self, given: Option<&str>) -> dialoguer::Result<String> {
        if let Some(query) = given.map(str::trim).filter(|q| !q.is_empty()) {
            return Ok(query.to_string());
        }
        if !self.interactive {
            return Ok(String::new());
        }
        let query: String = Input::with_theme(&self.theme())
            .with_prompt("Company or topic to search for")
            .interact_text()?;
        Ok(query.trim().to_string())
    }

    /// How many search results to process. Zero counts as not given.
    pub fn max_items(&self, given: Option<usize>) -> dialoguer::Result<usize> {
        if let Some(n) = given.filter(|n| *n > 0) {
            return Ok(n);
        }
        if !self.interactive {
            return Ok(DEFAULT_MAX_ITEMS);
        }
        Input::with_theme(&self.theme())
            .with_prompt("How many articles")
            .default(DEFAULT_MAX_ITEMS)
            .validate_with(|n: &usize| if *n > 0 { Ok(()) } else { Err("enter a number above zero") })
            .interact_text()
    }

    pub fn confirm_save(&self, decided: bool) -> dialoguer::Result<bool> {
        if decided {
            return Ok(true);
        }
        if !self.interactive {
            return Ok(false);
        }
        Confirm::with_theme(&self.theme())
            .with_prompt("Save results to JSON?")
            .default(false)
            .interact()
    }
}
