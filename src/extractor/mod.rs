//! Main-content extraction from raw HTML.
//!
//! Extraction is heuristic and best effort: page chrome (scripts, navigation,
//! headers, footers and similar) is skipped, then an ordered chain of
//! [`strategies`] is tried and the first one producing non-trivial text
//! wins. Metadata is gathered independently by [`metadata`] and never fails
//! the item; only the body text is load-bearing.

pub mod metadata;
pub mod strategies;

use crate::errors::ExtractError;
use crate::models::{ArticleContent, ArticleMetadata};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node};
use strategies::{ExtractionStrategy, default_chain};
use tracing::{debug, instrument};
use url::Url;

/// Elements whose text is never article content.
pub const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form", "iframe", "svg",
    "template", "button",
];

/// Elements that break words apart when their text is flattened.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5",
    "h6", "blockquote", "figure", "figcaption", "table", "tr", "td", "th", "pre", "hr",
];

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

pub fn normalize_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

fn is_skipped(name: &str) -> bool {
    SKIPPED_TAGS.contains(&name)
}

/// Whether `el` sits inside (or is) a skipped element.
pub(crate) fn is_inside_skipped(el: &ElementRef<'_>) -> bool {
    is_skipped(el.value().name())
        || el
            .ancestors()
            .filter_map(|a| a.value().as_element().map(|e| e.name()))
            .any(is_skipped)
}

/// Append the visible text under `el`, skipping non-content subtrees.
pub(crate) fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = child_el.value().name();
                if is_skipped(name) {
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push(' ');
                }
                collect_text(child_el, out);
                if block {
                    out.push(' ');
                }
            }
            _ => {}
        }
    }
}

/// Runs the strategy chain over documents. Holds no per-article state.
pub struct Extractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    min_length: usize,
}

impl Extractor {
    pub fn new(min_length: usize) -> Self {
        Self::with_strategies(default_chain(), min_length)
    }

    pub fn with_strategies(strategies: Vec<Box<dyn ExtractionStrategy>>, min_length: usize) -> Self {
        Self {
            strategies,
            min_length,
        }
    }

    /// Extract body text and metadata from `raw_html` fetched from `url`.
    ///
    /// # Errors
    ///
    /// [`ExtractError::EmptyContent`] when no strategy found any text, and
    /// [`ExtractError::BelowMinLength`] when the best text is too short to
    /// summarize.
    #[instrument(level = "info", skip_all, fields(%url))]
    pub fn extract(&self, raw_html: &str, url: &Url) -> Result<(ArticleContent, ArticleMetadata), ExtractError> {
        let document = Html::parse_document(raw_html);

        let mut longest = 0usize;
        let mut chosen = None;
        for strategy in &self.strategies {
            let Some(text) = strategy.extract(&document) else {
                continue;
            };
            let length = text.chars().count();
            debug!(strategy = strategy.name(), length, "Strategy produced text");
            if length >= self.min_length {
                chosen = Some((strategy.name().to_string(), text));
                break;
            }
            longest = longest.max(length);
        }

        let (strategy, text) = match chosen {
            Some(found) => found,
            None if longest == 0 => return Err(ExtractError::EmptyContent),
            None => {
                return Err(ExtractError::BelowMinLength {
                    length: longest,
                    minimum: self.min_length,
                });
            }
        };

        let metadata = metadata::extract_metadata(&document, url, &text);
        debug!(%strategy, words = metadata.word_count, "Extracted article");
        Ok((
            ArticleContent {
                url: url.clone(),
                text,
                strategy,
            },
            metadata,
        ))
    }
}
