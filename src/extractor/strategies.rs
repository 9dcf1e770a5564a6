//! Ordered body-text strategies.
//!
//! Each strategy looks at a parsed document and either returns candidate
//! text or nothing. The extractor tries them in order and keeps the first
//! candidate that is long enough to be worth summarizing.

use super::{collect_text, is_inside_skipped, normalize_whitespace};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::HashSet;

static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());

/// Container selectors tried before falling back to loose paragraphs.
pub const CONTAINER_SELECTORS: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    ".content",
    "#content",
    ".post",
    ".entry",
    "div.text",
    "div.body",
];

pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &str;

    /// Whitespace-normalized text, or `None` when nothing matched.
    fn extract(&self, document: &Html) -> Option<String>;
}

/// Text of every element matching one CSS selector.
///
/// Matches nested inside another match are skipped so their text is not
/// counted twice, as are matches inside navigation or other chrome.
pub struct SelectorStrategy {
    name: String,
    selector: Selector,
}

impl SelectorStrategy {
    pub fn new(css: &str) -> Option<Self> {
        Some(Self {
            name: css.to_string(),
            selector: Selector::parse(css).ok()?,
        })
    }
}

impl ExtractionStrategy for SelectorStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&self, document: &Html) -> Option<String> {
        let matches: Vec<_> = document
            .select(&self.selector)
            .filter(|el| !is_inside_skipped(el))
            .collect();
        let ids: HashSet<_> = matches.iter().map(|el| el.id()).collect();

        let mut raw = String::new();
        for el in matches
            .iter()
            .filter(|el| !el.ancestors().any(|a| ids.contains(&a.id())))
        {
            collect_text(*el, &mut raw);
            raw.push(' ');
        }

        let text = normalize_whitespace(&raw);
        (!text.is_empty()).then_some(text)
    }
}

/// Last resort: every `<p>` outside page chrome, joined.
#[derive(Debug, Default)]
pub struct ParagraphFallback;

impl ExtractionStrategy for ParagraphFallback {
    fn name(&self) -> &str {
        "paragraphs"
    }

    fn extract(&self, document: &Html) -> Option<String> {
        let paragraphs: Vec<String> = document
            .select(&PARAGRAPH)
            .filter(|p| !is_inside_skipped(p))
            .map(|p| {
                let mut raw = String::new();
                collect_text(p, &mut raw);
                normalize_whitespace(&raw)
            })
            .filter(|t| !t.is_empty())
            .collect();

        (!paragraphs.is_empty()).then(|| paragraphs.join(" "))
    }
}

/// The default chain: container selectors in priority order, then paragraphs.
pub fn default_chain() -> Vec<Box<dyn ExtractionStrategy>> {
    let mut chain: Vec<Box<dyn ExtractionStrategy>> = CONTAINER_SELECTORS
        .iter()
        .filter_map(|css| SelectorStrategy::new(css))
        .map(|s| Box::new(s) as Box<dyn ExtractionStrategy>)
        .collect();
    chain.push(Box::new(ParagraphFallback));
    chain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chain_order() {
        let names: Vec<String> = default_chain().iter().map(|s| s.name().to_string()).collect();
        assert_eq!(names.first().map(String::as_str), Some("article"));
        assert_eq!(names.get(1).map(String::as_str), Some("main"));
        assert_eq!(names.last().map(String::as_str), Some("paragraphs"));
        assert_eq!(names.len(), CONTAINER_SELECTORS.len() + 1);
    }

    #[test]
    fn test_selector_strategy_skips_nested_duplicates() {
        let html = Html::parse_document(
            r#"<div class="content">Outer text. <div class="content">Inner text.</div></div>"#,
        );
        let strategy = SelectorStrategy::new(".content").unwrap();
        assert_eq!(strategy.extract(&html).unwrap(), "Outer text. Inner text.");
    }

    #[test]
    fn test_selector_strategy_ignores_matches_inside_nav() {
        let html = Html::parse_document(
            r#"<nav><article>Menu teaser</article></nav><article>Real story.</article>"#,
        );
        let strategy = SelectorStrategy::new("article").unwrap();
        assert_eq!(strategy.extract(&html).unwrap(), "Real story.");
    }

    #[test]
    fn test_selector_strategy_no_match() {
        let html = Html::parse_document("<div>Nothing here</div>");
        assert!(SelectorStrategy::new("main").unwrap().extract(&html).is_none());
    }

    #[test]
    fn test_paragraph_fallback_skips_footer() {
        let html = Html::parse_document(
            "<div><p>First para.</p><p>Second para.</p></div><footer><p>Copyright</p></footer>",
        );
        let text = ParagraphFallback.extract(&html).unwrap();
        assert_eq!(text, "First para. Second para.");
    }
}
