//! Best-effort article metadata.
//!
//! Every field is looked up independently from meta tags, JSON-LD blocks,
//! and a few structural fallbacks. A field that cannot be found stays empty
//! and is serialized as the "not found" sentinel; it never fails the item.

use crate::models::ArticleMetadata;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

static JSON_LD: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static REL_AUTHOR: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"[rel="author"]"#).unwrap());
static TIME: Lazy<Selector> = Lazy::new(|| Selector::parse("time[datetime]").unwrap());
static CONTENT_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("article img[src], main img[src]").unwrap());

const TITLE_META: &[&str] = &[r#"meta[property="og:title"]"#, r#"meta[name="twitter:title"]"#];
const AUTHOR_META: &[&str] = &[r#"meta[name="author"]"#, r#"meta[property="article:author"]"#];
const DATE_META: &[&str] = &[
    r#"meta[property="article:published_time"]"#,
    r#"meta[property="og:published_time"]"#,
    r#"meta[name="pubdate"]"#,
    r#"meta[name="publishdate"]"#,
    r#"meta[name="date"]"#,
    r#"meta[itemprop="datePublished"]"#,
];
const IMAGE_META: &[&str] = &[
    r#"meta[property="og:image"]"#,
    r#"meta[name="twitter:image"]"#,
];

/// Gather metadata for a page whose body text is `body`.
pub fn extract_metadata(document: &Html, base: &Url, body: &str) -> ArticleMetadata {
    let json_ld = json_ld_objects(document);

    ArticleMetadata {
        title: extract_title(document, &json_ld),
        authors: extract_authors(document, &json_ld),
        publish_date: extract_publish_date(document, &json_ld),
        lead_image_url: extract_lead_image(document, &json_ld, base),
        word_count: body.split_whitespace().count(),
    }
}

/// First non-empty `content` attribute among `selectors`, in order.
fn meta_content(document: &Html, selectors: &[&str]) -> Option<String> {
    meta_find_map(document, selectors, |c| Some(c.to_string()))
}

/// First non-empty `content` attribute, in selector order, that `f` accepts.
fn meta_find_map<T>(document: &Html, selectors: &[&str], mut f: impl FnMut(&str) -> Option<T>) -> Option<T> {
    selectors
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .find_map(|sel| {
            document
                .select(&sel)
                .filter_map(|m| m.value().attr("content"))
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .find_map(&mut f)
        })
}

/// All JSON-LD objects in the page, with arrays and `@graph` flattened.
fn json_ld_objects(document: &Html) -> Vec<Value> {
    fn flatten(value: Value, out: &mut Vec<Value>) {
        match value {
            Value::Array(items) => items.into_iter().for_each(|v| flatten(v, out)),
            Value::Object(mut obj) => {
                if let Some(graph) = obj.remove("@graph") {
                    flatten(graph, out);
                }
                out.push(Value::Object(obj));
            }
            _ => {}
        }
    }

    let mut out = Vec::new();
    for script in document.select(&JSON_LD) {
        let raw = script.text().collect::<String>();
        if let Ok(value) = serde_json::from_str::<Value>(raw.trim()) {
            flatten(value, &mut out);
        }
    }
    out
}

fn json_ld_str(objects: &[Value], key: &str) -> Option<String> {
    objects
        .iter()
        .filter_map(|o| o.get(key).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(|el| el.text().collect::<String>().split_whitespace().join(" "))
        .find(|t| !t.is_empty())
}

fn extract_title(document: &Html, json_ld: &[Value]) -> Option<String> {
    meta_content(document, TITLE_META)
        .or_else(|| json_ld_str(json_ld, "headline"))
        .or_else(|| first_text(document, &TITLE))
        .or_else(|| first_text(document, &H1))
}

fn author_names(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => out.push(s.clone()),
        Value::Object(obj) => {
            if let Some(name) = obj.get("name").and_then(Value::as_str) {
                out.push(name.to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|v| author_names(v, out)),
        _ => {}
    }
}

fn clean_author(raw: &str) -> Option<String> {
    let trimmed = raw.split_whitespace().join(" ");
    let trimmed = trimmed
        .strip_prefix("By ")
        .or_else(|| trimmed.strip_prefix("by "))
        .unwrap_or(&trimmed)
        .trim();
    // Profile links are not names.
    if trimmed.is_empty() || trimmed.starts_with("http") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn extract_authors(document: &Html, json_ld: &[Value]) -> Vec<String> {
    let mut raw = Vec::new();
    for obj in json_ld {
        if let Some(author) = obj.get("author") {
            author_names(author, &mut raw);
        }
    }
    if raw.is_empty() {
        for css in AUTHOR_META {
            if let Some(found) = meta_content(document, &[*css]) {
                raw.extend(found.split(',').map(str::to_string));
            }
        }
    }
    if raw.is_empty() {
        raw.extend(
            document
                .select(&REL_AUTHOR)
                .map(|el| el.text().collect::<String>()),
        );
    }

    raw.iter()
        .filter_map(|a| clean_author(a))
        .unique()
        .collect()
}

/// Parse the date formats commonly found in article markup.
pub fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .or_else(|| DateTime::parse_from_rfc2822(raw).ok())
        .or_else(|| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z").ok())
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|n| n.and_utc().fixed_offset())
        })
        .or_else(|| {
            let day = NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok()?;
            day.and_hms_opt(0, 0, 0).map(|n| n.and_utc().fixed_offset())
        })
}

fn extract_publish_date(document: &Html, json_ld: &[Value]) -> Option<DateTime<FixedOffset>> {
    meta_find_map(document, DATE_META, parse_date)
        .or_else(|| json_ld_str(json_ld, "datePublished").and_then(|d| parse_date(&d)))
        .or_else(|| {
            document
                .select(&TIME)
                .filter_map(|t| t.value().attr("datetime"))
                .find_map(parse_date)
        })
}

fn json_ld_image(json_ld: &[Value]) -> Option<String> {
    fn image_url(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => obj.get("url").and_then(Value::as_str).map(str::to_string),
            Value::Array(items) => items.iter().find_map(image_url),
            _ => None,
        }
    }
    json_ld.iter().filter_map(|o| o.get("image")).find_map(image_url)
}

fn extract_lead_image(document: &Html, json_ld: &[Value], base: &Url) -> Option<String> {
    let raw = meta_content(document, IMAGE_META)
        .or_else(|| json_ld_image(json_ld))
        .or_else(|| {
            document
                .select(&CONTENT_IMAGE)
                .filter_map(|img| img.value().attr("src"))
                .map(str::trim)
                .find(|src| !src.is_empty() && !src.starts_with("data:"))
                .map(str::to_string)
        })?;
    base.join(&raw).ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn base() -> Url {
        Url::parse("https://news.example/business/story.html").unwrap()
    }

    fn meta(html: &str) -> ArticleMetadata {
        extract_metadata(&Html::parse_document(html), &base(), "one two three")
    }

    #[test]
    fn test_meta_tags() {
        let m = meta(
            r#"<html><head>
                <title>Fallback title</title>
                <meta property="og:title" content="Acme raises $5M">
                <meta name="author" content="Jane Roe, John Doe">
                <meta property="article:published_time" content="2025-05-06T14:30:00+05:30">
                <meta property="og:image" content="/img/lead.jpg">
            </head><body></body></html>"#,
        );
        assert_eq!(m.title.as_deref(), Some("Acme raises $5M"));
        assert_eq!(m.authors, vec!["Jane Roe", "John Doe"]);
        let date = m.publish_date.unwrap();
        assert_eq!((date.year(), date.month(), date.day(), date.hour()), (2025, 5, 6, 14));
        assert_eq!(m.lead_image_url.as_deref(), Some("https://news.example/img/lead.jpg"));
        assert_eq!(m.word_count, 3);
    }

    #[test]
    fn test_unparsable_date_meta_falls_through_to_next() {
        let m = meta(
            r#"<html><head>
                <meta property="article:published_time" content="Tuesday morning">
                <meta name="date" content="2022-03-04">
            </head><body></body></html>"#,
        );
        let date = m.publish_date.unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2022, 3, 4));
    }

    #[test]
    fn test_json_ld_fields() {
        let m = meta(
            r#"<script type="application/ld+json">
                {"@context":"https://schema.org","@graph":[
                  {"@type":"NewsArticle","headline":"Graph headline",
                   "author":[{"@type":"Person","name":"A. Writer"},{"@type":"Person","name":"A. Writer"}],
                   "datePublished":"2024-11-02",
                   "image":{"@type":"ImageObject","url":"https://cdn.example/x.png"}}
                ]}
            </script>"#,
        );
        assert_eq!(m.title.as_deref(), Some("Graph headline"));
        assert_eq!(m.authors, vec!["A. Writer"]);
        assert_eq!(m.publish_date.unwrap().day(), 2);
        assert_eq!(m.lead_image_url.as_deref(), Some("https://cdn.example/x.png"));
    }

    #[test]
    fn test_missing_fields_stay_empty() {
        let m = meta("<html><body><div>No metadata at all</div></body></html>");
        assert_eq!(m.title, None);
        assert!(m.authors.is_empty());
        assert_eq!(m.publish_date, None);
        assert_eq!(m.lead_image_url, None);
    }

    #[test]
    fn test_structural_fallbacks() {
        let m = meta(
            r#"<body><article><h1> Headline  only </h1><a rel="author" href="/staff/x">By Sam Lee</a>
               <time datetime="2023-01-15T08:00:00Z">Jan 15</time>
               <img src="data:image/gif;base64,AAAA"><img src="photos/a.jpg"></article></body>"#,
        );
        assert_eq!(m.title.as_deref(), Some("Headline only"));
        assert_eq!(m.authors, vec!["Sam Lee"]);
        assert_eq!(m.publish_date.unwrap().year(), 2023);
        assert_eq!(m.lead_image_url.as_deref(), Some("https://news.example/business/photos/a.jpg"));
    }

    #[test]
    fn test_parse_date_formats() {
        assert!(parse_date("2025-05-06T10:00:00Z").is_some());
        assert!(parse_date("Tue, 06 May 2025 10:00:00 GMT").is_some());
        assert!(parse_date("2025-05-06T10:00:00").is_some());
        assert!(parse_date("2025-05-06").is_some());
        assert!(parse_date("yesterday").is_none());
    }
}
