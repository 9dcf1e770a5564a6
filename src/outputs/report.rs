//! Plain-text rendering of a batch report for the terminal.

use crate::models::{BatchReport, NOT_FOUND, PipelineRecord};
use itertools::Itertools;
use std::fmt::Write;

const RULE_WIDTH: usize = 80;

/// Render `report` as the console summary printed after a run.
pub fn render(report: &BatchReport) -> String {
    let mut out = String::new();
    let rule = "=".repeat(RULE_WIDTH);

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "NEWS DIGEST");
    let _ = writeln!(out, "{rule}");
    let query = if report.search_query.is_empty() {
        "(direct urls)"
    } else {
        report.search_query.as_str()
    };
    let _ = writeln!(out, "Search query: {query}");
    let _ = writeln!(out, "Generated at: {}", report.timestamp.to_rfc3339());
    let _ = writeln!(
        out,
        "Items: {} attempted, {} succeeded, {} failed{}",
        report.total_items,
        report.succeeded_count,
        report.failed_count(),
        if report.aborted { " (cancelled)" } else { "" }
    );
    let _ = writeln!(out, "{}", "-".repeat(RULE_WIDTH));

    for record in &report.items {
        render_record(&mut out, record);
    }
    let _ = writeln!(out, "{rule}");
    out
}

fn render_record(out: &mut String, record: &PipelineRecord) {
    let _ = writeln!(out, "\nArticle {}: {}", record.index, if record.success { "✓" } else { "✗" });

    let title = record
        .metadata
        .as_ref()
        .and_then(|m| m.title.as_deref())
        .or_else(|| record.search_hit.as_ref().map(|h| h.title.as_str()))
        .unwrap_or(NOT_FOUND);
    let _ = writeln!(out, "  Title: {title}");
    if let Some(source) = record.search_hit.as_ref().and_then(|h| h.source_name.as_deref()) {
        let _ = writeln!(out, "  Source: {source}");
    }
    let url = record.resolved_url.as_deref().unwrap_or(record.source_url.as_str());
    let _ = writeln!(out, "  URL: {url}{}", if record.unresolved { " (unresolved)" } else { "" });

    if let Some(meta) = &record.metadata {
        let authors = if meta.authors.is_empty() {
            NOT_FOUND.to_string()
        } else {
            meta.authors.iter().join(", ")
        };
        let date = meta
            .publish_date
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| NOT_FOUND.to_string());
        let _ = writeln!(out, "  Authors: {authors}");
        let _ = writeln!(out, "  Published: {date}");
        let _ = writeln!(out, "  Word count: {}", meta.word_count);
    }

    if let Some(summary) = &record.summary_result {
        let _ = writeln!(out, "  Summary: {}", summary.summary);
        let _ = writeln!(
            out,
            "  Sentiment: {} (polarity: {}), {} (subjectivity: {})",
            summary.sentiment_analysis.sentiment_label,
            summary.sentiment_analysis.polarity,
            summary.sentiment_analysis.objectivity_label,
            summary.sentiment_analysis.subjectivity
        );
        if !summary.keywords.is_empty() {
            let _ = writeln!(out, "  Keywords: {}", summary.keywords.iter().take(5).join(", "));
        }
        let _ = writeln!(
            out,
            "  Length: {} -> {} chars ({})",
            summary.original_length, summary.summary_length, summary.compression_ratio
        );
    }

    if let Some(error) = &record.error {
        let _ = writeln!(out, "  Failed while {}: {}", error.stage, error.message);
    }
}
