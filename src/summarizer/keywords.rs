//! Frequency-based keyword extraction.

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z][a-z0-9'-]*[a-z0-9]").unwrap());

#[rustfmt::skip]
static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her",
        "was", "one", "our", "out", "has", "have", "his", "how", "its", "may", "new", "now",
        "old", "see", "two", "who", "did", "get", "got", "him", "let", "say", "she", "too",
        "use", "that", "with", "this", "from", "they", "will", "would", "there", "their",
        "what", "about", "which", "when", "were", "been", "into", "than", "them", "then",
        "these", "those", "some", "such", "also", "more", "most", "other", "over", "only",
        "said", "says", "after", "before", "while", "where", "could", "should", "being",
        "each", "just", "like", "very", "much", "many", "made", "make", "year", "years",
        "between", "because", "through", "during", "under", "again", "against", "both",
        "does", "doing", "down", "here", "off", "once", "same", "own", "few", "why", "yet",
        "per", "via", "upon", "within", "without", "among", "across", "amid", "according",
        "including", "however", "since", "until", "told", "added", "still", "even", "well",
        "back", "first", "last", "week", "month", "today", "yesterday", "percent", "it's",
        "we're", "they're", "don't", "didn't", "isn't", "wasn't",
    ])
});

/// The `limit` most frequent content words in `text`.
///
/// Words shorter than three characters and stopwords are ignored. Ties are
/// broken by first occurrence, so the result is deterministic.
pub fn extract_keywords(text: &str, limit: usize) -> Vec<String> {
    let lowered = text.to_lowercase().replace('\u{2019}', "'");

    // word -> (count, first position)
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (pos, word) in WORD
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|w| w.chars().count() >= 3 && !STOPWORDS.contains(w))
        .enumerate()
    {
        counts.entry(word).or_insert((0, pos)).0 += 1;
    }

    counts
        .into_iter()
        .sorted_by(|(_, (ca, pa)), (_, (cb, pb))| cb.cmp(ca).then(pa.cmp(pb)))
        .take(limit)
        .map(|(word, _)| word.to_string())
        .collect()
}
