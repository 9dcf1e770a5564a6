//! Lexicon-based polarity and subjectivity scoring.
//!
//! Each known word carries a polarity in [-1, 1] and a subjectivity in
//! [0, 1]. A preceding intensifier scales both; a negation within the three
//! preceding words flips and halves the polarity. The text's scores are the
//! means over every scored word, and a text with no known words scores 0/0.
//! Scoring is a pure function of the text.

use crate::models::Sentiment;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z]+(?:'[a-z]+)?").unwrap());

#[rustfmt::skip]
static LEXICON: Lazy<HashMap<&'static str, (f64, f64)>> = Lazy::new(|| {
    HashMap::from([
        ("good", (0.7, 0.6)), ("great", (0.8, 0.75)), ("excellent", (1.0, 1.0)),
        ("best", (1.0, 0.3)), ("better", (0.5, 0.5)), ("positive", (0.227, 0.545)),
        ("strong", (0.433, 0.733)), ("stronger", (0.4, 0.7)), ("robust", (0.4, 0.5)),
        ("successful", (0.75, 0.95)), ("success", (0.6, 0.7)), ("happy", (0.8, 1.0)),
        ("impressive", (1.0, 1.0)), ("remarkable", (0.75, 0.75)), ("outstanding", (0.5, 0.65)),
        ("healthy", (0.5, 0.5)), ("promising", (0.3, 0.55)), ("optimistic", (0.5, 0.6)),
        ("confident", (0.5, 0.667)), ("favorable", (0.4, 0.6)), ("favourable", (0.4, 0.6)),
        ("profitable", (0.5, 0.6)), ("record", (0.2, 0.3)), ("innovative", (0.5, 0.75)),
        ("significant", (0.375, 0.875)), ("important", (0.4, 1.0)), ("new", (0.136, 0.455)),
        ("easy", (0.433, 0.833)), ("nice", (0.6, 1.0)), ("love", (0.5, 0.6)),
        ("win", (0.8, 0.4)), ("wins", (0.8, 0.4)), ("gain", (0.3, 0.3)), ("gains", (0.3, 0.3)),
        ("growth", (0.2, 0.3)), ("boost", (0.35, 0.4)), ("surge", (0.3, 0.4)),
        ("improved", (0.4, 0.5)), ("improve", (0.3, 0.4)), ("benefit", (0.3, 0.4)),
        ("opportunity", (0.3, 0.4)), ("leading", (0.3, 0.4)), ("top", (0.5, 0.5)),
        ("wonderful", (1.0, 1.0)), ("amazing", (0.6, 0.9)), ("fantastic", (0.4, 0.9)),
        ("perfect", (1.0, 1.0)), ("fine", (0.417, 0.5)), ("secure", (0.4, 0.6)),
        ("stable", (0.2, 0.4)), ("clear", (0.1, 0.383)), ("fair", (0.7, 0.9)),
        ("bad", (-0.7, 0.667)), ("worse", (-0.4, 0.6)), ("worst", (-1.0, 1.0)),
        ("poor", (-0.4, 0.6)), ("weak", (-0.375, 0.625)), ("weaker", (-0.35, 0.6)),
        ("negative", (-0.3, 0.4)), ("terrible", (-1.0, 1.0)), ("awful", (-1.0, 1.0)),
        ("horrible", (-1.0, 1.0)), ("sad", (-0.5, 1.0)), ("angry", (-0.5, 1.0)),
        ("difficult", (-0.5, 1.0)), ("hard", (-0.292, 0.542)), ("wrong", (-0.5, 0.9)),
        ("failed", (-0.5, 0.3)), ("failure", (-0.316, 0.3)), ("fail", (-0.5, 0.3)),
        ("loss", (-0.3, 0.3)), ("losses", (-0.3, 0.3)), ("decline", (-0.25, 0.3)),
        ("declined", (-0.25, 0.3)), ("drop", (-0.2, 0.3)), ("plunge", (-0.4, 0.4)),
        ("slump", (-0.4, 0.4)), ("crisis", (-0.5, 0.5)), ("risk", (-0.2, 0.4)),
        ("risky", (-0.4, 0.7)), ("uncertain", (-0.2, 0.6)), ("concern", (-0.25, 0.4)),
        ("concerns", (-0.25, 0.4)), ("worried", (-0.4, 0.7)), ("fear", (-0.4, 0.6)),
        ("fears", (-0.4, 0.6)), ("dangerous", (-0.6, 0.9)), ("serious", (-0.333, 0.667)),
        ("severe", (-0.5, 0.8)), ("disappointing", (-0.6, 0.7)), ("unfortunate", (-0.5, 1.0)),
        ("problem", (-0.3, 0.4)), ("problems", (-0.3, 0.4)), ("fraud", (-0.7, 0.6)),
        ("scandal", (-0.6, 0.6)), ("lawsuit", (-0.3, 0.3)), ("layoffs", (-0.4, 0.3)),
        ("bankrupt", (-0.6, 0.4)), ("bankruptcy", (-0.6, 0.4)), ("debt", (-0.2, 0.2)),
        ("slow", (-0.3, 0.4)), ("volatile", (-0.3, 0.6)), ("ugly", (-0.7, 1.0)),
        ("stupid", (-0.8, 1.0)), ("hate", (-0.8, 0.9)), ("crash", (-0.5, 0.4)),
        ("beautiful", (0.85, 1.0)), ("interesting", (0.5, 0.5)), ("exciting", (0.3, 0.8)),
        ("popular", (0.6, 0.8)), ("valuable", (0.5, 0.7)), ("reliable", (0.4, 0.6)),
        ("huge", (0.4, 0.9)), ("big", (0.0, 0.1)), ("large", (0.214, 0.429)),
        ("small", (-0.25, 0.4)), ("low", (0.0, 0.3)), ("high", (0.16, 0.54)),
        ("likely", (0.0, 1.0)), ("possible", (0.0, 1.0)), ("probably", (0.0, 0.5)),
        ("really", (0.2, 0.2)), ("certain", (0.214, 0.571)), ("sure", (0.5, 0.889)),
        ("real", (0.2, 0.3)), ("true", (0.35, 0.65)), ("false", (-0.4, 0.7)),
        ("main", (0.167, 0.333)), ("major", (0.063, 0.5)), ("key", (0.0, 0.5)),
        ("professional", (0.1, 0.1)), ("official", (0.0, 0.0)), ("public", (0.0, 0.067)),
        ("recent", (0.0, 0.25)), ("current", (0.0, 0.4)), ("annual", (0.0, 0.0)),
    ])
});

#[rustfmt::skip]
static INTENSIFIERS: Lazy<HashMap<&'static str, f64>> = Lazy::new(|| {
    HashMap::from([
        ("very", 1.3), ("extremely", 1.5), ("highly", 1.3), ("incredibly", 1.4),
        ("so", 1.2), ("quite", 1.1), ("too", 1.2), ("most", 1.3), ("more", 1.1),
        ("slightly", 0.5), ("somewhat", 0.7), ("fairly", 0.8), ("less", 0.6),
    ])
});

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "none", "nor", "cannot", "without", "hardly", "don't", "doesn't",
    "didn't", "isn't", "wasn't", "aren't", "weren't", "won't", "wouldn't", "shouldn't",
    "couldn't", "hasn't", "haven't", "hadn't", "can't",
];

/// Score the sentiment of `text`.
pub fn analyze(text: &str) -> Sentiment {
    let lowered = text.to_lowercase().replace('\u{2019}', "'");
    let tokens: Vec<&str> = TOKEN.find_iter(&lowered).map(|m| m.as_str()).collect();

    let mut polarity_sum = 0.0;
    let mut subjectivity_sum = 0.0;
    let mut scored = 0usize;

    for (i, token) in tokens.iter().enumerate() {
        // Intensifiers modify the next word rather than carrying their own score.
        if INTENSIFIERS.contains_key(token) {
            continue;
        }
        let Some(&(mut polarity, mut subjectivity)) = LEXICON.get(token) else {
            continue;
        };

        if let Some(m) = i.checked_sub(1).and_then(|j| INTENSIFIERS.get(tokens[j])) {
            polarity = (polarity * m).clamp(-1.0, 1.0);
            subjectivity = (subjectivity * m).clamp(0.0, 1.0);
        }
        if tokens[i.saturating_sub(3)..i].iter().any(|t| NEGATIONS.contains(t)) {
            polarity *= -0.5;
        }

        polarity_sum += polarity;
        subjectivity_sum += subjectivity;
        scored += 1;
    }

    if scored == 0 {
        return Sentiment::new(0.0, 0.0);
    }
    let n = scored as f64;
    Sentiment::new(polarity_sum / n, subjectivity_sum / n)
}
