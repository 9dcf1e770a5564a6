//! Sentence splitting and sentence-respecting chunking.

use crate::config::TargetLength;

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn is_closer(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '\u{201d}' | '\u{2019}')
}

/// Split `text` into sentences.
///
/// A sentence ends at `.`, `!` or `?` (plus any closing quotes or brackets)
/// followed by whitespace or the end of the text. Decimal points and
/// dotted abbreviations inside words therefore do not split.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_terminator(c) {
            continue;
        }
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if is_terminator(next) || is_closer(next) {
                end = j + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }
        if chars.peek().is_none_or(|&(_, next)| next.is_whitespace()) {
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

/// Group whole sentences into chunks of at most `max_chunk_size` chars.
///
/// A sentence longer than the bound becomes a chunk of its own; sentences
/// are never cut.
pub fn chunk_sentences(text: &str, max_chunk_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in split_sentences(text) {
        let len = sentence.chars().count();
        if current.is_empty() {
            current.push_str(sentence);
            current_len = len;
        } else if current_len + 1 + len <= max_chunk_size {
            current.push(' ');
            current.push_str(sentence);
            current_len += 1 + len;
        } else {
            chunks.push(std::mem::take(&mut current));
            current.push_str(sentence);
            current_len = len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Length bounds for each of `chunks` map-pass calls.
///
/// The overall target is shared across chunks, but never drops below
/// `floor`, the minimum never drops below one word, and the minimum never
/// exceeds the maximum.
pub fn chunk_target(target: TargetLength, chunks: usize, floor: usize) -> TargetLength {
    let n = chunks.max(1);
    let max_length = (target.max_length / n).max(floor).max(1);
    let min_length = (target.min_length / n).max(1).min(max_length);
    TargetLength {
        max_length,
        min_length,
    }
}
