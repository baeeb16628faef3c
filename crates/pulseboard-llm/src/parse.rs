//! Pulls JSON out of free-form model output.
//!
//! Candidates are tried in order: the whole (trimmed) text, each fenced
//! ```` ```json ```` block, then every balanced bracket span found by a
//! string-aware scan. The first candidate that parses into the wanted shape
//! wins.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n?(.*?)```").expect("fenced block regex is valid")
});

/// First JSON array in `text`.
///
/// JSON-mode providers can only return objects, so a whole-text or fenced
/// object is unwrapped: its `suggestions` field if that is an array, else its
/// first array-valued field.
#[must_use]
pub fn extract_json_array(text: &str) -> Option<Vec<Value>> {
    candidates(text, b'[', b']').find_map(|candidate| {
        match serde_json::from_str::<Value>(candidate).ok()? {
            Value::Array(items) => Some(items),
            Value::Object(mut map) => match map.remove("suggestions") {
                Some(Value::Array(items)) => Some(items),
                _ => map.into_iter().find_map(|(_, v)| match v {
                    Value::Array(items) => Some(items),
                    _ => None,
                }),
            },
            _ => None,
        }
    })
}

/// First JSON object in `text`.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    extract_json_object_matching(text, |_| true)
}

/// First JSON object in `text` accepted by `accept`.
///
/// Nested objects of a truncated outer object are still candidates, so
/// callers that expect a known shape should check for its keys here.
pub fn extract_json_object_matching<F>(text: &str, accept: F) -> Option<Map<String, Value>>
where
    F: Fn(&Map<String, Value>) -> bool,
{
    candidates(text, b'{', b'}').find_map(|candidate| {
        match serde_json::from_str::<Value>(candidate).ok()? {
            Value::Object(map) if accept(&map) => Some(map),
            _ => None,
        }
    })
}

fn candidates<'a>(text: &'a str, open: u8, close: u8) -> impl Iterator<Item = &'a str> {
    let whole = std::iter::once(text.trim()).filter(|t| !t.is_empty());
    let fenced = FENCED_BLOCK
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim());
    whole
        .chain(fenced)
        .chain(balanced_spans(text, open, close))
}

/// Every balanced `open ... close` span, left to right. Brackets inside JSON
/// string literals are ignored. After a complete span the scan resumes past
/// its end, so nested spans are never yielded separately.
fn balanced_spans(text: &str, open: u8, close: u8) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut start = 0;

    while let Some(offset) = bytes[start..].iter().position(|&b| b == open) {
        let begin = start + offset;
        match span_end(bytes, begin, open, close) {
            Some(end) => {
                spans.push(&text[begin..=end]);
                start = end + 1;
            }
            None => start = begin + 1,
        }
        if start >= bytes.len() {
            break;
        }
    }
    spans
}

fn span_end(bytes: &[u8], begin: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(begin) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        if b == b'"' {
            in_string = true;
        } else if b == open {
            depth += 1;
        } else if b == close {
            depth -= 1;
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}
