//! Locate the JSON payload inside a free-text agent reply.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static RE_FENCED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)```").unwrap());

/// A JSON object found in a reply, with the byte span it occupied.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub value: Value,
    pub span: Range<usize>,
}

/// Top-level keys that mark an object as a guidance payload rather than a
/// snippet quoted in the prose.
const PAYLOAD_KEYS: &[&str] = &[
    "text",
    "filters",
    "filter_choice",
    "filteroptions",
    "cities",
    "city",
    "location",
    "neighborhood",
    "propertytypes",
    "property_type",
    "propertytype",
    "roomtypes",
    "room_type",
    "roomtype",
    "price",
    "pricerange",
    "price_range",
];

fn is_payload(value: &Value) -> bool {
    value.as_object().is_some_and(|obj| {
        obj.keys()
            .any(|k| PAYLOAD_KEYS.contains(&k.to_lowercase().as_str()))
    })
}

/// Find the reply's JSON object. Candidates are fenced code blocks, then
/// balanced `{...}` objects in reading order. The first candidate carrying a
/// payload key wins; otherwise the first candidate that parses.
pub fn extract_json(text: &str) -> Option<Extracted> {
    let mut candidates = fenced_objects(text);
    candidates.extend(brace_objects(text));

    match candidates.iter().position(|c| is_payload(&c.value)) {
        Some(i) => Some(candidates.swap_remove(i)),
        None => candidates.into_iter().next(),
    }
}

fn fenced_objects(text: &str) -> Vec<Extracted> {
    RE_FENCED
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let inner = caps.get(1)?;
            match serde_json::from_str::<Value>(inner.as_str().trim()) {
                Ok(value @ Value::Object(_)) => Some(Extracted {
                    value,
                    span: whole.range(),
                }),
                _ => None,
            }
        })
        .collect()
}

/// Top-level balanced objects outside of any already matched object.
fn brace_objects(text: &str) -> Vec<Extracted> {
    let mut found = Vec::new();
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        search_from = start + 1;
        let Some(end) = balanced_end(text, start) else {
            continue;
        };
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&text[start..end]) {
            found.push(Extracted {
                value,
                span: start..end,
            });
            search_from = end;
        }
    }
    found
}

/// Byte index one past the brace that closes the one at `start`.
/// Braces inside string literals are ignored.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// The reply with the extracted JSON removed, for display.
pub fn strip_span(text: &str, span: &Range<usize>) -> String {
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..span.start]);
    out.push_str(&text[span.end..]);
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
