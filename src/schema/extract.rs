//! Best-effort recovery of a structured payload from model prose.
//!
//! Models wrap JSON in code fences, lead with a sentence, or ignore the
//! JSON instruction and answer with a bulleted list. These helpers find
//! the first usable fragment; validation and repair happen afterwards.

use serde_json::Value;

use super::ResponseSchema;

/// Upper bound on parse attempts per response.
const MAX_FRAGMENT_ATTEMPTS: usize = 64;

/// Find a candidate value for `schema` inside `raw`.
///
/// For list schemas this tries, in order: the first JSON array, the first
/// JSON object holding exactly one array, then bullet or numbered lines.
/// Object schemas only accept the first JSON object.
pub fn extract(raw: &str, schema: &ResponseSchema) -> Option<Value> {
    match schema {
        ResponseSchema::List(_) => first_fragment(raw, '[')
            .or_else(|| first_fragment(raw, '{').and_then(unwrap_single_list))
            .or_else(|| {
                let lines = bullet_lines(raw);
                (!lines.is_empty())
                    .then(|| Value::Array(lines.into_iter().map(Value::String).collect()))
            }),
        ResponseSchema::Object { .. } => first_fragment(raw, '{'),
    }
}

/// Adapt an already-parsed value to the schema's top-level shape.
///
/// A list schema answered with `{"bullets": [...]}` yields the inner array.
pub fn coerce(value: Value, schema: &ResponseSchema) -> Value {
    match (schema, value) {
        (ResponseSchema::List(_), v @ Value::Object(_)) => {
            unwrap_single_list(v.clone()).unwrap_or(v)
        }
        (_, v) => v,
    }
}

/// First well-formed JSON value that starts with `open` (`[` or `{`).
///
/// Trailing prose after the value is ignored.
pub fn first_fragment(raw: &str, open: char) -> Option<Value> {
    raw.char_indices()
        .filter(|(_, c)| *c == open)
        .take(MAX_FRAGMENT_ATTEMPTS)
        .find_map(|(i, _)| {
            let mut stream = serde_json::Deserializer::from_str(&raw[i..]).into_iter::<Value>();
            match stream.next() {
                Some(Ok(v)) if v.is_array() || v.is_object() => Some(v),
                _ => None,
            }
        })
}

/// Lines that look like list items, with their markers stripped.
///
/// Recognises `-`, `*`, `•` and `1.` / `1)` prefixes.
pub fn bullet_lines(raw: &str) -> Vec<String> {
    raw.lines()
        .filter_map(|line| strip_marker(line.trim()))
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn strip_marker(line: &str) -> Option<&str> {
    for marker in ["- ", "* ", "• ", "•"] {
        if let Some(rest) = line.strip_prefix(marker) {
            return Some(rest);
        }
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return Some(rest);
        }
    }
    None
}

fn unwrap_single_list(value: Value) -> Option<Value> {
    let obj = value.as_object()?;
    let mut arrays = obj.values().filter(|v| v.is_array());
    match (arrays.next(), arrays.next()) {
        (Some(only), None) => Some(only.clone()),
        _ => None,
    }
}
