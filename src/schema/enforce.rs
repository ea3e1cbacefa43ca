//! Schema enforcement: strict parse, extraction, then deterministic repair.
//!
//! Repair only removes or shortens. Text over its ceiling is cut on a
//! character boundary and ends in [`TRUNCATION_MARKER`]; blank or
//! non-string items and surplus list items are dropped. A result that
//! still misses a minimum count or a required field is a
//! [`GatewayError::Schema`].

use serde_json::{Map, Value};

use super::{FieldShape, ListSchema, ResponseSchema, extract};
use crate::types::Enforced;
use crate::{GatewayError, Result};

/// Appended to text cut at its length ceiling; counted within the ceiling.
pub const TRUNCATION_MARKER: &str = "...";

/// Turn a raw model response into a value of `schema`'s shape.
///
/// Returns the value with its repair flags, or [`GatewayError::Schema`]
/// when no usable payload exists or repair cannot meet a minimum count or
/// a required field. Pure: no I/O, no shared state.
pub fn enforce(raw: &str, schema: &ResponseSchema) -> Result<Enforced> {
    let candidate = match serde_json::from_str::<Value>(raw.trim()) {
        Ok(value) if schema.validate(&value).is_ok() => return Ok(Enforced::untouched(value)),
        Ok(value) => Some(extract::coerce(value, schema)),
        Err(_) => extract::extract(raw, schema),
    };

    let value = candidate.ok_or_else(|| {
        GatewayError::Schema("no structured payload found in response".to_string())
    })?;

    if schema.validate(&value).is_ok() {
        return Ok(Enforced {
            repaired: true,
            ..Enforced::untouched(value)
        });
    }

    let mut repair = Repair::default();
    let value = match schema {
        ResponseSchema::List(list) => repair.list("$", value, list)?,
        ResponseSchema::Object { fields } => {
            let Value::Object(mut obj) = value else {
                return Err(GatewayError::Schema("expected a JSON object".to_string()));
            };
            let mut out = Map::new();
            for field in fields {
                let path = format!("$.{}", field.name);
                let repaired = match (obj.remove(&field.name), &field.shape) {
                    (None, _) => None,
                    (Some(v), FieldShape::Text { max_chars }) => repair.text(v, *max_chars),
                    (Some(v), FieldShape::List(list)) => match repair.list(&path, v, list) {
                        Ok(v) => Some(v),
                        Err(e) if field.required => return Err(e),
                        Err(_) => {
                            repair.dropped += 1;
                            None
                        }
                    },
                };
                match repaired {
                    Some(v) => {
                        out.insert(field.name.clone(), v);
                    }
                    None if field.required => {
                        return Err(GatewayError::Schema(format!(
                            "{path}: required field missing or unusable"
                        )));
                    }
                    None => {}
                }
            }
            Value::Object(out)
        }
    };

    // Repair output must satisfy the schema it was repaired against.
    schema
        .validate(&value)
        .map_err(|v| GatewayError::Schema(v.to_string()))?;

    Ok(Enforced {
        value,
        was_truncated: repair.truncated,
        dropped_items: repair.dropped,
        repaired: true,
    })
}

#[derive(Default)]
struct Repair {
    truncated: bool,
    dropped: usize,
}

impl Repair {
    /// Repair a text field. `None` means the value is unusable.
    fn text(&mut self, value: Value, max_chars: Option<usize>) -> Option<Value> {
        let s = match value {
            Value::String(s) => s,
            // A list where prose was expected: keep the content, one per line.
            Value::Array(items) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            _ => return None,
        };
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        Some(Value::String(match max_chars {
            Some(max) => self.cut(s, max),
            None => s.to_string(),
        }))
    }

    /// Repair a list: keep usable strings, truncate, cap the count, then
    /// check the minimum.
    fn list(&mut self, path: &str, value: Value, schema: &ListSchema) -> Result<Value> {
        let raw_items = match value {
            Value::Array(items) => items,
            // Newline-separated prose where an array was expected.
            Value::String(s) => {
                let lines = extract::bullet_lines(&s);
                let lines = if lines.is_empty() {
                    s.lines().map(String::from).collect()
                } else {
                    lines
                };
                lines.into_iter().map(Value::String).collect()
            }
            _ => {
                return Err(GatewayError::Schema(format!("{path}: expected an array")));
            }
        };

        let mut items = Vec::with_capacity(raw_items.len());
        for item in raw_items {
            match item.as_str().map(str::trim) {
                Some(s) if !s.is_empty() => {
                    items.push(Value::String(self.cut(s, schema.max_item_chars)))
                }
                _ => self.dropped += 1,
            }
        }

        if items.len() > schema.max_items {
            self.dropped += items.len() - schema.max_items;
            self.truncated = true;
            items.truncate(schema.max_items);
        }

        if items.len() < schema.min_items {
            return Err(GatewayError::Schema(format!(
                "{path}: expected at least {} usable items, found {}",
                schema.min_items,
                items.len()
            )));
        }

        Ok(Value::Array(items))
    }

    fn cut(&mut self, s: &str, max: usize) -> String {
        let (out, cut) = truncate_chars(s, max);
        self.truncated |= cut;
        out
    }
}

/// Cut `s` to at most `max` characters, ending in [`TRUNCATION_MARKER`]
/// when there is room for it. Returns the text and whether it was cut.
pub fn truncate_chars(s: &str, max: usize) -> (String, bool) {
    if s.chars().count() <= max {
        return (s.to_string(), false);
    }
    let marker_len = TRUNCATION_MARKER.chars().count();
    if max <= marker_len {
        return (s.chars().take(max).collect(), true);
    }
    let head: String = s.chars().take(max - marker_len).collect();
    (format!("{}{TRUNCATION_MARKER}", head.trim_end()), true)
}
