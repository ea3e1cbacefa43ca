//! Response schemas and their enforcement.
//!
//! A [`ResponseSchema`] describes the shape a caller needs back from the
//! model: either a bare list of short strings or an object whose fields are
//! text or string lists. [`enforce`] turns free-form model output into a
//! value of that shape, repairing it where that is safe:
//!
//! 1. strict parse of the whole response as JSON, then validation;
//! 2. extraction of the first usable fragment from surrounding prose
//!    (see [`extract`]);
//! 3. deterministic repair: trim, truncate overlong text with
//!    [`TRUNCATION_MARKER`], drop invalid or surplus items;
//! 4. anything still short of a minimum count or missing a required field
//!    is a [`GatewayError::Schema`](crate::GatewayError::Schema).
//!
//! Enforcement never invents content.

pub mod defaults;
mod enforce;
pub mod extract;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use enforce::{TRUNCATION_MARKER, enforce, truncate_chars};

/// Bounds for a list of short strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSchema {
    pub min_items: usize,
    pub max_items: usize,
    /// Length ceiling per item, in characters.
    pub max_item_chars: usize,
}

impl ListSchema {
    pub fn new(min_items: usize, max_items: usize, max_item_chars: usize) -> Self {
        Self {
            min_items,
            max_items,
            max_item_chars,
        }
    }
}

/// Shape of one object field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldShape {
    Text {
        #[serde(default)]
        max_chars: Option<usize>,
    },
    List(ListSchema),
}

/// A named field of an object schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(flatten)]
    pub shape: FieldShape,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// Declarative shape expected from the model for one operation kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseSchema {
    /// A JSON array of strings.
    List(ListSchema),
    /// A JSON object with the listed fields; unknown fields are dropped.
    Object { fields: Vec<FieldSchema> },
}

/// Why a value does not match its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub reason: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

impl Violation {
    fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl ResponseSchema {
    /// A bare list schema.
    pub fn list(min_items: usize, max_items: usize, max_item_chars: usize) -> Self {
        ResponseSchema::List(ListSchema::new(min_items, max_items, max_item_chars))
    }

    /// An object schema with no fields yet; add them with
    /// [`text_field`](Self::text_field) and [`list_field`](Self::list_field).
    pub fn object() -> Self {
        ResponseSchema::Object { fields: Vec::new() }
    }

    pub fn text_field(self, name: &str, max_chars: Option<usize>, required: bool) -> Self {
        self.push_field(FieldSchema {
            name: name.to_string(),
            shape: FieldShape::Text { max_chars },
            required,
        })
    }

    pub fn list_field(self, name: &str, list: ListSchema, required: bool) -> Self {
        self.push_field(FieldSchema {
            name: name.to_string(),
            shape: FieldShape::List(list),
            required,
        })
    }

    fn push_field(self, field: FieldSchema) -> Self {
        match self {
            ResponseSchema::Object { mut fields } => {
                fields.retain(|f| f.name != field.name);
                fields.push(field);
                ResponseSchema::Object { fields }
            }
            // Adding a field to a list schema turns it into an object.
            ResponseSchema::List(_) => ResponseSchema::Object {
                fields: vec![field],
            },
        }
    }

    /// Check a value against the schema without modifying it.
    pub fn validate(&self, value: &Value) -> Result<(), Violation> {
        match self {
            ResponseSchema::List(list) => validate_list("$", value, list),
            ResponseSchema::Object { fields } => {
                let obj = value
                    .as_object()
                    .ok_or_else(|| Violation::new("$", "expected an object"))?;
                if let Some(extra) = obj.keys().find(|k| !fields.iter().any(|f| &f.name == *k)) {
                    return Err(Violation::new(format!("$.{extra}"), "unexpected field"));
                }
                for field in fields {
                    let path = format!("$.{}", field.name);
                    match (obj.get(&field.name), &field.shape) {
                        (None, _) if field.required => {
                            return Err(Violation::new(path, "required field missing"));
                        }
                        (None, _) => {}
                        (Some(v), FieldShape::Text { max_chars }) => {
                            validate_text(&path, v, *max_chars)?
                        }
                        (Some(v), FieldShape::List(list)) => validate_list(&path, v, list)?,
                    }
                }
                Ok(())
            }
        }
    }

    /// Plain-language description used in provider prompts.
    pub fn describe(&self) -> String {
        match self {
            ResponseSchema::List(list) => format!("a JSON array of {}", describe_list(list)),
            ResponseSchema::Object { fields } => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|f| {
                        let shape = match &f.shape {
                            FieldShape::Text {
                                max_chars: Some(max),
                            } => format!("string, at most {max} characters"),
                            FieldShape::Text { max_chars: None } => "string".to_string(),
                            FieldShape::List(list) => format!("array of {}", describe_list(list)),
                        };
                        let optional = if f.required { "" } else { ", optional" };
                        format!("\"{}\" ({shape}{optional})", f.name)
                    })
                    .collect();
                format!("a JSON object with fields {}", parts.join("; "))
            }
        }
    }
}

fn describe_list(list: &ListSchema) -> String {
    let count = if list.min_items == list.max_items {
        format!("exactly {}", list.min_items)
    } else {
        format!("{} to {}", list.min_items, list.max_items)
    };
    format!(
        "{count} strings, each at most {} characters",
        list.max_item_chars
    )
}

fn validate_text(path: &str, value: &Value, max_chars: Option<usize>) -> Result<(), Violation> {
    let s = value
        .as_str()
        .ok_or_else(|| Violation::new(path, "expected a string"))?;
    if s.trim().is_empty() {
        return Err(Violation::new(path, "blank string"));
    }
    if let Some(max) = max_chars
        && s.chars().count() > max
    {
        let reason = format!("longer than {max} characters");
        return Err(Violation::new(path, reason));
    }
    Ok(())
}

fn validate_list(path: &str, value: &Value, list: &ListSchema) -> Result<(), Violation> {
    let items = value
        .as_array()
        .ok_or_else(|| Violation::new(path, "expected an array"))?;
    if items.len() < list.min_items || items.len() > list.max_items {
        return Err(Violation::new(
            path,
            format!(
                "expected {} to {} items, found {}",
                list.min_items,
                list.max_items,
                items.len()
            ),
        ));
    }
    for (i, item) in items.iter().enumerate() {
        validate_text(&format!("{path}[{i}]"), item, Some(list.max_item_chars))?;
    }
    Ok(())
}
