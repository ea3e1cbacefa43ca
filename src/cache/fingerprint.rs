//! Request fingerprints.
//!
//! A [`Fingerprint`] is a SHA-256 digest over a length-prefixed canonical
//! encoding of (operation, text, fields, model, max tokens, temperature,
//! response schema). It depends only on the normalized request and the
//! shape asked for, so it is stable across process restarts and usable as
//! a key for a shared cache backend. Two callers asking for different
//! shapes never share a cached or coalesced value.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::schema::{FieldShape, ListSchema, ResponseSchema};
use crate::types::{OperationKind, RequestInput};

/// Bumped whenever the canonical encoding changes.
const ENCODING_VERSION: &[u8] = b"quill-fp-v2";

/// Deterministic cache key for a normalized request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint an already-normalized request and the schema its
    /// result must satisfy.
    ///
    /// Callers are expected to pass the output of
    /// [`RequestInput::normalize`]; this function does not normalize.
    pub fn compute(
        operation: OperationKind,
        input: &RequestInput,
        schema: &ResponseSchema,
    ) -> Self {
        let mut hasher = Sha256::new();
        put(&mut hasher, ENCODING_VERSION);
        put(&mut hasher, operation.as_str().as_bytes());
        put(&mut hasher, input.text.as_bytes());

        hasher.update((input.fields.len() as u64).to_le_bytes());
        for (key, value) in &input.fields {
            put(&mut hasher, key.as_bytes());
            put(&mut hasher, value.as_bytes());
        }

        put(&mut hasher, input.params.model.as_bytes());
        hasher.update(input.params.max_tokens.to_le_bytes());
        put(
            &mut hasher,
            format!("{:.2}", input.params.temperature).as_bytes(),
        );
        put_schema(&mut hasher, schema);

        let hash: String = hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Length prefix keeps ("ab", "c") distinct from ("a", "bc").
fn put(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

fn put_schema(hasher: &mut Sha256, schema: &ResponseSchema) {
    match schema {
        ResponseSchema::List(list) => {
            put(hasher, b"list");
            put_list(hasher, list);
        }
        ResponseSchema::Object { fields } => {
            put(hasher, b"object");
            hasher.update((fields.len() as u64).to_le_bytes());
            for field in fields {
                put(hasher, field.name.as_bytes());
                hasher.update([u8::from(field.required)]);
                match &field.shape {
                    FieldShape::Text { max_chars } => {
                        put(hasher, b"text");
                        match max_chars {
                            Some(max) => {
                                hasher.update([1]);
                                hasher.update((*max as u64).to_le_bytes());
                            }
                            None => hasher.update([0]),
                        }
                    }
                    FieldShape::List(list) => {
                        put(hasher, b"list");
                        put_list(hasher, list);
                    }
                }
            }
        }
    }
}

fn put_list(hasher: &mut Sha256, list: &ListSchema) {
    for n in [list.min_items, list.max_items, list.max_item_chars] {
        hasher.update((n as u64).to_le_bytes());
    }
}
