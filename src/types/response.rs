//! Gateway response types

use serde::{Deserialize, Serialize};

use crate::cache::Fingerprint;

/// Where a gateway response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Served from the TTL cache without a provider call.
    Cache,
    /// Produced by a provider call, either led by this caller or joined.
    Fresh,
}

/// Schema-conforming value plus repair flags.
///
/// This is what the cache stores, so a cache hit reports the same
/// truncation flag as the fresh response that populated it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enforced {
    pub value: serde_json::Value,
    /// Some text was cut to its length ceiling or surplus items were dropped.
    pub was_truncated: bool,
    /// Items discarded as invalid or beyond the maximum count, plus optional
    /// fields omitted because they could not be repaired.
    pub dropped_items: usize,
    /// The strict parse failed and extraction or repair was needed.
    pub repaired: bool,
}

impl Enforced {
    pub(crate) fn untouched(value: serde_json::Value) -> Self {
        Self {
            value,
            was_truncated: false,
            dropped_items: 0,
            repaired: false,
        }
    }
}

/// Result of [`AiGateway::request`](crate::AiGateway::request).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayResponse {
    pub value: serde_json::Value,
    pub source: Source,
    pub was_truncated: bool,
    pub fingerprint: Fingerprint,
}

impl GatewayResponse {
    pub(crate) fn new(enforced: Enforced, source: Source, fingerprint: Fingerprint) -> Self {
        Self {
            value: enforced.value,
            source,
            was_truncated: enforced.was_truncated,
            fingerprint,
        }
    }

    /// String items of a list-shaped value, or of `field` in an object value.
    ///
    /// Returns an empty vec when the shape does not match.
    pub fn items(&self, field: Option<&str>) -> Vec<String> {
        let list = match field {
            Some(name) => self.value.get(name),
            None => Some(&self.value),
        };
        list.and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }
}
