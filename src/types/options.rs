//! Generation parameters and request input

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{GatewayError, Result};

/// Default model, matching the application's historical default.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default output budget in tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Options forwarded to the provider (provider-agnostic)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl GenerationParams {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = temp;
        self
    }

    /// Model ids are case-insensitive; temperature is kept to two decimals
    /// so float noise does not split cache entries.
    fn normalized(&self) -> Self {
        Self {
            model: self.model.trim().to_ascii_lowercase(),
            max_tokens: self.max_tokens,
            temperature: (self.temperature * 100.0).round() / 100.0,
        }
    }
}

/// Text payload plus named context fields for one gateway request.
///
/// `fields` carries operation-specific context such as the experience type
/// or the answers to follow-up questions. It is ordered so that the
/// fingerprint does not depend on insertion order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RequestInput {
    pub text: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub params: GenerationParams,
}

impl RequestInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Canonical form used for fingerprinting and for the provider call.
    ///
    /// Text and field values are trimmed with internal whitespace collapsed.
    /// Field keys and the model id are case-folded; text content is not,
    /// since case carries meaning in user prose. Empty fields are dropped.
    pub fn normalize(&self) -> Result<Self> {
        let text = collapse_whitespace(&self.text);
        if text.is_empty() {
            return Err(GatewayError::InvalidInput(
                "request text is empty after normalization".to_string(),
            ));
        }

        let fields = self
            .fields
            .iter()
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), collapse_whitespace(v)))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .collect();

        Ok(Self {
            text,
            fields,
            params: self.params.normalized(),
        })
    }
}

/// Trim and collapse every whitespace run to a single space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        let input = RequestInput::new("  Led   a\n\tteam  ").field(" Experience_Type ", " hobby ");
        let normalized = input.normalize().unwrap();
        assert_eq!(normalized.text, "Led a team");
        assert_eq!(normalized.fields.get("experience_type").unwrap(), "hobby");
    }

    #[test]
    fn normalize_keeps_text_case() {
        let normalized = RequestInput::new("Built an API in Rust")
            .normalize()
            .unwrap();
        assert_eq!(normalized.text, "Built an API in Rust");
    }

    #[test]
    fn normalize_folds_model_and_rounds_temperature() {
        let input = RequestInput::new("x").params(
            GenerationParams::default()
                .model(" GPT-4o-Mini ")
                .temperature(0.70001),
        );
        let normalized = input.normalize().unwrap();
        assert_eq!(normalized.params.model, "gpt-4o-mini");
        assert_eq!(normalized.params.temperature, 0.7);
    }

    #[test]
    fn normalize_rejects_blank_text() {
        let err = RequestInput::new(" \n\t ").normalize().unwrap_err();
        assert!(matches!(err, GatewayError::InvalidInput(_)));
    }

    #[test]
    fn normalize_drops_empty_fields() {
        let normalized = RequestInput::new("x")
            .field("answer_1", "   ")
            .normalize()
            .unwrap();
        assert!(normalized.fields.is_empty());
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = RequestInput::new(" a  b ")
            .field("K", " v  w ")
            .normalize()
            .unwrap();
        let twice = once.normalize().unwrap();
        assert_eq!(once, twice);
    }
}
