//! Call outcome records handed to outcome sinks

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::OperationKind;
use crate::cache::Fingerprint;
use crate::error::{ErrorClass, GatewayError};

/// One record per leader invocation (never per follower, never on cache hit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallOutcome {
    pub operation: OperationKind,
    pub fingerprint: Fingerprint,
    pub provider: String,
    /// Provider attempts made, 0 when the call failed before reaching it.
    pub attempts: u32,
    #[serde(rename = "elapsed_ms", with = "duration_ms")]
    pub elapsed: Duration,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_class: Option<ErrorClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether schema repair truncated user-visible text.
    #[serde(default)]
    pub was_truncated: bool,
    pub recorded_at: DateTime<Utc>,
}

impl CallOutcome {
    pub fn success(
        operation: OperationKind,
        fingerprint: Fingerprint,
        provider: impl Into<String>,
        attempts: u32,
        elapsed: Duration,
        was_truncated: bool,
    ) -> Self {
        Self {
            operation,
            fingerprint,
            provider: provider.into(),
            attempts,
            elapsed,
            success: true,
            error_class: None,
            error: None,
            was_truncated,
            recorded_at: Utc::now(),
        }
    }

    pub fn failure(
        operation: OperationKind,
        fingerprint: Fingerprint,
        provider: impl Into<String>,
        attempts: u32,
        elapsed: Duration,
        error: &GatewayError,
    ) -> Self {
        Self {
            operation,
            fingerprint,
            provider: provider.into(),
            attempts,
            elapsed,
            success: false,
            error_class: Some(error.class()),
            error: Some(error.to_string()),
            was_truncated: false,
            recorded_at: Utc::now(),
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ResponseSchema;
    use crate::types::RequestInput;

    fn fingerprint() -> Fingerprint {
        let schema = ResponseSchema::list(1, 3, 50);
        Fingerprint::compute(OperationKind::Improve, &RequestInput::new("x"), &schema)
    }

    #[test]
    fn failure_carries_classification() {
        let outcome = CallOutcome::failure(
            OperationKind::Improve,
            fingerprint(),
            "mock",
            3,
            Duration::from_millis(1500),
            &GatewayError::Timeout(Duration::from_secs(30)),
        );
        assert!(!outcome.success);
        assert_eq!(outcome.error_class, Some(ErrorClass::Transient));
    }

    #[test]
    fn serializes_elapsed_as_millis() {
        let outcome = CallOutcome::success(
            OperationKind::Improve,
            fingerprint(),
            "mock",
            1,
            Duration::from_millis(1234),
            false,
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["elapsed_ms"], 1234);
        assert_eq!(json["operation"], "improve");
        assert!(json.get("error_class").is_none());
    }
}
