//! Provider trait consumed by the gateway.
//!
//! The gateway treats the model endpoint as a single opaque capability:
//! one call to [`TextProvider::attempt`] is one attempt, returning the raw
//! model text or a classified [`GatewayError`](crate::GatewayError).
//! Retries, timeouts, coalescing and schema enforcement all live outside
//! the provider.

use async_trait::async_trait;

use crate::Result;
use crate::schema::ResponseSchema;
use crate::types::{OperationKind, RequestInput};

/// Everything a provider needs to make one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub operation: OperationKind,
    /// Already normalized.
    pub input: RequestInput,
    /// Shape the gateway will enforce; providers may describe it in the prompt.
    pub schema: ResponseSchema,
}

/// Single-attempt text generation.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Provider name for logging, metrics and outcome records.
    fn name(&self) -> &str;

    /// Make exactly one call to the model and return its raw text.
    async fn attempt(&self, request: &ProviderRequest) -> Result<String>;
}
