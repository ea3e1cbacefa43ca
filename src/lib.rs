//! Quill - cached, coalesced, schema-enforcing AI gateway client
//!
//! This crate turns an unreliable, rate-limited text-generation endpoint
//! into a dependable internal operation for resume drafting: every request
//! is fingerprinted, served from a TTL cache when possible, coalesced with
//! identical in-flight requests, retried with bounded exponential backoff,
//! and repaired into the exact shape the caller asked for.
//!
//! # Example
//!
//! ```rust,no_run
//! use quill::{AiGateway, CacheConfig, OperationKind, RetryConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> quill::Result<()> {
//!     let gateway = AiGateway::builder()
//!         .openai("sk-your-key")
//!         .cache(CacheConfig::new().ttl(Duration::from_secs(600)))
//!         .retry(RetryConfig::new().max_attempts(3))
//!         .build()?;
//!
//!     let input = gateway
//!         .input("Organized a neighborhood cleanup with 30 volunteers")
//!         .field("experience_type", "volunteer");
//!     let draft = gateway
//!         .request_default(OperationKind::GenerateDraft, &input)
//!         .await?;
//!
//!     println!("{}", draft.value["title"]);
//!     for bullet in draft.items(Some("bullet_points")) {
//!         println!("- {bullet}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Custom providers
//!
//! Anything implementing [`TextProvider`] can sit behind the gateway;
//! the gateway owns retries, timeouts, caching and schema enforcement.

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod schema;
pub mod sink;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use cache::{CacheConfig, EntryCounts, Fingerprint, ResponseCache};
pub use config::{Config, Secrets};
pub use error::{ErrorClass, GatewayError, Result};
pub use gateway::{AiGateway, CacheStats, GatewayBuilder, RequestCoalescer};
#[cfg(feature = "openai")]
pub use providers::OpenAiClient;
pub use providers::{ProviderRequest, RetryConfig, RetryingProvider, TextProvider, call_with_retry};
pub use schema::{FieldSchema, FieldShape, ListSchema, ResponseSchema, enforce};
pub use sink::{FallbackChain, JsonFileSink, MemorySink, OutcomeSink, TracingSink, WebhookSink};
pub use types::{
    CallOutcome, Enforced, GatewayResponse, GenerationParams, OperationKind, RequestInput, Source,
};
