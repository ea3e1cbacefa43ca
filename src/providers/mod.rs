//! Provider seam and retry policy.
//!
//! The gateway talks to models only through [`TextProvider`]. The
//! OpenAI-compatible client is one implementation; tests and embedders
//! supply their own.

#[cfg(feature = "openai")]
pub mod openai;
pub mod prompts;
pub mod retry;
pub mod traits;

#[cfg(feature = "openai")]
pub use openai::OpenAiClient;
pub use retry::{RetryConfig, RetryOutcome, RetryingProvider, call_with_retry};
pub use traits::{ProviderRequest, TextProvider};
