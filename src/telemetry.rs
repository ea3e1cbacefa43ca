//! Telemetry metric name constants.
//!
//! Centralised metric names for gateway operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `quill_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `operation`: operation kind (e.g. "generate_draft", "finalize")
//! - `provider`: provider name (e.g. "openai")
//! - `status`: "ok" or "error"

/// Total leader calls that reached the provider.
///
/// Labels: `operation`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "quill_requests_total";

/// Leader call duration in seconds, retries and enforcement included.
///
/// Labels: `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "quill_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `provider`, `operation`.
pub const RETRIES_TOTAL: &str = "quill_retries_total";

/// Total cache hits.
///
/// Labels: `operation`.
pub const CACHE_HITS_TOTAL: &str = "quill_cache_hits_total";

/// Total cache misses.
///
/// Labels: `operation`.
pub const CACHE_MISSES_TOTAL: &str = "quill_cache_misses_total";

/// Callers that joined an in-flight call instead of starting one.
pub const COALESCED_TOTAL: &str = "quill_coalesced_total";

/// Responses that needed extraction or repair before matching their schema.
///
/// Labels: `operation`, `truncated` ("true" | "false").
pub const SCHEMA_REPAIRS_TOTAL: &str = "quill_schema_repairs_total";

/// Outcome sink write failures.
///
/// Labels: `sink`.
pub const SINK_FAILURES_TOTAL: &str = "quill_sink_failures_total";
