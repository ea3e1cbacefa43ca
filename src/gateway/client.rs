//! The gateway itself: cache, coalescer, retry and schema enforcement
//! composed into one request path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::builder::GatewayBuilder;
use super::coalesce::RequestCoalescer;
use crate::cache::{Fingerprint, ResponseCache};
use crate::providers::{ProviderRequest, RetryConfig, TextProvider, call_with_retry};
use crate::schema::{ResponseSchema, defaults, enforce};
use crate::sink::OutcomeSink;
use crate::types::{
    CallOutcome, Enforced, GatewayResponse, GenerationParams, OperationKind, RequestInput, Source,
};
use crate::{Result, telemetry};

/// Point-in-time view of the response cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Stored entries, `valid + expired`.
    pub entries: u64,
    /// Entries a request would be served from right now.
    pub valid: u64,
    /// Entries past their expiry that have not been reclaimed yet.
    pub expired: u64,
    pub ttl: Duration,
    /// Fingerprints with a provider call currently running.
    pub in_flight: usize,
}

pub(super) struct Inner {
    pub(super) provider: Arc<dyn TextProvider>,
    pub(super) cache: ResponseCache,
    pub(super) coalescer: RequestCoalescer<Enforced>,
    pub(super) retry: RetryConfig,
    pub(super) sink: Arc<dyn OutcomeSink>,
    pub(super) schemas: HashMap<OperationKind, ResponseSchema>,
    pub(super) default_params: GenerationParams,
}

/// Cached, coalesced, retrying and schema-enforcing front for a text
/// provider.
///
/// Cheap to clone; clones share the cache and the in-flight registry.
///
/// ```rust,no_run
/// use quill::{AiGateway, OperationKind};
///
/// # async fn run() -> quill::Result<()> {
/// let gateway = AiGateway::builder().openai("sk-your-key").build()?;
///
/// let input = gateway.input("Volunteered at the food bank every weekend");
/// let response = gateway
///     .request_default(OperationKind::GenerateDraft, &input)
///     .await?;
///
/// for bullet in response.items(Some("bullet_points")) {
///     println!("- {bullet}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AiGateway {
    inner: Arc<Inner>,
}

impl AiGateway {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    pub(super) fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Request input carrying the gateway's default generation parameters.
    pub fn input(&self, text: impl Into<String>) -> RequestInput {
        RequestInput::new(text).params(self.inner.default_params.clone())
    }

    /// Configured schema for `kind`, independent of any input.
    ///
    /// This is the override when one was set, otherwise the built-in
    /// default with its widest bullet range.
    pub fn schema_for(&self, kind: OperationKind) -> ResponseSchema {
        self.inner
            .schemas
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| defaults::for_operation(kind))
    }

    /// Schema used by [`request_default`](Self::request_default).
    ///
    /// An override applies as configured. Otherwise the built-in default
    /// is sized to the input: detailed experiences ask for more bullets.
    /// Pass normalized input so whitespace noise cannot change the size.
    pub fn schema_for_input(&self, kind: OperationKind, input: &RequestInput) -> ResponseSchema {
        self.inner
            .schemas
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| defaults::for_input(kind, input))
    }

    /// Run `kind` against `input`, returning a value that satisfies `schema`.
    ///
    /// Order of work: normalize and fingerprint the input; serve a fresh
    /// cache entry if there is one; otherwise join or lead the single
    /// in-flight call for the fingerprint. The leader runs the retry
    /// executor, enforces the schema, stores the result in the cache,
    /// then records one call outcome.
    ///
    /// Cache hits record no outcome. Failures are not cached.
    #[instrument(skip(self, input, schema), fields(operation = %kind))]
    pub async fn request(
        &self,
        kind: OperationKind,
        input: &RequestInput,
        schema: &ResponseSchema,
    ) -> Result<GatewayResponse> {
        let input = input.normalize()?;
        let fingerprint = Fingerprint::compute(kind, &input, schema);

        if let Some(hit) = self.inner.cache.get(&fingerprint).await {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "operation" => kind.as_str())
                .increment(1);
            debug!(fingerprint = fingerprint.short(), "cache hit");
            return Ok(GatewayResponse::new(hit, Source::Cache, fingerprint));
        }
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "operation" => kind.as_str())
            .increment(1);

        let request = ProviderRequest {
            operation: kind,
            input,
            schema: schema.clone(),
        };
        let producer = Box::pin(lead(Arc::clone(&self.inner), fingerprint.clone(), request));
        let (result, _role) = self.inner.coalescer.run_once(&fingerprint, producer).await;

        result.map(|enforced| GatewayResponse::new(enforced, Source::Fresh, fingerprint))
    }

    /// [`request`](Self::request) with the configured schema for `kind`.
    pub async fn request_default(
        &self,
        kind: OperationKind,
        input: &RequestInput,
    ) -> Result<GatewayResponse> {
        let schema = self.schema_for_input(kind, &input.normalize()?);
        self.request(kind, input, &schema).await
    }

    pub fn cache_stats(&self) -> CacheStats {
        let counts = self.inner.cache.counts();
        CacheStats {
            entries: counts.valid + counts.expired,
            valid: counts.valid,
            expired: counts.expired,
            ttl: self.inner.cache.ttl(),
            in_flight: self.inner.coalescer.in_flight(),
        }
    }

    /// Drop every cached response. In-flight calls are unaffected.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    pub fn provider_name(&self) -> &str {
        self.inner.provider.name()
    }
}

/// Leader work: retry, enforce, cache, record.
///
/// Runs on its own task (see [`RequestCoalescer`]), so it owns everything
/// it touches. The cache is checked again first: a previous leader may
/// have stored the value and deregistered between this caller's cache
/// miss and its registration. Such a hit records no outcome.
async fn lead(
    inner: Arc<Inner>,
    fingerprint: Fingerprint,
    request: ProviderRequest,
) -> Result<Enforced> {
    if let Some(hit) = inner.cache.get(&fingerprint).await {
        debug!(fingerprint = fingerprint.short(), "late cache hit");
        return Ok(hit);
    }

    let start = Instant::now();
    let kind = request.operation;
    let provider = Arc::clone(&inner.provider);

    let retried = call_with_retry(&inner.retry, provider.name(), kind.as_str(), || {
        provider.attempt(&request)
    })
    .await;
    let attempts = retried.attempts;
    let result = retried
        .result
        .and_then(|raw| enforce(&raw, &request.schema));

    let outcome = match &result {
        Ok(enforced) => {
            if enforced.repaired {
                metrics::counter!(telemetry::SCHEMA_REPAIRS_TOTAL,
                    "operation" => kind.as_str(),
                    "truncated" => if enforced.was_truncated { "true" } else { "false" },
                )
                .increment(1);
                debug!(
                    dropped = enforced.dropped_items,
                    truncated = enforced.was_truncated,
                    "response repaired to fit schema"
                );
            }
            inner.cache.put(fingerprint.clone(), enforced.clone()).await;
            CallOutcome::success(
                kind,
                fingerprint,
                provider.name(),
                attempts,
                start.elapsed(),
                enforced.was_truncated,
            )
        }
        Err(e) => {
            warn!(attempts, class = %e.class(), error = %e, "gateway call failed");
            CallOutcome::failure(
                kind,
                fingerprint,
                provider.name(),
                attempts,
                start.elapsed(),
                e,
            )
        }
    };

    record_request(kind, &outcome);
    if let Err(e) = inner.sink.record(&outcome).await {
        warn!(sink = inner.sink.name(), error = %e, "call outcome was not recorded");
    }

    result
}

fn record_request(kind: OperationKind, outcome: &CallOutcome) {
    let status = if outcome.success { "ok" } else { "error" };
    metrics::counter!(telemetry::REQUESTS_TOTAL,
        "operation" => kind.as_str(),
        "status" => status,
    )
    .increment(1);
    metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
        "operation" => kind.as_str(),
    )
    .record(outcome.elapsed.as_secs_f64());
}
