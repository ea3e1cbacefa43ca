//! Builder for configuring gateway instances

use std::collections::HashMap;
use std::sync::Arc;

use super::client::{AiGateway, Inner};
use super::coalesce::RequestCoalescer;
use crate::cache::{CacheConfig, ResponseCache};
use crate::providers::{RetryConfig, TextProvider};
use crate::schema::ResponseSchema;
use crate::sink::{FallbackChain, OutcomeSink, TracingSink};
use crate::types::{GenerationParams, OperationKind};
use crate::{GatewayError, Result};

/// Builder for [`AiGateway`].
///
/// A provider is required: either [`provider`](Self::provider) or, with the
/// `openai` feature, [`openai`](Self::openai). Sinks added with
/// [`sink`](Self::sink) form a fallback chain in the order added; with none
/// added, outcomes go to `tracing`.
pub struct GatewayBuilder {
    provider: Option<Arc<dyn TextProvider>>,
    #[cfg(feature = "openai")]
    openai_key: Option<String>,
    #[cfg(feature = "openai")]
    openai_base_url: Option<String>,
    cache: CacheConfig,
    retry: RetryConfig,
    sinks: FallbackChain,
    schemas: HashMap<OperationKind, ResponseSchema>,
    default_params: GenerationParams,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            #[cfg(feature = "openai")]
            openai_key: None,
            #[cfg(feature = "openai")]
            openai_base_url: None,
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            sinks: FallbackChain::new(),
            schemas: HashMap::new(),
            default_params: GenerationParams::default(),
        }
    }

    /// Use a custom provider. Takes precedence over [`openai`](Self::openai).
    pub fn provider(mut self, provider: Arc<dyn TextProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Configure the OpenAI-compatible chat-completions provider.
    #[cfg(feature = "openai")]
    pub fn openai(mut self, api_key: impl Into<String>) -> Self {
        self.openai_key = Some(api_key.into());
        self
    }

    /// Point the OpenAI-compatible provider at a different endpoint.
    #[cfg(feature = "openai")]
    pub fn openai_base_url(mut self, url: impl Into<String>) -> Self {
        self.openai_base_url = Some(url.into());
        self
    }

    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache = config;
        self
    }

    pub fn retry(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    /// Append an outcome sink (lowest priority so far).
    pub fn sink(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Override the built-in schema for `kind`.
    pub fn schema(mut self, kind: OperationKind, schema: ResponseSchema) -> Self {
        self.schemas.insert(kind, schema);
        self
    }

    /// Generation parameters used by [`AiGateway::input`].
    pub fn default_params(mut self, params: GenerationParams) -> Self {
        self.default_params = params;
        self
    }

    fn resolve_provider(&mut self) -> Result<Arc<dyn TextProvider>> {
        if let Some(provider) = self.provider.take() {
            return Ok(provider);
        }
        #[cfg(feature = "openai")]
        if let Some(key) = self.openai_key.take() {
            use crate::providers::OpenAiClient;
            let client = match self.openai_base_url.take() {
                Some(url) => OpenAiClient::with_base_url(key, url)?,
                None => OpenAiClient::new(key)?,
            };
            return Ok(Arc::new(client));
        }
        Err(GatewayError::NoProvider)
    }

    /// Build the gateway.
    pub fn build(mut self) -> Result<AiGateway> {
        let provider = self.resolve_provider()?;

        if self.cache.ttl.is_zero() {
            return Err(GatewayError::Configuration(
                "cache ttl must be greater than zero".to_string(),
            ));
        }

        let sink: Arc<dyn OutcomeSink> = if self.sinks.is_empty() {
            Arc::new(TracingSink)
        } else {
            Arc::new(self.sinks)
        };

        Ok(AiGateway::from_inner(Inner {
            provider,
            cache: ResponseCache::new(&self.cache),
            coalescer: RequestCoalescer::new(),
            retry: self.retry,
            sink,
            schemas: self.schemas,
            default_params: self.default_params,
        }))
    }
}
