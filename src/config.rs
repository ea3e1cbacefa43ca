//! Configuration loading.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag) or an explicit path from the embedder
//! 2. `~/.quill/config.toml` (user)
//! 3. `/etc/quill/config.toml` (system)
//!
//! Secrets are loaded separately with mandatory permission checks:
//! 1. `~/.quill/secrets.toml` (user, must be 0600)
//! 2. `/etc/quill/secrets.toml` (system, must be 0600)
//!
//! Every section is optional; a missing key takes its default.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::gateway::GatewayBuilder;
use crate::providers::RetryConfig;
use crate::schema::ResponseSchema;
use crate::sink::{JsonFileSink, TracingSink, WebhookSink};
use crate::types::{
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, GenerationParams, OperationKind,
};
use crate::{GatewayError, Result};

/// Gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub provider: ProviderSection,
    #[serde(default)]
    pub sinks: SinksSection,
    /// Schema overrides keyed by operation (`generate_draft`, `improve`, ...).
    #[serde(default)]
    pub schemas: BTreeMap<String, ResponseSchema>,
}

/// Response cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    /// Entry lifetime in seconds (default: 600).
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Capacity bound (default: 10000).
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    600
}

fn default_max_entries() -> u64 {
    10_000
}

/// Retry executor settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
            attempt_timeout_secs: default_attempt_timeout_secs(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_jitter_ms() -> u64 {
    100
}

fn default_attempt_timeout_secs() -> u64 {
    30
}

/// Provider endpoint and default generation parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSection {
    /// OpenAI-compatible endpoint (default: the public OpenAI API).
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            base_url: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

/// Outcome sinks. Tried in order: webhook, JSON file, then `tracing`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SinksSection {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub json_file: Option<PathBuf>,
}

impl CacheSection {
    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig::new()
            .max_entries(self.max_entries)
            .ttl(Duration::from_secs(self.ttl_secs))
    }
}

impl RetrySection {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .max_attempts(self.max_attempts)
            .initial_delay(Duration::from_millis(self.base_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .jitter(Duration::from_millis(self.jitter_ms))
            .attempt_timeout(Duration::from_secs(self.attempt_timeout_secs))
    }
}

impl ProviderSection {
    pub fn params(&self) -> GenerationParams {
        GenerationParams::default()
            .model(self.model.clone())
            .max_tokens(self.max_tokens)
            .temperature(self.temperature)
    }
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.quill/config.toml`
    /// 3. `/etc/quill/config.toml`
    ///
    /// With no explicit path and no file found, returns the defaults.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Config::default()),
        }
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            GatewayError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            GatewayError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(GatewayError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".quill").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/quill/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Check values serde cannot: ranges, schema bounds, operation names.
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl_secs == 0 {
            return Err(GatewayError::Configuration(
                "cache.ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(GatewayError::Configuration(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.attempt_timeout_secs == 0 {
            return Err(GatewayError::Configuration(
                "retry.attempt_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(GatewayError::Configuration(format!(
                "provider.temperature {} is outside 0.0..=2.0",
                self.provider.temperature
            )));
        }
        self.schema_overrides().map(|_| ())
    }

    /// Schema overrides with their operation names resolved.
    pub fn schema_overrides(&self) -> Result<Vec<(OperationKind, ResponseSchema)>> {
        self.schemas
            .iter()
            .map(|(name, schema)| {
                let kind: OperationKind = name.parse().map_err(|_| {
                    GatewayError::Configuration(format!("schemas.{name}: unknown operation"))
                })?;
                check_schema_bounds(name, schema)?;
                Ok((kind, schema.clone()))
            })
            .collect()
    }

    /// Gateway builder carrying every setting in this config.
    ///
    /// The API key comes from `secrets` (file, then `OPENAI_API_KEY`).
    /// Without one the builder has no provider and `build()` reports
    /// [`GatewayError::NoProvider`].
    pub fn gateway_builder(&self, secrets: &Secrets) -> Result<GatewayBuilder> {
        let mut builder = GatewayBuilder::new()
            .cache(self.cache.to_cache_config())
            .retry(self.retry.to_retry_config())
            .default_params(self.provider.params());

        for (kind, schema) in self.schema_overrides()? {
            builder = builder.schema(kind, schema);
        }

        if let Some(url) = &self.sinks.webhook_url {
            builder = builder.sink(Arc::new(WebhookSink::new(url.clone())?));
        }
        if let Some(path) = &self.sinks.json_file {
            builder = builder.sink(Arc::new(JsonFileSink::new(path.clone())));
        }
        builder = builder.sink(Arc::new(TracingSink));

        #[cfg(feature = "openai")]
        if let Some(key) = secrets.api_key("openai") {
            builder = builder.openai(key);
            if let Some(url) = &self.provider.base_url {
                builder = builder.openai_base_url(url.clone());
            }
        }
        #[cfg(not(feature = "openai"))]
        let _ = secrets;

        Ok(builder)
    }
}

fn check_schema_bounds(name: &str, schema: &ResponseSchema) -> Result<()> {
    use crate::schema::{FieldShape, ListSchema};

    let check = |path: &str, list: &ListSchema| {
        if list.min_items > list.max_items {
            Err(GatewayError::Configuration(format!(
                "schemas.{path}: min_items {} exceeds max_items {}",
                list.min_items, list.max_items
            )))
        } else {
            Ok(())
        }
    };

    match schema {
        ResponseSchema::List(list) => check(name, list),
        ResponseSchema::Object { fields } => {
            for field in fields {
                if let FieldShape::List(list) = &field.shape {
                    check(&format!("{name}.{}", field.name), list)?;
                }
            }
            Ok(())
        }
    }
}

/// Secrets configuration (API keys).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub openai: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

/// Provider name → environment variable name mapping.
const PROVIDER_ENV_VARS: &[(&str, &str)] = &[("openai", "OPENAI_API_KEY")];

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Resolution order:
    /// 1. `~/.quill/secrets.toml` (if exists, must be 0600)
    /// 2. `/etc/quill/secrets.toml` (if exists, must be 0600)
    ///
    /// Returns empty secrets if no file exists (the key may come from the environment).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".quill").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/quill/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load one secrets file, rejecting group- or world-readable files.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            GatewayError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            GatewayError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            GatewayError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(GatewayError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// Get API key for a provider, falling back to the corresponding environment variable.
    pub fn api_key(&self, provider: &str) -> Option<String> {
        let from_file = match provider {
            "openai" => self.openai.as_ref(),
            _ => None,
        }
        .map(|s| s.api_key.clone());

        from_file.or_else(|| {
            PROVIDER_ENV_VARS
                .iter()
                .find(|(name, _)| *name == provider)
                .and_then(|(_, env_var)| std::env::var(env_var).ok())
        })
    }
}
