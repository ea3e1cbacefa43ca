//! Outcome sink that posts records to an HTTP endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::OutcomeSink;
use crate::types::CallOutcome;
use crate::{GatewayError, Result};

/// POSTs each record as JSON to an HTTP endpoint (spreadsheet bridges,
/// log collectors). Any non-2xx response is a failure.
#[derive(Clone)]
pub struct WebhookSink {
    url: String,
    http: Client,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| GatewayError::Configuration(format!("HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl OutcomeSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn record(&self, outcome: &CallOutcome) -> Result<()> {
        let response = self
            .http
            .post(&self.url)
            .json(outcome)
            .send()
            .await
            .map_err(|e| GatewayError::Sink {
                sink: self.name().to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(GatewayError::Sink {
                sink: self.name().to_string(),
                message: format!("HTTP {status}"),
            })
        }
    }
}
