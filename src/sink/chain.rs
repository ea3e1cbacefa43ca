//! Priority-ordered fallback across outcome sinks.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::OutcomeSink;
use crate::types::CallOutcome;
use crate::{GatewayError, Result, telemetry};

/// Ordered sinks with fallback semantics.
///
/// Sinks are tried strictly in order (index 0 first). The first success
/// ends the walk; each failure is logged and counted, then the next sink
/// is tried. An empty chain accepts every record.
#[derive(Default, Clone)]
pub struct FallbackChain {
    sinks: Vec<Arc<dyn OutcomeSink>>,
}

impl FallbackChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sink at the lowest priority.
    pub fn push(&mut self, sink: Arc<dyn OutcomeSink>) {
        self.sinks.push(sink);
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Names of the sinks, in priority order.
    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl OutcomeSink for FallbackChain {
    fn name(&self) -> &str {
        "chain"
    }

    async fn record(&self, outcome: &CallOutcome) -> Result<()> {
        if self.sinks.is_empty() {
            return Ok(());
        }
        for sink in &self.sinks {
            match sink.record(outcome).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    metrics::counter!(telemetry::SINK_FAILURES_TOTAL,
                        "sink" => sink.name().to_owned(),
                    )
                    .increment(1);
                    warn!(sink = sink.name(), error = %e, "outcome sink failed, trying next");
                }
            }
        }
        Err(GatewayError::Sink {
            sink: self.name().to_string(),
            message: format!("all {} sinks failed", self.sinks.len()),
        })
    }
}
