//! Outcome sinks: where call outcome records go.
//!
//! The gateway hands one [`CallOutcome`] per leader invocation to a single
//! [`OutcomeSink`]. Sinks are interchangeable; [`FallbackChain`] tries
//! several in order and stops at the first that accepts the record.
//! A sink failure never fails the request that produced the record.

mod chain;
mod file;
mod webhook;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use crate::Result;
use crate::types::CallOutcome;

pub use chain::FallbackChain;
pub use file::JsonFileSink;
pub use webhook::WebhookSink;

/// Destination for call outcome records.
#[async_trait]
pub trait OutcomeSink: Send + Sync {
    /// Sink name for logs and metrics.
    fn name(&self) -> &str;

    /// Persist or forward one record.
    async fn record(&self, outcome: &CallOutcome) -> Result<()>;
}

/// Writes each record as a structured `tracing` event. Never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl OutcomeSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn record(&self, outcome: &CallOutcome) -> Result<()> {
        info!(
            operation = %outcome.operation,
            fingerprint = outcome.fingerprint.short(),
            provider = %outcome.provider,
            attempts = outcome.attempts,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            success = outcome.success,
            error_class = outcome.error_class.map(|c| c.as_str()),
            was_truncated = outcome.was_truncated,
            "call outcome"
        );
        Ok(())
    }
}

/// Keeps records in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<CallOutcome>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, oldest first.
    pub fn records(&self) -> Vec<CallOutcome> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl OutcomeSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn record(&self, outcome: &CallOutcome) -> Result<()> {
        self.records.lock().push(outcome.clone());
        Ok(())
    }
}
