//! JSON Lines outcome sink on the local filesystem.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::OutcomeSink;
use crate::types::CallOutcome;
use crate::{GatewayError, Result};

/// Appends one JSON object per line to a local file.
///
/// The file and its parent directories are created on first write. Writes
/// from concurrent leaders are serialized so lines never interleave.
#[derive(Debug)]
pub struct JsonFileSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn err(&self, message: impl ToString) -> GatewayError {
        GatewayError::Sink {
            sink: self.name().to_string(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl OutcomeSink for JsonFileSink {
    fn name(&self) -> &str {
        "json_file"
    }

    async fn record(&self, outcome: &CallOutcome) -> Result<()> {
        let mut line = serde_json::to_vec(outcome)?;
        line.push(b'\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.err(format!("{}: {e}", parent.display())))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.err(format!("{}: {e}", self.path.display())))?;
        file.write_all(&line).await.map_err(|e| self.err(e))?;
        file.flush().await.map_err(|e| self.err(e))?;
        Ok(())
    }
}
