//! Failure sinks
//!
//! Append-only destinations for items that could not be resolved, kept for
//! later inspection or re-import.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex as AsyncMutex;

/// Append-only failure log
#[async_trait]
pub trait FailureSink: Send + Sync {
    /// Appends one entry
    async fn append(&self, entry: &str) -> Result<()>;

    /// Appends several entries in order
    async fn append_all(&self, entries: &[String]) -> Result<()> {
        for entry in entries {
            self.append(entry).await?;
        }
        Ok(())
    }
}

/// Failure log backed by a text file, one entry per line
///
/// Appends are serialized so concurrent writers never interleave lines.
pub struct FileFailureSink {
    path: PathBuf,
    write_lock: AsyncMutex<()>,
}

impl FileFailureSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: AsyncMutex::new(()),
        }
    }
}

#[async_trait]
impl FailureSink for FileFailureSink {
    async fn append(&self, entry: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open failure log {}", self.path.display()))?;

        // One entry per line; embedded newlines would split an entry
        let line = format!("{}\n", entry.replace(['\r', '\n'], " "));
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("Failed to append to {}", self.path.display()))?;
        file.flush().await?;

        Ok(())
    }
}

/// Failure log kept in memory
#[derive(Default)]
pub struct MemoryFailureSink {
    entries: Mutex<Vec<String>>,
}

impl MemoryFailureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl FailureSink for MemoryFailureSink {
    async fn append(&self, entry: &str) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| anyhow::anyhow!("failure sink lock poisoned"))?
            .push(entry.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_sink_appends_lines() {
        let dir = std::env::temp_dir().join(format!("trawl-sink-{}", uuid::Uuid::new_v4()));
        let path = dir.join("notFoundLog.txt");
        let sink = FileFailureSink::new(path.clone());

        sink.append("first tweet").await.unwrap();
        sink.append_all(&["second\nline".to_string(), "third".to_string()])
            .await
            .unwrap();

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        tokio::fs::remove_dir_all(&dir).await.unwrap();

        assert_eq!(written, "first tweet\nsecond line\nthird\n");
    }

    #[tokio::test]
    async fn test_memory_sink_keeps_order() {
        let sink = MemoryFailureSink::new();
        sink.append("a").await.unwrap();
        sink.append("b").await.unwrap();
        assert_eq!(sink.entries(), vec!["a", "b"]);
    }
}
