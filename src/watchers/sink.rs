use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use super::WorkItem;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Append-only destination for work items
///
/// Retries are the sink's own business; the pipeline publishes once.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkSink: Send + Sync {
    async fn publish(&self, item: &WorkItem) -> Result<(), SinkError>;
}

/// Keeps published items in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    items: Mutex<Vec<WorkItem>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn items(&self) -> Vec<WorkItem> {
        self.items.lock().await.clone()
    }

    pub async fn drain(&self) -> Vec<WorkItem> {
        std::mem::take(&mut *self.items.lock().await)
    }
}

#[async_trait]
impl WorkSink for MemorySink {
    async fn publish(&self, item: &WorkItem) -> Result<(), SinkError> {
        self.items.lock().await.push(item.clone());
        Ok(())
    }
}

/// One JSON object per line, appended to a file
pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesSink {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        debug!(path = %path.display(), "Opened work item log");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl WorkSink for JsonLinesSink {
    async fn publish(&self, item: &WorkItem) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(item)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_sink_collects_and_drains() {
        let sink = MemorySink::new();
        sink.publish(&WorkItem::NoAction).await.unwrap();
        assert_eq!(sink.items().await.len(), 1);
        assert_eq!(sink.drain().await, vec![WorkItem::NoAction]);
        assert!(sink.items().await.is_empty());
    }

    #[tokio::test]
    async fn test_json_lines_sink_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("work.jsonl");

        let sink = JsonLinesSink::open(&path).await.unwrap();
        sink.publish(&WorkItem::NoAction).await.unwrap();
        drop(sink);

        let sink = JsonLinesSink::open(&path).await.unwrap();
        sink.publish(&WorkItem::NoAction).await.unwrap();

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let item: WorkItem = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(item, WorkItem::NoAction);
    }
}
