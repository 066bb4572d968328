// src/ingest/snapshot.rs
use anyhow::Result;
use std::path::PathBuf;

/// Receives one source's latest successful scrape, serialized as JSON.
#[async_trait::async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn store(&self, source: &str, payload: String) -> Result<()>;
}

/// Writes `{dir}/{source}.json`, replacing the previous cycle's snapshot.
pub struct DirSnapshotSink {
    dir: PathBuf,
}

impl DirSnapshotSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait::async_trait]
impl SnapshotSink for DirSnapshotSink {
    async fn store(&self, source: &str, payload: String) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{source}.json"));
        tokio::fs::write(&path, payload).await?;
        Ok(())
    }
}

// --- Test helper ---
pub struct MemorySink {
    pub calls: std::sync::Mutex<Vec<(String, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            calls: std::sync::Mutex::new(vec![]),
        }
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SnapshotSink for MemorySink {
    async fn store(&self, source: &str, payload: String) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push((source.to_string(), payload));
        Ok(())
    }
}
