use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{CoordError, Result};

/// Key-addressed JSON document store. Categories are relative directory
/// paths under the root ("queues/coder/inbox", "patterns"); records are one
/// pretty-printed JSON file per id.
#[derive(Debug, Clone)]
pub struct RecordStore {
    root: PathBuf,
}

impl RecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root and sweep any temp files left behind by an
    /// interrupted write.
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        self.recover_interrupted_writes(&self.root).await;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_path(&self, category: &str, id: &str) -> PathBuf {
        self.root.join(category).join(format!("{}.json", id))
    }

    pub async fn put<T: Serialize>(&self, category: &str, id: &str, record: &T) -> Result<()> {
        let path = self.record_path(category, id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(record)?;
        self.write_atomic(&path, &content).await
    }

    async fn write_atomic(&self, path: &Path, content: &str) -> Result<()> {
        let tmp_path = path.with_extension("json.tmp");

        fs::write(&tmp_path, content).await?;

        // Sync before rename so the rename never exposes a torn file.
        let tmp_clone = tmp_path.clone();
        let sync_result = tokio::task::spawn_blocking(move || {
            std::fs::File::open(&tmp_clone).and_then(|file| file.sync_all())
        })
        .await;
        match sync_result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to sync temp file to disk"),
            Err(e) => warn!(error = %e, "Sync task failed"),
        }

        fs::rename(&tmp_path, path).await?;
        debug!(path = %path.display(), "Record written");
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&self, category: &str, id: &str) -> Result<T> {
        self.try_get(category, id)
            .await?
            .ok_or_else(|| CoordError::NotFound(format!("{}/{}", category, id)))
    }

    pub async fn try_get<T: DeserializeOwned>(
        &self,
        category: &str,
        id: &str,
    ) -> Result<Option<T>> {
        let path = self.record_path(category, id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).await?;
        let record = serde_json::from_str(&content)?;
        Ok(Some(record))
    }

    /// List every parseable record in a category. Corrupt or unreadable
    /// files are skipped and logged, never fatal; a missing category
    /// directory is an empty collection.
    pub async fn list<T: DeserializeOwned>(&self, category: &str) -> Result<Vec<T>> {
        let dir = self.root.join(category);
        let mut records = Vec::new();

        if !dir.exists() {
            return Ok(records);
        }

        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match fs::read_to_string(&path).await {
                Ok(content) => match serde_json::from_str::<T>(&content) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping corrupt record");
                    }
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable record");
                }
            }
        }

        Ok(records)
    }

    pub async fn remove(&self, category: &str, id: &str) -> Result<bool> {
        let path = self.record_path(category, id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).await?;
        Ok(true)
    }

    async fn recover_interrupted_writes(&self, dir: &Path) {
        let mut stack = vec![dir.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let Ok(mut entries) = fs::read_dir(&dir).await else {
                continue;
            };
            while let Ok(Some(entry)) = entries.next_entry().await {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.extension().is_some_and(|ext| ext == "tmp") {
                    debug!(path = %path.display(), "Removing interrupted write");
                    let _ = fs::remove_file(&path).await;
                }
            }
        }
    }
}
