use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::Result;

/// Append-only newline-delimited JSON logs. Entries are observability
/// records, never re-read for correctness. Every entry gets a `timestamp`
/// field if the caller did not provide one; the retention sweep keys off it.
#[derive(Debug, Clone)]
pub struct LogSink {
    dir: PathBuf,
    retention_days: i64,
}

impl LogSink {
    pub fn new(dir: impl Into<PathBuf>, retention_days: i64) -> Self {
        Self {
            dir: dir.into(),
            retention_days,
        }
    }

    pub fn log_path(&self, log_name: &str) -> PathBuf {
        self.dir.join(log_name)
    }

    pub async fn append<T: Serialize>(&self, log_name: &str, entry: &T) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let mut value = serde_json::to_value(entry)?;
        if let Value::Object(ref mut map) = value {
            map.entry("timestamp")
                .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
        }
        let line = serde_json::to_string(&value)?;

        let path = self.log_path(log_name);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(format!("{}\n", line).as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    /// Drop entries older than the retention window, rewriting the log in
    /// place. Runs as a periodic task, never inline with appends. Lines
    /// without a parseable timestamp are dropped and counted too. Returns
    /// the number of lines removed.
    pub async fn sweep(&self, log_name: &str) -> Result<usize> {
        let path = self.log_path(log_name);
        if !path.exists() {
            return Ok(0);
        }

        let content = fs::read_to_string(&path).await?;
        let cutoff = Utc::now() - Duration::days(self.retention_days);

        let all_lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let original_count = all_lines.len();

        let kept: Vec<&str> = all_lines
            .into_iter()
            .filter(|line| match entry_timestamp(line) {
                Some(ts) => ts >= cutoff,
                None => {
                    warn!(log = log_name, "Dropping log line without timestamp");
                    false
                }
            })
            .collect();

        if kept.len() == original_count {
            return Ok(0);
        }

        let mut rewritten = kept.join("\n");
        if !rewritten.is_empty() {
            rewritten.push('\n');
        }
        write_atomic(&path, &rewritten).await?;

        let removed = original_count - kept.len();
        debug!(log = log_name, removed, "Swept log");
        Ok(removed)
    }
}

fn entry_timestamp(line: &str) -> Option<DateTime<Utc>> {
    let value: Value = serde_json::from_str(line).ok()?;
    let raw = value.get("timestamp")?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

async fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp_path = path.with_extension("log.tmp");
    fs::write(&tmp_path, content).await?;
    fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_adds_timestamp() {
        let dir = TempDir::new().unwrap();
        let sink = LogSink::new(dir.path(), 7);

        sink.append("audit.log", &json!({"action": "sent"}))
            .await
            .unwrap();

        let content = fs::read_to_string(sink.log_path("audit.log")).await.unwrap();
        let entry: Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(entry["action"], "sent");
        assert!(entry["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_sweep_drops_old_entries() {
        let dir = TempDir::new().unwrap();
        let sink = LogSink::new(dir.path(), 7);

        let old = (Utc::now() - Duration::days(30)).to_rfc3339();
        sink.append("audit.log", &json!({"action": "old", "timestamp": old}))
            .await
            .unwrap();
        sink.append("audit.log", &json!({"action": "fresh"}))
            .await
            .unwrap();

        let removed = sink.sweep("audit.log").await.unwrap();
        assert_eq!(removed, 1);

        let content = fs::read_to_string(sink.log_path("audit.log")).await.unwrap();
        assert_eq!(content.lines().count(), 1);
        assert!(content.contains("fresh"));
    }

    #[tokio::test]
    async fn test_sweep_drops_unparseable_lines() {
        let dir = TempDir::new().unwrap();
        let sink = LogSink::new(dir.path(), 7);

        sink.append("audit.log", &json!({"action": "fresh"}))
            .await
            .unwrap();
        let path = sink.log_path("audit.log");
        let mut content = fs::read_to_string(&path).await.unwrap();
        content.push_str("garbage line\n");
        fs::write(&path, content).await.unwrap();

        let removed = sink.sweep("audit.log").await.unwrap();
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn test_sweep_missing_log_is_noop() {
        let dir = TempDir::new().unwrap();
        let sink = LogSink::new(dir.path(), 7);
        assert_eq!(sink.sweep("missing.log").await.unwrap(), 0);
    }
}
