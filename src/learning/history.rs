//! Bounded learning-event history backed by an append-only JSONL file.
//!
//! Hooks run process-per-invocation, so the in-memory ring is rebuilt from
//! the file tail on first use; the ring capacity bounds both what is loaded
//! and what `compact` keeps on disk.

use std::collections::VecDeque;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::Result;

/// Count-only record of one learning pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningEvent {
    pub timestamp: DateTime<Utc>,
    pub interaction_id: String,
    pub agent: String,
    pub patterns_found: usize,
    pub insights_generated: usize,
    pub rules_created: usize,
}

pub struct LearningHistory {
    path: PathBuf,
    capacity: usize,
    events: VecDeque<LearningEvent>,
    loaded: bool,
}

impl LearningHistory {
    pub fn new(path: PathBuf, capacity: usize) -> Self {
        Self {
            path,
            capacity,
            events: VecDeque::new(),
            loaded: false,
        }
    }

    /// The ring, loading the file tail on first access. Invalid lines are
    /// skipped with a warning.
    pub async fn events(&mut self) -> Result<&VecDeque<LearningEvent>> {
        self.ensure_loaded().await?;
        Ok(&self.events)
    }

    pub async fn append(&mut self, event: LearningEvent) -> Result<()> {
        self.ensure_loaded().await?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let line = serde_json::to_string(&event)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{}\n", line).as_bytes()).await?;
        file.flush().await?;

        self.events.push_back(event);
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }

        Ok(())
    }

    /// Rewrite the file keeping only the ring's worth of newest events.
    /// Returns the number of lines dropped.
    pub async fn compact(&mut self) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }

        let content = fs::read_to_string(&self.path).await?;
        let total = content.lines().filter(|l| !l.trim().is_empty()).count();

        self.loaded = false;
        self.ensure_loaded().await?;
        if total <= self.events.len() {
            return Ok(0);
        }

        let mut rewritten = String::new();
        for event in &self.events {
            rewritten.push_str(&serde_json::to_string(event)?);
            rewritten.push('\n');
        }
        let tmp = self.path.with_extension("jsonl.tmp");
        fs::write(&tmp, rewritten).await?;
        fs::rename(&tmp, &self.path).await?;

        let removed = total - self.events.len();
        debug!(removed, "Compacted learning history");
        Ok(removed)
    }

    async fn ensure_loaded(&mut self) -> Result<()> {
        if self.loaded {
            return Ok(());
        }
        self.events.clear();

        if self.path.exists() {
            let content = fs::read_to_string(&self.path).await?;
            for line in content.lines().filter(|l| !l.trim().is_empty()) {
                match serde_json::from_str::<LearningEvent>(line) {
                    Ok(event) => {
                        self.events.push_back(event);
                        if self.events.len() > self.capacity {
                            self.events.pop_front();
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Skipping invalid learning event line");
                    }
                }
            }
        }

        self.loaded = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn event(agent: &str, patterns: usize) -> LearningEvent {
        LearningEvent {
            timestamp: Utc::now(),
            interaction_id: String::new(),
            agent: agent.into(),
            patterns_found: patterns,
            insights_generated: 0,
            rules_created: 0,
        }
    }

    #[tokio::test]
    async fn test_append_and_reload_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("learning_events.jsonl");

        let mut history = LearningHistory::new(path.clone(), 100);
        history.append(event("coder", 2)).await.unwrap();
        history.append(event("reviewer", 1)).await.unwrap();

        // A fresh instance sees the persisted tail.
        let mut fresh = LearningHistory::new(path, 100);
        let events = fresh.events().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].agent, "coder");
    }

    #[tokio::test]
    async fn test_ring_is_bounded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("learning_events.jsonl");

        let mut history = LearningHistory::new(path, 3);
        for i in 0..5 {
            history.append(event("coder", i)).await.unwrap();
        }

        let events = history.events().await.unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].patterns_found, 2);
    }

    #[tokio::test]
    async fn test_compact_trims_file_to_capacity() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("learning_events.jsonl");

        let mut history = LearningHistory::new(path.clone(), 2);
        for i in 0..5 {
            history.append(event("coder", i)).await.unwrap();
        }

        let removed = history.compact().await.unwrap();
        assert_eq!(removed, 3);

        let content = fs::read_to_string(&path).await.unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_invalid_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("learning_events.jsonl");
        fs::write(&path, "not json\n").await.unwrap();

        let mut history = LearningHistory::new(path, 10);
        history.append(event("coder", 1)).await.unwrap();
        assert_eq!(history.events().await.unwrap().len(), 1);
    }
}
