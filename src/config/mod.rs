//! Configuration and on-disk layout for the coordination directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{CoordError, Result};

/// Directory name holding all coordination state, resolved against the
/// project root unless overridden on the command line.
pub const COORD_DIR_NAME: &str = ".coord";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordConfig {
    pub agents: BTreeMap<String, AgentProfile>,
    pub learning: LearningConfig,
    pub logging: LoggingConfig,
}

/// A registered agent and what it advertises it can do. The registry is the
/// source of truth for recipient validation and broadcast fan-out.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentProfile {
    pub description: String,
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Occurrences before a failure pattern is promoted to an insight.
    pub min_pattern_frequency: u32,
    /// Effectiveness floor for applying adaptation rules.
    pub min_confidence_threshold: f64,
    /// Bounded event history capacity.
    pub history_capacity: usize,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            min_pattern_frequency: 3,
            min_confidence_threshold: 0.7,
            history_capacity: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Age cutoff for the periodic log sweep.
    pub retention_days: i64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { retention_days: 7 }
    }
}

impl CoordConfig {
    pub async fn load(coord_dir: &Path) -> Result<Self> {
        let config_path = coord_dir.join("config.toml");
        let config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).await?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, coord_dir: &Path) -> Result<()> {
        self.validate()?;
        fs::create_dir_all(coord_dir).await?;
        let config_path = coord_dir.join("config.toml");
        let content =
            toml::to_string_pretty(self).map_err(|e| CoordError::Config(e.to_string()))?;
        fs::write(&config_path, content).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.learning.min_pattern_frequency == 0 {
            errors.push("learning.min_pattern_frequency must be greater than 0");
        }
        if !(0.0..=1.0).contains(&self.learning.min_confidence_threshold) {
            errors.push("learning.min_confidence_threshold must be between 0.0 and 1.0");
        }
        if self.learning.history_capacity == 0 {
            errors.push("learning.history_capacity must be greater than 0");
        }
        if self.logging.retention_days <= 0 {
            errors.push("logging.retention_days must be greater than 0");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoordError::Config(errors.join("; ")))
        }
    }

}

/// Resolved filesystem layout under the coordination directory.
#[derive(Debug, Clone)]
pub struct CoordPaths {
    pub coord_dir: PathBuf,
}

impl CoordPaths {
    pub fn new(coord_dir: impl Into<PathBuf>) -> Self {
        Self {
            coord_dir: coord_dir.into(),
        }
    }

    /// Resolve the coordination directory: explicit override first, else
    /// `<project root>/.coord` where the project root is the nearest
    /// ancestor containing `.git`, else the current directory.
    pub fn discover(override_dir: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = override_dir {
            return Ok(Self::new(dir));
        }

        let current = std::env::current_dir()?;
        let mut path = current.as_path();
        loop {
            if path.join(".git").exists() {
                return Ok(Self::new(path.join(COORD_DIR_NAME)));
            }
            match path.parent() {
                Some(parent) => path = parent,
                None => return Ok(Self::new(current.join(COORD_DIR_NAME))),
            }
        }
    }

    pub fn communication_dir(&self) -> PathBuf {
        self.coord_dir.join("communication")
    }

    pub fn memory_dir(&self) -> PathBuf {
        self.coord_dir.join("memory")
    }

    pub fn learning_dir(&self) -> PathBuf {
        self.coord_dir.join("learning")
    }
}
