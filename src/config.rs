//! Persisted application defaults.
//!
//! Optional settings stored in the platform config directory and
//! merged under CLI flags: a flag always wins, the file fills gaps.
//! A missing or unreadable config silently falls back to defaults.

use anyhow::Result;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const QUALIFIER: &str = "io";
const ORGANIZATION: &str = "relinker";
const APPLICATION: &str = "relinker";

/// Application configuration defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Metadata database location; defaults to the platform cache dir.
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// Hashing worker count.
    #[serde(default)]
    pub io_threads: Option<usize>,

    /// Minimum file size to consider, in bytes.
    #[serde(default)]
    pub min_size: Option<u64>,

    /// Skip hidden files and directories.
    #[serde(default)]
    pub skip_hidden: bool,

    /// Follow symbolic links during scanning.
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Config {
    /// Load from the default platform-specific path, falling back to
    /// defaults on any failure.
    #[must_use]
    pub fn load() -> Self {
        match Self::load_internal() {
            Ok(config) => config,
            Err(e) => {
                log::debug!("Failed to load config, using defaults: {e}");
                Self::default()
            }
        }
    }

    fn load_internal() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn config_path() -> Result<PathBuf> {
        let dirs = project_dirs()?;
        Ok(dirs.config_dir().join("config.json"))
    }

    /// The database path to use: configured value or the platform
    /// cache directory default.
    ///
    /// # Errors
    ///
    /// Returns an error if no home directory can be determined.
    pub fn resolve_db_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.db_path {
            return Ok(path.clone());
        }
        let dirs = project_dirs()?;
        Ok(dirs.cache_dir().join("metadata.db"))
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
        .ok_or_else(|| anyhow::anyhow!("failed to determine project directories"))
}
