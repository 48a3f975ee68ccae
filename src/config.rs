//! Configuration management for tasktree.
//!
//! Settings live in `~/.tasktree/config.yaml`:
//!
//! ```yaml
//! data_file: /home/ana/notes/tasks.json
//! load_policy: cached
//! log_filter: tasktree=debug
//! ```
//!
//! Every key is optional. `TASKTREE_DATA_FILE` overrides `data_file`.

use crate::error::{Error, Result};
use crate::paths;
use crate::storage::{write_atomic, LoadPolicy, SharedTaskStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the task file location.
pub const DATA_FILE_ENV: &str = "TASKTREE_DATA_FILE";

/// Tasktree settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Where the tasks are stored. `None` means the default location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_file: Option<PathBuf>,

    /// Whether to reload the file before every operation.
    #[serde(default)]
    pub load_policy: LoadPolicy,

    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl Config {
    /// Load config from the default location, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        Self::load_or_default(&paths::default_config_path())
    }

    /// Load config from a specific file, falling back to defaults if it
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        Ok(Self::load_from(path)?.unwrap_or_default())
    }

    /// Load config from a specific file, returning `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(Some(config))
    }

    /// Save config to a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        write_atomic(path, content.as_bytes())
    }

    /// The task file to use, honouring `TASKTREE_DATA_FILE`.
    #[must_use]
    pub fn data_file(&self) -> PathBuf {
        self.data_file_with_override(std::env::var_os(DATA_FILE_ENV).map(PathBuf::from))
    }

    fn data_file_with_override(&self, env_override: Option<PathBuf>) -> PathBuf {
        env_override
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(|| self.data_file.clone())
            .unwrap_or_else(paths::default_tasks_path)
    }

    /// Build the shared store described by this config.
    #[must_use]
    pub fn open_store(&self) -> SharedTaskStore {
        SharedTaskStore::new(self.data_file(), self.load_policy)
    }
}
