//! Default locations for tasktree's files.
//!
//! Everything lives under `~/.tasktree/` unless the configuration points
//! elsewhere.

use std::path::{Path, PathBuf};

/// The base directory name for tasktree data.
const DATA_DIR_NAME: &str = ".tasktree";

/// The task file name.
pub const TASKS_FILENAME: &str = "tasks.json";

/// The configuration file name.
pub const CONFIG_FILENAME: &str = "config.yaml";

/// Get the base data directory.
///
/// Returns `~/.tasktree/`, or `./.tasktree/` if the home directory cannot
/// be determined.
#[must_use]
pub fn data_dir() -> PathBuf {
    data_dir_in(dirs::home_dir().as_deref())
}

fn data_dir_in(home: Option<&Path>) -> PathBuf {
    home.map_or_else(|| PathBuf::from(DATA_DIR_NAME), |h| h.join(DATA_DIR_NAME))
}

/// Default path of the task file.
#[must_use]
pub fn default_tasks_path() -> PathBuf {
    data_dir().join(TASKS_FILENAME)
}

/// Default path of the configuration file.
#[must_use]
pub fn default_config_path() -> PathBuf {
    data_dir().join(CONFIG_FILENAME)
}
