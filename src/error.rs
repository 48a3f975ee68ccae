//! Error types for `tasktree`.

use std::path::PathBuf;

/// Errors that can occur while manipulating or persisting tasks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A task identifier supplied by the caller does not resolve.
    #[error("task not found: {id}")]
    NotFound {
        /// The identifier that was looked up.
        id: String,
    },

    /// A request names a related task that does not exist.
    #[error("request references unknown task: {id}")]
    InvalidReference {
        /// The unresolved identifier.
        id: String,
    },

    /// A persisted record references a task that is not in the file.
    #[error("task {referenced_by} references missing task {id}")]
    DanglingReference {
        /// The missing identifier.
        id: String,
        /// The record that holds the reference.
        referenced_by: String,
    },

    /// A new task could not be created because a declared parent is unknown.
    #[error("unable to create task: parent {parent_id} not found")]
    UnableToCreate {
        /// The parent identifier that could not be resolved.
        parent_id: String,
    },

    /// Linking two tasks would make a task its own ancestor.
    #[error("linking {task_id} under {related_id} would create a cycle")]
    Cycle {
        /// The task that would become a subtask.
        task_id: String,
        /// The task that would become its parent.
        related_id: String,
    },

    /// The backing file could not be read or written.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The file being accessed.
        path: PathBuf,
        /// The underlying cause.
        #[source]
        source: std::io::Error,
    },

    /// The backing file is not a valid list of task records.
    #[error("could not decode {}: {source}", path.display())]
    Decode {
        /// The file being decoded.
        path: PathBuf,
        /// The underlying cause.
        #[source]
        source: serde_json::Error,
    },

    /// A request body could not be parsed.
    #[error("invalid request: {0}")]
    InvalidRequest(#[source] serde_json::Error),

    /// The configuration file could not be parsed or written.
    #[error("configuration error: {0}")]
    Config(#[from] serde_yaml::Error),
}

/// The category of an [`Error`], independent of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced identifier does not exist.
    NotFound,
    /// Task construction failed on an unresolved parent.
    UnableToCreate,
    /// The hierarchy would stop being acyclic.
    Cycle,
    /// Reading or writing the backing file failed.
    Io,
    /// The backing file content is malformed.
    Decode,
    /// A caller-supplied request is malformed or names unknown tasks.
    InvalidRequest,
    /// The configuration file is malformed.
    Config,
}

impl Error {
    /// The tagged kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::DanglingReference { .. } => ErrorKind::NotFound,
            Self::UnableToCreate { .. } => ErrorKind::UnableToCreate,
            Self::Cycle { .. } => ErrorKind::Cycle,
            Self::Io { .. } => ErrorKind::Io,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::InvalidRequest(_) | Self::InvalidReference { .. } => ErrorKind::InvalidRequest,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
