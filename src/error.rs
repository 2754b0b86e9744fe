use std::path::PathBuf;
use thiserror::Error;

/// Failures surfaced by session store backends.
///
/// An absent or expired session is never an error: lookups return `Ok(None)` and
/// deletes of unknown ids return `Ok(false)`.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The persistence layer failed to execute a read or write.
    #[error("session storage fault: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A stored payload could not be decoded.
    #[error("corrupt session payload for {fingerprint}: {source}")]
    Corrupt {
        fingerprint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode session: {0}")]
    Encode(#[source] serde_json::Error),

    /// The session cannot be stored as given (reserved field, expiry out of range).
    #[error("invalid session: {0}")]
    Invalid(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SessionError {
    /// Returns true when the error originated in the storage engine.
    pub fn is_storage_fault(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

pub(crate) fn serde_error(err: serde_json::Error) -> SessionError {
    SessionError::Encode(err)
}

pub(crate) fn config_error(err: config::ConfigError) -> SessionError {
    SessionError::Config(err.to_string())
}

#[cfg(feature = "sqlite")]
pub(crate) fn sqlite_error(err: rusqlite::Error) -> SessionError {
    SessionError::Storage(Box::new(err))
}

/// Failures surfaced by the upload and static path guards.
#[derive(Debug, Error)]
pub enum GuardError {
    /// The resolved path escapes the configured root, or could not be interpreted.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The path is contained but no file exists there.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GuardError {
    /// Returns true when the guard refused a path rather than failing to find it.
    pub fn is_invalid_path(&self) -> bool {
        matches!(self, Self::InvalidPath(_))
    }
}

pub type GuardResult<T> = std::result::Result<T, GuardError>;

pub(crate) fn invalid_path(reason: impl Into<String>) -> GuardError {
    GuardError::InvalidPath(reason.into())
}
