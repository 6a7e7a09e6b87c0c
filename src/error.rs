//! Structured error types for the harness
//!
//! Every failure the harness can report maps to a stable error code and a
//! process exit code, so the binary and log output stay consistent.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors raised by the harness
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A mode identifier has no registry entry
    #[error("unknown mode '{0}'")]
    UnknownMode(String),

    /// The benchmark directory does not exist or is not a directory
    #[error("invalid directory specified: {}", .0.display())]
    InvalidDirectory(PathBuf),

    /// A required argument was not supplied by CLI, environment or rc file
    #[error("missing required argument: {0}")]
    MissingArgument(&'static str),

    /// An explicitly named rc file could not be read
    #[error("cannot read config file {}: {source}", path.display())]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The external binary could not be started
    #[error("failed to spawn '{}': {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on or reading from a running child failed
    #[error("failed to wait for '{}': {source}", program.display())]
    Wait {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The persisted result document could not be read or written
    #[error("result store {}: {message}", path.display())]
    Store { path: PathBuf, message: String },

    /// A persisted value or configuration entry is malformed
    #[error("parse error: {0}")]
    Parse(String),

    /// A report was requested from an empty store
    #[error("no results to use")]
    NoResults,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarnessError {
    /// Stable error code for log output
    pub fn error_code(&self) -> &'static str {
        match self {
            HarnessError::UnknownMode(_) => "UNKNOWN_MODE",
            HarnessError::InvalidDirectory(_) => "INVALID_DIRECTORY",
            HarnessError::MissingArgument(_) => "MISSING_ARGUMENT",
            HarnessError::ConfigUnreadable { .. } => "CONFIG_UNREADABLE",
            HarnessError::Spawn { .. } => "SPAWN_FAILED",
            HarnessError::Wait { .. } => "WAIT_FAILED",
            HarnessError::Store { .. } => "STORE_ERROR",
            HarnessError::Parse(_) => "PARSE_ERROR",
            HarnessError::NoResults => "NO_RESULTS",
            HarnessError::Io(_) => "IO_ERROR",
            HarnessError::Json(_) => "JSON_ERROR",
        }
    }

    /// Process exit code when this error ends the program
    ///
    /// Usage problems (bad directory, missing argument, unreadable config,
    /// unknown mode, empty store) exit with 2; everything else with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            HarnessError::UnknownMode(_)
            | HarnessError::InvalidDirectory(_)
            | HarnessError::MissingArgument(_)
            | HarnessError::ConfigUnreadable { .. }
            | HarnessError::NoResults => 2,
            _ => 1,
        }
    }

    pub(crate) fn store(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        HarnessError::Store {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_directory_message() {
        let err = HarnessError::InvalidDirectory(PathBuf::from("/tmp/nowhere"));
        assert_eq!(err.error_code(), "INVALID_DIRECTORY");
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("/tmp/nowhere"));
    }

    #[test]
    fn test_unknown_mode() {
        let err = HarnessError::UnknownMode("turbo".to_string());
        assert_eq!(err.error_code(), "UNKNOWN_MODE");
        assert_eq!(err.to_string(), "unknown mode 'turbo'");
    }

    #[test]
    fn test_spawn_error_is_not_usage_error() {
        let err = HarnessError::Spawn {
            program: PathBuf::from("./dice"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("./dice"));
    }

    #[test]
    fn test_store_helper() {
        let err = HarnessError::store("results.json", "truncated");
        assert_eq!(err.error_code(), "STORE_ERROR");
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err: HarnessError = io.into();
        assert_eq!(err.error_code(), "IO_ERROR");
        assert_eq!(err.exit_code(), 1);
    }
}
