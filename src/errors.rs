//! Error types for the log manager.
//!
//! Failure classes map onto how they are surfaced:
//!
//! - `Config` and `Resource` fail `create`/`open` synchronously and abort
//!   engine startup.
//! - `Io` inside a background server is logged with context and terminates
//!   that server's loop; the process keeps running with degraded guarantees.
//! - `InvalidOperation` is reported synchronously to the caller and is never
//!   fatal to the process.
//! - `Teardown` carries every failure accumulated during destroy; teardown
//!   never short-circuits so that all resources get a release attempt.

use std::io;

use thiserror::Error;

/// Result type for log manager operations.
pub type LogResult<T> = Result<T, LogError>;

/// Errors produced by the log manager.
#[derive(Debug, Error)]
pub enum LogError {
    /// Malformed or conflicting configuration options.
    #[error("configuration error: {0}")]
    Config(String),

    /// Lock, thread, or signal allocation failure.
    #[error("resource error: {0}")]
    Resource(String),

    /// File create/open/fsync/remove failure, with context.
    #[error("{context}: {source}")]
    Io {
        /// What the log manager was doing when the I/O failed.
        context: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Operation not valid in the current manager state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// One or more teardown steps failed; all steps were still attempted.
    #[error("teardown completed with errors: {0}")]
    Teardown(String),
}

impl LogError {
    /// Wrap an I/O error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        LogError::Io {
            context: context.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_carries_context() {
        let err = LogError::io(
            "failed to fsync segment 3",
            io::Error::new(io::ErrorKind::Other, "device gone"),
        );
        let msg = err.to_string();
        assert!(msg.contains("failed to fsync segment 3"));
        assert!(msg.contains("device gone"));
    }

    #[test]
    fn test_config_error_display() {
        let err = LogError::Config("log.file_max below minimum".to_string());
        assert!(err.to_string().starts_with("configuration error"));
    }

    #[test]
    fn test_invalid_operation_display() {
        let err = LogError::InvalidOperation("archive server is running".to_string());
        assert!(err.to_string().starts_with("invalid operation"));
    }
}
