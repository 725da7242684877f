// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while tailing the transfer log
#[derive(Debug, Error)]
pub enum TailError {
    #[error("Transfer log not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Permission denied reading transfer log: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while reading or rewriting the history file
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Permission denied accessing history file: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("IO error accessing history {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to replace history file {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TailError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }

    /// Missing file is the normal "no session yet" case, not worth a warning.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl HistoryError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            _ => Self::Io { path, source },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail_error_display() {
        let err = TailError::NotFound {
            path: PathBuf::from("/var/log/media-ingest.log"),
        };
        assert!(err.to_string().contains("/var/log/media-ingest.log"));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_tail_error_io_classification() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = TailError::io("/test/path", io_err);
        assert!(err.is_not_found());

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = TailError::io("/test/path", io_err);
        assert!(matches!(err, TailError::PermissionDenied { .. }));

        let io_err = std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout");
        let err = TailError::io("/test/path", io_err);
        assert!(matches!(err, TailError::Io { .. }));
    }

    #[test]
    fn test_history_error_io_classification() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = HistoryError::io("/data/history.json", io_err);
        assert!(matches!(err, HistoryError::PermissionDenied { .. }));

        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err = HistoryError::io("/data/history.json", io_err);
        assert!(err.to_string().contains("disk full"));
    }
}
