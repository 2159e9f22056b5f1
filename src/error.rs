//! Join error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while executing a join.
#[derive(Error, Debug)]
pub enum JoinError {
    #[error("Failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Partition boundary {offset} is past end of file (size {size})")]
    BoundaryPastEof { offset: u64, size: u64 },

    #[error("Short read at offset {offset}: expected {expected} bytes, got {actual}")]
    ShortRead {
        offset: u64,
        expected: usize,
        actual: usize,
    },

    #[error("Parse error at byte offset {offset}: {reason}")]
    Parse { offset: u64, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Join cancelled")]
    Cancelled,

    #[error("Channel closed early in {stage} stage")]
    ChannelClosed { stage: &'static str },

    #[error("Worker '{worker}' panicked")]
    WorkerPanicked { worker: String },

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Reducer received {received} of {expected} partial counts")]
    Aggregation { received: usize, expected: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl JoinError {
    /// Returns true for errors that only happen because some other worker
    /// already failed.
    pub fn is_secondary(&self) -> bool {
        matches!(self, JoinError::Cancelled | JoinError::ChannelClosed { .. })
    }
}

/// Result type for join operations.
pub type JoinResult<T> = Result<T, JoinError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secondary_errors() {
        assert!(JoinError::Cancelled.is_secondary());
        assert!(JoinError::ChannelClosed { stage: "probe" }.is_secondary());
        assert!(!JoinError::Parse {
            offset: 3,
            reason: "bad".to_string()
        }
        .is_secondary());
        assert!(!JoinError::BoundaryPastEof { offset: 10, size: 4 }.is_secondary());
    }

    #[test]
    fn test_error_messages() {
        let err = JoinError::ShortRead {
            offset: 8,
            expected: 4,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "Short read at offset 8: expected 4 bytes, got 1"
        );

        let err = JoinError::Aggregation {
            received: 3,
            expected: 4,
        };
        assert_eq!(err.to_string(), "Reducer received 3 of 4 partial counts");
    }
}
