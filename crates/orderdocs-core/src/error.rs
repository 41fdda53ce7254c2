//! Error taxonomy for the order document store
//!
//! Every store, planner and merge operation returns [`Result`]. Callers branch
//! on the variant rather than on message text.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the core
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed order/line identifiers or upload input
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown record, order, sequence or artifact
    #[error("not found: {0}")]
    NotFound(String),

    /// Sequence race detected at insert and not recovered by the retry
    #[error("sequence conflict for {key}: version {sequence} already exists")]
    Conflict { key: String, sequence: u32 },

    /// Upload refused because a version exists and duplicates were disallowed
    #[error(
        "file already exists for order {order}, line {line} ({existing} version(s)); \
         allow duplicates to upload a new version"
    )]
    DuplicateVersion { order: u32, line: u32, existing: u32 },

    /// Status change requested on a record that already reached a terminal status
    #[error("record {id} is already {status}; status can only change once")]
    InvalidTransition { id: i64, status: String },

    /// An explicitly requested line has no available artifact
    #[error("line {line} not found or PDF not available for order {order}")]
    UnresolvedLine { order: u32, line: u32 },

    /// No records at all for the order
    #[error("no files found for order number {0}")]
    EmptyOrder(u32),

    /// The order has records, but none of them has a derived artifact
    #[error("no PDF files available to merge for order {0}")]
    NoAvailableArtifacts(u32),

    /// Unreadable, unparseable or empty document
    #[error("invalid or corrupted document at {path}{}: {reason}", line_suffix(.line))]
    CorruptArtifact {
        path: String,
        line: Option<u32>,
        reason: String,
    },

    /// The conversion collaborator reported a failure
    #[error("conversion failed: {0}")]
    Conversion(String),

    /// Building or serializing the merged document failed
    #[error("failed to build merged document: {0}")]
    Document(String),

    /// Blob storage failure
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persistence backend failure
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Invalid or unreadable configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

fn line_suffix(line: &Option<u32>) -> String {
    line.map(|l| format!(" (line {l})")).unwrap_or_default()
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: &str, reason: impl ToString) -> Self {
        Error::CorruptArtifact {
            path: path.to_string(),
            line: None,
            reason: reason.to_string(),
        }
    }

    /// Attach the line the corrupt artifact belongs to
    pub(crate) fn for_line(self, line_number: u32) -> Self {
        match self {
            Error::CorruptArtifact { path, reason, .. } => Error::CorruptArtifact {
                path,
                line: Some(line_number),
                reason,
            },
            other => other,
        }
    }

    /// True for errors caused by caller input rather than system state
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::NotFound(_)
                | Error::DuplicateVersion { .. }
                | Error::UnresolvedLine { .. }
                | Error::EmptyOrder(_)
                | Error::NoAvailableArtifacts(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_message_includes_line() {
        let err = Error::corrupt("converted/a.pdf", "no pages").for_line(3);
        assert_eq!(
            err.to_string(),
            "invalid or corrupted document at converted/a.pdf (line 3): no pages"
        );
    }

    #[test]
    fn test_for_line_leaves_other_errors_alone() {
        let err = Error::EmptyOrder(123456).for_line(2);
        assert!(matches!(err, Error::EmptyOrder(123456)));
    }

    #[test]
    fn test_client_errors() {
        assert!(Error::UnresolvedLine {
            order: 123456,
            line: 2
        }
        .is_client_error());
        assert!(!Error::Document("boom".to_string()).is_client_error());
    }
}
