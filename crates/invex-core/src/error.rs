//! Error types for the invex-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the invex library.
///
/// Every variant here is fatal for a batch. Per-field failures never reach
/// this type; they resolve to absent values inside the extractors.
#[derive(Error, Debug)]
pub enum InvexError {
    /// The source directory does not exist or is not a directory.
    #[error("source directory not found: {}", .0.display())]
    MissingSourceDirectory(PathBuf),

    /// Processing finished but not a single row was accepted.
    #[error(
        "no records produced from {} ({scanned} text files scanned); file names must look like INVOICENUMBER_REGISTRATION.txt",
        dir.display()
    )]
    NoRecordsProduced { dir: PathBuf, scanned: usize },

    /// Escalation was attempted without a credential in the environment.
    #[error("missing credential: environment variable {0} is not set")]
    MissingCredential(String),

    /// The batch was cancelled before it finished.
    #[error("batch cancelled")]
    Cancelled,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while normalizing a single field.
///
/// These are local: the public normalizers turn them into absent values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// Token could not be read as a monetary amount.
    #[error("unparsable amount: {0:?}")]
    UnparsableAmount(String),

    /// Token is not a valid calendar date in a supported spelling.
    #[error("unparsable date: {0:?}")]
    UnparsableDate(String),
}

/// Errors from the escalation capability.
#[derive(Error, Debug)]
pub enum EscalationError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("escalation network error: {0}")]
    Network(String),

    /// The service answered with a non-success status.
    #[error("escalation API error: HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// The answer did not match the response schema.
    #[error("escalation response failed schema validation: {0}")]
    Schema(String),

    /// No credential available for the service.
    #[error("escalation credential {0} is not set")]
    MissingCredential(String),
}

impl EscalationError {
    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            EscalationError::Network(_) => true,
            EscalationError::Api { status, .. } => *status == 429 || *status >= 500,
            EscalationError::Schema(_) | EscalationError::MissingCredential(_) => false,
        }
    }
}

/// Result type for the invex library.
pub type Result<T> = std::result::Result<T, InvexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(EscalationError::Network("timeout".into()).is_transient());
        assert!(EscalationError::Api { status: 503, body: String::new() }.is_transient());
        assert!(EscalationError::Api { status: 429, body: String::new() }.is_transient());
        assert!(!EscalationError::Api { status: 400, body: String::new() }.is_transient());
        assert!(!EscalationError::Schema("bad".into()).is_transient());
    }

    #[test]
    fn test_messages_name_the_directory() {
        let err = InvexError::MissingSourceDirectory(PathBuf::from("/tmp/nope"));
        assert!(err.to_string().contains("/tmp/nope"));

        let err = InvexError::NoRecordsProduced { dir: PathBuf::from("scans"), scanned: 3 };
        assert!(err.to_string().contains("3 text files"));
    }
}
