//! Error taxonomy for a single fetch attempt.
//!
//! Every variant is terminal for the fetch that produced it and nothing more:
//! the orchestrator reports it and goes back to idle. A response that lost the
//! race to a newer request is *not* an error and never becomes a `SyncError`.

use crate::url_validator::UrlValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Connectivity problems, timeouts, TLS failures.
    #[error("network error: {0}")]
    Network(String),

    /// The data source answered with a non-2xx status.
    #[error("data source returned HTTP {status}")]
    Status { status: u16 },

    /// The body could not be decoded into the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),

    /// A link references a node id missing from the accompanying node set.
    #[error("link {link_source} -> {link_target} references unknown node '{missing}'")]
    Integrity {
        link_source: String,
        link_target: String,
        missing: String,
    },

    /// The static fallback resource could not be read.
    #[error("cannot read {path}: {message}")]
    Io { path: String, message: String },

    #[error(transparent)]
    InvalidUrl(#[from] UrlValidationError),
}

impl SyncError {
    /// Expired or rejected credentials surface as plain HTTP failures; token
    /// refresh belongs to the session provider.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, SyncError::Status { status: 401 | 403 })
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, SyncError::Integrity { .. })
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            SyncError::Status {
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            SyncError::Decode(err.to_string())
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_failure_classification() {
        assert!(SyncError::Status { status: 401 }.is_auth_failure());
        assert!(SyncError::Status { status: 403 }.is_auth_failure());
        assert!(!SyncError::Status { status: 500 }.is_auth_failure());
        assert!(!SyncError::Network("refused".into()).is_auth_failure());
    }

    #[test]
    fn test_integrity_message_names_missing_node() {
        let err = SyncError::Integrity {
            link_source: "nile".into(),
            link_target: "egypt".into(),
            missing: "egypt".into(),
        };
        assert!(err.is_integrity());
        assert!(err.to_string().contains("unknown node 'egypt'"));
    }
}
