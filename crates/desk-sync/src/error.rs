//! Error types for Desk Sync
//!
//! REST faults propagate to the immediate caller as [`SyncError`]. Channel
//! faults never do; they are delivered as channel events instead.

use crate::config::ConfigError;
use desk_core::GateError;

/// Main sync error type
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Server answered with a non-success status
    #[error("request rejected ({status}): {message}")]
    RequestRejected {
        /// HTTP status code
        status: u16,
        /// Server message, verbatim
        message: String,
    },

    /// Caller-side precondition failed, nothing was sent
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// Request did not complete
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// Request exceeded its timeout
    #[error("request timed out")]
    Timeout,

    /// Response body did not decode
    #[error("unexpected response: {0}")]
    Decode(String),

    /// Command needs a mounted desk
    #[error("no desk is mounted")]
    NotMounted,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SyncError {
    /// Check if the server rejected the request
    #[inline]
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::RequestRejected { .. })
    }

    /// Check if the request was blocked before being issued
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationFailed(_) | Self::NotMounted)
    }

    /// HTTP status of a rejection
    #[inline]
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RequestRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<GateError> for SyncError {
    fn from(value: GateError) -> Self {
        Self::ValidationFailed(value.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout
        } else if value.is_decode() {
            Self::Decode(value.to_string())
        } else {
            Self::Transport(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use desk_core::Phase;

    #[test]
    fn gate_errors_become_validation_failures() {
        let err = SyncError::from(GateError::Busy {
            phase: Phase::Content,
        });
        assert!(err.is_validation());
        assert!(!err.is_rejection());
        assert!(err.to_string().contains("content is still processing"));
    }

    #[test]
    fn rejection_carries_status() {
        let err = SyncError::RequestRejected {
            status: 409,
            message: "Run content generation first.".to_string(),
        };
        assert!(err.is_rejection());
        assert_eq!(err.status_code(), Some(409));
        assert_eq!(
            err.to_string(),
            "request rejected (409): Run content generation first."
        );
    }
}
