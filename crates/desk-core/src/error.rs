//! Error types for Desk Core
//!
//! Covers the two failure families that can be decided without any I/O:
//! - Illegal or unknown status values coming off the wire
//! - Caller-side preconditions that block a command before it is issued

use crate::status::{Phase, StatusText};

/// Status value errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusError {
    /// Phase/status pair that no desk can be in
    #[error("illegal status: phase {phase} cannot carry status {status}")]
    IllegalCombination {
        /// Claimed phase
        phase: Phase,
        /// Status text paired with it
        status: StatusText,
    },

    /// Unrecognised textual name
    #[error("unknown {what}: {value:?}")]
    UnknownName {
        /// Kind of name being parsed
        what: &'static str,
        /// Offending input
        value: String,
    },
}

/// Caller-side gate errors
///
/// Raised before any request leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// A phase is still processing
    #[error("desk is busy: {phase} is still processing")]
    Busy {
        /// Phase holding the desk
        phase: Phase,
    },

    /// Required desk setting is not configured
    #[error("{0} must be set before running the full pipeline")]
    MissingSetting(&'static str),

    /// Setting value outside the allow-list
    #[error("{setting} {value:?} is not an allowed value")]
    NotAllowed {
        /// Setting name
        setting: &'static str,
        /// Rejected value
        value: String,
    },

    /// Settings update with nothing in it
    #[error("no settings provided")]
    EmptyPatch,
}

impl GateError {
    /// Check if the gate closed only because a run is in flight
    #[inline]
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_display() {
        let err = StatusError::IllegalCombination {
            phase: Phase::NotRunning,
            status: StatusText::Processing,
        };
        assert_eq!(
            err.to_string(),
            "illegal status: phase not_running cannot carry status processing"
        );
    }

    #[test]
    fn gate_error_is_busy() {
        assert!(GateError::Busy { phase: Phase::Outline }.is_busy());
        assert!(!GateError::MissingSetting("platform").is_busy());
        assert!(GateError::MissingSetting("platform")
            .to_string()
            .contains("platform must be set"));
    }
}
