//! Status channel events
//!
//! Transport-neutral events surfaced by a status channel. Transport faults
//! never escape a channel as errors; they arrive here as [`ChannelEvent::Error`].

use crate::status::GenerationStatus;
use std::fmt;

/// Name of the server event carrying a status payload
pub const STATUS_EVENT: &str = "status_update";

/// Name of the server event carrying an error payload
pub const ERROR_EVENT: &str = "error";

/// How bad a channel error is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Channel may still deliver
    Transient,
    /// Channel is gone
    Terminal,
}

/// Channel error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelErrorKind {
    /// Event payload did not parse; the stream stays open
    MalformedPayload,
    /// Peer closed or refused the channel
    ConnectionClosed,
    /// Ambiguous fault
    Transient,
}

impl ChannelErrorKind {
    /// Severity of this kind
    #[inline]
    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            ChannelErrorKind::ConnectionClosed => Severity::Terminal,
            ChannelErrorKind::MalformedPayload | ChannelErrorKind::Transient => {
                Severity::Transient
            }
        }
    }
}

impl fmt::Display for ChannelErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChannelErrorKind::MalformedPayload => "malformed payload",
            ChannelErrorKind::ConnectionClosed => "connection closed",
            ChannelErrorKind::Transient => "transient channel fault",
        })
    }
}

/// Channel error with detail
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct ChannelError {
    /// Classification
    pub kind: ChannelErrorKind,
    /// What happened
    pub detail: String,
}

impl ChannelError {
    /// Create a channel error
    #[inline]
    pub fn new(kind: ChannelErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Check if the channel is gone
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.kind.severity() == Severity::Terminal
    }
}

/// Event delivered by a status channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// New status
    StatusUpdate(GenerationStatus),
    /// Channel fault
    Error(ChannelError),
}

impl ChannelEvent {
    /// Check if no further events follow
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChannelEvent::Error(err) if err.is_terminal())
    }
}

/// Parse a `status_update` payload
///
/// # Errors
/// `MalformedPayload` when the data is not a valid status object.
pub fn parse_status_payload(data: &str) -> Result<GenerationStatus, ChannelError> {
    serde_json::from_str(data)
        .map_err(|e| ChannelError::new(ChannelErrorKind::MalformedPayload, e.to_string()))
}

/// Readable message out of a server `error` payload
///
/// The server sends `{"error": ..., "message": ...}`; anything else is
/// returned as-is.
#[must_use]
pub fn describe_error_payload(data: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorPayload {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        message: Option<String>,
    }

    match serde_json::from_str::<ErrorPayload>(data) {
        Ok(ErrorPayload {
            error: Some(error),
            message: Some(message),
        }) => format!("{error}: {message}"),
        Ok(ErrorPayload {
            error: Some(text), ..
        })
        | Ok(ErrorPayload {
            message: Some(text), ..
        }) => text,
        _ => data.to_string(),
    }
}
