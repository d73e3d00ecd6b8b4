//! Generation status of a desk
//!
//! On the wire a status is a flat `{phase, status_text, message}` object. In
//! memory the phase/status pair is held as a [`RunState`] so that a desk with
//! no phase claimed can never be "processing".

use crate::error::StatusError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Message carried by the synthetic status raised when the channel is lost
pub const CONNECTION_LOST_MESSAGE: &str = "Connection lost";

/// Pipeline phase as reported by the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No phase claimed
    NotRunning,
    /// Ideation phase
    Ideation,
    /// Outline phase
    Outline,
    /// Content phase
    Content,
    /// Whole pipeline finished
    Completed,
}

impl Phase {
    /// Every phase, in pipeline order
    pub const ALL: [Phase; 5] = [
        Phase::NotRunning,
        Phase::Ideation,
        Phase::Outline,
        Phase::Content,
        Phase::Completed,
    ];

    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::NotRunning => "not_running",
            Phase::Ideation => "ideation",
            Phase::Outline => "outline",
            Phase::Content => "content",
            Phase::Completed => "completed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = StatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| StatusError::UnknownName {
                what: "phase",
                value: s.to_string(),
            })
    }
}

/// Status text attached to a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusText {
    /// Nothing has happened yet
    NoOp,
    /// Phase is running
    Processing,
    /// Phase finished successfully
    Success,
    /// Phase failed
    Error,
    /// Pipeline finished
    Completed,
}

impl StatusText {
    /// Every status text
    pub const ALL: [StatusText; 5] = [
        StatusText::NoOp,
        StatusText::Processing,
        StatusText::Success,
        StatusText::Error,
        StatusText::Completed,
    ];

    /// Wire name
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StatusText::NoOp => "no_op",
            StatusText::Processing => "processing",
            StatusText::Success => "success",
            StatusText::Error => "error",
            StatusText::Completed => "completed",
        }
    }

    /// Terminal state of a single run
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, StatusText::Success | StatusText::Error)
    }
}

impl fmt::Display for StatusText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome held while no phase is claimed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Settled {
    /// Never ran
    NoOp,
    /// Last run succeeded
    Success,
    /// Last run failed
    Error,
}

impl Settled {
    /// Matching status text
    #[inline]
    #[must_use]
    pub fn status_text(self) -> StatusText {
        match self {
            Settled::NoOp => StatusText::NoOp,
            Settled::Success => StatusText::Success,
            Settled::Error => StatusText::Error,
        }
    }
}

/// Phase that a run can claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClaimedPhase {
    /// Ideation phase
    Ideation,
    /// Outline phase
    Outline,
    /// Content phase
    Content,
    /// Whole pipeline finished
    Completed,
}

impl ClaimedPhase {
    /// Matching phase
    #[inline]
    #[must_use]
    pub fn phase(self) -> Phase {
        match self {
            ClaimedPhase::Ideation => Phase::Ideation,
            ClaimedPhase::Outline => Phase::Outline,
            ClaimedPhase::Content => Phase::Content,
            ClaimedPhase::Completed => Phase::Completed,
        }
    }
}

/// Phase/status pair with the idle invariant built in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// `phase = not_running`
    Idle(Settled),
    /// A phase is claimed
    Claimed {
        /// Claimed phase
        phase: ClaimedPhase,
        /// Its status
        status: StatusText,
    },
}

impl RunState {
    /// Build from the flat wire pair
    ///
    /// # Errors
    /// `StatusError::IllegalCombination` when `not_running` is paired with
    /// `processing` or `completed`.
    pub fn from_parts(phase: Phase, status: StatusText) -> Result<Self, StatusError> {
        let claimed =
            |phase: ClaimedPhase| -> Result<Self, StatusError> { Ok(RunState::Claimed { phase, status }) };
        match phase {
            Phase::NotRunning => match status {
                StatusText::NoOp => Ok(RunState::Idle(Settled::NoOp)),
                StatusText::Success => Ok(RunState::Idle(Settled::Success)),
                StatusText::Error => Ok(RunState::Idle(Settled::Error)),
                StatusText::Processing | StatusText::Completed => {
                    Err(StatusError::IllegalCombination {
                        phase,
                        status,
                    })
                }
            },
            Phase::Ideation => claimed(ClaimedPhase::Ideation),
            Phase::Outline => claimed(ClaimedPhase::Outline),
            Phase::Content => claimed(ClaimedPhase::Content),
            Phase::Completed => claimed(ClaimedPhase::Completed),
        }
    }

    /// Phase component
    #[inline]
    #[must_use]
    pub fn phase(self) -> Phase {
        match self {
            RunState::Idle(_) => Phase::NotRunning,
            RunState::Claimed { phase, .. } => phase.phase(),
        }
    }

    /// Status component
    #[inline]
    #[must_use]
    pub fn status_text(self) -> StatusText {
        match self {
            RunState::Idle(settled) => settled.status_text(),
            RunState::Claimed { status, .. } => status,
        }
    }
}

/// Current generation status of a desk
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "WireStatus", into = "WireStatus")]
pub struct GenerationStatus {
    state: RunState,
    message: String,
}

impl GenerationStatus {
    /// Create a status from its wire parts
    ///
    /// # Errors
    /// `StatusError::IllegalCombination` for pairs no desk can be in.
    pub fn new(
        phase: Phase,
        status_text: StatusText,
        message: impl Into<String>,
    ) -> Result<Self, StatusError> {
        Ok(Self::from_state(
            RunState::from_parts(phase, status_text)?,
            message,
        ))
    }

    /// Create a status from an already valid run state
    #[inline]
    #[must_use]
    pub fn from_state(state: RunState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
        }
    }

    /// Status of a desk before any run: `{not_running, no_op, ""}`
    #[inline]
    #[must_use]
    pub fn initial() -> Self {
        Self::from_state(RunState::Idle(Settled::NoOp), "")
    }

    /// Synthetic status held after the peer closed the status channel
    #[inline]
    #[must_use]
    pub fn connection_lost() -> Self {
        Self::from_state(RunState::Idle(Settled::Error), CONNECTION_LOST_MESSAGE)
    }

    /// Shorthand for a claimed phase
    #[inline]
    #[must_use]
    pub fn claimed(phase: ClaimedPhase, status: StatusText, message: impl Into<String>) -> Self {
        Self::from_state(RunState::Claimed { phase, status }, message)
    }

    /// Run state
    #[inline]
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Phase
    #[inline]
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Status text
    #[inline]
    #[must_use]
    pub fn status_text(&self) -> StatusText {
        self.state.status_text()
    }

    /// Human-readable message
    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check if some phase is processing
    #[inline]
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.status_text() == StatusText::Processing
    }
}

impl Default for GenerationStatus {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.phase(), self.status_text())?;
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct WireStatus {
    phase: Phase,
    status_text: StatusText,
    #[serde(default)]
    message: String,
}

impl TryFrom<WireStatus> for GenerationStatus {
    type Error = StatusError;

    fn try_from(wire: WireStatus) -> Result<Self, Self::Error> {
        GenerationStatus::new(wire.phase, wire.status_text, wire.message)
    }
}

impl From<GenerationStatus> for WireStatus {
    fn from(status: GenerationStatus) -> Self {
        WireStatus {
            phase: status.phase(),
            status_text: status.status_text(),
            message: status.message,
        }
    }
}
