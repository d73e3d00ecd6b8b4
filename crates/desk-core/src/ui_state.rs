//! Phase state machine
//!
//! UI state is a pure function of the latest [`GenerationStatus`]: nothing is
//! remembered between calls, so every displayed phase agrees with every other.

use crate::status::{GenerationStatus, Phase, StatusText};
use serde::Serialize;

/// Derived affordances for one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PhaseUiState {
    /// This phase is processing
    pub is_running: bool,
    /// This phase finished successfully
    pub is_complete: bool,
    /// The desk accepts a new run trigger
    pub can_run_others: bool,
}

/// Per-phase indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseIndicator {
    /// Nothing to show
    Idle,
    /// Spinner
    Running,
    /// Checkmark
    Succeeded,
    /// Failure mark
    Failed,
}

impl PhaseIndicator {
    /// Short label
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseIndicator::Idle => "idle",
            PhaseIndicator::Running => "running",
            PhaseIndicator::Succeeded => "succeeded",
            PhaseIndicator::Failed => "failed",
        }
    }
}

/// Derive the UI state of `my_phase` from the desk status
#[must_use]
pub fn derive_ui_state(status: &GenerationStatus, my_phase: Phase) -> PhaseUiState {
    let mine = status.phase() == my_phase;
    PhaseUiState {
        is_running: mine && status.status_text() == StatusText::Processing,
        is_complete: mine && status.status_text() == StatusText::Success,
        can_run_others: can_start_run(status),
    }
}

/// Desk-level gate: no phase currently claims `processing`
#[inline]
#[must_use]
pub fn can_start_run(status: &GenerationStatus) -> bool {
    status.phase() == Phase::NotRunning
        || matches!(status.status_text(), StatusText::Success | StatusText::Error)
}

/// Indicator for `phase`
#[must_use]
pub fn indicator(status: &GenerationStatus, phase: Phase) -> PhaseIndicator {
    if status.phase() != phase {
        return PhaseIndicator::Idle;
    }
    match status.status_text() {
        StatusText::Processing => PhaseIndicator::Running,
        StatusText::Success => PhaseIndicator::Succeeded,
        StatusText::Error => PhaseIndicator::Failed,
        StatusText::NoOp | StatusText::Completed => PhaseIndicator::Idle,
    }
}
