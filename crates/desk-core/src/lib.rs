//! Desk Core - run/status state for content-generation desks
//!
//! Pure, I/O-free building blocks:
//! - Desk data model and the validated generation status
//! - Phase state machine driving per-phase UI affordances
//! - Status reconciler merging pushed and polled status
//! - Channel event types and the caller-side run gate
//!
//! # Example
//!
//! ```rust
//! use desk_core::{derive_ui_state, GenerationStatus, Phase, Reconciler, StatusText};
//!
//! let mut reconciler = Reconciler::new();
//! let running = GenerationStatus::new(Phase::Ideation, StatusText::Processing, "").unwrap();
//! reconciler.on_push(running);
//!
//! let ui = derive_ui_state(reconciler.current(), Phase::Ideation);
//! assert!(ui.is_running);
//! assert!(!ui.can_run_others);
//! ```

#![warn(unreachable_pub)]

pub mod channel;
pub mod desk;
pub mod error;
pub mod feedback;
pub mod gate;
pub mod reconciler;
pub mod status;
pub mod ui_state;

pub use channel::{
    describe_error_payload, parse_status_payload, ChannelError, ChannelErrorKind, ChannelEvent,
    Severity, ERROR_EVENT, STATUS_EVENT,
};
pub use desk::{
    Desk, DeskId, PhaseKind, PhaseRecord, ReviewPost, RunAck, RunTarget, SettingsCatalog,
    SettingsPatch, TopicId,
};
pub use error::{GateError, StatusError};
pub use feedback::FeedbackLedger;
pub use gate::{ensure_can_start, ensure_full_run_ready, ensure_settings_allowed};
pub use reconciler::{Reconciled, Reconciler, Source};
pub use status::{
    ClaimedPhase, GenerationStatus, Phase, RunState, Settled, StatusText,
    CONNECTION_LOST_MESSAGE,
};
pub use ui_state::{can_start_run, derive_ui_state, indicator, PhaseIndicator, PhaseUiState};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
