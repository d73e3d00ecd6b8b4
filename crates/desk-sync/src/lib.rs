//! Desk Sync - talking to the content desk server
//!
//! - [`HttpDeskApi`]: REST calls, one attempt each
//! - [`SseStatusChannel`]: live status over server-sent events
//! - [`RunOrchestrator`] and [`FeedbackSync`]: command boundaries
//! - [`DeskView`]: one mounted desk with reconciled status
//!
//! # Example
//!
//! ```rust,no_run
//! use desk_core::{DeskId, RunTarget, PhaseKind};
//! use desk_sync::{DeskView, SyncConfig};
//!
//! # async fn run() -> Result<(), desk_sync::SyncError> {
//! let config = SyncConfig::new().with_base_url("http://localhost:8000");
//! let mut view = DeskView::connect(&config)?;
//! view.mount(Some(DeskId::new("665f1c"))).await?;
//!
//! let ack = view.start(RunTarget::Phase(PhaseKind::Ideation)).await?;
//! println!("{}", ack.message);
//!
//! let mut status = view.subscribe();
//! while status.changed().await.is_ok() {
//!     println!("{}", *status.borrow());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod api;
pub mod channel;
pub mod config;
pub mod error;
pub mod feedback;
pub mod orchestrator;
pub mod sse;
pub mod view;

pub use api::{DeskApi, HttpDeskApi};
pub use channel::{ChannelHandle, SseStatusChannel, StatusSource};
pub use config::{ConfigError, SyncConfig, ENV_API_TOKEN, ENV_BASE_URL};
pub use error::SyncError;
pub use feedback::{FeedbackOutcome, FeedbackSync};
pub use orchestrator::RunOrchestrator;
pub use sse::{SseDecoder, SseFrame};
pub use view::{DeskView, ViewNotice};
