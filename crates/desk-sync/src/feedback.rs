//! Feedback and content sync
//!
//! Saves per-phase feedback, skipping writes that would change nothing, and
//! refetches the whole desk after a completed phase.

use crate::api::DeskApi;
use crate::error::SyncError;
use desk_core::{Desk, DeskId, FeedbackLedger, PhaseKind};
use parking_lot::Mutex;
use std::sync::Arc;

/// Outcome of a feedback save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackOutcome {
    /// Written to the server
    Saved,
    /// Identical to the last persisted value, nothing sent
    Unchanged,
}

#[derive(Debug, Default)]
struct LedgerState {
    epoch: u64,
    ledger: FeedbackLedger,
}

/// Feedback writes and desk refetches
#[derive(Clone)]
pub struct FeedbackSync {
    api: Arc<dyn DeskApi>,
    state: Arc<Mutex<LedgerState>>,
}

impl FeedbackSync {
    /// Create with an empty ledger
    #[must_use]
    pub fn new(api: Arc<dyn DeskApi>) -> Self {
        Self {
            api,
            state: Arc::new(Mutex::new(LedgerState::default())),
        }
    }

    /// Replace the ledger and forget saves still in flight
    pub fn reset(&self, ledger: FeedbackLedger) {
        let mut state = self.state.lock();
        state.epoch += 1;
        state.ledger = ledger;
    }

    /// Last persisted feedback for a phase
    #[must_use]
    pub fn last_persisted(&self, kind: PhaseKind) -> Option<String> {
        self.state.lock().ledger.last(kind).map(str::to_string)
    }

    /// Save feedback for one phase
    ///
    /// Text identical to the last persisted value short-circuits without a
    /// request.
    ///
    /// # Errors
    /// API failure of the write.
    pub async fn save_feedback(
        &self,
        desk_id: &DeskId,
        kind: PhaseKind,
        text: &str,
    ) -> Result<FeedbackOutcome, SyncError> {
        let epoch = {
            let state = self.state.lock();
            if state.ledger.is_unchanged(kind, text) {
                tracing::info!(%desk_id, phase = %kind, "feedback unchanged, not saving");
                return Ok(FeedbackOutcome::Unchanged);
            }
            state.epoch
        };

        self.api.patch_feedback(desk_id, kind, text).await?;
        tracing::info!(%desk_id, phase = %kind, "feedback saved");

        let mut state = self.state.lock();
        if state.epoch == epoch {
            state.ledger.record(kind, text);
        } else {
            tracing::debug!(%desk_id, phase = %kind, "ledger replaced during save");
        }
        Ok(FeedbackOutcome::Saved)
    }

    /// Fetch the full desk after a completion
    ///
    /// # Errors
    /// API failure of the fetch.
    pub async fn refetch_after_success(&self, desk_id: &DeskId) -> Result<Desk, SyncError> {
        tracing::info!(%desk_id, "refetching desk");
        let epoch = self.state.lock().epoch;
        let desk = self.api.get_desk(desk_id).await?;
        let mut state = self.state.lock();
        if state.epoch == epoch {
            state.ledger = FeedbackLedger::from_desk(&desk);
        }
        Ok(desk)
    }
}

impl std::fmt::Debug for FeedbackSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackSync")
            .field("epoch", &self.state.lock().epoch)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockDeskApi;
    use desk_core::{GenerationStatus, PhaseRecord};

    fn desk_with_outline(feedback: &str) -> Desk {
        Desk {
            id: DeskId::new("d1"),
            created_at: None,
            updated_at: None,
            topic: "Rust".to_string(),
            context: String::new(),
            platform: None,
            content_type: None,
            content_id: None,
            status: GenerationStatus::initial(),
            ideation: None,
            outline: Some(PhaseRecord {
                feedback: feedback.to_string(),
                ..PhaseRecord::default()
            }),
            content: None,
        }
    }

    #[tokio::test]
    async fn unchanged_feedback_sends_nothing() {
        let mut api = MockDeskApi::new();
        api.expect_patch_feedback().never();

        let sync = FeedbackSync::new(Arc::new(api));
        sync.reset(FeedbackLedger::from_desk(&desk_with_outline("same text as before")));

        let outcome = sync
            .save_feedback(&DeskId::new("d1"), PhaseKind::Outline, "same text as before")
            .await
            .unwrap();
        assert_eq!(outcome, FeedbackOutcome::Unchanged);
    }

    #[tokio::test]
    async fn empty_feedback_for_missing_record_is_unchanged() {
        let mut api = MockDeskApi::new();
        api.expect_patch_feedback().never();

        let sync = FeedbackSync::new(Arc::new(api));
        let outcome = sync
            .save_feedback(&DeskId::new("d1"), PhaseKind::Content, "")
            .await
            .unwrap();
        assert_eq!(outcome, FeedbackOutcome::Unchanged);
    }

    #[tokio::test]
    async fn changed_feedback_is_saved_once() {
        let mut api = MockDeskApi::new();
        api.expect_patch_feedback()
            .withf(|id, kind, text| {
                id.as_str().contains("d1") && *kind == PhaseKind::Outline && text.contains("tighter")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let sync = FeedbackSync::new(Arc::new(api));
        sync.reset(FeedbackLedger::from_desk(&desk_with_outline("old")));

        let id = DeskId::new("d1");
        let first = sync
            .save_feedback(&id, PhaseKind::Outline, "make it tighter")
            .await
            .unwrap();
        let second = sync
            .save_feedback(&id, PhaseKind::Outline, "make it tighter")
            .await
            .unwrap();
        assert_eq!(first, FeedbackOutcome::Saved);
        assert_eq!(second, FeedbackOutcome::Unchanged);
        assert_eq!(
            sync.last_persisted(PhaseKind::Outline).as_deref(),
            Some("make it tighter")
        );
    }

    #[tokio::test]
    async fn failed_save_leaves_ledger_alone() {
        let mut api = MockDeskApi::new();
        api.expect_patch_feedback().times(1).returning(|_, _, _| {
            Err(SyncError::RequestRejected {
                status: 404,
                message: "Content Desk not found".to_string(),
            })
        });

        let sync = FeedbackSync::new(Arc::new(api));
        let err = sync
            .save_feedback(&DeskId::new("d1"), PhaseKind::Ideation, "new")
            .await
            .unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(sync.last_persisted(PhaseKind::Ideation), None);
    }

    #[tokio::test]
    async fn refetch_replaces_ledger() {
        let mut api = MockDeskApi::new();
        api.expect_get_desk()
            .times(1)
            .returning(|_| Ok(desk_with_outline("from server")));

        let sync = FeedbackSync::new(Arc::new(api));
        let desk = sync.refetch_after_success(&DeskId::new("d1")).await.unwrap();
        assert_eq!(desk.topic, "Rust");
        assert_eq!(
            sync.last_persisted(PhaseKind::Outline).as_deref(),
            Some("from server")
        );
    }
}
