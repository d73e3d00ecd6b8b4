//! Run orchestrator
//!
//! Thin command boundary in front of the run endpoints. An accepted start
//! only means the worker took the request; completion is observed through
//! the status channel. Rejections come back verbatim and local status is
//! never touched here.

use crate::api::DeskApi;
use crate::error::SyncError;
use desk_core::{DeskId, RunAck, RunTarget};
use std::sync::Arc;

/// Issues run start commands
#[derive(Clone)]
pub struct RunOrchestrator {
    api: Arc<dyn DeskApi>,
}

impl RunOrchestrator {
    /// Create an orchestrator over an API
    #[inline]
    #[must_use]
    pub fn new(api: Arc<dyn DeskApi>) -> Self {
        Self { api }
    }

    /// Start a run
    ///
    /// Does no validation of its own; callers gate `Full` runs.
    ///
    /// # Errors
    /// Whatever the API returns, unchanged.
    pub async fn start(&self, desk_id: &DeskId, target: RunTarget) -> Result<RunAck, SyncError> {
        tracing::info!(%desk_id, %target, "starting run");
        match self.api.start_run(desk_id, target).await {
            Ok(ack) => {
                tracing::info!(%desk_id, %target, message = %ack.message, "run accepted");
                Ok(ack)
            }
            Err(error) => {
                tracing::warn!(%desk_id, %target, %error, "run not started");
                Err(error)
            }
        }
    }
}

impl std::fmt::Debug for RunOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOrchestrator").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockDeskApi;
    use desk_core::PhaseKind;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn accepted_start_returns_server_message() {
        let mut api = MockDeskApi::new();
        api.expect_start_run()
            .with(eq(DeskId::new("d1")), eq(RunTarget::Phase(PhaseKind::Outline)))
            .times(1)
            .returning(|_, _| {
                Ok(RunAck {
                    message: "Outline generation started".to_string(),
                })
            });

        let ack = RunOrchestrator::new(Arc::new(api))
            .start(&DeskId::new("d1"), RunTarget::Phase(PhaseKind::Outline))
            .await
            .unwrap();
        assert_eq!(ack.message, "Outline generation started");
    }

    #[tokio::test]
    async fn rejection_is_surfaced_verbatim() {
        let mut api = MockDeskApi::new();
        api.expect_start_run().times(1).returning(|_, _| {
            Err(SyncError::RequestRejected {
                status: 400,
                message: "Platform and content type must be set".to_string(),
            })
        });

        let err = RunOrchestrator::new(Arc::new(api))
            .start(&DeskId::new("d1"), RunTarget::Full)
            .await
            .unwrap_err();
        match err {
            SyncError::RequestRejected { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Platform and content type must be set");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
