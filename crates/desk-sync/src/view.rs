//! Mounted desk view
//!
//! Ties the API, the status channel and the reconciler together for one
//! desk at a time. A background loop feeds pushed and polled status into the
//! reconciler; commands run on the caller's task. All writes go through one
//! critical section and are tagged with the mount generation they belong to,
//! so results arriving after a remount are dropped.
//!
//! Readers either ask for a snapshot ([`DeskView::status`], [`DeskView::desk`])
//! or subscribe: status changes on a `watch` channel, everything else as
//! [`ViewNotice`]s on a broadcast channel.

use crate::api::{DeskApi, HttpDeskApi};
use crate::channel::{ChannelHandle, SseStatusChannel, StatusSource};
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::feedback::{FeedbackOutcome, FeedbackSync};
use crate::orchestrator::RunOrchestrator;
use desk_core::{
    derive_ui_state, ensure_can_start, ensure_full_run_ready, ensure_settings_allowed, indicator,
    ChannelError, ChannelEvent, Desk, DeskId, FeedbackLedger, GateError, GenerationStatus, Phase,
    PhaseIndicator, PhaseKind, PhaseRecord, PhaseUiState, Reconciled, Reconciler, ReviewPost,
    RunAck, RunTarget, SettingsCatalog, SettingsPatch, TopicId,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Out-of-band events of a mounted view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewNotice {
    /// Status channel fault, soft or terminal
    ChannelError(ChannelError),
    /// Status channel finished; polling continues when enabled
    ChannelEnded,
    /// A watched phase transitioned into success
    Completed(Phase),
    /// Local desk replaced by the server's copy
    Refetched,
    /// Refetch after a completion failed
    RefetchFailed(String),
    /// Background status poll failed
    PollFailed(String),
    /// Feedback save skipped, nothing changed
    FeedbackUnchanged(PhaseKind),
}

#[derive(Debug)]
struct ViewState {
    generation: u64,
    desk_id: Option<DeskId>,
    desk: Option<Desk>,
    reconciler: Reconciler,
    catalog: Option<SettingsCatalog>,
}

struct Shared {
    state: Mutex<ViewState>,
    status_tx: watch::Sender<GenerationStatus>,
    notice_tx: broadcast::Sender<ViewNotice>,
}

impl Shared {
    /// Run `mutate` if `generation` is still mounted, then publish status
    fn apply<R>(&self, generation: u64, mutate: impl FnOnce(&mut ViewState) -> R) -> Option<R> {
        let mut state = self.state.lock();
        if state.generation != generation {
            tracing::debug!(
                generation,
                current = state.generation,
                "dropping result of superseded mount"
            );
            return None;
        }
        let out = mutate(&mut state);
        let current = state.reconciler.current();
        self.status_tx.send_if_modified(|published| {
            if *published == *current {
                false
            } else {
                current.clone_into(published);
                true
            }
        });
        Some(out)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.lock().generation == generation
    }

    fn notify(&self, notice: ViewNotice) {
        // Nobody listening is fine.
        let _ = self.notice_tx.send(notice);
    }
}

/// Everything a background step needs to act for one mount
#[derive(Clone)]
struct MountCtx {
    shared: Arc<Shared>,
    api: Arc<dyn DeskApi>,
    feedback: FeedbackSync,
    desk_id: DeskId,
    generation: u64,
}

impl MountCtx {
    async fn settle(&self, reconciled: Reconciled) {
        if let Some(phase) = reconciled.completed {
            tracing::info!(desk_id = %self.desk_id, %phase, "phase completed");
            self.shared.notify(ViewNotice::Completed(phase));
            self.refetch_reporting().await;
        }
    }

    /// Replace the local desk with the server's; `None` when superseded
    async fn refetch(&self) -> Result<Option<Desk>, SyncError> {
        let desk = self.feedback.refetch_after_success(&self.desk_id).await?;
        let applied = self.shared.apply(self.generation, |state| {
            state.desk = Some(desk.clone());
        });
        if applied.is_none() {
            return Ok(None);
        }
        tracing::info!(desk_id = %self.desk_id, "desk refetched");
        self.shared.notify(ViewNotice::Refetched);
        Ok(Some(desk))
    }

    async fn refetch_reporting(&self) {
        if let Err(error) = self.refetch().await {
            tracing::warn!(desk_id = %self.desk_id, %error, "refetch failed");
            if self.shared.is_current(self.generation) {
                self.shared
                    .notify(ViewNotice::RefetchFailed(error.to_string()));
            }
        }
    }

    async fn poll(&self) -> Result<(), SyncError> {
        let status = self.api.get_status(&self.desk_id).await?;
        let reconciled = self
            .shared
            .apply(self.generation, |state| state.reconciler.on_poll(status));
        if let Some(reconciled) = reconciled {
            self.settle(reconciled).await;
        }
        Ok(())
    }

    /// Handle one channel event; `false` once the channel has ended
    async fn on_channel_event(&self, event: ChannelEvent) -> bool {
        match event {
            ChannelEvent::StatusUpdate(status) => {
                let reconciled = self
                    .shared
                    .apply(self.generation, |state| state.reconciler.on_push(status));
                if let Some(reconciled) = reconciled {
                    self.settle(reconciled).await;
                }
                true
            }
            ChannelEvent::Error(error) => {
                let terminal = error.is_terminal();
                if terminal {
                    self.shared.apply(self.generation, |state| {
                        state.reconciler.on_connection_lost()
                    });
                }
                if self.shared.is_current(self.generation) {
                    self.shared.notify(ViewNotice::ChannelError(error));
                }
                !terminal
            }
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn run_loop(ctx: MountCtx, mut channel: ChannelHandle, poll_interval: Option<Duration>) {
    let mut ticker = poll_interval.map(|period| {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });
    let mut channel_open = true;
    tracing::debug!(desk_id = %ctx.desk_id, generation = ctx.generation, "view loop started");

    loop {
        tokio::select! {
            event = channel.next_event(), if channel_open => {
                channel_open = match event {
                    Some(event) => ctx.on_channel_event(event).await,
                    None => false,
                };
                if !channel_open {
                    tracing::info!(desk_id = %ctx.desk_id, "status channel ended");
                    if ctx.shared.is_current(ctx.generation) {
                        ctx.shared.notify(ViewNotice::ChannelEnded);
                    }
                }
            }
            () = next_tick(&mut ticker) => {
                if let Err(error) = ctx.poll().await {
                    tracing::warn!(desk_id = %ctx.desk_id, %error, "status poll failed");
                    if ctx.shared.is_current(ctx.generation) {
                        ctx.shared.notify(ViewNotice::PollFailed(error.to_string()));
                    }
                }
            }
        }

        if !ctx.shared.is_current(ctx.generation) {
            break;
        }
        if !channel_open && ticker.is_none() {
            tracing::debug!(desk_id = %ctx.desk_id, "nothing left to watch");
            break;
        }
    }
}

struct Mounted {
    pump: JoinHandle<()>,
    channel: Option<AbortHandle>,
}

impl Mounted {
    fn abort(self) {
        self.pump.abort();
        if let Some(channel) = self.channel {
            channel.abort();
        }
    }
}

/// Live view of one desk
pub struct DeskView {
    api: Arc<dyn DeskApi>,
    source: Arc<dyn StatusSource>,
    orchestrator: RunOrchestrator,
    feedback: FeedbackSync,
    shared: Arc<Shared>,
    poll_interval: Option<Duration>,
    mounted: Option<Mounted>,
}

impl DeskView {
    /// Create an unmounted view
    #[must_use]
    pub fn new(api: Arc<dyn DeskApi>, source: Arc<dyn StatusSource>, config: &SyncConfig) -> Self {
        let (status_tx, _) = watch::channel(GenerationStatus::initial());
        let (notice_tx, _) = broadcast::channel(config.notice_capacity.max(1));
        let state = ViewState {
            generation: 0,
            desk_id: None,
            desk: None,
            reconciler: Reconciler::with_completion_phases(
                config.refetch_on_success.iter().copied(),
            ),
            catalog: None,
        };
        Self {
            orchestrator: RunOrchestrator::new(Arc::clone(&api)),
            feedback: FeedbackSync::new(Arc::clone(&api)),
            api,
            source,
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                status_tx,
                notice_tx,
            }),
            poll_interval: config.poll_interval(),
            mounted: None,
        }
    }

    /// Create a view talking HTTP and SSE to the configured server
    ///
    /// # Errors
    /// Invalid configuration.
    pub fn connect(config: &SyncConfig) -> Result<Self, SyncError> {
        let api = HttpDeskApi::new(config)?;
        let source = SseStatusChannel::new(api.clone());
        Ok(Self::new(Arc::new(api), Arc::new(source), config))
    }

    /// Mount a desk, replacing whatever was mounted
    ///
    /// `None` leaves the view unmounted with no channel open.
    ///
    /// # Errors
    /// Failure of the initial desk or status fetch; the view stays unmounted.
    pub async fn mount(&mut self, desk_id: Option<DeskId>) -> Result<(), SyncError> {
        let generation = self.teardown();
        let Some(desk_id) = desk_id else {
            tracing::debug!(generation, "nothing to mount");
            return Ok(());
        };
        tracing::info!(%desk_id, generation, "mounting desk");

        let ctx = MountCtx {
            shared: Arc::clone(&self.shared),
            api: Arc::clone(&self.api),
            feedback: self.feedback.clone(),
            desk_id: desk_id.clone(),
            generation,
        };
        let reconciled = match self.load(&ctx).await {
            Ok(reconciled) => reconciled,
            Err(error) => {
                tracing::warn!(%desk_id, %error, "mount failed");
                self.teardown();
                return Err(error);
            }
        };

        let channel = self.source.open(&desk_id);
        let channel_abort = channel.abort_handle();
        let pump = tokio::spawn(run_loop(ctx.clone(), channel, self.poll_interval));
        self.mounted = Some(Mounted {
            pump,
            channel: channel_abort,
        });

        ctx.settle(reconciled).await;
        Ok(())
    }

    async fn load(&self, ctx: &MountCtx) -> Result<Reconciled, SyncError> {
        let desk = self.api.get_desk(&ctx.desk_id).await?;
        let status = self.api.get_status(&ctx.desk_id).await?;
        self.feedback.reset(FeedbackLedger::from_desk(&desk));
        self.shared
            .apply(ctx.generation, |state| {
                state.desk_id = Some(ctx.desk_id.clone());
                state.reconciler.seed(desk.status.clone());
                state.desk = Some(desk);
                state.reconciler.on_poll(status)
            })
            .ok_or(SyncError::NotMounted)
    }

    /// Unmount, closing the channel and dropping late results
    pub fn unmount(&mut self) {
        let generation = self.teardown();
        tracing::info!(generation, "desk unmounted");
    }

    fn teardown(&mut self) -> u64 {
        if let Some(mounted) = self.mounted.take() {
            mounted.abort();
        }
        self.feedback.reset(FeedbackLedger::new());
        let mut state = self.shared.state.lock();
        state.generation += 1;
        state.desk_id = None;
        state.desk = None;
        state.catalog = None;
        state.reconciler.reset();
        self.shared
            .status_tx
            .send_replace(state.reconciler.current().clone());
        state.generation
    }

    fn mount_ctx(&self) -> Result<MountCtx, SyncError> {
        let state = self.shared.state.lock();
        let desk_id = state.desk_id.clone().ok_or(SyncError::NotMounted)?;
        Ok(MountCtx {
            shared: Arc::clone(&self.shared),
            api: Arc::clone(&self.api),
            feedback: self.feedback.clone(),
            desk_id,
            generation: state.generation,
        })
    }

    /// Start a run after the caller-side gate
    ///
    /// Nothing is sent while a phase is processing. `Full` additionally
    /// needs platform and content type set to catalog values.
    ///
    /// # Errors
    /// `ValidationFailed` from the gate, otherwise the server's rejection.
    pub async fn start(&self, target: RunTarget) -> Result<RunAck, SyncError> {
        let ctx = self.mount_ctx()?;
        let (status, desk) = {
            let state = self.shared.state.lock();
            (state.reconciler.current().clone(), state.desk.clone())
        };

        if let Err(error) = ensure_can_start(&status) {
            tracing::warn!(desk_id = %ctx.desk_id, %target, %error, "run blocked");
            return Err(error.into());
        }
        if target == RunTarget::Full {
            let desk = desk.ok_or(SyncError::NotMounted)?;
            let catalog = self.catalog().await?;
            if let Err(error) = ensure_full_run_ready(&desk, &catalog) {
                tracing::warn!(desk_id = %ctx.desk_id, %target, %error, "run blocked");
                return Err(error.into());
            }
        }

        self.orchestrator.start(&ctx.desk_id, target).await
    }

    /// Settings allow-lists, fetched once per mount
    ///
    /// # Errors
    /// `NotMounted`, or failure of the catalog fetch.
    pub async fn catalog(&self) -> Result<SettingsCatalog, SyncError> {
        let ctx = self.mount_ctx()?;
        let cached = self.shared.state.lock().catalog.clone();
        if let Some(catalog) = cached {
            return Ok(catalog);
        }
        let catalog = self.api.settings_catalog().await?;
        self.shared.apply(ctx.generation, |state| {
            state.catalog = Some(catalog.clone());
        });
        Ok(catalog)
    }

    /// Save feedback for one phase
    ///
    /// Unchanged text sends nothing and raises
    /// [`ViewNotice::FeedbackUnchanged`].
    ///
    /// # Errors
    /// `NotMounted`, or the server's rejection of the write.
    pub async fn save_feedback(
        &self,
        kind: PhaseKind,
        text: &str,
    ) -> Result<FeedbackOutcome, SyncError> {
        let ctx = self.mount_ctx()?;
        let outcome = self
            .feedback
            .save_feedback(&ctx.desk_id, kind, text)
            .await?;
        match outcome {
            FeedbackOutcome::Unchanged => {
                self.shared.notify(ViewNotice::FeedbackUnchanged(kind));
            }
            FeedbackOutcome::Saved => {
                self.shared.apply(ctx.generation, |state| {
                    if let Some(desk) = state.desk.as_mut() {
                        record_mut(desk, kind).feedback = text.to_string();
                    }
                });
            }
        }
        Ok(outcome)
    }

    /// Patch platform and/or content type, then refetch the desk
    ///
    /// # Errors
    /// `ValidationFailed` for an empty patch or values outside the catalog,
    /// otherwise the server's rejection.
    pub async fn update_settings(&self, patch: &SettingsPatch) -> Result<Desk, SyncError> {
        let ctx = self.mount_ctx()?;
        if patch.is_empty() {
            return Err(GateError::EmptyPatch.into());
        }
        let catalog = self.catalog().await?;
        ensure_settings_allowed(patch, &catalog)?;

        self.api.patch_settings(&ctx.desk_id, patch).await?;
        tracing::info!(desk_id = %ctx.desk_id, "settings updated");
        ctx.refetch().await?.ok_or(SyncError::NotMounted)
    }

    /// Promote a topic's content to review
    ///
    /// # Errors
    /// The server's rejection, e.g. no content generated yet.
    pub async fn promote(&self, topic_id: &TopicId) -> Result<ReviewPost, SyncError> {
        tracing::info!(%topic_id, "promoting to review");
        let post = self.api.promote_to_review(topic_id).await?;
        tracing::info!(%topic_id, post_id = ?post.id, "review post created");
        Ok(post)
    }

    /// Poll the status endpoint now
    ///
    /// # Errors
    /// `NotMounted`, or failure of the poll.
    pub async fn refresh_status(&self) -> Result<GenerationStatus, SyncError> {
        let ctx = self.mount_ctx()?;
        ctx.poll().await?;
        Ok(self.status())
    }

    /// Current reconciled status
    #[must_use]
    pub fn status(&self) -> GenerationStatus {
        self.shared.state.lock().reconciler.current().clone()
    }

    /// Local copy of the desk
    #[must_use]
    pub fn desk(&self) -> Option<Desk> {
        self.shared.state.lock().desk.clone()
    }

    /// Mounted desk
    #[must_use]
    pub fn desk_id(&self) -> Option<DeskId> {
        self.shared.state.lock().desk_id.clone()
    }

    /// Check if a desk is mounted
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.shared.state.lock().desk_id.is_some()
    }

    /// UI flags of one phase
    #[must_use]
    pub fn ui_state(&self, phase: Phase) -> PhaseUiState {
        derive_ui_state(self.shared.state.lock().reconciler.current(), phase)
    }

    /// Indicator of one phase
    #[must_use]
    pub fn indicator(&self, phase: Phase) -> PhaseIndicator {
        indicator(self.shared.state.lock().reconciler.current(), phase)
    }

    /// Status updates; drop the receiver to unsubscribe
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<GenerationStatus> {
        self.shared.status_tx.subscribe()
    }

    /// Notices; drop the receiver to unsubscribe
    #[must_use]
    pub fn notices(&self) -> broadcast::Receiver<ViewNotice> {
        self.shared.notice_tx.subscribe()
    }
}

impl Drop for DeskView {
    fn drop(&mut self) {
        if let Some(mounted) = self.mounted.take() {
            mounted.abort();
        }
    }
}

impl std::fmt::Debug for DeskView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("DeskView")
            .field("generation", &state.generation)
            .field("desk_id", &state.desk_id)
            .field("status", state.reconciler.current())
            .finish_non_exhaustive()
    }
}

fn record_mut(desk: &mut Desk, kind: PhaseKind) -> &mut PhaseRecord {
    let slot = match kind {
        PhaseKind::Ideation => &mut desk.ideation,
        PhaseKind::Outline => &mut desk.outline,
        PhaseKind::Content => &mut desk.content,
    };
    slot.get_or_insert_with(PhaseRecord::default)
}
