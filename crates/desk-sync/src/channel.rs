//! Status channel client
//!
//! One live server-sent-events connection per desk. The client is transport
//! only: it decodes frames, turns them into [`ChannelEvent`]s and never
//! reconnects on its own. Callers re-open on desk change or explicit retry.
//!
//! Failure classification:
//! - Connect or read error: `Transient`, then delivery stops
//! - Non-success response or clean end of stream: `ConnectionClosed`
//! - Undecodable `status_update`: `MalformedPayload`, delivery continues

use crate::api::{rejection_message, HttpDeskApi};
use crate::sse::{SseDecoder, SseFrame};
use desk_core::{
    describe_error_payload, parse_status_payload, ChannelError, ChannelErrorKind, ChannelEvent,
    DeskId, ERROR_EVENT, STATUS_EVENT,
};
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};

/// Buffered events per channel before the relay waits on the consumer
const CHANNEL_CAPACITY: usize = 64;

/// Opens status channels
pub trait StatusSource: Send + Sync {
    /// Open a channel for a desk
    ///
    /// Must be called from within a tokio runtime.
    fn open(&self, desk_id: &DeskId) -> ChannelHandle;

    /// Open a channel only when there is a desk to watch
    fn open_if(&self, desk_id: Option<&DeskId>) -> Option<ChannelHandle> {
        desk_id.map(|id| self.open(id))
    }
}

/// Handle to one open status channel
///
/// Closing or dropping the handle stops delivery for good.
#[derive(Debug)]
pub struct ChannelHandle {
    desk_id: DeskId,
    events: mpsc::Receiver<ChannelEvent>,
    task: Option<JoinHandle<()>>,
}

impl ChannelHandle {
    /// Handle over a receiver fed by `task`
    #[must_use]
    pub fn new(
        desk_id: DeskId,
        events: mpsc::Receiver<ChannelEvent>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            desk_id,
            events,
            task,
        }
    }

    /// Desk this channel watches
    #[inline]
    #[must_use]
    pub fn desk_id(&self) -> &DeskId {
        &self.desk_id
    }

    /// Next event, `None` once the channel is finished
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// Abort handle of the delivery task
    #[must_use]
    pub fn abort_handle(&self) -> Option<AbortHandle> {
        self.task.as_ref().map(JoinHandle::abort_handle)
    }

    /// Close the channel
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!(desk_id = %self.desk_id, "status channel closed");
        }
        self.events.close();
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Status channel over the desk SSE endpoint
#[derive(Debug, Clone)]
pub struct SseStatusChannel {
    api: HttpDeskApi,
}

impl SseStatusChannel {
    /// Create a channel source sharing the API client's connection pool and auth
    #[inline]
    #[must_use]
    pub fn new(api: HttpDeskApi) -> Self {
        Self { api }
    }

    fn stream_request(&self, desk_id: &DeskId) -> RequestBuilder {
        self.api
            .untimed(Method::GET, &format!("/sse/{desk_id}/stream"))
            .header(ACCEPT, "text/event-stream")
    }
}

impl StatusSource for SseStatusChannel {
    fn open(&self, desk_id: &DeskId) -> ChannelHandle {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(relay(desk_id.clone(), self.stream_request(desk_id), tx));
        ChannelHandle::new(desk_id.clone(), rx, Some(task))
    }
}

async fn relay(desk_id: DeskId, request: RequestBuilder, tx: mpsc::Sender<ChannelEvent>) {
    tracing::info!(%desk_id, "status channel opening");

    let response = match request.send().await {
        Ok(response) => response,
        Err(error) => {
            tracing::warn!(%desk_id, %error, "status stream request failed");
            emit_error(
                &tx,
                ChannelErrorKind::Transient,
                format!("stream request failed: {error}"),
            )
            .await;
            return;
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = rejection_message(&body).unwrap_or_default();
        tracing::warn!(%desk_id, status = status.as_u16(), %detail, "status stream refused");
        emit_error(
            &tx,
            ChannelErrorKind::ConnectionClosed,
            format!("stream refused with status {status}: {detail}"),
        )
        .await;
        return;
    }

    let mut decoder = SseDecoder::new();
    let mut bytes = response.bytes_stream();
    while let Some(chunk) = bytes.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(error) => {
                tracing::warn!(%desk_id, %error, "status stream read failed");
                emit_error(
                    &tx,
                    ChannelErrorKind::Transient,
                    format!("stream read failed: {error}"),
                )
                .await;
                return;
            }
        };

        for frame in decoder.push(&chunk) {
            let Some(event) = route_frame(&desk_id, &frame) else {
                continue;
            };
            if tx.send(event).await.is_err() {
                tracing::debug!(%desk_id, "status channel receiver gone");
                return;
            }
        }
    }

    if decoder.has_pending() {
        tracing::debug!(%desk_id, "discarding unterminated frame");
    }
    tracing::warn!(%desk_id, "status stream ended by server");
    emit_error(
        &tx,
        ChannelErrorKind::ConnectionClosed,
        "stream ended by server".to_string(),
    )
    .await;
}

/// Map a decoded frame onto a channel event
pub(crate) fn route_frame(desk_id: &DeskId, frame: &SseFrame) -> Option<ChannelEvent> {
    match frame.event_name() {
        STATUS_EVENT => Some(match parse_status_payload(&frame.data) {
            Ok(status) => {
                tracing::debug!(%desk_id, %status, "status pushed");
                ChannelEvent::StatusUpdate(status)
            }
            Err(error) => {
                tracing::warn!(%desk_id, %error, "malformed status payload");
                ChannelEvent::Error(error)
            }
        }),
        ERROR_EVENT => {
            let detail = describe_error_payload(&frame.data);
            tracing::warn!(%desk_id, %detail, "server reported stream error");
            Some(ChannelEvent::Error(ChannelError::new(
                ChannelErrorKind::Transient,
                detail,
            )))
        }
        other => {
            tracing::debug!(%desk_id, event = other, "ignoring unknown stream event");
            None
        }
    }
}

async fn emit_error(tx: &mpsc::Sender<ChannelEvent>, kind: ChannelErrorKind, detail: String) {
    // The receiver may already be gone; nothing left to tell.
    let _ = tx
        .send(ChannelEvent::Error(ChannelError::new(kind, detail)))
        .await;
}
