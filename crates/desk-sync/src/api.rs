//! Desk REST API
//!
//! [`DeskApi`] is the request/response seam the rest of the crate talks to;
//! [`HttpDeskApi`] implements it over reqwest. Every call makes exactly one
//! attempt. Non-success responses become `RequestRejected` carrying the
//! server's `detail` verbatim.

use crate::config::SyncConfig;
use crate::error::SyncError;
use async_trait::async_trait;
use desk_core::{
    Desk, DeskId, GenerationStatus, PhaseKind, ReviewPost, RunAck, RunTarget, SettingsCatalog,
    SettingsPatch, TopicId,
};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Desk API operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeskApi: Send + Sync {
    /// `GET /desk/{id}`
    async fn get_desk(&self, desk_id: &DeskId) -> Result<Desk, SyncError>;

    /// `GET /desk/{id}/status`
    async fn get_status(&self, desk_id: &DeskId) -> Result<GenerationStatus, SyncError>;

    /// `PATCH /desk/{id}` with platform and/or content type
    async fn patch_settings(&self, desk_id: &DeskId, patch: &SettingsPatch)
        -> Result<(), SyncError>;

    /// `PATCH /desk/{id}/{phase}` with feedback
    async fn patch_feedback(
        &self,
        desk_id: &DeskId,
        kind: PhaseKind,
        feedback: &str,
    ) -> Result<(), SyncError>;

    /// `POST /desk/{id}/run[/{phase}]`
    async fn start_run(&self, desk_id: &DeskId, target: RunTarget) -> Result<RunAck, SyncError>;

    /// `POST /desk/topic/{topic}/content/add`
    async fn promote_to_review(&self, topic_id: &TopicId) -> Result<ReviewPost, SyncError>;

    /// `GET /config/platforms` and `GET /config/content-types`
    async fn settings_catalog(&self) -> Result<SettingsCatalog, SyncError>;
}

/// Desk API over HTTP
#[derive(Debug, Clone)]
pub struct HttpDeskApi {
    client: reqwest::Client,
    root: String,
    token: Option<String>,
    timeout: Duration,
}

impl HttpDeskApi {
    /// Create a client from configuration
    ///
    /// # Errors
    /// Invalid configuration or HTTP client construction failure.
    pub fn new(config: &SyncConfig) -> Result<Self, SyncError> {
        config.validate()?;
        // No client-wide timeout: the status stream is open indefinitely.
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(SyncError::Transport)?;
        Ok(Self {
            client,
            root: config.api_root().to_string(),
            token: config.api_token.clone(),
            timeout: config.request_timeout(),
        })
    }

    /// Absolute URL of an API path
    #[inline]
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.root)
    }

    /// Request builder with auth applied and no timeout
    pub(crate) fn untimed(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.untimed(method, path).timeout(self.timeout)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, SyncError> {
        let response = ensure_success(request.send().await?).await?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| SyncError::Decode(e.to_string()))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<(), SyncError> {
        ensure_success(request.send().await?).await.map(drop)
    }
}

#[async_trait]
impl DeskApi for HttpDeskApi {
    async fn get_desk(&self, desk_id: &DeskId) -> Result<Desk, SyncError> {
        self.fetch(self.request(Method::GET, &format!("/desk/{desk_id}")))
            .await
    }

    async fn get_status(&self, desk_id: &DeskId) -> Result<GenerationStatus, SyncError> {
        self.fetch(self.request(Method::GET, &format!("/desk/{desk_id}/status")))
            .await
    }

    async fn patch_settings(
        &self,
        desk_id: &DeskId,
        patch: &SettingsPatch,
    ) -> Result<(), SyncError> {
        self.execute(
            self.request(Method::PATCH, &format!("/desk/{desk_id}"))
                .json(patch),
        )
        .await
    }

    async fn patch_feedback(
        &self,
        desk_id: &DeskId,
        kind: PhaseKind,
        feedback: &str,
    ) -> Result<(), SyncError> {
        self.execute(
            self.request(Method::PATCH, &format!("/desk/{desk_id}/{kind}"))
                .json(&serde_json::json!({ "feedback": feedback })),
        )
        .await
    }

    async fn start_run(&self, desk_id: &DeskId, target: RunTarget) -> Result<RunAck, SyncError> {
        let path = match target.path_segment() {
            Some(segment) => format!("/desk/{desk_id}/run/{segment}"),
            None => format!("/desk/{desk_id}/run"),
        };
        self.fetch(self.request(Method::POST, &path)).await
    }

    async fn promote_to_review(&self, topic_id: &TopicId) -> Result<ReviewPost, SyncError> {
        self.fetch(self.request(
            Method::POST,
            &format!("/desk/topic/{topic_id}/content/add"),
        ))
        .await
    }

    async fn settings_catalog(&self) -> Result<SettingsCatalog, SyncError> {
        let platforms: Vec<String> = self
            .fetch(self.request(Method::GET, "/config/platforms"))
            .await?;
        let content_types: Vec<String> = self
            .fetch(self.request(Method::GET, "/config/content-types"))
            .await?;
        Ok(SettingsCatalog::new(platforms, content_types))
    }
}

async fn ensure_success(response: Response) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = rejection_message(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    tracing::warn!(status = status.as_u16(), %message, "request rejected");
    Err(SyncError::RequestRejected {
        status: status.as_u16(),
        message,
    })
}

/// Server message out of an error body
///
/// FastAPI sends `{"detail": "..."}`; validation errors put a list there.
pub(crate) fn rejection_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Object(map)) => match map.get("detail") {
            Some(serde_json::Value::String(detail)) => Some(detail.clone()),
            Some(other) => Some(other.to_string()),
            None => Some(trimmed.to_string()),
        },
        _ => Some(trimmed.to_string()),
    }
}
