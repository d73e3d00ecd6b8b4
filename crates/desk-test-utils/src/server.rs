//! In-process mock of the desk API
//!
//! Serves every desk endpoint from memory, streams status over SSE and
//! records each request so tests can assert on what was (and was not) sent.

use crate::fixtures::{processing, record_mut};
use desk_core::{Desk, GenerationStatus, PhaseKind, RunTarget, SettingsCatalog};
use futures::{stream, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::sse::Event;
use warp::{Filter, Reply};

/// Endpoint group a forced rejection applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Desk,
    Status,
    Settings,
    Feedback,
    Run,
    Promote,
    Catalog,
    Stream,
}

/// One request as the server saw it
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
    pub authorization: Option<String>,
}

#[derive(Debug, Clone)]
enum Frame {
    Event { name: String, data: String },
    Close,
}

#[derive(Default)]
struct State {
    desks: Mutex<HashMap<String, Desk>>,
    catalog: Mutex<SettingsCatalog>,
    streams: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Frame>>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    rejections: Mutex<HashMap<Route, (u16, String)>>,
}

impl State {
    fn record(&self, method: &'static str, path: String, body: Option<Value>, auth: Option<String>) {
        self.requests.lock().push(RecordedRequest {
            method,
            path,
            body,
            authorization: auth,
        });
    }

    fn rejection(&self, route: Route) -> Option<Response> {
        self.rejections
            .lock()
            .get(&route)
            .map(|(status, message)| detail(*status, message))
    }

    fn broadcast(&self, desk_id: &str, frame: &Frame) {
        if let Some(senders) = self.streams.lock().get_mut(desk_id) {
            senders.retain(|tx| tx.send(frame.clone()).is_ok());
        }
    }

    fn push_status(&self, desk_id: &str, status: &GenerationStatus) {
        self.broadcast(desk_id, &status_frame(status));
    }

    fn with_desk<R>(&self, desk_id: &str, f: impl FnOnce(&mut Desk) -> R) -> Option<R> {
        self.desks.lock().get_mut(desk_id).map(f)
    }

    fn get_desk(&self, id: &str) -> Response {
        if let Some(rejected) = self.rejection(Route::Desk) {
            return rejected;
        }
        match self.with_desk(id, |desk| desk.clone()) {
            Some(desk) => warp::reply::json(&desk).into_response(),
            None => not_found(),
        }
    }

    fn get_status(&self, id: &str) -> Response {
        if let Some(rejected) = self.rejection(Route::Status) {
            return rejected;
        }
        match self.with_desk(id, |desk| desk.status.clone()) {
            Some(status) => warp::reply::json(&status).into_response(),
            None => not_found(),
        }
    }

    fn patch_settings(&self, id: &str, body: &Value) -> Response {
        if let Some(rejected) = self.rejection(Route::Settings) {
            return rejected;
        }
        let updated = self.with_desk(id, |desk| {
            if let Some(platform) = body.get("platform").and_then(Value::as_str) {
                desk.platform = Some(platform.to_string());
            }
            if let Some(content_type) = body.get("content_type").and_then(Value::as_str) {
                desk.content_type = Some(content_type.to_string());
            }
            desk.clone()
        });
        match updated {
            Some(desk) => warp::reply::json(&desk).into_response(),
            None => not_found(),
        }
    }

    fn patch_feedback(&self, id: &str, phase: &str, body: &Value) -> Response {
        if let Some(rejected) = self.rejection(Route::Feedback) {
            return rejected;
        }
        let Ok(kind) = phase.parse::<PhaseKind>() else {
            return detail(404, "Not Found");
        };
        let Some(feedback) = body.get("feedback").and_then(Value::as_str) else {
            return detail(422, "feedback is required");
        };
        let updated = self.with_desk(id, |desk| {
            record_mut(desk, kind).feedback = feedback.to_string();
            desk.clone()
        });
        match updated {
            Some(desk) => warp::reply::json(&desk).into_response(),
            None => not_found(),
        }
    }

    fn start_run(&self, id: &str, target: Option<&str>) -> Response {
        if let Some(rejected) = self.rejection(Route::Run) {
            return rejected;
        }
        let target = match target {
            None => RunTarget::Full,
            Some(segment) => match segment.parse::<PhaseKind>() {
                Ok(kind) => RunTarget::Phase(kind),
                Err(_) => return detail(404, "Not Found"),
            },
        };
        let started = self.with_desk(id, |desk| {
            if desk.status.is_processing() {
                return Err(detail(409, "A generation is already running for this desk"));
            }
            if target == RunTarget::Full && (desk.platform().is_none() || desk.content_type().is_none())
            {
                return Err(detail(400, "Platform and content type must be set"));
            }
            let first = match target {
                RunTarget::Phase(kind) => kind,
                RunTarget::Full => PhaseKind::Ideation,
            };
            desk.status = processing(first.phase());
            Ok(desk.status.clone())
        });
        match started {
            Some(Ok(status)) => {
                self.push_status(id, &status);
                let message = match target {
                    RunTarget::Phase(kind) => format!("{kind} generation started"),
                    RunTarget::Full => "Full generation started".to_string(),
                };
                warp::reply::json(&json!({ "message": message })).into_response()
            }
            Some(Err(rejected)) => rejected,
            None => not_found(),
        }
    }

    fn promote(&self, topic_id: &str) -> Response {
        if let Some(rejected) = self.rejection(Route::Promote) {
            return rejected;
        }
        let content = self.desks.lock().values().find_map(|desk| {
            desk.content
                .as_ref()
                .filter(|record| !record.result.is_empty())
                .map(|record| record.result.clone())
        });
        match content {
            Some(content) => warp::reply::with_status(
                warp::reply::json(&json!({
                    "_id": "post-1",
                    "topic_id": topic_id,
                    "status": "draft",
                    "content": content,
                    "platform": "linkedin",
                })),
                StatusCode::CREATED,
            )
            .into_response(),
            None => detail(409, "Run content generation first."),
        }
    }

    fn catalog(&self, platforms: bool) -> Response {
        if let Some(rejected) = self.rejection(Route::Catalog) {
            return rejected;
        }
        let catalog = self.catalog.lock();
        let values = if platforms {
            &catalog.platforms
        } else {
            &catalog.content_types
        };
        warp::reply::json(values).into_response()
    }

    fn stream(&self, id: &str) -> Response {
        if let Some(rejected) = self.rejection(Route::Stream) {
            return rejected;
        }
        let Some(initial) = self.with_desk(id, |desk| desk.status.clone()) else {
            return not_found();
        };

        let (tx, rx) = mpsc::unbounded_channel();
        // Current status goes out first, as the real stream does on connect.
        let _ = tx.send(status_frame(&initial));
        self.streams
            .lock()
            .entry(id.to_string())
            .or_default()
            .push(tx);

        let events = stream::unfold(rx, |mut rx| async move {
            match rx.recv().await {
                Some(Frame::Event { name, data }) => {
                    Some((Ok::<_, Infallible>(Event::default().event(name).data(data)), rx))
                }
                Some(Frame::Close) | None => None,
            }
        });
        warp::sse::reply(events.boxed()).into_response()
    }
}

fn status_frame(status: &GenerationStatus) -> Frame {
    Frame::Event {
        name: "status_update".to_string(),
        data: serde_json::to_string(status).unwrap_or_default(),
    }
}

fn detail(status: u16, message: &str) -> Response {
    let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    warp::reply::with_status(warp::reply::json(&json!({ "detail": message })), code).into_response()
}

fn not_found() -> Response {
    detail(404, "Content Desk not found")
}

fn routes(
    state: Arc<State>,
) -> impl Filter<Extract = (Response,), Error = warp::Rejection> + Clone {
    let with_state = warp::any().map(move || Arc::clone(&state));
    let auth = warp::header::optional::<String>("authorization");

    let get_desk = warp::get()
        .and(warp::path!("desk" / String))
        .and(auth)
        .and(with_state.clone())
        .map(|id: String, auth: Option<String>, state: Arc<State>| {
            state.record("GET", format!("/desk/{id}"), None, auth);
            state.get_desk(&id)
        });

    let get_status = warp::get()
        .and(warp::path!("desk" / String / "status"))
        .and(auth)
        .and(with_state.clone())
        .map(|id: String, auth: Option<String>, state: Arc<State>| {
            state.record("GET", format!("/desk/{id}/status"), None, auth);
            state.get_status(&id)
        });

    let patch_settings = warp::patch()
        .and(warp::path!("desk" / String))
        .and(auth)
        .and(warp::body::json::<Value>())
        .and(with_state.clone())
        .map(|id: String, auth: Option<String>, body: Value, state: Arc<State>| {
            state.record("PATCH", format!("/desk/{id}"), Some(body.clone()), auth);
            state.patch_settings(&id, &body)
        });

    let patch_feedback = warp::patch()
        .and(warp::path!("desk" / String / String))
        .and(auth)
        .and(warp::body::json::<Value>())
        .and(with_state.clone())
        .map(
            |id: String, phase: String, auth: Option<String>, body: Value, state: Arc<State>| {
                state.record("PATCH", format!("/desk/{id}/{phase}"), Some(body.clone()), auth);
                state.patch_feedback(&id, &phase, &body)
            },
        );

    let run_full = warp::post()
        .and(warp::path!("desk" / String / "run"))
        .and(auth)
        .and(with_state.clone())
        .map(|id: String, auth: Option<String>, state: Arc<State>| {
            state.record("POST", format!("/desk/{id}/run"), None, auth);
            state.start_run(&id, None)
        });

    let run_phase = warp::post()
        .and(warp::path!("desk" / String / "run" / String))
        .and(auth)
        .and(with_state.clone())
        .map(|id: String, phase: String, auth: Option<String>, state: Arc<State>| {
            state.record("POST", format!("/desk/{id}/run/{phase}"), None, auth);
            state.start_run(&id, Some(&phase))
        });

    let promote = warp::post()
        .and(warp::path!("desk" / "topic" / String / "content" / "add"))
        .and(auth)
        .and(with_state.clone())
        .map(|topic: String, auth: Option<String>, state: Arc<State>| {
            state.record("POST", format!("/desk/topic/{topic}/content/add"), None, auth);
            state.promote(&topic)
        });

    let platforms = warp::get()
        .and(warp::path!("config" / "platforms"))
        .and(auth)
        .and(with_state.clone())
        .map(|auth: Option<String>, state: Arc<State>| {
            state.record("GET", "/config/platforms".to_string(), None, auth);
            state.catalog(true)
        });

    let content_types = warp::get()
        .and(warp::path!("config" / "content-types"))
        .and(auth)
        .and(with_state.clone())
        .map(|auth: Option<String>, state: Arc<State>| {
            state.record("GET", "/config/content-types".to_string(), None, auth);
            state.catalog(false)
        });

    let sse = warp::get()
        .and(warp::path!("sse" / String / "stream"))
        .and(auth)
        .and(with_state)
        .map(|id: String, auth: Option<String>, state: Arc<State>| {
            state.record("GET", format!("/sse/{id}/stream"), None, auth);
            state.stream(&id)
        });

    promote
        .or(get_status)
        .unify()
        .or(get_desk)
        .unify()
        .or(patch_settings)
        .unify()
        .or(patch_feedback)
        .unify()
        .or(run_full)
        .unify()
        .or(run_phase)
        .unify()
        .or(platforms)
        .unify()
        .or(content_types)
        .unify()
        .or(sse)
        .unify()
}

/// Mock desk API bound to an ephemeral local port
pub struct MockDeskServer {
    addr: SocketAddr,
    state: Arc<State>,
    task: JoinHandle<()>,
}

impl MockDeskServer {
    /// Start serving; must be called inside a tokio runtime
    pub fn start() -> Self {
        let state = Arc::new(State::default());
        *state.catalog.lock() = crate::fixtures::catalog();
        let (addr, server) = warp::serve(routes(Arc::clone(&state))).bind_ephemeral(([127, 0, 0, 1], 0));
        let task = tokio::spawn(server);
        Self { addr, state, task }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn insert_desk(&self, desk: Desk) {
        self.state
            .desks
            .lock()
            .insert(desk.id.as_str().to_string(), desk);
    }

    pub fn desk(&self, desk_id: &str) -> Option<Desk> {
        self.state.with_desk(desk_id, |desk| desk.clone())
    }

    pub fn set_catalog(&self, catalog: SettingsCatalog) {
        *self.state.catalog.lock() = catalog;
    }

    /// Change the stored status without pushing it
    pub fn set_status(&self, desk_id: &str, status: GenerationStatus) {
        self.state.with_desk(desk_id, |desk| desk.status = status);
    }

    /// Store a status and push it to every open stream of the desk
    pub fn push_status(&self, desk_id: &str, status: GenerationStatus) {
        self.set_status(desk_id, status.clone());
        self.state.push_status(desk_id, &status);
    }

    pub fn push_raw(&self, desk_id: &str, event: &str, data: &str) {
        self.state.broadcast(
            desk_id,
            &Frame::Event {
                name: event.to_string(),
                data: data.to_string(),
            },
        );
    }

    pub fn push_malformed(&self, desk_id: &str) {
        self.push_raw(desk_id, "status_update", "{\"phase\": \"outline\", \"status_text\"");
    }

    pub fn push_error(&self, desk_id: &str, error: &str, message: &str) {
        let data = json!({ "error": error, "message": message }).to_string();
        self.push_raw(desk_id, "error", &data);
    }

    /// End every open stream of the desk cleanly
    pub fn close_streams(&self, desk_id: &str) {
        self.state.broadcast(desk_id, &Frame::Close);
        self.state.streams.lock().remove(desk_id);
    }

    /// Number of streams of the desk whose client is still connected
    pub fn open_streams(&self, desk_id: &str) -> usize {
        self.state
            .streams
            .lock()
            .get(desk_id)
            .map_or(0, |senders| senders.iter().filter(|tx| !tx.is_closed()).count())
    }

    /// Wait until the desk has exactly `count` connected streams
    pub async fn wait_for_streams(&self, desk_id: &str, count: usize) {
        for _ in 0..200 {
            if self.open_streams(desk_id) == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {count} open streams for {desk_id}, found {}",
            self.open_streams(desk_id)
        );
    }

    /// Force every request to a route group to fail
    pub fn reject(&self, route: Route, status: u16, message: &str) {
        self.state
            .rejections
            .lock()
            .insert(route, (status, message.to_string()));
    }

    pub fn clear_rejections(&self) {
        self.state.rejections.lock().clear();
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    /// Requests with this method and exact path
    pub fn count(&self, method: &str, path: &str) -> usize {
        self.state
            .requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

impl Drop for MockDeskServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
