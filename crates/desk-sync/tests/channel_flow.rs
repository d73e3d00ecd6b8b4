//! Status channel against the mock desk server

use desk_core::{ChannelErrorKind, ChannelEvent, DeskId, GenerationStatus, Phase};
use desk_sync::{ChannelHandle, HttpDeskApi, SseStatusChannel, StatusSource, SyncConfig};
use desk_test_utils::{desk, processing, succeeded, MockDeskServer, Route};
use std::time::Duration;

fn channel_for(base_url: &str) -> SseStatusChannel {
    let config = SyncConfig::new().with_base_url(base_url);
    SseStatusChannel::new(HttpDeskApi::new(&config).unwrap())
}

async fn next(handle: &mut ChannelHandle) -> ChannelEvent {
    tokio::time::timeout(Duration::from_secs(5), handle.next_event())
        .await
        .expect("no event in time")
        .expect("channel finished early")
}

fn expect_status(event: ChannelEvent) -> GenerationStatus {
    match event {
        ChannelEvent::StatusUpdate(status) => status,
        other => panic!("expected a status update, got {other:?}"),
    }
}

fn expect_error(event: ChannelEvent, kind: ChannelErrorKind) -> String {
    match event {
        ChannelEvent::Error(error) if error.kind == kind => error.detail,
        other => panic!("expected {kind} error, got {other:?}"),
    }
}

async fn open(server: &MockDeskServer, id: &str) -> ChannelHandle {
    server.insert_desk(desk(id));
    let mut handle = channel_for(&server.base_url()).open(&DeskId::new(id));
    // The stream opens with the stored status.
    assert_eq!(expect_status(next(&mut handle).await), GenerationStatus::initial());
    server.wait_for_streams(id, 1).await;
    handle
}

#[tokio::test]
async fn pushed_statuses_arrive_in_order() {
    let server = MockDeskServer::start();
    let mut handle = open(&server, "d1").await;

    server.push_status("d1", processing(Phase::Ideation));
    server.push_status("d1", succeeded(Phase::Ideation));

    assert_eq!(expect_status(next(&mut handle).await), processing(Phase::Ideation));
    assert_eq!(expect_status(next(&mut handle).await), succeeded(Phase::Ideation));
    assert_eq!(server.count("GET", "/sse/d1/stream"), 1);
}

#[tokio::test]
async fn malformed_payload_keeps_the_stream_open() {
    let server = MockDeskServer::start();
    let mut handle = open(&server, "d1").await;

    server.push_malformed("d1");
    server.push_status("d1", processing(Phase::Outline));

    expect_error(next(&mut handle).await, ChannelErrorKind::MalformedPayload);
    assert_eq!(expect_status(next(&mut handle).await), processing(Phase::Outline));
}

#[tokio::test]
async fn server_error_event_is_transient() {
    let server = MockDeskServer::start();
    let mut handle = open(&server, "d1").await;

    server.push_error("d1", "Resource Busy", "Another listener is active for this desk.");
    server.push_status("d1", processing(Phase::Content));

    let detail = expect_error(next(&mut handle).await, ChannelErrorKind::Transient);
    assert_eq!(detail, "Resource Busy: Another listener is active for this desk.");
    assert_eq!(expect_status(next(&mut handle).await), processing(Phase::Content));
}

#[tokio::test]
async fn peer_close_is_terminal() {
    let server = MockDeskServer::start();
    let mut handle = open(&server, "d1").await;

    server.close_streams("d1");

    let event = next(&mut handle).await;
    assert!(event.is_terminal());
    expect_error(event, ChannelErrorKind::ConnectionClosed);
    let finished = tokio::time::timeout(Duration::from_secs(5), handle.next_event())
        .await
        .unwrap();
    assert!(finished.is_none());
}

#[tokio::test]
async fn refused_stream_is_terminal() {
    let server = MockDeskServer::start();
    server.insert_desk(desk("d1"));
    server.reject(Route::Stream, 503, "Stream capacity reached");

    let mut handle = channel_for(&server.base_url()).open(&DeskId::new("d1"));
    let detail = expect_error(next(&mut handle).await, ChannelErrorKind::ConnectionClosed);
    assert!(detail.contains("503"));
    assert!(detail.contains("Stream capacity reached"));
}

#[tokio::test]
async fn unreachable_server_is_transient() {
    // Nothing listens on the discard port.
    let mut handle = channel_for("http://127.0.0.1:9").open(&DeskId::new("d1"));

    expect_error(next(&mut handle).await, ChannelErrorKind::Transient);
    let finished = tokio::time::timeout(Duration::from_secs(5), handle.next_event())
        .await
        .unwrap();
    assert!(finished.is_none());
}

#[tokio::test]
async fn stream_request_carries_the_token() {
    let server = MockDeskServer::start();
    server.insert_desk(desk("d1"));
    let config = SyncConfig::new()
        .with_base_url(server.base_url())
        .with_api_token("secret");
    let mut handle = SseStatusChannel::new(HttpDeskApi::new(&config).unwrap())
        .open(&DeskId::new("d1"));
    next(&mut handle).await;

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer secret"));
}
