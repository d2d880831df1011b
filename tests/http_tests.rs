// Integration tests for the HTTP control surface
//
// Requests go straight into the router with tower's oneshot; a VoiceClient
// behind it is ticked by hand between requests.

use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use ptt_voice::audio::RingDevice;
use ptt_voice::playback::{HttpFetcher, NullSink, PlaybackCoordinator};
use ptt_voice::signaling::{SignalingChannel, TransportEvent};
use ptt_voice::{create_router, AppState, SessionConfig, SessionState, VoiceClient};

fn client() -> Result<(VoiceClient, ptt_voice::signaling::TransportEndpoint)> {
    let fetcher = Arc::new(HttpFetcher::new(std::time::Duration::from_secs(1))?);
    let (coordinator, playback_events) = PlaybackCoordinator::new(fetcher, Arc::new(NullSink));
    let (channel, endpoint) = SignalingChannel::new();
    let client = VoiceClient::new(
        SessionConfig {
            sample_rate: 8000,
            max_duration_secs: 1,
            ..SessionConfig::default()
        },
        Box::new(RingDevice::new()),
        channel,
        Box::new(coordinator),
        playback_events,
    );
    Ok((client, endpoint))
}

async fn body_json(response: axum::response::Response) -> Result<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn post(uri: &str) -> Result<Request<Body>> {
    Ok(Request::builder().method("POST").uri(uri).body(Body::empty())?)
}

fn get(uri: &str) -> Result<Request<Body>> {
    Ok(Request::builder().uri(uri).body(Body::empty())?)
}

#[tokio::test]
async fn test_health_check() -> Result<()> {
    let (client, _endpoint) = client()?;
    let app = create_router(AppState::new(client.input_handle(), client.observers()));

    let response = app.oneshot(get("/health")?).await?;

    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_status_reports_snapshot() -> Result<()> {
    let (client, _endpoint) = client()?;
    let app = create_router(AppState::new(client.input_handle(), client.observers()));

    let response = app.oneshot(get("/status")?).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await?;
    assert_eq!(body["session"], "idle");
    assert_eq!(body["connection"], "disconnected");
    assert_eq!(body["status"]["level"], "info");
    assert!(body["transcript"].is_null());

    Ok(())
}

#[tokio::test]
async fn test_press_and_release_drive_the_client() -> Result<()> {
    let (mut client, endpoint) = client()?;
    let app = create_router(AppState::new(client.input_handle(), client.observers()));

    endpoint.inbound.send(TransportEvent::Connected)?;
    client.tick();

    let response = app.clone().oneshot(post("/ptt/press")?).await?;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    client.tick();
    assert_eq!(client.state(), SessionState::Recording);

    let body = body_json(app.clone().oneshot(get("/status")?).await?).await?;
    assert_eq!(body["session"], "recording");
    assert_eq!(body["connection"], "connected");
    assert_eq!(body["status"]["text"], "Recording...");

    let response = app.oneshot(post("/ptt/release")?).await?;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    client.tick();
    assert_eq!(client.state(), SessionState::AwaitingReply);

    Ok(())
}

#[tokio::test]
async fn test_press_after_client_stopped() -> Result<()> {
    let (client, _endpoint) = client()?;
    let app = create_router(AppState::new(client.input_handle(), client.observers()));
    drop(client);

    let response = app.oneshot(post("/ptt/press")?).await?;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}
