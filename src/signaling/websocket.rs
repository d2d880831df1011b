//! Socket.IO client transport over tokio-tungstenite.
//!
//! Runs as a background task bridging the WebSocket and a
//! `TransportEndpoint`. Lifecycle changes and inbound event frames are
//! pushed to the endpoint; nothing here touches session state. There is no
//! reconnect: a clean close reports `Disconnected`, a failure reports only
//! `Error`, and the task returns.

use anyhow::{bail, Context, Result};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::channel::{TransportEndpoint, TransportEvent};
use super::messages::OutboundEvent;
use super::socketio::{self, EnginePacket, SocketPacket};

/// Build the Engine.IO WebSocket URL for a server base URL.
///
/// `http://host:5000` becomes `ws://host:5000/socket.io/?EIO=4&transport=websocket`.
pub fn socketio_url(server_url: &str) -> Result<String> {
    let trimmed = server_url.trim_end_matches('/');
    let base = if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        trimmed.to_string()
    } else {
        bail!("Unsupported server URL scheme: {}", server_url);
    };

    Ok(format!("{}/socket.io/?EIO=4&transport=websocket", base))
}

/// Spawn the transport task for `server_url`.
pub fn spawn(server_url: String, endpoint: TransportEndpoint) -> JoinHandle<()> {
    tokio::spawn(async move {
        let events = endpoint.inbound.clone();
        if let Err(e) = run(&server_url, endpoint).await {
            error!("Socket.IO transport failed: {:#}", e);
            let _ = events.send(TransportEvent::Error(format!("{:#}", e)));
        }
    })
}

/// What the read side asks the loop to do next
enum Step {
    Continue,
    Reply(String),
    Close(String),
    Fail(String),
}

/// Connect and pump frames until either side closes.
pub async fn run(server_url: &str, endpoint: TransportEndpoint) -> Result<()> {
    let TransportEndpoint {
        inbound,
        mut outbound,
    } = endpoint;
    let url = socketio_url(server_url)?;
    let _ = inbound.send(TransportEvent::Connecting);
    info!("Connecting to {}", url);

    let (ws, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .context("WebSocket handshake failed")?;
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            frame = stream.next() => {
                let step = match frame {
                    Some(Ok(Message::Text(text))) => handle_text(&text, &inbound),
                    Some(Ok(Message::Binary(bytes))) => {
                        debug!("Ignoring inbound binary frame ({} bytes)", bytes.len());
                        Step::Continue
                    }
                    Some(Ok(Message::Close(frame))) => Step::Close(
                        frame.map(|f| f.reason.to_string()).unwrap_or_else(|| "closed by server".to_string()),
                    ),
                    Some(Ok(_)) => Step::Continue,
                    Some(Err(e)) => return Err(e).context("WebSocket read failed"),
                    None => Step::Close("stream ended".to_string()),
                };

                match step {
                    Step::Continue => {}
                    Step::Reply(text) => {
                        sink.send(Message::Text(text)).await.context("Failed to send reply")?;
                    }
                    Step::Close(reason) => {
                        let _ = inbound.send(TransportEvent::Disconnected(reason));
                        return Ok(());
                    }
                    Step::Fail(reason) => bail!(reason),
                }
            }

            next = outbound.recv() => {
                match next {
                    Some(event) => {
                        for message in encode_outbound(event) {
                            sink.send(message).await.context("Failed to send frame")?;
                        }
                    }
                    None => {
                        info!("Signaling channel dropped, closing socket");
                        let _ = sink.send(Message::Text("41".to_string())).await;
                        let _ = sink.close().await;
                        return Ok(());
                    }
                }
            }
        }
    }
}

fn handle_text(text: &str, events: &UnboundedSender<TransportEvent>) -> Step {
    let packet = match socketio::decode_engine(text) {
        Ok(packet) => packet,
        Err(e) => {
            warn!("Dropping malformed Engine.IO frame {:?}: {}", text, e);
            return Step::Continue;
        }
    };

    match packet {
        EnginePacket::Open(handshake) => {
            debug!(
                "Engine.IO open: sid={}, ping interval {}ms",
                handshake.sid, handshake.ping_interval
            );
            Step::Reply(socketio::CONNECT.to_string())
        }
        EnginePacket::Ping(payload) => Step::Reply(socketio::encode_pong(&payload)),
        EnginePacket::Close => Step::Close("server closed session".to_string()),
        EnginePacket::Message(payload) => handle_socket_packet(&payload, events),
        EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => Step::Continue,
    }
}

fn handle_socket_packet(payload: &str, events: &UnboundedSender<TransportEvent>) -> Step {
    let packet = match socketio::decode_socket(payload) {
        Ok(packet) => packet,
        Err(e) => {
            warn!("Dropping malformed Socket.IO packet {:?}: {}", payload, e);
            return Step::Continue;
        }
    };

    match packet {
        SocketPacket::Connect(_) => {
            let _ = events.send(TransportEvent::Connected);
        }
        SocketPacket::Disconnect => return Step::Close("server disconnected".to_string()),
        SocketPacket::ConnectError(detail) => {
            return Step::Fail(format!("connect refused: {}", detail));
        }
        SocketPacket::Event { name, mut args } => {
            let payload = if args.is_empty() {
                Value::Null
            } else {
                args.swap_remove(0)
            };
            let _ = events.send(TransportEvent::Frame {
                event: name,
                payload,
            });
        }
        SocketPacket::BinaryEvent { name, .. } => {
            debug!("Ignoring inbound binary event '{}'", name);
        }
        SocketPacket::Ack { .. } | SocketPacket::BinaryAck { .. } => {}
    }

    Step::Continue
}

/// Wire frames for one outbound event, in send order.
pub fn encode_outbound(event: OutboundEvent) -> Vec<Message> {
    let name = event.name();
    match event {
        OutboundEvent::Message(wav) => vec![
            Message::Text(socketio::encode_binary_event(name)),
            Message::Binary(wav.into_bytes()),
        ],
        other => {
            let payload = other.json_payload().unwrap_or(Value::Null);
            vec![Message::Text(socketio::encode_event(name, &payload))]
        }
    }
}
