use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, info, warn};

use crate::audio::WavBuffer;

use super::messages::{parse_inbound, InboundMessage, OutboundEvent, StartStream, StopStream};

/// Connection lifecycle as seen by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Raw event produced by a transport task
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connecting,
    Connected,
    Disconnected(String),
    Error(String),
    Frame { event: String, payload: Value },
}

/// What one drain of the channel hands to the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelUpdate {
    Connection(ConnectionState),
    Inbound(InboundMessage),
}

/// Transport side of a `SignalingChannel`.
///
/// The transport task pushes `TransportEvent`s in from whatever thread it
/// runs on and drains `OutboundEvent`s to put on the wire.
pub struct TransportEndpoint {
    pub inbound: mpsc::UnboundedSender<TransportEvent>,
    pub outbound: mpsc::UnboundedReceiver<OutboundEvent>,
}

/// The single connection to the agent server.
///
/// Outbound emissions are fire-and-forget. Inbound events queue up until
/// the owner calls `drain()`, so handlers always run on the owner's task.
pub struct SignalingChannel {
    state: ConnectionState,
    outbound: mpsc::UnboundedSender<OutboundEvent>,
    inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

impl SignalingChannel {
    /// Create a channel and the endpoint a transport task drives.
    pub fn new() -> (Self, TransportEndpoint) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let channel = Self {
            state: ConnectionState::Disconnected,
            outbound: outbound_tx,
            inbound: inbound_rx,
        };
        let endpoint = TransportEndpoint {
            inbound: inbound_tx,
            outbound: outbound_rx,
        };
        (channel, endpoint)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Emit `start_stream{format}`.
    pub fn start_stream(&self, format: &str) {
        self.emit(OutboundEvent::StartStream(StartStream {
            format: format.to_string(),
        }));
    }

    /// Emit the recorded WAV file as a binary `message`.
    pub fn message(&self, wav: WavBuffer) {
        self.emit(OutboundEvent::Message(wav));
    }

    /// Emit `stop_stream{}`.
    pub fn stop_stream(&self) {
        self.emit(OutboundEvent::StopStream(StopStream::default()));
    }

    fn emit(&self, event: OutboundEvent) {
        let name = event.name();
        if self.outbound.send(event).is_err() {
            warn!("Transport gone, dropping outbound '{}'", name);
        } else {
            debug!("Queued outbound '{}'", name);
        }
    }

    /// Take every queued transport event, in arrival order.
    ///
    /// Lifecycle events update the connection state before they are handed
    /// on. Frames that do not map to a handled message are dropped here.
    pub fn drain(&mut self) -> Vec<ChannelUpdate> {
        let mut updates = Vec::new();

        loop {
            match self.inbound.try_recv() {
                Ok(event) => self.apply(event, &mut updates),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    // transport task ended without reporting it
                    if matches!(
                        self.state,
                        ConnectionState::Connected | ConnectionState::Connecting
                    ) {
                        self.apply(
                            TransportEvent::Disconnected("transport task ended".to_string()),
                            &mut updates,
                        );
                    }
                    break;
                }
            }
        }

        updates
    }

    fn apply(&mut self, event: TransportEvent, updates: &mut Vec<ChannelUpdate>) {
        match event {
            TransportEvent::Connecting => {
                self.state = ConnectionState::Connecting;
                updates.push(ChannelUpdate::Connection(self.state));
            }
            TransportEvent::Connected => {
                info!("Signaling channel connected");
                self.state = ConnectionState::Connected;
                updates.push(ChannelUpdate::Connection(self.state));
            }
            TransportEvent::Disconnected(reason) => {
                info!("Signaling channel disconnected: {}", reason);
                self.state = ConnectionState::Disconnected;
                updates.push(ChannelUpdate::Connection(self.state));
            }
            TransportEvent::Error(reason) => {
                warn!("Signaling channel error: {}", reason);
                self.state = ConnectionState::Error;
                updates.push(ChannelUpdate::Connection(self.state));
            }
            TransportEvent::Frame { event, payload } => {
                if let Some(message) = parse_inbound(&event, &payload) {
                    updates.push(ChannelUpdate::Inbound(message));
                }
            }
        }
    }
}
