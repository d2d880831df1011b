//! Observer surface of the client.
//!
//! Each stream is a `watch` channel: subscribers see the most recent value,
//! not a backlog. Dropping a receiver unsubscribes.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use super::machine::SessionState;
use crate::playback::DecodedAudio;
use crate::signaling::ConnectionState;

/// Visual/semantic marker attached to a status text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    Info,
    Ready,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub text: String,
    pub level: StatusLevel,
}

impl StatusUpdate {
    /// Classify by content: anything mentioning an error is an error,
    /// anything announcing readiness is ready.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let lower = text.to_lowercase();
        let level = if lower.contains("error") {
            StatusLevel::Error
        } else if lower.contains("ready") {
            StatusLevel::Ready
        } else {
            StatusLevel::Info
        };
        Self { text, level }
    }

    /// Force the error marker regardless of wording.
    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level: StatusLevel::Error,
        }
    }
}

struct Streams {
    status: watch::Sender<StatusUpdate>,
    transcript: watch::Sender<Option<String>>,
    response: watch::Sender<Option<String>>,
    audio: watch::Sender<Option<Arc<DecodedAudio>>>,
    session: watch::Sender<SessionState>,
    connection: watch::Sender<ConnectionState>,
}

/// Publish side of every observer stream; cheap to clone.
#[derive(Clone)]
pub struct Observers {
    streams: Arc<Streams>,
}

impl Observers {
    pub fn new() -> Self {
        Self {
            streams: Arc::new(Streams {
                status: watch::channel(StatusUpdate::new("Press button or spacebar to record")).0,
                transcript: watch::channel(None).0,
                response: watch::channel(None).0,
                audio: watch::channel(None).0,
                session: watch::channel(SessionState::Idle).0,
                connection: watch::channel(ConnectionState::Disconnected).0,
            }),
        }
    }

    pub fn publish_status(&self, update: StatusUpdate) {
        self.streams.status.send_replace(update);
    }

    pub fn publish_transcript(&self, text: String) {
        self.streams.transcript.send_replace(Some(text));
    }

    pub fn publish_response(&self, text: String) {
        self.streams.response.send_replace(Some(text));
    }

    pub fn publish_audio(&self, audio: Arc<DecodedAudio>) {
        self.streams.audio.send_replace(Some(audio));
    }

    pub fn publish_session_state(&self, state: SessionState) {
        self.streams.session.send_replace(state);
    }

    pub fn publish_connection_state(&self, state: ConnectionState) {
        self.streams.connection.send_replace(state);
    }

    pub fn subscribe_status(&self) -> watch::Receiver<StatusUpdate> {
        self.streams.status.subscribe()
    }

    pub fn subscribe_transcript(&self) -> watch::Receiver<Option<String>> {
        self.streams.transcript.subscribe()
    }

    pub fn subscribe_response(&self) -> watch::Receiver<Option<String>> {
        self.streams.response.subscribe()
    }

    pub fn subscribe_audio(&self) -> watch::Receiver<Option<Arc<DecodedAudio>>> {
        self.streams.audio.subscribe()
    }

    pub fn subscribe_session_state(&self) -> watch::Receiver<SessionState> {
        self.streams.session.subscribe()
    }

    pub fn subscribe_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.streams.connection.subscribe()
    }

    /// Current values of every text stream.
    pub fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            session: *self.streams.session.borrow(),
            connection: *self.streams.connection.borrow(),
            status: self.streams.status.borrow().clone(),
            transcript: self.streams.transcript.borrow().clone(),
            response: self.streams.response.borrow().clone(),
        }
    }
}

impl Default for Observers {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the observer streams
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSnapshot {
    pub session: SessionState,
    pub connection: ConnectionState,
    pub status: StatusUpdate,
    pub transcript: Option<String>,
    pub response: Option<String>,
}
