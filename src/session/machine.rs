//! Push-to-talk protocol state machine.
//!
//! ```text
//! Idle ──start──▶ Recording ──stop──▶ AwaitingReply ──audio_ready──▶ Playing ──done──▶ Idle
//!                                          │
//!                                          └──error / text-only turn / timeout──▶ Idle
//! ```
//!
//! Driven from a single owner task by local input, drained channel updates,
//! and playback events. Stopping is not a resting state: the stop request
//! flushes, encodes, and emits in one step before settling in AwaitingReply.

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::observers::{Observers, StatusLevel, StatusUpdate};
use super::session::RecordingSession;
use crate::audio::{encode_wav, CaptureDevice};
use crate::error::SessionError;
use crate::playback::{Playback, PlaybackEvent, PlaybackOutcome};
use crate::signaling::{
    ChannelUpdate, ConnectionState, InboundMessage, SignalingChannel, TURN_COMPLETE_STATUS,
    UNAVAILABLE_STATUS,
};

pub const STATUS_CONNECTING: &str = "Connecting to server...";
pub const STATUS_CONNECTED: &str = "Connected to server";
pub const STATUS_DISCONNECTED: &str = "Disconnected from server";
pub const STATUS_CONNECTION_ERROR: &str = "Connection error";
pub const STATUS_NOT_CONNECTED: &str = "Not connected to server";
pub const STATUS_NO_MICROPHONE: &str = "No microphone found";
pub const STATUS_PERMISSION_DENIED: &str =
    "Microphone access denied. Please allow microphone permissions.";
pub const STATUS_RECORDING_FAILED: &str = "Recording failed";
pub const STATUS_RECORDING: &str = "Recording...";
pub const STATUS_PROCESSING: &str = "Processing...";
pub const STATUS_DOWNLOADING: &str = "Downloading audio...";
pub const STATUS_SPEAKING: &str = "Agent speaking...";
pub const STATUS_READY: &str = "Ready - Hold button to speak";
pub const STATUS_REPLY_TIMEOUT: &str = "No reply from server";

/// Where the push-to-talk protocol currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Recording,
    AwaitingReply,
    Playing,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Recording => write!(f, "recording"),
            Self::AwaitingReply => write!(f, "awaiting_reply"),
            Self::Playing => write!(f, "playing"),
        }
    }
}

pub struct SessionStateMachine {
    config: SessionConfig,
    state: SessionState,
    device: Box<dyn CaptureDevice>,
    recording: Option<RecordingSession>,
    playback: Box<dyn Playback>,
    observers: Observers,
    /// Ticket of the current playback hand-off
    playback_ticket: u64,
    permission_reported: bool,
    /// When the current AwaitingReply began
    awaiting_since: Option<Instant>,
}

impl SessionStateMachine {
    pub fn new(
        config: SessionConfig,
        device: Box<dyn CaptureDevice>,
        playback: Box<dyn Playback>,
        observers: Observers,
    ) -> Self {
        info!(
            "Session state machine ready: device {}, {}Hz, max {}s",
            device.name(),
            config.sample_rate,
            config.max_duration_secs
        );
        Self {
            config,
            state: SessionState::Idle,
            device,
            recording: None,
            playback,
            observers,
            playback_ticket: 0,
            permission_reported: false,
            awaiting_since: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn observers(&self) -> &Observers {
        &self.observers
    }

    /// Samples captured so far in the active recording.
    pub fn recorded_samples(&self) -> Option<&[f32]> {
        self.recording.as_ref().map(RecordingSession::samples)
    }

    /// Check microphone permission; the denial is surfaced only once.
    pub fn check_permission(&mut self) -> bool {
        if self.device.is_authorized() {
            return true;
        }
        if !self.permission_reported {
            error!("Microphone permission denied");
            self.permission_reported = true;
            self.surface(StatusUpdate::error(STATUS_PERMISSION_DENIED));
        }
        false
    }

    /// Local press: begin a recording if the guards allow it.
    ///
    /// Ignored (returns `Ok`) while a turn is already in progress.
    pub fn request_start(&mut self, channel: &SignalingChannel) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            debug!("Start request ignored in state {}", self.state);
            return Ok(());
        }

        if !channel.is_connected() {
            self.surface(StatusUpdate::new(STATUS_NOT_CONNECTED));
            return Err(SessionError::NotConnected);
        }

        if !self.check_permission() {
            return Err(SessionError::PermissionDenied);
        }

        if !self.device.has_microphone() {
            self.surface(StatusUpdate::new(STATUS_NO_MICROPHONE));
            return Err(SessionError::DeviceUnavailable);
        }

        if let Err(e) = self.device.start(&self.config.capture()) {
            error!("Failed to start recording: {}", e);
            self.device.stop();
            self.surface(StatusUpdate::error(STATUS_RECORDING_FAILED));
            return Err(e.into());
        }

        self.recording = Some(RecordingSession::new(&self.config));
        self.set_state(SessionState::Recording);
        channel.start_stream(&self.config.stream_format);
        self.surface(StatusUpdate::new(STATUS_RECORDING));

        Ok(())
    }

    /// Per-tick capture poll; does nothing unless recording.
    pub fn poll_capture(&mut self) {
        if self.state != SessionState::Recording {
            return;
        }
        if let Some(recording) = self.recording.as_mut() {
            recording.poll(self.device.as_ref());
        }
    }

    /// Local release: flush, close the device, and send the recording.
    ///
    /// Redundant releases outside Recording are no-ops.
    pub fn request_stop(&mut self, channel: &SignalingChannel) -> Result<(), SessionError> {
        if self.state != SessionState::Recording {
            debug!("Stop request ignored in state {}", self.state);
            return Ok(());
        }

        let Some(mut recording) = self.recording.take() else {
            warn!("Recording state without an active session");
            self.set_state(SessionState::Idle);
            return Ok(());
        };

        // final partial segment, then release the device
        recording.poll(self.device.as_ref());
        self.device.stop();

        let sample_rate = recording.sample_rate();
        let samples = recording.finish();

        let encoded = encode_wav(&samples, sample_rate);
        self.set_state(SessionState::AwaitingReply);

        match encoded {
            Ok(Some(wav)) => {
                info!(
                    "Sending WAV: {} bytes ({} samples at {}Hz)",
                    wav.len(),
                    samples.len(),
                    sample_rate
                );
                channel.message(wav);
            }
            Ok(None) => warn!("No audio samples captured"),
            Err(e) => error!("Failed to encode recording: {}", e),
        }

        channel.stop_stream();
        self.surface(StatusUpdate::new(STATUS_PROCESSING));

        Ok(())
    }

    /// Apply one drained channel update.
    pub fn handle_channel_update(&mut self, update: ChannelUpdate) {
        match update {
            ChannelUpdate::Connection(state) => self.handle_connection(state),
            ChannelUpdate::Inbound(message) => self.handle_inbound(message),
        }
    }

    pub fn handle_connection(&mut self, state: ConnectionState) {
        self.observers.publish_connection_state(state);

        match state {
            ConnectionState::Connecting => self.surface(StatusUpdate::new(STATUS_CONNECTING)),
            ConnectionState::Connected => self.surface(StatusUpdate::new(STATUS_CONNECTED)),
            ConnectionState::Disconnected => {
                self.abandon();
                self.surface(StatusUpdate::new(STATUS_DISCONNECTED));
            }
            ConnectionState::Error => {
                self.abandon();
                self.surface(StatusUpdate::error(STATUS_CONNECTION_ERROR));
            }
        }
    }

    pub fn handle_inbound(&mut self, message: InboundMessage) {
        match message {
            InboundMessage::Status(text) => {
                let update = if text == UNAVAILABLE_STATUS {
                    StatusUpdate::error(text)
                } else {
                    StatusUpdate::new(text)
                };
                // audio_ready moves the turn to Playing before the closing status
                let ends_turn =
                    update.level == StatusLevel::Error || update.text == TURN_COMPLETE_STATUS;
                self.surface(update);
                if ends_turn && self.state == SessionState::AwaitingReply {
                    info!("Server closed the turn without reply audio");
                    self.set_state(SessionState::Idle);
                }
            }

            InboundMessage::Transcript(text) => {
                if self.state != SessionState::AwaitingReply {
                    debug!("Transcript received in state {}", self.state);
                }
                info!("Transcript: {}", text);
                self.observers.publish_transcript(text);
            }

            InboundMessage::ResponseText(text) => {
                if self.state != SessionState::AwaitingReply {
                    debug!("Response text received in state {}", self.state);
                }
                info!("Response text: {}", text);
                self.observers.publish_response(text);
            }

            InboundMessage::AudioReady(url) => {
                if self.state != SessionState::AwaitingReply {
                    warn!("Ignoring audio_ready in state {}: {}", self.state, url);
                    return;
                }
                info!("Audio ready: {}", url);
                self.playback_ticket += 1;
                self.set_state(SessionState::Playing);
                self.surface(StatusUpdate::new(STATUS_DOWNLOADING));
                self.playback.play(self.playback_ticket, url);
            }

            InboundMessage::ServerError(text) => {
                warn!("Server error: {}", text);
                self.surface(StatusUpdate::error(text));
                if self.state == SessionState::AwaitingReply {
                    self.set_state(SessionState::Idle);
                }
            }
        }
    }

    /// Give up on a turn the server has not closed within the reply timeout.
    pub fn check_reply_timeout(&mut self, now: Instant) {
        let timeout = Duration::from_secs(self.config.reply_timeout_secs);
        let Some(since) = self.awaiting_since else {
            return;
        };
        if timeout.is_zero() || now.saturating_duration_since(since) < timeout {
            return;
        }
        warn!("No reply from server after {}s, ending turn", timeout.as_secs());
        self.set_state(SessionState::Idle);
        self.surface(StatusUpdate::error(STATUS_REPLY_TIMEOUT));
    }

    pub fn handle_playback(&mut self, event: PlaybackEvent) {
        if self.state != SessionState::Playing || event.ticket() != self.playback_ticket {
            debug!("Ignoring stale playback event for ticket {}", event.ticket());
            return;
        }

        match event {
            PlaybackEvent::Started { audio, .. } => {
                info!("Playing audio, duration: {:.2}s", audio.duration().as_secs_f64());
                self.observers.publish_audio(audio);
                self.surface(StatusUpdate::new(STATUS_SPEAKING));
            }
            PlaybackEvent::Finished { outcome, .. } => {
                self.set_state(SessionState::Idle);
                match outcome {
                    PlaybackOutcome::Completed => self.surface(StatusUpdate::new(STATUS_READY)),
                    PlaybackOutcome::Failed(reason) => self.surface(StatusUpdate::error(format!(
                        "Error playing audio: {}",
                        reason
                    ))),
                }
            }
        }
    }

    /// Release the device and any playback, e.g. on shutdown.
    pub fn shutdown(&mut self) {
        self.abandon();
    }

    /// Drop the in-flight turn without emitting anything for it.
    fn abandon(&mut self) {
        match self.state {
            SessionState::Recording => {
                self.device.stop();
                if let Some(recording) = self.recording.take() {
                    info!(
                        "Abandoning recording session {} ({:.2}s captured)",
                        recording.id(),
                        recording.duration_secs()
                    );
                }
            }
            SessionState::Playing => self.playback.cancel(),
            SessionState::Idle | SessionState::AwaitingReply => {}
        }
        self.set_state(SessionState::Idle);
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!("Session state {} -> {}", self.state, state);
            self.state = state;
            self.awaiting_since = (state == SessionState::AwaitingReply).then(Instant::now);
            self.observers.publish_session_state(state);
        }
    }

    fn surface(&self, update: StatusUpdate) {
        debug!(level = ?update.level, "Status: {}", update.text);
        self.observers.publish_status(update);
    }
}
