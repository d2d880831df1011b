use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::audio::WavBuffer;

pub const STATUS_FALLBACK: &str = "Unknown status";
pub const TRANSCRIPT_FALLBACK: &str = "Could not transcribe";
pub const RESPONSE_FALLBACK: &str = "No response text";
pub const ERROR_FALLBACK: &str = "Unknown error";

/// Status the server sends last in every turn it served
pub const TURN_COMPLETE_STATUS: &str = "Response sent successfully.";
/// Status the server sends when the agent backend could not be reached
pub const UNAVAILABLE_STATUS: &str = "Service temporarily unavailable. Please try again.";

/// `start_stream` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartStream {
    pub format: String,
}

/// `stop_stream` payload (always `{}`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopStream {}

/// Event sent to the agent server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    StartStream(StartStream),
    /// Complete WAV file, sent as a binary attachment
    Message(WavBuffer),
    StopStream(StopStream),
}

impl OutboundEvent {
    /// Wire event name
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartStream(_) => "start_stream",
            Self::Message(_) => "message",
            Self::StopStream(_) => "stop_stream",
        }
    }

    /// JSON payload for text events, `None` for the binary `message`.
    pub fn json_payload(&self) -> Option<Value> {
        match self {
            Self::StartStream(payload) => serde_json::to_value(payload).ok(),
            Self::Message(_) => None,
            Self::StopStream(payload) => serde_json::to_value(payload).ok(),
        }
    }
}

/// Typed message received from the agent server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Status(String),
    Transcript(String),
    ResponseText(String),
    AudioReady(String),
    /// Server-side failure for the current turn
    ServerError(String),
}

/// Translate one inbound event frame.
///
/// Missing or non-string fields fall back to fixed texts. Returns `None` for
/// events this client does not handle and for `audio_ready` without a URL.
pub fn parse_inbound(event: &str, payload: &Value) -> Option<InboundMessage> {
    match event {
        "status" => Some(InboundMessage::Status(text_field(
            event,
            payload,
            "message",
            STATUS_FALLBACK,
        ))),
        "transcript" => Some(InboundMessage::Transcript(text_field(
            event,
            payload,
            "transcript",
            TRANSCRIPT_FALLBACK,
        ))),
        "response_text" => Some(InboundMessage::ResponseText(text_field(
            event,
            payload,
            "text",
            RESPONSE_FALLBACK,
        ))),
        "error" => Some(InboundMessage::ServerError(text_field(
            event,
            payload,
            "message",
            ERROR_FALLBACK,
        ))),
        "audio_ready" => match payload.get("audio_url").and_then(Value::as_str) {
            Some(url) if !url.is_empty() => Some(InboundMessage::AudioReady(url.to_string())),
            _ => {
                warn!("audio_ready without audio_url, ignoring: {}", payload);
                None
            }
        },
        other => {
            debug!("Ignoring unhandled event '{}'", other);
            None
        }
    }
}

fn text_field(event: &str, payload: &Value, field: &str, fallback: &str) -> String {
    match payload.get(field).and_then(Value::as_str) {
        Some(text) => text.to_string(),
        None => {
            warn!(
                "Malformed '{}' frame (missing '{}'): {}",
                event, field, payload
            );
            fallback.to_string()
        }
    }
}
