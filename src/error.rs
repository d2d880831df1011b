use thiserror::Error;

/// Reasons a push-to-talk turn could not start or finish.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("microphone access denied")]
    PermissionDenied,

    #[error("no microphone found")]
    DeviceUnavailable,

    #[error("not connected to server")]
    NotConnected,

    #[error("capture device error: {0}")]
    Device(#[from] DeviceError),
}

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no input device available")]
    NoInputDevice,

    #[error("capture stream error: {0}")]
    Stream(String),

    #[error("failed to read capture source: {0}")]
    Source(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("unsupported channel count: {0}")]
    Channels(u16),

    #[error(transparent)]
    Wav(#[from] hound::Error),
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to fetch audio: {0}")]
    Fetch(String),

    #[error("audio server returned HTTP {0}")]
    HttpStatus(u16),

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("audio output error: {0}")]
    Output(String),
}

/// Malformed Engine.IO / Socket.IO packet.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("empty packet")]
    Empty,

    #[error("unknown packet type {0:?}")]
    UnknownType(char),

    #[error("invalid packet payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("event packet without a name")]
    MissingEventName,
}
