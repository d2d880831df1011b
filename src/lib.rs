pub mod audio;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod playback;
pub mod session;
pub mod signaling;

pub use audio::{
    encode_wav, AudioFile, CaptureConfig, CaptureDevice, CaptureDeviceFactory, CaptureSource,
    FileCaptureDevice, RingBuffer, RingDevice, SampleAccumulator, WavBuffer,
};
pub use client::{InputEvent, InputHandle, VoiceClient};
pub use config::Config;
pub use error::{CodecError, DeviceError, EncodeError, PlaybackError, SessionError};
pub use http::{create_router, AppState};
pub use playback::{
    AudioFetcher, AudioSink, DecodedAudio, HttpFetcher, NullSink, Playback, PlaybackCoordinator,
    PlaybackEvent, PlaybackOutcome, WavFileSink,
};
pub use session::{
    ClientSnapshot, Observers, RecordingSession, SessionConfig, SessionState,
    SessionStateMachine, StatusLevel, StatusUpdate,
};
pub use signaling::{
    ChannelUpdate, ConnectionState, InboundMessage, OutboundEvent, SignalingChannel,
    TransportEndpoint, TransportEvent,
};
