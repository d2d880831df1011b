use serde::{Deserialize, Serialize};

use crate::audio::CaptureConfig;

/// Configuration for push-to-talk sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Capture sample rate, fixed for the whole session
    pub sample_rate: u32,

    /// Capture ring length; longer recordings silently overwrite the start
    pub max_duration_secs: u32,

    /// Value of the `format` field in `start_stream`
    pub stream_format: String,

    /// How long to wait for the server to close a turn; 0 waits forever
    pub reply_timeout_secs: u64,
}

impl SessionConfig {
    pub fn capture(&self) -> CaptureConfig {
        CaptureConfig {
            sample_rate: self.sample_rate,
            max_duration_secs: self.max_duration_secs,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,     // device native rate
            max_duration_secs: 30,  // 30s ring
            stream_format: "wav".to_string(),
            reply_timeout_secs: 60,
        }
    }
}
