use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::session::SessionConfig;

/// Environment prefix, e.g. `PTT__SERVER__URL`
pub const ENV_PREFIX: &str = "PTT";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub audio: AudioConfig,
    pub playback: PlaybackConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Agent server base URL (`http(s)://host:port`)
    pub url: String,
    /// Seconds to wait for a turn to close after sending audio
    pub reply_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub max_recording_secs: u32,
    /// Owner loop period in milliseconds
    pub tick_ms: u64,
    /// `file`, `microphone`, or `memory`
    pub source: String,
    pub input_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// Where replies are written; unset discards them
    pub output_dir: Option<String>,
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
}

impl Config {
    /// Defaults, then `path` (any extension `config` understands, optional),
    /// then `PTT__*` environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("server.url", "http://127.0.0.1:5000")?
            .set_default("server.reply_timeout_secs", 60)?
            .set_default("audio.sample_rate", 48000)?
            .set_default("audio.max_recording_secs", 30)?
            .set_default("audio.tick_ms", 20)?
            .set_default("audio.source", "file")?
            .set_default("playback.fetch_timeout_secs", 30)?
            .set_default("http.enabled", true)?
            .set_default("http.bind", "127.0.0.1")?
            .set_default("http.port", 8765)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("failed to load config from {}", path))?;

        settings
            .try_deserialize()
            .context("invalid configuration")
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            sample_rate: self.audio.sample_rate,
            max_duration_secs: self.audio.max_recording_secs,
            reply_timeout_secs: self.server.reply_timeout_secs,
            ..SessionConfig::default()
        }
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.audio.tick_ms.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.playback.fetch_timeout_secs)
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http.bind, self.http.port)
    }
}
