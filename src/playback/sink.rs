//! Output side of reply playback.
//!
//! `AudioSink::play` starts output and returns; the coordinator waits out the
//! clip duration itself. `WavFileSink` keeps every reply on disk, which is
//! what headless runs and tests need.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::PlaybackError;

use super::decode::DecodedAudio;

pub trait AudioSink: Send + Sync {
    /// Begin playing `audio`.
    fn play(&self, audio: &DecodedAudio) -> Result<(), PlaybackError>;

    /// Cut off playback in progress.
    fn stop(&self) {}

    fn name(&self) -> &str;
}

/// Discards audio.
pub struct NullSink;

impl AudioSink for NullSink {
    fn play(&self, _audio: &DecodedAudio) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "null"
    }
}

/// Writes each reply to `<dir>/reply-<uuid>.wav`.
pub struct WavFileSink {
    dir: PathBuf,
}

impl WavFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, PlaybackError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| PlaybackError::Output(format!("{}: {}", dir.display(), e)))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl AudioSink for WavFileSink {
    fn play(&self, audio: &DecodedAudio) -> Result<(), PlaybackError> {
        let path = self
            .dir
            .join(format!("reply-{}.wav", uuid::Uuid::new_v4()));

        let spec = hound::WavSpec {
            channels: audio.channels,
            sample_rate: audio.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };

        let mut writer = hound::WavWriter::create(&path, spec)
            .map_err(|e| PlaybackError::Output(e.to_string()))?;
        for &sample in &audio.samples {
            writer
                .write_sample(sample)
                .map_err(|e| PlaybackError::Output(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| PlaybackError::Output(e.to_string()))?;

        info!(
            "Reply saved to {} ({:.2}s)",
            path.display(),
            audio.duration().as_secs_f64()
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}
