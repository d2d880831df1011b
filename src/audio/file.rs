//! WAV file replayed into a capture ring at real-time pace.
//!
//! Stands in for a microphone on machines without one: every press starts
//! the file from the beginning, and a feeder thread writes it into the ring
//! in 10 ms blocks until the device is stopped or the file runs out.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use hound::{SampleFormat, WavReader};
use tracing::{debug, info, warn};

use crate::error::DeviceError;

use super::backend::{CaptureConfig, CaptureDevice};
use super::ring::RingBuffer;

const FEED_BLOCK: Duration = Duration::from_millis(10);

/// Decoded WAV input, downmixed to mono f32.
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub samples: Vec<f32>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DeviceError> {
        let path = path.as_ref();
        info!("Opening capture file: {}", path.display());

        let reader = WavReader::open(path)
            .map_err(|e| DeviceError::Source(format!("{}: {}", path.display(), e)))?;

        let spec = reader.spec();
        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>(),
            SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<Vec<_>, _>>()
            }
        }
        .map_err(|e| DeviceError::Source(format!("failed to read samples: {}", e)))?;

        let samples = to_mono(&interleaved, spec.channels);
        let duration_seconds = samples.len() as f64 / spec.sample_rate as f64;

        info!(
            "Capture file loaded: {:.1}s, {}Hz, {} channels",
            duration_seconds, spec.sample_rate, spec.channels
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            samples,
        })
    }

    /// Samples at `target_rate`, linearly interpolated.
    pub fn resampled(&self, target_rate: u32) -> Vec<f32> {
        resample_linear(&self.samples, self.sample_rate, target_rate)
    }
}

/// Down-mix interleaved audio to mono by averaging channels.
pub(crate) fn to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let ch = channels as usize;
    samples
        .chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Linear resampler for mono f32 audio.
pub(crate) fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || from_rate == 0 || to_rate == 0 {
        return input.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((input.len() as f64) / ratio).floor() as usize;
    let mut output = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src_idx = i as f64 * ratio;
        let idx0 = src_idx.floor() as usize;
        let frac = (src_idx - idx0 as f64) as f32;
        let s0 = input.get(idx0).copied().unwrap_or(0.0);
        let s1 = input.get(idx0 + 1).copied().unwrap_or(s0);
        output.push(s0 + frac * (s1 - s0));
    }
    output
}

/// Capture device that plays a WAV file into its ring.
pub struct FileCaptureDevice {
    path: PathBuf,
    ring: RingBuffer,
    running: Arc<AtomicBool>,
    feeder: Option<JoinHandle<()>>,
}

impl FileCaptureDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ring: RingBuffer::new(),
            running: Arc::new(AtomicBool::new(false)),
            feeder: None,
        }
    }

    fn feed(ring: RingBuffer, samples: Vec<f32>, sample_rate: u32, running: Arc<AtomicBool>) {
        let block = (sample_rate as u128 * FEED_BLOCK.as_millis() / 1000).max(1) as usize;
        let started = Instant::now();

        for (index, chunk) in samples.chunks(block).enumerate() {
            if !running.load(Ordering::SeqCst) {
                break;
            }
            ring.write(chunk);

            // pace against the wall clock so drift does not accumulate
            let due = started + FEED_BLOCK * (index as u32 + 1);
            if let Some(wait) = due.checked_duration_since(Instant::now()) {
                std::thread::sleep(wait);
            }
        }

        debug!("File feeder finished");
    }
}

impl CaptureDevice for FileCaptureDevice {
    fn has_microphone(&self) -> bool {
        self.path.is_file()
    }

    fn start(&mut self, config: &CaptureConfig) -> Result<(), DeviceError> {
        self.stop();

        let audio = AudioFile::open(&self.path)?;
        if audio.sample_rate != config.sample_rate {
            warn!(
                "Resampling capture file from {}Hz to {}Hz",
                audio.sample_rate, config.sample_rate
            );
        }
        let samples = audio.resampled(config.sample_rate);

        self.ring.activate(config.ring_capacity());
        self.running.store(true, Ordering::SeqCst);

        let ring = self.ring.clone();
        let running = Arc::clone(&self.running);
        let sample_rate = config.sample_rate;
        let handle = std::thread::Builder::new()
            .name("file-capture".to_string())
            .spawn(move || Self::feed(ring, samples, sample_rate, running))?;
        self.feeder = Some(handle);

        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.feeder.take() {
            if handle.join().is_err() {
                warn!("File feeder thread panicked");
            }
        }
        self.ring.deactivate();
    }

    fn position(&self) -> Option<usize> {
        self.ring.position()
    }

    fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    fn read(&self, offset: usize, len: usize) -> Vec<f32> {
        self.ring.read(offset, len)
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}

impl Drop for FileCaptureDevice {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_channels() {
        let stereo = [1.0, 0.0, 0.5, 0.5];
        assert_eq!(to_mono(&stereo, 2), vec![0.5, 0.5]);
    }

    #[test]
    fn resample_halves_length() {
        let input: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let output = resample_linear(&input, 48000, 24000);
        assert_eq!(output.len(), 50);
        assert_eq!(output[1], 2.0);
    }
}
