use std::path::PathBuf;

use crate::error::DeviceError;

use super::file::FileCaptureDevice;
use super::ring::RingDevice;

/// Configuration for one capture run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Sample rate of the ring buffer in Hz
    pub sample_rate: u32,
    /// Ring length in seconds; older audio is overwritten once it is full
    pub max_duration_secs: u32,
}

impl CaptureConfig {
    /// Ring capacity in samples (mono).
    pub fn ring_capacity(&self) -> usize {
        self.sample_rate as usize * self.max_duration_secs as usize
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            max_duration_secs: 30,
        }
    }
}

/// Capture device exposing a circular recording buffer
///
/// The device keeps overwriting its ring from index 0 once it is full. Callers
/// observe it only through the write position and a read primitive, and must
/// poll often enough to keep up.
///
/// Implementations:
/// - `RingDevice`: in-memory ring written through a `RingBuffer` handle
/// - `FileCaptureDevice`: feeds a WAV file into a ring at real-time pace
/// - `MicrophoneDevice` (feature `microphone`): cpal default input
pub trait CaptureDevice: Send {
    /// Whether the platform granted microphone access
    fn is_authorized(&self) -> bool {
        true
    }

    /// Whether a microphone is present right now
    fn has_microphone(&self) -> bool;

    /// Open the device and start writing into a fresh ring
    fn start(&mut self, config: &CaptureConfig) -> Result<(), DeviceError>;

    /// Stop writing and release the device
    fn stop(&mut self);

    /// Current write position in the ring, `None` while the device is not ready
    fn position(&self) -> Option<usize>;

    /// Ring capacity in samples, 0 when no ring is active
    fn capacity(&self) -> usize;

    /// Copy `len` samples starting at `offset` (no wrapping)
    fn read(&self, offset: usize, len: usize) -> Vec<f32>;

    /// Get device name for logging
    fn name(&self) -> &str;
}

/// Capture device factory
pub struct CaptureDeviceFactory;

impl CaptureDeviceFactory {
    /// Create a capture device for the given source
    pub fn create(source: CaptureSource) -> Result<Box<dyn CaptureDevice>, DeviceError> {
        match source {
            CaptureSource::Memory => Ok(Box::new(RingDevice::new())),

            CaptureSource::File(path) => Ok(Box::new(FileCaptureDevice::new(path))),

            CaptureSource::Microphone => {
                #[cfg(feature = "microphone")]
                {
                    use super::microphone::MicrophoneDevice;
                    Ok(Box::new(MicrophoneDevice::new()))
                }

                #[cfg(not(feature = "microphone"))]
                {
                    Err(DeviceError::Stream(
                        "microphone capture requires the `microphone` feature".to_string(),
                    ))
                }
            }
        }
    }
}

/// Capture source type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureSource {
    /// In-memory ring with no writer attached
    Memory,
    /// WAV file replayed in real time (headless runs)
    File(PathBuf),
    /// Default input device (requires the `microphone` feature)
    Microphone,
}

impl CaptureSource {
    /// Parse the `audio.source` setting.
    pub fn from_setting(source: &str, input_file: Option<&str>) -> Result<Self, DeviceError> {
        match source {
            "memory" => Ok(Self::Memory),
            "microphone" => Ok(Self::Microphone),
            "file" => input_file
                .map(|path| Self::File(PathBuf::from(path)))
                .ok_or_else(|| DeviceError::Source("audio.input_file is not set".to_string())),
            other => Err(DeviceError::Source(format!("unknown capture source: {}", other))),
        }
    }
}
