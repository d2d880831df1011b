pub mod accumulator;
pub mod backend;
pub mod file;
pub mod ring;
pub mod wav;

#[cfg(feature = "microphone")]
pub mod microphone;

pub use accumulator::SampleAccumulator;
pub use backend::{CaptureConfig, CaptureDevice, CaptureDeviceFactory, CaptureSource};
pub use file::{AudioFile, FileCaptureDevice};
pub use ring::{RingBuffer, RingDevice};
pub use wav::{encode, encode_wav, quantize, PcmFormat, WavBuffer, WAV_HEADER_LEN};
