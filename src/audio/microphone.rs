//! Default input device via cpal.
//!
//! The cpal stream lives on its own thread (streams are not `Send` on every
//! host); its callback downmixes, resamples to the session rate, and writes
//! into the capture ring.

use std::sync::mpsc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, warn};

use crate::error::DeviceError;

use super::backend::{CaptureConfig, CaptureDevice};
use super::file::{resample_linear, to_mono};
use super::ring::RingBuffer;

pub struct MicrophoneDevice {
    ring: RingBuffer,
    stop_tx: Option<mpsc::Sender<()>>,
    stream_thread: Option<JoinHandle<()>>,
}

impl MicrophoneDevice {
    pub fn new() -> Self {
        Self {
            ring: RingBuffer::new(),
            stop_tx: None,
            stream_thread: None,
        }
    }

    fn run_stream(
        ring: RingBuffer,
        target_rate: u32,
        ready_tx: mpsc::Sender<Result<(), DeviceError>>,
        stop_rx: mpsc::Receiver<()>,
    ) {
        let stream = match Self::build_stream(ring, target_rate) {
            Ok(stream) => stream,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };

        if let Err(e) = stream.play() {
            let _ = ready_tx.send(Err(DeviceError::Stream(e.to_string())));
            return;
        }
        let _ = ready_tx.send(Ok(()));

        // Blocks until stop() or the device is dropped.
        let _ = stop_rx.recv();
        drop(stream);
    }

    fn build_stream(ring: RingBuffer, target_rate: u32) -> Result<cpal::Stream, DeviceError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(DeviceError::NoInputDevice)?;

        let default_config = device
            .default_input_config()
            .map_err(|e| DeviceError::Stream(e.to_string()))?;
        let native_rate = default_config.sample_rate().0;
        let channels = default_config.channels();

        info!(
            device = %device.name().unwrap_or_else(|_| "unknown".into()),
            native_rate,
            channels,
            "Opening input device"
        );

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(native_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                    let mono = to_mono(data, channels);
                    let samples = resample_linear(&mono, native_rate, target_rate);
                    ring.write(&samples);
                },
                move |err| {
                    error!("Audio input stream error: {}", err);
                },
                None,
            )
            .map_err(|e| DeviceError::Stream(e.to_string()))
    }
}

impl Default for MicrophoneDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureDevice for MicrophoneDevice {
    fn has_microphone(&self) -> bool {
        cpal::default_host().default_input_device().is_some()
    }

    fn start(&mut self, config: &CaptureConfig) -> Result<(), DeviceError> {
        self.stop();
        self.ring.activate(config.ring_capacity());

        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel();
        let ring = self.ring.clone();
        let target_rate = config.sample_rate;

        let handle = std::thread::Builder::new()
            .name("microphone".to_string())
            .spawn(move || Self::run_stream(ring, target_rate, ready_tx, stop_rx))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.stop_tx = Some(stop_tx);
                self.stream_thread = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                self.ring.deactivate();
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                self.ring.deactivate();
                Err(DeviceError::Stream("microphone thread exited".to_string()))
            }
        }
    }

    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.stream_thread.take() {
            if handle.join().is_err() {
                warn!("Microphone thread panicked");
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
        "microphone"
    }
}

impl Drop for MicrophoneDevice {
    fn drop(&mut self) {
        self.stop();
    }
}
