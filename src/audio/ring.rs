//! Circular capture buffer.
//!
//! Mirrors how a hardware capture ring behaves: a fixed-size buffer written
//! from index 0, wrapping back to 0 once full without telling anyone. The
//! writer side is a cloneable `RingBuffer` handle so a capture thread (or a
//! test) can feed it while the owner thread polls.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::DeviceError;

use super::backend::{CaptureConfig, CaptureDevice};

#[derive(Debug, Default)]
struct RingState {
    samples: Vec<f32>,
    position: usize,
    active: bool,
    total_written: u64,
}

/// Shared handle to a circular sample buffer.
#[derive(Debug, Clone, Default)]
pub struct RingBuffer {
    inner: Arc<Mutex<RingState>>,
}

impl RingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a zeroed ring of `capacity` samples and start accepting writes.
    pub fn activate(&self, capacity: usize) {
        let mut state = self.inner.lock();
        state.samples = vec![0.0; capacity];
        state.position = 0;
        state.total_written = 0;
        state.active = capacity > 0;
    }

    /// Stop accepting writes and release the ring.
    pub fn deactivate(&self) {
        let mut state = self.inner.lock();
        state.active = false;
        state.samples = Vec::new();
        state.position = 0;
    }

    /// Write samples at the current position, wrapping at the end.
    ///
    /// Returns the number of samples written (0 when inactive).
    pub fn write(&self, samples: &[f32]) -> usize {
        let mut state = self.inner.lock();
        if !state.active {
            return 0;
        }

        let capacity = state.samples.len();
        for &sample in samples {
            let pos = state.position;
            state.samples[pos] = sample;
            state.position = (pos + 1) % capacity;
        }
        state.total_written += samples.len() as u64;
        samples.len()
    }

    pub fn is_active(&self) -> bool {
        self.inner.lock().active
    }

    /// Write position, `None` while inactive.
    pub fn position(&self) -> Option<usize> {
        let state = self.inner.lock();
        state.active.then_some(state.position)
    }

    pub fn capacity(&self) -> usize {
        let state = self.inner.lock();
        if state.active {
            state.samples.len()
        } else {
            0
        }
    }

    /// Samples written since activation, including overwritten ones.
    pub fn total_written(&self) -> u64 {
        self.inner.lock().total_written
    }

    /// Copy `len` samples from `offset`; the range is clipped to the ring end.
    pub fn read(&self, offset: usize, len: usize) -> Vec<f32> {
        let state = self.inner.lock();
        let end = offset.saturating_add(len).min(state.samples.len());
        if offset >= end {
            return Vec::new();
        }
        state.samples[offset..end].to_vec()
    }
}

/// Capture device backed by an in-memory ring.
///
/// Nothing writes into the ring by itself; whoever holds `ring()` does.
pub struct RingDevice {
    ring: RingBuffer,
    microphone_present: bool,
    authorized: bool,
    capturing: bool,
}

impl RingDevice {
    pub fn new() -> Self {
        Self {
            ring: RingBuffer::new(),
            microphone_present: true,
            authorized: true,
            capturing: false,
        }
    }

    /// Device that reports no microphone present.
    pub fn without_microphone() -> Self {
        Self {
            microphone_present: false,
            ..Self::new()
        }
    }

    /// Device whose microphone permission was refused.
    pub fn unauthorized() -> Self {
        Self {
            authorized: false,
            ..Self::new()
        }
    }

    /// Writer handle for the ring.
    pub fn ring(&self) -> RingBuffer {
        self.ring.clone()
    }
}

impl Default for RingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureDevice for RingDevice {
    fn is_authorized(&self) -> bool {
        self.authorized
    }

    fn has_microphone(&self) -> bool {
        self.microphone_present
    }

    fn start(&mut self, config: &CaptureConfig) -> Result<(), DeviceError> {
        if !self.microphone_present {
            return Err(DeviceError::NoInputDevice);
        }

        let capacity = config.ring_capacity();
        self.ring.activate(capacity);
        self.capturing = true;

        info!(
            "Ring capture started: {}Hz, {} samples ({}s)",
            config.sample_rate, capacity, config.max_duration_secs
        );
        Ok(())
    }

    fn stop(&mut self) {
        if self.capturing {
            debug!("Ring capture stopped after {} samples", self.ring.total_written());
        }
        self.ring.deactivate();
        self.capturing = false;
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
        "memory-ring"
    }
}
