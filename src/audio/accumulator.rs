//! Lossless extraction of new samples from a circular capture buffer.
//!
//! Called once per tick while recording. Each poll reads exactly the region
//! written since the previous poll. When the write position moved backwards
//! the ring wrapped in between, so the tail (old position up to the ring end)
//! is read before the head (ring start up to the new position).
//!
//! A poll must happen right before the device is stopped, otherwise the last
//! partial segment is lost. The device layer gives no signal when that
//! happens, nor when recording outlasts the ring and old audio is overwritten.

use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct SampleAccumulator {
    samples: Vec<f32>,
    last_read_position: usize,
}

impl SampleAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear accumulated samples and rewind to ring index 0.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.last_read_position = 0;
    }

    /// Append samples written since the last poll.
    ///
    /// `current` is the device write position (`None` when the device is not
    /// ready), `capacity` the ring length (0 when no ring is active), and
    /// `read(offset, len)` copies a contiguous region of the ring.
    pub fn poll<F>(&mut self, current: Option<usize>, capacity: usize, mut read: F)
    where
        F: FnMut(usize, usize) -> Vec<f32>,
    {
        let Some(cur) = current else {
            return;
        };
        if capacity == 0 {
            return;
        }
        if cur >= capacity {
            warn!("Ring position {} outside capacity {}, skipping poll", cur, capacity);
            return;
        }

        let last = self.last_read_position;

        if cur > last {
            self.samples.extend(read(last, cur - last));
        } else if cur < last {
            let tail = read(last, capacity - last);
            let head = read(0, cur);
            debug!(
                "Ring wrapped: {} tail + {} head samples",
                tail.len(),
                head.len()
            );
            self.samples.extend(tail);
            self.samples.extend(head);
        }

        self.last_read_position = cur;
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last_read_position(&self) -> usize {
        self.last_read_position
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}
