use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use super::config::SessionConfig;
use crate::audio::{CaptureDevice, SampleAccumulator};

/// One press-to-release cycle.
///
/// Created when recording starts; owns the accumulated samples until the
/// recording is finished (or abandoned) and turned into WAV bytes.
pub struct RecordingSession {
    /// Session identifier (log correlation only)
    id: Uuid,

    /// Sample rate of the accumulated samples
    sample_rate: u32,

    /// Samples pulled from the device ring so far
    accumulator: SampleAccumulator,

    /// When recording started
    started_at: DateTime<Utc>,
}

impl RecordingSession {
    pub fn new(config: &SessionConfig) -> Self {
        let session = Self {
            id: Uuid::new_v4(),
            sample_rate: config.sample_rate,
            accumulator: SampleAccumulator::new(),
            started_at: Utc::now(),
        };
        info!(
            "Recording session {} started at {}Hz (max {}s)",
            session.id, session.sample_rate, config.max_duration_secs
        );
        session
    }

    /// Pull whatever the device wrote since the last poll.
    pub fn poll(&mut self, device: &dyn CaptureDevice) {
        self.accumulator
            .poll(device.position(), device.capacity(), |offset, len| {
                device.read(offset, len)
            });
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f32] {
        self.accumulator.samples()
    }

    /// Captured length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.accumulator.len() as f64 / self.sample_rate as f64
    }

    /// Consume the session, yielding its samples in capture order.
    pub fn finish(self) -> Vec<f32> {
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        info!(
            "Recording session {} finished: {} samples ({:.2}s) over {:.2}s wall clock",
            self.id,
            self.accumulator.len(),
            self.duration_secs(),
            elapsed.num_milliseconds() as f64 / 1000.0
        );
        self.accumulator.into_samples()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::RingDevice;

    #[test]
    fn finish_yields_polled_samples_in_order() {
        let config = SessionConfig {
            sample_rate: 8000,
            max_duration_secs: 1,
            ..SessionConfig::default()
        };
        let mut device = RingDevice::new();
        let ring = device.ring();
        device.start(&config.capture()).unwrap();

        let mut session = RecordingSession::new(&config);
        ring.write(&[0.1; 400]);
        session.poll(&device);
        ring.write(&[0.2; 400]);
        session.poll(&device);

        assert_eq!(session.sample_rate(), 8000);
        assert!((session.duration_secs() - 0.1).abs() < 1e-9);

        let samples = session.finish();
        assert_eq!(samples.len(), 800);
        assert_eq!(samples[399], 0.1);
        assert_eq!(samples[400], 0.2);
    }
}
