//! Single-owner client loop.
//!
//! Every handler runs on the task that owns the `VoiceClient`: channel
//! updates, playback events, and local input are queued by their producers
//! and drained once per tick, followed by a capture poll.

use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::audio::CaptureDevice;
use crate::playback::{Playback, PlaybackEvent};
use crate::session::{Observers, SessionConfig, SessionState, SessionStateMachine};
use crate::signaling::{ConnectionState, SignalingChannel};

/// Local push-to-talk trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Press,
    Release,
    /// Press when idle, release when recording
    Toggle,
}

/// Cloneable handle any input surface can use to drive the client
#[derive(Debug, Clone)]
pub struct InputHandle {
    tx: mpsc::UnboundedSender<InputEvent>,
}

impl InputHandle {
    /// Returns false once the client has shut down.
    pub fn request_start(&self) -> bool {
        self.send(InputEvent::Press)
    }

    pub fn request_stop(&self) -> bool {
        self.send(InputEvent::Release)
    }

    pub fn toggle(&self) -> bool {
        self.send(InputEvent::Toggle)
    }

    fn send(&self, event: InputEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

pub struct VoiceClient {
    machine: SessionStateMachine,
    channel: SignalingChannel,
    playback_events: mpsc::UnboundedReceiver<PlaybackEvent>,
    input_tx: mpsc::UnboundedSender<InputEvent>,
    input_rx: mpsc::UnboundedReceiver<InputEvent>,
}

impl VoiceClient {
    pub fn new(
        config: SessionConfig,
        device: Box<dyn CaptureDevice>,
        channel: SignalingChannel,
        playback: Box<dyn Playback>,
        playback_events: mpsc::UnboundedReceiver<PlaybackEvent>,
    ) -> Self {
        Self::with_observers(
            config,
            device,
            channel,
            playback,
            playback_events,
            Observers::new(),
        )
    }

    pub fn with_observers(
        config: SessionConfig,
        device: Box<dyn CaptureDevice>,
        channel: SignalingChannel,
        playback: Box<dyn Playback>,
        playback_events: mpsc::UnboundedReceiver<PlaybackEvent>,
        observers: Observers,
    ) -> Self {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        Self {
            machine: SessionStateMachine::new(config, device, playback, observers),
            channel,
            playback_events,
            input_tx,
            input_rx,
        }
    }

    pub fn input_handle(&self) -> InputHandle {
        InputHandle {
            tx: self.input_tx.clone(),
        }
    }

    pub fn observers(&self) -> Observers {
        self.machine.observers().clone()
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.channel.state()
    }

    /// Checks microphone permission, surfacing a denial once.
    pub fn check_permission(&mut self) -> bool {
        self.machine.check_permission()
    }

    /// One pass of the owner loop.
    pub fn tick(&mut self) {
        for update in self.channel.drain() {
            self.machine.handle_channel_update(update);
        }
        self.machine.check_reply_timeout(Instant::now());

        while let Ok(event) = self.playback_events.try_recv() {
            self.machine.handle_playback(event);
        }

        while let Ok(event) = self.input_rx.try_recv() {
            self.handle_input(event);
        }

        self.machine.poll_capture();
    }

    fn handle_input(&mut self, event: InputEvent) {
        debug!("Input: {:?}", event);
        let event = match event {
            InputEvent::Toggle if self.machine.state() == SessionState::Recording => {
                InputEvent::Release
            }
            InputEvent::Toggle => InputEvent::Press,
            other => other,
        };

        let result = match event {
            InputEvent::Release => self.machine.request_stop(&self.channel),
            _ => self.machine.request_start(&self.channel),
        };
        if let Err(e) = result {
            warn!("Push-to-talk request rejected: {}", e);
        }
    }

    /// Tick every `period` until `shutdown` resolves, then release the
    /// device and any playback.
    pub async fn run<F>(mut self, period: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!("Client loop running, tick {}ms", period.as_millis());
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => self.tick(),
            }
        }

        info!("Client loop stopping");
        self.machine.shutdown();
    }
}
