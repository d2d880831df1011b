//! Reply playback
//!
//! The state machine hands a URL to a `Playback` implementation and gets
//! `PlaybackEvent`s back on its own task. `PlaybackCoordinator` runs
//! fetch → decode → play → wait-for-duration as one cancellable background
//! task. Every hand-off carries a ticket so events from a cancelled
//! hand-off can be told apart from the current one.

pub mod decode;
pub mod fetch;
pub mod sink;

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub use decode::{decode_audio, extension_hint, DecodedAudio};
pub use fetch::{AudioFetcher, HttpFetcher};
pub use sink::{AudioSink, NullSink, WavFileSink};

use crate::error::PlaybackError;

/// Result of one playback hand-off
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackOutcome {
    Completed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    /// Audio decoded and output started
    Started {
        ticket: u64,
        audio: Arc<DecodedAudio>,
    },
    /// Raised exactly once per hand-off
    Finished {
        ticket: u64,
        outcome: PlaybackOutcome,
    },
}

impl PlaybackEvent {
    pub fn ticket(&self) -> u64 {
        match self {
            Self::Started { ticket, .. } | Self::Finished { ticket, .. } => *ticket,
        }
    }
}

/// Seam between the state machine and whatever plays replies
pub trait Playback: Send {
    /// Begin fetching and playing `url`; events for it carry `ticket`.
    fn play(&mut self, ticket: u64, url: String);

    /// Abandon the current hand-off, if any.
    fn cancel(&mut self);
}

pub struct PlaybackCoordinator {
    fetcher: Arc<dyn AudioFetcher>,
    sink: Arc<dyn AudioSink>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
    task: Option<JoinHandle<()>>,
}

impl PlaybackCoordinator {
    /// Create a coordinator and the receiver its events arrive on.
    pub fn new(
        fetcher: Arc<dyn AudioFetcher>,
        sink: Arc<dyn AudioSink>,
    ) -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                fetcher,
                sink,
                events,
                task: None,
            },
            events_rx,
        )
    }

    async fn run(
        ticket: u64,
        url: String,
        fetcher: Arc<dyn AudioFetcher>,
        sink: Arc<dyn AudioSink>,
        events: mpsc::UnboundedSender<PlaybackEvent>,
    ) {
        let outcome = match Self::fetch_and_play(ticket, &url, fetcher, sink, &events).await {
            Ok(()) => PlaybackOutcome::Completed,
            Err(e) => {
                error!("Playback of {} failed: {}", url, e);
                PlaybackOutcome::Failed(e.to_string())
            }
        };
        let _ = events.send(PlaybackEvent::Finished { ticket, outcome });
    }

    async fn fetch_and_play(
        ticket: u64,
        url: &str,
        fetcher: Arc<dyn AudioFetcher>,
        sink: Arc<dyn AudioSink>,
        events: &mpsc::UnboundedSender<PlaybackEvent>,
    ) -> Result<(), PlaybackError> {
        let bytes = fetcher.fetch(url).await?;

        let hint = extension_hint(url).map(str::to_string);
        let audio = tokio::task::spawn_blocking(move || decode_audio(&bytes, hint.as_deref()))
            .await
            .map_err(|e| PlaybackError::Decode(format!("decode task failed: {}", e)))??;
        let audio = Arc::new(audio);

        sink.play(&audio)?;
        info!(
            "Playing reply via {}: {:.2}s",
            sink.name(),
            audio.duration().as_secs_f64()
        );
        let _ = events.send(PlaybackEvent::Started {
            ticket,
            audio: Arc::clone(&audio),
        });

        tokio::time::sleep(audio.duration()).await;
        Ok(())
    }
}

impl Playback for PlaybackCoordinator {
    fn play(&mut self, ticket: u64, url: String) {
        self.cancel();

        let task = tokio::spawn(Self::run(
            ticket,
            url,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.sink),
            self.events.clone(),
        ));
        self.task = Some(task);
    }

    fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                info!("Cancelling reply playback");
                task.abort();
                self.sink.stop();
            }
        }
    }
}

impl Drop for PlaybackCoordinator {
    fn drop(&mut self) {
        self.cancel();
    }
}
