// Integration tests for the push-to-talk state machine
//
// Drives SessionStateMachine directly: a RingDevice stands in for the
// microphone, the transport endpoint of a SignalingChannel is used to inject
// server traffic and observe what the client emits, and a scripted Playback
// records hand-offs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use parking_lot::Mutex;
use serde_json::json;

use ptt_voice::audio::{RingBuffer, RingDevice};
use ptt_voice::playback::{DecodedAudio, Playback, PlaybackEvent, PlaybackOutcome};
use ptt_voice::session::{
    SessionConfig, SessionState, SessionStateMachine, StatusLevel, Observers,
    STATUS_NOT_CONNECTED, STATUS_NO_MICROPHONE, STATUS_PERMISSION_DENIED, STATUS_PROCESSING,
    STATUS_READY, STATUS_RECORDING, STATUS_REPLY_TIMEOUT, STATUS_SPEAKING,
};
use ptt_voice::signaling::{
    ConnectionState, OutboundEvent, SignalingChannel, TransportEndpoint, TransportEvent,
};

#[derive(Debug, Clone, PartialEq)]
enum PlaybackCall {
    Play(u64, String),
    Cancel,
}

#[derive(Clone, Default)]
struct ScriptedPlayback {
    calls: Arc<Mutex<Vec<PlaybackCall>>>,
}

impl Playback for ScriptedPlayback {
    fn play(&mut self, ticket: u64, url: String) {
        self.calls.lock().push(PlaybackCall::Play(ticket, url));
    }

    fn cancel(&mut self) {
        self.calls.lock().push(PlaybackCall::Cancel);
    }
}

struct Harness {
    machine: SessionStateMachine,
    channel: SignalingChannel,
    endpoint: TransportEndpoint,
    ring: RingBuffer,
    playback: ScriptedPlayback,
}

impl Harness {
    fn new(device: RingDevice) -> Self {
        let ring = device.ring();
        let playback = ScriptedPlayback::default();
        let config = SessionConfig {
            sample_rate: 16000,
            max_duration_secs: 1,
            stream_format: "wav".to_string(),
            reply_timeout_secs: 1,
        };
        let machine = SessionStateMachine::new(
            config,
            Box::new(device),
            Box::new(playback.clone()),
            Observers::new(),
        );
        let (channel, endpoint) = SignalingChannel::new();
        Self {
            machine,
            channel,
            endpoint,
            ring,
            playback,
        }
    }

    fn connected() -> Self {
        let mut harness = Self::new(RingDevice::new());
        harness.transport(TransportEvent::Connected);
        harness
    }

    /// Push a transport event and run the resulting updates through the machine.
    fn transport(&mut self, event: TransportEvent) {
        self.endpoint.inbound.send(event).ok();
        for update in self.channel.drain() {
            self.machine.handle_channel_update(update);
        }
    }

    fn server(&mut self, event: &str, payload: serde_json::Value) {
        self.transport(TransportEvent::Frame {
            event: event.to_string(),
            payload,
        });
    }

    fn outbound(&mut self) -> Vec<OutboundEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.endpoint.outbound.try_recv() {
            events.push(event);
        }
        events
    }

    fn outbound_names(&mut self) -> Vec<&'static str> {
        self.outbound().iter().map(OutboundEvent::name).collect()
    }

    fn status(&self) -> String {
        self.machine.observers().snapshot().status.text
    }

    fn start(&mut self) {
        let _ = self.machine.request_start(&self.channel);
    }

    fn stop(&mut self) {
        let _ = self.machine.request_stop(&self.channel);
    }

    fn calls(&self) -> Vec<PlaybackCall> {
        self.playback.calls.lock().clone()
    }
}

fn reply_audio() -> Arc<DecodedAudio> {
    Arc::new(DecodedAudio {
        samples: vec![0.0; 160],
        sample_rate: 16000,
        channels: 1,
    })
}

#[test]
fn test_start_while_disconnected_stays_idle() {
    let mut h = Harness::new(RingDevice::new());

    let result = h.machine.request_start(&h.channel);

    assert!(result.is_err());
    assert_eq!(h.machine.state(), SessionState::Idle);
    assert_eq!(h.status(), STATUS_NOT_CONNECTED);
    // the device was never opened
    assert!(!h.ring.is_active());
    assert!(h.outbound().is_empty());
}

#[test]
fn test_start_without_microphone() {
    let mut h = Harness::new(RingDevice::without_microphone());
    h.transport(TransportEvent::Connected);

    h.start();

    assert_eq!(h.machine.state(), SessionState::Idle);
    assert_eq!(h.status(), STATUS_NO_MICROPHONE);
    assert!(h.outbound().is_empty());
}

#[test]
fn test_permission_denied_is_surfaced() {
    let mut h = Harness::new(RingDevice::unauthorized());
    h.transport(TransportEvent::Connected);

    h.start();

    assert_eq!(h.machine.state(), SessionState::Idle);
    let status = h.machine.observers().snapshot().status;
    assert_eq!(status.text, STATUS_PERMISSION_DENIED);
    assert_eq!(status.level, StatusLevel::Error);
    assert!(!h.ring.is_active());
}

#[test]
fn test_full_turn_returns_to_idle() -> Result<()> {
    let mut h = Harness::connected();
    let mut states = h.machine.observers().subscribe_session_state();

    h.start();
    assert_eq!(h.machine.state(), SessionState::Recording);
    assert_eq!(h.status(), STATUS_RECORDING);
    assert_eq!(
        h.outbound().first().and_then(OutboundEvent::json_payload),
        Some(json!({ "format": "wav" }))
    );

    h.ring.write(&[0.5; 100]);
    h.machine.poll_capture();
    h.ring.write(&[-0.5; 50]);
    h.stop();

    assert_eq!(h.machine.state(), SessionState::AwaitingReply);
    assert_eq!(h.status(), STATUS_PROCESSING);
    let sent = h.outbound();
    assert_eq!(sent.len(), 2);
    match &sent[0] {
        OutboundEvent::Message(wav) => assert_eq!(wav.data_len(), 150 * 2),
        other => panic!("expected message, got {:?}", other),
    }
    assert_eq!(sent[1].name(), "stop_stream");

    h.server("transcript", json!({ "transcript": "hello there" }));
    h.server("response_text", json!({ "text": "hi!" }));
    h.server("audio_ready", json!({ "audio_url": "http://127.0.0.1:5000/audio/reply" }));

    let snapshot = h.machine.observers().snapshot();
    assert_eq!(snapshot.transcript.as_deref(), Some("hello there"));
    assert_eq!(snapshot.response.as_deref(), Some("hi!"));
    assert_eq!(h.machine.state(), SessionState::Playing);
    assert_eq!(
        h.calls(),
        vec![PlaybackCall::Play(1, "http://127.0.0.1:5000/audio/reply".to_string())]
    );

    let audio = reply_audio();
    h.machine.handle_playback(PlaybackEvent::Started {
        ticket: 1,
        audio: Arc::clone(&audio),
    });
    assert_eq!(h.status(), STATUS_SPEAKING);
    assert!(h.machine.observers().subscribe_audio().borrow().is_some());

    h.machine.handle_playback(PlaybackEvent::Finished {
        ticket: 1,
        outcome: PlaybackOutcome::Completed,
    });

    assert_eq!(h.machine.state(), SessionState::Idle);
    let status = h.machine.observers().snapshot().status;
    assert_eq!(status.text, STATUS_READY);
    assert_eq!(status.level, StatusLevel::Ready);
    assert!(states.has_changed()?);
    assert_eq!(*states.borrow_and_update(), SessionState::Idle);

    Ok(())
}

#[test]
fn test_outbound_order_is_start_message_stop() {
    let mut h = Harness::connected();

    h.start();
    h.ring.write(&[0.1; 32]);
    h.stop();

    assert_eq!(h.outbound_names(), vec!["start_stream", "message", "stop_stream"]);
}

#[test]
fn test_stop_flushes_partial_segment() {
    let mut h = Harness::connected();

    h.start();
    h.ring.write(&[0.25; 10]);
    h.machine.poll_capture();
    // written after the last tick, only the final poll picks it up
    h.ring.write(&[0.25; 7]);
    h.stop();

    let message = h
        .outbound()
        .into_iter()
        .find_map(|event| match event {
            OutboundEvent::Message(wav) => Some(wav),
            _ => None,
        });
    assert_eq!(message.map(|wav| wav.data_len()), Some(17 * 2));
    assert!(!h.ring.is_active(), "device should be released on stop");
}

#[test]
fn test_recording_across_ring_wrap() {
    let mut h = Harness::connected();

    // ring holds 16000 samples (16kHz * 1s)
    h.start();
    h.ring.write(&vec![0.1; 15000]);
    h.machine.poll_capture();
    h.ring.write(&vec![0.2; 2000]);
    h.stop();

    let message = h.outbound().into_iter().find_map(|event| match event {
        OutboundEvent::Message(wav) => Some(wav),
        _ => None,
    });
    assert_eq!(message.map(|wav| wav.data_len()), Some(17000 * 2));
}

#[test]
fn test_empty_recording_still_stops_stream() {
    let mut h = Harness::connected();

    h.start();
    h.stop();

    assert_eq!(h.outbound_names(), vec!["start_stream", "stop_stream"]);
    assert_eq!(h.machine.state(), SessionState::AwaitingReply);
}

#[test]
fn test_duplicate_stop_emits_once() {
    let mut h = Harness::connected();

    h.start();
    h.ring.write(&[0.1; 8]);
    h.stop();
    h.stop();
    h.stop();

    assert_eq!(h.outbound_names(), vec!["start_stream", "message", "stop_stream"]);
}

#[test]
fn test_start_ignored_while_busy() {
    let mut h = Harness::connected();

    h.start();
    h.start();
    assert_eq!(h.outbound_names(), vec!["start_stream"]);

    h.stop();
    h.outbound();
    h.start();
    assert_eq!(h.machine.state(), SessionState::AwaitingReply);
    assert!(h.outbound().is_empty());
}

#[test]
fn test_disconnect_while_recording_abandons_session() {
    let mut h = Harness::connected();

    h.start();
    h.ring.write(&[0.3; 64]);
    h.machine.poll_capture();
    h.outbound();

    h.transport(TransportEvent::Disconnected("server went away".to_string()));

    assert_eq!(h.machine.state(), SessionState::Idle);
    assert!(!h.ring.is_active());
    assert_eq!(
        h.machine.observers().snapshot().connection,
        ConnectionState::Disconnected
    );

    // a late release has nothing left to send
    h.stop();
    assert!(h.outbound().is_empty());
}

#[test]
fn test_connection_error_during_playback_cancels_it() {
    let mut h = Harness::connected();

    h.start();
    h.ring.write(&[0.3; 64]);
    h.stop();
    h.server("audio_ready", json!({ "audio_url": "/audio/a.wav" }));
    assert_eq!(h.machine.state(), SessionState::Playing);

    h.transport(TransportEvent::Error("reset by peer".to_string()));

    assert_eq!(h.machine.state(), SessionState::Idle);
    assert_eq!(h.calls().last(), Some(&PlaybackCall::Cancel));
    assert_eq!(
        h.machine.observers().snapshot().status.level,
        StatusLevel::Error
    );
}

#[test]
fn test_audio_ready_outside_awaiting_reply_is_ignored() {
    let mut h = Harness::connected();

    h.server("audio_ready", json!({ "audio_url": "/audio/stray.wav" }));

    assert_eq!(h.machine.state(), SessionState::Idle);
    assert!(h.calls().is_empty());
}

#[test]
fn test_stale_playback_events_are_ignored() {
    let mut h = Harness::connected();

    h.start();
    h.ring.write(&[0.3; 64]);
    h.stop();
    h.server("audio_ready", json!({ "audio_url": "/audio/a.wav" }));

    h.machine.handle_playback(PlaybackEvent::Finished {
        ticket: 99,
        outcome: PlaybackOutcome::Completed,
    });

    assert_eq!(h.machine.state(), SessionState::Playing);
}

#[test]
fn test_playback_failure_surfaces_error_and_returns_to_idle() {
    let mut h = Harness::connected();

    h.start();
    h.ring.write(&[0.3; 64]);
    h.stop();
    h.server("audio_ready", json!({ "audio_url": "/audio/missing.wav" }));

    h.machine.handle_playback(PlaybackEvent::Finished {
        ticket: 1,
        outcome: PlaybackOutcome::Failed("audio server returned HTTP 404".to_string()),
    });

    assert_eq!(h.machine.state(), SessionState::Idle);
    let status = h.machine.observers().snapshot().status;
    assert_eq!(status.text, "Error playing audio: audio server returned HTTP 404");
    assert_eq!(status.level, StatusLevel::Error);
}

#[test]
fn test_server_error_ends_the_turn() {
    let mut h = Harness::connected();

    h.start();
    h.stop();
    h.server("error", json!({ "message": "No audio recorded. Try again." }));

    assert_eq!(h.machine.state(), SessionState::Idle);
    let status = h.machine.observers().snapshot().status;
    assert_eq!(status.text, "No audio recorded. Try again.");
    assert_eq!(status.level, StatusLevel::Error);
}

#[test]
fn test_second_turn_after_reply() {
    let mut h = Harness::connected();

    for turn in 1..=2u64 {
        h.start();
        h.ring.write(&[0.2; 20]);
        h.stop();
        h.server("audio_ready", json!({ "audio_url": format!("/audio/{}.wav", turn) }));
        h.machine.handle_playback(PlaybackEvent::Finished {
            ticket: turn,
            outcome: PlaybackOutcome::Completed,
        });
        assert_eq!(h.machine.state(), SessionState::Idle);
    }

    assert_eq!(
        h.outbound_names(),
        vec![
            "start_stream",
            "message",
            "stop_stream",
            "start_stream",
            "message",
            "stop_stream"
        ]
    );
}

#[test]
fn test_failure_status_ends_the_turn() {
    let mut h = Harness::connected();

    h.start();
    h.ring.write(&[0.1; 320]);
    h.stop();
    h.outbound();
    h.server("status", json!({ "message": "Server processing error." }));

    assert_eq!(h.machine.state(), SessionState::Idle);
    let status = h.machine.observers().snapshot().status;
    assert_eq!(status.text, "Server processing error.");
    assert_eq!(status.level, StatusLevel::Error);

    // a new press starts the next turn
    h.start();
    assert_eq!(h.machine.state(), SessionState::Recording);
    assert_eq!(h.outbound_names(), vec!["start_stream"]);
}

#[test]
fn test_unavailable_status_ends_the_turn() {
    let mut h = Harness::connected();

    h.start();
    h.ring.write(&[0.1; 320]);
    h.stop();
    h.server(
        "status",
        json!({ "message": "Service temporarily unavailable. Please try again." }),
    );

    assert_eq!(h.machine.state(), SessionState::Idle);
    let status = h.machine.observers().snapshot().status;
    assert_eq!(status.text, "Service temporarily unavailable. Please try again.");
    assert_eq!(status.level, StatusLevel::Error);
}

#[test]
fn test_text_only_turn_returns_to_idle() {
    let mut h = Harness::connected();

    h.start();
    h.ring.write(&[0.1; 320]);
    h.stop();
    h.server("status", json!({ "message": "Transcribing..." }));
    assert_eq!(h.machine.state(), SessionState::AwaitingReply);

    h.server("transcript", json!({ "transcript": "what time is it" }));
    h.server("response_text", json!({ "text": "It is noon." }));
    assert_eq!(h.machine.state(), SessionState::AwaitingReply);

    h.server("status", json!({ "message": "Response sent successfully." }));

    assert_eq!(h.machine.state(), SessionState::Idle);
    assert!(h.calls().is_empty());
    assert_eq!(h.machine.observers().snapshot().response.as_deref(), Some("It is noon."));
}

#[test]
fn test_closing_status_after_audio_ready_keeps_playing() {
    let mut h = Harness::connected();

    h.start();
    h.ring.write(&[0.1; 32]);
    h.stop();
    h.server("audio_ready", json!({ "audio_url": "/audio/reply.wav" }));
    h.server("status", json!({ "message": "Response sent successfully." }));

    assert_eq!(h.machine.state(), SessionState::Playing);
    assert!(!h.calls().contains(&PlaybackCall::Cancel));
}

#[test]
fn test_reply_timeout_ends_the_turn() {
    let mut h = Harness::connected();

    h.start();
    h.ring.write(&[0.1; 32]);
    h.stop();

    // within the 1s timeout nothing changes
    h.machine.check_reply_timeout(Instant::now());
    assert_eq!(h.machine.state(), SessionState::AwaitingReply);

    h.machine.check_reply_timeout(Instant::now() + Duration::from_secs(2));

    assert_eq!(h.machine.state(), SessionState::Idle);
    let status = h.machine.observers().snapshot().status;
    assert_eq!(status.text, STATUS_REPLY_TIMEOUT);
    assert_eq!(status.level, StatusLevel::Error);
}

#[test]
fn test_reply_timeout_ignored_outside_awaiting_reply() {
    let mut h = Harness::connected();

    h.start();
    h.machine.check_reply_timeout(Instant::now() + Duration::from_secs(5));

    assert_eq!(h.machine.state(), SessionState::Recording);
    assert_eq!(h.status(), STATUS_RECORDING);
}
