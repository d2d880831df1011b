use std::io::{self, BufRead};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ptt_voice::playback::{AudioSink, NullSink, PlaybackCoordinator, WavFileSink};
use ptt_voice::signaling::websocket;
use ptt_voice::{
    create_router, AppState, CaptureDeviceFactory, CaptureSource, Config, HttpFetcher,
    InputHandle, SignalingChannel, VoiceClient,
};

#[derive(Debug, Parser)]
#[command(name = "ptt-voice", version, about = "Push-to-talk voice client")]
struct Args {
    /// Config file (without extension is fine)
    #[arg(long, default_value = "config/ptt-voice")]
    config: String,

    /// Agent server URL, overrides server.url
    #[arg(long)]
    server_url: Option<String>,

    /// WAV file to use as the capture source
    #[arg(long)]
    input_wav: Option<String>,

    /// Directory replies are written to
    #[arg(long)]
    reply_dir: Option<String>,

    /// Disable the HTTP control surface
    #[arg(long)]
    no_http: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;

    if let Some(url) = args.server_url {
        cfg.server.url = url;
    }
    if let Some(path) = args.input_wav {
        cfg.audio.source = "file".to_string();
        cfg.audio.input_file = Some(path);
    }
    if let Some(dir) = args.reply_dir {
        cfg.playback.output_dir = Some(dir);
    }
    if args.no_http {
        cfg.http.enabled = false;
    }

    info!("ptt-voice v{}", env!("CARGO_PKG_VERSION"));
    info!("Server: {}", cfg.server.url);
    info!(
        "Capture: {} at {}Hz, max {}s",
        cfg.audio.source, cfg.audio.sample_rate, cfg.audio.max_recording_secs
    );

    let source = CaptureSource::from_setting(&cfg.audio.source, cfg.audio.input_file.as_deref())
        .context("invalid capture source")?;
    let device = CaptureDeviceFactory::create(source).context("failed to create capture device")?;

    let sink: Arc<dyn AudioSink> = match &cfg.playback.output_dir {
        Some(dir) => {
            let sink = WavFileSink::new(dir)?;
            info!("Replies will be written to {}", sink.dir().display());
            Arc::new(sink)
        }
        None => {
            warn!("playback.output_dir not set, replies are discarded");
            Arc::new(NullSink)
        }
    };
    let fetcher = Arc::new(HttpFetcher::new(cfg.fetch_timeout())?);
    let (coordinator, playback_events) = PlaybackCoordinator::new(fetcher, sink);

    let (channel, endpoint) = SignalingChannel::new();
    let mut client = VoiceClient::new(
        cfg.session(),
        device,
        channel,
        Box::new(coordinator),
        playback_events,
    );

    let observers = client.observers();
    spawn_status_logger(&observers);

    // without microphone access there is nothing to talk with
    let transport = if client.check_permission() {
        Some(websocket::spawn(cfg.server.url.clone(), endpoint))
    } else {
        error!("Microphone permission denied, not connecting");
        drop(endpoint);
        None
    };

    let input = client.input_handle();
    spawn_stdin_toggle(input.clone());

    if cfg.http.enabled {
        let addr = cfg.http_addr();
        let app = create_router(AppState::new(input, observers));
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind HTTP control surface on {}", addr))?;
        info!("HTTP control surface listening on {}", addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("HTTP server error: {}", e);
            }
        });
    }

    info!("Type a line and press Enter to start/stop recording, Ctrl+C to quit");
    client
        .run(cfg.tick(), async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
        })
        .await;

    if let Some(transport) = transport {
        transport.abort();
    }
    info!("Shutdown complete");
    Ok(())
}

/// Mirror every status change into the log.
fn spawn_status_logger(observers: &ptt_voice::Observers) {
    let mut status = observers.subscribe_status();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let update = status.borrow_and_update().clone();
            info!(level = ?update.level, "{}", update.text);
        }
    });
}

/// Each non-empty stdin line toggles recording.
fn spawn_stdin_toggle(input: InputHandle) {
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(text) => {
                    if text.trim().is_empty() {
                        continue;
                    }
                    if !input.toggle() {
                        break;
                    }
                }
                Err(e) => {
                    error!("stdin read error: {}", e);
                    break;
                }
            }
        }
    });
}
