use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clipplayer::audio::CpalAudioRenderer;
use clipplayer::media::{SyntheticDecoder, VideoFrame};
use clipplayer::player::PlayerBuilder;
use clipplayer::utils::{config::Config, format_duration};
use clipplayer::{MediaSource, PlayerEvent, PlayerEventHandler, RenderSink};

/// ClipPlayer engine demo: plays a synthetic source through the full
/// sync pipeline and exercises pause/seek/speed from the command line.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Media file to pretend to play (the synthetic source stands in)
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Clip duration in seconds
    #[arg(long, default_value = "10")]
    duration: u64,

    /// Playback speed
    #[arg(short, long, default_value = "1.0")]
    speed: f32,

    /// Set initial volume (0-100)
    #[arg(short, long, value_name = "VOLUME", default_value = "70")]
    volume: u8,

    /// Disable audio output
    #[arg(long)]
    no_audio: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

/// Sink that logs presentation instead of drawing
struct LoggingSink;

impl RenderSink for LoggingSink {
    fn present_video(&self, frame: VideoFrame) {
        log::trace!("Presented {}x{} frame", frame.width, frame.height);
    }

    fn present_subtitle(&self, text: &str, changed: bool) {
        if changed && !text.is_empty() {
            info!("Subtitle: {}", text);
        }
    }
}

struct LoggingEventHandler;

impl PlayerEventHandler for LoggingEventHandler {
    fn handle_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::StateChanged { state } => info!("State: {:?}", state),
            PlayerEvent::SpeedChanged { speed } => info!("Speed: {:.2}x", speed),
            PlayerEvent::VolumeChanged { volume } => info!("Volume: {:.0}%", volume * 100.0),
            PlayerEvent::EndOfMedia => info!("End of media reached"),
            PlayerEvent::Error { ref message } => error!("Player error: {}", message),
            PlayerEvent::PositionChanged { .. } => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    info!("Starting ClipPlayer v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load().unwrap_or_else(|e| {
        error!("Config load failed, using defaults: {}", e);
        Config::default()
    });
    config.audio.volume = (args.volume as f32) / 100.0;
    config.playback.speed = args.speed;

    let decoder = Arc::new(SyntheticDecoder::new(Duration::from_secs(args.duration)));

    let mut builder = PlayerBuilder::new()
        .with_decoder(decoder)
        .with_video_sink(Arc::new(LoggingSink))
        .with_config(config);
    if !args.no_audio {
        builder = builder.with_audio_renderer(Arc::new(CpalAudioRenderer::new()));
    }
    let player = builder.build()?;
    player.add_event_handler(Box::new(LoggingEventHandler));

    let source = match args.file {
        Some(path) => MediaSource::File(path),
        None => MediaSource::Url("synthetic://tone".to_string()),
    };
    let info = player.open(&source)?;
    info!(
        "Opened {} ({:?}, video: {}, audio: {})",
        source.describe(),
        info.duration,
        info.has_video(),
        info.has_audio()
    );

    player.start()?;

    // Scripted tour of the engine, interruptible with Ctrl+C.
    let demo = async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        if let Some(position) = player.position() {
            info!("Position: {}", format_duration(position));
        }

        info!("Pausing, stepping two frames");
        player.pause()?;
        player.step()?;
        tokio::time::sleep(Duration::from_millis(200)).await;
        player.step()?;
        tokio::time::sleep(Duration::from_millis(200)).await;
        player.resume()?;

        tokio::time::sleep(Duration::from_secs(1)).await;
        let target = Duration::from_secs(args.duration / 2);
        info!("Seeking to {:?}", target);
        player.seek(target)?;

        tokio::time::sleep(Duration::from_secs(1)).await;
        info!("Doubling playback speed");
        player.set_speed((args.speed * 2.0).min(4.0))?;

        // Let the clip run out to demonstrate finish + rewind.
        tokio::time::sleep(Duration::from_secs(args.duration)).await;
        Ok::<(), anyhow::Error>(())
    };

    tokio::select! {
        result = demo => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
        }
    }

    player.stop()?;
    info!("Goodbye");
    Ok(())
}
