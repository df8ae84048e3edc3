//! End-to-end tests for the ClipPlayer sync engine
//!
//! These run the full pipeline (synthetic decoder, video loop, audio
//! pull path, controller) against fake collaborators, and verify the
//! externally observable synchronization behavior: pause/resume, seek
//! accuracy, frame stepping, speed changes, and finish handling.

use anyhow::Result;
use clipplayer::media::SyntheticDecoder;
use clipplayer::utils::config::Config;
use clipplayer::{MediaSource, PlaybackState, PlayerBuilder, PlayerController, PlayerEvent, RenderSink};
use clipplayer_integration_tests::{
    wait_for, CollectingSink, EventRecorder, FailingAudioRenderer, ManualAudioRenderer,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn build_player(
    duration: Duration,
    sink: Arc<CollectingSink>,
    audio: Arc<ManualAudioRenderer>,
) -> Result<PlayerController> {
    let decoder = Arc::new(SyntheticDecoder::new(duration));
    let player = PlayerBuilder::new()
        .with_decoder(decoder)
        .with_video_sink(sink)
        .with_audio_renderer(audio)
        .build()?;
    Ok(player)
}

fn source() -> MediaSource {
    MediaSource::Url("synthetic://test".to_string())
}

#[tokio::test]
async fn test_player_initialization() -> Result<()> {
    let player = build_player(
        Duration::from_secs(10),
        CollectingSink::new(),
        ManualAudioRenderer::new(),
    )?;

    assert_eq!(player.state(), PlaybackState::Idle);
    assert_eq!(player.position(), None);
    assert_eq!(player.duration(), Duration::ZERO);
    Ok(())
}

#[tokio::test]
async fn test_open_and_play_advances_position() -> Result<()> {
    let sink = CollectingSink::new();
    let player = build_player(
        Duration::from_secs(10),
        Arc::clone(&sink),
        ManualAudioRenderer::new(),
    )?;

    let info = player.open(&source())?;
    assert!(info.has_video());
    assert!(info.has_audio());
    assert_eq!(player.state(), PlaybackState::Opening);
    assert_eq!(player.duration(), Duration::from_secs(10));

    player.start()?;
    assert_eq!(player.state(), PlaybackState::Playing);

    assert!(wait_for(Duration::from_secs(2), || {
        player.position().map_or(false, |p| p > Duration::from_millis(100))
    }));
    assert!(sink.frame_count() > 0, "no video frames presented");

    player.stop()?;
    assert_eq!(player.state(), PlaybackState::Idle);
    Ok(())
}

#[tokio::test]
async fn test_pause_freezes_position() -> Result<()> {
    let player = build_player(
        Duration::from_secs(10),
        CollectingSink::new(),
        ManualAudioRenderer::new(),
    )?;
    player.open(&source())?;
    player.start()?;

    assert!(wait_for(Duration::from_secs(2), || player.position().is_some()));

    player.pause()?;
    assert_eq!(player.state(), PlaybackState::Paused);
    let at_pause = player.position();

    sleep(Duration::from_millis(200)).await;
    assert_eq!(player.position(), at_pause, "position moved while paused");

    player.resume()?;
    assert_eq!(player.state(), PlaybackState::Playing);
    assert!(wait_for(Duration::from_secs(2), || {
        player.position() > at_pause
    }));

    player.stop()?;
    Ok(())
}

#[tokio::test]
async fn test_seek_lands_at_target() -> Result<()> {
    let audio = ManualAudioRenderer::new();
    let player = build_player(
        Duration::from_secs(10),
        CollectingSink::new(),
        Arc::clone(&audio),
    )?;
    player.open(&source())?;
    player.start()?;

    assert!(wait_for(Duration::from_secs(2), || player.position().is_some()));

    player.seek(Duration::from_secs(7))?;

    // The seek completes when the first post-target frame re-arms the
    // pipeline and audio re-anchors the clock.
    assert!(wait_for(Duration::from_secs(2), || {
        player
            .position()
            .map_or(false, |p| p >= Duration::from_millis(6_800))
    }));
    let position = player.position().unwrap();
    assert!(
        position < Duration::from_millis(8_000),
        "position overshot the seek target: {:?}",
        position
    );
    assert_eq!(player.state(), PlaybackState::Playing);
    assert!(audio.resets() >= 1, "seek did not flush the audio device");

    player.stop()?;
    Ok(())
}

#[tokio::test]
async fn test_seek_while_paused_presents_one_frame() -> Result<()> {
    let sink = CollectingSink::new();
    let player = build_player(
        Duration::from_secs(10),
        Arc::clone(&sink),
        ManualAudioRenderer::new(),
    )?;
    player.open(&source())?;
    player.start()?;

    assert!(wait_for(Duration::from_secs(2), || sink.frame_count() > 0));
    player.pause()?;
    sleep(Duration::from_millis(100)).await;
    let before = sink.frame_count();

    player.seek(Duration::from_secs(3))?;

    // Exactly one frame comes through so the display shows the new
    // position, then the loop holds again.
    assert!(wait_for(Duration::from_secs(2), || {
        sink.frame_count() == before + 1
    }));
    sleep(Duration::from_millis(300)).await;
    assert_eq!(sink.frame_count(), before + 1);
    assert_eq!(player.state(), PlaybackState::Paused);

    player.stop()?;
    Ok(())
}

#[tokio::test]
async fn test_step_advances_exactly_one_frame() -> Result<()> {
    let sink = CollectingSink::new();
    let player = build_player(
        Duration::from_secs(10),
        Arc::clone(&sink),
        ManualAudioRenderer::new(),
    )?;
    player.open(&source())?;
    player.start()?;

    assert!(wait_for(Duration::from_secs(2), || sink.frame_count() > 0));
    player.pause()?;
    sleep(Duration::from_millis(100)).await;
    let before = sink.frame_count();

    player.step()?;
    assert!(wait_for(Duration::from_secs(1), || {
        sink.frame_count() == before + 1
    }));
    sleep(Duration::from_millis(200)).await;
    assert_eq!(sink.frame_count(), before + 1, "step leaked extra frames");

    player.stop()?;
    Ok(())
}

#[tokio::test]
async fn test_double_speed_keeps_sample_cadence() -> Result<()> {
    let audio = ManualAudioRenderer::new();
    let player = build_player(
        Duration::from_secs(60),
        CollectingSink::new(),
        Arc::clone(&audio),
    )?;
    player.open(&source())?;
    player.start()?;

    assert!(wait_for(Duration::from_secs(2), || player.position().is_some()));
    player.set_speed(2.0)?;
    sleep(Duration::from_millis(100)).await;

    let p1 = player.position().unwrap();
    let frames1 = audio.produced_frames();
    let callbacks1 = audio.callbacks();

    sleep(Duration::from_millis(800)).await;

    let p2 = player.position().unwrap();
    let frames2 = audio.produced_frames();
    let callbacks2 = audio.callbacks();

    // Media time covers roughly twice the wall time.
    let advanced = p2 - p1;
    assert!(
        advanced > Duration::from_millis(1_200) && advanced < Duration::from_millis(2_400),
        "unexpected media advance at 2x: {:?}",
        advanced
    );

    // The hardware keeps receiving samples at its own cadence; speed
    // only changes how much media each sample covers.
    let per_callback = (frames2 - frames1) / (callbacks2 - callbacks1).max(1);
    assert!(
        (400..=480).contains(&per_callback),
        "sample cadence changed with speed: {} frames/callback",
        per_callback
    );

    player.stop()?;
    Ok(())
}

#[tokio::test]
async fn test_finish_pauses_and_rewinds() -> Result<()> {
    let player = build_player(
        Duration::from_secs(1),
        CollectingSink::new(),
        ManualAudioRenderer::new(),
    )?;
    let (recorder, events) = EventRecorder::new();
    player.add_event_handler(recorder);

    player.open(&source())?;
    player.start()?;

    // Clip is 1s; allow generous drain time for the stretcher tail.
    assert!(wait_for(Duration::from_secs(5), || {
        player.state() == PlaybackState::Paused
    }));

    let events = events.lock().clone();
    assert!(
        events.iter().any(|e| matches!(e, PlayerEvent::EndOfMedia)),
        "EndOfMedia never fired"
    );
    assert!(
        events.iter().any(|e| matches!(
            e,
            PlayerEvent::StateChanged {
                state: PlaybackState::Finished
            }
        )),
        "Finished state never reached"
    );

    // Rewound: the next frame shown is from the start of the clip.
    if let Some(position) = player.position() {
        assert!(
            position < Duration::from_millis(500),
            "finish did not rewind: {:?}",
            position
        );
    }

    player.stop()?;
    Ok(())
}

#[tokio::test]
async fn test_audio_failure_degrades_to_video_only() -> Result<()> {
    let mut config = Config::default();
    config.audio.allow_video_only = true;

    let sink = CollectingSink::new();
    let decoder = Arc::new(SyntheticDecoder::new(Duration::from_secs(10)));
    let sink_dyn: Arc<dyn RenderSink> = sink.clone();
    let player = PlayerBuilder::new()
        .with_decoder(decoder)
        .with_video_sink(sink_dyn)
        .with_audio_renderer(Arc::new(FailingAudioRenderer))
        .with_config(config)
        .build()?;

    player.open(&source())?;
    player.start()?;
    assert_eq!(player.state(), PlaybackState::Playing);

    // Video-master mode: the presentation loop drives the clock.
    assert!(wait_for(Duration::from_secs(2), || {
        player.position().map_or(false, |p| p > Duration::from_millis(100))
    }));
    assert!(sink.frame_count() > 0);

    player.stop()?;
    Ok(())
}

#[tokio::test]
async fn test_speed_validation_and_event() -> Result<()> {
    let player = build_player(
        Duration::from_secs(10),
        CollectingSink::new(),
        ManualAudioRenderer::new(),
    )?;
    let (recorder, events) = EventRecorder::new();
    player.add_event_handler(recorder);

    assert!(player.set_speed(0.0).is_err());
    assert!(player.set_speed(-1.0).is_err());
    assert!(player.set_speed(8.0).is_err());

    player.set_speed(1.5)?;
    assert_eq!(player.speed(), 1.5);
    assert!(events
        .lock()
        .iter()
        .any(|e| matches!(e, PlayerEvent::SpeedChanged { speed } if *speed == 1.5)));
    Ok(())
}
