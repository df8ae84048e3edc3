//! Playback controller for ClipPlayer
//!
//! The controller owns the collaborators (decoder, audio renderer,
//! time-stretcher, render sink), routes decoded frames into the
//! per-stream queues, and drives the playback state machine:
//! open/start/pause/resume/seek/set_speed/step/stop plus finish
//! detection. Seeks are coordinated here as one atomic-feeling
//! sequence; the automatic pause + rewind on finish runs on a
//! controller-owned command thread so the real-time threads never
//! block on it.

use crate::audio::{AudioFormat, AudioRenderer, LinearStretcher, TimeStretcher};
use crate::media::{
    Decoder, Frame, FrameCallback, MediaInfo, MediaSource, MediaType, RenderSink, SubtitleSource,
};
use crate::player::audio_pull::EnginePull;
use crate::player::video_loop::run_video_loop;
use crate::player::{
    EngineCommand, EngineShared, PlaybackState, PlayerEvent, PlayerEventHandler,
    NO_AUDIO_POSITION,
};
use crate::utils::config::Config;
use crate::utils::error::{ClipPlayerError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Creates a time-stretcher for the opened stream's format
pub type StretcherFactory =
    Arc<dyn Fn(AudioFormat) -> Result<Arc<dyn TimeStretcher>> + Send + Sync>;

/// Builder for [`PlayerController`]
pub struct PlayerBuilder {
    decoder: Option<Arc<dyn Decoder>>,
    video_sink: Option<Arc<dyn RenderSink>>,
    subtitles: Option<Arc<dyn SubtitleSource>>,
    audio: Option<Arc<dyn AudioRenderer>>,
    stretcher_factory: StretcherFactory,
    config: Config,
}

impl PlayerBuilder {
    pub fn new() -> Self {
        Self {
            decoder: None,
            video_sink: None,
            subtitles: None,
            audio: None,
            stretcher_factory: Arc::new(|format| {
                Ok(Arc::new(LinearStretcher::new(format)?) as Arc<dyn TimeStretcher>)
            }),
            config: Config::default(),
        }
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn with_video_sink(mut self, sink: Arc<dyn RenderSink>) -> Self {
        self.video_sink = Some(sink);
        self
    }

    pub fn with_subtitles(mut self, subtitles: Arc<dyn SubtitleSource>) -> Self {
        self.subtitles = Some(subtitles);
        self
    }

    pub fn with_audio_renderer(mut self, audio: Arc<dyn AudioRenderer>) -> Self {
        self.audio = Some(audio);
        self
    }

    pub fn with_stretcher_factory(mut self, factory: StretcherFactory) -> Self {
        self.stretcher_factory = factory;
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<PlayerController> {
        let decoder = self
            .decoder
            .ok_or_else(|| ClipPlayerError::InvalidInput("a decoder is required".to_string()))?;

        let (cmd_tx, cmd_rx) = unbounded();
        let shared = Arc::new(EngineShared::new(cmd_tx.clone()));

        let engine = Arc::new(Engine {
            shared,
            decoder,
            video_sink: self.video_sink,
            subtitles: self.subtitles,
            audio: self.audio,
            stretcher_factory: self.stretcher_factory,
            stretcher: RwLock::new(None),
            media_info: RwLock::new(None),
            config: self.config,
            video_thread: Mutex::new(None),
            volume: Mutex::new(1.0),
        });

        let command_engine = Arc::clone(&engine);
        let command_thread = thread::Builder::new()
            .name("player-commands".to_string())
            .spawn(move || command_loop(command_engine, cmd_rx))
            .map_err(|e| ClipPlayerError::Internal(format!("spawning command thread: {}", e)))?;

        Ok(PlayerController {
            engine,
            cmd_tx,
            command_thread: Some(command_thread),
        })
    }
}

impl Default for PlayerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Top-level playback controller
pub struct PlayerController {
    engine: Arc<Engine>,
    cmd_tx: Sender<EngineCommand>,
    command_thread: Option<thread::JoinHandle<()>>,
}

impl PlayerController {
    /// Open a media source. The controller stays in `Opening` until
    /// `start()` is called.
    pub fn open(&self, source: &MediaSource) -> Result<MediaInfo> {
        self.engine.open(source)
    }

    /// Start the pipeline: decoder delivery, video thread, audio stream.
    pub fn start(&self) -> Result<()> {
        self.engine.start()
    }

    pub fn pause(&self) -> Result<()> {
        self.engine.pause()
    }

    pub fn resume(&self) -> Result<()> {
        self.engine.resume()
    }

    /// Seek to an absolute position. A seek requested while one is in
    /// flight is silently ignored.
    pub fn seek(&self, position: Duration) -> Result<()> {
        self.engine.seek_impl(position.as_micros() as i64)
    }

    /// Advance exactly one video frame while paused.
    pub fn step(&self) -> Result<()> {
        self.engine.step()
    }

    /// Change playback speed; pitch/tempo handling is the stretcher's
    /// concern, presentation pacing is the clock's.
    pub fn set_speed(&self, speed: f32) -> Result<()> {
        self.engine.set_speed(speed)
    }

    pub fn set_volume(&self, volume: f32) {
        self.engine.set_volume(volume)
    }

    pub fn set_muted(&self, muted: bool) {
        self.engine.set_muted(muted)
    }

    pub fn stop(&self) -> Result<()> {
        self.engine.stop()
    }

    /// Current playback position; None while the clock is unanchored
    /// (between a seek and the first post-seek frame).
    pub fn position(&self) -> Option<Duration> {
        self.engine
            .shared
            .clock
            .time_us()
            .map(|us| Duration::from_micros(us.max(0) as u64))
    }

    pub fn duration(&self) -> Duration {
        self.engine
            .media_info
            .read()
            .as_ref()
            .map(|info| info.duration)
            .unwrap_or_default()
    }

    pub fn state(&self) -> PlaybackState {
        self.engine.shared.state()
    }

    pub fn speed(&self) -> f32 {
        self.engine.shared.clock.speed() as f32
    }

    pub fn is_seeking(&self) -> bool {
        self.engine.shared.seek_in_flight.load(Ordering::SeqCst)
    }

    pub fn volume(&self) -> f32 {
        *self.engine.volume.lock()
    }

    pub fn media_info(&self) -> Option<MediaInfo> {
        self.engine.media_info.read().clone()
    }

    pub fn add_event_handler(&self, handler: Box<dyn PlayerEventHandler>) {
        self.engine.shared.handlers.lock().push(handler);
    }
}

impl Drop for PlayerController {
    fn drop(&mut self) {
        let _ = self.engine.stop();
        let _ = self.cmd_tx.send(EngineCommand::Shutdown);
        if let Some(thread) = self.command_thread.take() {
            let _ = thread.join();
        }
    }
}

/// Command thread: executes finish handling away from the real-time
/// threads.
fn command_loop(engine: Arc<Engine>, cmd_rx: Receiver<EngineCommand>) {
    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            EngineCommand::PipelineDone(media_type) => engine.handle_pipeline_done(media_type),
            EngineCommand::Shutdown => break,
        }
    }
}

struct Engine {
    shared: Arc<EngineShared>,
    decoder: Arc<dyn Decoder>,
    video_sink: Option<Arc<dyn RenderSink>>,
    subtitles: Option<Arc<dyn SubtitleSource>>,
    audio: Option<Arc<dyn AudioRenderer>>,
    stretcher_factory: StretcherFactory,
    stretcher: RwLock<Option<Arc<dyn TimeStretcher>>>,
    media_info: RwLock<Option<MediaInfo>>,
    config: Config,
    video_thread: Mutex<Option<thread::JoinHandle<()>>>,
    volume: Mutex<f32>,
}

impl Engine {
    fn open(&self, source: &MediaSource) -> Result<MediaInfo> {
        let shared = &self.shared;
        if shared.state() != PlaybackState::Idle {
            return Err(ClipPlayerError::InvalidState(
                "open requires an idle player".to_string(),
            ));
        }
        shared.set_state(PlaybackState::Opening);
        log::info!("Opening {}", source.describe());

        let info = match self.decoder.open(source) {
            Ok(info) => info,
            Err(e) => {
                shared.emit(PlayerEvent::Error {
                    message: e.to_string(),
                });
                shared.set_state(PlaybackState::Idle);
                return Err(e);
            }
        };

        let video_enabled = info.has_video() && self.video_sink.is_some();
        let audio_enabled = match self.open_audio(&info) {
            Ok(enabled) => enabled,
            Err(e) => {
                shared.set_state(PlaybackState::Idle);
                return Err(e);
            }
        };

        if !video_enabled && !audio_enabled {
            shared.set_state(PlaybackState::Idle);
            return Err(ClipPlayerError::InvalidInput(
                "source has no playable streams".to_string(),
            ));
        }

        shared.has_video.store(video_enabled, Ordering::SeqCst);
        shared.has_audio.store(audio_enabled, Ordering::SeqCst);
        shared.audio_master.store(audio_enabled, Ordering::SeqCst);
        shared.pace_video.store(info.seekable, Ordering::SeqCst);

        self.apply_speed(self.config.playback.speed);
        *self.media_info.write() = Some(info.clone());

        Ok(info)
    }

    /// Open the audio device for the source's audio stream, degrading
    /// to video-only if the config permits it. Returns whether the
    /// audio pipeline is enabled.
    fn open_audio(&self, info: &MediaInfo) -> Result<bool> {
        let (Some(stream), Some(renderer)) = (info.audio.as_ref(), self.audio.as_ref()) else {
            return Ok(false);
        };

        let format = AudioFormat {
            sample_rate: stream.sample_rate,
            channels: stream.channels,
        };

        // A failed stretcher allocation is a stream-creation failure,
        // not a degradable one.
        let stretcher = (self.stretcher_factory)(format)?;

        let pull = Arc::new(EnginePull::new(
            Arc::clone(&self.shared),
            Arc::clone(&stretcher),
            format,
        ));

        match renderer.open(format, pull) {
            Ok(()) => {
                self.shared
                    .hardware_buffer_frames
                    .store(renderer.buffer_size(), Ordering::Relaxed);
                renderer.set_volume(self.config.audio.volume);
                renderer.set_muted(self.config.audio.muted);
                *self.volume.lock() = self.config.audio.volume;
                *self.stretcher.write() = Some(stretcher);
                Ok(true)
            }
            Err(e) if self.config.audio.allow_video_only && info.has_video() => {
                log::warn!("Audio device unavailable, continuing video-only: {}", e);
                self.shared.emit(PlayerEvent::Error {
                    message: format!("audio disabled: {}", e),
                });
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn start(&self) -> Result<()> {
        let shared = &self.shared;
        if shared.state() != PlaybackState::Opening {
            return Err(ClipPlayerError::InvalidState(
                "start requires an opened source".to_string(),
            ));
        }

        shared.running.store(true, Ordering::SeqCst);
        shared.paused.store(false, Ordering::SeqCst);
        shared.seek_in_flight.store(false, Ordering::SeqCst);
        shared.seeking.store(false, Ordering::SeqCst);
        shared.video_eof.store(false, Ordering::SeqCst);
        shared.audio_eof.store(false, Ordering::SeqCst);
        shared.video_done.store(false, Ordering::SeqCst);
        shared.audio_done.store(false, Ordering::SeqCst);
        shared.video_steps.store(0, Ordering::SeqCst);
        shared.audio_steps.store(0, Ordering::SeqCst);
        shared
            .audio_position_us
            .store(NO_AUDIO_POSITION, Ordering::SeqCst);

        shared.video_queue.start();
        shared.audio_queue.start();

        if shared.has_video.load(Ordering::SeqCst) {
            let sink = self
                .video_sink
                .as_ref()
                .map(Arc::clone)
                .ok_or_else(|| ClipPlayerError::Internal("video enabled without sink".to_string()))?;
            let subtitles = self
                .subtitles
                .as_ref()
                .filter(|_| self.config.playback.subtitles)
                .map(Arc::clone);
            let loop_shared = Arc::clone(shared);
            let handle = thread::Builder::new()
                .name("video-loop".to_string())
                .spawn(move || run_video_loop(loop_shared, sink, subtitles))
                .map_err(|e| ClipPlayerError::Internal(format!("spawning video thread: {}", e)))?;
            *self.video_thread.lock() = Some(handle);
        }

        self.decoder.start(self.frame_callback())?;

        if shared.has_audio.load(Ordering::SeqCst) {
            if let Some(renderer) = self.audio.as_ref() {
                renderer.start()?;
            }
        }

        shared.clock.resume();
        shared.set_state(PlaybackState::Playing);
        log::info!("Playback started");
        Ok(())
    }

    /// Routing callback handed to the decoder; runs on the decoder's
    /// thread(s) and blocks there on queue backpressure.
    fn frame_callback(&self) -> FrameCallback {
        let shared = Arc::clone(&self.shared);
        Arc::new(move |frame: Frame| {
            if !shared.running.load(Ordering::SeqCst) {
                return;
            }

            if frame.is_sentinel() {
                match frame.media_type {
                    MediaType::Video => shared.video_eof.store(true, Ordering::SeqCst),
                    MediaType::Audio => shared.audio_eof.store(true, Ordering::SeqCst),
                }
                return;
            }

            // A stream without an enabled pipeline has no consumer;
            // queueing its frames would stall the decoder.
            let enabled = match frame.media_type {
                MediaType::Video => shared.has_video.load(Ordering::SeqCst),
                MediaType::Audio => shared.has_audio.load(Ordering::SeqCst),
            };
            if !enabled {
                return;
            }

            // First frame after a seek re-arms the pipeline.
            if shared
                .seeking
                .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                shared.video_queue.start();
                shared.audio_queue.start();
                let state = if shared.resume_after_seek.load(Ordering::SeqCst) {
                    PlaybackState::Playing
                } else {
                    PlaybackState::Paused
                };
                shared.set_state(state);
                shared.seek_in_flight.store(false, Ordering::SeqCst);
            }

            let queue = match frame.media_type {
                MediaType::Video => &shared.video_queue,
                MediaType::Audio => &shared.audio_queue,
            };
            if queue.wait_and_push(frame).is_err() {
                log::trace!("Queue stopped mid-push, dropping stale frame");
            }
        })
    }

    fn pause(&self) -> Result<()> {
        let shared = &self.shared;
        match shared.state() {
            PlaybackState::Playing => {}
            PlaybackState::Seeking => {
                // A pause issued mid-seek takes effect once the seek
                // re-arms: the first post-seek frame shows, then holds.
                shared.resume_after_seek.store(false, Ordering::SeqCst);
                shared.paused.store(true, Ordering::SeqCst);
                shared.clock.pause();
                self.pause_audio();
                shared.video_steps.store(1, Ordering::SeqCst);
                return Ok(());
            }
            _ => return Ok(()),
        }

        shared.paused.store(true, Ordering::SeqCst);
        shared.clock.pause();
        self.pause_audio();
        shared.set_state(PlaybackState::Paused);
        Ok(())
    }

    fn resume(&self) -> Result<()> {
        let shared = &self.shared;
        match shared.state() {
            PlaybackState::Paused => {}
            PlaybackState::Seeking => {
                shared.resume_after_seek.store(true, Ordering::SeqCst);
                // Drop the show-one-frame step a paused seek armed.
                shared.video_steps.store(0, Ordering::SeqCst);
                shared.audio_steps.store(0, Ordering::SeqCst);
                shared.paused.store(false, Ordering::SeqCst);
                shared.clock.resume();
                self.resume_audio();
                return Ok(());
            }
            _ => return Ok(()),
        }

        // A step armed during this pause but never consumed would
        // otherwise fire on the next pause.
        shared.video_steps.store(0, Ordering::SeqCst);
        shared.audio_steps.store(0, Ordering::SeqCst);

        shared.paused.store(false, Ordering::SeqCst);
        shared.clock.resume();
        self.resume_audio();
        shared.set_state(PlaybackState::Playing);
        Ok(())
    }

    fn pause_audio(&self) {
        if let Some(renderer) = self.active_audio() {
            if let Err(e) = renderer.pause() {
                log::warn!("Audio pause failed: {}", e);
            }
        }
    }

    fn resume_audio(&self) {
        if let Some(renderer) = self.active_audio() {
            if let Err(e) = renderer.resume() {
                log::warn!("Audio resume failed: {}", e);
            }
        }
    }

    fn seek_impl(&self, target_us: i64) -> Result<()> {
        let shared = &self.shared;

        // A seek arriving mid-seek is dropped, not queued. The guard
        // is held until the first post-seek frame re-arms the pipeline.
        if shared
            .seek_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::debug!("Ignoring seek: one already in flight");
            return Ok(());
        }

        let seekable = self
            .media_info
            .read()
            .as_ref()
            .map(|info| info.seekable)
            .unwrap_or(false);
        if !seekable {
            shared.seek_in_flight.store(false, Ordering::SeqCst);
            return Err(ClipPlayerError::InvalidState(
                "source is not seekable".to_string(),
            ));
        }
        if !matches!(
            shared.state(),
            PlaybackState::Playing | PlaybackState::Paused
        ) {
            shared.seek_in_flight.store(false, Ordering::SeqCst);
            return Err(ClipPlayerError::InvalidState(
                "seek requires active playback".to_string(),
            ));
        }

        let paused = shared.paused.load(Ordering::SeqCst);
        shared.resume_after_seek.store(!paused, Ordering::SeqCst);
        let relative_us = shared
            .clock
            .time_us()
            .map(|now| target_us - now)
            .unwrap_or(0);

        log::info!(
            "Seeking to {:?} (delta {} ms)",
            Duration::from_micros(target_us.max(0) as u64),
            relative_us / 1_000
        );
        shared.set_state(PlaybackState::Seeking);

        // Unblock every producer and consumer, then discard whatever
        // was buffered; those frames predate the target.
        shared.video_queue.stop();
        shared.audio_queue.stop();
        shared.video_queue.drain();
        shared.audio_queue.drain();

        if let Err(e) = self.decoder.seek(target_us, relative_us) {
            shared.seek_in_flight.store(false, Ordering::SeqCst);
            shared.video_queue.start();
            shared.audio_queue.start();
            shared.set_state(if paused {
                PlaybackState::Paused
            } else {
                PlaybackState::Playing
            });
            return Err(e);
        }

        if let Some(stretcher) = self.stretcher.read().as_ref() {
            stretcher.drain();
        }
        if let Some(renderer) = self.active_audio() {
            if let Err(e) = renderer.reset() {
                log::warn!("Audio reset failed during seek: {}", e);
            }
        }

        shared.clock.clear();
        shared
            .audio_position_us
            .store(NO_AUDIO_POSITION, Ordering::SeqCst);
        shared.video_eof.store(false, Ordering::SeqCst);
        shared.audio_eof.store(false, Ordering::SeqCst);
        shared.video_done.store(false, Ordering::SeqCst);
        shared.audio_done.store(false, Ordering::SeqCst);

        // Paused seek: show the first post-seek frame, then hold.
        if paused {
            shared.video_steps.store(1, Ordering::SeqCst);
        }

        // Armed last, after the decoder seek: a frame that was already
        // in flight when the seek began finds the stopped queues and is
        // dropped there instead of passing for the first post-seek
        // frame.
        shared.seeking.store(true, Ordering::SeqCst);

        Ok(())
    }

    fn step(&self) -> Result<()> {
        let shared = &self.shared;
        if shared.state() != PlaybackState::Paused {
            return Err(ClipPlayerError::InvalidState(
                "frame stepping requires a paused player".to_string(),
            ));
        }

        if shared.has_video.load(Ordering::SeqCst) {
            shared.video_steps.store(1, Ordering::SeqCst);
        }
        if shared.has_audio.load(Ordering::SeqCst) {
            shared.audio_steps.store(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn set_speed(&self, speed: f32) -> Result<()> {
        if !(speed > 0.0 && speed <= 4.0) {
            return Err(ClipPlayerError::InvalidInput(
                "speed must be in (0.0, 4.0]".to_string(),
            ));
        }
        self.apply_speed(speed);
        self.shared.emit(PlayerEvent::SpeedChanged { speed });
        Ok(())
    }

    /// Stretcher and clock update back-to-back under the speed gate so
    /// the audio callback never observes one without the other.
    fn apply_speed(&self, speed: f32) {
        let _gate = self.shared.speed_gate.lock();
        if let Some(stretcher) = self.stretcher.read().as_ref() {
            stretcher.set_speed(speed);
        }
        self.shared.clock.set_speed(speed as f64);
    }

    fn set_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        *self.volume.lock() = volume;
        if let Some(renderer) = self.audio.as_ref() {
            renderer.set_volume(volume);
        }
        self.shared.emit(PlayerEvent::VolumeChanged { volume });
    }

    fn set_muted(&self, muted: bool) {
        if let Some(renderer) = self.audio.as_ref() {
            renderer.set_muted(muted);
        }
    }

    fn stop(&self) -> Result<()> {
        let shared = &self.shared;
        if shared.state() == PlaybackState::Idle {
            return Ok(());
        }
        log::info!("Stopping playback");

        shared.running.store(false, Ordering::SeqCst);
        shared.video_queue.stop();
        shared.audio_queue.stop();

        self.decoder.stop();
        if let Some(renderer) = self.active_audio() {
            if let Err(e) = renderer.stop() {
                log::warn!("Audio stop failed: {}", e);
            }
        }

        if let Some(handle) = self.video_thread.lock().take() {
            let _ = handle.join();
        }

        shared.video_queue.drain();
        shared.audio_queue.drain();
        shared.clock.clear();
        shared.clock.pause();
        shared.paused.store(false, Ordering::SeqCst);
        shared.seek_in_flight.store(false, Ordering::SeqCst);
        shared.seeking.store(false, Ordering::SeqCst);
        shared.video_eof.store(false, Ordering::SeqCst);
        shared.audio_eof.store(false, Ordering::SeqCst);
        shared.video_done.store(false, Ordering::SeqCst);
        shared.audio_done.store(false, Ordering::SeqCst);
        shared.video_steps.store(0, Ordering::SeqCst);
        shared.audio_steps.store(0, Ordering::SeqCst);
        shared
            .audio_position_us
            .store(NO_AUDIO_POSITION, Ordering::SeqCst);

        *self.media_info.write() = None;
        *self.stretcher.write() = None;
        shared.set_state(PlaybackState::Idle);
        Ok(())
    }

    /// Finish detection: runs on the command thread. Fires the
    /// terminal transition once every enabled sub-pipeline is done,
    /// then pauses and rewinds so the next resume replays from zero.
    fn handle_pipeline_done(&self, media_type: MediaType) {
        let shared = &self.shared;
        log::debug!("Pipeline done: {:?}", media_type);

        if !shared.all_pipelines_done() {
            return;
        }
        if !matches!(
            shared.state(),
            PlaybackState::Playing | PlaybackState::Paused
        ) {
            return;
        }

        shared.set_state(PlaybackState::Finished);
        shared.emit(PlayerEvent::EndOfMedia);

        shared.paused.store(true, Ordering::SeqCst);
        shared.clock.pause();
        if let Some(renderer) = self.active_audio() {
            if let Err(e) = renderer.pause() {
                log::warn!("Audio pause failed on finish: {}", e);
            }
        }
        shared.set_state(PlaybackState::Paused);

        match self.seek_impl(0) {
            Ok(()) => {}
            Err(ClipPlayerError::InvalidState(_)) => {
                // Unseekable source; stay paused at the end.
            }
            Err(e) => shared.emit(PlayerEvent::Error {
                message: format!("rewind after finish failed: {}", e),
            }),
        }
    }

    fn active_audio(&self) -> Option<&Arc<dyn AudioRenderer>> {
        if self.shared.has_audio.load(Ordering::SeqCst) {
            self.audio.as_ref()
        } else {
            None
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{AudioFrame, AudioStreamInfo, FramePayload};
    use parking_lot::Mutex as PlMutex;

    #[derive(Default)]
    struct StubDecoder {
        fail_open: bool,
        seeks: PlMutex<Vec<(i64, i64)>>,
        callback: PlMutex<Option<FrameCallback>>,
        stale_frame_on_seek: PlMutex<Option<Frame>>,
    }

    impl StubDecoder {
        /// Push a frame through the captured routing callback, the way
        /// the decoder thread would.
        fn deliver(&self, frame: Frame) {
            let callback = self.callback.lock().clone();
            if let Some(on_frame) = callback {
                on_frame(frame);
            }
        }
    }

    impl Decoder for StubDecoder {
        fn open(&self, _source: &MediaSource) -> Result<MediaInfo> {
            if self.fail_open {
                return Err(ClipPlayerError::Decoder("unsupported container".to_string()));
            }
            Ok(MediaInfo {
                duration: Duration::from_secs(10),
                video: None,
                audio: Some(AudioStreamInfo {
                    sample_rate: 48_000,
                    channels: 2,
                }),
                seekable: true,
            })
        }

        fn start(&self, on_frame: FrameCallback) -> Result<()> {
            *self.callback.lock() = Some(on_frame);
            Ok(())
        }

        fn stop(&self) {}

        fn seek(&self, target_us: i64, relative_us: i64) -> Result<()> {
            self.seeks.lock().push((target_us, relative_us));
            // A frame decoded before the seek request can land while
            // the demuxer repositions; surface it here to exercise
            // that window.
            if let Some(frame) = self.stale_frame_on_seek.lock().take() {
                self.deliver(frame);
            }
            Ok(())
        }

        fn is_eof(&self, _media_type: MediaType) -> bool {
            false
        }

        fn is_ready(&self) -> bool {
            true
        }
    }

    struct StubAudio;

    impl AudioRenderer for StubAudio {
        fn open(&self, _format: AudioFormat, _pull: Arc<dyn crate::audio::AudioPull>) -> Result<()> {
            Ok(())
        }
        fn start(&self) -> Result<()> {
            Ok(())
        }
        fn stop(&self) -> Result<()> {
            Ok(())
        }
        fn pause(&self) -> Result<()> {
            Ok(())
        }
        fn resume(&self) -> Result<()> {
            Ok(())
        }
        fn reset(&self) -> Result<()> {
            Ok(())
        }
        fn set_volume(&self, _volume: f32) {}
        fn set_muted(&self, _muted: bool) {}
        fn buffer_size(&self) -> usize {
            1024
        }
    }

    fn audio_frame(pts_us: i64) -> Frame {
        let audio = AudioFrame {
            sample_rate: 48_000,
            channels: 2,
            samples: vec![0.0f32; 960 * 2],
        };
        Frame {
            pts_us,
            duration_us: audio.duration_us(),
            media_type: MediaType::Audio,
            payload: Some(FramePayload::Audio(audio)),
        }
    }

    fn audio_player(decoder: Arc<StubDecoder>) -> PlayerController {
        PlayerBuilder::new()
            .with_decoder(decoder)
            .with_audio_renderer(Arc::new(StubAudio))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_requires_decoder() {
        assert!(PlayerBuilder::new().build().is_err());
    }

    #[test]
    fn test_open_failure_returns_to_idle() {
        let decoder = Arc::new(StubDecoder {
            fail_open: true,
            ..Default::default()
        });
        let player = audio_player(decoder);

        let err = player.open(&MediaSource::Url("x".to_string()));
        assert!(err.is_err());
        assert_eq!(player.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_open_start_pause_resume() {
        let decoder = Arc::new(StubDecoder::default());
        let player = audio_player(decoder);

        player
            .open(&MediaSource::File("clip.mkv".into()))
            .unwrap();
        assert_eq!(player.state(), PlaybackState::Opening);

        player.start().unwrap();
        assert_eq!(player.state(), PlaybackState::Playing);

        player.pause().unwrap();
        assert_eq!(player.state(), PlaybackState::Paused);

        player.resume().unwrap();
        assert_eq!(player.state(), PlaybackState::Playing);

        player.stop().unwrap();
        assert_eq!(player.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_start_requires_open() {
        let decoder = Arc::new(StubDecoder::default());
        let player = audio_player(decoder);
        assert!(player.start().is_err());
    }

    #[test]
    fn test_seek_while_seeking_is_ignored() {
        let decoder = Arc::new(StubDecoder::default());
        let player = audio_player(Arc::clone(&decoder));

        player.open(&MediaSource::File("clip.mkv".into())).unwrap();
        player.start().unwrap();

        player.seek(Duration::from_secs(5)).unwrap();
        assert!(player.is_seeking());
        assert_eq!(player.state(), PlaybackState::Seeking);

        // Both queues stop as part of the seek sequence.
        assert!(player.engine.shared.video_queue.is_stopped());
        assert!(player.engine.shared.audio_queue.is_stopped());

        // Second seek is dropped: no new decoder call.
        player.seek(Duration::from_secs(8)).unwrap();
        assert_eq!(decoder.seeks.lock().len(), 1);
        assert_eq!(decoder.seeks.lock()[0].0, 5_000_000);

        // Clock reads the sentinel until a frame arrives.
        assert_eq!(player.position(), None);
    }

    #[test]
    fn test_inflight_frame_during_seek_does_not_rearm() {
        let decoder = Arc::new(StubDecoder::default());
        let player = audio_player(Arc::clone(&decoder));

        player.open(&MediaSource::File("clip.mkv".into())).unwrap();
        player.start().unwrap();

        // A frame decoded before the seek request arrives while the
        // decoder is still repositioning.
        *decoder.stale_frame_on_seek.lock() = Some(audio_frame(1_000_000));
        player.seek(Duration::from_secs(7)).unwrap();

        // The stale frame must not pass for the first post-seek frame:
        // the pipeline stays dark and the queues stay stopped.
        assert!(player.is_seeking());
        assert_eq!(player.state(), PlaybackState::Seeking);
        assert!(player.engine.shared.audio_queue.is_stopped());
        assert_eq!(player.engine.shared.audio_queue.len(), 0);

        // The genuine post-seek frame re-arms everything.
        decoder.deliver(audio_frame(7_000_000));
        assert!(!player.is_seeking());
        assert_eq!(player.state(), PlaybackState::Playing);
        assert!(!player.engine.shared.audio_queue.is_stopped());
        assert_eq!(player.engine.shared.audio_queue.len(), 1);
    }

    #[test]
    fn test_resume_clears_pending_steps() {
        let decoder = Arc::new(StubDecoder::default());
        let player = audio_player(decoder);

        player.open(&MediaSource::File("clip.mkv".into())).unwrap();
        player.start().unwrap();

        player.pause().unwrap();
        player.step().unwrap();
        player.resume().unwrap();

        // A step armed during the pause but never consumed must not
        // survive the resume and fire a burst on the next pause.
        let shared = &player.engine.shared;
        assert_eq!(shared.audio_steps.load(Ordering::SeqCst), 0);
        assert_eq!(shared.video_steps.load(Ordering::SeqCst), 0);

        player.pause().unwrap();
        assert_eq!(shared.audio_steps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_pause_during_seek_holds_after_rearm() {
        let decoder = Arc::new(StubDecoder::default());
        let player = audio_player(Arc::clone(&decoder));

        player.open(&MediaSource::File("clip.mkv".into())).unwrap();
        player.start().unwrap();

        player.seek(Duration::from_secs(5)).unwrap();
        assert_eq!(player.state(), PlaybackState::Seeking);

        // Pause lands while the seek is still in flight.
        player.pause().unwrap();

        decoder.deliver(audio_frame(5_000_000));
        assert!(!player.is_seeking());
        assert_eq!(player.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_resume_during_seek_restores_playing() {
        let decoder = Arc::new(StubDecoder::default());
        let player = audio_player(Arc::clone(&decoder));

        player.open(&MediaSource::File("clip.mkv".into())).unwrap();
        player.start().unwrap();
        player.pause().unwrap();

        // A paused seek followed by a mid-seek resume plays on re-arm.
        player.seek(Duration::from_secs(3)).unwrap();
        player.resume().unwrap();

        decoder.deliver(audio_frame(3_000_000));
        assert_eq!(player.state(), PlaybackState::Playing);
    }

    #[test]
    fn test_step_requires_pause() {
        let decoder = Arc::new(StubDecoder::default());
        let player = audio_player(decoder);

        player.open(&MediaSource::File("clip.mkv".into())).unwrap();
        player.start().unwrap();
        assert!(player.step().is_err());

        player.pause().unwrap();
        assert!(player.step().is_ok());
    }

    #[test]
    fn test_set_speed_validation() {
        let decoder = Arc::new(StubDecoder::default());
        let player = audio_player(decoder);

        assert!(player.set_speed(0.0).is_err());
        assert!(player.set_speed(4.5).is_err());
        assert!(player.set_speed(2.0).is_ok());
        assert_eq!(player.speed(), 2.0);
    }
}
