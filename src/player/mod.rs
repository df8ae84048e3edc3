//! Playback engine module for ClipPlayer
//!
//! This module contains the synchronization core: the master clock,
//! the bounded per-stream frame queues, the video presentation loop,
//! the real-time audio pull callback, and the controller that ties
//! them together with a play/pause/seek/finish state machine.

mod audio_pull;
mod clock;
mod controller;
mod queue;
mod video_loop;

pub use clock::PlaybackClock;
pub use controller::{PlayerBuilder, PlayerController};
pub use queue::BoundedQueue;

use crate::media::{Frame, MediaType};
use crossbeam_channel::Sender;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

/// Capacity of each per-stream frame queue. Small on purpose: it
/// bounds latency and decode-ahead, and blocks the decoder when the
/// consumers fall behind.
pub(crate) const QUEUE_CAPACITY: usize = 2;

/// Poll interval for the video loop while idle, paused, or seeking
pub(crate) const IDLE_POLL: Duration = Duration::from_millis(15);

/// Upper bound on a single pacing sleep
pub(crate) const MAX_PACING_SLEEP_US: i64 = 300_000;

/// Pacing sleeps shorter than this are skipped (rounding noise)
pub(crate) const PACING_HYSTERESIS_US: i64 = 5_000;

/// Sentinel for "no audio position estimate"
pub(crate) const NO_AUDIO_POSITION: i64 = i64::MIN;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No media open
    Idle,

    /// Media opened, pipeline not started
    Opening,

    /// Playing
    Playing,

    /// Paused (position frozen)
    Paused,

    /// Seek in flight, waiting for the first post-seek frame
    Seeking,

    /// Both enabled sub-pipelines drained to end of stream
    Finished,
}

/// Player event for external event handling
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// Playback state transition
    StateChanged { state: PlaybackState },

    /// Progress update published from the presentation path
    PositionChanged { position: Duration },

    /// Playback speed changed
    SpeedChanged { speed: f32 },

    /// Volume changed
    VolumeChanged { volume: f32 },

    /// End of media reached (fires before the automatic rewind)
    EndOfMedia,

    /// Error surfaced from a collaborator
    Error { message: String },
}

/// Player event handler trait
pub trait PlayerEventHandler: Send {
    fn handle_event(&mut self, event: PlayerEvent);
}

/// Commands handled by the controller's command thread. Real-time
/// threads only ever send; the command thread does the heavy lifting
/// (notably the automatic pause + rewind on finish).
#[derive(Debug, Clone, Copy)]
pub(crate) enum EngineCommand {
    PipelineDone(MediaType),
    Shutdown,
}

/// State shared between the controller, the decoder callback, the
/// video thread, and the audio callback.
pub(crate) struct EngineShared {
    pub clock: PlaybackClock,
    pub video_queue: BoundedQueue<Frame>,
    pub audio_queue: BoundedQueue<Frame>,

    /// Engine lifetime flag; cleared on stop/shutdown
    pub running: AtomicBool,

    /// Pause flag mirrored into the clock
    pub paused: AtomicBool,

    /// A seek is underway; taken at seek entry, released by the first
    /// post-seek frame (or a failed seek). Gates out overlapping seek
    /// requests and silences the audio callback.
    pub seek_in_flight: AtomicBool,

    /// Armed only after the decoder seek returns, so a frame already
    /// in flight from before the seek can never consume it. The first
    /// frame delivered while this is set re-arms the pipeline.
    pub seeking: AtomicBool,

    /// Whether to return to Playing once the in-flight seek completes
    pub resume_after_seek: AtomicBool,

    /// Per-stream end-of-stream flags, set by the sentinel frame
    pub video_eof: AtomicBool,
    pub audio_eof: AtomicBool,

    /// Per-stream completion flags feeding the Finished transition
    pub video_done: AtomicBool,
    pub audio_done: AtomicBool,

    /// Enabled sub-pipelines
    pub has_video: AtomicBool,
    pub has_audio: AtomicBool,

    /// Audio re-anchors the clock whenever it is enabled; otherwise
    /// the video loop does
    pub audio_master: AtomicBool,

    /// False for live feeds: present as fast as frames arrive
    pub pace_video: AtomicBool,

    /// Frame-step counters, armed while paused
    pub video_steps: AtomicI32,
    pub audio_steps: AtomicI32,

    /// End-of-range media time of the last frame fed to the stretcher
    pub audio_position_us: AtomicI64,

    /// Hardware playout buffer depth in frames
    pub hardware_buffer_frames: AtomicUsize,

    /// Serializes set_speed against the audio callback so stretcher
    /// and clock never disagree about the ratio mid-callback
    pub speed_gate: Mutex<()>,

    pub state: RwLock<PlaybackState>,
    pub handlers: Mutex<Vec<Box<dyn PlayerEventHandler>>>,
    pub cmd_tx: Sender<EngineCommand>,
}

impl EngineShared {
    pub fn new(cmd_tx: Sender<EngineCommand>) -> Self {
        Self {
            clock: PlaybackClock::new(),
            video_queue: BoundedQueue::new(QUEUE_CAPACITY),
            audio_queue: BoundedQueue::new(QUEUE_CAPACITY),
            running: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            seek_in_flight: AtomicBool::new(false),
            seeking: AtomicBool::new(false),
            resume_after_seek: AtomicBool::new(false),
            video_eof: AtomicBool::new(false),
            audio_eof: AtomicBool::new(false),
            video_done: AtomicBool::new(false),
            audio_done: AtomicBool::new(false),
            has_video: AtomicBool::new(false),
            has_audio: AtomicBool::new(false),
            audio_master: AtomicBool::new(false),
            pace_video: AtomicBool::new(true),
            video_steps: AtomicI32::new(0),
            audio_steps: AtomicI32::new(0),
            audio_position_us: AtomicI64::new(NO_AUDIO_POSITION),
            hardware_buffer_frames: AtomicUsize::new(0),
            speed_gate: Mutex::new(()),
            state: RwLock::new(PlaybackState::Idle),
            handlers: Mutex::new(Vec::new()),
            cmd_tx,
        }
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.read()
    }

    pub fn set_state(&self, state: PlaybackState) {
        *self.state.write() = state;
        self.emit(PlayerEvent::StateChanged { state });
    }

    pub fn emit(&self, event: PlayerEvent) {
        let mut handlers = self.handlers.lock();
        for handler in handlers.iter_mut() {
            handler.handle_event(event.clone());
        }
    }

    /// Pipeline completion check: every enabled stream must be done.
    pub fn all_pipelines_done(&self) -> bool {
        let video_ok =
            !self.has_video.load(Ordering::SeqCst) || self.video_done.load(Ordering::SeqCst);
        let audio_ok =
            !self.has_audio.load(Ordering::SeqCst) || self.audio_done.load(Ordering::SeqCst);
        video_ok && audio_ok
    }
}
