//! Integration test utilities for ClipPlayer
//!
//! Fake collaborators that let the whole sync engine run without a
//! real codec, GPU, or audio device:
//! - [`CollectingSink`] records every presented frame
//! - [`ManualAudioRenderer`] drives the engine's pull callback at a
//!   steady software cadence, standing in for audio hardware
//! - [`FailingAudioRenderer`] simulates a missing audio device
//! - [`EventRecorder`] captures player events for assertions

use clipplayer::audio::{AudioFormat, AudioPull, AudioRenderer};
use clipplayer::media::VideoFrame;
use clipplayer::{ClipPlayerError, PlayerEvent, PlayerEventHandler, RenderSink, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Interval between simulated hardware callbacks
const PULL_INTERVAL: Duration = Duration::from_millis(10);

/// Frames requested per simulated callback (10ms at 48kHz)
const PULL_FRAMES: usize = 480;

/// Render sink that counts and timestamps presented frames
#[derive(Default)]
pub struct CollectingSink {
    frames: Mutex<Vec<Instant>>,
    subtitles: Mutex<Vec<(String, bool)>>,
}

impl CollectingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn presented_at(&self) -> Vec<Instant> {
        self.frames.lock().clone()
    }

    pub fn subtitle_calls(&self) -> Vec<(String, bool)> {
        self.subtitles.lock().clone()
    }
}

impl RenderSink for CollectingSink {
    fn present_video(&self, _frame: VideoFrame) {
        self.frames.lock().push(Instant::now());
    }

    fn present_subtitle(&self, text: &str, changed: bool) {
        self.subtitles.lock().push((text.to_string(), changed));
    }
}

struct ManualAudioInner {
    pull: Mutex<Option<(AudioFormat, Arc<dyn AudioPull>)>>,
    running: AtomicBool,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
    produced_frames: AtomicUsize,
    callbacks: AtomicUsize,
    resets: AtomicUsize,
}

/// Software stand-in for audio hardware: a thread that invokes the
/// registered pull callback every 10ms, like a real output stream
/// would. Pause does not stop the cadence; real hardware keeps calling
/// too, and the engine answers with silence.
pub struct ManualAudioRenderer {
    inner: Arc<ManualAudioInner>,
}

impl ManualAudioRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Arc::new(ManualAudioInner {
                pull: Mutex::new(None),
                running: AtomicBool::new(false),
                thread: Mutex::new(None),
                produced_frames: AtomicUsize::new(0),
                callbacks: AtomicUsize::new(0),
                resets: AtomicUsize::new(0),
            }),
        })
    }

    /// Total sample frames the engine has produced so far
    pub fn produced_frames(&self) -> usize {
        self.inner.produced_frames.load(Ordering::SeqCst)
    }

    /// Number of simulated hardware callbacks so far
    pub fn callbacks(&self) -> usize {
        self.inner.callbacks.load(Ordering::SeqCst)
    }

    /// Number of reset calls (one per seek)
    pub fn resets(&self) -> usize {
        self.inner.resets.load(Ordering::SeqCst)
    }
}

impl AudioRenderer for ManualAudioRenderer {
    fn open(&self, format: AudioFormat, pull: Arc<dyn AudioPull>) -> Result<()> {
        *self.inner.pull.lock() = Some((format, pull));
        Ok(())
    }

    fn start(&self) -> Result<()> {
        let Some((format, pull)) = self.inner.pull.lock().clone() else {
            return Err(ClipPlayerError::InvalidState(
                "audio renderer not opened".to_string(),
            ));
        };
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name("manual-audio".to_string())
            .spawn(move || {
                let channels = format.channels.max(1) as usize;
                let mut buf = vec![0.0f32; PULL_FRAMES * channels];
                while inner.running.load(Ordering::SeqCst) {
                    let produced = pull.pull(&mut buf, PULL_FRAMES, Instant::now());
                    inner.produced_frames.fetch_add(produced, Ordering::SeqCst);
                    inner.callbacks.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(PULL_INTERVAL);
                }
            })
            .map_err(|e| ClipPlayerError::Audio(format!("spawning pull thread: {}", e)))?;
        *self.inner.thread.lock() = Some(handle);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.inner.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.inner.thread.lock().take() {
            let _ = handle.join();
        }
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        Ok(())
    }

    fn resume(&self) -> Result<()> {
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        self.inner.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_volume(&self, _volume: f32) {}

    fn set_muted(&self, _muted: bool) {}

    fn buffer_size(&self) -> usize {
        PULL_FRAMES
    }
}

impl Drop for ManualAudioRenderer {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Audio renderer whose device open always fails
pub struct FailingAudioRenderer;

impl AudioRenderer for FailingAudioRenderer {
    fn open(&self, _format: AudioFormat, _pull: Arc<dyn AudioPull>) -> Result<()> {
        Err(ClipPlayerError::Audio("no output device".to_string()))
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
        0
    }
}

/// Event handler that stores everything it sees
pub struct EventRecorder {
    events: Arc<Mutex<Vec<PlayerEvent>>>,
}

impl EventRecorder {
    pub fn new() -> (Box<Self>, Arc<Mutex<Vec<PlayerEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        (
            Box::new(Self {
                events: Arc::clone(&events),
            }),
            events,
        )
    }
}

impl PlayerEventHandler for EventRecorder {
    fn handle_event(&mut self, event: PlayerEvent) {
        self.events.lock().push(event);
    }
}

/// Poll until `predicate` holds or the deadline passes
pub fn wait_for(deadline: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let end = Instant::now() + deadline;
    while Instant::now() < end {
        if predicate() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    predicate()
}
