//! Synthetic media decoder for ClipPlayer
//!
//! Generates a test pattern and a sine tone on a producer thread, so
//! the engine can be exercised end to end without a container or
//! codec. Frames come out interleaved in timestamp order and respect
//! the engine's backpressure through the blocking frame callback.

use crate::media::{
    AudioFrame, AudioStreamInfo, Decoder, Frame, FrameCallback, FramePayload, MediaInfo,
    MediaSource, MediaType, VideoFrame, VideoStreamInfo,
};
use crate::utils::error::{ClipPlayerError, Result};
use parking_lot::Mutex;
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const DEFAULT_WIDTH: u32 = 320;
const DEFAULT_HEIGHT: u32 = 180;
const DEFAULT_FPS: f32 = 30.0;
const DEFAULT_SAMPLE_RATE: u32 = 48_000;
const DEFAULT_CHANNELS: u16 = 2;
const DEFAULT_TONE_HZ: f32 = 440.0;

/// Audio frame granularity: 20ms per decoded frame
const AUDIO_CHUNK_US: i64 = 20_000;

/// What the producer should emit next
enum NextUnit {
    Video(i64),
    Audio(i64),
    VideoEof,
    AudioEof,
    Drained,
}

/// Generator positions, guarded by one lock so a seek moves both
/// streams atomically
struct Cursor {
    next_video_us: i64,
    next_audio_us: i64,
    video_eof_sent: bool,
    audio_eof_sent: bool,
}

struct ProducerShared {
    running: AtomicBool,
    /// Bumped by seek; the producer discards frames generated under an
    /// older generation
    generation: AtomicU64,
    cursor: Mutex<Cursor>,
    /// Held across each callback invocation and across seek, so a seek
    /// never races a frame already past the generation check
    delivery: Mutex<()>,
    video_eof: AtomicBool,
    audio_eof: AtomicBool,
}

/// Test-source decoder: moving gradient video plus a continuous tone.
pub struct SyntheticDecoder {
    duration: Duration,
    fps: f32,
    width: u32,
    height: u32,
    sample_rate: u32,
    channels: u16,
    tone_hz: f32,
    with_video: bool,
    with_audio: bool,
    open: AtomicBool,
    shared: Arc<ProducerShared>,
    thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl SyntheticDecoder {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            fps: DEFAULT_FPS,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            tone_hz: DEFAULT_TONE_HZ,
            with_video: true,
            with_audio: true,
            open: AtomicBool::new(false),
            shared: Arc::new(ProducerShared {
                running: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                cursor: Mutex::new(Cursor {
                    next_video_us: 0,
                    next_audio_us: 0,
                    video_eof_sent: false,
                    audio_eof_sent: false,
                }),
                delivery: Mutex::new(()),
                video_eof: AtomicBool::new(false),
                audio_eof: AtomicBool::new(false),
            }),
            thread: Mutex::new(None),
        }
    }

    pub fn video_only(mut self) -> Self {
        self.with_audio = false;
        self
    }

    pub fn audio_only(mut self) -> Self {
        self.with_video = false;
        self
    }

    fn duration_us(&self) -> i64 {
        self.duration.as_micros() as i64
    }

    fn frame_interval_us(&self) -> i64 {
        (1_000_000.0 / self.fps) as i64
    }

    fn make_video_frame(&self, pts_us: i64) -> Frame {
        let (w, h) = (self.width as usize, self.height as usize);
        let phase = (pts_us / 10_000) as usize;
        let mut data = vec![0u8; w * h * 4];
        for y in 0..h {
            for x in 0..w {
                let i = (y * w + x) * 4;
                data[i] = ((x + phase) % 256) as u8;
                data[i + 1] = ((y + phase) % 256) as u8;
                data[i + 2] = ((x + y) % 256) as u8;
                data[i + 3] = 255;
            }
        }
        Frame {
            pts_us,
            duration_us: self.frame_interval_us(),
            media_type: MediaType::Video,
            payload: Some(FramePayload::Video(VideoFrame {
                width: self.width,
                height: self.height,
                data,
            })),
        }
    }

    /// Tone phase is derived from the timestamp, so playback stays
    /// phase-continuous across seeks.
    fn make_audio_frame(&self, pts_us: i64) -> Frame {
        let frames = (self.sample_rate as i64 * AUDIO_CHUNK_US / 1_000_000) as usize;
        let channels = self.channels as usize;
        let mut samples = vec![0.0f32; frames * channels];
        for frame_idx in 0..frames {
            let t = pts_us as f32 / 1_000_000.0 + frame_idx as f32 / self.sample_rate as f32;
            let value = (TAU * self.tone_hz * t).sin() * 0.2;
            for ch in 0..channels {
                samples[frame_idx * channels + ch] = value;
            }
        }
        let audio = AudioFrame {
            sample_rate: self.sample_rate,
            channels: self.channels,
            samples,
        };
        Frame {
            pts_us,
            duration_us: audio.duration_us(),
            media_type: MediaType::Audio,
            payload: Some(FramePayload::Audio(audio)),
        }
    }

    /// Pick whichever enabled stream is furthest behind and advance
    /// its cursor, switching to the sentinel at the end of the clip.
    fn advance_cursor(&self) -> NextUnit {
        let duration_us = self.duration_us();
        let mut cursor = self.shared.cursor.lock();

        let video = (self.with_video && !cursor.video_eof_sent).then_some(cursor.next_video_us);
        let audio = (self.with_audio && !cursor.audio_eof_sent).then_some(cursor.next_audio_us);

        let take_video = match (video, audio) {
            (Some(v), Some(a)) => v <= a,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return NextUnit::Drained,
        };

        if take_video {
            if cursor.next_video_us >= duration_us {
                cursor.video_eof_sent = true;
                NextUnit::VideoEof
            } else {
                let pts = cursor.next_video_us;
                cursor.next_video_us += self.frame_interval_us();
                NextUnit::Video(pts)
            }
        } else if cursor.next_audio_us >= duration_us {
            cursor.audio_eof_sent = true;
            NextUnit::AudioEof
        } else {
            let pts = cursor.next_audio_us;
            cursor.next_audio_us += AUDIO_CHUNK_US;
            NextUnit::Audio(pts)
        }
    }

    fn produce_next(&self, on_frame: &FrameCallback) {
        let shared = &self.shared;
        let generation = shared.generation.load(Ordering::SeqCst);

        let frame = match self.advance_cursor() {
            NextUnit::Video(pts) => self.make_video_frame(pts),
            NextUnit::Audio(pts) => self.make_audio_frame(pts),
            NextUnit::VideoEof => {
                shared.video_eof.store(true, Ordering::SeqCst);
                Frame::sentinel(MediaType::Video)
            }
            NextUnit::AudioEof => {
                shared.audio_eof.store(true, Ordering::SeqCst);
                Frame::sentinel(MediaType::Audio)
            }
            NextUnit::Drained => {
                // Fully drained; idle until a seek rewinds or stop lands.
                thread::sleep(Duration::from_millis(10));
                return;
            }
        };

        let _delivery = shared.delivery.lock();
        if shared.generation.load(Ordering::SeqCst) != generation {
            // A seek landed while this frame was being generated.
            return;
        }
        on_frame(frame);
    }
}

impl Decoder for SyntheticDecoder {
    fn open(&self, source: &MediaSource) -> Result<MediaInfo> {
        log::info!("Synthetic source standing in for {}", source.describe());
        self.open.store(true, Ordering::SeqCst);
        Ok(MediaInfo {
            duration: self.duration,
            video: self.with_video.then_some(VideoStreamInfo {
                width: self.width,
                height: self.height,
                fps: self.fps,
            }),
            audio: self.with_audio.then_some(AudioStreamInfo {
                sample_rate: self.sample_rate,
                channels: self.channels,
            }),
            seekable: true,
        })
    }

    fn start(&self, on_frame: FrameCallback) -> Result<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(ClipPlayerError::InvalidState(
                "no source open".to_string(),
            ));
        }
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Err(ClipPlayerError::InvalidState(
                "decoder already started".to_string(),
            ));
        }

        {
            let mut cursor = self.shared.cursor.lock();
            cursor.next_video_us = 0;
            cursor.next_audio_us = 0;
            cursor.video_eof_sent = false;
            cursor.audio_eof_sent = false;
        }
        self.shared.video_eof.store(false, Ordering::SeqCst);
        self.shared.audio_eof.store(false, Ordering::SeqCst);

        // The producer borrows from a clone of the generator settings;
        // the struct itself is immutable after construction.
        let producer = Self {
            duration: self.duration,
            fps: self.fps,
            width: self.width,
            height: self.height,
            sample_rate: self.sample_rate,
            channels: self.channels,
            tone_hz: self.tone_hz,
            with_video: self.with_video,
            with_audio: self.with_audio,
            open: AtomicBool::new(true),
            shared: Arc::clone(&self.shared),
            thread: Mutex::new(None),
        };

        let handle = thread::Builder::new()
            .name("synthetic-decoder".to_string())
            .spawn(move || {
                log::debug!("Synthetic producer started");
                while producer.shared.running.load(Ordering::SeqCst) {
                    producer.produce_next(&on_frame);
                }
                log::debug!("Synthetic producer exited");
            })
            .map_err(|e| {
                self.shared.running.store(false, Ordering::SeqCst);
                ClipPlayerError::Decoder(format!("spawning producer thread: {}", e))
            })?;
        *self.thread.lock() = Some(handle);
        Ok(())
    }

    fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
        self.open.store(false, Ordering::SeqCst);
    }

    fn seek(&self, target_us: i64, _relative_us: i64) -> Result<()> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(ClipPlayerError::InvalidState(
                "no source open".to_string(),
            ));
        }
        let target_us = target_us.clamp(0, self.duration_us());

        // Taking the delivery lock fences out the frame currently in
        // flight; the generation bump discards it.
        let _delivery = self.shared.delivery.lock();
        self.shared.generation.fetch_add(1, Ordering::SeqCst);

        let interval = self.frame_interval_us();
        let mut cursor = self.shared.cursor.lock();
        cursor.next_video_us = (target_us / interval) * interval;
        cursor.next_audio_us = (target_us / AUDIO_CHUNK_US) * AUDIO_CHUNK_US;
        cursor.video_eof_sent = false;
        cursor.audio_eof_sent = false;
        self.shared.video_eof.store(false, Ordering::SeqCst);
        self.shared.audio_eof.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_eof(&self, media_type: MediaType) -> bool {
        match media_type {
            MediaType::Video => self.shared.video_eof.load(Ordering::SeqCst),
            MediaType::Audio => self.shared.audio_eof.load(Ordering::SeqCst),
        }
    }

    fn is_ready(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Drop for SyntheticDecoder {
    fn drop(&mut self) {
        self.stop();
    }
}
