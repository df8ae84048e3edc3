//! Media model and collaborator interfaces for ClipPlayer
//!
//! This module defines the decoded frame model shared by the playback
//! engine and the traits for the external collaborators: the
//! demux/decode engine, the video render sink, and the subtitle source.
//! The engine treats all of them as opaque; only their contracts are
//! specified here.

mod synthetic;

pub use synthetic::SyntheticDecoder;

use crate::utils::error::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Media stream type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Video,
    Audio,
}

/// A decoded media unit handed from the decoder to the engine.
///
/// A frame with `payload == None` is the end-of-stream sentinel for its
/// media type. Decode errors surface the same way; the engine does not
/// distinguish the two.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Presentation timestamp in microseconds, in the source time base
    pub pts_us: i64,

    /// Frame duration in microseconds (span of the contained samples
    /// for audio)
    pub duration_us: i64,

    /// Which stream this frame belongs to
    pub media_type: MediaType,

    /// Decoded payload, or None for the end-of-stream sentinel
    pub payload: Option<FramePayload>,
}

impl Frame {
    /// End-of-stream sentinel for the given media type
    pub fn sentinel(media_type: MediaType) -> Self {
        Self {
            pts_us: 0,
            duration_us: 0,
            media_type,
            payload: None,
        }
    }

    /// Whether this frame is the end-of-stream sentinel
    pub fn is_sentinel(&self) -> bool {
        self.payload.is_none()
    }

    /// Media time just past the end of this frame, in microseconds
    pub fn end_us(&self) -> i64 {
        self.pts_us + self.duration_us
    }
}

/// Decoded frame payload
#[derive(Debug, Clone)]
pub enum FramePayload {
    Video(VideoFrame),
    Audio(AudioFrame),
}

/// Decoded video frame
///
/// The pixel data is opaque to the engine; it is forwarded to the
/// render sink untouched.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Packed RGBA pixel data
    pub data: Vec<u8>,
}

/// Decoded audio frame (interleaved f32 samples at the source rate)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of interleaved channels
    pub channels: u16,

    /// Interleaved samples
    pub samples: Vec<f32>,
}

impl AudioFrame {
    /// Duration of the contained samples in microseconds
    pub fn duration_us(&self) -> i64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let frames = self.samples.len() as i64 / self.channels as i64;
        frames * 1_000_000 / self.sample_rate as i64
    }
}

/// Media source to open
#[derive(Debug, Clone)]
pub enum MediaSource {
    /// Local file (recorded clip or external media)
    File(PathBuf),

    /// Network stream
    Url(String),

    /// Live capture preview (unseekable)
    Capture(String),
}

impl MediaSource {
    /// Display name for logging
    pub fn describe(&self) -> String {
        match self {
            MediaSource::File(p) => p.display().to_string(),
            MediaSource::Url(u) => u.clone(),
            MediaSource::Capture(name) => format!("capture:{}", name),
        }
    }
}

/// Media information reported by the decoder on open
#[derive(Debug, Clone)]
pub struct MediaInfo {
    /// Total duration (zero for live sources)
    pub duration: Duration,

    /// Video stream properties, if a video stream exists
    pub video: Option<VideoStreamInfo>,

    /// Audio stream properties, if an audio stream exists
    pub audio: Option<AudioStreamInfo>,

    /// False for live/unseekable feeds; disables pacing and seeking
    pub seekable: bool,
}

impl MediaInfo {
    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }
}

/// Video stream information
#[derive(Debug, Clone)]
pub struct VideoStreamInfo {
    /// Video width
    pub width: u32,

    /// Video height
    pub height: u32,

    /// Frame rate (frames per second)
    pub fps: f32,
}

/// Audio stream information
#[derive(Debug, Clone)]
pub struct AudioStreamInfo {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of channels
    pub channels: u16,
}

/// Callback invoked by the decoder for every decoded frame.
///
/// Invoked on the decoder's own thread(s); may block on engine
/// backpressure.
pub type FrameCallback = Arc<dyn Fn(Frame) + Send + Sync>;

/// External demux/decode engine.
///
/// The decoder owns its own threads. It must deliver a sentinel frame
/// per media type at end of stream, and after `seek` it must discard
/// any already-decoded frames that predate the seek target before
/// resuming delivery.
pub trait Decoder: Send + Sync {
    /// Open a media source and probe its streams
    fn open(&self, source: &MediaSource) -> Result<MediaInfo>;

    /// Begin decoding, delivering frames through the callback
    fn start(&self, on_frame: FrameCallback) -> Result<()>;

    /// Stop decoding and release the source
    fn stop(&self);

    /// Seek to an absolute timestamp; `relative_us` hints the direction
    /// relative to the current position
    fn seek(&self, target_us: i64, relative_us: i64) -> Result<()>;

    /// Whether the given stream has reached end of stream
    fn is_eof(&self, media_type: MediaType) -> bool;

    /// Whether the decoder has an open source
    fn is_ready(&self) -> bool;
}

/// Video/subtitle presentation sink.
///
/// A pure consumer: it issues no feedback into the engine.
pub trait RenderSink: Send + Sync {
    /// Present a video frame
    fn present_video(&self, frame: VideoFrame);

    /// Present subtitle text; `changed` is false when the cue is the
    /// same as the previous call
    fn present_subtitle(&self, text: &str, changed: bool);
}

/// Subtitle lookup keyed by playback time
pub trait SubtitleSource: Send + Sync {
    /// Subtitle text visible at the given media time, if any
    fn cue_at(&self, time: Duration) -> Option<String>;
}
