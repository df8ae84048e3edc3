//! ClipPlayer - audio/video playback synchronization engine
//!
//! The engine core of an embedded media player: a master playback
//! clock, bounded per-stream frame queues, a paced video presentation
//! loop, a real-time audio pull path with time-stretching, and a
//! controller that coordinates open/play/pause/seek/speed/finish.
//!
//! External collaborators (demux/decode, video rendering, audio
//! output, subtitles) plug in behind the traits in [`media`] and
//! [`audio`]; a synthetic decoder and a cpal-backed audio renderer
//! are provided.

pub mod audio;
pub mod media;
pub mod player;
pub mod utils;

pub use media::{Decoder, Frame, MediaInfo, MediaSource, MediaType, RenderSink, SubtitleSource};
pub use player::{PlaybackState, PlayerBuilder, PlayerController, PlayerEvent, PlayerEventHandler};
pub use utils::error::{ClipPlayerError, Result};
