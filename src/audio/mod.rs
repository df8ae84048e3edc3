//! Audio output module for ClipPlayer
//!
//! This module defines the hardware audio output interface and the
//! time-stretcher interface, plus the cpal-backed renderer used by the
//! demo binary. The engine drives audio strictly pull-style: the
//! hardware invokes a callback at its own cadence and the engine fills
//! whatever it can without blocking.

mod cpal_output;
mod stretcher;

pub use cpal_output::CpalAudioRenderer;
pub use stretcher::{LinearStretcher, TimeStretcher};

use crate::utils::error::Result;
use std::sync::Arc;
use std::time::Instant;

/// Audio format specification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of interleaved channels
    pub channels: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

impl AudioFormat {
    /// Convert a number of sample frames to a duration in microseconds
    pub fn frames_to_us(&self, frames: usize) -> i64 {
        if self.sample_rate == 0 {
            return 0;
        }
        frames as i64 * 1_000_000 / self.sample_rate as i64
    }
}

/// Pull capability implemented by the engine.
///
/// The OS audio stack invokes this asynchronously at hardware cadence.
/// Implementations must not block.
pub trait AudioPull: Send + Sync {
    /// Fill `out` with up to `frames` frames of interleaved samples.
    ///
    /// Returns the number of frames actually produced; 0 is a valid,
    /// non-error result and the caller renders silence for the rest.
    fn pull(&self, out: &mut [f32], frames: usize, now: Instant) -> usize;
}

/// Hardware audio output (collaborator).
///
/// Owns the device and the real-time stream; drains the registered
/// [`AudioPull`] from the stream callback.
pub trait AudioRenderer: Send + Sync {
    /// Open the output device for the given format and register the
    /// pull callback
    fn open(&self, format: AudioFormat, pull: Arc<dyn AudioPull>) -> Result<()>;

    /// Start the stream
    fn start(&self) -> Result<()>;

    /// Stop the stream and release the device
    fn stop(&self) -> Result<()>;

    /// Pause the stream without releasing it
    fn pause(&self) -> Result<()>;

    /// Resume a paused stream
    fn resume(&self) -> Result<()>;

    /// Flush the hardware buffer and zero the internal position.
    /// Called on every seek.
    fn reset(&self) -> Result<()>;

    /// Set output volume (0.0 to 1.0)
    fn set_volume(&self, volume: f32);

    /// Mute or unmute without touching the volume level
    fn set_muted(&self, muted: bool);

    /// Hardware buffer depth in sample frames (playout latency)
    fn buffer_size(&self) -> usize;
}
