//! Master playback clock for ClipPlayer
//!
//! Tracks the current playback position as a function of a reference
//! media timestamp, the wall-clock instant it was captured at, and the
//! playback speed. Whichever consumer has authoritative position data
//! re-anchors it: the audio callback while audio is enabled, otherwise
//! the video presentation loop. Any thread may read it.

use parking_lot::Mutex;
use std::time::Instant;

/// Shared playback clock.
///
/// All fields update as one compound unit under a single short-held
/// lock, so readers never observe a half-written reference point.
pub struct PlaybackClock {
    inner: Mutex<ClockState>,
}

#[derive(Debug, Clone, Copy)]
struct ClockState {
    /// Media time at the reference point, in microseconds. None is the
    /// "no timestamp" sentinel used between a seek and the first
    /// re-anchor.
    reference_media_us: Option<i64>,

    /// Wall-clock instant of the reference point
    reference_wall: Instant,

    /// Playback speed ratio (media seconds per wall second)
    speed: f64,

    /// While paused, time() returns the frozen reference
    paused: bool,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(ClockState {
                reference_media_us: None,
                reference_wall: Instant::now(),
                speed: 1.0,
                paused: true,
            }),
        }
    }

    /// Establish a new reference point at `wall_ts`.
    pub fn set_at(&self, media_us: i64, wall_ts: Instant) {
        let mut inner = self.inner.lock();
        inner.reference_media_us = Some(media_us);
        inner.reference_wall = wall_ts;
    }

    /// Establish a new reference point at the current instant.
    pub fn set(&self, media_us: i64) {
        self.set_at(media_us, Instant::now());
    }

    /// Clear the clock back to the "no timestamp" sentinel (seek reset).
    pub fn clear(&self) {
        self.inner.lock().reference_media_us = None;
    }

    /// Current playback position in microseconds, or None while the
    /// clock is unanchored.
    pub fn time_us(&self) -> Option<i64> {
        let inner = self.inner.lock();
        Self::time_locked(&inner)
    }

    fn time_locked(inner: &ClockState) -> Option<i64> {
        let reference = inner.reference_media_us?;
        if inner.paused {
            return Some(reference);
        }
        let elapsed_us = inner.reference_wall.elapsed().as_micros() as i64;
        Some(reference + (elapsed_us as f64 * inner.speed) as i64)
    }

    /// Freeze the clock at its current reading.
    pub fn pause(&self) {
        let mut inner = self.inner.lock();
        if inner.paused {
            return;
        }
        inner.reference_media_us = Self::time_locked(&inner);
        inner.reference_wall = Instant::now();
        inner.paused = true;
    }

    /// Resume from the frozen reading without losing or double-counting
    /// the paused interval.
    pub fn resume(&self) {
        let mut inner = self.inner.lock();
        if !inner.paused {
            return;
        }
        inner.reference_wall = Instant::now();
        inner.paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().paused
    }

    /// Change the speed ratio, re-basing the reference at the call
    /// instant so the displayed time does not jump.
    pub fn set_speed(&self, speed: f64) {
        let mut inner = self.inner.lock();
        if !inner.paused {
            inner.reference_media_us = Self::time_locked(&inner);
            inner.reference_wall = Instant::now();
        }
        inner.speed = speed;
    }

    pub fn speed(&self) -> f64 {
        self.inner.lock().speed
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}
