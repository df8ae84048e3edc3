//! Time-stretching sample processor for ClipPlayer
//!
//! The engine talks to the stretcher through the [`TimeStretcher`]
//! trait: decoded samples go in at the source cadence, speed-adjusted
//! samples come out at the hardware's fixed rate. The bundled
//! [`LinearStretcher`] is a plain rate-change resampler (pitch follows
//! speed); a Sonic-style pitch-preserving processor can be swapped in
//! behind the same trait.

use crate::audio::AudioFormat;
use crate::utils::error::{ClipPlayerError, Result};
use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::collections::VecDeque;

/// Output ring capacity in interleaved samples (~680ms of stereo 48kHz)
const OUT_RING_SAMPLES: usize = 1 << 16;

/// Speed/pitch-adjusting sample processor (collaborator).
///
/// Internally thread-safe: callable concurrently from the audio
/// callback and the controlling thread.
pub trait TimeStretcher: Send + Sync {
    /// Feed interleaved input samples at the source rate
    fn write(&self, samples: &[f32]);

    /// Read up to `out.len()` processed samples; returns how many were
    /// produced (0 is not an error)
    fn read(&self, out: &mut [f32]) -> usize;

    /// Change the speed ratio for subsequently processed samples
    fn set_speed(&self, speed: f32);

    /// Current speed ratio
    fn speed(&self) -> f32;

    /// Force emission of internally held input without extra delay
    fn flush(&self);

    /// Flush and discard all buffered input and output
    fn drain(&self);

    /// Processed samples ready to read, interleaved
    fn available_samples(&self) -> usize;

    /// Estimate of samples that will be readable once pending input is
    /// processed, including `available_samples`
    fn expected_samples(&self) -> usize;
}

/// Linear-interpolation rate changer implementing [`TimeStretcher`].
pub struct LinearStretcher {
    channels: usize,
    inner: Mutex<StretchState>,
}

struct StretchState {
    /// Interleaved input frames awaiting conversion
    pending: VecDeque<f32>,

    /// Fractional read position into `pending`, in frames
    pos: f64,

    /// Speed ratio: input frames consumed per output frame
    speed: f64,

    out_prod: HeapProd<f32>,
    out_cons: HeapCons<f32>,
}

impl LinearStretcher {
    /// Create a stretcher for the given stream format.
    pub fn new(format: AudioFormat) -> Result<Self> {
        if format.channels == 0 || format.sample_rate == 0 {
            return Err(ClipPlayerError::Stretcher(format!(
                "invalid format: {} Hz, {} channels",
                format.sample_rate, format.channels
            )));
        }

        let (out_prod, out_cons) = HeapRb::<f32>::new(OUT_RING_SAMPLES).split();
        Ok(Self {
            channels: format.channels as usize,
            inner: Mutex::new(StretchState {
                pending: VecDeque::new(),
                pos: 0.0,
                speed: 1.0,
                out_prod,
                out_cons,
            }),
        })
    }

    /// Resample as much pending input as the output ring has room for.
    fn convert(&self, state: &mut StretchState) {
        let ch = self.channels;
        loop {
            let frames = state.pending.len() / ch;
            let i0 = state.pos.floor() as usize;
            // Interpolation needs the frame after i0.
            if i0 + 1 >= frames || state.out_prod.vacant_len() < ch {
                break;
            }

            let frac = (state.pos - i0 as f64) as f32;
            for c in 0..ch {
                let a = state.pending[i0 * ch + c];
                let b = state.pending[(i0 + 1) * ch + c];
                let _ = state.out_prod.try_push(a + (b - a) * frac);
            }
            state.pos += state.speed;
        }

        // Drop fully consumed input frames, keeping the carry frame.
        let consumed = (state.pos.floor() as usize).min(state.pending.len() / ch);
        if consumed > 0 {
            state.pending.drain(..consumed * ch);
            state.pos -= consumed as f64;
        }
    }
}

impl TimeStretcher for LinearStretcher {
    fn write(&self, samples: &[f32]) {
        let mut state = self.inner.lock();
        state.pending.extend(samples.iter().copied());
        self.convert(&mut state);
    }

    fn read(&self, out: &mut [f32]) -> usize {
        let mut state = self.inner.lock();
        self.convert(&mut state);
        state.out_cons.pop_slice(out)
    }

    fn set_speed(&self, speed: f32) {
        let mut state = self.inner.lock();
        state.speed = speed.max(0.01) as f64;
    }

    fn speed(&self) -> f32 {
        self.inner.lock().speed as f32
    }

    fn flush(&self) {
        let ch = self.channels;
        let mut state = self.inner.lock();
        self.convert(&mut state);

        // Emit the tail frames straight through; interpolation has
        // nothing past the end to blend with.
        let start = (state.pos.ceil() as usize) * ch;
        let tail: Vec<f32> = state.pending.iter().skip(start).copied().collect();
        for chunk in tail.chunks(ch) {
            if state.out_prod.vacant_len() < ch {
                break;
            }
            for &s in chunk {
                let _ = state.out_prod.try_push(s);
            }
        }
        state.pending.clear();
        state.pos = 0.0;
    }

    fn drain(&self) {
        let mut state = self.inner.lock();
        state.pending.clear();
        state.pos = 0.0;
        let mut scratch = [0.0f32; 256];
        while state.out_cons.pop_slice(&mut scratch) > 0 {}
    }

    fn available_samples(&self) -> usize {
        self.inner.lock().out_cons.occupied_len()
    }

    fn expected_samples(&self) -> usize {
        let state = self.inner.lock();
        let frames = state.pending.len() / self.channels;
        let remaining = (frames as f64 - state.pos).max(0.0);
        state.out_cons.occupied_len() + (remaining / state.speed) as usize * self.channels
    }
}
