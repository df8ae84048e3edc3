//! Real-time audio pull callback for ClipPlayer
//!
//! The OS audio stack invokes [`EnginePull::pull`] at hardware cadence.
//! The callback drains the audio queue through the time-stretcher,
//! re-anchors the master clock from the audio position, and hands
//! speed-adjusted samples to the hardware. It never blocks: its only
//! operations are bounded pops, ring reads, and short lock holds.
//!
//! Audio is authoritative for the clock whenever it is enabled,
//! because hardware playout cannot be throttled the way a sleep-paced
//! loop can.

use crate::audio::{AudioFormat, AudioPull, TimeStretcher};
use crate::media::{FramePayload, MediaType};
use crate::player::{EngineCommand, EngineShared, NO_AUDIO_POSITION};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

/// How much output the stretcher should hold relative to one hardware
/// request before we stop feeding it
const STRETCH_TARGET_FACTOR: usize = 2;

pub(crate) struct EnginePull {
    shared: Arc<EngineShared>,
    stretcher: Arc<dyn TimeStretcher>,
    format: AudioFormat,
}

impl EnginePull {
    pub fn new(
        shared: Arc<EngineShared>,
        stretcher: Arc<dyn TimeStretcher>,
        format: AudioFormat,
    ) -> Self {
        Self {
            shared,
            stretcher,
            format,
        }
    }

    /// Feed queued frames into the stretcher until it holds enough
    /// output for this request, recording the media time just past the
    /// last fed sample.
    fn feed_stretcher(&self, want_samples: usize) {
        let shared = &self.shared;
        while !shared.audio_queue.is_empty()
            && self.stretcher.available_samples() < want_samples * STRETCH_TARGET_FACTOR
        {
            // Sole consumer of a non-empty queue: this pop returns
            // without waiting.
            let Some(frame) = shared.audio_queue.wait_and_pop() else {
                break;
            };
            let end_us = frame.end_us();
            if let Some(FramePayload::Audio(audio)) = frame.payload {
                self.stretcher.write(&audio.samples);
                shared.audio_position_us.store(end_us, Ordering::Release);
            }
        }
    }

    /// Re-anchor the clock: the sample at the speaker right now is the
    /// latest fed position minus everything still buffered between the
    /// stretcher and the hardware.
    fn anchor_clock(&self, now: Instant) {
        let shared = &self.shared;
        let position_us = shared.audio_position_us.load(Ordering::Acquire);
        if position_us == NO_AUDIO_POSITION {
            return;
        }

        let channels = self.format.channels.max(1) as usize;
        let buffered_frames = self.stretcher.available_samples() / channels
            + shared.hardware_buffer_frames.load(Ordering::Relaxed);
        let buffered_us = self.format.frames_to_us(buffered_frames);
        let speed = shared.clock.speed();
        let anchor_us = position_us - (buffered_us as f64 * speed) as i64;
        shared.clock.set_at(anchor_us, now);
    }
}

impl AudioPull for EnginePull {
    fn pull(&self, out: &mut [f32], frames: usize, now: Instant) -> usize {
        let shared = &self.shared;

        if !shared.running.load(Ordering::SeqCst)
            || shared.seek_in_flight.load(Ordering::SeqCst)
            || shared.audio_done.load(Ordering::SeqCst)
        {
            return 0;
        }

        let paused = shared.paused.load(Ordering::SeqCst);
        if paused && shared.audio_steps.load(Ordering::SeqCst) <= 0 {
            return 0;
        }

        let _speed_hold = shared.speed_gate.lock();

        let channels = self.format.channels.max(1) as usize;
        let want = frames * channels;

        if shared.audio_eof.load(Ordering::SeqCst) && shared.audio_queue.is_empty() {
            self.stretcher.flush();
            if self.stretcher.available_samples() == 0 {
                shared.audio_done.store(true, Ordering::SeqCst);
                let _ = shared
                    .cmd_tx
                    .send(EngineCommand::PipelineDone(MediaType::Audio));
                return 0;
            }
        } else {
            self.feed_stretcher(want);
        }

        self.anchor_clock(now);

        if paused {
            shared.audio_steps.fetch_sub(1, Ordering::SeqCst);
        }

        let take = want.min(out.len());
        let produced = self.stretcher.read(&mut out[..take]);
        produced / channels
    }
}
