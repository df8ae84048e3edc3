//! Video presentation loop for ClipPlayer
//!
//! A dedicated thread that drains the video queue, paces frames
//! against the master clock, and forwards them to the render sink.
//! While idle (done, seeking, or paused without a pending step) it
//! polls at a short fixed interval instead of busy-spinning, so it
//! stays responsive to resume and single-step requests.

use crate::media::{FramePayload, MediaType, RenderSink, SubtitleSource};
use crate::player::{
    EngineCommand, EngineShared, PlayerEvent, IDLE_POLL, MAX_PACING_SLEEP_US,
    PACING_HYSTERESIS_US,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub(crate) fn run_video_loop(
    shared: Arc<EngineShared>,
    sink: Arc<dyn RenderSink>,
    subtitles: Option<Arc<dyn SubtitleSource>>,
) {
    log::debug!("Video presentation loop started");
    let mut last_cue: Option<String> = None;

    while shared.running.load(Ordering::SeqCst) {
        if shared.video_eof.load(Ordering::SeqCst)
            && !shared.video_done.load(Ordering::SeqCst)
            && shared.video_queue.is_empty()
        {
            shared.video_done.store(true, Ordering::SeqCst);
            let _ = shared
                .cmd_tx
                .send(EngineCommand::PipelineDone(MediaType::Video));
            continue;
        }

        let stepping = shared.video_steps.load(Ordering::SeqCst) > 0;
        let idle = shared.video_done.load(Ordering::SeqCst)
            || shared.video_queue.is_stopped()
            || (shared.paused.load(Ordering::SeqCst) && !stepping);
        if idle {
            thread::sleep(IDLE_POLL);
            continue;
        }

        let Some(frame) = shared.video_queue.wait_and_pop() else {
            // Queue stopped while we were waiting (seek or shutdown).
            continue;
        };
        let Some(FramePayload::Video(video)) = frame.payload else {
            continue;
        };

        if let Some(source) = subtitles.as_deref() {
            let time_us = shared.clock.time_us().unwrap_or(frame.pts_us);
            present_subtitles(&*sink, source, time_us, &mut last_cue);
        }

        sink.present_video(video);

        // Pacing: hold off the next pop until this frame's timestamp
        // has passed on the master clock. Skipped while stepping and
        // for live feeds.
        if !stepping && shared.pace_video.load(Ordering::SeqCst) {
            if let Some(now_us) = shared.clock.time_us() {
                let speed = shared.clock.speed();
                let diff_us = ((frame.pts_us - now_us) as f64 / speed) as i64;
                let diff_us = diff_us.clamp(0, MAX_PACING_SLEEP_US);
                if diff_us > PACING_HYSTERESIS_US {
                    thread::sleep(Duration::from_micros(diff_us as u64));
                }
            }
        }

        // Without audio, the video loop is the clock's writer.
        if !shared.audio_master.load(Ordering::SeqCst) {
            shared.clock.set(frame.pts_us);
        }

        if let Some(position_us) = shared.clock.time_us() {
            shared.emit(PlayerEvent::PositionChanged {
                position: Duration::from_micros(position_us.max(0) as u64),
            });
        }

        if stepping {
            shared.video_steps.fetch_sub(1, Ordering::SeqCst);
        }
    }

    log::debug!("Video presentation loop exited");
}

fn present_subtitles(
    sink: &dyn RenderSink,
    source: &dyn SubtitleSource,
    time_us: i64,
    last_cue: &mut Option<String>,
) {
    let cue = source.cue_at(Duration::from_micros(time_us.max(0) as u64));
    match (&cue, &last_cue) {
        (Some(text), Some(previous)) => {
            let changed = text != previous;
            sink.present_subtitle(text, changed);
        }
        (Some(text), None) => sink.present_subtitle(text, true),
        (None, Some(_)) => sink.present_subtitle("", true),
        (None, None) => {}
    }
    *last_cue = cue;
}
