//! CPAL audio renderer for ClipPlayer
//!
//! Implements the [`AudioRenderer`] trait on top of cpal. The stream
//! object is not `Send`, so a dedicated worker thread owns it and the
//! trait methods talk to that thread over a command channel. The
//! stream's data callback drains the registered [`AudioPull`] and
//! fills the remainder with silence.

use crate::audio::{AudioFormat, AudioPull, AudioRenderer};
use crate::utils::error::{ClipPlayerError, IntoPlayerError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Requested hardware buffer depth in frames
const PREFERRED_BUFFER_FRAMES: u32 = 1024;

/// Volume ramp duration for smooth transitions (in samples)
const VOLUME_RAMP_SAMPLES: usize = 512;

/// Commands processed by the stream-owning worker thread
enum AudioCommand {
    Open {
        format: AudioFormat,
        pull: Arc<dyn AudioPull>,
        reply: Sender<Result<usize>>,
    },
    Start(Sender<Result<()>>),
    Stop(Sender<Result<()>>),
    Pause(Sender<Result<()>>),
    Resume(Sender<Result<()>>),
    Reset(Sender<Result<usize>>),
    Shutdown,
}

/// Volume control with smooth ramping between levels
struct VolumeControl {
    current: f32,
    target: f32,
    ramp_samples: usize,
}

impl VolumeControl {
    fn new(initial: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            ramp_samples: 0,
        }
    }

    fn process(&mut self, sample: f32) -> f32 {
        if self.ramp_samples > 0 {
            let step = (self.target - self.current) / self.ramp_samples as f32;
            self.current += step;
            self.ramp_samples -= 1;

            if self.ramp_samples == 0 {
                self.current = self.target;
            }
        }

        sample * self.current
    }

    fn set_target(&mut self, volume: f32) {
        self.target = volume.clamp(0.0, 1.0);
        self.ramp_samples = VOLUME_RAMP_SAMPLES;
    }
}

/// cpal-backed hardware audio output
pub struct CpalAudioRenderer {
    cmd_tx: Sender<AudioCommand>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    volume: Arc<Mutex<VolumeControl>>,
    muted: Arc<AtomicBool>,
    playing: Arc<AtomicBool>,
    buffer_frames: AtomicUsize,
}

impl CpalAudioRenderer {
    pub fn new() -> Self {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded::<AudioCommand>();
        let volume = Arc::new(Mutex::new(VolumeControl::new(1.0)));
        let muted = Arc::new(AtomicBool::new(false));
        let playing = Arc::new(AtomicBool::new(false));

        let worker_volume = Arc::clone(&volume);
        let worker_muted = Arc::clone(&muted);
        let worker_playing = Arc::clone(&playing);

        let worker = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                stream_worker(cmd_rx, worker_volume, worker_muted, worker_playing);
            })
            .expect("failed to spawn audio worker thread");

        Self {
            cmd_tx,
            worker: Mutex::new(Some(worker)),
            volume,
            muted,
            playing,
            buffer_frames: AtomicUsize::new(PREFERRED_BUFFER_FRAMES as usize),
        }
    }

    fn roundtrip<T>(
        &self,
        make: impl FnOnce(Sender<Result<T>>) -> AudioCommand,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = bounded(1);
        self.cmd_tx
            .send(make(reply_tx))
            .map_err(|_| ClipPlayerError::Audio("audio worker is gone".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| ClipPlayerError::Audio("audio worker dropped reply".to_string()))?
    }
}

impl Default for CpalAudioRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioRenderer for CpalAudioRenderer {
    fn open(&self, format: AudioFormat, pull: Arc<dyn AudioPull>) -> Result<()> {
        let frames = self.roundtrip(|reply| AudioCommand::Open {
            format,
            pull,
            reply,
        })?;
        self.buffer_frames.store(frames, Ordering::Relaxed);
        log::info!(
            "Audio output open: {} Hz, {} channels, {} frame buffer",
            format.sample_rate,
            format.channels,
            frames
        );
        Ok(())
    }

    fn start(&self) -> Result<()> {
        self.playing.store(true, Ordering::SeqCst);
        self.roundtrip(AudioCommand::Start)
    }

    fn stop(&self) -> Result<()> {
        self.playing.store(false, Ordering::SeqCst);
        self.roundtrip(AudioCommand::Stop)
    }

    fn pause(&self) -> Result<()> {
        self.playing.store(false, Ordering::SeqCst);
        self.roundtrip(AudioCommand::Pause)
    }

    fn resume(&self) -> Result<()> {
        self.playing.store(true, Ordering::SeqCst);
        self.roundtrip(AudioCommand::Resume)
    }

    fn reset(&self) -> Result<()> {
        let frames = self.roundtrip(AudioCommand::Reset)?;
        self.buffer_frames.store(frames, Ordering::Relaxed);
        Ok(())
    }

    fn set_volume(&self, volume: f32) {
        self.volume.lock().set_target(volume);
    }

    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    fn buffer_size(&self) -> usize {
        self.buffer_frames.load(Ordering::Relaxed)
    }
}

impl Drop for CpalAudioRenderer {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(AudioCommand::Shutdown);
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }
}

/// Worker loop owning the cpal stream.
fn stream_worker(
    cmd_rx: crossbeam_channel::Receiver<AudioCommand>,
    volume: Arc<Mutex<VolumeControl>>,
    muted: Arc<AtomicBool>,
    playing: Arc<AtomicBool>,
) {
    let mut stream: Option<cpal::Stream> = None;
    let mut open_args: Option<(AudioFormat, Arc<dyn AudioPull>)> = None;

    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            AudioCommand::Open {
                format,
                pull,
                reply,
            } => {
                stream = None;
                let result = build_stream(
                    format,
                    Arc::clone(&pull),
                    Arc::clone(&volume),
                    Arc::clone(&muted),
                    Arc::clone(&playing),
                );
                let _ = reply.send(match result {
                    Ok((new_stream, frames)) => {
                        stream = Some(new_stream);
                        open_args = Some((format, pull));
                        Ok(frames)
                    }
                    Err(e) => Err(e),
                });
            }
            AudioCommand::Start(reply) | AudioCommand::Resume(reply) => {
                let _ = reply.send(match stream.as_ref() {
                    Some(s) => s.play().audio_err("Starting output stream"),
                    None => Err(ClipPlayerError::Audio("stream not open".to_string())),
                });
            }
            AudioCommand::Pause(reply) => {
                let _ = reply.send(match stream.as_ref() {
                    // Some hosts cannot pause; the playing gate already
                    // silences the callback, so that is tolerable.
                    Some(s) => match s.pause() {
                        Ok(()) => Ok(()),
                        Err(e) => {
                            log::debug!("Stream pause unsupported: {}", e);
                            Ok(())
                        }
                    },
                    None => Err(ClipPlayerError::Audio("stream not open".to_string())),
                });
            }
            AudioCommand::Stop(reply) => {
                stream = None;
                open_args = None;
                let _ = reply.send(Ok(()));
            }
            AudioCommand::Reset(reply) => {
                // cpal has no flush; rebuilding the stream empties the
                // hardware buffer and restarts its internal clock.
                stream = None;
                let result = match open_args.as_ref() {
                    Some((format, pull)) => build_stream(
                        *format,
                        Arc::clone(pull),
                        Arc::clone(&volume),
                        Arc::clone(&muted),
                        Arc::clone(&playing),
                    )
                    .map(|(new_stream, frames)| {
                        let was_playing = playing.load(Ordering::SeqCst);
                        if was_playing {
                            if let Err(e) = new_stream.play() {
                                log::warn!("Failed to restart stream after reset: {}", e);
                            }
                        }
                        stream = Some(new_stream);
                        frames
                    }),
                    None => Err(ClipPlayerError::Audio("stream not open".to_string())),
                };
                let _ = reply.send(result);
            }
            AudioCommand::Shutdown => break,
        }
    }
}

/// Build an output stream; returns it with the hardware buffer depth
/// in frames.
fn build_stream(
    format: AudioFormat,
    pull: Arc<dyn AudioPull>,
    volume: Arc<Mutex<VolumeControl>>,
    muted: Arc<AtomicBool>,
    playing: Arc<AtomicBool>,
) -> Result<(cpal::Stream, usize)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| ClipPlayerError::Audio("no output device available".to_string()))?;

    let supported = device
        .default_output_config()
        .audio_err("Querying device config")?;

    let buffer_frames = match supported.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => {
            PREFERRED_BUFFER_FRAMES.clamp(*min, *max)
        }
        cpal::SupportedBufferSize::Unknown => PREFERRED_BUFFER_FRAMES,
    };

    let config = StreamConfig {
        channels: format.channels,
        sample_rate: SampleRate(format.sample_rate),
        buffer_size: BufferSize::Fixed(buffer_frames),
    };

    let channels = format.channels as usize;
    let data_fn = move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
        let frames = data.len() / channels;
        let produced = if playing.load(Ordering::SeqCst) {
            pull.pull(data, frames, Instant::now())
        } else {
            0
        };

        let filled = produced * channels;
        for sample in data[filled..].iter_mut() {
            *sample = 0.0;
        }

        if muted.load(Ordering::Relaxed) {
            for sample in data[..filled].iter_mut() {
                *sample = 0.0;
            }
        } else {
            let mut vol = volume.lock();
            for sample in data[..filled].iter_mut() {
                *sample = vol.process(*sample);
            }
        }
    };

    let err_fn = |err: cpal::StreamError| {
        log::error!("Audio stream error: {}", err);
    };

    match device.build_output_stream(&config, data_fn.clone(), err_fn, None) {
        Ok(stream) => Ok((stream, buffer_frames as usize)),
        Err(cpal::BuildStreamError::StreamConfigNotSupported) => {
            // Fall back to the device-chosen buffer size.
            let fallback = StreamConfig {
                buffer_size: BufferSize::Default,
                ..config
            };
            let stream = device
                .build_output_stream(&fallback, data_fn, err_fn, None)
                .audio_err("Building output stream")?;
            Ok((stream, buffer_frames as usize))
        }
        Err(e) => Err(ClipPlayerError::Audio(format!(
            "Building output stream: {}",
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_ramp_converges() {
        let mut vol = VolumeControl::new(1.0);
        vol.set_target(0.5);

        let mut last = 1.0;
        for _ in 0..VOLUME_RAMP_SAMPLES {
            let out = vol.process(1.0);
            assert!(out <= last + 1e-6, "ramp not monotonic");
            last = out;
        }
        assert!((vol.process(1.0) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_volume_target_clamped() {
        let mut vol = VolumeControl::new(1.0);
        vol.set_target(1.5);
        assert_eq!(vol.target, 1.0);

        vol.set_target(-0.3);
        assert_eq!(vol.target, 0.0);
    }
}
