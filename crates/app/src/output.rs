use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::Duration,
};

use rodio::{OutputStream, OutputStreamHandle, Source};
use stemviz_core::{audio::OUTPUT_CHANNELS, Result, SharedContext, StemPlayerError};

/// Pulls rendered blocks out of the shared context for the output device.
struct MixerSource {
    ctx: SharedContext,
    sample_rate: u32,
    buffer: Vec<f32>,
    pos: usize,
}

impl MixerSource {
    fn new(ctx: SharedContext, sample_rate: u32, block_size: usize) -> Self {
        let len = block_size.max(1) * usize::from(OUTPUT_CHANNELS);
        Self {
            ctx,
            sample_rate,
            buffer: vec![0.0; len],
            // Start at the end so the first call renders.
            pos: len,
        }
    }
}

impl Iterator for MixerSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if self.pos >= self.buffer.len() {
            match self.ctx.lock() {
                Ok(mut ctx) => ctx.render(&mut self.buffer),
                Err(_) => self.buffer.fill(0.0),
            }
            self.pos = 0;
        }
        let sample = self.buffer[self.pos];
        self.pos += 1;
        Some(sample)
    }
}

impl Source for MixerSource {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        OUTPUT_CHANNELS
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Keeps the audio clock moving for as long as it is alive.
///
/// Prefers the default output device. Without one, a background thread
/// renders into a scratch buffer at real-time pace so playback, analysis
/// and note events still progress.
pub struct AudioOutput {
    _device: Option<(OutputStream, OutputStreamHandle)>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl AudioOutput {
    pub fn start(ctx: SharedContext, block_size: usize) -> Result<Self> {
        let sample_rate = ctx.lock()?.sample_rate();
        let running = Arc::new(AtomicBool::new(true));

        match OutputStream::try_default() {
            Ok((stream, handle)) => {
                handle
                    .play_raw(MixerSource::new(ctx, sample_rate, block_size))
                    .map_err(|err| StemPlayerError::msg(format!("failed to start audio output: {err}")))?;
                tracing::info!(sample_rate, "audio output started");
                Ok(Self {
                    _device: Some((stream, handle)),
                    running,
                    worker: None,
                })
            }
            Err(err) => {
                tracing::warn!(error = %err, "no audio device, rendering silently");
                let worker = spawn_silent_clock(ctx, sample_rate, block_size, running.clone())?;
                Ok(Self {
                    _device: None,
                    running,
                    worker: Some(worker),
                })
            }
        }
    }
}

fn spawn_silent_clock(
    ctx: SharedContext,
    sample_rate: u32,
    block_size: usize,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let frames = block_size.max(1);
    let period = Duration::from_secs_f64(frames as f64 / f64::from(sample_rate.max(1)));
    std::thread::Builder::new()
        .name("stemviz-clock".into())
        .spawn(move || {
            let mut block = vec![0.0f32; frames * usize::from(OUTPUT_CHANNELS)];
            while running.load(Ordering::Relaxed) {
                match ctx.lock() {
                    Ok(mut ctx) => ctx.render(&mut block),
                    Err(_) => break,
                }
                std::thread::sleep(period);
            }
        })
        .map_err(StemPlayerError::from)
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use stemviz_core::AudioContext;

    use super::*;

    #[test]
    fn source_renders_interleaved_blocks_and_advances_clock() {
        let ctx = SharedContext::new(AudioContext::new(100));
        let mut source = MixerSource::new(ctx.clone(), 100, 10);

        let samples: Vec<f32> = source.by_ref().take(30).collect();
        assert_eq!(samples.len(), 30);
        assert!(samples.iter().all(|s| *s == 0.0));
        assert_eq!(source.channels(), 2);
        // 30 samples crossed into a second 10-frame block.
        assert!((ctx.lock().unwrap().current_time() - 0.2).abs() < 1e-9);
    }
}
