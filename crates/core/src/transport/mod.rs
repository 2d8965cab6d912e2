//! Start/stop/seek for every stem as one unit, anchored to a single
//! reference instant on the audio clock so stems cannot drift apart.

use crate::{audio::AudioContext, stems::StemStore, Result, StemPlayerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Unloaded,
    Loaded,
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct Transport {
    state: TransportState,
    /// Audio-clock instant that corresponds to position zero.
    reference_instant: f64,
    paused_position: f64,
    duration: f64,
    start_lookahead: f64,
}

impl Transport {
    pub fn new(start_lookahead: f64) -> Self {
        Self {
            state: TransportState::Unloaded,
            reference_instant: 0.0,
            paused_position: 0.0,
            duration: 0.0,
            start_lookahead: start_lookahead.max(0.0),
        }
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == TransportState::Playing
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn reference_instant(&self) -> f64 {
        self.reference_instant
    }

    pub fn mark_loaded(&mut self, duration: f64) {
        self.state = TransportState::Loaded;
        self.duration = duration.max(0.0);
        self.paused_position = 0.0;
        self.reference_instant = 0.0;
    }

    pub fn reset(&mut self) {
        self.state = TransportState::Unloaded;
        self.duration = 0.0;
        self.paused_position = 0.0;
        self.reference_instant = 0.0;
    }

    /// Song position for the clock value `now`.
    pub fn position(&self, now: f64) -> f64 {
        match self.state {
            TransportState::Playing => (now - self.reference_instant).clamp(0.0, self.duration),
            _ => self.paused_position,
        }
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.state == TransportState::Unloaded {
            Err(StemPlayerError::NotLoaded)
        } else {
            Ok(())
        }
    }

    /// Starts every stem at one shared future instant. Returns `false` when
    /// already playing.
    pub fn play(&mut self, ctx: &mut AudioContext, stems: &mut StemStore) -> Result<bool> {
        self.ensure_loaded()?;
        if self.is_playing() {
            return Ok(false);
        }
        ctx.resume();
        self.start_all(ctx, stems)?;
        tracing::info!(position = self.paused_position, "transport playing");
        Ok(true)
    }

    fn start_all(&mut self, ctx: &mut AudioContext, stems: &mut StemStore) -> Result<()> {
        let start_instant = ctx.current_time() + self.start_lookahead;
        let offset = self.paused_position;
        let started = stems
            .iter_mut()
            .try_for_each(|stem| stem.restart(ctx, start_instant, offset));
        if let Err(err) = started {
            Self::release_all(ctx, stems);
            return Err(err);
        }
        self.reference_instant = start_instant - offset;
        self.state = TransportState::Playing;
        Ok(())
    }

    fn release_all(ctx: &mut AudioContext, stems: &mut StemStore) {
        for stem in stems.iter_mut() {
            stem.release(ctx);
        }
    }

    pub fn pause(&mut self, ctx: &mut AudioContext, stems: &mut StemStore) -> Result<()> {
        self.ensure_loaded()?;
        if !self.is_playing() {
            return Ok(());
        }
        // Pausing before the shared start instant keeps the resume point.
        self.paused_position = self
            .position(ctx.current_time())
            .max(self.paused_position);
        Self::release_all(ctx, stems);
        self.state = TransportState::Paused;
        tracing::info!(position = self.paused_position, "transport paused");
        Ok(())
    }

    pub fn stop(&mut self, ctx: &mut AudioContext, stems: &mut StemStore) -> Result<()> {
        self.ensure_loaded()?;
        Self::release_all(ctx, stems);
        self.paused_position = 0.0;
        self.state = TransportState::Stopped;
        tracing::info!("transport stopped");
        Ok(())
    }

    /// Moves to `target` seconds (clamped). Playback continues from there if
    /// it was running; otherwise only the resume position changes.
    pub fn seek(&mut self, ctx: &mut AudioContext, stems: &mut StemStore, target: f64) -> Result<f64> {
        self.ensure_loaded()?;
        let target = if target.is_nan() {
            0.0
        } else {
            target.clamp(0.0, self.duration)
        };

        Self::release_all(ctx, stems);
        self.paused_position = target;
        if self.is_playing() {
            self.start_all(ctx, stems)?;
        }
        tracing::debug!(position = target, "transport seek");
        Ok(target)
    }

    /// Applies ended notifications from the audio context. Only the current
    /// handle of a stem counts. Returns `true` if playback reached its
    /// natural end and the transport stopped.
    pub fn handle_ended(
        &mut self,
        ctx: &mut AudioContext,
        stems: &mut StemStore,
        ended: &[crate::audio::VoiceId],
    ) -> bool {
        for voice in ended {
            for stem in stems.iter_mut() {
                if stem.mark_ended(*voice) {
                    break;
                }
            }
        }

        if self.is_playing() && stems.iter().all(|stem| stem.playback_finished()) {
            Self::release_all(ctx, stems);
            self.paused_position = 0.0;
            self.state = TransportState::Stopped;
            tracing::info!("playback reached the end");
            return true;
        }
        false
    }
}
