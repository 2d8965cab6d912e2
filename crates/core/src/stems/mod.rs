//! Per-stem state and the mixing controls that act on it.

mod loader;

use std::{collections::BTreeMap, sync::Arc};

pub(crate) use loader::{load_all, LoadPlan, LoadedStem};

use crate::{
    analysis::{AnalyserState, StemAnalysis},
    assets::StemConfig,
    audio::{AudioBuffer, AudioContext, NodeId, PlaybackHandle, VoiceId},
    timeline::TimedEvent,
    Result, StemPlayerError,
};

/// One loaded stem: its decoded audio, graph node, playback slot and controls.
#[derive(Debug)]
pub struct Stem {
    id: String,
    config: StemConfig,
    buffer: Arc<AudioBuffer>,
    node: NodeId,
    playback: Option<PlaybackHandle>,
    volume: f32,
    muted: bool,
    analysis: StemAnalysis,
    analyser: AnalyserState,
    events: Vec<TimedEvent>,
}

impl Stem {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &StemConfig {
        &self.config
    }

    pub fn duration_seconds(&self) -> f64 {
        self.buffer.duration_seconds()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn analysis(&self) -> StemAnalysis {
        self.analysis
    }

    pub fn frequency_data(&self) -> &[f32] {
        self.analyser.frequency_data()
    }

    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn playback(&self) -> Option<&PlaybackHandle> {
        self.playback.as_ref()
    }

    /// Whether the current handle played through to the end.
    pub fn playback_finished(&self) -> bool {
        self.playback
            .as_ref()
            .map(PlaybackHandle::has_ended)
            .unwrap_or(false)
    }

    /// Replaces the playback slot with a fresh handle started at `when`.
    pub(crate) fn restart(&mut self, ctx: &mut AudioContext, when: f64, offset: f64) -> Result<()> {
        self.release(ctx);
        let mut handle = PlaybackHandle::new(ctx, self.node, self.buffer.clone());
        handle.start(ctx, when, offset)?;
        self.playback = Some(handle);
        Ok(())
    }

    /// Stops and discards the current handle, if any.
    pub(crate) fn release(&mut self, ctx: &mut AudioContext) {
        if let Some(mut handle) = self.playback.take() {
            handle.stop(ctx);
        }
    }

    /// Marks the handle ended if `voice` is still this stem's current handle.
    pub(crate) fn mark_ended(&mut self, voice: VoiceId) -> bool {
        match self.playback.as_mut() {
            Some(handle) if handle.id() == voice => {
                handle.mark_ended();
                true
            }
            _ => false,
        }
    }

    pub(crate) fn analyser_mut(&mut self) -> &mut AnalyserState {
        &mut self.analyser
    }

    pub(crate) fn set_analysis(&mut self, analysis: StemAnalysis) {
        self.analysis = analysis;
    }
}

/// Owns every loaded stem plus the master bus they feed.
#[derive(Debug)]
pub struct StemStore {
    stems: BTreeMap<String, Stem>,
    solo: Option<String>,
    master_bus: Option<NodeId>,
    master_gain: f32,
}

impl Default for StemStore {
    fn default() -> Self {
        Self {
            stems: BTreeMap::new(),
            solo: None,
            master_bus: None,
            master_gain: 1.0,
        }
    }
}

impl StemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_bus(&mut self, ctx: &mut AudioContext) -> NodeId {
        match self.master_bus {
            Some(bus) => bus,
            None => {
                let bus = ctx.create_bus(self.master_gain);
                self.master_bus = Some(bus);
                bus
            }
        }
    }

    /// Registers a decoded stem, creating its node under the master bus.
    pub(crate) fn insert(
        &mut self,
        ctx: &mut AudioContext,
        id: String,
        config: StemConfig,
        loaded: LoadedStem,
        tap_len: usize,
        analyser: AnalyserState,
    ) {
        let bus = self.ensure_bus(ctx);
        let node = ctx.create_stem_node(bus, tap_len);
        let stem = Stem {
            id: id.clone(),
            config,
            buffer: Arc::new(loaded.buffer),
            node,
            playback: None,
            volume: 1.0,
            muted: false,
            analysis: StemAnalysis::default(),
            analyser,
            events: loaded.events,
        };
        if let Some(mut previous) = self.stems.insert(id, stem) {
            previous.release(ctx);
            ctx.disconnect(previous.node);
        }
        self.apply_gains(ctx);
    }

    pub fn get(&self, id: &str) -> Option<&Stem> {
        self.stems.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Result<&mut Stem> {
        self.stems
            .get_mut(id)
            .ok_or_else(|| StemPlayerError::UnknownStem(id.to_string()))
    }

    pub fn ids(&self) -> Vec<String> {
        self.stems.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stem> {
        self.stems.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Stem> {
        self.stems.values_mut()
    }

    pub fn len(&self) -> usize {
        self.stems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stems.is_empty()
    }

    /// Longest stem duration, zero when nothing loaded.
    pub fn duration_seconds(&self) -> f64 {
        self.stems
            .values()
            .map(Stem::duration_seconds)
            .fold(0.0, f64::max)
    }

    pub fn soloed(&self) -> Option<&str> {
        self.solo.as_deref()
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    /// Gain actually applied to a stem's node.
    pub fn effective_gain(&self, stem: &Stem) -> f32 {
        match &self.solo {
            Some(solo) if *solo == stem.id => stem.volume,
            Some(_) => 0.0,
            None if stem.muted => 0.0,
            None => stem.volume,
        }
    }

    pub fn set_volume(&mut self, ctx: &mut AudioContext, id: &str, volume: f32) -> Result<()> {
        self.get_mut(id)?.volume = clamp_unit(volume);
        self.apply_gains(ctx);
        Ok(())
    }

    pub fn set_muted(&mut self, ctx: &mut AudioContext, id: &str, muted: bool) -> Result<()> {
        self.get_mut(id)?.muted = muted;
        self.apply_gains(ctx);
        Ok(())
    }

    pub fn solo(&mut self, ctx: &mut AudioContext, id: &str) -> Result<()> {
        if !self.stems.contains_key(id) {
            return Err(StemPlayerError::UnknownStem(id.to_string()));
        }
        self.solo = Some(id.to_string());
        self.apply_gains(ctx);
        Ok(())
    }

    pub fn unsolo_all(&mut self, ctx: &mut AudioContext) {
        self.solo = None;
        self.apply_gains(ctx);
    }

    pub fn set_master_gain(&mut self, ctx: &mut AudioContext, gain: f32) {
        self.master_gain = clamp_unit(gain);
        if let Some(bus) = self.master_bus {
            ctx.set_gain(bus, self.master_gain);
        }
    }

    fn apply_gains(&self, ctx: &mut AudioContext) {
        for stem in self.stems.values() {
            ctx.set_gain(stem.node, self.effective_gain(stem));
        }
    }

    /// Stops playback, releases every graph node and forgets all stems.
    pub fn clear(&mut self, ctx: &mut AudioContext) {
        for stem in self.stems.values_mut() {
            stem.release(ctx);
            ctx.disconnect(stem.node);
        }
        self.stems.clear();
        self.solo = None;
        if let Some(bus) = self.master_bus.take() {
            ctx.disconnect(bus);
        }
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
