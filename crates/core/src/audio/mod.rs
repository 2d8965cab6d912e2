//! Software mixing context shared between the player and the output device.
//!
//! The context's clock only advances as frames are rendered, which makes it
//! the single time source for transport arithmetic.

mod buffer;
mod handle;

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

pub use buffer::AudioBuffer;
pub use handle::{HandleState, PlaybackHandle};

#[cfg(test)]
pub(crate) use buffer::fixtures;

use crate::{Result, StemPlayerError};

/// Output is always interleaved stereo.
pub const OUTPUT_CHANNELS: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Running,
    /// Renders silence and holds the clock.
    Suspended,
}

#[derive(Debug)]
struct Bus {
    gain: f32,
}

/// Per-stem gain stage with an analysis tap placed before the gain.
#[derive(Debug)]
struct StemNode {
    bus: NodeId,
    gain: f32,
    tap: VecDeque<f32>,
    tap_len: usize,
    scratch: Vec<f32>,
}

#[derive(Debug)]
struct Voice {
    node: NodeId,
    buffer: Arc<AudioBuffer>,
    start_frame: u64,
    cursor: usize,
}

impl Voice {
    /// Adds this voice into `scratch`; returns `true` once the buffer is exhausted.
    fn mix_into(&mut self, scratch: &mut [f32], block_start: u64) -> bool {
        let frames = scratch.len() / 2;
        let offset = self.start_frame.saturating_sub(block_start);
        if offset >= frames as u64 {
            return false;
        }

        for i in offset as usize..frames {
            match self.buffer.frame(self.cursor) {
                Some((left, right)) => {
                    scratch[i * 2] += left;
                    scratch[i * 2 + 1] += right;
                    self.cursor += 1;
                }
                None => return true,
            }
        }
        self.cursor >= self.buffer.frames()
    }
}

/// Mixing graph: buses, stem nodes feeding them, and scheduled voices.
pub struct AudioContext {
    sample_rate: u32,
    state: ContextState,
    frames_rendered: u64,
    next_id: u64,
    buses: HashMap<NodeId, Bus>,
    nodes: HashMap<NodeId, StemNode>,
    voices: HashMap<VoiceId, Voice>,
    ended: Vec<VoiceId>,
}

impl AudioContext {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            state: ContextState::Running,
            frames_rendered: 0,
            next_id: 1,
            buses: HashMap::new(),
            nodes: HashMap::new(),
            voices: HashMap::new(),
            ended: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn resume(&mut self) {
        self.state = ContextState::Running;
    }

    pub fn suspend(&mut self) {
        self.state = ContextState::Suspended;
    }

    /// Seconds of audio rendered so far.
    pub fn current_time(&self) -> f64 {
        self.frames_rendered as f64 / f64::from(self.sample_rate)
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn create_bus(&mut self, gain: f32) -> NodeId {
        let id = NodeId(self.next_id());
        self.buses.insert(id, Bus { gain });
        id
    }

    /// Creates a stem node routed into `bus`, keeping the last `tap_len`
    /// pre-gain mono samples for analysis.
    pub fn create_stem_node(&mut self, bus: NodeId, tap_len: usize) -> NodeId {
        let id = NodeId(self.next_id());
        self.nodes.insert(
            id,
            StemNode {
                bus,
                gain: 1.0,
                tap: VecDeque::with_capacity(tap_len),
                tap_len,
                scratch: Vec::new(),
            },
        );
        id
    }

    /// Sets the gain of a bus or stem node. Unknown ids are ignored.
    pub fn set_gain(&mut self, node: NodeId, gain: f32) {
        if let Some(bus) = self.buses.get_mut(&node) {
            bus.gain = gain;
        } else if let Some(stem) = self.nodes.get_mut(&node) {
            stem.gain = gain;
        }
    }

    pub fn gain(&self, node: NodeId) -> Option<f32> {
        self.buses
            .get(&node)
            .map(|bus| bus.gain)
            .or_else(|| self.nodes.get(&node).map(|stem| stem.gain))
    }

    /// Removes a node along with any voice still feeding it.
    pub fn disconnect(&mut self, node: NodeId) {
        self.buses.remove(&node);
        if self.nodes.remove(&node).is_some() {
            self.voices.retain(|_, voice| voice.node != node);
        }
    }

    /// Copies the node's analysis window, oldest first, zero-padded at the front.
    pub fn read_tap(&self, node: NodeId, out: &mut Vec<f32>) -> bool {
        let Some(stem) = self.nodes.get(&node) else {
            return false;
        };
        out.clear();
        out.resize(stem.tap_len - stem.tap.len(), 0.0);
        out.extend(stem.tap.iter().copied());
        true
    }

    pub(crate) fn allocate_voice(&mut self) -> VoiceId {
        VoiceId(self.next_id())
    }

    /// Schedules `buffer` on `node` at context time `when`, reading from `offset` seconds.
    pub(crate) fn schedule_voice(
        &mut self,
        id: VoiceId,
        node: NodeId,
        buffer: Arc<AudioBuffer>,
        when: f64,
        offset: f64,
    ) {
        let start_frame = (when.max(0.0) * f64::from(self.sample_rate)).round() as u64;
        let cursor = (offset.max(0.0) * f64::from(buffer.sample_rate())).round() as usize;
        self.voices.insert(
            id,
            Voice {
                node,
                buffer,
                start_frame,
                cursor,
            },
        );
    }

    /// Removes a voice without producing an ended notification.
    pub(crate) fn cancel_voice(&mut self, id: VoiceId) -> bool {
        self.voices.remove(&id).is_some()
    }

    pub fn is_voice_active(&self, id: VoiceId) -> bool {
        self.voices.contains_key(&id)
    }

    /// Drains ids of voices that played to the end of their buffer.
    pub fn take_ended(&mut self) -> Vec<VoiceId> {
        std::mem::take(&mut self.ended)
    }

    pub fn node_count(&self) -> usize {
        self.buses.len() + self.nodes.len()
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Renders interleaved stereo into `out`, advancing the clock while running.
    pub fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let frames = out.len() / usize::from(OUTPUT_CHANNELS);
        if self.state == ContextState::Suspended || frames == 0 {
            return;
        }

        for node in self.nodes.values_mut() {
            node.scratch.clear();
            node.scratch.resize(frames * 2, 0.0);
        }

        let block_start = self.frames_rendered;
        let nodes = &mut self.nodes;
        let ended = &mut self.ended;
        self.voices.retain(|id, voice| {
            let Some(node) = nodes.get_mut(&voice.node) else {
                return false;
            };
            let finished = voice.mix_into(&mut node.scratch, block_start);
            if finished {
                ended.push(*id);
            }
            !finished
        });

        for node in nodes.values_mut() {
            for frame in node.scratch.chunks_exact(2) {
                if node.tap.len() == node.tap_len {
                    node.tap.pop_front();
                }
                if node.tap_len > 0 {
                    node.tap.push_back((frame[0] + frame[1]) * 0.5);
                }
            }

            let Some(bus) = self.buses.get(&node.bus) else {
                continue;
            };
            let gain = node.gain * bus.gain;
            for (sample, mixed) in out.iter_mut().zip(&node.scratch) {
                *sample += mixed * gain;
            }
        }

        self.frames_rendered += frames as u64;
    }
}

impl fmt::Debug for AudioContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioContext")
            .field("sample_rate", &self.sample_rate)
            .field("state", &self.state)
            .field("frames_rendered", &self.frames_rendered)
            .field("buses", &self.buses.len())
            .field("nodes", &self.nodes.len())
            .field("voices", &self.voices.len())
            .finish()
    }
}

/// Thread-safe handle to an [`AudioContext`], shared with the output device.
#[derive(Clone)]
pub struct SharedContext {
    inner: Arc<Mutex<AudioContext>>,
}

impl SharedContext {
    pub fn new(context: AudioContext) -> Self {
        Self {
            inner: Arc::new(Mutex::new(context)),
        }
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, AudioContext>> {
        self.inner
            .lock()
            .map_err(|_| StemPlayerError::msg("audio context has been poisoned"))
    }
}

impl fmt::Debug for SharedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedContext").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_buffer(sample_rate: u32, frames: usize, value: f32) -> Arc<AudioBuffer> {
        Arc::new(AudioBuffer::from_stereo(sample_rate, vec![value; frames * 2]))
    }

    #[test]
    fn clock_advances_only_while_running() {
        let mut ctx = AudioContext::new(100);
        let mut block = [0.0f32; 20];

        ctx.render(&mut block);
        assert!((ctx.current_time() - 0.1).abs() < 1e-12);

        ctx.suspend();
        ctx.render(&mut block);
        assert!((ctx.current_time() - 0.1).abs() < 1e-12);

        ctx.resume();
        ctx.render(&mut block);
        assert!((ctx.current_time() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn voice_starts_at_scheduled_frame_and_applies_gains() {
        let mut ctx = AudioContext::new(100);
        let bus = ctx.create_bus(0.5);
        let node = ctx.create_stem_node(bus, 8);
        ctx.set_gain(node, 0.5);

        let voice = ctx.allocate_voice();
        ctx.schedule_voice(voice, node, constant_buffer(100, 100, 1.0), 0.05, 0.0);

        let mut block = [0.0f32; 20];
        ctx.render(&mut block);
        assert!(block[..10].iter().all(|s| *s == 0.0));
        assert!(block[10..].iter().all(|s| (*s - 0.25).abs() < 1e-6));

        let mut tap = Vec::new();
        assert!(ctx.read_tap(node, &mut tap));
        assert_eq!(tap.len(), 8);
        // Pre-gain: the tap sees the raw buffer, not the attenuated mix.
        assert!(tap[..3].iter().all(|s| *s == 0.0));
        assert!(tap[3..].iter().all(|s| (*s - 1.0).abs() < 1e-6));
    }

    #[test]
    fn exhausted_voice_reports_ended_once() {
        let mut ctx = AudioContext::new(100);
        let bus = ctx.create_bus(1.0);
        let node = ctx.create_stem_node(bus, 4);
        let voice = ctx.allocate_voice();
        ctx.schedule_voice(voice, node, constant_buffer(100, 5, 1.0), 0.0, 0.0);

        let mut block = [0.0f32; 20];
        ctx.render(&mut block);
        assert_eq!(ctx.take_ended(), vec![voice]);
        assert!(!ctx.is_voice_active(voice));
        assert!(ctx.take_ended().is_empty());
    }

    #[test]
    fn cancelled_voice_is_silent_and_not_reported() {
        let mut ctx = AudioContext::new(100);
        let bus = ctx.create_bus(1.0);
        let node = ctx.create_stem_node(bus, 4);
        let voice = ctx.allocate_voice();
        ctx.schedule_voice(voice, node, constant_buffer(100, 5, 1.0), 0.0, 0.0);

        assert!(ctx.cancel_voice(voice));
        assert!(!ctx.cancel_voice(voice));

        let mut block = [0.0f32; 20];
        ctx.render(&mut block);
        assert!(block.iter().all(|s| *s == 0.0));
        assert!(ctx.take_ended().is_empty());
    }

    #[test]
    fn disconnect_releases_nodes_and_voices() {
        let mut ctx = AudioContext::new(100);
        let bus = ctx.create_bus(1.0);
        let node = ctx.create_stem_node(bus, 4);
        let voice = ctx.allocate_voice();
        ctx.schedule_voice(voice, node, constant_buffer(100, 50, 1.0), 0.0, 0.0);

        ctx.disconnect(node);
        ctx.disconnect(bus);

        assert_eq!(ctx.node_count(), 0);
        assert_eq!(ctx.voice_count(), 0);
    }
}
