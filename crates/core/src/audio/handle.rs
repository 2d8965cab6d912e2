use std::sync::Arc;

use super::{AudioBuffer, AudioContext, NodeId, VoiceId};
use crate::{Result, StemPlayerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Idle,
    Started,
    Stopped,
}

/// One start-once rendering of a stem's buffer.
///
/// A handle is never restarted: callers stop it and create a fresh one.
#[derive(Debug)]
pub struct PlaybackHandle {
    id: VoiceId,
    node: NodeId,
    buffer: Arc<AudioBuffer>,
    state: HandleState,
    ended: bool,
}

impl PlaybackHandle {
    pub fn new(ctx: &mut AudioContext, node: NodeId, buffer: Arc<AudioBuffer>) -> Self {
        Self {
            id: ctx.allocate_voice(),
            node,
            buffer,
            state: HandleState::Idle,
            ended: false,
        }
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    /// Whether the handle played through to the end of its buffer.
    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Begins playback at context time `when`, `offset` seconds into the buffer.
    pub fn start(&mut self, ctx: &mut AudioContext, when: f64, offset: f64) -> Result<()> {
        if self.state != HandleState::Idle {
            return Err(StemPlayerError::HandleReused);
        }
        ctx.schedule_voice(self.id, self.node, self.buffer.clone(), when, offset);
        self.state = HandleState::Started;
        Ok(())
    }

    /// Stops playback. Stopping an idle or stopped handle is a no-op.
    pub fn stop(&mut self, ctx: &mut AudioContext) {
        if self.state == HandleState::Started {
            ctx.cancel_voice(self.id);
        }
        self.state = HandleState::Stopped;
    }

    pub(crate) fn mark_ended(&mut self) {
        self.state = HandleState::Stopped;
        self.ended = true;
    }
}
