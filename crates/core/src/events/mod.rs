//! Typed notification fan-out for renderers and UIs.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{analysis::StemAnalysis, assets::Manifest, timeline::TimedEvent};

/// Closed set of notification kinds listeners can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    Progress,
    Loaded,
    Error,
    StemAnalysis,
    MidiNote,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum Notification {
    /// A stem settled (successfully or not); arrives in completion order.
    #[serde(rename_all = "camelCase")]
    Progress {
        loaded: usize,
        total: usize,
        stem_id: String,
    },
    Loaded { manifest: Manifest },
    #[serde(rename_all = "camelCase")]
    Error {
        stem_id: Option<String>,
        cause: String,
    },
    StemAnalysis(BTreeMap<String, StemAnalysis>),
    MidiNote(TimedEvent),
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Notification::Progress { .. } => NotificationKind::Progress,
            Notification::Loaded { .. } => NotificationKind::Loaded,
            Notification::Error { .. } => NotificationKind::Error,
            Notification::StemAnalysis(_) => NotificationKind::StemAnalysis,
            Notification::MidiNote(_) => NotificationKind::MidiNote,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&Notification)>;

/// Listener registry keyed by [`NotificationKind`]. Single-threaded by design:
/// listeners run synchronously inside [`Emitter::emit`].
#[derive(Default)]
pub struct Emitter {
    next_id: u64,
    listeners: Vec<(ListenerId, NotificationKind, Listener)>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, kind: NotificationKind, listener: F) -> ListenerId
    where
        F: FnMut(&Notification) + 'static,
    {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners.push((id, kind, Box::new(listener)));
        id
    }

    /// Removes a listener; returns whether it was registered.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener, _, _)| *listener != id);
        before != self.listeners.len()
    }

    pub fn emit(&mut self, notification: &Notification) {
        let kind = notification.kind();
        for (_, listening, listener) in self.listeners.iter_mut() {
            if *listening == kind {
                listener(notification);
            }
        }
    }

    pub fn listener_count(&self, kind: NotificationKind) -> usize {
        self.listeners.iter().filter(|(_, k, _)| *k == kind).count()
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
