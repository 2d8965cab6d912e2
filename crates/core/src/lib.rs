//! Core library for the stem player.
//!
//! A song arrives as a manifest listing isolated stems (audio plus an
//! optional event track). The crate decodes them, mixes them through a
//! software audio context whose frame clock drives one shared transport,
//! and reports per-stem band energies and due note events to whoever is
//! rendering. [`StemPlayer`] is the entry point; the other modules are the
//! pieces it is assembled from.

pub mod analysis;
pub mod assets;
pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod midi;
pub mod player;
pub mod stems;
pub mod timeline;
pub mod transport;

pub use analysis::{summarize_bins, FrequencyAnalyzer, StemAnalysis};
pub use assets::{FsResolver, Manifest, MemoryResolver, ResourceResolver, StemConfig};
pub use audio::{AudioBuffer, AudioContext, ContextState, PlaybackHandle, SharedContext};
pub use config::{AudioConfig, PlayerConfig, ScheduleConfig};
pub use error::{Result, StemPlayerError};
pub use events::{ListenerId, Notification, NotificationKind};
pub use midi::{EventStream, NoteKind, RawEvent};
pub use player::StemPlayer;
pub use stems::{Stem, StemStore};
pub use timeline::{EventSchedule, TempoMap, TimedEvent};
pub use transport::{Transport, TransportState};
