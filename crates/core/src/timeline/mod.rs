use serde::{Deserialize, Serialize};

use crate::midi::{EventStream, NoteKind, TempoChange};

/// Note event placed on the song timeline and tagged with its stem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedEvent {
    pub tick: u64,
    pub time_seconds: f64,
    #[serde(rename = "type")]
    pub kind: NoteKind,
    pub note: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<u8>,
    pub channel: u8,
    pub stem_id: String,
}

/// Converts ticks to seconds for one event stream.
///
/// Without tempo changes this is `tick * 60 / (bpm * ticks_per_beat)`.
#[derive(Debug, Clone)]
pub struct TempoMap {
    ticks_per_beat: f64,
    /// `(start tick, seconds at start tick, seconds per tick)` segments.
    segments: Vec<(u64, f64, f64)>,
}

impl TempoMap {
    pub fn uniform(bpm: f64, ticks_per_beat: u16) -> Self {
        Self::with_changes(bpm, ticks_per_beat, &[])
    }

    /// Starts at `bpm` and switches tempo at each change's tick.
    pub fn with_changes(bpm: f64, ticks_per_beat: u16, changes: &[TempoChange]) -> Self {
        let ticks_per_beat = f64::from(ticks_per_beat.max(1));
        let seconds_per_tick = |bpm: f64| 60.0 / (bpm * ticks_per_beat);

        let mut sorted = changes.to_vec();
        sorted.sort_by_key(|change| change.tick);

        let mut segments = vec![(0, 0.0, seconds_per_tick(bpm))];
        for change in sorted {
            let (start, seconds, rate) = segments[segments.len() - 1];
            let at = seconds + (change.tick - start) as f64 * rate;
            let next = (change.tick, at, seconds_per_tick(change.bpm()));
            if change.tick == start {
                let last = segments.len() - 1;
                segments[last] = next;
            } else {
                segments.push(next);
            }
        }

        Self {
            ticks_per_beat,
            segments,
        }
    }

    pub fn ticks_per_beat(&self) -> f64 {
        self.ticks_per_beat
    }

    pub fn seconds_at(&self, tick: u64) -> f64 {
        let index = self
            .segments
            .partition_point(|(start, _, _)| *start <= tick)
            .saturating_sub(1);
        let (start, seconds, rate) = self.segments[index];
        seconds + (tick - start) as f64 * rate
    }
}

/// Places a decoded stream on the timeline, sorted by time.
pub fn timed_events(stream: &EventStream, stem_id: &str, tempo: &TempoMap) -> Vec<TimedEvent> {
    let mut events: Vec<TimedEvent> = stream
        .events
        .iter()
        .map(|raw| TimedEvent {
            tick: raw.tick,
            time_seconds: tempo.seconds_at(raw.tick),
            kind: raw.kind,
            note: raw.note,
            velocity: raw.velocity,
            channel: raw.channel,
            stem_id: stem_id.to_string(),
        })
        .collect();
    sort_by_time(&mut events);
    events
}

fn sort_by_time(events: &mut [TimedEvent]) {
    // Stable, so same-time events keep their original order.
    events.sort_by(|a, b| a.time_seconds.total_cmp(&b.time_seconds));
}

/// Global, time-ordered view over every stem's events.
#[derive(Debug, Default, Clone)]
pub struct EventSchedule {
    events: Vec<TimedEvent>,
}

impl EventSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds from per-stem event lists, replacing the previous contents.
    pub fn rebuild<'a, I>(&mut self, per_stem: I)
    where
        I: IntoIterator<Item = &'a [TimedEvent]>,
    {
        self.events.clear();
        for events in per_stem {
            self.events.extend_from_slice(events);
        }
        sort_by_time(&mut self.events);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events with `since < time <= upto`, in order. Empty when `upto < since`.
    pub fn due_events(&self, since: f64, upto: f64) -> &[TimedEvent] {
        if upto < since {
            return &[];
        }
        let start = self.events.partition_point(|e| e.time_seconds <= since);
        let end = self.events.partition_point(|e| e.time_seconds <= upto);
        &self.events[start..end.max(start)]
    }
}
