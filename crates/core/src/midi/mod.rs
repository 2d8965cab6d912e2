//! Decoder for standard chunked event-track files.
//!
//! Only note on/off events are surfaced; everything else is walked over by
//! `midly`. Tempo meta-events are kept on the side so the timeline can
//! optionally honour them.

use midly::{Format, MetaMessage, MidiMessage, Timing, TrackEventKind};
use serde::{Deserialize, Serialize};

use crate::{Result, StemPlayerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NoteKind {
    NoteOn,
    NoteOff,
}

/// Note event positioned in ticks from the start of its track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub tick: u64,
    pub kind: NoteKind,
    pub note: u8,
    /// Present for note-on only.
    pub velocity: Option<u8>,
    pub channel: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TempoChange {
    pub tick: u64,
    pub micros_per_quarter: u32,
}

impl TempoChange {
    pub fn bpm(&self) -> f64 {
        60_000_000.0 / f64::from(self.micros_per_quarter.max(1))
    }
}

/// Everything [`decode`] extracts from one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventStream {
    pub format: u16,
    pub ticks_per_beat: u16,
    /// Track events concatenated in track order; ticks are monotonic per track.
    pub events: Vec<RawEvent>,
    pub tempo_changes: Vec<TempoChange>,
}

/// Decodes an event-track file.
///
/// Fails with [`StemPlayerError::MalformedInput`] when the header is missing or
/// unusable and with [`StemPlayerError::UnsupportedFormat`] for SMPTE
/// divisions. Truncated or short track chunks end decoding early and return
/// whatever was decoded up to that point.
pub fn decode(bytes: &[u8]) -> Result<EventStream> {
    let (header, tracks) = midly::parse(bytes).map_err(|err| {
        tracing::debug!(error = %err, "unreadable event-track header");
        StemPlayerError::MalformedInput("missing or invalid MThd header")
    })?;

    let ticks_per_beat = match header.timing {
        Timing::Metrical(tpb) => tpb.as_int(),
        Timing::Timecode(..) => {
            return Err(StemPlayerError::UnsupportedFormat("SMPTE time division"))
        }
    };
    if ticks_per_beat == 0 {
        return Err(StemPlayerError::MalformedInput("zero ticks per beat"));
    }

    let mut stream = EventStream {
        format: match header.format {
            Format::SingleTrack => 0,
            Format::Parallel => 1,
            Format::Sequential => 2,
        },
        ticks_per_beat,
        ..Default::default()
    };

    for (index, track) in tracks.enumerate() {
        match track {
            Ok(events) => decode_track(events, &mut stream),
            Err(err) => {
                tracing::debug!(track = index, error = %err, "unreadable track chunk, stopping");
                break;
            }
        }
    }

    Ok(stream)
}

fn decode_track(events: midly::EventIter<'_>, stream: &mut EventStream) {
    let mut tick: u64 = 0;

    for event in events {
        let Ok(event) = event else { break };
        tick += u64::from(event.delta.as_int());

        match event.kind {
            TrackEventKind::Midi { channel, message } => {
                let channel = channel.as_int();
                match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        stream.events.push(RawEvent {
                            tick,
                            kind: NoteKind::NoteOn,
                            note: key.as_int(),
                            velocity: Some(vel.as_int()),
                            channel,
                        })
                    }
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        stream.events.push(RawEvent {
                            tick,
                            kind: NoteKind::NoteOff,
                            note: key.as_int(),
                            velocity: None,
                            channel,
                        })
                    }
                    _ => {}
                }
            }
            TrackEventKind::Meta(MetaMessage::Tempo(micros)) => {
                stream.tempo_changes.push(TempoChange {
                    tick,
                    micros_per_quarter: micros.as_int(),
                });
            }
            TrackEventKind::Meta(MetaMessage::EndOfTrack) => break,
            _ => {}
        }
    }
}
