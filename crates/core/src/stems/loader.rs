use std::{collections::BTreeMap, sync::mpsc};

use crate::{
    assets::{resolve_relative, ResourceResolver, StemConfig},
    audio::AudioBuffer,
    midi,
    timeline::{timed_events, TempoMap, TimedEvent},
    Result, StemPlayerError,
};

/// Everything a stem load needs, shared read-only across worker threads.
pub(crate) struct LoadPlan<'a> {
    pub resolver: &'a dyn ResourceResolver,
    pub manifest_path: &'a str,
    pub sample_rate: u32,
    pub bpm: f64,
    pub apply_tempo_events: bool,
}

#[derive(Debug)]
pub(crate) struct LoadedStem {
    pub buffer: AudioBuffer,
    pub events: Vec<TimedEvent>,
}

/// Outcome of one stem load, delivered in completion order.
#[derive(Debug)]
pub(crate) struct StemLoad {
    pub id: String,
    pub config: StemConfig,
    pub outcome: Result<LoadedStem>,
}

/// Loads every stem concurrently on the rayon pool and hands each settled
/// result to `on_settled` on the calling thread as soon as it arrives.
pub(crate) fn load_all<F>(plan: &LoadPlan<'_>, stems: &BTreeMap<String, StemConfig>, mut on_settled: F)
where
    F: FnMut(StemLoad),
{
    let (tx, rx) = mpsc::channel();
    rayon::in_place_scope(|scope| {
        for (id, config) in stems {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let outcome = load_stem(plan, id, config);
                let _ = tx.send(StemLoad {
                    id: id.clone(),
                    config: config.clone(),
                    outcome,
                });
            });
        }
        drop(tx);

        for settled in rx {
            on_settled(settled);
        }
    });
}

fn load_stem(plan: &LoadPlan<'_>, id: &str, config: &StemConfig) -> Result<LoadedStem> {
    let audio_path = resolve_relative(plan.manifest_path, &config.audio);
    let bytes = plan.resolver.fetch(&audio_path).map_err(|err| match err {
        err @ StemPlayerError::ResourceFetch { .. } => err,
        other => StemPlayerError::fetch(&audio_path, other),
    })?;
    let buffer = AudioBuffer::decode_wav(&bytes, plan.sample_rate)
        .map_err(|err| StemPlayerError::fetch(&audio_path, err))?;

    let events = match &config.midi {
        Some(midi) => load_events(plan, id, midi),
        None => Vec::new(),
    };

    tracing::debug!(
        stem = id,
        duration = buffer.duration_seconds(),
        events = events.len(),
        "stem decoded"
    );
    Ok(LoadedStem { buffer, events })
}

/// Best effort: any failure leaves the stem without note events.
fn load_events(plan: &LoadPlan<'_>, id: &str, midi_path: &str) -> Vec<TimedEvent> {
    let path = resolve_relative(plan.manifest_path, midi_path);
    let stream = plan
        .resolver
        .fetch(&path)
        .and_then(|bytes| midi::decode(&bytes));

    match stream {
        Ok(stream) => {
            let tempo = if plan.apply_tempo_events {
                TempoMap::with_changes(plan.bpm, stream.ticks_per_beat, &stream.tempo_changes)
            } else {
                TempoMap::uniform(plan.bpm, stream.ticks_per_beat)
            };
            timed_events(&stream, id, &tempo)
        }
        Err(err) => {
            tracing::warn!(stem = id, resource = %path, error = %err, "event track unavailable, continuing without note events");
            Vec::new()
        }
    }
}
