//! `StemPlayer` ties the stem store, transport, analyser and event schedule
//! together behind the operations a renderer or UI drives.
//!
//! Every call runs on the caller's thread. Only stem loading fans out to the
//! rayon pool, and its results are folded back in here as they settle.

use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::{
    analysis::{summarize_bins, FrequencyAnalyzer, StemAnalysis},
    assets::{resolve_relative, Manifest, ResourceResolver, StemConfig},
    audio::SharedContext,
    config::PlayerConfig,
    events::{Emitter, ListenerId, Notification, NotificationKind},
    stems::{load_all, LoadPlan, Stem, StemStore},
    timeline::EventSchedule,
    transport::{Transport, TransportState},
    Result, StemPlayerError,
};

pub struct StemPlayer {
    ctx: SharedContext,
    config: PlayerConfig,
    resolver: Arc<dyn ResourceResolver>,
    stems: StemStore,
    transport: Transport,
    schedule: EventSchedule,
    analyzer: FrequencyAnalyzer,
    emitter: Emitter,
    manifest: Option<Manifest>,
    manifest_path: Option<String>,
    loaded: bool,
    last_checked_position: f64,
    /// Upper bound of the last emitted event window; `None` means nothing
    /// has been emitted since the last stop, seek to zero or load.
    emitted_through: Option<f64>,
    tap: Vec<f32>,
}

impl StemPlayer {
    pub fn new(ctx: SharedContext, resolver: Arc<dyn ResourceResolver>, config: PlayerConfig) -> Self {
        let analyzer = FrequencyAnalyzer::new(&config.audio);
        let transport = Transport::new(config.schedule.start_lookahead);
        Self {
            ctx,
            config,
            resolver,
            stems: StemStore::new(),
            transport,
            schedule: EventSchedule::new(),
            analyzer,
            emitter: Emitter::new(),
            manifest: None,
            manifest_path: None,
            loaded: false,
            last_checked_position: 0.0,
            emitted_through: None,
            tap: Vec::new(),
        }
    }

    pub fn context(&self) -> &SharedContext {
        &self.ctx
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn on<F>(&mut self, kind: NotificationKind, listener: F) -> ListenerId
    where
        F: FnMut(&Notification) + 'static,
    {
        self.emitter.on(kind, listener)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.emitter.off(id)
    }

    /// Loads a manifest and every stem it lists.
    ///
    /// Stems load concurrently and report `Progress` as each one settles.
    /// A stem whose audio cannot be fetched or decoded is reported through
    /// `Error` and left out; the load itself still completes. Only a manifest
    /// failure makes this return `Err`.
    pub fn load(&mut self, manifest_path: &str) -> Result<Manifest> {
        self.reset_session()?;
        tracing::info!(manifest = manifest_path, "loading manifest");

        let manifest = match self
            .resolver
            .fetch(manifest_path)
            .and_then(|bytes| Manifest::from_bytes(&bytes))
        {
            Ok(manifest) => manifest,
            Err(err) => {
                let err = StemPlayerError::ManifestFetch {
                    resource: manifest_path.to_string(),
                    reason: err.to_string(),
                };
                tracing::error!(manifest = manifest_path, error = %err, "manifest unavailable");
                self.emitter.emit(&Notification::Error {
                    stem_id: None,
                    cause: err.to_string(),
                });
                return Err(err);
            }
        };

        let sample_rate = self.ctx.lock()?.sample_rate();
        let plan = LoadPlan {
            resolver: self.resolver.as_ref(),
            manifest_path,
            sample_rate,
            bpm: manifest.bpm_or(self.config.schedule.default_bpm),
            apply_tempo_events: self.config.schedule.apply_tempo_events,
        };

        let total = manifest.stems.len();
        let tap_len = self.analyzer.fft_size();
        let ctx = &self.ctx;
        let stems = &mut self.stems;
        let emitter = &mut self.emitter;
        let analyzer = &self.analyzer;
        let mut settled = 0;
        let mut lock_failure = None;

        load_all(&plan, &manifest.stems, |load| {
            settled += 1;
            match load.outcome {
                Ok(loaded) => match ctx.lock() {
                    Ok(mut guard) => stems.insert(
                        &mut guard,
                        load.id.clone(),
                        load.config,
                        loaded,
                        tap_len,
                        analyzer.new_state(),
                    ),
                    Err(err) => {
                        lock_failure.get_or_insert(err);
                    }
                },
                Err(err) => {
                    tracing::warn!(stem = %load.id, error = %err, "stem excluded from playback");
                    emitter.emit(&Notification::Error {
                        stem_id: Some(load.id.clone()),
                        cause: err.to_string(),
                    });
                }
            }
            emitter.emit(&Notification::Progress {
                loaded: settled,
                total,
                stem_id: load.id,
            });
        });
        if let Some(err) = lock_failure {
            return Err(err);
        }

        self.schedule.rebuild(self.stems.iter().map(Stem::events));
        tracing::debug!(events = self.schedule.len(), "event schedule rebuilt");

        self.transport.mark_loaded(self.stems.duration_seconds());
        self.manifest = Some(manifest.clone());
        self.manifest_path = Some(manifest_path.to_string());
        self.loaded = true;
        tracing::info!(
            stems = self.stems.len(),
            requested = total,
            duration = self.transport.duration(),
            "load complete"
        );
        self.emitter.emit(&Notification::Loaded {
            manifest: manifest.clone(),
        });
        Ok(manifest)
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.loaded {
            Ok(())
        } else {
            Err(StemPlayerError::NotLoaded)
        }
    }

    fn reset_window(&mut self, position: f64) {
        self.last_checked_position = position;
        self.emitted_through = if position > 0.0 { Some(position) } else { None };
    }

    pub fn play(&mut self) -> Result<()> {
        self.ensure_loaded()?;
        let mut ctx = self.ctx.lock()?;
        self.transport.play(&mut ctx, &mut self.stems)?;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.ensure_loaded()?;
        let mut ctx = self.ctx.lock()?;
        self.transport.pause(&mut ctx, &mut self.stems)?;
        self.last_checked_position = self.transport.position(ctx.current_time());
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.ensure_loaded()?;
        {
            let mut ctx = self.ctx.lock()?;
            self.transport.stop(&mut ctx, &mut self.stems)?;
        }
        self.reset_window(0.0);
        Ok(())
    }

    /// Jumps to `seconds`, clamped to the song. Events at the target itself
    /// are not fired again unless the target is zero.
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        self.ensure_loaded()?;
        let position = {
            let mut ctx = self.ctx.lock()?;
            self.transport.seek(&mut ctx, &mut self.stems, seconds)?
        };
        self.reset_window(position);
        Ok(())
    }

    pub fn set_stem_volume(&mut self, id: &str, volume: f32) -> Result<()> {
        self.ensure_loaded()?;
        let mut ctx = self.ctx.lock()?;
        self.stems.set_volume(&mut ctx, id, volume)
    }

    pub fn mute_stem(&mut self, id: &str, muted: bool) -> Result<()> {
        self.ensure_loaded()?;
        let mut ctx = self.ctx.lock()?;
        self.stems.set_muted(&mut ctx, id, muted)
    }

    pub fn solo_stem(&mut self, id: &str) -> Result<()> {
        self.ensure_loaded()?;
        let mut ctx = self.ctx.lock()?;
        self.stems.solo(&mut ctx, id)
    }

    pub fn unsolo_all(&mut self) -> Result<()> {
        self.ensure_loaded()?;
        let mut ctx = self.ctx.lock()?;
        self.stems.unsolo_all(&mut ctx);
        Ok(())
    }

    /// Master volume is kept across loads and may be set before the first one.
    pub fn set_master_volume(&mut self, volume: f32) -> Result<()> {
        let mut ctx = self.ctx.lock()?;
        self.stems.set_master_gain(&mut ctx, volume);
        Ok(())
    }

    pub fn master_volume(&self) -> f32 {
        self.stems.master_gain()
    }

    /// Song position in seconds.
    pub fn current_time(&self) -> Result<f64> {
        let now = self.ctx.lock()?.current_time();
        Ok(self.transport.position(now))
    }

    pub fn duration(&self) -> f64 {
        self.transport.duration()
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn stem_ids(&self) -> Vec<String> {
        self.stems.ids()
    }

    pub fn stem(&self, id: &str) -> Option<&Stem> {
        self.stems.get(id)
    }

    pub fn stem_analysis(&self, id: &str) -> Option<StemAnalysis> {
        self.stems.get(id).map(Stem::analysis)
    }

    pub fn stem_config(&self, id: &str) -> Option<&StemConfig> {
        self.stems.get(id).map(Stem::config)
    }

    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    /// Lyrics resource resolved against the manifest location.
    pub fn lyrics_path(&self) -> Option<String> {
        let manifest_path = self.manifest_path.as_deref()?;
        let lyrics = self.manifest.as_ref()?.lyrics.as_deref()?;
        Some(resolve_relative(manifest_path, lyrics))
    }

    pub fn schedule(&self) -> &EventSchedule {
        &self.schedule
    }

    /// Per-frame poll: settles finished playback, refreshes every stem's
    /// analysis and fires note events that fall due.
    ///
    /// Emits one `StemAnalysis` notification per call once loaded.
    pub fn analyze(&mut self) -> Result<BTreeMap<String, StemAnalysis>> {
        if !self.loaded {
            return Ok(BTreeMap::new());
        }

        let mut ctx = self.ctx.lock()?;
        let ended = ctx.take_ended();
        if self.transport.handle_ended(&mut ctx, &mut self.stems, &ended) {
            self.last_checked_position = 0.0;
            self.emitted_through = None;
        }

        let playing = self.transport.is_playing();
        let mut frame = BTreeMap::new();
        for stem in self.stems.iter_mut() {
            if playing && ctx.read_tap(stem.node(), &mut self.tap) {
                self.analyzer.process(&self.tap, stem.analyser_mut())?;
            } else {
                stem.analyser_mut().clear();
            }
            let analysis = summarize_bins(stem.frequency_data());
            stem.set_analysis(analysis);
            frame.insert(stem.id().to_string(), analysis);
        }
        let position = self.transport.position(ctx.current_time());
        drop(ctx);

        if playing {
            let since = self.emitted_through.unwrap_or(f64::NEG_INFINITY);
            let upto = position + self.config.schedule.event_lookahead;
            for event in self.schedule.due_events(since, upto) {
                self.emitter.emit(&Notification::MidiNote(event.clone()));
            }
            self.emitted_through = Some(since.max(upto));
            self.last_checked_position = position;
        }

        self.emitter.emit(&Notification::StemAnalysis(frame.clone()));
        Ok(frame)
    }

    pub fn last_checked_position(&self) -> f64 {
        self.last_checked_position
    }

    /// Stops playback and releases every graph node the player created.
    /// Safe to call more than once; the player can load again afterwards.
    pub fn dispose(&mut self) -> Result<()> {
        let had_session = self.loaded || !self.stems.is_empty();
        self.reset_session()?;
        if had_session {
            tracing::info!("player disposed");
        }
        Ok(())
    }

    fn reset_session(&mut self) -> Result<()> {
        {
            let mut ctx = self.ctx.lock()?;
            if self.transport.state() != TransportState::Unloaded {
                self.transport.stop(&mut ctx, &mut self.stems)?;
            }
            self.stems.clear(&mut ctx);
        }
        self.schedule.clear();
        self.transport.reset();
        self.manifest = None;
        self.manifest_path = None;
        self.loaded = false;
        self.reset_window(0.0);
        Ok(())
    }
}

impl fmt::Debug for StemPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StemPlayer")
            .field("loaded", &self.loaded)
            .field("transport", &self.transport)
            .field("stems", &self.stems.len())
            .field("scheduled_events", &self.schedule.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::{
        assets::MemoryResolver,
        audio::{fixtures::wav, AudioContext},
        midi::{fixtures, NoteKind},
    };

    const RATE: u32 = 8_000;
    const MANIFEST: &str = "song/manifest.json";

    fn player(resolver: MemoryResolver) -> StemPlayer {
        let ctx = SharedContext::new(AudioContext::new(RATE));
        StemPlayer::new(ctx, Arc::new(resolver), PlayerConfig::default())
    }

    fn advance(player: &StemPlayer, seconds: f64) {
        let frames = (seconds * f64::from(RATE)).round() as usize;
        let mut block = vec![0.0f32; frames * 2];
        player.context().lock().unwrap().render(&mut block);
    }

    fn record(player: &mut StemPlayer, kind: NotificationKind) -> Rc<RefCell<Vec<Notification>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        player.on(kind, move |n| sink.borrow_mut().push(n.clone()));
        seen
    }

    fn two_stem_song() -> MemoryResolver {
        MemoryResolver::new()
            .with(
                MANIFEST,
                r#"{"stems": {"drums": {"audio": "drums.wav", "midi": "drums.mid"},
                              "bass": {"audio": "bass.wav"}}}"#,
            )
            .with("song/drums.wav", wav(10.0, RATE, 1))
            .with("song/bass.wav", wav(12.0, RATE, 2))
            .with(
                "song/drums.mid",
                fixtures::file(480, &[fixtures::notes(&[(0, 36, 100), (480, 38, 90)])]),
            )
    }

    #[test]
    fn duration_is_longest_stem_and_bpm_defaults() {
        let mut player = player(two_stem_song());
        let loaded = record(&mut player, NotificationKind::Loaded);
        let progress = record(&mut player, NotificationKind::Progress);

        let manifest = player.load(MANIFEST).unwrap();
        assert!(manifest.bpm.is_none());
        assert!(player.is_loaded());
        assert!((player.duration() - 12.0).abs() < 1e-9);
        assert_eq!(player.stem_ids(), ["bass", "drums"]);
        assert_eq!(player.transport_state(), TransportState::Loaded);

        let times: Vec<f64> = player.schedule().events().iter().map(|e| e.time_seconds).collect();
        assert_eq!(times.len(), 2);
        assert!((times[1] - 0.5).abs() < 1e-9);

        assert_eq!(loaded.borrow().len(), 1);
        let progress = progress.borrow();
        assert_eq!(progress.len(), 2);
        assert!(matches!(
            progress.last(),
            Some(Notification::Progress { loaded: 2, total: 2, .. })
        ));
    }

    #[test]
    fn zero_default_bpm_still_yields_finite_event_times() {
        let config = PlayerConfig {
            schedule: crate::config::ScheduleConfig {
                default_bpm: 0.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let ctx = SharedContext::new(AudioContext::new(RATE));
        let mut player = StemPlayer::new(ctx, Arc::new(two_stem_song()), config);

        player.load(MANIFEST).unwrap();
        let times: Vec<f64> = player.schedule().events().iter().map(|e| e.time_seconds).collect();
        assert!(times.iter().all(|t| t.is_finite()));
        assert!((times[1] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn repeated_play_pause_before_start_keeps_seek_target() {
        let mut player = player(two_stem_song());
        player.load(MANIFEST).unwrap();
        player.seek(5.0).unwrap();

        for _ in 0..10 {
            player.play().unwrap();
            player.pause().unwrap();
        }
        assert_eq!(player.current_time().unwrap(), 5.0);
        assert_eq!(player.transport_state(), TransportState::Paused);
    }

    #[test]
    fn malformed_event_track_still_loads_the_stem() {
        let resolver = MemoryResolver::new()
            .with(MANIFEST, r#"{"bpm": 90, "stems": {"keys": {"audio": "keys.wav", "midi": "keys.mid"}}}"#)
            .with("song/keys.wav", wav(1.0, RATE, 1))
            .with("song/keys.mid", b"MTrx\x00\x00\x00\x06".to_vec());
        let mut player = player(resolver);
        let loaded = record(&mut player, NotificationKind::Loaded);

        player.load(MANIFEST).unwrap();
        assert_eq!(loaded.borrow().len(), 1);
        assert_eq!(player.stem_ids(), ["keys"]);
        assert!(player.stem("keys").unwrap().events().is_empty());
        assert!(player.schedule().is_empty());
    }

    #[test]
    fn manifest_failure_is_fatal_and_reported() {
        let mut player = player(MemoryResolver::new().with(MANIFEST, "{not json"));
        let errors = record(&mut player, NotificationKind::Error);

        assert!(matches!(
            player.load(MANIFEST),
            Err(StemPlayerError::ManifestFetch { .. })
        ));
        assert!(matches!(
            player.load("song/missing.json"),
            Err(StemPlayerError::ManifestFetch { .. })
        ));
        assert_eq!(errors.borrow().len(), 2);
        assert!(!player.is_loaded());
    }

    #[test]
    fn failed_stems_are_excluded_but_load_completes() {
        let resolver = MemoryResolver::new()
            .with(MANIFEST, r#"{"stems": {"vocals": {"audio": "vocals.wav"}, "drums": {"audio": "drums.wav"}}}"#)
            .with("song/drums.wav", wav(2.0, RATE, 1));
        let mut player = player(resolver);
        let errors = record(&mut player, NotificationKind::Error);
        let loaded = record(&mut player, NotificationKind::Loaded);

        player.load(MANIFEST).unwrap();
        assert_eq!(player.stem_ids(), ["drums"]);
        assert_eq!(loaded.borrow().len(), 1);
        assert!(matches!(
            errors.borrow().as_slice(),
            [Notification::Error { stem_id: Some(id), .. }] if id == "vocals"
        ));
        assert!(player.stem_config("vocals").is_none());
        assert_eq!(player.stem_config("drums").unwrap().audio, "drums.wav");
    }

    #[test]
    fn controls_require_a_loaded_player() {
        let mut player = player(two_stem_song());
        assert!(matches!(player.play(), Err(StemPlayerError::NotLoaded)));
        assert!(matches!(player.pause(), Err(StemPlayerError::NotLoaded)));
        assert!(matches!(player.seek(1.0), Err(StemPlayerError::NotLoaded)));
        assert!(matches!(
            player.set_stem_volume("drums", 0.5),
            Err(StemPlayerError::NotLoaded)
        ));
        assert!(matches!(player.solo_stem("drums"), Err(StemPlayerError::NotLoaded)));
        assert!(player.analyze().unwrap().is_empty());

        player.set_master_volume(0.25).unwrap();
        player.load(MANIFEST).unwrap();
        assert_eq!(player.master_volume(), 0.25);
        assert!(matches!(
            player.mute_stem("nope", true),
            Err(StemPlayerError::UnknownStem(_))
        ));
    }

    #[test]
    fn seek_while_playing_lands_near_target() {
        let mut player = player(two_stem_song());
        player.load(MANIFEST).unwrap();
        player.play().unwrap();
        advance(&player, 1.0);

        player.seek(5.0).unwrap();
        let position = player.current_time().unwrap();
        assert!((5.0 - position).abs() <= 0.05 + 1e-9);
        assert_eq!(player.transport_state(), TransportState::Playing);

        advance(&player, 0.5);
        let position = player.current_time().unwrap();
        assert!((position - 5.45).abs() < 1e-6);
    }

    #[test]
    fn natural_end_returns_to_stopped_at_zero() {
        let resolver = MemoryResolver::new()
            .with(MANIFEST, r#"{"stems": {"a": {"audio": "a.wav"}, "b": {"audio": "b.wav"}}}"#)
            .with("song/a.wav", wav(0.5, RATE, 1))
            .with("song/b.wav", wav(0.25, RATE, 1));
        let mut player = player(resolver);
        player.load(MANIFEST).unwrap();
        player.play().unwrap();

        advance(&player, 1.0);
        player.analyze().unwrap();

        assert_eq!(player.transport_state(), TransportState::Stopped);
        assert_eq!(player.current_time().unwrap(), 0.0);
        assert_eq!(player.context().lock().unwrap().voice_count(), 0);
    }

    #[test]
    fn analysis_tracks_playback() {
        let mut player = player(two_stem_song());
        let frames = record(&mut player, NotificationKind::StemAnalysis);
        player.load(MANIFEST).unwrap();

        let idle = player.analyze().unwrap();
        assert!(idle.values().all(|a| *a == StemAnalysis::default()));

        player.play().unwrap();
        advance(&player, 0.5);
        let live = player.analyze().unwrap();
        let drums = live["drums"];
        assert!(drums.energy > 0.0);
        for value in [drums.energy, drums.bass, drums.mid, drums.treble, drums.peak] {
            assert!((0.0..=1.0).contains(&value));
        }
        assert_eq!(player.stem_analysis("drums"), Some(drums));

        player.stop().unwrap();
        let stopped = player.analyze().unwrap();
        assert_eq!(stopped["drums"], StemAnalysis::default());
        assert_eq!(frames.borrow().len(), 3);
    }

    #[test]
    fn note_events_fire_once_within_lookahead() {
        let mut player = player(two_stem_song());
        let notes = record(&mut player, NotificationKind::MidiNote);
        player.load(MANIFEST).unwrap();

        // Paused polls never emit.
        player.analyze().unwrap();
        assert!(notes.borrow().is_empty());

        player.play().unwrap();
        player.analyze().unwrap();
        assert_eq!(notes.borrow().len(), 1);

        for _ in 0..4 {
            advance(&player, 0.1);
            player.analyze().unwrap();
        }
        // Position 0.35: the 0.5s note is not due yet.
        assert_eq!(notes.borrow().len(), 1);

        advance(&player, 0.1);
        player.analyze().unwrap();
        advance(&player, 0.1);
        player.analyze().unwrap();
        assert_eq!(notes.borrow().len(), 2);

        let fired: Vec<_> = notes
            .borrow()
            .iter()
            .filter_map(|n| match n {
                Notification::MidiNote(event) => Some((event.note, event.kind, event.stem_id.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(
            fired,
            [
                (36, NoteKind::NoteOn, "drums".to_string()),
                (38, NoteKind::NoteOn, "drums".to_string())
            ]
        );
    }

    #[test]
    fn seeking_back_refires_only_events_ahead_of_target() {
        let mut player = player(two_stem_song());
        let notes = record(&mut player, NotificationKind::MidiNote);
        player.load(MANIFEST).unwrap();
        player.play().unwrap();
        player.analyze().unwrap();
        advance(&player, 0.7);
        player.analyze().unwrap();
        assert_eq!(notes.borrow().len(), 2);

        player.seek(0.3).unwrap();
        player.analyze().unwrap();
        advance(&player, 0.3);
        player.analyze().unwrap();
        assert_eq!(notes.borrow().len(), 3);

        player.seek(0.0).unwrap();
        player.analyze().unwrap();
        assert_eq!(notes.borrow().len(), 4);
    }

    #[test]
    fn lyrics_resolve_next_to_the_manifest() {
        let resolver = MemoryResolver::new()
            .with(
                MANIFEST,
                r#"{"title": "Demo", "lyrics": "lyrics.lrc", "stems": {"a": {"audio": "a.wav"}}}"#,
            )
            .with("song/a.wav", wav(0.5, RATE, 1));
        let mut player = player(resolver);
        assert!(player.lyrics_path().is_none());

        player.load(MANIFEST).unwrap();
        assert_eq!(player.lyrics_path().as_deref(), Some("song/lyrics.lrc"));
        assert_eq!(player.manifest().unwrap().title.as_deref(), Some("Demo"));
    }

    #[test]
    fn dispose_releases_graph_and_is_idempotent() {
        let mut player = player(two_stem_song());
        player.load(MANIFEST).unwrap();
        player.play().unwrap();
        advance(&player, 0.2);

        player.dispose().unwrap();
        player.dispose().unwrap();

        {
            let ctx = player.context().lock().unwrap();
            assert_eq!(ctx.node_count(), 0);
            assert_eq!(ctx.voice_count(), 0);
        }
        assert!(!player.is_loaded());
        assert!(player.stem_ids().is_empty());
        assert!(player.schedule().is_empty());
        assert_eq!(player.transport_state(), TransportState::Unloaded);
        assert!(matches!(player.play(), Err(StemPlayerError::NotLoaded)));

        player.load(MANIFEST).unwrap();
        assert_eq!(player.stem_ids().len(), 2);
    }
}
