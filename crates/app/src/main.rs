mod output;

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{Args, Parser, Subcommand};
use stemviz_core::{
    midi,
    timeline::{timed_events, TempoMap},
    AudioContext, FsResolver, Notification, NotificationKind, PlayerConfig, SharedContext,
    StemPlayer, TransportState,
};
use tracing_subscriber::EnvFilter;

use crate::output::AudioOutput;

/// Poll interval of the playback loop, roughly one display frame.
const POLL_INTERVAL: Duration = Duration::from_millis(16);

fn main() -> stemviz_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play(args) => run_play(args),
        Commands::Inspect { manifest, config } => run_inspect(&manifest, config.as_ref()),
        Commands::Midi { file, bpm } => run_midi(&file, bpm),
    }
}

fn load_config(path: Option<&PathBuf>) -> stemviz_core::Result<PlayerConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading player config");
            PlayerConfig::from_json_file(path)
        }
        None => Ok(PlayerConfig::default()),
    }
}

fn manifest_key(path: &PathBuf) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn run_play(args: PlayArgs) -> stemviz_core::Result<()> {
    let config = load_config(args.config.as_ref())?;
    let ctx = SharedContext::new(AudioContext::new(config.audio.sample_rate));
    let _output = AudioOutput::start(ctx.clone(), config.audio.block_size)?;

    let mut player = StemPlayer::new(ctx, Arc::new(FsResolver::new()), config);
    subscribe(&mut player, args.json);

    player.load(&manifest_key(&args.manifest))?;
    for id in &args.mute {
        player.mute_stem(id, true)?;
    }
    if let Some(id) = &args.solo {
        player.solo_stem(id)?;
    }
    if let Some(volume) = args.volume {
        player.set_master_volume(volume)?;
    }
    if let Some(seconds) = args.seek {
        player.seek(seconds)?;
    }

    player.play()?;
    tracing::info!(duration = player.duration(), "playing");

    let mut last_report = 0.0;
    loop {
        std::thread::sleep(POLL_INTERVAL);
        player.analyze()?;
        if player.transport_state() == TransportState::Stopped {
            break;
        }

        let position = player.current_time()?;
        if position - last_report >= 1.0 {
            last_report = position;
            tracing::info!(position, "playback");
        }
    }

    tracing::info!("playback finished");
    player.dispose()
}

fn subscribe(player: &mut StemPlayer, json: bool) {
    player.on(NotificationKind::Progress, |notification| {
        if let Notification::Progress {
            loaded,
            total,
            stem_id,
        } = notification
        {
            tracing::info!(loaded, total, stem = %stem_id, "stem settled");
        }
    });
    player.on(NotificationKind::Error, |notification| {
        if let Notification::Error { stem_id, cause } = notification {
            tracing::warn!(stem = ?stem_id, cause = %cause, "load error");
        }
    });

    if json {
        for kind in [NotificationKind::MidiNote, NotificationKind::StemAnalysis] {
            player.on(kind, |notification| match serde_json::to_string(notification) {
                Ok(line) => println!("{line}"),
                Err(err) => tracing::warn!(error = %err, "failed to serialize notification"),
            });
        }
    } else {
        player.on(NotificationKind::MidiNote, |notification| {
            if let Notification::MidiNote(event) = notification {
                tracing::info!(
                    stem = %event.stem_id,
                    kind = ?event.kind,
                    note = event.note,
                    time = event.time_seconds,
                    "note"
                );
            }
        });
    }
}

fn run_inspect(manifest: &PathBuf, config: Option<&PathBuf>) -> stemviz_core::Result<()> {
    let config = load_config(config)?;
    let ctx = SharedContext::new(AudioContext::new(config.audio.sample_rate));
    let mut player = StemPlayer::new(ctx, Arc::new(FsResolver::new()), config);
    subscribe(&mut player, false);

    let loaded = player.load(&manifest_key(manifest))?;
    println!(
        "{} - {}",
        loaded.artist.as_deref().unwrap_or("unknown artist"),
        loaded.title.as_deref().unwrap_or("untitled")
    );
    match loaded.bpm {
        Some(bpm) => println!("bpm: {bpm}"),
        None => println!("bpm: {} (default)", player.config().schedule.default_bpm),
    }
    println!("duration: {:.2}s", player.duration());
    if let Some(lyrics) = player.lyrics_path() {
        println!("lyrics: {lyrics}");
    }

    for id in player.stem_ids() {
        let Some(stem) = player.stem(&id) else {
            continue;
        };
        println!(
            "  {id:<12} {:>8.2}s  {:>5} events  audio={}{}",
            stem.duration_seconds(),
            stem.events().len(),
            stem.config().audio,
            stem.config()
                .midi
                .as_deref()
                .map(|midi| format!(" midi={midi}"))
                .unwrap_or_default()
        );
    }
    let missing: Vec<_> = loaded
        .stems
        .keys()
        .filter(|id| player.stem(id).is_none())
        .collect();
    if !missing.is_empty() {
        println!("failed: {missing:?}");
    }

    player.dispose()
}

fn run_midi(file: &PathBuf, bpm: f64) -> stemviz_core::Result<()> {
    let bytes = std::fs::read(file)?;
    let stream = midi::decode(&bytes)?;
    tracing::info!(
        format = stream.format,
        ticks_per_beat = stream.ticks_per_beat,
        events = stream.events.len(),
        tempo_changes = stream.tempo_changes.len(),
        "decoded event track"
    );

    let label = file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tempo = TempoMap::uniform(bpm, stream.ticks_per_beat);
    for event in timed_events(&stream, &label, &tempo) {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Synchronized multi-stem player", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play a song through the default output device.
    Play(PlayArgs),
    /// Load a manifest and print what was found without playing it.
    Inspect {
        /// Path to the song manifest.
        manifest: PathBuf,
        /// Optional player configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Decode an event-track file and print its timed events as JSON lines.
    Midi {
        file: PathBuf,
        /// Tempo used for tick to seconds conversion.
        #[arg(long, default_value_t = 120.0)]
        bpm: f64,
    },
}

#[derive(Args, Debug)]
struct PlayArgs {
    /// Path to the song manifest.
    manifest: PathBuf,
    /// Optional player configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Start position in seconds.
    #[arg(long)]
    seek: Option<f64>,
    /// Stems to mute; may be repeated.
    #[arg(long)]
    mute: Vec<String>,
    /// Stem to solo.
    #[arg(long)]
    solo: Option<String>,
    /// Master volume in [0, 1].
    #[arg(long)]
    volume: Option<f32>,
    /// Print note and analysis notifications as JSON lines on stdout.
    #[arg(long)]
    json: bool,
}
