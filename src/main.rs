use bardbox::emitter::list_output_ports;
use bardbox::error::PlaylistError;
use bardbox::{
    Config, ControlSurface, EngineOptions, KeyEmitter, LogEmitter, MidiFileDecoder,
    MidiOutEmitter, PlaybackState, RonSelectionStore, playlist, spawn_engine,
};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bardbox")]
#[command(about = "Plays MIDI files as timed key presses", long_about = None)]
struct Cli {
    /// Config file (RON)
    #[arg(short, long, default_value = "bardbox.ron")]
    config: PathBuf,

    /// Folder scanned for .mid/.midi files
    #[arg(long)]
    midi_root: Option<PathBuf>,

    /// Send notes to the MIDI output port whose name contains this
    #[arg(long)]
    midi_out: Option<String>,

    /// Play only this subfolder of the MIDI root
    #[arg(short, long)]
    folder: Option<String>,

    /// Song number to start on (1-based)
    #[arg(short, long)]
    start: Option<usize>,

    /// Repeat the current song
    #[arg(short = 'l', long = "loop")]
    loop_song: bool,

    /// Initial speed multiplier
    #[arg(long)]
    speed: Option<f64>,

    /// Write logs here instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// List MIDI output ports and exit
    #[arg(long)]
    list_ports: bool,
}

fn init_tracing(log_file: Option<&PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bardbox=info"));
    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_ref())?;

    if cli.list_ports {
        for (i, name) in list_output_ports()?.iter().enumerate() {
            println!("{i}: {name}");
        }
        return Ok(());
    }

    let mut config = Config::load_or_default(&cli.config)?;
    if let Some(root) = cli.midi_root {
        config.midi_root = root;
    }
    if let Some(port) = cli.midi_out {
        config.midi_out_port = Some(port);
    }
    std::fs::create_dir_all(&config.midi_root)?;

    let songs = match playlist::scan(&config.midi_root, cli.folder.as_deref()) {
        Ok(songs) => songs,
        Err(PlaylistError::Empty(dir)) => {
            eprintln!("No MIDI files in '{}'", dir.display());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(songs = songs.len(), root = %config.midi_root.display(), "playlist loaded");

    let start = cli.start.unwrap_or(1).saturating_sub(1);
    let state = Arc::new(PlaybackState::with_playlist(songs, start));
    state.set_looping(cli.loop_song);
    if let Some(speed) = cli.speed {
        state.set_speed(speed);
    }
    // pick the playlist interactively unless the command line already did
    let show_menu = cli.folder.is_none() && cli.start.is_none();
    if show_menu {
        state.set_paused(true);
    }

    let emitter: Box<dyn KeyEmitter> = match &config.midi_out_port {
        Some(port) => Box::new(MidiOutEmitter::connect(port, config.note_hold())?),
        None => {
            tracing::info!("no MIDI output configured, logging notes only");
            Box::new(LogEmitter::new(config.keymap.clone()))
        }
    };

    let store = Arc::new(RonSelectionStore::open(&config.db_file));
    let engine = spawn_engine(
        state.clone(),
        emitter,
        Arc::new(MidiFileDecoder),
        store,
        EngineOptions::from(&config),
    );

    let mut surface = ControlSurface::new(engine, config.midi_root.clone());
    if show_menu {
        surface.open_menu()?;
        state.set_paused(false);
    }
    surface.run()?;

    Ok(())
}
