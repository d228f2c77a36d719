use std::path::{Path, PathBuf};
use std::sync::Arc;

use ar_exhibit_core::{
    ArtworkCatalog, ExhibitConfig, ExhibitEvent, Exhibition, TracingPresentation,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() -> ar_exhibit_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay { events, config } => run_replay(&events, config.as_deref()),
        Commands::Demo { tick } => run_demo(tick),
    }
}

fn run_replay(events: &Path, config: Option<&Path>) -> ar_exhibit_core::Result<()> {
    tracing::info!(?events, ?config, "replaying marker script");

    let config = match config {
        Some(path) => ExhibitConfig::load(path)?,
        None => ExhibitConfig::default(),
    };
    let raw = std::fs::read_to_string(events)?;
    let script = ExhibitEvent::parse_script(&raw)?;

    run_script(&config, &script);
    Ok(())
}

fn run_demo(tick: f32) -> ar_exhibit_core::Result<()> {
    tracing::info!(tick, "running built-in demo");

    let mut script = vec![ExhibitEvent::Found("thermal".to_string())];
    // The intro animation keeps the next marker out until it finishes.
    script.push(ExhibitEvent::Found("soundscape".to_string()));
    script.extend(std::iter::repeat(ExhibitEvent::Tick(tick)).take(ticks_for(3.0, tick)));
    script.extend([
        ExhibitEvent::Found("soundscape".to_string()),
        ExhibitEvent::Lost("soundscape".to_string()),
        ExhibitEvent::Found("sculpture".to_string()),
        ExhibitEvent::PopupToggle("sculpture".to_string()),
        ExhibitEvent::Tick(4.0),
        ExhibitEvent::Found("thermal".to_string()),
        ExhibitEvent::PopupToggle("sculpture".to_string()),
        ExhibitEvent::Exit,
    ]);

    run_script(&ExhibitConfig::default(), &script);
    Ok(())
}

fn run_script(config: &ExhibitConfig, script: &[ExhibitEvent]) {
    let mut exhibition = Exhibition::from_config(
        config,
        &ArtworkCatalog::standard(),
        Arc::new(TracingPresentation),
    );

    for event in script {
        if let Some(outcome) = exhibition.dispatch(event) {
            tracing::info!(
                ?event,
                ?outcome,
                active = ?exhibition.manager().active_module_id(),
                "marker event"
            );
        }
    }

    tracing::info!(
        active = ?exhibition.manager().active_module_id(),
        playing = ?exhibition.context().audio.current_playing_id(),
        overlay = ?exhibition.context().popups.current_visible_id(),
        "script finished"
    );
    exhibition.teardown();
}

fn ticks_for(seconds: f32, tick: f32) -> usize {
    if tick <= 0.0 {
        return 0;
    }
    (seconds / tick).ceil() as usize
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "AR exhibit marker simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a JSON script of marker, visitor, and tick events.
    Replay {
        /// Path to the event script.
        events: PathBuf,
        /// Optional exhibit configuration; the built-in gallery is used
        /// otherwise.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Walk the built-in gallery through a scripted visit.
    Demo {
        /// Seconds per simulated frame.
        #[arg(short, long, default_value_t = 0.5)]
        tick: f32,
    },
}
