//! Play an Ogg Vorbis file louder than it was mastered.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use superears::decode::decode_vorbis;
use superears::host::CpalHost;
use superears::metadata::{read_best_effort, VorbisTagReader};
use superears::player::format_time;
use superears::{EngineConfig, JsonFileStore, MemoryElement, Player};

#[derive(Parser, Debug)]
#[command(name = "superears")]
#[command(about = "Audio player with up to 400% amplification", long_about = None)]
struct Args {
    /// Ogg Vorbis file to play
    file: PathBuf,

    /// Gain factor, 0.0 to 4.0 (1.0 plays unchanged). Saved for next time.
    #[arg(short, long, value_name = "GAIN")]
    volume: Option<f64>,

    /// TOML file with engine settings
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Settings store (defaults to the user config directory)
    #[arg(long, value_name = "PATH")]
    store: Option<PathBuf>,

    /// Stop after this many seconds
    #[arg(long, value_name = "SECONDS")]
    seconds: Option<f64>,

    /// Gain ramp length, overriding the config file
    #[arg(long, value_name = "MS")]
    ramp_ms: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("superears=info")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(ramp_ms) = args.ramp_ms {
        config.ramp_ms = ramp_ms;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(run(args, config))
}

async fn run(args: Args, config: EngineConfig) -> anyhow::Result<()> {
    let store = match &args.store {
        Some(path) => JsonFileStore::new(path),
        None => JsonFileStore::in_config_dir()?,
    };
    info!(store = %store.path().display(), "settings store");

    let mut player = Player::start(&config, CpalHost::new(), Arc::new(store), MemoryElement::new()).await;

    if let Some(volume) = args.volume {
        if player.set_volume(volume).is_err() {
            warn!(volume, "volume must be between 0.0 and 4.0, keeping {}", player.volume());
        }
    }

    let audio = decode_vorbis(&args.file).map_err(|e| {
        eprintln!("{}", e.user_message());
        e
    })?;
    let tags = read_best_effort(&VorbisTagReader, &args.file);
    let name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| args.file.display().to_string());
    player.load(audio, name, tags)?;

    if let Err(e) = player.toggle_play() {
        eprintln!("{}", e.user_message());
        return Err(e.into());
    }

    let track = player.track().map(|t| t.display_name()).unwrap_or_default();
    println!("Playing {track} at {}%", player.volume_percent());

    let limit = args.seconds.filter(|s| s.is_finite() && *s > 0.0);
    let mut frame = tokio::time::interval(Duration::from_millis(16));
    let mut frames: u64 = 0;

    loop {
        frame.tick().await;
        frames += 1;

        if player.tick() {
            break;
        }
        if frames % 60 == 0 {
            let peak = player.snapshot().iter().copied().max().unwrap_or(0);
            println!(
                "{} / {}  vol {}%  peak {peak}",
                format_time(player.position_secs()),
                format_time(player.duration_secs()),
                player.volume_percent(),
            );
        }
        if limit.is_some_and(|limit| player.position_secs() >= limit) {
            break;
        }
    }

    player.shutdown().await;
    Ok(())
}
