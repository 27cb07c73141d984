//! Lark Demo - drive the playback engine from a terminal
//!
//! Plays a JSON manifest through a simulated audio backend and prints every
//! engine event as a JSON line. Useful for watching retries, grace-period
//! auto-advance and radio top-ups without real audio hardware.

mod manifest;
mod simulator;

use clap::{Parser, Subcommand, ValueEnum};
use lark_core::{RepeatMode, SetPlaylist};
use lark_playback::{
    Collaborators, EngineStatus, MemoryPlaylistStore, PlaybackConfig, PlaybackDevice,
    PlaybackEngine, PlaybackEvent, RadioConfig,
};
use manifest::{LogHistory, Manifest, ManifestFeed, ManifestResolver};
use simulator::SimulatedBackend;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "lark-demo")]
#[command(about = "Lark playback engine demo", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a manifest through the simulated backend
    Play {
        /// Manifest file (JSON)
        manifest: PathBuf,

        /// Engine configuration file (TOML)
        #[arg(short, long, env = "LARK_CONFIG")]
        config: Option<PathBuf>,

        /// Shuffle the playlist
        #[arg(long)]
        shuffle: bool,

        /// Repeat mode
        #[arg(long, value_enum, default_value_t = Repeat::Off)]
        repeat: Repeat,

        /// Keep the list topped up from the manifest in radio mode
        #[arg(long)]
        radio: bool,

        /// Length of every simulated track
        #[arg(long, default_value_t = 5)]
        track_seconds: u64,
    },

    /// Print the effective engine configuration
    ShowConfig {
        /// Engine configuration file (TOML)
        #[arg(short, long, env = "LARK_CONFIG")]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Repeat {
    Off,
    All,
    One,
}

impl From<Repeat> for RepeatMode {
    fn from(repeat: Repeat) -> Self {
        match repeat {
            Repeat::Off => Self::Off,
            Repeat::All => Self::All,
            Repeat::One => Self::One,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lark_demo=info,lark_playback=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            manifest,
            config,
            shuffle,
            repeat,
            radio,
            track_seconds,
        } => {
            let config = PlaybackConfig::load(config.as_deref())?;
            let manifest = Manifest::load(&manifest)?;
            let options = PlayOptions {
                shuffle,
                repeat: repeat.into(),
                radio,
                track_length: Duration::from_secs(track_seconds),
            };
            play(config, manifest, options).await?;
        }
        Commands::ShowConfig { config } => {
            let config = PlaybackConfig::load(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

struct PlayOptions {
    shuffle: bool,
    repeat: RepeatMode,
    radio: bool,
    track_length: Duration,
}

async fn play(config: PlaybackConfig, manifest: Manifest, options: PlayOptions) -> anyhow::Result<()> {
    let idle_limit = config.failure_grace() + Duration::from_secs(1);

    let mut device = PlaybackDevice::new();
    device.initialize(Box::new(SimulatedBackend::new(options.track_length)));

    let collaborators = Collaborators::new(
        Arc::new(ManifestResolver::new(&manifest)),
        Arc::new(MemoryPlaylistStore::new()),
    )
    .with_history(Arc::new(LogHistory))
    .with_feed(Arc::new(ManifestFeed::new(&manifest, 3)));

    let engine = PlaybackEngine::spawn(config, device, collaborators);

    let _printer = engine.subscribe(|event: &PlaybackEvent| {
        // Progress is noisy; the tracing output already covers position.
        if matches!(event, PlaybackEvent::Progress { .. }) {
            return;
        }
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "Failed to encode event"),
        }
    });

    let request = SetPlaylist::new(manifest.tracks.clone(), 0, manifest.name.clone());
    if !engine.set_playlist(request).await {
        anyhow::bail!("playlist store rejected the manifest");
    }
    engine.set_mode(options.shuffle, options.repeat).await;
    if options.radio {
        engine
            .open_radio(RadioConfig::new(manifest.name.clone(), "manifest"))
            .await;
    }

    tracing::info!(tracks = manifest.tracks.len(), name = %manifest.name, "Starting playback");
    engine.play().await;

    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    let mut stopped_for = Duration::ZERO;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            _ = ticker.tick() => {
                if engine.state().await.status == EngineStatus::Stopped {
                    stopped_for += Duration::from_millis(250);
                } else {
                    stopped_for = Duration::ZERO;
                }
                // Stopped for longer than the grace period means nothing will auto-advance.
                if stopped_for > idle_limit {
                    tracing::info!("Playback finished");
                    break;
                }
            }
        }
    }

    engine.shutdown().await;
    Ok(())
}
