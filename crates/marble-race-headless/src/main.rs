//! Marble Race headless runner
//!
//! Drives a race at a fixed step with a simple autopilot and logs the run
//! lifecycle. Useful for checking a course configuration without a renderer.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use marble_race_core::{Button, InputSnapshot, RaceConfig, RaceGame, RunPhase, format_elapsed};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Runs a marble race without rendering
#[derive(Parser, Debug)]
#[command(name = "marble-race-headless")]
#[command(about = "Simulate a marble race with an autopilot")]
struct Cli {
    /// Course configuration (JSON). Defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the configured seed
    #[arg(long)]
    seed: Option<u64>,

    /// Overrides the configured number of obstacle segments
    #[arg(long, allow_negative_numbers = true)]
    segments: Option<i64>,

    /// Maximum number of ticks to simulate
    #[arg(long, default_value_t = 3600)]
    ticks: u32,

    /// Number of runs to attempt; the race restarts after each finish
    #[arg(long, default_value_t = 1)]
    runs: u32,

    /// Tick at which gravity is reversed
    #[arg(long)]
    reverse_gravity_at: Option<u32>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RaceConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => RaceConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(segments) = cli.segments {
        config.segment_count = segments;
    }

    let dt = config.physics.dt;
    let mut game = RaceGame::new(config).context("Failed to build race")?;

    tracing::info!(
        seed = game.layout().seed,
        segments = game.layout().segment_count(),
        finish_z = game.layout().finish_z(),
        "race ready"
    );

    let mut finished_runs = 0;
    for tick in 0..cli.ticks {
        if cli.reverse_gravity_at == Some(tick) {
            game.toggle_gravity();
        }

        let input = autopilot(&game, tick);
        let Some(change) = game.tick(dt, &input) else {
            continue;
        };

        match change.to {
            RunPhase::Playing => tracing::info!(tick, "run started"),
            RunPhase::Ready => tracing::info!(tick, seed = change.seed, "run restarted"),
            RunPhase::Ended => {
                finished_runs += 1;
                tracing::info!(tick, time = %format_elapsed(game.elapsed()), "finish line crossed");
                if finished_runs >= cli.runs {
                    break;
                }
                game.restart();
            }
        }
    }

    let camera = game.camera();
    tracing::info!(
        phase = ?game.phase(),
        finished_runs,
        camera_position = ?camera.position,
        hash = game.compute_hash(),
        "simulation stopped"
    );
    Ok(())
}

/// Holds forward, steers back to the center line and hops periodically.
fn autopilot(game: &RaceGame, tick: u32) -> InputSnapshot {
    let mut input = InputSnapshot::with(&[Button::Forward]);

    if let Some(marble) = game.marble() {
        if marble.translation.x > 0.4 {
            input.set(Button::Leftward, true);
        } else if marble.translation.x < -0.4 {
            input.set(Button::Rightward, true);
        }
    }

    // Press jump for one tick out of every 45
    input.set(Button::Jump, tick.is_multiple_of(45));
    input
}
