//! Headless match runner.
//!
//! Builds the arena on the rapier backend, drives it with no input for a fixed
//! number of frames one fixed step apart, then logs how the match went.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use rooftop_game::config::{load_config_from_path, GameConfig};
use rooftop_game::round::Phase;
use rooftop_game::GameEngine;
use rooftop_physics::tags::Team;

#[derive(Debug, Parser)]
#[command(name = "rooftop", about = "Run a rooftop match without a window")]
struct Args {
    /// JSON game config; defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Frames to run; stops early if the match ends.
    #[arg(long, default_value_t = 600)]
    frames: usize,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = match &args.config {
        Some(path) => load_config_from_path(path)?,
        None => GameConfig::default(),
    };
    let mut engine = GameEngine::new(config).context("failed to build arena")?;

    let frame_dt = engine.config().physics.fixed_time_step;
    let (mut frames, mut steps, mut shots) = (0usize, 0u64, 0usize);
    for frame in 0..args.frames {
        let report = engine.tick(frame as f64 * frame_dt);
        frames += 1;
        steps += u64::from(report.steps);
        shots += report.fired.len();
        if report.phase == Phase::GameOver {
            break;
        }
    }

    let state = engine.state();
    log::info!(
        "{frames} frames, {steps} steps, {shots} shots; blue {} - red {} ({})",
        state.score.blue,
        state.score.red,
        state.phase
    );
    for team in Team::ALL {
        log::info!("{team} landed {} hits", state.hits_by(team));
    }
    if let Some(winner) = state.winner(engine.config().round.win_score) {
        log::info!("{winner} wins");
    }
    Ok(())
}
