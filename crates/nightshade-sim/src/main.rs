//! # Nightshade Sim
//!
//! Headless arena for tuning antagonist behaviors.
//!
//! Loads a TOML file describing the arena, a scripted target and the
//! antagonist's behavior configuration, runs the hunt for a fixed simulated
//! duration and logs every behavior change.
//!
//! Usage: `nightshade-sim [config.toml] [--write-default]`

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod arena;
mod config;
mod sim;
mod target;
mod timing;

use std::path::PathBuf;

use anyhow::{Context, Result};
use nightshade_ai::NotificationKind;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{SimConfig, CONFIG_FILE};
use crate::sim::Simulation;

/// Main entry point.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("nightshade=info".parse()?))
        .init();

    info!("Nightshade sim starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut path = PathBuf::from(CONFIG_FILE);
    let mut write_default = false;
    for arg in std::env::args().skip(1) {
        if arg == "--write-default" {
            write_default = true;
        } else {
            path = PathBuf::from(arg);
        }
    }

    if write_default {
        SimConfig::default()
            .save_to(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        return Ok(());
    }

    let mut config = SimConfig::load_from(&path);
    config.validate();

    let report = Simulation::new(config)
        .context("setting up the antagonist")?
        .run();

    info!(
        frames = report.frames,
        physics_steps = report.physics_steps,
        elapsed = report.elapsed,
        transitions = report.transitions.len(),
        notifications = report.notifications.len(),
        frames_sighted = report.frames_sighted,
        chases = report.count(NotificationKind::ChaseStarted),
        give_ups = report.count(NotificationKind::ChaseStopped),
        failed_repositions = report.count(NotificationKind::StrategicRepositionFailed),
        closest_approach = report.closest_approach,
        final_behavior = ?report.final_behavior,
        "simulation finished"
    );

    info!("Nightshade sim shutdown complete");
    Ok(())
}
