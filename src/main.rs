/// Headless fluid engine runner
/// Runs the simulation at a fixed rate and logs progress.
///
/// Usage: fluid-engine [config.toml] [--cpu] [--ticks N] [--save snapshot.flsnap]
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use fluid_engine::{BackendKind, Engine, FixedRateDriver, SimulationConfig, SimulationListener, SimulationState};

struct Args {
    config: Option<PathBuf>,
    force_cpu: bool,
    ticks: Option<u64>,
    save: Option<PathBuf>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config: None,
        force_cpu: false,
        ticks: None,
        save: None,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--cpu" => args.force_cpu = true,
            "--ticks" => {
                let value = iter.next().context("--ticks needs a value")?;
                args.ticks = Some(value.parse().context("--ticks must be a number")?);
            }
            "--save" => {
                args.save = Some(PathBuf::from(iter.next().context("--save needs a path")?));
            }
            other if other.starts_with("--") => bail!("Unknown flag: {}", other),
            path => args.config = Some(PathBuf::from(path)),
        }
    }
    Ok(args)
}

/// Logs a one-line summary every `every` updates
struct ProgressLogger {
    updates: AtomicU64,
    every: u64,
}

impl SimulationListener for ProgressLogger {
    fn on_simulation_updated(&self, state: &SimulationState) {
        let n = self.updates.fetch_add(1, Ordering::Relaxed) + 1;
        if n % self.every != 0 {
            return;
        }
        let particles = state.particles();
        let mean_temperature = if particles.is_empty() {
            0.0
        } else {
            particles.temperatures().iter().sum::<f32>() / particles.len() as f32
        };
        log::info!(
            "Update {}: {} particles, mean temperature {:.2}",
            n,
            particles.len(),
            mean_temperature
        );
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;
    let mut config = match &args.config {
        Some(path) => SimulationConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SimulationConfig::default(),
    };
    if args.force_cpu {
        config.backend = BackendKind::Cpu;
    }

    let tick_rate = config.tick_rate;
    let mut engine = Engine::new(config).context("Failed to start fluid engine")?;
    engine.add_listener(Arc::new(ProgressLogger {
        updates: AtomicU64::new(0),
        every: tick_rate.max(1) as u64,
    }));

    let driver = FixedRateDriver::new(tick_rate);
    let ticks = driver.run(&mut engine, args.ticks)?;
    log::info!("Ran {} ticks", ticks);

    if let Some(path) = &args.save {
        engine
            .save_snapshot(path)
            .with_context(|| format!("Failed to save snapshot {}", path.display()))?;
    }

    engine.close();
    Ok(())
}
