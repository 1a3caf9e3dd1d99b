use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::EngineResult;

use super::Engine;

/// Stops a running [`FixedRateDriver`] from another thread
#[derive(Debug, Clone)]
pub struct DriverHandle {
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
}

impl DriverHandle {
    /// Ends the current run, or the next one if the driver is not running yet
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Calls [`Engine::tick`] at a fixed target rate with the measured delta
///
/// This is the only place physics advances; presentation reads state through
/// listeners and never triggers a step.
#[derive(Debug)]
pub struct FixedRateDriver {
    interval: Duration,
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
}

impl FixedRateDriver {
    pub fn new(tick_rate: u32) -> Self {
        let tick_rate = tick_rate.max(1);
        Self {
            interval: Duration::from_secs_f64(1.0 / tick_rate as f64),
            running: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn handle(&self) -> DriverHandle {
        DriverHandle {
            running: Arc::clone(&self.running),
            stop_requested: Arc::clone(&self.stop_requested),
        }
    }

    /// Tick until stopped, or until `max_ticks` ticks have run
    ///
    /// Returns the number of ticks executed. A tick error stops the driver and
    /// is returned. A pending stop request is consumed when the run ends.
    pub fn run(&self, engine: &mut Engine, max_ticks: Option<u64>) -> EngineResult<u64> {
        self.running.store(true, Ordering::Release);
        log::info!("Driver started at {:.1} Hz", 1.0 / self.interval.as_secs_f64());

        let mut last = Instant::now();
        let mut ticks = 0u64;
        let result = loop {
            if self.stop_requested.load(Ordering::Acquire) || max_ticks.map_or(false, |max| ticks >= max) {
                break Ok(ticks);
            }

            let frame_start = Instant::now();
            let dt = frame_start.duration_since(last).as_secs_f32();
            last = frame_start;

            if let Err(e) = engine.tick(dt) {
                log::error!("Tick {} failed: {}", ticks, e);
                break Err(e);
            }
            ticks += 1;

            let elapsed = frame_start.elapsed();
            if elapsed < self.interval {
                thread::sleep(self.interval - elapsed);
            } else {
                log::trace!("Tick overran its slot by {:?}", elapsed - self.interval);
            }
        };

        self.running.store(false, Ordering::Release);
        self.stop_requested.store(false, Ordering::Release);
        log::info!("Driver stopped after {} ticks", ticks);
        result
    }
}
