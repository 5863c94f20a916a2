//! Self-rescheduling position sampler.
//!
//! Each tick runs to completion before the next sleep starts, so a slow tick
//! delays the schedule instead of stacking overlapping ticks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SamplerConfig {
    /// Delay after each completed tick (100 ms is ~10 Hz).
    pub interval_ms: u64,
    /// Upper bound on hand-tracking submissions per second.
    pub hand_tracking_fps: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            hand_tracking_fps: 30.0,
        }
    }
}

pub struct SamplerHandle {
    stop_flag: Arc<AtomicBool>,
    task: tokio::task::JoinHandle<u64>,
}

impl SamplerHandle {
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }

    /// Stops the loop and waits for it; returns how many ticks ran.
    pub async fn join(self) -> u64 {
        self.stop();
        match self.task.await {
            Ok(ticks) => ticks,
            Err(e) => {
                log::warn!("sampler task ended abnormally: {e}");
                0
            }
        }
    }
}

/// Spawns the sampling loop on the current tokio runtime.
pub fn spawn_sampler<F>(interval: Duration, mut tick: F) -> SamplerHandle
where
    F: FnMut() + Send + 'static,
{
    let stop_flag = Arc::new(AtomicBool::new(false));
    let task_stop = stop_flag.clone();

    let task = tokio::spawn(async move {
        let mut ticks = 0u64;
        while !task_stop.load(Ordering::Relaxed) {
            tick();
            ticks += 1;
            tokio::time::sleep(interval).await;
        }
        log::debug!("sampler stopped after {ticks} ticks");
        ticks
    });

    SamplerHandle { stop_flag, task }
}
