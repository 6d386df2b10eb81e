//! Cleanup actor: periodically removes games that are due for cleanup.
//!
//! Runs once at start, then every `interval`. The eligibility rule itself
//! lives in `ledger::rules`; this actor only decides when to apply it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;

use super::Actor;
use crate::state::SystemState;

/// How often the run loop checks its shutdown flag.
const POLL: Duration = Duration::from_millis(200);

pub struct CleanupActor {
    pub interval: Duration,
}

impl Actor for CleanupActor {
    fn start(&self, state: Arc<SystemState>, shutdown: Arc<AtomicBool>) {
        let interval = self.interval;
        std::thread::Builder::new()
            .name("cleanup".into())
            .spawn(move || run(state, shutdown, interval))
            .expect("failed to spawn cleanup thread");
    }
}

fn run(state: Arc<SystemState>, shutdown: Arc<AtomicBool>, interval: Duration) {
    tracing::info!("cleanup: started (every {}s)", interval.as_secs());
    let mut last_run: Option<Instant> = None;

    while !shutdown.load(Ordering::Relaxed) {
        if last_run.is_none_or(|t| t.elapsed() >= interval) {
            last_run = Some(Instant::now());
            match state.ledger.cleanup(Utc::now()) {
                Ok(0) => tracing::debug!("cleanup: nothing to remove"),
                Ok(n) => tracing::info!("cleanup: removed {n} stale games"),
                Err(e) => tracing::warn!("cleanup: failed: {e}"),
            }
        }
        std::thread::sleep(POLL);
    }
    tracing::info!("cleanup: shutting down");
}
