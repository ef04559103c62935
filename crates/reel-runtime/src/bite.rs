//! Bite loop bookkeeping.
//!
//! The loop runs while at least one trigger reports the lure in the water.
//! Each run has a generation number; a wake-up from an older generation is
//! dropped, so leaving the water stops bites at once even if the task was
//! already past its sleep.

use crate::session::WeakSession;
use serde::Serialize;
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::debug;

/// Counters of one bite loop run. Reset whenever the loop restarts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BiteStats {
    pub wakeups: u64,
    /// Wake-ups skipped because every socket was occupied.
    pub skipped_busy: u64,
    pub misses: u64,
    pub bites: u64,
}

#[derive(Debug, Default)]
pub struct BiteLoop {
    in_water: u32,
    generation: u64,
    task: Option<AbortHandle>,
    stats: BiteStats,
}

impl BiteLoop {
    /// Registers one more overlapping trigger. Returns the generation to run
    /// when this call put the lure in the water.
    pub fn enter(&mut self) -> Option<u64> {
        self.in_water += 1;
        if self.in_water > 1 {
            return None;
        }
        self.generation += 1;
        self.stats = BiteStats::default();
        Some(self.generation)
    }

    /// Removes one trigger. Returns true when this stopped the loop.
    pub fn exit(&mut self) -> bool {
        if self.in_water == 0 {
            return false;
        }
        self.in_water -= 1;
        if self.in_water > 0 {
            return false;
        }
        self.generation += 1;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        true
    }

    pub fn attach(&mut self, task: AbortHandle) {
        if let Some(old) = self.task.replace(task) {
            old.abort();
        }
    }

    /// Whether a wake-up from `generation` may still act.
    pub fn is_current(&self, generation: u64) -> bool {
        self.in_water > 0 && generation == self.generation
    }

    pub fn in_water(&self) -> u32 {
        self.in_water
    }

    pub fn stats(&self) -> BiteStats {
        self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut BiteStats {
        &mut self.stats
    }
}

/// Converts config seconds into a sleep; negative or non-finite input
/// becomes zero.
pub fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Body of the spawned bite task.
pub(crate) async fn run(session: WeakSession, generation: u64) {
    loop {
        let Some(wait) = session.next_bite_interval(generation).await else {
            break;
        };
        tokio::time::sleep(wait).await;
        if !session.bite_tick(generation).await {
            break;
        }
    }
    debug!(generation, "bite loop finished");
}
