//! Exercise lifecycle: the shared active flag and the duration watchdog.
//!
//! The flag is the only state shared between the sample path and the
//! watchdog task. Each `raise` starts a new generation so a watchdog left
//! over from an earlier exercise never ends a later one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::telemetry::{ControlEvent, TelemetryCollector};

#[derive(Debug, Default)]
struct FlagInner {
    active: AtomicBool,
    generation: AtomicU64,
}

/// Cloneable handle to the exercise's `isActive` flag
#[derive(Debug, Clone, Default)]
pub struct ExerciseFlag {
    inner: Arc<FlagInner>,
}

impl ExerciseFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark active and return the new generation
    pub fn raise(&self) -> u64 {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.active.store(true, Ordering::SeqCst);
        generation
    }

    /// Clear the flag; returns whether it was set
    pub fn lower(&self) -> bool {
        self.inner.active.swap(false, Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.is_active() && self.generation() == generation
    }
}

/// Spawn the periodic duration check for the current exercise
///
/// Polls every `check_interval`; once `duration` has elapsed it lowers the
/// flag and publishes `ExerciseCompleted`. Exits quietly when the exercise
/// is stopped or restarted first. Must be called inside a tokio runtime.
pub fn spawn_duration_watchdog(
    flag: ExerciseFlag,
    duration: Duration,
    check_interval: Duration,
    events: Arc<TelemetryCollector>,
) -> JoinHandle<()> {
    let generation = flag.generation();
    let check_interval = check_interval.max(Duration::from_millis(1));

    tokio::spawn(async move {
        let started = Instant::now();
        let mut ticker = time::interval(check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if !flag.is_current(generation) {
                tracing::debug!("[ExerciseWatchdog] Exercise ended before its duration elapsed");
                return;
            }

            let elapsed = started.elapsed();
            if elapsed >= duration {
                if flag.lower() {
                    let elapsed_ms = elapsed.as_millis() as u64;
                    tracing::info!(
                        "[ExerciseWatchdog] Exercise completed after {} ms",
                        elapsed_ms
                    );
                    events.publish(ControlEvent::ExerciseCompleted { elapsed_ms });
                }
                return;
            }
        }
    })
}
