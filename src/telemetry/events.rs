//! Control events published by the gesture loop and the exercise watchdog.

use serde::{Deserialize, Serialize};

use crate::analysis::{ClassificationMethod, Direction};
use crate::api::{Channel, SkipReason};

/// Notifications for UI, logging and diagnostics consumers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ControlEvent {
    ExerciseStarted {
        at_ms: i64,
    },
    /// Duration watchdog ended the exercise
    ExerciseCompleted {
        elapsed_ms: u64,
    },
    ExerciseStopped,
    /// Resynchronization drop (stale dt or sanity ceiling)
    SampleDropped {
        channel: Channel,
        reason: SkipReason,
        at_ms: i64,
    },
    DirectionChanged {
        from: Direction,
        to: Direction,
        method: ClassificationMethod,
        at_ms: i64,
    },
    RepositionStarted {
        at_ms: i64,
        frozen_rate: f64,
    },
    RepositionEnded {
        duration_ms: i64,
    },
    RepositionCancelled {
        duration_ms: i64,
    },
    RepositionTimedOut {
        duration_ms: i64,
    },
    RateSnap {
        previous: f64,
        current: f64,
        delta: f64,
    },
    /// Running without a complete calibration model
    CalibrationDegraded,
}
