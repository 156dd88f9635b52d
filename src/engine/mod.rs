//! Engine module housing the gesture control loop.
//!
//! `core` holds the per-sample `GestureControlLoop`; `exercise` holds the
//! shared active flag and the tokio duration watchdog that ends an exercise.

pub mod core;
pub mod exercise;

pub use core::GestureControlLoop;
pub use exercise::{spawn_duration_watchdog, ExerciseFlag};
