// Gesture Playback Core - wrist-IMU control engine
// Turns per-wrist angular velocity into playback rate, direction and volume

// Module declarations
pub mod analysis;
pub mod api;
pub mod calibration;
pub mod config;
pub mod engine;
pub mod error;
pub mod fixtures;
pub mod telemetry;

// Re-exports for convenience
pub use api::*;
pub use calibration::{CalibrationModel, CalibrationSession};
pub use config::EngineConfig;
pub use engine::GestureControlLoop;
pub use error::{CalibrationError, ControlError, ErrorCode};
pub use telemetry::{ControlEvent, TelemetryCollector};

/// Install a tracing subscriber writing to stderr.
///
/// `log` records are forwarded through the subscriber. Calling this more
/// than once keeps the first subscriber.
pub fn init_logging() {
    if tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
    {
        tracing::info!("[Logging] tracing subscriber installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}
