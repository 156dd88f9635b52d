// Error types for the gesture playback engine
//
// This module defines custom error types for calibration and control-loop
// operations, providing structured error handling with stable numeric codes
// that UI and storage collaborators can match on.

mod calibration;
mod control;

pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use control::{log_control_error, ControlError, ControlErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the collaborator boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
