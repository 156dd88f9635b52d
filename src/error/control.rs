// Control-loop error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Control error code constants
///
/// Error code range: 3001-3004
pub struct ControlErrorCodes {}

impl ControlErrorCodes {
    /// Sample rejected at ingestion
    pub const INVALID_SAMPLE: i32 = 3001;

    /// Configuration parameter out of range
    pub const INVALID_CONFIG: i32 = 3002;

    /// Configuration could not be read or parsed
    pub const CONFIG_LOAD: i32 = 3003;

    /// Exercise is not running
    pub const EXERCISE_INACTIVE: i32 = 3004;
}

/// Log a control error with structured context
pub fn log_control_error(err: &ControlError, context: &str) {
    error!(
        "Control error in {}: code={}, component=GestureControlLoop, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised at the control engine's construction and ingestion boundaries
///
/// Per-sample conditions inside a running exercise are reported as skip
/// outcomes instead; these variants only surface where a caller can act.
///
/// Error code range: 3001-3004
#[derive(Debug, Clone, PartialEq)]
pub enum ControlError {
    /// Raw sensor reading could not be normalized
    InvalidSample { reason: String },

    /// Configuration parameter failed validation
    InvalidConfig { parameter: String, reason: String },

    /// Configuration source unreadable or malformed
    ConfigLoad { reason: String },

    /// Operation requires a running exercise
    ExerciseInactive,
}

impl ControlError {
    pub(crate) fn invalid_config(parameter: &str, reason: impl Into<String>) -> Self {
        ControlError::InvalidConfig {
            parameter: parameter.to_string(),
            reason: reason.into(),
        }
    }
}

impl ErrorCode for ControlError {
    fn code(&self) -> i32 {
        match self {
            ControlError::InvalidSample { .. } => ControlErrorCodes::INVALID_SAMPLE,
            ControlError::InvalidConfig { .. } => ControlErrorCodes::INVALID_CONFIG,
            ControlError::ConfigLoad { .. } => ControlErrorCodes::CONFIG_LOAD,
            ControlError::ExerciseInactive => ControlErrorCodes::EXERCISE_INACTIVE,
        }
    }

    fn message(&self) -> String {
        match self {
            ControlError::InvalidSample { reason } => format!("Invalid sample: {}", reason),
            ControlError::InvalidConfig { parameter, reason } => {
                format!("Invalid config parameter {}: {}", parameter, reason)
            }
            ControlError::ConfigLoad { reason } => format!("Failed to load config: {}", reason),
            ControlError::ExerciseInactive => "Exercise not running".to_string(),
        }
    }
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ControlError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ControlError {}
