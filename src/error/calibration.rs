// Calibration error types and constants

use crate::calibration::CalibrationPhase;
use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Calibration error code constants
///
/// Single source of truth for the codes surfaced to the UI layer.
///
/// Error code range: 2001-2008
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// Phase stopped before reaching its minimum sample count
    pub const INSUFFICIENT_SAMPLES: i32 = 2001;

    /// A phase is already collecting
    pub const PHASE_ALREADY_ACTIVE: i32 = 2002;

    /// Stop/cancel requested with no phase collecting
    pub const NO_ACTIVE_PHASE: i32 = 2003;

    /// Phase name not recognised
    pub const UNKNOWN_PHASE: i32 = 2004;

    /// Computed or loaded statistics are not finite
    pub const INVALID_STATISTICS: i32 = 2005;

    /// Calibration model not complete
    pub const NOT_COMPLETE: i32 = 2006;

    /// Persistence collaborator failed
    pub const STORAGE: i32 = 2007;

    /// Persisted model could not be encoded or decoded
    pub const SERIALIZATION: i32 = 2008;
}

/// Log a calibration error with structured context
///
/// This function logs calibration errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=CalibrationSession, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// These errors cover the three-phase capture procedure, statistics
/// validation and model persistence.
///
/// Error code range: 2001-2008
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Phase stopped before enough samples were captured; the phase stays open
    InsufficientSamples {
        phase: CalibrationPhase,
        required: usize,
        collected: usize,
    },

    /// Another phase is already collecting
    PhaseAlreadyActive { active: CalibrationPhase },

    /// No phase is collecting
    NoActivePhase,

    /// Phase name could not be parsed
    UnknownPhase { name: String },

    /// Statistics contain NaN or infinite values
    InvalidStatistics { reason: String },

    /// Calibration model not complete
    NotComplete,

    /// Repository read/write failed
    Storage { reason: String },

    /// JSON encoding/decoding failed
    Serialization { reason: String },
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::InsufficientSamples { .. } => {
                CalibrationErrorCodes::INSUFFICIENT_SAMPLES
            }
            CalibrationError::PhaseAlreadyActive { .. } => {
                CalibrationErrorCodes::PHASE_ALREADY_ACTIVE
            }
            CalibrationError::NoActivePhase => CalibrationErrorCodes::NO_ACTIVE_PHASE,
            CalibrationError::UnknownPhase { .. } => CalibrationErrorCodes::UNKNOWN_PHASE,
            CalibrationError::InvalidStatistics { .. } => {
                CalibrationErrorCodes::INVALID_STATISTICS
            }
            CalibrationError::NotComplete => CalibrationErrorCodes::NOT_COMPLETE,
            CalibrationError::Storage { .. } => CalibrationErrorCodes::STORAGE,
            CalibrationError::Serialization { .. } => CalibrationErrorCodes::SERIALIZATION,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::InsufficientSamples {
                phase,
                required,
                collected,
            } => {
                format!(
                    "Insufficient samples for {}: need {}, got {}",
                    phase.display_name(),
                    required,
                    collected
                )
            }
            CalibrationError::PhaseAlreadyActive { active } => {
                format!("Phase {} already in progress", active.display_name())
            }
            CalibrationError::NoActivePhase => "No calibration phase in progress".to_string(),
            CalibrationError::UnknownPhase { name } => {
                format!("Unknown calibration phase: {}", name)
            }
            CalibrationError::InvalidStatistics { reason } => {
                format!("Invalid statistics: {}", reason)
            }
            CalibrationError::NotComplete => "Calibration not complete".to_string(),
            CalibrationError::Storage { reason } => {
                format!("Calibration storage failed: {}", reason)
            }
            CalibrationError::Serialization { reason } => {
                format!("Calibration serialization failed: {}", reason)
            }
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}

impl From<std::io::Error> for CalibrationError {
    fn from(err: std::io::Error) -> Self {
        CalibrationError::Storage {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CalibrationError {
    fn from(err: serde_json::Error) -> Self {
        CalibrationError::Serialization {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_error_codes() {
        assert_eq!(
            CalibrationError::InsufficientSamples {
                phase: CalibrationPhase::Clockwise,
                required: 30,
                collected: 3
            }
            .code(),
            CalibrationErrorCodes::INSUFFICIENT_SAMPLES
        );
        assert_eq!(
            CalibrationError::PhaseAlreadyActive {
                active: CalibrationPhase::Rest
            }
            .code(),
            CalibrationErrorCodes::PHASE_ALREADY_ACTIVE
        );
        assert_eq!(
            CalibrationError::NoActivePhase.code(),
            CalibrationErrorCodes::NO_ACTIVE_PHASE
        );
        assert_eq!(
            CalibrationError::UnknownPhase {
                name: "sideways".to_string()
            }
            .code(),
            CalibrationErrorCodes::UNKNOWN_PHASE
        );
        assert_eq!(
            CalibrationError::InvalidStatistics {
                reason: "nan".to_string()
            }
            .code(),
            CalibrationErrorCodes::INVALID_STATISTICS
        );
        assert_eq!(
            CalibrationError::NotComplete.code(),
            CalibrationErrorCodes::NOT_COMPLETE
        );
        assert_eq!(
            CalibrationError::Storage {
                reason: "disk".to_string()
            }
            .code(),
            CalibrationErrorCodes::STORAGE
        );
        assert_eq!(
            CalibrationError::Serialization {
                reason: "eof".to_string()
            }
            .code(),
            CalibrationErrorCodes::SERIALIZATION
        );
    }

    #[test]
    fn test_calibration_error_messages() {
        let err = CalibrationError::InsufficientSamples {
            phase: CalibrationPhase::Rest,
            required: 20,
            collected: 7,
        };
        assert_eq!(err.message(), "Insufficient samples for REST: need 20, got 7");

        let err = CalibrationError::PhaseAlreadyActive {
            active: CalibrationPhase::Counterclockwise,
        };
        assert!(err.message().contains("COUNTERCLOCKWISE"));

        let err = CalibrationError::UnknownPhase {
            name: "sideways".to_string(),
        };
        assert!(err.message().contains("sideways"));
    }

    #[test]
    fn test_calibration_error_display() {
        let err = CalibrationError::NotComplete;
        let display = format!("{}", err);
        assert!(display.contains("CalibrationError"));
        assert!(display.contains(&err.code().to_string()));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing file");
        let err: CalibrationError = io_err.into();
        match err {
            CalibrationError::Storage { reason } => assert!(reason.contains("missing file")),
            other => panic!("Expected Storage variant, got {:?}", other),
        }
    }
}
