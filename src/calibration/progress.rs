// Progress tracking for the calibration workflow
//
// Phase identifiers plus the progress events published to the UI layer while
// a phase collects samples.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::calibration::state::{RestStats, RotationRange};
use crate::error::CalibrationError;

/// Calibration phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationPhase {
    /// Wrist held still; measures sensor noise
    Rest,
    /// User rotates clockwise
    Clockwise,
    /// User rotates counterclockwise
    Counterclockwise,
}

impl CalibrationPhase {
    pub const ALL: [CalibrationPhase; 3] = [
        CalibrationPhase::Rest,
        CalibrationPhase::Clockwise,
        CalibrationPhase::Counterclockwise,
    ];

    /// Get the next phase in the usual sequence
    ///
    /// # Returns
    /// * `Some(CalibrationPhase)` - Next phase to capture
    /// * `None` - Sequence complete
    pub fn next(&self) -> Option<CalibrationPhase> {
        match self {
            CalibrationPhase::Rest => Some(CalibrationPhase::Clockwise),
            CalibrationPhase::Clockwise => Some(CalibrationPhase::Counterclockwise),
            CalibrationPhase::Counterclockwise => None,
        }
    }

    /// Get human-readable name for display
    pub fn display_name(&self) -> &'static str {
        match self {
            CalibrationPhase::Rest => "REST",
            CalibrationPhase::Clockwise => "CLOCKWISE",
            CalibrationPhase::Counterclockwise => "COUNTERCLOCKWISE",
        }
    }

    /// Check if this phase captures rotation (not rest)
    pub fn is_rotation(&self) -> bool {
        !matches!(self, CalibrationPhase::Rest)
    }
}

impl fmt::Display for CalibrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for CalibrationPhase {
    type Err = CalibrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" => Ok(CalibrationPhase::Rest),
            "clockwise" | "cw" => Ok(CalibrationPhase::Clockwise),
            "counterclockwise" | "ccw" => Ok(CalibrationPhase::Counterclockwise),
            _ => Err(CalibrationError::UnknownPhase {
                name: s.to_string(),
            }),
        }
    }
}

/// Lifecycle status carried by a progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStatus {
    Started,
    Collecting,
    Completed,
    Error,
    Cancelled,
}

/// Statistics produced by a finished phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseStats {
    Rest(RestStats),
    Rotation(RotationRange),
}

/// Outcome of a successful `stop_phase`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase: CalibrationPhase,
    pub sample_count: usize,
    pub stats: PhaseStats,
    /// Clockwise/counterclockwise ranges were swapped by the inversion check
    pub ranges_swapped: bool,
    /// Model became (or stayed) complete after this phase
    pub model_complete: bool,
}

/// Progress event for UI consumption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProgress {
    pub phase: CalibrationPhase,
    pub status: CalibrationStatus,
    pub sample_count: usize,
    pub required_samples: usize,
    pub progress_percent: u8,
    pub result: Option<PhaseResult>,
    pub message: Option<String>,
}

impl CalibrationProgress {
    /// Create a new progress instance
    ///
    /// # Arguments
    /// * `phase` - Phase being captured
    /// * `status` - Lifecycle status
    /// * `sample_count` - Samples captured so far
    /// * `required_samples` - Minimum samples for this phase
    pub fn new(
        phase: CalibrationPhase,
        status: CalibrationStatus,
        sample_count: usize,
        required_samples: usize,
    ) -> Self {
        Self {
            phase,
            status,
            sample_count,
            required_samples,
            progress_percent: Self::percentage(sample_count, required_samples),
            result: None,
            message: None,
        }
    }

    pub fn with_result(mut self, result: PhaseResult) -> Self {
        self.result = Some(result);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Check if the phase has reached its minimum sample count
    pub fn is_phase_ready(&self) -> bool {
        self.sample_count >= self.required_samples
    }

    /// Progress percentage (0-100), capped once the minimum is reached
    pub fn percentage(sample_count: usize, required_samples: usize) -> u8 {
        if required_samples == 0 {
            return 0;
        }
        let percent = sample_count.saturating_mul(100) / required_samples;
        percent.min(100) as u8
    }
}
