// CalibrationModel - captured rest noise and rotation ranges
//
// The model is built phase by phase by CalibrationSession and is read-only
// for the control loop once complete. Its JSON shape (camelCase keys) is the
// contract with the external calibration repository.
//
// Invariant: clockwise is always the positive-leaning range. When both
// rotation phases come back with their averages clearly on the wrong side
// (sensor worn mirrored, or the user rotated the other way), the two ranges
// are swapped.

use serde::{Deserialize, Serialize};

use crate::calibration::progress::CalibrationPhase;
use crate::config::CalibrationConfig;
use crate::error::CalibrationError;

/// Average |velocity| while stationary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestStats {
    pub noise_level: f64,
    pub sample_count: u32,
}

impl RestStats {
    /// Mean of the captured magnitudes
    pub fn from_magnitudes(magnitudes: &[f64]) -> Result<Self, CalibrationError> {
        if magnitudes.is_empty() {
            return Err(CalibrationError::InvalidStatistics {
                reason: "rest phase captured no samples".to_string(),
            });
        }
        let noise_level = magnitudes.iter().sum::<f64>() / magnitudes.len() as f64;
        let stats = Self {
            noise_level,
            sample_count: magnitudes.len() as u32,
        };
        stats.check_finite()?;
        Ok(stats)
    }

    fn check_finite(&self) -> Result<(), CalibrationError> {
        if self.noise_level.is_finite() {
            Ok(())
        } else {
            Err(CalibrationError::InvalidStatistics {
                reason: format!("rest noise level {} is not finite", self.noise_level),
            })
        }
    }
}

/// Signed-velocity statistics for one rotation direction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationRange {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub sample_count: u32,
    #[serde(default)]
    pub raw_deltas: Vec<f64>,
}

impl RotationRange {
    pub fn from_samples(velocities: &[f64]) -> Result<Self, CalibrationError> {
        if velocities.is_empty() {
            return Err(CalibrationError::InvalidStatistics {
                reason: "rotation phase captured no samples".to_string(),
            });
        }
        let min = velocities.iter().copied().fold(f64::INFINITY, f64::min);
        let max = velocities.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = velocities.iter().sum::<f64>() / velocities.len() as f64;

        let range = Self {
            min,
            max,
            avg,
            sample_count: velocities.len() as u32,
            raw_deltas: velocities.to_vec(),
        };
        range.check_finite("rotation")?;
        Ok(range)
    }

    fn check_finite(&self, label: &str) -> Result<(), CalibrationError> {
        if self.min.is_finite() && self.max.is_finite() && self.avg.is_finite() {
            Ok(())
        } else {
            Err(CalibrationError::InvalidStatistics {
                reason: format!(
                    "{} range has non-finite stats (min={}, max={}, avg={})",
                    label, self.min, self.max, self.avg
                ),
            })
        }
    }

    fn is_captured(&self) -> bool {
        self.sample_count > 0
    }
}

/// Quality summary of a completed model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationQuality {
    /// |clockwise.avg - counterclockwise.avg|
    pub separation: f64,
    /// Separation below the configured minimum
    pub low_separation: bool,
    pub noise_level: f64,
}

/// One calibration per application session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationModel {
    pub rest: RestStats,
    pub clockwise: RotationRange,
    pub counterclockwise: RotationRange,
    pub is_complete: bool,
    pub captured_at_millis: Option<i64>,
}

impl CalibrationModel {
    /// Empty model with no captured phases
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_phase(&self, phase: CalibrationPhase) -> bool {
        match phase {
            CalibrationPhase::Rest => self.rest.sample_count > 0,
            CalibrationPhase::Clockwise => self.clockwise.is_captured(),
            CalibrationPhase::Counterclockwise => self.counterclockwise.is_captured(),
        }
    }

    pub(crate) fn store_rest(&mut self, stats: RestStats) {
        self.rest = stats;
    }

    pub(crate) fn store_rotation(&mut self, phase: CalibrationPhase, range: RotationRange) {
        match phase {
            CalibrationPhase::Clockwise => self.clockwise = range,
            CalibrationPhase::Counterclockwise => self.counterclockwise = range,
            CalibrationPhase::Rest => {}
        }
    }

    /// Swap the rotation ranges when both averages sit on the wrong side
    ///
    /// Only runs once both rotation phases are present. Returns true when a
    /// swap happened.
    pub fn apply_inversion_check(&mut self, threshold_dps: f64) -> bool {
        if !(self.clockwise.is_captured() && self.counterclockwise.is_captured()) {
            return false;
        }
        if self.clockwise.avg < -threshold_dps && self.counterclockwise.avg > threshold_dps {
            std::mem::swap(&mut self.clockwise, &mut self.counterclockwise);
            tracing::warn!(
                "[CalibrationModel] Rotation ranges inverted (cw avg {:.1}, ccw avg {:.1}); swapped",
                self.counterclockwise.avg,
                self.clockwise.avg
            );
            return true;
        }
        false
    }

    /// Re-evaluate completeness against the configured minimums
    ///
    /// Stamps `captured_at_millis` when the model becomes complete.
    pub fn finalize(&mut self, config: &CalibrationConfig, now_ms: i64) -> bool {
        let counts_ok = self.rest.sample_count as usize >= config.min_samples_rest
            && self.clockwise.sample_count as usize >= config.min_samples_rotation
            && self.counterclockwise.sample_count as usize >= config.min_samples_rotation;
        let complete = counts_ok && self.check_finite().is_ok();

        if complete && !self.is_complete {
            self.captured_at_millis = Some(now_ms);
        }
        if !complete {
            self.captured_at_millis = None;
        }
        self.is_complete = complete;
        complete
    }

    /// Verify a model from storage before it is trusted
    pub fn validate(&self, config: &CalibrationConfig) -> Result<(), CalibrationError> {
        self.check_finite()?;
        if self.is_complete {
            let shortfalls = [
                (CalibrationPhase::Rest, self.rest.sample_count, config.min_samples_rest),
                (
                    CalibrationPhase::Clockwise,
                    self.clockwise.sample_count,
                    config.min_samples_rotation,
                ),
                (
                    CalibrationPhase::Counterclockwise,
                    self.counterclockwise.sample_count,
                    config.min_samples_rotation,
                ),
            ];
            for (phase, collected, required) in shortfalls {
                if (collected as usize) < required {
                    return Err(CalibrationError::InsufficientSamples {
                        phase,
                        required,
                        collected: collected as usize,
                    });
                }
            }
        }
        Ok(())
    }

    fn check_finite(&self) -> Result<(), CalibrationError> {
        self.rest.check_finite()?;
        self.clockwise.check_finite("clockwise")?;
        self.counterclockwise.check_finite("counterclockwise")?;
        Ok(())
    }

    /// |clockwise.avg - counterclockwise.avg| for complete models
    pub fn separation(&self) -> Option<f64> {
        if !self.is_complete {
            return None;
        }
        Some((self.clockwise.avg - self.counterclockwise.avg).abs())
    }

    /// Quality report; low separation is flagged, never rejected
    pub fn quality(&self, min_separation_dps: f64) -> Option<CalibrationQuality> {
        self.separation().map(|separation| CalibrationQuality {
            separation,
            low_separation: separation < min_separation_dps,
            noise_level: self.rest.noise_level,
        })
    }
}
