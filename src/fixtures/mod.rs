//! Deterministic synthetic gestures for tests and the CLI harness.
//!
//! Velocity streams are generated from a seeded `StdRng`, so the same spec
//! always yields the same samples. Calibration fixtures use symmetric
//! alternating offsets instead of random jitter so phase averages come out
//! exactly at the requested values.

use std::fmt;
use std::str::FromStr;

use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::analysis::ImuSample;
use crate::calibration::{CalibrationModel, CalibrationPhase, CalibrationSession};
use crate::config::CalibrationConfig;
use crate::error::CalibrationError;

/// Default seed shared by tests and the CLI
pub const DEFAULT_SEED: u64 = 0x5A5A_FFF0;

/// Supported synthetic gesture patterns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GesturePattern {
    /// Steady positive rotation
    Clockwise,
    /// Steady negative rotation
    Counterclockwise,
    /// Clockwise for the first half, counterclockwise for the second
    Reversal,
    /// Clockwise, a near-still pause in the middle fifth, clockwise again
    Reposition,
}

impl FromStr for GesturePattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clockwise" | "cw" => Ok(GesturePattern::Clockwise),
            "counterclockwise" | "ccw" => Ok(GesturePattern::Counterclockwise),
            "reversal" => Ok(GesturePattern::Reversal),
            "reposition" => Ok(GesturePattern::Reposition),
            other => Err(format!(
                "unknown pattern '{}' (expected clockwise, counterclockwise, reversal, reposition)",
                other
            )),
        }
    }
}

impl fmt::Display for GesturePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GesturePattern::Clockwise => "clockwise",
            GesturePattern::Counterclockwise => "counterclockwise",
            GesturePattern::Reversal => "reversal",
            GesturePattern::Reposition => "reposition",
        };
        f.write_str(name)
    }
}

/// Declarative description of a synthetic gesture stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureSpec {
    pub pattern: GesturePattern,
    pub speed_dps: f64,
    pub duration_ms: i64,
    pub rate_hz: u32,
    /// Uniform noise amplitude added to every sample
    pub jitter_dps: f64,
    pub start_ms: i64,
    pub seed: u64,
}

impl Default for GestureSpec {
    fn default() -> Self {
        Self {
            pattern: GesturePattern::Clockwise,
            speed_dps: 360.0,
            duration_ms: 2_000,
            rate_hz: 50,
            jitter_dps: 4.0,
            start_ms: 0,
            seed: DEFAULT_SEED,
        }
    }
}

impl GestureSpec {
    pub fn interval_ms(&self) -> i64 {
        (1000 / i64::from(self.rate_hz.max(1))).max(1)
    }

    /// Generate the sample stream for this spec
    pub fn generate(&self) -> Vec<ImuSample> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let interval = self.interval_ms();
        let count = (self.duration_ms.max(0) / interval) as usize;

        (0..count)
            .filter_map(|i| {
                let offset = i as i64 * interval;
                let base = self.base_velocity(offset);
                let jitter = if self.jitter_dps > 0.0 {
                    rng.gen_range(-self.jitter_dps..=self.jitter_dps)
                } else {
                    0.0
                };
                ImuSample::new(base + jitter, self.start_ms + offset).ok()
            })
            .collect()
    }

    fn base_velocity(&self, offset_ms: i64) -> f64 {
        let progress = if self.duration_ms > 0 {
            offset_ms as f64 / self.duration_ms as f64
        } else {
            0.0
        };
        match self.pattern {
            GesturePattern::Clockwise => self.speed_dps,
            GesturePattern::Counterclockwise => -self.speed_dps,
            GesturePattern::Reversal => {
                if progress < 0.5 {
                    self.speed_dps
                } else {
                    -self.speed_dps
                }
            }
            GesturePattern::Reposition => {
                if (0.4..0.6).contains(&progress) {
                    0.0
                } else {
                    self.speed_dps
                }
            }
        }
    }
}

/// Target statistics for a synthetic calibration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    pub rest_noise_dps: f64,
    pub clockwise_avg_dps: f64,
    pub counterclockwise_avg_dps: f64,
    /// Half-width of the alternating spread around each average
    pub spread_dps: f64,
    pub interval_ms: i64,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            rest_noise_dps: 2.0,
            clockwise_avg_dps: 120.0,
            counterclockwise_avg_dps: -110.0,
            spread_dps: 10.0,
            interval_ms: 20,
        }
    }
}

impl CalibrationProfile {
    /// Alternating samples for one phase; the count is rounded up to even
    pub fn phase_samples(&self, phase: CalibrationPhase, count: usize) -> Vec<f64> {
        let (center, spread) = match phase {
            CalibrationPhase::Rest => (0.0, self.rest_noise_dps),
            CalibrationPhase::Clockwise => (self.clockwise_avg_dps, self.spread_dps),
            CalibrationPhase::Counterclockwise => (self.counterclockwise_avg_dps, self.spread_dps),
        };
        let count = count + count % 2;
        (0..count)
            .map(|i| if i % 2 == 0 { center + spread } else { center - spread })
            .collect()
    }

    /// Run all three phases through `session` starting at `start_ms`
    pub fn run(
        &self,
        session: &mut CalibrationSession,
        start_ms: i64,
    ) -> Result<CalibrationModel, CalibrationError> {
        let mut now = start_ms;
        for phase in CalibrationPhase::ALL {
            let required = session.required_samples(phase);
            session.start_phase(phase, now)?;
            for velocity in self.phase_samples(phase, required) {
                now += self.interval_ms;
                session.process_sample(velocity, now);
            }
            session.stop_phase(now)?;
        }
        Ok(session.model().clone())
    }
}

/// Complete model with the default profile (cw 120, ccw -110, noise 2)
pub fn calibrated_model(config: &CalibrationConfig) -> Result<CalibrationModel, CalibrationError> {
    let mut session = CalibrationSession::new(config.clone());
    CalibrationProfile::default().run(&mut session, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_deterministic() {
        let spec = GestureSpec::default();
        assert_eq!(spec.generate(), spec.generate());

        let other = GestureSpec {
            seed: 7,
            ..GestureSpec::default()
        };
        assert_ne!(spec.generate(), other.generate());
    }

    #[test]
    fn test_sample_count_and_spacing() {
        let spec = GestureSpec {
            duration_ms: 1_000,
            rate_hz: 50,
            start_ms: 100,
            ..GestureSpec::default()
        };
        let samples = spec.generate();
        assert_eq!(samples.len(), 50);
        assert_eq!(samples[0].timestamp_ms, 100);
        assert_eq!(samples[1].timestamp_ms, 120);
    }

    #[test]
    fn test_patterns() {
        let reversal = GestureSpec {
            pattern: GesturePattern::Reversal,
            jitter_dps: 0.0,
            ..GestureSpec::default()
        }
        .generate();
        assert_eq!(reversal[0].angular_velocity_dps, 360.0);
        assert_eq!(reversal[reversal.len() - 1].angular_velocity_dps, -360.0);

        let pause = GestureSpec {
            pattern: GesturePattern::Reposition,
            jitter_dps: 0.0,
            ..GestureSpec::default()
        }
        .generate();
        assert_eq!(pause[50].angular_velocity_dps, 0.0);
        assert_eq!(pause[10].angular_velocity_dps, 360.0);
    }

    #[test]
    fn test_pattern_from_str() {
        assert_eq!("CCW".parse::<GesturePattern>(), Ok(GesturePattern::Counterclockwise));
        assert!("zigzag".parse::<GesturePattern>().is_err());
        assert_eq!(GesturePattern::Reposition.to_string(), "reposition");
    }

    #[test]
    fn test_calibrated_model_matches_profile() {
        let config = CalibrationConfig::default();
        let model = calibrated_model(&config).unwrap();
        assert!(model.is_complete);
        assert!((model.clockwise.avg - 120.0).abs() < 1e-9);
        assert!((model.counterclockwise.avg + 110.0).abs() < 1e-9);
        assert!((model.rest.noise_level - 2.0).abs() < 1e-12);
        assert!((model.separation().unwrap() - 230.0).abs() < 1e-9);
    }
}
