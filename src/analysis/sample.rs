// SampleAnalyzer - per-sample angular velocity, acceleration and variance
//
// Angular velocity straight from the gyroscope is the primary signal. The
// fused Euler angle wraps at ±180° and drifts when integrated, so it is
// carried on the raw frame but never used for control.

use serde::{Deserialize, Serialize};

use crate::error::ControlError;

/// Gyroscope axis carrying the rotation of interest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorAxis {
    X,
    Y,
    Z,
}

impl SensorAxis {
    fn index(self) -> usize {
        match self {
            SensorAxis::X => 0,
            SensorAxis::Y => 1,
            SensorAxis::Z => 2,
        }
    }
}

/// Raw frame as delivered by the wireless transport
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawImuFrame {
    /// Angular velocity per axis (°/s)
    pub gyro_dps: [f64; 3],
    /// Acceleration per axis (g)
    pub accel_g: [f64; 3],
    /// Fused orientation (degrees)
    pub euler_deg: [f64; 3],
    pub timestamp_ms: i64,
}

impl RawImuFrame {
    /// Normalize the frame into the single sample type the engine consumes
    pub fn to_sample(&self, axis: SensorAxis) -> Result<ImuSample, ControlError> {
        ImuSample::new(self.gyro_dps[axis.index()], self.timestamp_ms)
    }
}

/// One validated angular-velocity reading for a single channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImuSample {
    pub angular_velocity_dps: f64,
    pub timestamp_ms: i64,
}

impl ImuSample {
    pub fn new(angular_velocity_dps: f64, timestamp_ms: i64) -> Result<Self, ControlError> {
        if !angular_velocity_dps.is_finite() {
            return Err(ControlError::InvalidSample {
                reason: format!("angular velocity {} is not finite", angular_velocity_dps),
            });
        }
        if timestamp_ms < 0 {
            return Err(ControlError::InvalidSample {
                reason: format!("timestamp {} is negative", timestamp_ms),
            });
        }
        Ok(Self {
            angular_velocity_dps,
            timestamp_ms,
        })
    }
}

/// Signed angular velocity and its magnitude
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngularVelocity {
    pub signed: f64,
    pub magnitude: f64,
}

impl AngularVelocity {
    pub const ZERO: AngularVelocity = AngularVelocity {
        signed: 0.0,
        magnitude: 0.0,
    };
}

/// Finite-difference acceleration memo plus stateless velocity helpers
#[derive(Debug, Clone)]
pub struct SampleAnalyzer {
    previous: Option<(f64, i64)>,
    discontinuity_ms: i64,
}

impl SampleAnalyzer {
    pub fn new(discontinuity_ms: i64) -> Self {
        Self {
            previous: None,
            discontinuity_ms,
        }
    }

    /// Rotation-axis reading and its absolute value
    pub fn velocity_from_gyro(sample: &ImuSample) -> AngularVelocity {
        AngularVelocity {
            signed: sample.angular_velocity_dps,
            magnitude: sample.angular_velocity_dps.abs(),
        }
    }

    /// Population variance around `mean`; 0 for fewer than three values
    pub fn variance<I>(values: I, mean: f64) -> f64
    where
        I: IntoIterator<Item = f64>,
    {
        let mut count = 0usize;
        let mut sum_sq = 0.0;
        for value in values {
            let diff = value - mean;
            sum_sq += diff * diff;
            count += 1;
        }
        if count < 3 {
            return 0.0;
        }
        sum_sq / count as f64
    }

    /// `(v - v_prev) / dt` in °/s²
    ///
    /// Returns 0 on the first call, for non-positive gaps and for gaps past the
    /// discontinuity limit. The memo is updated on every call.
    pub fn angular_acceleration(&mut self, velocity: f64, timestamp_ms: i64) -> f64 {
        let acceleration = match self.previous {
            Some((prev_velocity, prev_ts)) => {
                let dt_ms = timestamp_ms - prev_ts;
                if dt_ms <= 0 || dt_ms > self.discontinuity_ms {
                    0.0
                } else {
                    (velocity - prev_velocity) / (dt_ms as f64 / 1000.0)
                }
            }
            None => 0.0,
        };
        self.previous = Some((velocity, timestamp_ms));
        acceleration
    }

    /// Forget the previous reading (resynchronization)
    pub fn reset(&mut self) {
        self.previous = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_velocity_from_gyro() {
        let sample = ImuSample::new(-42.5, 10).unwrap();
        let velocity = SampleAnalyzer::velocity_from_gyro(&sample);
        assert_eq!(velocity.signed, -42.5);
        assert_eq!(velocity.magnitude, 42.5);
    }

    #[test]
    fn test_sample_rejects_non_finite() {
        assert!(ImuSample::new(f64::NAN, 0).is_err());
        assert!(ImuSample::new(f64::INFINITY, 0).is_err());
        assert!(ImuSample::new(1.0, -5).is_err());
    }

    #[test]
    fn test_raw_frame_axis_selection() {
        let frame = RawImuFrame {
            gyro_dps: [1.0, 2.0, 3.0],
            accel_g: [0.0, 0.0, 1.0],
            euler_deg: [0.0, 0.0, 179.0],
            timestamp_ms: 100,
        };
        assert_eq!(frame.to_sample(SensorAxis::X).unwrap().angular_velocity_dps, 1.0);
        assert_eq!(frame.to_sample(SensorAxis::Z).unwrap().angular_velocity_dps, 3.0);

        let broken = RawImuFrame {
            gyro_dps: [f64::NAN, 0.0, 0.0],
            ..frame
        };
        assert!(broken.to_sample(SensorAxis::X).is_err());
    }

    #[test]
    fn test_variance_needs_three_values() {
        assert_eq!(SampleAnalyzer::variance(vec![1.0, 5.0], 3.0), 0.0);
        let values = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((SampleAnalyzer::variance(values, 5.0) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_angular_acceleration_first_call_is_zero() {
        let mut analyzer = SampleAnalyzer::new(500);
        assert_eq!(analyzer.angular_acceleration(100.0, 1000), 0.0);
        // 100 -> 200 °/s over 20 ms
        let accel = analyzer.angular_acceleration(200.0, 1020);
        assert!((accel - 5000.0).abs() < 1e-9);
    }

    #[test]
    fn test_angular_acceleration_discontinuity_updates_memo() {
        let mut analyzer = SampleAnalyzer::new(500);
        analyzer.angular_acceleration(0.0, 0);
        assert_eq!(analyzer.angular_acceleration(300.0, 900), 0.0);
        // memo now (300, 900)
        let accel = analyzer.angular_acceleration(310.0, 910);
        assert!((accel - 1000.0).abs() < 1e-9);
        // duplicate timestamp
        assert_eq!(analyzer.angular_acceleration(500.0, 910), 0.0);
    }
}
