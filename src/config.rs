//! Configuration for the gesture control engine
//!
//! Every tunable constant of calibration, direction classification, playback
//! mapping, repositioning and volume control lives here. The configuration is
//! loaded once (JSON file or defaults), validated, and then handed to each
//! component by value; nothing mutates it after construction.
//!
//! Several defaults (the 85/15 sign ratios, the 180/220 °/s method-switch band,
//! the ±5 °/s inversion threshold) were tuned by hand on one sensor pair and
//! should be revisited against real hardware.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::analysis::sample::SensorAxis;
use crate::error::ControlError;

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub calibration: CalibrationConfig,
    pub analysis: AnalysisConfig,
    pub direction: DirectionConfig,
    pub playback: PlaybackConfig,
    pub reposition: RepositionConfig,
    pub volume: VolumeConfig,
    pub control: ControlConfig,
}

/// Calibration procedure parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Minimum samples captured while the wrist rests
    pub min_samples_rest: usize,
    /// Minimum samples captured for each rotation phase
    pub min_samples_rotation: usize,
    /// Averages beyond ±this on the wrong side trigger the range swap (°/s)
    pub inversion_threshold_dps: f64,
    /// Separation below this is reported as a quality warning (°/s)
    pub min_separation_dps: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            min_samples_rest: 20,
            min_samples_rotation: 30,
            inversion_threshold_dps: 5.0,
            min_separation_dps: 10.0,
        }
    }
}

/// Sample analysis and sliding window parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Time span retained by the sliding velocity window
    pub sampling_window_ms: i64,
    /// Samples required in the window before playback output is trusted
    pub min_window_samples: usize,
    /// Gaps longer than this reset the acceleration finite difference
    pub acceleration_discontinuity_ms: i64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sampling_window_ms: 4000,
            min_window_samples: 5,
            acceleration_discontinuity_ms: 500,
        }
    }
}

/// Direction classifier parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionConfig {
    /// Signed velocities kept for classification
    pub window_size: usize,
    /// Positive-sample ratio above which the buffer reads clockwise
    pub sign_ratio_high: f64,
    /// Positive-sample ratio below which the buffer reads counterclockwise
    pub sign_ratio_low: f64,
    /// Mean |velocity| at/above which the calibrated-range method takes over
    pub method_switch_high_dps: f64,
    /// Mean |velocity| at/below which the sign method takes back over
    pub method_switch_low_dps: f64,
    /// Upper edge of the low speed band
    pub speed_band_low_dps: f64,
    /// Lower edge of the high speed band
    pub speed_band_high_dps: f64,
    pub ratio_low_speed: f64,
    pub ratio_mid_speed: f64,
    pub ratio_high_speed: f64,
    /// Time a candidate must hold before it commits
    pub stability_time_ms: i64,
    /// Candidate evaluation is suspended this long after a commit
    pub change_lock_time_ms: i64,
    /// |velocity| below this releases the change lock early
    pub zero_crossing_threshold_dps: f64,
    /// |acceleration| above this shortens the stability requirement (°/s²)
    pub acceleration_threshold_dps2: f64,
    pub predictive_bonus_ms: i64,
    /// Floor for the shortened stability requirement
    pub min_stability_ms: i64,
    pub consensus_enabled: bool,
    pub consensus_frames: usize,
    /// Dead zone applied while the wrist is at rest
    pub dead_zone_rest_dps: f64,
    /// Dead zone applied once motion is established
    pub dead_zone_motion_dps: f64,
    /// Magnitudes averaged to decide between the two dead zones
    pub dead_zone_window: usize,
    /// Average magnitude at which the narrow dead zone fully applies
    pub dead_zone_motion_reference_dps: f64,
}

impl Default for DirectionConfig {
    fn default() -> Self {
        Self {
            window_size: 8,
            sign_ratio_high: 0.85,
            sign_ratio_low: 0.15,
            method_switch_high_dps: 220.0,
            method_switch_low_dps: 180.0,
            speed_band_low_dps: 150.0,
            speed_band_high_dps: 400.0,
            ratio_low_speed: 1.5,
            ratio_mid_speed: 1.8,
            ratio_high_speed: 2.5,
            stability_time_ms: 150,
            change_lock_time_ms: 300,
            zero_crossing_threshold_dps: 15.0,
            acceleration_threshold_dps2: 1500.0,
            predictive_bonus_ms: 80,
            min_stability_ms: 50,
            consensus_enabled: false,
            consensus_frames: 3,
            dead_zone_rest_dps: 8.0,
            dead_zone_motion_dps: 2.0,
            dead_zone_window: 5,
            dead_zone_motion_reference_dps: 60.0,
        }
    }
}

/// Playback rate mapping parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Average speed that maps to a playback rate of exactly 1.0
    pub reference_speed_dps: f64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub transition_duration_ms: i64,
    /// Multiplier applied to the target while a direction transition is active
    pub transition_damping: f64,
    /// Variance that maps to the fully damped smoothing factor
    pub variance_threshold: f64,
    /// Weight of the previous smoothed value at zero variance
    pub smoothing_base: f64,
    /// Weight of the previous smoothed value at/above the variance threshold
    pub smoothing_max: f64,
    /// Consecutive smoothed rates further apart than this are reported
    pub snap_threshold: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            reference_speed_dps: 360.0,
            min_rate: 0.0,
            max_rate: 3.0,
            transition_duration_ms: 200,
            transition_damping: 0.6,
            variance_threshold: 2500.0,
            smoothing_base: 0.3,
            smoothing_max: 0.8,
            snap_threshold: 0.3,
        }
    }
}

/// Hand repositioning detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositionConfig {
    pub threshold_dps: f64,
    pub min_duration_ms: i64,
    pub max_duration_ms: i64,
    /// Re-emit the frozen command while repositioning
    pub freeze_enabled: bool,
}

impl Default for RepositionConfig {
    fn default() -> Self {
        Self {
            threshold_dps: 20.0,
            min_duration_ms: 150,
            max_duration_ms: 3000,
            freeze_enabled: true,
        }
    }
}

/// Potentiometer-style volume parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Hard stop on either side of centre (degrees)
    pub limit_degrees: f64,
    pub gyro_dead_zone_dps: f64,
    /// Flip the sign for a sensor worn on the opposite hand
    pub invert: bool,
    /// Weight of the new value in the exponential smoothing step
    pub smoothing_factor: f64,
    /// Distance from a hard stop at which volume snaps to 0.0/1.0
    pub snap_threshold_degrees: f64,
    pub dedup_min_delta: f64,
    pub dedup_min_interval_ms: i64,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            limit_degrees: 90.0,
            gyro_dead_zone_dps: 3.0,
            invert: false,
            smoothing_factor: 0.3,
            snap_threshold_degrees: 2.0,
            dedup_min_delta: 0.02,
            dedup_min_interval_ms: 100,
        }
    }
}

/// Per-sample timing and exercise lifecycle parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Gaps shorter than this are treated as duplicate timestamps
    pub min_dt_ms: i64,
    /// Gaps longer than this force a resynchronization
    pub max_dt_ms: i64,
    /// Magnitudes above this are treated as sensor glitches
    pub sanity_ceiling_dps: f64,
    pub exercise_duration_ms: u64,
    pub duration_check_interval_ms: u64,
    /// Gyroscope axis carrying the rotation of interest
    pub axis: SensorAxis,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            min_dt_ms: 5,
            max_dt_ms: 500,
            sanity_ceiling_dps: 2000.0,
            exercise_duration_ms: 60_000,
            duration_check_interval_ms: 250,
            axis: SensorAxis::Z,
        }
    }
}

impl EngineConfig {
    /// Load configuration from JSON file
    ///
    /// Falls back to defaults when the file is missing or malformed.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    tracing::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Strict parse; missing sections fall back to defaults, malformed JSON is an error.
    pub fn from_json_str(json: &str) -> Result<Self, ControlError> {
        serde_json::from_str(json).map_err(|err| ControlError::ConfigLoad {
            reason: err.to_string(),
        })
    }

    /// Reject parameter combinations the components cannot operate with
    pub fn validate(&self) -> Result<(), ControlError> {
        let cal = &self.calibration;
        if cal.min_samples_rest == 0 || cal.min_samples_rotation == 0 {
            return Err(ControlError::invalid_config(
                "calibration.min_samples",
                "minimum sample counts must be positive",
            ));
        }
        require_finite_non_negative("calibration.inversion_threshold_dps", cal.inversion_threshold_dps)?;
        require_finite_non_negative("calibration.min_separation_dps", cal.min_separation_dps)?;

        let analysis = &self.analysis;
        if analysis.sampling_window_ms <= 0 {
            return Err(ControlError::invalid_config(
                "analysis.sampling_window_ms",
                "must be positive",
            ));
        }
        if analysis.min_window_samples == 0 {
            return Err(ControlError::invalid_config(
                "analysis.min_window_samples",
                "must be positive",
            ));
        }

        let dir = &self.direction;
        if dir.window_size == 0 || dir.dead_zone_window == 0 {
            return Err(ControlError::invalid_config(
                "direction.window_size",
                "window sizes must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&dir.sign_ratio_low)
            || !(0.0..=1.0).contains(&dir.sign_ratio_high)
            || dir.sign_ratio_low >= dir.sign_ratio_high
        {
            return Err(ControlError::invalid_config(
                "direction.sign_ratio",
                "ratios must lie in [0, 1] with low < high",
            ));
        }
        if !(dir.method_switch_low_dps < dir.method_switch_high_dps) {
            return Err(ControlError::invalid_config(
                "direction.method_switch",
                "low threshold must be below high threshold",
            ));
        }
        if !(dir.speed_band_low_dps < dir.speed_band_high_dps) {
            return Err(ControlError::invalid_config(
                "direction.speed_band",
                "low band edge must be below high band edge",
            ));
        }
        for (name, ratio) in [
            ("direction.ratio_low_speed", dir.ratio_low_speed),
            ("direction.ratio_mid_speed", dir.ratio_mid_speed),
            ("direction.ratio_high_speed", dir.ratio_high_speed),
        ] {
            if !ratio.is_finite() || ratio < 1.0 {
                return Err(ControlError::invalid_config(name, "must be finite and >= 1.0"));
            }
        }
        if dir.consensus_enabled && dir.consensus_frames == 0 {
            return Err(ControlError::invalid_config(
                "direction.consensus_frames",
                "must be positive when consensus is enabled",
            ));
        }
        require_finite_non_negative("direction.dead_zone_rest_dps", dir.dead_zone_rest_dps)?;
        require_finite_non_negative("direction.dead_zone_motion_dps", dir.dead_zone_motion_dps)?;
        if dir.dead_zone_motion_reference_dps <= 0.0 {
            return Err(ControlError::invalid_config(
                "direction.dead_zone_motion_reference_dps",
                "must be positive",
            ));
        }

        let pb = &self.playback;
        if !pb.reference_speed_dps.is_finite() || pb.reference_speed_dps <= 0.0 {
            return Err(ControlError::invalid_config(
                "playback.reference_speed_dps",
                "must be finite and positive",
            ));
        }
        if !pb.min_rate.is_finite() || !pb.max_rate.is_finite() || pb.min_rate >= pb.max_rate {
            return Err(ControlError::invalid_config(
                "playback.rate_bounds",
                "min_rate must be below max_rate",
            ));
        }
        for (name, factor) in [
            ("playback.transition_damping", pb.transition_damping),
            ("playback.smoothing_base", pb.smoothing_base),
            ("playback.smoothing_max", pb.smoothing_max),
        ] {
            if !(0.0..=1.0).contains(&factor) {
                return Err(ControlError::invalid_config(name, "must lie in [0, 1]"));
            }
        }
        if pb.smoothing_base > pb.smoothing_max {
            return Err(ControlError::invalid_config(
                "playback.smoothing",
                "smoothing_base must not exceed smoothing_max",
            ));
        }
        if pb.smoothing_max >= 1.0 {
            return Err(ControlError::invalid_config(
                "playback.smoothing_max",
                "a weight of 1.0 would freeze the smoothed rate",
            ));
        }
        if !pb.variance_threshold.is_finite() || pb.variance_threshold <= 0.0 {
            return Err(ControlError::invalid_config(
                "playback.variance_threshold",
                "must be finite and positive",
            ));
        }

        let rep = &self.reposition;
        require_finite_non_negative("reposition.threshold_dps", rep.threshold_dps)?;
        if rep.min_duration_ms < 0 || rep.max_duration_ms <= rep.min_duration_ms {
            return Err(ControlError::invalid_config(
                "reposition.duration",
                "max_duration_ms must exceed min_duration_ms",
            ));
        }

        let vol = &self.volume;
        if !vol.limit_degrees.is_finite() || vol.limit_degrees <= 0.0 {
            return Err(ControlError::invalid_config(
                "volume.limit_degrees",
                "must be finite and positive",
            ));
        }
        if !(vol.smoothing_factor > 0.0 && vol.smoothing_factor <= 1.0) {
            return Err(ControlError::invalid_config(
                "volume.smoothing_factor",
                "must lie in (0, 1]",
            ));
        }
        require_finite_non_negative("volume.gyro_dead_zone_dps", vol.gyro_dead_zone_dps)?;
        if !(0.0..vol.limit_degrees).contains(&vol.snap_threshold_degrees) {
            return Err(ControlError::invalid_config(
                "volume.snap_threshold_degrees",
                "must lie in [0, limit_degrees)",
            ));
        }

        let ctl = &self.control;
        if ctl.min_dt_ms < 0 || ctl.max_dt_ms <= ctl.min_dt_ms {
            return Err(ControlError::invalid_config(
                "control.dt",
                "max_dt_ms must exceed min_dt_ms",
            ));
        }
        if !ctl.sanity_ceiling_dps.is_finite() || ctl.sanity_ceiling_dps <= 0.0 {
            return Err(ControlError::invalid_config(
                "control.sanity_ceiling_dps",
                "must be finite and positive",
            ));
        }
        if ctl.duration_check_interval_ms == 0 {
            return Err(ControlError::invalid_config(
                "control.duration_check_interval_ms",
                "must be positive",
            ));
        }

        Ok(())
    }
}

fn require_finite_non_negative(name: &str, value: f64) -> Result<(), ControlError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ControlError::invalid_config(name, "must be finite and non-negative"))
    }
}
