// DirectionClassifier - rotation direction from a short signed-velocity ring
//
// Two classification methods share one ring buffer:
// - Sign method (low/moderate speed): ratio of positive samples
// - Calibrated-range method (high speed): distance of the mean velocity to
//   the two calibrated rotation ranges, with a speed-dependent ratio
//
// A hysteresis band picks between them. Raw classifications then pass
// through a candidate/stability stage, a post-change lock (released early at
// a zero crossing), an acceleration-driven stability bonus and optional
// multi-frame consensus before a new direction commits.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::calibration::{CalibrationModel, RotationRange};
use crate::config::DirectionConfig;

/// Rotation direction
///
/// Clockwise is the positive-velocity-leaning direction of a calibrated
/// model. In playback commands clockwise encodes as -1 and counterclockwise
/// as +1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Direction {
    Clockwise,
    Counterclockwise,
}

impl Direction {
    /// Playback direction sign sent to the audio collaborator
    pub fn playback_sign(self) -> i8 {
        match self {
            Direction::Clockwise => -1,
            Direction::Counterclockwise => 1,
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Clockwise => Direction::Counterclockwise,
            Direction::Counterclockwise => Direction::Clockwise,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Direction::Clockwise => "CLOCKWISE",
            Direction::Counterclockwise => "COUNTERCLOCKWISE",
        }
    }
}

impl From<Direction> for i8 {
    fn from(direction: Direction) -> i8 {
        direction.playback_sign()
    }
}

impl TryFrom<i8> for Direction {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Direction::Clockwise),
            1 => Ok(Direction::Counterclockwise),
            other => Err(format!("direction must be -1 or +1, got {}", other)),
        }
    }
}

/// Method that produced a raw classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMethod {
    Sign,
    CalibratedRange,
}

/// Per-exercise direction state, mutated only by the classifier
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionState {
    pub current_direction: Direction,
    pub candidate_direction: Option<Direction>,
    pub candidate_since: Option<i64>,
    pub last_change_at: i64,
    pub consensus_history: VecDeque<Option<Direction>>,
    pub using_sign_method: bool,
}

impl DirectionState {
    /// Fresh state for an exercise starting at `now_ms`
    pub fn reset(now_ms: i64) -> Self {
        Self {
            current_direction: Direction::Counterclockwise,
            candidate_direction: None,
            candidate_since: None,
            last_change_at: now_ms,
            consensus_history: VecDeque::new(),
            using_sign_method: true,
        }
    }

    fn clear_candidate(&mut self) {
        self.candidate_direction = None;
        self.candidate_since = None;
    }
}

/// A committed direction change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionChange {
    pub from: Direction,
    pub to: Direction,
    pub at_ms: i64,
}

/// Result of feeding one sample to the classifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionDecision {
    /// Direction after this sample
    pub direction: Direction,
    /// Raw classification of the current ring, `None` when no consensus
    pub raw: Option<Direction>,
    pub method: ClassificationMethod,
    pub change: Option<DirectionChange>,
}

pub struct DirectionClassifier {
    config: DirectionConfig,
    /// Only complete models are kept; `None` means degraded operation
    calibration: Option<CalibrationModel>,
    velocities: VecDeque<f64>,
    recent_magnitudes: VecDeque<f64>,
    state: DirectionState,
}

impl DirectionClassifier {
    pub fn new(config: DirectionConfig, calibration: Option<&CalibrationModel>, now_ms: i64) -> Self {
        Self {
            velocities: VecDeque::with_capacity(config.window_size),
            recent_magnitudes: VecDeque::with_capacity(config.dead_zone_window),
            config,
            calibration: usable_calibration(calibration),
            state: DirectionState::reset(now_ms),
        }
    }

    /// Swap the calibration model, keeping direction state and buffers
    pub fn set_calibration(&mut self, calibration: Option<&CalibrationModel>) {
        self.calibration = usable_calibration(calibration);
    }

    /// Drop buffered samples and start a fresh exercise state
    pub fn reset(&mut self, now_ms: i64) {
        self.velocities.clear();
        self.recent_magnitudes.clear();
        self.state = DirectionState::reset(now_ms);
    }

    /// Move timing onto a restarted clock; direction and buffers are kept
    /// and the post-change lock counts as elapsed
    pub fn rebase_clock(&mut self, now_ms: i64) {
        self.state.last_change_at = now_ms - self.config.change_lock_time_ms;
        self.state.clear_candidate();
    }

    pub fn state(&self) -> &DirectionState {
        &self.state
    }

    pub fn current_direction(&self) -> Direction {
        self.state.current_direction
    }

    /// True when running without a complete calibration model
    pub fn is_degraded(&self) -> bool {
        self.calibration.is_none()
    }

    /// Dead zone interpolated between the at-rest and in-motion widths
    ///
    /// `magnitude` joins a short rolling average; the wider rest dead zone
    /// applies when that average is zero and the narrow motion dead zone once
    /// it reaches `dead_zone_motion_reference_dps`.
    pub fn dynamic_dead_zone(&mut self, magnitude: f64) -> f64 {
        if self.recent_magnitudes.len() == self.config.dead_zone_window {
            self.recent_magnitudes.pop_front();
        }
        self.recent_magnitudes.push_back(magnitude);

        let average =
            self.recent_magnitudes.iter().sum::<f64>() / self.recent_magnitudes.len() as f64;
        let motion = (average / self.config.dead_zone_motion_reference_dps).clamp(0.0, 1.0);

        self.config.dead_zone_rest_dps
            + (self.config.dead_zone_motion_dps - self.config.dead_zone_rest_dps) * motion
    }

    /// Feed one signed velocity and return the (possibly updated) direction
    pub fn classify(
        &mut self,
        signed_velocity: f64,
        angular_acceleration: f64,
        now_ms: i64,
    ) -> DirectionDecision {
        if self.velocities.len() == self.config.window_size {
            self.velocities.pop_front();
        }
        self.velocities.push_back(signed_velocity);

        let method = self.current_method();
        if self.velocities.len() < self.config.window_size {
            return self.decision(None, method, None);
        }

        let count = self.velocities.len() as f64;
        let mean = self.velocities.iter().sum::<f64>() / count;
        let mean_abs = self.velocities.iter().map(|v| v.abs()).sum::<f64>() / count;

        self.update_method(mean_abs);
        let method = self.current_method();

        let raw = match &self.calibration {
            None => None,
            Some(model) => match method {
                ClassificationMethod::Sign => self.classify_by_sign(),
                ClassificationMethod::CalibratedRange => {
                    self.classify_by_range(mean, mean_abs, model)
                }
            },
        };

        self.record_consensus(raw);

        if self.is_locked(signed_velocity, now_ms) {
            return self.decision(raw, method, None);
        }

        let change = self.evaluate_candidate(raw, angular_acceleration, now_ms);
        self.decision(raw, method, change)
    }

    fn decision(
        &self,
        raw: Option<Direction>,
        method: ClassificationMethod,
        change: Option<DirectionChange>,
    ) -> DirectionDecision {
        DirectionDecision {
            direction: self.state.current_direction,
            raw,
            method,
            change,
        }
    }

    fn current_method(&self) -> ClassificationMethod {
        if self.state.using_sign_method {
            ClassificationMethod::Sign
        } else {
            ClassificationMethod::CalibratedRange
        }
    }

    /// Hysteresis between the two methods; inside the band the method is kept
    fn update_method(&mut self, mean_abs: f64) {
        if self.state.using_sign_method && mean_abs >= self.config.method_switch_high_dps {
            self.state.using_sign_method = false;
            tracing::debug!(
                "[DirectionClassifier] Switching to calibrated-range method at {:.1} °/s",
                mean_abs
            );
        } else if !self.state.using_sign_method && mean_abs <= self.config.method_switch_low_dps {
            self.state.using_sign_method = true;
            tracing::debug!(
                "[DirectionClassifier] Switching to sign method at {:.1} °/s",
                mean_abs
            );
        }
    }

    /// Dead-zoned zeros count toward neither side, so a still hand reads as
    /// no consensus rather than counterclockwise
    fn classify_by_sign(&self) -> Option<Direction> {
        let count = self.velocities.len() as f64;
        let positive_ratio = self.velocities.iter().filter(|v| **v > 0.0).count() as f64 / count;
        let negative_ratio = self.velocities.iter().filter(|v| **v < 0.0).count() as f64 / count;

        if positive_ratio > self.config.sign_ratio_high {
            Some(Direction::Clockwise)
        } else if negative_ratio > 1.0 - self.config.sign_ratio_low {
            Some(Direction::Counterclockwise)
        } else {
            None
        }
    }

    fn classify_by_range(
        &self,
        mean: f64,
        mean_abs: f64,
        model: &CalibrationModel,
    ) -> Option<Direction> {
        let cw_distance = range_distance(mean, &model.clockwise);
        let ccw_distance = range_distance(mean, &model.counterclockwise);

        let (nearest, near, far) = if cw_distance <= ccw_distance {
            (Direction::Clockwise, cw_distance, ccw_distance)
        } else {
            (Direction::Counterclockwise, ccw_distance, cw_distance)
        };

        let ratio = far / near.max(0.1);
        if ratio >= self.required_ratio(mean_abs) {
            Some(nearest)
        } else {
            None
        }
    }

    /// Distance ratio demanded by the calibrated-range method at this speed
    pub fn required_ratio(&self, mean_abs: f64) -> f64 {
        if mean_abs < self.config.speed_band_low_dps {
            self.config.ratio_low_speed
        } else if mean_abs < self.config.speed_band_high_dps {
            self.config.ratio_mid_speed
        } else {
            self.config.ratio_high_speed
        }
    }

    /// Every full-ring classification is recorded, including "no consensus"
    fn record_consensus(&mut self, raw: Option<Direction>) {
        let capacity = self.config.consensus_frames.max(1);
        while self.state.consensus_history.len() >= capacity {
            self.state.consensus_history.pop_front();
        }
        self.state.consensus_history.push_back(raw);
    }

    /// Post-change lock, released early by a near-zero reading
    fn is_locked(&self, latest_velocity: f64, now_ms: i64) -> bool {
        let since_change = now_ms - self.state.last_change_at;
        since_change < self.config.change_lock_time_ms
            && latest_velocity.abs() >= self.config.zero_crossing_threshold_dps
    }

    fn evaluate_candidate(
        &mut self,
        raw: Option<Direction>,
        angular_acceleration: f64,
        now_ms: i64,
    ) -> Option<DirectionChange> {
        let candidate = match raw {
            Some(direction) if direction != self.state.current_direction => direction,
            _ => {
                self.state.clear_candidate();
                return None;
            }
        };

        if self.state.candidate_direction != Some(candidate) {
            self.state.candidate_direction = Some(candidate);
            self.state.candidate_since = Some(now_ms);
        }

        let since = self.state.candidate_since.unwrap_or(now_ms);
        if now_ms - since < self.required_stability(angular_acceleration) {
            return None;
        }

        if self.config.consensus_enabled && !self.has_consensus(candidate) {
            return None;
        }

        let change = DirectionChange {
            from: self.state.current_direction,
            to: candidate,
            at_ms: now_ms,
        };
        self.state.current_direction = candidate;
        self.state.last_change_at = now_ms;
        self.state.clear_candidate();

        tracing::info!(
            "[DirectionClassifier] Direction {} -> {} at {} ms",
            change.from.display_name(),
            change.to.display_name(),
            now_ms
        );
        Some(change)
    }

    /// Stability requirement, shortened while the wrist is accelerating hard
    fn required_stability(&self, angular_acceleration: f64) -> i64 {
        let base = self.config.stability_time_ms;
        if angular_acceleration.abs() > self.config.acceleration_threshold_dps2 {
            (base - self.config.predictive_bonus_ms).max(self.config.min_stability_ms)
        } else {
            base
        }
    }

    fn has_consensus(&self, candidate: Direction) -> bool {
        let frames = self.config.consensus_frames;
        let history = &self.state.consensus_history;
        history.len() >= frames
            && history
                .iter()
                .rev()
                .take(frames)
                .all(|raw| *raw == Some(candidate))
    }
}

fn usable_calibration(calibration: Option<&CalibrationModel>) -> Option<CalibrationModel> {
    match calibration {
        Some(model) if model.is_complete => Some(model.clone()),
        _ => {
            tracing::warn!(
                "[DirectionClassifier] No complete calibration; direction stays at its last known value"
            );
            None
        }
    }
}

/// 0 inside the range, otherwise the gap to its nearest edge
fn range_distance(value: f64, range: &RotationRange) -> f64 {
    if value < range.min {
        range.min - value
    } else if value > range.max {
        value - range.max
    } else {
        0.0
    }
}

#[cfg(test)]
#[path = "direction_tests.rs"]
mod tests;
