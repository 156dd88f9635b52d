// VolumeController - potentiometer model for the secondary channel
//
// Angular velocity is integrated into a cumulative angle with hard stops at
// ±limit, so the sensor's wrapping Euler angle is never used. The angle maps
// linearly onto [0, 1] with 0° at half volume.

use crate::config::VolumeConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct VolumeState {
    /// Always within ±limit_degrees
    pub cumulative_angle_degrees: f64,
    pub smoothed_volume: f64,
    pub last_known_volume: f64,
    pub last_sent_volume: Option<f64>,
    pub last_sent_at: Option<i64>,
}

impl VolumeState {
    pub fn reset() -> Self {
        Self {
            cumulative_angle_degrees: 0.0,
            smoothed_volume: 0.5,
            last_known_volume: 0.5,
            last_sent_volume: None,
            last_sent_at: None,
        }
    }
}

/// Volume after one integration step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeUpdate {
    pub volume: f64,
    pub angle_degrees: f64,
    /// False when deduplication suppressed the command
    pub emit: bool,
}

pub struct VolumeController {
    config: VolumeConfig,
    state: VolumeState,
}

impl VolumeController {
    pub fn new(config: VolumeConfig) -> Self {
        Self {
            config,
            state: VolumeState::reset(),
        }
    }

    pub fn reset(&mut self) {
        self.state = VolumeState::reset();
    }

    /// Forget the last emission time so the next update is sent
    pub fn rebase_clock(&mut self) {
        self.state.last_sent_at = None;
    }

    pub fn state(&self) -> &VolumeState {
        &self.state
    }

    /// Linear angle-to-volume map; `None` outside ±limit
    pub fn angle_to_volume(&self, angle_degrees: f64) -> Option<f64> {
        let limit = self.config.limit_degrees;
        if !angle_degrees.is_finite() || angle_degrees.abs() > limit {
            return None;
        }
        Some(0.5 + 0.5 * angle_degrees / limit)
    }

    /// Integrate one sample over `dt_ms` and decide whether to emit
    pub fn update(&mut self, angular_velocity: f64, dt_ms: i64, now_ms: i64) -> VolumeUpdate {
        let mut velocity = if self.config.invert {
            -angular_velocity
        } else {
            angular_velocity
        };
        if velocity.abs() < self.config.gyro_dead_zone_dps {
            velocity = 0.0;
        }

        let limit = self.config.limit_degrees;
        let dt_s = dt_ms.max(0) as f64 / 1000.0;
        let angle = (self.state.cumulative_angle_degrees + velocity * dt_s).clamp(-limit, limit);
        self.state.cumulative_angle_degrees = angle;

        let raw = self
            .angle_to_volume(angle)
            .unwrap_or(self.state.last_known_volume);
        self.state.last_known_volume = raw;

        let alpha = self.config.smoothing_factor;
        let mut smoothed = self.state.smoothed_volume * (1.0 - alpha) + raw * alpha;
        if angle >= limit - self.config.snap_threshold_degrees {
            smoothed = 1.0;
        } else if angle <= -limit + self.config.snap_threshold_degrees {
            smoothed = 0.0;
        }
        let smoothed = smoothed.clamp(0.0, 1.0);
        self.state.smoothed_volume = smoothed;

        let emit = self.should_emit(smoothed, now_ms);
        if emit {
            self.state.last_sent_volume = Some(smoothed);
            self.state.last_sent_at = Some(now_ms);
            tracing::trace!(
                "[VolumeController] Volume {:.3} at angle {:.1}°",
                smoothed,
                angle
            );
        }

        VolumeUpdate {
            volume: smoothed,
            angle_degrees: angle,
            emit,
        }
    }

    fn should_emit(&self, volume: f64, now_ms: i64) -> bool {
        match (self.state.last_sent_volume, self.state.last_sent_at) {
            (Some(last), Some(at)) => {
                let small_change = (volume - last).abs() < self.config.dedup_min_delta;
                let too_soon = now_ms - at < self.config.dedup_min_interval_ms;
                !(small_change && too_soon)
            }
            _ => true,
        }
    }
}
