// PlaybackMapper - average rotation speed to playback rate
//
// target = clamp(avg / reference_speed, min_rate, max_rate), damped for a
// short while after every committed direction change, then smoothed with an
// EMA whose damping grows with the window variance.

use serde::{Deserialize, Serialize};

use crate::config::PlaybackConfig;

/// Transient playback state, reset at exercise start
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    /// Always within [min_rate, max_rate]
    pub smoothed_rate: f64,
    pub in_transition: bool,
    pub transition_started_at: i64,
    pub variance_estimate: f64,
}

impl PlaybackState {
    /// Fresh state at normal speed, clamped to the configured bounds
    pub fn reset(config: &PlaybackConfig) -> Self {
        Self {
            smoothed_rate: 1.0_f64.clamp(config.min_rate, config.max_rate),
            in_transition: false,
            transition_started_at: 0,
            variance_estimate: 0.0,
        }
    }
}

/// Consecutive smoothed rates jumped by more than the snap threshold
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateSnap {
    pub previous: f64,
    pub current: f64,
    pub delta: f64,
}

/// Result of one mapper step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackUpdate {
    pub rate: f64,
    /// Target after clamping and transition damping
    pub target: f64,
    /// Weight kept from the previous smoothed rate
    pub smoothing_factor: f64,
    pub snap: Option<RateSnap>,
}

pub struct PlaybackMapper {
    config: PlaybackConfig,
    state: PlaybackState,
}

impl PlaybackMapper {
    pub fn new(config: PlaybackConfig) -> Self {
        let state = PlaybackState::reset(&config);
        Self { config, state }
    }

    pub fn reset(&mut self) {
        self.state = PlaybackState::reset(&self.config);
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn smoothed_rate(&self) -> f64 {
        self.state.smoothed_rate
    }

    /// Drop transition damping whose start belongs to an earlier clock
    pub fn rebase_clock(&mut self) {
        self.state.in_transition = false;
    }

    /// Linear speed-to-rate mapping, clamped
    pub fn target_rate(&self, average_velocity: f64) -> f64 {
        (average_velocity / self.config.reference_speed_dps)
            .clamp(self.config.min_rate, self.config.max_rate)
    }

    /// Start transition damping after a committed direction change
    pub fn begin_transition(&mut self, now_ms: i64) {
        self.state.in_transition = true;
        self.state.transition_started_at = now_ms;
    }

    /// Smoothing factor interpolated between base and max by variance
    pub fn smoothing_factor(&self, variance: f64) -> f64 {
        let normalized = if self.config.variance_threshold > 0.0 {
            (variance / self.config.variance_threshold).clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.config.smoothing_base
            + (self.config.smoothing_max - self.config.smoothing_base) * normalized
    }

    /// One mapping step from the window's average speed and variance
    pub fn update(&mut self, average_velocity: f64, variance: f64, now_ms: i64) -> PlaybackUpdate {
        let mut target = self.target_rate(average_velocity);

        if self.state.in_transition {
            if now_ms - self.state.transition_started_at < self.config.transition_duration_ms {
                target = (target * self.config.transition_damping)
                    .clamp(self.config.min_rate, self.config.max_rate);
            } else {
                self.state.in_transition = false;
            }
        }

        self.state.variance_estimate = variance;
        let factor = self.smoothing_factor(variance);
        let alpha = 1.0 - factor;

        let previous = self.state.smoothed_rate;
        let smoothed = previous * (1.0 - alpha) + target * alpha;
        let smoothed = ((smoothed * 10_000.0).round() / 10_000.0)
            .clamp(self.config.min_rate, self.config.max_rate);
        self.state.smoothed_rate = smoothed;

        let delta = (smoothed - previous).abs();
        let snap = if delta > self.config.snap_threshold {
            tracing::debug!(
                "[PlaybackMapper] Rate snap {:.3} -> {:.3} (delta {:.3})",
                previous,
                smoothed,
                delta
            );
            Some(RateSnap {
                previous,
                current: smoothed,
                delta,
            })
        } else {
            None
        };

        PlaybackUpdate {
            rate: smoothed,
            target,
            smoothing_factor: factor,
            snap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> PlaybackMapper {
        PlaybackMapper::new(PlaybackConfig::default())
    }

    #[test]
    fn test_target_rate_at_reference_speed_is_one() {
        let mapper = mapper();
        assert_eq!(mapper.target_rate(360.0), 1.0);
        assert_eq!(mapper.target_rate(180.0), 0.5);
        assert_eq!(mapper.target_rate(5_000.0), 3.0);
        assert_eq!(mapper.target_rate(-10.0), 0.0);
    }

    #[test]
    fn test_fresh_state() {
        let mapper = mapper();
        assert_eq!(mapper.smoothed_rate(), 1.0);
        assert!(!mapper.state().in_transition);
    }

    #[test]
    fn test_smoothing_factor_tracks_variance() {
        let mapper = mapper();
        assert!((mapper.smoothing_factor(0.0) - 0.3).abs() < 1e-12);
        assert!((mapper.smoothing_factor(1_250.0) - 0.55).abs() < 1e-12);
        assert!((mapper.smoothing_factor(1e9) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_converges_monotonically_toward_target() {
        let mut mapper = mapper();
        let mut previous = mapper.smoothed_rate();
        for i in 0..40 {
            let update = mapper.update(180.0, 0.0, i * 20);
            assert!(update.rate <= previous);
            assert!(update.rate >= 0.5);
            previous = update.rate;
        }
        assert!((previous - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_steady_reference_speed_holds_one() {
        let mut mapper = mapper();
        for i in 0..10 {
            let update = mapper.update(360.0, 0.0, i * 20);
            assert_eq!(update.rate, 1.0);
            assert!(update.snap.is_none());
        }
    }

    #[test]
    fn test_rate_is_rounded() {
        let mut mapper = mapper();
        let update = mapper.update(100.0, 0.0, 0);
        let scaled = update.rate * 10_000.0;
        assert!((scaled - scaled.round()).abs() < 1e-6);
    }

    #[test]
    fn test_transition_damping_then_release() {
        let mut mapper = mapper();
        mapper.begin_transition(1_000);

        let damped = mapper.update(360.0, 0.0, 1_050);
        assert!((damped.target - 0.6).abs() < 1e-12);
        assert!(mapper.state().in_transition);

        let released = mapper.update(360.0, 0.0, 1_200);
        assert_eq!(released.target, 1.0);
        assert!(!mapper.state().in_transition);
    }

    #[test]
    fn test_snap_is_reported_without_altering_rate() {
        let mut mapper = mapper();
        // 1.0 -> target 3.0 with alpha 0.7 moves by 1.4
        let update = mapper.update(2_000.0, 0.0, 0);
        let snap = update.snap.unwrap();
        assert_eq!(snap.previous, 1.0);
        assert_eq!(snap.current, update.rate);
        assert!((update.rate - 2.4).abs() < 1e-9);
    }

    #[test]
    fn test_high_variance_damps_response() {
        let mut calm = mapper();
        let mut noisy = mapper();
        let calm_rate = calm.update(720.0, 0.0, 0).rate;
        let noisy_rate = noisy.update(720.0, 10_000.0, 0).rate;
        assert!(calm_rate > noisy_rate);
        assert!(noisy_rate > 1.0);
        assert!((noisy.state().variance_estimate - 10_000.0).abs() < 1e-12);
    }

    #[test]
    fn test_reset_restores_fresh_state() {
        let mut mapper = mapper();
        mapper.begin_transition(0);
        mapper.update(50.0, 100.0, 10);
        mapper.reset();
        assert_eq!(mapper.state(), &PlaybackState::reset(&PlaybackConfig::default()));
    }
}
