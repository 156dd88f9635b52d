// RepositioningGuard - detects the hand pausing to re-grip
//
// A collapse of rotation speed below the threshold starts a repositioning
// episode and freezes the current rate and direction. Recovery ends it
// (or cancels it when it was too short to matter). Episodes that never
// recover are force-ended after max_duration_ms.

use serde::{Deserialize, Serialize};

use crate::analysis::direction::Direction;
use crate::config::RepositionConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct RepositionState {
    pub is_repositioning: bool,
    pub started_at: Option<i64>,
    pub frozen_rate: f64,
    pub frozen_direction: Direction,
}

impl RepositionState {
    pub fn reset(direction: Direction) -> Self {
        Self {
            is_repositioning: false,
            started_at: None,
            frozen_rate: 1.0,
            frozen_direction: direction,
        }
    }
}

/// Repositioning lifecycle transitions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepositionEvent {
    Started { at_ms: i64 },
    /// Recovered after at least min_duration_ms
    Ended { duration_ms: i64 },
    /// Recovered too quickly; treated as noise
    Cancelled { duration_ms: i64 },
    /// Forced exit after max_duration_ms
    TimedOut { duration_ms: i64 },
}

pub struct RepositioningGuard {
    config: RepositionConfig,
    state: RepositionState,
    /// Set at reset and by a timeout; entry waits for one reading at/above
    /// threshold, so a hand that has not moved yet is never frozen
    awaiting_recovery: bool,
}

impl RepositioningGuard {
    pub fn new(config: RepositionConfig, direction: Direction) -> Self {
        Self {
            config,
            state: RepositionState::reset(direction),
            awaiting_recovery: true,
        }
    }

    pub fn reset(&mut self, direction: Direction) {
        self.state = RepositionState::reset(direction);
        self.awaiting_recovery = true;
    }

    /// Restart an open episode's timer on a restarted clock
    pub fn rebase_clock(&mut self, now_ms: i64) {
        if self.state.is_repositioning {
            self.state.started_at = Some(now_ms);
        }
    }

    pub fn state(&self) -> &RepositionState {
        &self.state
    }

    pub fn is_repositioning(&self) -> bool {
        self.state.is_repositioning
    }

    /// Frozen (rate, direction) while repositioning with the freeze policy on
    pub fn frozen_command(&self) -> Option<(f64, Direction)> {
        if self.state.is_repositioning && self.config.freeze_enabled {
            Some((self.state.frozen_rate, self.state.frozen_direction))
        } else {
            None
        }
    }

    /// Feed the current magnitude; `current_rate`/`direction` are what gets
    /// frozen if an episode starts on this sample
    pub fn update(
        &mut self,
        magnitude: f64,
        now_ms: i64,
        current_rate: f64,
        direction: Direction,
    ) -> Option<RepositionEvent> {
        let recovered = magnitude >= self.config.threshold_dps;

        if self.state.is_repositioning {
            let started_at = self.state.started_at.unwrap_or(now_ms);
            let duration_ms = now_ms - started_at;

            if duration_ms > self.config.max_duration_ms {
                self.exit();
                self.awaiting_recovery = !recovered;
                tracing::warn!(
                    "[RepositioningGuard] Repositioning timed out after {} ms",
                    duration_ms
                );
                return Some(RepositionEvent::TimedOut { duration_ms });
            }

            if recovered {
                self.exit();
                if duration_ms >= self.config.min_duration_ms {
                    tracing::info!(
                        "[RepositioningGuard] Repositioning ended after {} ms",
                        duration_ms
                    );
                    return Some(RepositionEvent::Ended { duration_ms });
                }
                tracing::debug!(
                    "[RepositioningGuard] Short dip of {} ms ignored",
                    duration_ms
                );
                return Some(RepositionEvent::Cancelled { duration_ms });
            }
            return None;
        }

        if self.awaiting_recovery {
            if recovered {
                self.awaiting_recovery = false;
            }
            return None;
        }

        if !recovered {
            self.state.is_repositioning = true;
            self.state.started_at = Some(now_ms);
            self.state.frozen_rate = current_rate;
            self.state.frozen_direction = direction;
            tracing::info!(
                "[RepositioningGuard] Repositioning started at {} ms (frozen rate {:.3})",
                now_ms,
                current_rate
            );
            return Some(RepositionEvent::Started { at_ms: now_ms });
        }

        None
    }

    fn exit(&mut self) {
        self.state.is_repositioning = false;
        self.state.started_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Guard that has already seen motion at -20 ms
    fn guard() -> RepositioningGuard {
        let mut guard =
            RepositioningGuard::new(RepositionConfig::default(), Direction::Counterclockwise);
        assert_eq!(guard.update(100.0, -20, 1.0, Direction::Counterclockwise), None);
        guard
    }

    #[test]
    fn test_still_hand_before_motion_is_not_frozen() {
        let mut guard =
            RepositioningGuard::new(RepositionConfig::default(), Direction::Counterclockwise);
        for i in 0..10 {
            assert_eq!(guard.update(0.0, i * 20, 1.0, Direction::Counterclockwise), None);
        }
        assert!(guard.frozen_command().is_none());

        assert_eq!(guard.update(60.0, 200, 0.4, Direction::Counterclockwise), None);
        assert_eq!(
            guard.update(0.0, 220, 0.4, Direction::Counterclockwise),
            Some(RepositionEvent::Started { at_ms: 220 })
        );

        guard.reset(Direction::Counterclockwise);
        assert_eq!(guard.update(0.0, 240, 0.4, Direction::Counterclockwise), None);
    }

    #[test]
    fn test_enters_and_freezes_on_collapse() {
        let mut guard = guard();
        assert_eq!(guard.update(200.0, 0, 1.2, Direction::Clockwise), None);

        let event = guard.update(5.0, 20, 1.2, Direction::Clockwise);
        assert_eq!(event, Some(RepositionEvent::Started { at_ms: 20 }));
        assert!(guard.is_repositioning());
        assert_eq!(guard.frozen_command(), Some((1.2, Direction::Clockwise)));

        // Frozen values do not follow later inputs
        guard.update(5.0, 40, 0.1, Direction::Counterclockwise);
        assert_eq!(guard.frozen_command(), Some((1.2, Direction::Clockwise)));
    }

    #[test]
    fn test_ends_after_minimum_duration() {
        let mut guard = guard();
        guard.update(5.0, 0, 1.0, Direction::Clockwise);
        let event = guard.update(100.0, 200, 1.0, Direction::Clockwise);
        assert_eq!(event, Some(RepositionEvent::Ended { duration_ms: 200 }));
        assert!(!guard.is_repositioning());
        assert!(guard.frozen_command().is_none());
    }

    #[test]
    fn test_short_dip_is_cancelled() {
        let mut guard = guard();
        guard.update(5.0, 0, 1.0, Direction::Clockwise);
        let event = guard.update(100.0, 60, 1.0, Direction::Clockwise);
        assert_eq!(event, Some(RepositionEvent::Cancelled { duration_ms: 60 }));
        assert!(!guard.is_repositioning());
    }

    #[test]
    fn test_timeout_forces_exit_without_recovery() {
        let mut guard = guard();
        let mut events = Vec::new();
        for i in 0..=200 {
            if let Some(event) = guard.update(1.0, i * 20, 1.0, Direction::Clockwise) {
                events.push(event);
            }
        }

        assert_eq!(events[0], RepositionEvent::Started { at_ms: 0 });
        assert_eq!(events[1], RepositionEvent::TimedOut { duration_ms: 3_020 });
        // Still below threshold: no re-entry until magnitude recovers
        assert_eq!(events.len(), 2);
        assert!(!guard.is_repositioning());
    }

    #[test]
    fn test_reentry_after_timeout_requires_recovery() {
        let mut guard = guard();
        guard.update(1.0, 0, 1.0, Direction::Clockwise);
        guard.update(1.0, 3_100, 1.0, Direction::Clockwise);
        assert!(!guard.is_repositioning());

        assert_eq!(guard.update(100.0, 3_120, 1.0, Direction::Clockwise), None);
        assert_eq!(
            guard.update(1.0, 3_140, 1.0, Direction::Clockwise),
            Some(RepositionEvent::Started { at_ms: 3_140 })
        );
    }

    #[test]
    fn test_freeze_disabled_yields_no_frozen_command() {
        let config = RepositionConfig {
            freeze_enabled: false,
            ..RepositionConfig::default()
        };
        let mut guard = RepositioningGuard::new(config, Direction::Clockwise);
        guard.update(100.0, -20, 1.0, Direction::Clockwise);
        guard.update(1.0, 0, 1.0, Direction::Clockwise);
        assert!(guard.is_repositioning());
        assert!(guard.frozen_command().is_none());
    }
}
