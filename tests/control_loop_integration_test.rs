//! Integration tests for the gesture control loop
//!
//! These tests drive the public API end to end:
//! - Synthetic calibration followed by a clockwise burst
//! - Left-wrist volume hitting both hard stops
//! - Repositioning that runs past its timeout
//! - The exercise duration watchdog

use std::sync::Arc;

use gesture_playback::analysis::{Direction, ImuSample};
use gesture_playback::api::RecordingSink;
use gesture_playback::calibration::CalibrationSession;
use gesture_playback::fixtures::{CalibrationProfile, GesturePattern, GestureSpec};
use gesture_playback::{
    Channel, ControlEvent, ControlOutcome, EngineConfig, GestureControlLoop, SkipReason,
    TelemetryCollector,
};

fn calibrated_loop(config: EngineConfig) -> GestureControlLoop {
    let mut session = CalibrationSession::new(config.calibration.clone());
    let model = CalibrationProfile::default()
        .run(&mut session, 0)
        .expect("synthetic calibration");
    GestureControlLoop::new(config, Some(&model), Arc::new(TelemetryCollector::new(512, 512)))
        .expect("valid configuration")
}

fn constant(velocity: f64, from_ms: i64, count: i64) -> Vec<ImuSample> {
    (0..count)
        .map(|i| ImuSample::new(velocity, from_ms + i * 20).expect("finite sample"))
        .collect()
}

#[test]
fn test_clockwise_burst_after_calibration() {
    let mut control = calibrated_loop(EngineConfig::default());
    control.start_exercise(0);

    let mut sink = RecordingSink::new();
    for sample in GestureSpec::default().generate() {
        control.process_into(Channel::Right, &sample, &mut sink);
    }

    let last = sink.last_playback().expect("playback commands");
    assert_eq!(last.direction, Direction::Clockwise);
    assert!(
        (last.rate - 1.0).abs() < 0.05,
        "rate {} should settle near 1.0",
        last.rate
    );
    assert!(sink.volume.is_empty());
    assert_eq!(control.events().snapshot().direction_changes, 1);
}

#[test]
fn test_reversal_returns_to_counterclockwise() {
    let mut control = calibrated_loop(EngineConfig::default());
    control.start_exercise(0);

    let spec = GestureSpec {
        pattern: GesturePattern::Reversal,
        duration_ms: 4_000,
        ..GestureSpec::default()
    };
    let mut sink = RecordingSink::new();
    for sample in spec.generate() {
        control.process_into(Channel::Right, &sample, &mut sink);
    }

    let directions: Vec<_> = control
        .events()
        .snapshot()
        .recent
        .into_iter()
        .filter_map(|event| match event {
            ControlEvent::DirectionChanged { to, .. } => Some(to),
            _ => None,
        })
        .collect();
    assert_eq!(
        directions,
        vec![Direction::Clockwise, Direction::Counterclockwise]
    );
    assert_eq!(
        sink.last_playback().map(|command| command.direction),
        Some(Direction::Counterclockwise)
    );
}

#[test]
fn test_volume_clamps_at_both_stops() {
    let mut control = calibrated_loop(EngineConfig::default());
    control.start_exercise(0);

    let mut sink = RecordingSink::new();
    for sample in constant(90.0, 0, 300) {
        control.process_into(Channel::Left, &sample, &mut sink);
    }
    assert_eq!(control.volume_state().cumulative_angle_degrees, 90.0);
    assert_eq!(sink.last_volume().map(|command| command.volume), Some(1.0));

    for sample in constant(-90.0, 6_000, 300) {
        control.process_into(Channel::Left, &sample, &mut sink);
    }
    assert_eq!(control.volume_state().cumulative_angle_degrees, -90.0);
    assert_eq!(sink.last_volume().map(|command| command.volume), Some(0.0));

    assert!(sink
        .volume
        .iter()
        .all(|command| (0.0..=1.0).contains(&command.volume)));
    assert!(sink.playback.is_empty());
}

#[test]
fn test_reposition_timeout_releases_freeze() {
    let mut control = calibrated_loop(EngineConfig::default());
    control.start_exercise(0);

    for sample in constant(360.0, 0, 50) {
        control.process(Channel::Right, &sample);
    }

    // 3.5 s of stillness: frozen for 3 s, then released
    let mut last = None;
    for sample in constant(0.0, 1_000, 175) {
        last = Some(control.process(Channel::Right, &sample));
    }

    assert!(!control.reposition_state().is_repositioning);
    let snapshot = control.events().snapshot();
    assert_eq!(snapshot.reposition_timeouts, 1);
    assert!(snapshot
        .recent
        .iter()
        .any(|event| matches!(event, ControlEvent::RepositionTimedOut { .. })));

    let command = last
        .as_ref()
        .and_then(ControlOutcome::playback)
        .expect("playback after timeout");
    // The 4 s window still holds the last half second of motion
    assert!(command.rate < 0.5, "rate {} should decay", command.rate);
    assert_eq!(command.direction, Direction::Clockwise);
}

#[tokio::test]
async fn test_watchdog_ends_exercise() {
    let mut config = EngineConfig::default();
    config.control.exercise_duration_ms = 50;
    config.control.duration_check_interval_ms = 10;

    let mut control = calibrated_loop(config);
    control.start_exercise(0);
    let watchdog = control.spawn_watchdog();
    watchdog.await.expect("watchdog task");

    assert!(!control.is_active());
    assert_eq!(
        control
            .process(Channel::Right, &ImuSample::new(360.0, 0).expect("finite sample"))
            .skip_reason(),
        Some(SkipReason::Inactive)
    );
    assert!(control
        .events()
        .snapshot()
        .recent
        .iter()
        .any(|event| matches!(event, ControlEvent::ExerciseCompleted { .. })));
}
