//! GestureControlLoop: per-sample orchestration of the control engine.
//!
//! One loop instance owns every transient state object for one exercise
//! (analyzer, window, classifier, mapper, guard, volume controller). Samples
//! are processed synchronously in arrival order; the right channel drives
//! playback rate and direction, the left channel drives volume. Every
//! per-sample problem becomes a `ControlOutcome::Skipped` value, never an
//! error.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::analysis::{
    AngularVelocity, DirectionClassifier, DirectionState, ImuSample, PlaybackMapper,
    PlaybackState, RawImuFrame, RepositionEvent, RepositionState, RepositioningGuard,
    SampleAnalyzer, SlidingWindowBuffer, VolumeController, VolumeState, WindowStats,
};
use crate::api::{
    AudioSink, Channel, ControlOutcome, PlaybackCommand, SkipReason, VolumeCommand,
};
use crate::calibration::CalibrationModel;
use crate::config::EngineConfig;
use crate::engine::exercise::{spawn_duration_watchdog, ExerciseFlag};
use crate::error::{log_control_error, ControlError, ErrorCode};
use crate::telemetry::{ControlEvent, TelemetryCollector};

/// Last accepted timestamp per channel
#[derive(Debug, Clone, Copy, Default)]
struct ChannelTiming {
    last_timestamp: Option<i64>,
}

pub struct GestureControlLoop {
    config: EngineConfig,
    flag: ExerciseFlag,
    events: Arc<TelemetryCollector>,
    right: ChannelTiming,
    left: ChannelTiming,
    analyzer: SampleAnalyzer,
    window: SlidingWindowBuffer,
    classifier: DirectionClassifier,
    mapper: PlaybackMapper,
    guard: RepositioningGuard,
    volume: VolumeController,
}

impl GestureControlLoop {
    /// Build a loop from validated configuration
    ///
    /// `calibration` may be missing or incomplete (degraded operation), but
    /// a model with non-finite statistics is rejected.
    pub fn new(
        config: EngineConfig,
        calibration: Option<&CalibrationModel>,
        events: Arc<TelemetryCollector>,
    ) -> Result<Self, ControlError> {
        config.validate().inspect_err(|err| {
            log_control_error(err, "GestureControlLoop::new");
        })?;
        if let Some(model) = calibration {
            Self::check_calibration(model, &config)?;
        }

        let classifier = DirectionClassifier::new(config.direction.clone(), calibration, 0);
        let guard = RepositioningGuard::new(config.reposition.clone(), classifier.current_direction());

        Ok(Self {
            analyzer: SampleAnalyzer::new(config.analysis.acceleration_discontinuity_ms),
            window: SlidingWindowBuffer::new(config.analysis.sampling_window_ms),
            mapper: PlaybackMapper::new(config.playback.clone()),
            volume: VolumeController::new(config.volume.clone()),
            classifier,
            guard,
            right: ChannelTiming::default(),
            left: ChannelTiming::default(),
            flag: ExerciseFlag::new(),
            events,
            config,
        })
    }

    fn check_calibration(model: &CalibrationModel, config: &EngineConfig) -> Result<(), ControlError> {
        model.validate(&config.calibration).map_err(|err| {
            let err = ControlError::invalid_config("calibration", err.message());
            log_control_error(&err, "GestureControlLoop::new");
            err
        })
    }

    /// Replace the calibration model between or during exercises
    pub fn set_calibration(&mut self, model: Option<&CalibrationModel>) -> Result<(), ControlError> {
        if let Some(model) = model {
            Self::check_calibration(model, &self.config)?;
        }
        self.classifier.set_calibration(model);
        if self.classifier.is_degraded() && self.flag.is_active() {
            self.events.publish(ControlEvent::CalibrationDegraded);
        }
        Ok(())
    }

    /// Reset every transient state and mark the exercise active
    pub fn start_exercise(&mut self, now_ms: i64) {
        self.analyzer.reset();
        self.window.clear();
        self.classifier.reset(now_ms);
        self.mapper.reset();
        self.guard.reset(self.classifier.current_direction());
        self.volume.reset();
        self.right = ChannelTiming::default();
        self.left = ChannelTiming::default();

        let generation = self.flag.raise();
        tracing::info!(
            "[ControlLoop] Exercise {} started at {} ms",
            generation,
            now_ms
        );
        self.events.publish(ControlEvent::ExerciseStarted { at_ms: now_ms });

        if self.classifier.is_degraded() {
            tracing::warn!("[ControlLoop] Running without calibration; direction will not change");
            self.events.publish(ControlEvent::CalibrationDegraded);
        }
    }

    /// Stop the exercise; later samples are ignored
    pub fn stop_exercise(&mut self) -> Result<(), ControlError> {
        if !self.flag.lower() {
            return Err(ControlError::ExerciseInactive);
        }
        tracing::info!("[ControlLoop] Exercise stopped");
        self.events.publish(ControlEvent::ExerciseStopped);
        Ok(())
    }

    /// Start the duration watchdog for the running exercise
    pub fn spawn_watchdog(&self) -> JoinHandle<()> {
        spawn_duration_watchdog(
            self.flag.clone(),
            Duration::from_millis(self.config.control.exercise_duration_ms),
            Duration::from_millis(self.config.control.duration_check_interval_ms),
            Arc::clone(&self.events),
        )
    }

    pub fn is_active(&self) -> bool {
        self.flag.is_active()
    }

    pub fn exercise_flag(&self) -> ExerciseFlag {
        self.flag.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn events(&self) -> &Arc<TelemetryCollector> {
        &self.events
    }

    pub fn direction_state(&self) -> &DirectionState {
        self.classifier.state()
    }

    pub fn playback_state(&self) -> &PlaybackState {
        self.mapper.state()
    }

    pub fn reposition_state(&self) -> &RepositionState {
        self.guard.state()
    }

    pub fn volume_state(&self) -> &VolumeState {
        self.volume.state()
    }

    pub fn window_stats(&self) -> WindowStats {
        self.window.stats()
    }

    /// Normalize a transport frame and process it
    pub fn process_frame(
        &mut self,
        channel: Channel,
        frame: &RawImuFrame,
    ) -> Result<ControlOutcome, ControlError> {
        let sample = frame.to_sample(self.config.control.axis)?;
        Ok(self.process(channel, &sample))
    }

    /// Process one sample and dispatch any command to `sink`
    pub fn process_into<S: AudioSink + ?Sized>(
        &mut self,
        channel: Channel,
        sample: &ImuSample,
        sink: &mut S,
    ) -> ControlOutcome {
        let outcome = self.process(channel, sample);
        match outcome {
            ControlOutcome::Playback(command) => sink.apply_playback(command),
            ControlOutcome::Volume(command) => sink.apply_volume(command),
            ControlOutcome::Skipped { .. } => {}
        }
        outcome
    }

    /// Process one sample
    pub fn process(&mut self, channel: Channel, sample: &ImuSample) -> ControlOutcome {
        if !self.flag.is_active() {
            return ControlOutcome::skipped(SkipReason::Inactive);
        }

        let now_ms = sample.timestamp_ms;
        let last = match self.timing(channel).last_timestamp {
            Some(last) => last,
            None => {
                self.timing_mut(channel).last_timestamp = Some(now_ms);
                return ControlOutcome::skipped(SkipReason::FirstSample);
            }
        };

        let dt_ms = now_ms - last;
        if dt_ms < 0 {
            return self.resync(channel, now_ms, SkipReason::ClockReset);
        }
        if dt_ms < self.config.control.min_dt_ms {
            return ControlOutcome::skipped(SkipReason::DtTooSmall);
        }
        if dt_ms > self.config.control.max_dt_ms {
            return self.resync(channel, now_ms, SkipReason::Stale);
        }

        let velocity = SampleAnalyzer::velocity_from_gyro(sample);
        if velocity.magnitude > self.config.control.sanity_ceiling_dps {
            return self.resync(channel, now_ms, SkipReason::SanityCeiling);
        }

        self.timing_mut(channel).last_timestamp = Some(now_ms);
        match channel {
            Channel::Right => self.process_speed(velocity, now_ms),
            Channel::Left => self.process_volume(velocity, dt_ms, now_ms),
        }
    }

    fn process_speed(&mut self, velocity: AngularVelocity, now_ms: i64) -> ControlOutcome {
        let dead_zone = self.classifier.dynamic_dead_zone(velocity.magnitude);
        let velocity = if velocity.magnitude < dead_zone {
            AngularVelocity::ZERO
        } else {
            velocity
        };

        let acceleration = self.analyzer.angular_acceleration(velocity.signed, now_ms);
        let decision = self.classifier.classify(velocity.signed, acceleration, now_ms);
        if let Some(change) = decision.change {
            self.mapper.begin_transition(now_ms);
            self.events.publish(ControlEvent::DirectionChanged {
                from: change.from,
                to: change.to,
                method: decision.method,
                at_ms: change.at_ms,
            });
        }

        let reposition = self.guard.update(
            velocity.magnitude,
            now_ms,
            self.mapper.smoothed_rate(),
            self.classifier.current_direction(),
        );
        if let Some(event) = reposition {
            self.publish_reposition(event);
        }

        let stats = self.window.push(velocity.magnitude, now_ms);
        if !self.window.has_enough(self.config.analysis.min_window_samples) {
            return ControlOutcome::skipped(SkipReason::WarmingUp);
        }

        if let Some((rate, direction)) = self.guard.frozen_command() {
            return ControlOutcome::Playback(PlaybackCommand { rate, direction });
        }

        let update = self.mapper.update(stats.mean, stats.variance, now_ms);
        if let Some(snap) = update.snap {
            self.events.publish(ControlEvent::RateSnap {
                previous: snap.previous,
                current: snap.current,
                delta: snap.delta,
            });
        }

        ControlOutcome::Playback(PlaybackCommand {
            rate: update.rate,
            direction: self.classifier.current_direction(),
        })
    }

    fn process_volume(&mut self, velocity: AngularVelocity, dt_ms: i64, now_ms: i64) -> ControlOutcome {
        let update = self.volume.update(velocity.signed, dt_ms, now_ms);
        if update.emit {
            ControlOutcome::Volume(VolumeCommand {
                volume: update.volume,
            })
        } else {
            ControlOutcome::skipped(SkipReason::VolumeUnchanged)
        }
    }

    /// Drop the sample but restart timing from it
    fn resync(&mut self, channel: Channel, now_ms: i64, reason: SkipReason) -> ControlOutcome {
        self.timing_mut(channel).last_timestamp = Some(now_ms);
        if channel == Channel::Right {
            self.analyzer.reset();
        }
        if reason == SkipReason::ClockReset {
            self.rebase_clock(channel, now_ms);
        }
        tracing::debug!(
            "[ControlLoop] Dropped {} sample at {} ms: {:?}",
            channel.display_name(),
            now_ms,
            reason
        );
        self.events.publish(ControlEvent::SampleDropped {
            channel,
            reason,
            at_ms: now_ms,
        });
        ControlOutcome::skipped(reason)
    }

    /// Timestamps from before a clock restart must not outlive it
    fn rebase_clock(&mut self, channel: Channel, now_ms: i64) {
        tracing::warn!(
            "[ControlLoop] {} clock went backwards to {} ms; rebasing timing",
            channel.display_name(),
            now_ms
        );
        match channel {
            Channel::Right => {
                self.window.clear();
                self.classifier.rebase_clock(now_ms);
                self.mapper.rebase_clock();
                self.guard.rebase_clock(now_ms);
            }
            Channel::Left => self.volume.rebase_clock(),
        }
    }

    fn publish_reposition(&self, event: RepositionEvent) {
        let event = match event {
            RepositionEvent::Started { at_ms } => ControlEvent::RepositionStarted {
                at_ms,
                frozen_rate: self.guard.state().frozen_rate,
            },
            RepositionEvent::Ended { duration_ms } => ControlEvent::RepositionEnded { duration_ms },
            RepositionEvent::Cancelled { duration_ms } => {
                ControlEvent::RepositionCancelled { duration_ms }
            }
            RepositionEvent::TimedOut { duration_ms } => {
                ControlEvent::RepositionTimedOut { duration_ms }
            }
        };
        self.events.publish(event);
    }

    fn timing(&self, channel: Channel) -> &ChannelTiming {
        match channel {
            Channel::Right => &self.right,
            Channel::Left => &self.left,
        }
    }

    fn timing_mut(&mut self, channel: Channel) -> &mut ChannelTiming {
        match channel {
            Channel::Right => &mut self.right,
            Channel::Left => &mut self.left,
        }
    }
}
