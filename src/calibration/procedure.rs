// CalibrationSession - three-phase capture workflow
//
// The session captures one phase at a time:
// 1. Rest: wrist still, stores |velocity| to estimate sensor noise
// 2. Clockwise: stores signed velocity while the user rotates clockwise
// 3. Counterclockwise: same for the opposite rotation
//
// Phases may be captured in any order and repeated. Stopping a phase before
// its minimum sample count returns an error and leaves the phase open so the
// caller can keep collecting or cancel.

use tokio::sync::broadcast;

use crate::calibration::progress::{
    CalibrationPhase, CalibrationProgress, CalibrationStatus, PhaseResult, PhaseStats,
};
use crate::calibration::state::{CalibrationModel, RestStats, RotationRange};
use crate::config::CalibrationConfig;
use crate::error::{log_calibration_error, CalibrationError};

/// One captured calibration sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapturedSample {
    pub timestamp_ms: i64,
    /// |velocity| for the rest phase, signed velocity otherwise
    pub velocity: f64,
}

/// Samples of the phase currently collecting
#[derive(Debug, Clone, Default)]
pub struct PhaseCapture {
    samples: Vec<CapturedSample>,
}

impl PhaseCapture {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[CapturedSample] {
        &self.samples
    }

    fn velocities(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.velocity).collect()
    }
}

#[derive(Debug, Clone)]
struct ActivePhase {
    phase: CalibrationPhase,
    started_at: i64,
    capture: PhaseCapture,
}

/// CalibrationSession manages phase capture and builds the CalibrationModel
pub struct CalibrationSession {
    config: CalibrationConfig,
    model: CalibrationModel,
    active: Option<ActivePhase>,
    progress_tx: Option<broadcast::Sender<CalibrationProgress>>,
}

impl CalibrationSession {
    /// Create a new session with an empty model
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            model: CalibrationModel::empty(),
            active: None,
            progress_tx: None,
        }
    }

    /// Publish progress events on `tx`
    pub fn with_progress_sender(mut self, tx: broadcast::Sender<CalibrationProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Replace the model with a persisted one after validating it
    pub fn load_model(&mut self, model: CalibrationModel) -> Result<(), CalibrationError> {
        model.validate(&self.config).inspect_err(|err| {
            log_calibration_error(err, "load_model");
        })?;
        self.model = model;
        Ok(())
    }

    pub fn model(&self) -> &CalibrationModel {
        &self.model
    }

    pub fn into_model(self) -> CalibrationModel {
        self.model
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn active_phase(&self) -> Option<CalibrationPhase> {
        self.active.as_ref().map(|a| a.phase)
    }

    /// Samples captured so far in the active phase
    pub fn captured(&self) -> Option<&PhaseCapture> {
        self.active.as_ref().map(|a| &a.capture)
    }

    /// Minimum samples the phase needs before it can stop
    pub fn required_samples(&self, phase: CalibrationPhase) -> usize {
        if phase.is_rotation() {
            self.config.min_samples_rotation
        } else {
            self.config.min_samples_rest
        }
    }

    /// Current progress of the active phase
    pub fn progress(&self) -> Option<CalibrationProgress> {
        self.active.as_ref().map(|a| {
            CalibrationProgress::new(
                a.phase,
                CalibrationStatus::Collecting,
                a.capture.len(),
                self.required_samples(a.phase),
            )
        })
    }

    /// Begin capturing `phase`; fails while another phase is collecting
    pub fn start_phase(
        &mut self,
        phase: CalibrationPhase,
        now_ms: i64,
    ) -> Result<(), CalibrationError> {
        if let Some(active) = &self.active {
            let err = CalibrationError::PhaseAlreadyActive {
                active: active.phase,
            };
            log_calibration_error(&err, "start_phase");
            return Err(err);
        }

        self.active = Some(ActivePhase {
            phase,
            started_at: now_ms,
            capture: PhaseCapture::default(),
        });

        tracing::info!(
            "[CalibrationSession] Phase {} started at {} ms",
            phase.display_name(),
            now_ms
        );
        self.emit(CalibrationProgress::new(
            phase,
            CalibrationStatus::Started,
            0,
            self.required_samples(phase),
        ));
        Ok(())
    }

    /// Start a phase identified by name (UI/CLI input)
    pub fn start_phase_named(&mut self, name: &str, now_ms: i64) -> Result<(), CalibrationError> {
        let phase = name.parse::<CalibrationPhase>().inspect_err(|err| {
            log_calibration_error(err, "start_phase");
        })?;
        self.start_phase(phase, now_ms)
    }

    /// Append a sample to the active phase
    ///
    /// # Returns
    /// * `true` - Sample captured
    /// * `false` - No phase collecting, or the velocity is not finite
    pub fn process_sample(&mut self, signed_velocity: f64, timestamp_ms: i64) -> bool {
        if !signed_velocity.is_finite() {
            tracing::debug!(
                "[CalibrationSession] Ignoring non-finite velocity {}",
                signed_velocity
            );
            return false;
        }

        let Some(active) = self.active.as_mut() else {
            return false;
        };

        let velocity = if active.phase.is_rotation() {
            signed_velocity
        } else {
            signed_velocity.abs()
        };
        active.capture.samples.push(CapturedSample {
            timestamp_ms,
            velocity,
        });

        let phase = active.phase;
        let collected = active.capture.len();
        self.emit(CalibrationProgress::new(
            phase,
            CalibrationStatus::Collecting,
            collected,
            self.required_samples(phase),
        ));
        true
    }

    /// Finish the active phase and store its statistics
    ///
    /// # Returns
    /// * `Ok(PhaseResult)` - Statistics stored in the model
    /// * `Err(InsufficientSamples)` - Phase stays open for more sampling
    /// * `Err(NoActivePhase)` - Nothing to stop
    pub fn stop_phase(&mut self, now_ms: i64) -> Result<PhaseResult, CalibrationError> {
        let (phase, collected, velocities) = match &self.active {
            Some(active) => (
                active.phase,
                active.capture.len(),
                active.capture.velocities(),
            ),
            None => {
                let err = CalibrationError::NoActivePhase;
                log_calibration_error(&err, "stop_phase");
                return Err(err);
            }
        };

        let required = self.required_samples(phase);
        if collected < required {
            let err = CalibrationError::InsufficientSamples {
                phase,
                required,
                collected,
            };
            self.report_error(phase, collected, &err);
            return Err(err);
        }

        let stats = if phase.is_rotation() {
            RotationRange::from_samples(&velocities).map(PhaseStats::Rotation)
        } else {
            RestStats::from_magnitudes(&velocities).map(PhaseStats::Rest)
        };
        let stats = match stats {
            Ok(stats) => stats,
            Err(err) => {
                self.report_error(phase, collected, &err);
                return Err(err);
            }
        };

        let started_at = self.active.take().map(|a| a.started_at).unwrap_or(now_ms);

        let mut ranges_swapped = false;
        match &stats {
            PhaseStats::Rest(rest) => self.model.store_rest(rest.clone()),
            PhaseStats::Rotation(range) => {
                self.model.store_rotation(phase, range.clone());
                ranges_swapped = self
                    .model
                    .apply_inversion_check(self.config.inversion_threshold_dps);
            }
        }

        let model_complete = self.model.finalize(&self.config, now_ms);

        tracing::info!(
            "[CalibrationSession] Phase {} stopped after {} ms with {} samples (complete={})",
            phase.display_name(),
            now_ms - started_at,
            collected,
            model_complete
        );

        if model_complete {
            if let Some(quality) = self.model.quality(self.config.min_separation_dps) {
                if quality.low_separation {
                    tracing::warn!(
                        "[CalibrationSession] Low separation between rotation ranges: {:.1} °/s (< {:.1})",
                        quality.separation,
                        self.config.min_separation_dps
                    );
                } else {
                    tracing::info!(
                        "[CalibrationSession] Calibration complete, separation {:.1} °/s",
                        quality.separation
                    );
                }
            }
        }

        let result = PhaseResult {
            phase,
            sample_count: collected,
            stats,
            ranges_swapped,
            model_complete,
        };
        self.emit(
            CalibrationProgress::new(phase, CalibrationStatus::Completed, collected, required)
                .with_result(result.clone()),
        );
        Ok(result)
    }

    /// Abandon the active phase, discarding its samples
    pub fn cancel_phase(&mut self) -> Result<CalibrationPhase, CalibrationError> {
        match self.active.take() {
            Some(active) => {
                tracing::info!(
                    "[CalibrationSession] Phase {} cancelled with {} samples",
                    active.phase.display_name(),
                    active.capture.len()
                );
                self.emit(CalibrationProgress::new(
                    active.phase,
                    CalibrationStatus::Cancelled,
                    active.capture.len(),
                    self.required_samples(active.phase),
                ));
                Ok(active.phase)
            }
            None => Err(CalibrationError::NoActivePhase),
        }
    }

    /// Discard every captured range and any active phase
    pub fn reset(&mut self) {
        if let Some(active) = self.active.take() {
            self.emit(CalibrationProgress::new(
                active.phase,
                CalibrationStatus::Cancelled,
                active.capture.len(),
                self.required_samples(active.phase),
            ));
        }
        self.model = CalibrationModel::empty();
        tracing::info!("[CalibrationSession] Calibration reset");
    }

    fn report_error(&self, phase: CalibrationPhase, collected: usize, err: &CalibrationError) {
        use crate::error::ErrorCode;

        log_calibration_error(err, "stop_phase");
        self.emit(
            CalibrationProgress::new(
                phase,
                CalibrationStatus::Error,
                collected,
                self.required_samples(phase),
            )
            .with_message(err.message()),
        );
    }

    fn emit(&self, progress: CalibrationProgress) {
        if let Some(tx) = &self.progress_tx {
            // No receivers is fine
            let _ = tx.send(progress);
        }
    }
}

#[cfg(test)]
#[path = "procedure_tests.rs"]
mod tests;
