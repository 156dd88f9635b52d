// Calibration persistence
//
// The engine never decides where calibration lives; it talks to a
// CalibrationRepository. The JSON file repository is what the CLI uses, the
// in-memory one backs tests and embedders that persist elsewhere.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::calibration::state::CalibrationModel;
use crate::config::CalibrationConfig;
use crate::error::{log_calibration_error, CalibrationError};

/// Load/save collaborator for the calibration model
pub trait CalibrationRepository: Send + Sync {
    /// Load the stored model, `Ok(None)` when nothing has been saved yet
    fn load(&self) -> Result<Option<CalibrationModel>, CalibrationError>;

    fn save(&self, model: &CalibrationModel) -> Result<(), CalibrationError>;

    fn clear(&self) -> Result<(), CalibrationError>;
}

/// Validate a model read from storage; errors are logged
pub fn validate_loaded(
    model: CalibrationModel,
    config: &CalibrationConfig,
) -> Result<CalibrationModel, CalibrationError> {
    model.validate(config).inspect_err(|err| {
        log_calibration_error(err, "load");
    })?;
    Ok(model)
}

/// Stores the model as pretty JSON (camelCase keys) at a fixed path
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CalibrationRepository for JsonFileRepository {
    fn load(&self) -> Result<Option<CalibrationModel>, CalibrationError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path)?;
        let model: CalibrationModel = serde_json::from_str(&contents)?;
        tracing::info!(
            "[CalibrationStore] Loaded calibration from {} (complete={})",
            self.path.display(),
            model.is_complete
        );
        Ok(Some(model))
    }

    fn save(&self, model: &CalibrationModel) -> Result<(), CalibrationError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(model)?;
        fs::write(&self.path, json)?;
        tracing::info!(
            "[CalibrationStore] Saved calibration to {}",
            self.path.display()
        );
        Ok(())
    }

    fn clear(&self) -> Result<(), CalibrationError> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Keeps the model in memory
#[derive(Default)]
pub struct InMemoryRepository {
    model: Mutex<Option<CalibrationModel>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CalibrationRepository for InMemoryRepository {
    fn load(&self) -> Result<Option<CalibrationModel>, CalibrationError> {
        Ok(self
            .model
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, model: &CalibrationModel) -> Result<(), CalibrationError> {
        *self.model.lock().unwrap_or_else(PoisonError::into_inner) = Some(model.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), CalibrationError> {
        *self.model.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
