// Calibration module - per-user rotation calibration
//
// This module provides three components:
// 1. CalibrationSession: phase-by-phase capture workflow
// 2. CalibrationModel: rest noise plus clockwise/counterclockwise ranges
// 3. CalibrationRepository: persistence collaborator
//
// The calibration workflow:
// 1. Create CalibrationSession
// 2. Capture REST (20+ samples), CLOCKWISE and COUNTERCLOCKWISE (30+ each)
// 3. Hand the complete model to the control loop and the repository

pub mod procedure;
pub mod progress;
pub mod state;
pub mod storage;

pub use procedure::{CalibrationSession, CapturedSample, PhaseCapture};
pub use progress::{
    CalibrationPhase, CalibrationProgress, CalibrationStatus, PhaseResult, PhaseStats,
};
pub use state::{CalibrationModel, CalibrationQuality, RestStats, RotationRange};
pub use storage::{validate_loaded, CalibrationRepository, InMemoryRepository, JsonFileRepository};
