// Analysis module - per-sample signal pipeline
//
// Leaf components driven by the control loop, in data-flow order:
// - SampleAnalyzer: velocity, magnitude, angular acceleration
// - SlidingWindowBuffer: time-windowed mean/variance/acceleration
// - DirectionClassifier: hybrid sign/calibrated-range direction decision
// - RepositioningGuard: velocity-collapse detection and freeze
// - PlaybackMapper: speed to playback rate with adaptive smoothing
// - VolumeController: potentiometer model for the secondary channel
//
// None of these block, allocate per sample beyond their bounded buffers, or
// touch shared state; the control loop owns them exclusively.

pub mod direction;
pub mod playback;
pub mod reposition;
pub mod sample;
pub mod volume;
pub mod window;

pub use direction::{
    ClassificationMethod, Direction, DirectionChange, DirectionClassifier, DirectionDecision,
    DirectionState,
};
pub use playback::{PlaybackMapper, PlaybackState, PlaybackUpdate, RateSnap};
pub use reposition::{RepositionEvent, RepositionState, RepositioningGuard};
pub use sample::{AngularVelocity, ImuSample, RawImuFrame, SampleAnalyzer, SensorAxis};
pub use volume::{VolumeController, VolumeState, VolumeUpdate};
pub use window::{SlidingWindowBuffer, WindowStats};
