use serde::{Deserialize, Serialize};

use crate::analysis::Direction;

/// Sensor channel: left wrist drives volume, right wrist drives speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    pub fn display_name(self) -> &'static str {
        match self {
            Channel::Left => "left",
            Channel::Right => "right",
        }
    }
}

/// Playback command for the audio collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackCommand {
    /// Clamped to [min_rate, max_rate]
    pub rate: f64,
    /// Serialized as -1 (clockwise) or +1 (counterclockwise)
    pub direction: Direction,
}

/// Volume command for the audio collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeCommand {
    /// In [0, 1]
    pub volume: f64,
}

/// Why a sample produced no command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Exercise not running
    Inactive,
    /// First sample on the channel only initializes timing
    FirstSample,
    /// dt below the minimum (duplicate timestamp)
    DtTooSmall,
    /// dt above the maximum; timing resynchronized
    Stale,
    /// Timestamp earlier than the previous one; timing resynchronized
    ClockReset,
    /// Magnitude above the sanity ceiling; timing resynchronized
    SanityCeiling,
    /// Sliding window has too few samples
    WarmingUp,
    /// Volume command suppressed by deduplication
    VolumeUnchanged,
}

impl SkipReason {
    /// Resynchronization cases that are reported as dropped samples
    pub fn is_resync(self) -> bool {
        matches!(
            self,
            SkipReason::Stale | SkipReason::ClockReset | SkipReason::SanityCeiling
        )
    }
}

/// Result of processing one sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ControlOutcome {
    Skipped { reason: SkipReason },
    Playback(PlaybackCommand),
    Volume(VolumeCommand),
}

impl ControlOutcome {
    pub fn skipped(reason: SkipReason) -> Self {
        ControlOutcome::Skipped { reason }
    }

    pub fn playback(&self) -> Option<PlaybackCommand> {
        match self {
            ControlOutcome::Playback(command) => Some(*command),
            _ => None,
        }
    }

    pub fn volume(&self) -> Option<VolumeCommand> {
        match self {
            ControlOutcome::Volume(command) => Some(*command),
            _ => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            ControlOutcome::Skipped { reason } => Some(*reason),
            _ => None,
        }
    }
}
