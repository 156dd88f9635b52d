// Public collaborator surface
//
// Command/outcome types exchanged with the transport and audio layers, and
// the AudioSink seam the control loop dispatches commands through.

mod types;

pub use types::{Channel, ControlOutcome, PlaybackCommand, SkipReason, VolumeCommand};

/// Audio-playback collaborator
///
/// Called synchronously from the sample path, so implementations must not
/// block.
pub trait AudioSink {
    fn apply_playback(&mut self, command: PlaybackCommand);

    fn apply_volume(&mut self, command: VolumeCommand);
}

/// Sink that records every command, for tests and the CLI harness
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub playback: Vec<PlaybackCommand>,
    pub volume: Vec<VolumeCommand>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_playback(&self) -> Option<PlaybackCommand> {
        self.playback.last().copied()
    }

    pub fn last_volume(&self) -> Option<VolumeCommand> {
        self.volume.last().copied()
    }
}

impl AudioSink for RecordingSink {
    fn apply_playback(&mut self, command: PlaybackCommand) {
        self.playback.push(command);
    }

    fn apply_volume(&mut self, command: VolumeCommand) {
        self.volume.push(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Direction;

    #[test]
    fn test_recording_sink_keeps_order() {
        let mut sink = RecordingSink::new();
        sink.apply_playback(PlaybackCommand {
            rate: 0.5,
            direction: Direction::Counterclockwise,
        });
        sink.apply_playback(PlaybackCommand {
            rate: 1.0,
            direction: Direction::Clockwise,
        });
        sink.apply_volume(VolumeCommand { volume: 0.7 });

        assert_eq!(sink.playback.len(), 2);
        assert_eq!(sink.last_playback().unwrap().rate, 1.0);
        assert_eq!(sink.last_volume(), Some(VolumeCommand { volume: 0.7 }));
    }

    #[test]
    fn test_playback_command_wire_shape() {
        let command = PlaybackCommand {
            rate: 1.25,
            direction: Direction::Clockwise,
        };
        let json = serde_json::to_string(&command).unwrap();
        assert_eq!(json, r#"{"rate":1.25,"direction":-1}"#);
    }

    #[test]
    fn test_outcome_accessors() {
        let skipped = ControlOutcome::skipped(SkipReason::Stale);
        assert_eq!(skipped.skip_reason(), Some(SkipReason::Stale));
        assert!(skipped.playback().is_none());
        assert!(SkipReason::Stale.is_resync());
        assert!(SkipReason::ClockReset.is_resync());
        assert!(!SkipReason::WarmingUp.is_resync());

        let json = serde_json::to_string(&skipped).unwrap();
        assert_eq!(json, r#"{"outcome":"skipped","reason":"stale"}"#);
    }
}
