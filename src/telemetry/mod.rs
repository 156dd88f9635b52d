//! Control event collector.
//!
//! The collector fans control events out over a broadcast channel and keeps
//! a bounded history plus a few counters for CLI/test reporting. It is owned
//! by whoever drives the control loop and shared with the watchdog via `Arc`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

pub mod events;

pub use events::ControlEvent;

/// Snapshot of collector state for CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<ControlEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
    pub direction_changes: u64,
    pub dropped_samples: u64,
    pub reposition_timeouts: u64,
}

/// Broadcast-based collector retaining a bounded history of control events.
pub struct TelemetryCollector {
    tx: broadcast::Sender<ControlEvent>,
    history: Mutex<VecDeque<ControlEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
    direction_changes: AtomicU64,
    dropped_samples: AtomicU64,
    reposition_timeouts: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
            direction_changes: AtomicU64::new(0),
            dropped_samples: AtomicU64::new(0),
            reposition_timeouts: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: ControlEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        match &event {
            ControlEvent::DirectionChanged { .. } => {
                self.direction_changes.fetch_add(1, Ordering::Relaxed);
            }
            ControlEvent::SampleDropped { .. } => {
                self.dropped_samples.fetch_add(1, Ordering::Relaxed);
            }
            ControlEvent::RepositionTimedOut { .. } => {
                self.reposition_timeouts.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        }

        if self.history_capacity > 0 {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlEvent> {
        self.tx.subscribe()
    }

    /// Event stream for async consumers; lagged gaps are skipped.
    pub fn event_stream(&self) -> impl Stream<Item = ControlEvent> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).filter_map(|result| async move {
            match result {
                Ok(event) => Some(event),
                Err(err) => {
                    tracing::debug!("[Telemetry] Event stream lagged: {}", err);
                    None
                }
            }
        })
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        TelemetrySnapshot {
            recent: history.iter().cloned().collect(),
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
            direction_changes: self.direction_changes.load(Ordering::Relaxed),
            dropped_samples: self.dropped_samples.load(Ordering::Relaxed),
            reposition_timeouts: self.reposition_timeouts.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ClassificationMethod, Direction};
    use crate::api::{Channel, SkipReason};

    fn direction_changed(at_ms: i64) -> ControlEvent {
        ControlEvent::DirectionChanged {
            from: Direction::Counterclockwise,
            to: Direction::Clockwise,
            method: ClassificationMethod::Sign,
            at_ms,
        }
    }

    #[test]
    fn collector_preserves_order_within_history() {
        let collector = TelemetryCollector::new(8, 3);
        collector.publish(ControlEvent::ExerciseStarted { at_ms: 0 });
        collector.publish(direction_changed(460));
        collector.publish(ControlEvent::ExerciseStopped);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 3);
        assert!(matches!(
            snapshot.recent[0],
            ControlEvent::ExerciseStarted { at_ms: 0 }
        ));
        assert!(matches!(snapshot.recent[2], ControlEvent::ExerciseStopped));
        assert_eq!(snapshot.direction_changes, 1);
    }

    #[test]
    fn collector_drops_history_when_full() {
        let collector = TelemetryCollector::new(8, 2);
        collector.publish(direction_changed(1));
        collector.publish(direction_changed(2));
        collector.publish(direction_changed(3));

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 2);
        assert_eq!(snapshot.dropped_events, 1);
        assert_eq!(snapshot.total_events, 3);
        assert_eq!(snapshot.recent[0], direction_changed(2));
    }

    #[test]
    fn collector_counts_drops_and_timeouts() {
        let collector = TelemetryCollector::default();
        collector.publish(ControlEvent::SampleDropped {
            channel: Channel::Right,
            reason: SkipReason::Stale,
            at_ms: 10,
        });
        collector.publish(ControlEvent::RepositionTimedOut { duration_ms: 3_020 });

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.dropped_samples, 1);
        assert_eq!(snapshot.reposition_timeouts, 1);
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_string(&direction_changed(5)).unwrap();
        assert!(json.contains("\"type\":\"direction_changed\""));
        assert!(json.contains("\"to\":-1"));
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let collector = TelemetryCollector::new(8, 8);
        let mut rx = collector.subscribe();
        let stream = collector.event_stream();

        collector.publish(ControlEvent::CalibrationDegraded);
        collector.publish(ControlEvent::ExerciseStopped);

        assert_eq!(rx.recv().await.unwrap(), ControlEvent::CalibrationDegraded);

        let events: Vec<ControlEvent> = stream.take(2).collect().await;
        assert_eq!(
            events,
            vec![ControlEvent::CalibrationDegraded, ControlEvent::ExerciseStopped]
        );
    }
}
