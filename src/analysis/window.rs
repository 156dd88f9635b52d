// SlidingWindowBuffer - time-windowed velocity history
//
// The window is a duration, not a count, so the number of retained samples
// follows whatever rate the sensor happens to deliver.

use std::collections::VecDeque;

use crate::analysis::sample::SampleAnalyzer;

/// Statistics recomputed after every insertion
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowStats {
    pub mean: f64,
    pub variance: f64,
    /// Newest-minus-oldest slope across the retained span (°/s²)
    pub acceleration_estimate: f64,
    pub sample_count: usize,
}

#[derive(Debug, Clone)]
pub struct SlidingWindowBuffer {
    entries: VecDeque<(i64, f64)>,
    window_ms: i64,
    stats: WindowStats,
}

impl SlidingWindowBuffer {
    pub fn new(window_ms: i64) -> Self {
        Self {
            entries: VecDeque::new(),
            window_ms,
            stats: WindowStats::default(),
        }
    }

    /// Append, evict everything older than `now - window`, recompute statistics
    pub fn push(&mut self, value: f64, now_ms: i64) -> WindowStats {
        self.entries.push_back((now_ms, value));

        let cutoff = now_ms - self.window_ms;
        while let Some(&(ts, _)) = self.entries.front() {
            if ts < cutoff {
                self.entries.pop_front();
            } else {
                break;
            }
        }

        self.stats = self.compute_stats();
        self.stats
    }

    fn compute_stats(&self) -> WindowStats {
        let count = self.entries.len();
        if count == 0 {
            return WindowStats::default();
        }

        let mean = self.entries.iter().map(|&(_, v)| v).sum::<f64>() / count as f64;
        let variance = SampleAnalyzer::variance(self.entries.iter().map(|&(_, v)| v), mean);

        let acceleration_estimate = match (self.entries.front(), self.entries.back()) {
            (Some(&(first_ts, first)), Some(&(last_ts, last))) if last_ts > first_ts => {
                (last - first) / ((last_ts - first_ts) as f64 / 1000.0)
            }
            _ => 0.0,
        };

        WindowStats {
            mean,
            variance,
            acceleration_estimate,
            sample_count: count,
        }
    }

    pub fn has_enough(&self, min_samples: usize) -> bool {
        self.entries.len() >= min_samples
    }

    pub fn stats(&self) -> WindowStats {
        self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.stats = WindowStats::default();
    }
}
