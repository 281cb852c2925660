//! Incremental traffic statistics
//!
//! The aggregator never replays the record set: each live record adjusts the
//! counters in constant time, and a remote snapshot replaces them wholesale.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::record::{deserialize_lenient_u64, TransactionRecord};

/// Default number of latency samples kept for the trend display
pub const DEFAULT_TREND_CAPACITY: usize = 15;

/// Aggregate snapshot as returned by the stats endpoint
///
/// Counts may arrive as numbers or strings; `avg_latency` is usually a
/// string such as `"120ms"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    #[serde(default, deserialize_with = "deserialize_lenient_u64")]
    pub total: u64,
    #[serde(default, deserialize_with = "deserialize_lenient_u64")]
    pub success: u64,
    #[serde(default, deserialize_with = "deserialize_lenient_u64")]
    pub error: u64,
    #[serde(default, deserialize_with = "deserialize_lenient_u64")]
    pub avg_latency: u64,
}

/// Fixed-capacity FIFO of recent latency samples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendWindow {
    samples: VecDeque<u64>,
    capacity: usize,
}

impl TrendWindow {
    /// Create an empty window. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest once the window is full
    pub fn push(&mut self, sample: u64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples in arrival order, oldest first
    pub fn samples(&self) -> impl Iterator<Item = u64> + '_ {
        self.samples.iter().copied()
    }

    /// Exactly `capacity` values: zeros on the left, then the samples
    pub fn padded(&self) -> Vec<u64> {
        let mut out = vec![0; self.capacity - self.samples.len()];
        out.extend(self.samples.iter().copied());
        out
    }
}

impl Default for TrendWindow {
    fn default() -> Self {
        Self::new(DEFAULT_TREND_CAPACITY)
    }
}

/// Read-only view of the aggregate counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total: u64,
    pub success: u64,
    pub error: u64,
    pub cumulative_latency_ms: u64,
    pub average_latency_ms: u64,
    /// Rounded percentage of successful transactions, 0 when empty
    pub success_rate: u64,
}

/// Incremental count / success-rate / latency aggregator
#[derive(Debug, Clone, Default)]
pub struct MetricsAggregator {
    total: u64,
    success: u64,
    error: u64,
    cumulative_latency: u64,
    average_latency: u64,
    trend: TrendWindow,
}

impl MetricsAggregator {
    pub fn new(trend_capacity: usize) -> Self {
        Self {
            trend: TrendWindow::new(trend_capacity),
            ..Self::default()
        }
    }

    /// Replace all counters with a remote summary.
    ///
    /// Cumulative latency is reconstructed as `avg × total`. The error count
    /// is clamped to the total and success is derived from it, so that
    /// `success + error == total` holds even if the remote disagreed.
    /// The trend window is left as is.
    pub fn init_from_snapshot(&mut self, snapshot: &StatsSnapshot) {
        let error = snapshot.error.min(snapshot.total);
        let success = snapshot.total - error;
        if success != snapshot.success || error != snapshot.error {
            tracing::debug!(
                "Snapshot counts disagree (total={}, success={}, error={}); using success={}, error={}",
                snapshot.total,
                snapshot.success,
                snapshot.error,
                success,
                error
            );
        }

        self.total = snapshot.total;
        self.success = success;
        self.error = error;
        self.cumulative_latency = snapshot.avg_latency.saturating_mul(snapshot.total);
        self.average_latency = if self.total > 0 {
            snapshot.avg_latency
        } else {
            0
        };
    }

    /// Fold one record into the counters and the trend window
    pub fn ingest(&mut self, record: &TransactionRecord) {
        let elapsed = record.elapsed_ms();

        self.total += 1;
        if record.is_failure() {
            self.error += 1;
        } else {
            self.success += 1;
        }
        self.cumulative_latency = self.cumulative_latency.saturating_add(elapsed);
        self.average_latency = rounded_div(self.cumulative_latency, self.total);
        self.trend.push(elapsed);
    }

    /// Zero every counter and empty the trend window
    pub fn reset(&mut self) {
        self.total = 0;
        self.success = 0;
        self.error = 0;
        self.cumulative_latency = 0;
        self.average_latency = 0;
        self.trend.clear();
    }

    pub fn stats(&self) -> AggregateStats {
        AggregateStats {
            total: self.total,
            success: self.success,
            error: self.error,
            cumulative_latency_ms: self.cumulative_latency,
            average_latency_ms: self.average_latency,
            success_rate: rounded_div(self.success.saturating_mul(100), self.total),
        }
    }

    pub fn trend(&self) -> &TrendWindow {
        &self.trend
    }
}

/// `round(numerator / denominator)` with halves rounded up; 0 when dividing by 0
fn rounded_div(numerator: u64, denominator: u64) -> u64 {
    if denominator == 0 {
        return 0;
    }
    let n = u128::from(numerator) * 2 + u128::from(denominator);
    let d = u128::from(denominator) * 2;
    (n / d) as u64
}
