//! Metric history and accuracy tracking.
//!
//! Both stores are bounded and evict oldest-first under their write lock;
//! every read returns a copy, so callers never hold a lock across an await.
//!
//! ```text
//!  record() ─▶ [ s0 | s1 | s2 | ... | sN ] ─▶ evict s0 when len > capacity
//!                                  └── rolling window ──┘
//! ```

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use super::types::WorkType;

pub const DEFAULT_METRICS_CAPACITY: usize = 200;
pub const DEFAULT_ROLLING_WINDOW: usize = 50;
pub const DEFAULT_ACCURACY_CAPACITY: usize = 50;

// ============================================================================
// Snapshots
// ============================================================================

/// One observed analysis, with rolling aggregates as of that moment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMetricSnapshot {
    pub timestamp: DateTime<Utc>,
    pub response_time_ms: u64,
    pub work_type: WorkType,
    pub success: bool,
    /// Failure ratio over the rolling window, this sample included.
    pub error_rate: f64,
    /// Successful analyses per second of busy time over the rolling window.
    pub throughput_per_sec: f64,
    pub ai_confidence: Option<f32>,
    pub backend: Option<String>,
    pub accuracy: Option<f64>,
}

/// Raw input to [`MetricsHistory::record`].
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub response_time_ms: u64,
    pub work_type: WorkType,
    pub success: bool,
    pub ai_confidence: Option<f32>,
    pub backend: Option<String>,
    pub accuracy: Option<f64>,
}

impl MetricSample {
    pub fn success(work_type: WorkType, response_time_ms: u64) -> Self {
        Self {
            response_time_ms,
            work_type,
            success: true,
            ai_confidence: None,
            backend: None,
            accuracy: None,
        }
    }

    pub fn failure(work_type: WorkType, response_time_ms: u64) -> Self {
        Self {
            success: false,
            ..Self::success(work_type, response_time_ms)
        }
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.ai_confidence = Some(confidence);
        self
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }
}

// ============================================================================
// MetricsHistory
// ============================================================================

/// Bounded FIFO ring of [`PerformanceMetricSnapshot`]s.
#[derive(Debug)]
pub struct MetricsHistory {
    capacity: usize,
    rolling_window: usize,
    entries: RwLock<VecDeque<PerformanceMetricSnapshot>>,
}

impl Default for MetricsHistory {
    fn default() -> Self {
        Self::new(DEFAULT_METRICS_CAPACITY)
    }
}

impl MetricsHistory {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            rolling_window: DEFAULT_ROLLING_WINDOW,
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn with_rolling_window(mut self, window: usize) -> Self {
        self.rolling_window = window.max(1);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a sample, evicting the oldest entry when full.
    pub fn record(&self, sample: MetricSample) -> PerformanceMetricSnapshot {
        let mut entries = self.entries.write();

        let prior = self.rolling_window - 1;
        let mut window: Vec<(bool, u64)> = entries
            .iter()
            .rev()
            .take(prior)
            .map(|s| (s.success, s.response_time_ms))
            .collect();
        window.push((sample.success, sample.response_time_ms));

        let failures = window.iter().filter(|(ok, _)| !ok).count();
        let successes = window.len() - failures;
        let busy_ms: u64 = window.iter().map(|(_, ms)| ms).sum();

        let snapshot = PerformanceMetricSnapshot {
            timestamp: Utc::now(),
            response_time_ms: sample.response_time_ms,
            work_type: sample.work_type,
            success: sample.success,
            error_rate: failures as f64 / window.len() as f64,
            throughput_per_sec: if busy_ms == 0 {
                0.0
            } else {
                successes as f64 / (busy_ms as f64 / 1000.0)
            },
            ai_confidence: sample.ai_confidence,
            backend: sample.backend,
            accuracy: sample.accuracy,
        };

        entries.push_back(snapshot.clone());
        while entries.len() > self.capacity {
            entries.pop_front();
        }
        snapshot
    }

    /// Every retained snapshot, oldest first.
    pub fn snapshot(&self) -> Vec<PerformanceMetricSnapshot> {
        self.entries.read().iter().cloned().collect()
    }

    /// The `n` most recent snapshots, oldest first.
    pub fn recent(&self, n: usize) -> Vec<PerformanceMetricSnapshot> {
        let entries = self.entries.read();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn latest(&self) -> Option<PerformanceMetricSnapshot> {
        self.entries.read().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

// ============================================================================
// AccuracyTracker
// ============================================================================

/// Per-work-type bounded lists of Jaccard scores.
#[derive(Debug)]
pub struct AccuracyTracker {
    capacity: usize,
    scores: RwLock<BTreeMap<WorkType, VecDeque<f64>>>,
}

impl Default for AccuracyTracker {
    fn default() -> Self {
        Self::new(DEFAULT_ACCURACY_CAPACITY)
    }
}

impl AccuracyTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            scores: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn record(&self, work_type: WorkType, score: f64) {
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        let mut scores = self.scores.write();
        let list = scores.entry(work_type).or_default();
        list.push_back(score);
        while list.len() > self.capacity {
            list.pop_front();
        }
    }

    pub fn scores(&self, work_type: WorkType) -> Vec<f64> {
        self.scores
            .read()
            .get(&work_type)
            .map(|l| l.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn mean(&self, work_type: WorkType) -> Option<f64> {
        self.scores.read().get(&work_type).and_then(|l| mean(l.iter().copied()))
    }

    /// Mean over every retained score, all work types pooled.
    pub fn overall_mean(&self) -> Option<f64> {
        mean(self.scores.read().values().flatten().copied())
    }

    pub fn by_work_type(&self) -> BTreeMap<WorkType, f64> {
        self.scores
            .read()
            .iter()
            .filter_map(|(wt, l)| mean(l.iter().copied()).map(|m| (*wt, m)))
            .collect()
    }

    /// Work types whose mean is under their accuracy target.
    pub fn below_target(&self) -> Vec<(WorkType, f64)> {
        self.by_work_type()
            .into_iter()
            .filter(|(wt, m)| *m < wt.accuracy_target())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.read().values().all(|l| l.is_empty())
    }

    pub fn clear(&self) {
        self.scores.write().clear();
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Jaccard similarity of two tag sets. Two empty sets are identical.
pub fn jaccard_similarity(predicted: &BTreeSet<String>, actual: &BTreeSet<String>) -> f64 {
    if predicted.is_empty() && actual.is_empty() {
        return 1.0;
    }
    let intersection = predicted.intersection(actual).count();
    let union = predicted.union(actual).count();
    intersection as f64 / union as f64
}
