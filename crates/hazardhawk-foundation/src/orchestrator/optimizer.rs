//! PerformanceOptimizer: Recommendations and Benchmark Reports
//!
//! Reads the monitor's shared [`MetricsHistory`] and [`AccuracyTracker`] and
//! turns threshold breaches into [`OptimizationAction`]s. Actions are
//! recommendations only; applying them is left to the caller.
//!
//! ```text
//! ┌────────────────┐   last N snapshots    ┌──────────────────────┐
//! │ MetricsHistory │──────────────────────▶│                      │   actions +
//! └────────────────┘                       │ PerformanceOptimizer │──▶ per-category
//! ┌────────────────┐   per work type mean  │                      │   estimates
//! │AccuracyTracker │──────────────────────▶│                      │
//! └────────────────┘                       └──────────┬───────────┘
//!                                                     │ AI_PERFORMANCE_OPTIMIZED
//!                                                     ▼
//!                                                 AuditSink
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::config::OptimizerConfig;
use super::events::{AuditEvent, AuditSink, TracingAuditSink};
use super::metrics::{AccuracyTracker, MetricsHistory, PerformanceMetricSnapshot};
use super::monitor::PerformanceMonitor;
use super::types::WorkType;

/// Upper bound for any per-category improvement estimate.
pub const MAX_IMPROVEMENT_PERCENT: f64 = 90.0;

// ============================================================================
// Actions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptimizationType {
    Caching,
    ModelPruning,
    BackendReselection,
    FineTuning,
    DataAugmentation,
    ParameterTuning,
}

/// Which metric an action is expected to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OptimizationCategory {
    ResponseTime,
    Accuracy,
    Reliability,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationAction {
    pub action_type: OptimizationType,
    pub category: OptimizationCategory,
    pub description: String,
    pub estimated_improvement_percent: f64,
    pub complexity: Complexity,
}

impl OptimizationAction {
    fn new(
        action_type: OptimizationType,
        category: OptimizationCategory,
        estimated_improvement_percent: f64,
        complexity: Complexity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            action_type,
            category,
            description: description.into(),
            estimated_improvement_percent,
            complexity,
        }
    }
}

/// Output of [`PerformanceOptimizer::optimize_performance`].
///
/// The three improvement figures are independent: each is the capped sum of
/// the actions in its own category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceOptimizationResult {
    pub timestamp: DateTime<Utc>,
    pub samples_analyzed: usize,
    pub average_response_time_ms: f64,
    pub error_rate: f64,
    pub accuracy_deficits: BTreeMap<WorkType, f64>,
    pub actions: Vec<OptimizationAction>,
    pub response_time_improvement_percent: f64,
    pub accuracy_improvement_percent: f64,
    pub reliability_improvement_percent: f64,
}

impl PerformanceOptimizationResult {
    pub fn actions_in(&self, category: OptimizationCategory) -> impl Iterator<Item = &OptimizationAction> {
        self.actions.iter().filter(move |a| a.category == category)
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

// ============================================================================
// Benchmark report
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trend::Improving => "IMPROVING",
            Trend::Stable => "STABLE",
            Trend::Declining => "DECLINING",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BenchmarkTargets {
    pub response_time_ms: u64,
    pub accuracy: f64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkReport {
    pub timestamp: DateTime<Utc>,
    pub sample_count: usize,
    pub mean_response_time_ms: f64,
    pub p95_response_time_ms: u64,
    pub success_rate: f64,
    pub mean_accuracy: Option<f64>,
    pub accuracy_by_work_type: BTreeMap<WorkType, f64>,
    pub targets: BenchmarkTargets,
    pub trend: Trend,
}

impl BenchmarkReport {
    pub fn meets_response_target(&self) -> bool {
        self.sample_count > 0 && self.mean_response_time_ms <= self.targets.response_time_ms as f64
    }

    pub fn meets_success_target(&self) -> bool {
        self.sample_count > 0 && self.success_rate >= self.targets.success_rate
    }

    /// `false` when no accuracy has been recorded yet.
    pub fn meets_accuracy_target(&self) -> bool {
        self.mean_accuracy
            .is_some_and(|a| a >= self.targets.accuracy)
    }
}

// ============================================================================
// PerformanceOptimizer
// ============================================================================

pub struct PerformanceOptimizer {
    history: Arc<MetricsHistory>,
    accuracy: Arc<AccuracyTracker>,
    config: OptimizerConfig,
    sink: Arc<dyn AuditSink>,
}

impl fmt::Debug for PerformanceOptimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerformanceOptimizer")
            .field("samples", &self.history.len())
            .field("config", &self.config)
            .finish()
    }
}

impl PerformanceOptimizer {
    pub fn new(
        history: Arc<MetricsHistory>,
        accuracy: Arc<AccuracyTracker>,
        config: OptimizerConfig,
    ) -> Self {
        Self {
            history,
            accuracy,
            config,
            sink: Arc::new(TracingAuditSink),
        }
    }

    /// Share the monitor's histories and audit sink.
    pub fn from_monitor(monitor: &PerformanceMonitor, config: OptimizerConfig) -> Self {
        Self {
            history: monitor.history().clone(),
            accuracy: monitor.accuracy().clone(),
            config,
            sink: monitor.audit_sink().clone(),
        }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Recommend actions for every metric that misses its target.
    pub fn optimize_performance(&self) -> PerformanceOptimizationResult {
        let window = self.history.recent(self.config.window);
        let average_response_time_ms = mean_response_ms(&window);
        let error_rate = failure_ratio(&window);
        let accuracy_deficits: BTreeMap<WorkType, f64> =
            self.accuracy.below_target().into_iter().collect();

        let mut actions = Vec::new();

        if !window.is_empty() && average_response_time_ms > self.config.response_time_target_ms as f64 {
            actions.push(OptimizationAction::new(
                OptimizationType::Caching,
                OptimizationCategory::ResponseTime,
                25.0,
                Complexity::Low,
                format!(
                    "Cache results for repeated photos; mean response {:.0}ms exceeds {}ms",
                    average_response_time_ms, self.config.response_time_target_ms
                ),
            ));
            actions.push(OptimizationAction::new(
                OptimizationType::ModelPruning,
                OptimizationCategory::ResponseTime,
                15.0,
                Complexity::Medium,
                "Prune or quantize the on-device model to cut inference time",
            ));

            let latest_on_cpu = window
                .last()
                .and_then(|s| s.backend.as_deref())
                .is_some_and(|b| b == "CPU");
            if latest_on_cpu {
                actions.push(OptimizationAction::new(
                    OptimizationType::BackendReselection,
                    OptimizationCategory::ResponseTime,
                    30.0,
                    Complexity::Medium,
                    "Analyses are running on CPU; re-evaluate accelerated backends",
                ));
            }
        }

        if !accuracy_deficits.is_empty() {
            let lagging = accuracy_deficits
                .iter()
                .map(|(wt, m)| format!("{} {:.1}%", wt, m * 100.0))
                .collect::<Vec<_>>()
                .join(", ");
            actions.push(OptimizationAction::new(
                OptimizationType::FineTuning,
                OptimizationCategory::Accuracy,
                12.0,
                Complexity::High,
                format!("Fine-tune the model on labeled site photos for: {}", lagging),
            ));
            actions.push(OptimizationAction::new(
                OptimizationType::DataAugmentation,
                OptimizationCategory::Accuracy,
                8.0,
                Complexity::Medium,
                "Augment training data with lighting, angle and occlusion variants",
            ));
        }

        if error_rate > self.config.error_rate_target {
            actions.push(OptimizationAction::new(
                OptimizationType::ParameterTuning,
                OptimizationCategory::Reliability,
                10.0,
                Complexity::Low,
                format!(
                    "Tune retry and timeout parameters; error rate {:.1}% exceeds {:.1}%",
                    error_rate * 100.0,
                    self.config.error_rate_target * 100.0
                ),
            ));
        }

        let result = PerformanceOptimizationResult {
            timestamp: Utc::now(),
            samples_analyzed: window.len(),
            average_response_time_ms,
            error_rate,
            accuracy_deficits,
            response_time_improvement_percent: category_total(&actions, OptimizationCategory::ResponseTime),
            accuracy_improvement_percent: category_total(&actions, OptimizationCategory::Accuracy),
            reliability_improvement_percent: category_total(&actions, OptimizationCategory::Reliability),
            actions,
        };

        tracing::info!(
            "PerformanceOptimizer: {} action(s) from {} samples (response -{:.0}%, accuracy +{:.0}%, reliability +{:.0}%)",
            result.actions.len(),
            result.samples_analyzed,
            result.response_time_improvement_percent,
            result.accuracy_improvement_percent,
            result.reliability_improvement_percent
        );
        self.sink.record(AuditEvent::AiPerformanceOptimized {
            timestamp: result.timestamp,
            samples_analyzed: result.samples_analyzed,
            action_count: result.actions.len(),
            response_time_improvement_percent: result.response_time_improvement_percent,
            accuracy_improvement_percent: result.accuracy_improvement_percent,
            reliability_improvement_percent: result.reliability_improvement_percent,
        });
        result
    }

    /// Current performance against fixed targets, over the whole history.
    pub fn generate_benchmark_report(&self) -> BenchmarkReport {
        let samples = self.history.snapshot();

        let mut response_times: Vec<u64> = samples.iter().map(|s| s.response_time_ms).collect();
        response_times.sort_unstable();

        let success_rate = if samples.is_empty() {
            0.0
        } else {
            1.0 - failure_ratio(&samples)
        };

        BenchmarkReport {
            timestamp: Utc::now(),
            sample_count: samples.len(),
            mean_response_time_ms: mean_response_ms(&samples),
            p95_response_time_ms: percentile(&response_times, 0.95),
            success_rate,
            mean_accuracy: self.accuracy.overall_mean(),
            accuracy_by_work_type: self.accuracy.by_work_type(),
            targets: BenchmarkTargets {
                response_time_ms: self.config.response_time_target_ms,
                accuracy: self.config.accuracy_target,
                success_rate: self.config.success_rate_target,
            },
            trend: self.trend(&samples),
        }
    }

    /// Compare the newest `trend_window` samples with the ones just before.
    fn trend(&self, samples: &[PerformanceMetricSnapshot]) -> Trend {
        let half = self.config.trend_window.max(1);
        if samples.len() < half * 2 {
            return Trend::Stable;
        }
        let split = samples.len() - half;
        let recent = mean_response_ms(&samples[split..]);
        let previous = mean_response_ms(&samples[split - half..split]);
        if previous <= 0.0 {
            return Trend::Stable;
        }

        let change = (recent - previous) / previous;
        if change < -self.config.trend_tolerance {
            Trend::Improving
        } else if change > self.config.trend_tolerance {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }
}

fn mean_response_ms(samples: &[PerformanceMetricSnapshot]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s.response_time_ms as f64).sum::<f64>() / samples.len() as f64
}

fn failure_ratio(samples: &[PerformanceMetricSnapshot]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().filter(|s| !s.success).count() as f64 / samples.len() as f64
}

/// Nearest-rank percentile over sorted values.
fn percentile(sorted: &[u64], q: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (q * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

fn category_total(actions: &[OptimizationAction], category: OptimizationCategory) -> f64 {
    actions
        .iter()
        .filter(|a| a.category == category)
        .map(|a| a.estimated_improvement_percent)
        .sum::<f64>()
        .min(MAX_IMPROVEMENT_PERCENT)
}
