//! PerformanceMonitor: Latency, Reliability and Accuracy Bookkeeping
//!
//! The monitor turns finished analyses into [`PerformanceMetricSnapshot`]s and
//! Jaccard accuracy scores, and runs labeled accuracy suites against a
//! [`FallbackOrchestrator`]. The optimizer reads the same stores.
//!
//! ```text
//!  FallbackOrchestrator ──▶ monitor_performance() ──▶ MetricsHistory (ring)
//!         │                        │
//!         │                        └── feedback? ──▶ AccuracyTracker (per work type)
//!         ▼
//!  record_failure()                 every call ──▶ AuditSink (AI_PERFORMANCE_MONITORED)
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::config::MonitorConfig;
use super::events::{AuditEvent, AuditSink, TracingAuditSink};
use super::fallback::FallbackOrchestrator;
use super::metrics::{
    jaccard_similarity, AccuracyTracker, MetricSample, MetricsHistory, PerformanceMetricSnapshot,
};
use super::types::{AnalysisRequest, AnalysisResult, WorkType};

/// Ground truth supplied by the user after reviewing a result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserFeedback {
    pub actual_tags: BTreeSet<String>,
}

impl UserFeedback {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            actual_tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}

/// One labeled photo for [`PerformanceMonitor::test_analysis_accuracy`].
#[derive(Debug, Clone)]
pub struct AccuracyTestCase {
    pub image: Vec<u8>,
    pub work_type: WorkType,
    pub expected_tags: BTreeSet<String>,
}

impl AccuracyTestCase {
    pub fn new<I, S>(image: Vec<u8>, work_type: WorkType, expected_tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            image,
            work_type,
            expected_tags: expected_tags.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyCaseOutcome {
    pub index: usize,
    pub work_type: WorkType,
    pub accuracy: f64,
    pub response_time_ms: u64,
    pub analyzer_name: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyTestReport {
    pub timestamp: DateTime<Utc>,
    pub total_cases: usize,
    pub failed_cases: usize,
    pub overall_accuracy: f64,
    pub average_response_time_ms: f64,
    pub accuracy_by_work_type: BTreeMap<WorkType, f64>,
    pub cases: Vec<AccuracyCaseOutcome>,
    pub recommendations: Vec<String>,
}

// ============================================================================
// PerformanceMonitor
// ============================================================================

pub struct PerformanceMonitor {
    history: Arc<MetricsHistory>,
    accuracy: Arc<AccuracyTracker>,
    sink: Arc<dyn AuditSink>,
    config: MonitorConfig,
}

impl std::fmt::Debug for PerformanceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceMonitor")
            .field("samples", &self.history.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(MonitorConfig::default())
    }
}

impl PerformanceMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        let history = MetricsHistory::new(config.metrics_capacity)
            .with_rolling_window(config.rolling_window);
        Self {
            history: Arc::new(history),
            accuracy: Arc::new(AccuracyTracker::new(config.accuracy_window)),
            sink: Arc::new(TracingAuditSink),
            config,
        }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn history(&self) -> &Arc<MetricsHistory> {
        &self.history
    }

    pub fn accuracy(&self) -> &Arc<AccuracyTracker> {
        &self.accuracy
    }

    pub fn audit_sink(&self) -> &Arc<dyn AuditSink> {
        &self.sink
    }

    /// Record a successful analysis, folding in user feedback when given.
    /// Latency is the analyzer's own `processing_time_ms`.
    pub fn monitor_performance(
        &self,
        result: &AnalysisResult,
        work_type: WorkType,
        feedback: Option<&UserFeedback>,
    ) -> PerformanceMetricSnapshot {
        self.record_success(result, work_type, result.processing_time_ms, feedback)
    }

    /// Record a successful analysis that took `response_time_ms` end to end.
    pub fn record_success(
        &self,
        result: &AnalysisResult,
        work_type: WorkType,
        response_time_ms: u64,
        feedback: Option<&UserFeedback>,
    ) -> PerformanceMetricSnapshot {
        let accuracy = feedback.map(|fb| {
            let score = jaccard_similarity(&result.predicted_tags(), &fb.actual_tags);
            self.accuracy.record(work_type, score);
            score
        });

        let mut sample = MetricSample::success(work_type, response_time_ms)
            .with_backend(result.backend_used.clone())
            .with_confidence(result.ai_confidence);
        sample.accuracy = accuracy;

        let snapshot = self.history.record(sample);
        tracing::debug!(
            "PerformanceMonitor: {} on {} in {}ms (error rate {:.1}%)",
            work_type,
            result.backend_used,
            response_time_ms,
            snapshot.error_rate * 100.0
        );
        self.emit_monitored(&snapshot);
        snapshot
    }

    /// Record an analysis that produced no result.
    pub fn record_failure(
        &self,
        work_type: WorkType,
        response_time_ms: u64,
        backend: Option<&str>,
    ) -> PerformanceMetricSnapshot {
        let mut sample = MetricSample::failure(work_type, response_time_ms);
        sample.backend = backend.map(str::to_string);

        let snapshot = self.history.record(sample);
        tracing::warn!(
            "PerformanceMonitor: {} failed after {}ms (error rate {:.1}%)",
            work_type,
            response_time_ms,
            snapshot.error_rate * 100.0
        );
        self.emit_monitored(&snapshot);
        snapshot
    }

    fn emit_monitored(&self, snapshot: &PerformanceMetricSnapshot) {
        self.sink.record(AuditEvent::AiPerformanceMonitored {
            timestamp: snapshot.timestamp,
            work_type: snapshot.work_type,
            success: snapshot.success,
            response_time_ms: snapshot.response_time_ms,
            backend: snapshot.backend.clone(),
            accuracy: snapshot.accuracy,
        });
    }

    // ========================================================================
    // Accuracy suite
    // ========================================================================

    /// Run labeled cases one after another through `orchestrator`.
    ///
    /// Failed cases score 0.0. Case scores also feed the accuracy tracker,
    /// but cases never enter the latency history, even when `orchestrator`
    /// shares this monitor.
    pub async fn test_analysis_accuracy(
        &self,
        orchestrator: &FallbackOrchestrator,
        cases: &[AccuracyTestCase],
    ) -> AccuracyTestReport {
        tracing::info!("PerformanceMonitor: running accuracy suite over {} cases", cases.len());

        let mut outcomes = Vec::with_capacity(cases.len());
        for (index, case) in cases.iter().enumerate() {
            let request = AnalysisRequest::new(case.image.clone(), case.work_type);
            let started = Instant::now();
            let outcome = orchestrator.analyze_unmonitored(&request).await;
            let response_time_ms = started.elapsed().as_millis() as u64;

            let case_outcome = match outcome {
                Ok(outcome) => AccuracyCaseOutcome {
                    index,
                    work_type: case.work_type,
                    accuracy: jaccard_similarity(
                        &outcome.result.predicted_tags(),
                        &case.expected_tags,
                    ),
                    response_time_ms,
                    analyzer_name: Some(outcome.analyzer_name),
                    error: None,
                },
                Err(e) => {
                    tracing::warn!("PerformanceMonitor: accuracy case {} failed: {}", index, e);
                    AccuracyCaseOutcome {
                        index,
                        work_type: case.work_type,
                        accuracy: 0.0,
                        response_time_ms,
                        analyzer_name: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            self.accuracy.record(case_outcome.work_type, case_outcome.accuracy);
            outcomes.push(case_outcome);
        }

        let report = self.build_report(outcomes);
        self.sink.record(AuditEvent::AiAccuracyTest {
            timestamp: report.timestamp,
            total_cases: report.total_cases,
            overall_accuracy: report.overall_accuracy,
            average_response_time_ms: report.average_response_time_ms,
            accuracy_by_work_type: report.accuracy_by_work_type.clone(),
            recommendation_count: report.recommendations.len(),
        });
        report
    }

    fn build_report(&self, cases: Vec<AccuracyCaseOutcome>) -> AccuracyTestReport {
        let total = cases.len();
        let (overall_accuracy, average_response_time_ms) = if total == 0 {
            (0.0, 0.0)
        } else {
            (
                cases.iter().map(|c| c.accuracy).sum::<f64>() / total as f64,
                cases.iter().map(|c| c.response_time_ms as f64).sum::<f64>() / total as f64,
            )
        };

        let mut grouped: BTreeMap<WorkType, Vec<f64>> = BTreeMap::new();
        for case in &cases {
            grouped.entry(case.work_type).or_default().push(case.accuracy);
        }
        let accuracy_by_work_type: BTreeMap<WorkType, f64> = grouped
            .into_iter()
            .map(|(wt, scores)| (wt, scores.iter().sum::<f64>() / scores.len() as f64))
            .collect();

        let mut recommendations = Vec::new();
        for (work_type, accuracy) in &accuracy_by_work_type {
            let target = work_type.accuracy_target();
            if *accuracy < target {
                recommendations.push(format!(
                    "{}: accuracy {:.1}% is below the {:.0}% target; add labeled {} photos and retrain",
                    work_type,
                    accuracy * 100.0,
                    target * 100.0,
                    work_type
                ));
            }
        }
        if average_response_time_ms > self.config.response_time_target_ms as f64 {
            recommendations.push(format!(
                "Average response time {:.0}ms exceeds the {}ms target; enable result caching or select a faster backend",
                average_response_time_ms, self.config.response_time_target_ms
            ));
        }

        AccuracyTestReport {
            timestamp: Utc::now(),
            total_cases: total,
            failed_cases: cases.iter().filter(|c| c.error.is_some()).count(),
            overall_accuracy,
            average_response_time_ms,
            accuracy_by_work_type,
            cases,
            recommendations,
        }
    }
}
