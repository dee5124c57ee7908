//! Performance Loop Integration Tests
//!
//! Monitor → history → optimizer, exercised through the public API:
//!
//! 1. **Bounded history**: FIFO eviction under sustained load
//! 2. **Accuracy**: Jaccard scoring from feedback and labeled suites
//! 3. **Optimization**: category-separated recommendations and trend reports

#[cfg(test)]
mod performance_loop_tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use hazardhawk_foundation::orchestrator::{
        jaccard_similarity, AccuracyTestCase, AnalysisRequest, AnalysisResult, ChecklistAnalyzer,
        FallbackOrchestrator, MemoryAuditSink, MetricSample, MetricsHistory, MonitorConfig,
        OptimizationCategory, OptimizationType, OptimizerConfig, PerformanceMonitor,
        PerformanceOptimizer, Trend, UserFeedback, WorkType,
    };

    const JPEG: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

    fn tags(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn monitor_with_sink() -> (Arc<PerformanceMonitor>, Arc<MemoryAuditSink>) {
        let sink = Arc::new(MemoryAuditSink::new());
        let monitor = Arc::new(PerformanceMonitor::default().with_audit_sink(sink.clone()));
        (monitor, sink)
    }

    #[test]
    fn test_ring_buffer_keeps_newest_hundred() {
        let history = MetricsHistory::new(100);
        for ms in 0..1000u64 {
            history.record(MetricSample::success(WorkType::Roadwork, ms));
        }

        let retained = history.snapshot();
        assert_eq!(retained.len(), 100);
        let times: Vec<u64> = retained.iter().map(|s| s.response_time_ms).collect();
        assert_eq!(times, (900..1000).collect::<Vec<u64>>());
    }

    #[test]
    fn test_concurrent_appends_respect_capacity() {
        let history = Arc::new(MetricsHistory::new(100));
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let history = history.clone();
                std::thread::spawn(move || {
                    for i in 0..250u64 {
                        history.record(MetricSample::success(WorkType::Welding, worker * 1000 + i));
                        assert!(history.len() <= 100);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(history.len(), 100);
    }

    #[test]
    fn test_jaccard_examples() {
        assert_eq!(
            jaccard_similarity(&tags(&["no-hard-hat", "fall-hazard"]), &tags(&["no-hard-hat"])),
            0.5
        );
        assert_eq!(jaccard_similarity(&tags(&["fall-hazard"]), &tags(&["fall-hazard"])), 1.0);
        assert_eq!(jaccard_similarity(&tags(&["fall-hazard"]), &tags(&["no-hard-hat"])), 0.0);
    }

    #[test]
    fn test_feedback_feeds_accuracy_tracker() {
        let (monitor, sink) = monitor_with_sink();
        let mut result = AnalysisResult::empty("GPU_OPENCL");
        result.processing_time_ms = 640;

        let snapshot = monitor.monitor_performance(
            &result,
            WorkType::Electrical,
            Some(&UserFeedback::new(["electrical-hazard"])),
        );
        assert_eq!(snapshot.accuracy, Some(0.0));
        assert_eq!(monitor.accuracy().mean(WorkType::Electrical), Some(0.0));
        assert_eq!(sink.count("AI_PERFORMANCE_MONITORED"), 1);
    }

    #[tokio::test]
    async fn test_accuracy_suite_through_checklist_tier() {
        let (monitor, sink) = monitor_with_sink();
        let orchestrator = FallbackOrchestrator::new(vec![Arc::new(ChecklistAnalyzer::new())]);

        let cases = vec![
            AccuracyTestCase::new(JPEG.to_vec(), WorkType::FallProtection, ["fall-hazard"]),
            AccuracyTestCase::new(JPEG.to_vec(), WorkType::GeneralConstruction, ["no-hard-hat"]),
            AccuracyTestCase::new(Vec::new(), WorkType::Electrical, ["electrical-hazard"]),
        ];
        let report = monitor.test_analysis_accuracy(&orchestrator, &cases).await;

        assert_eq!(report.total_cases, 3);
        assert_eq!(report.failed_cases, 1);
        assert_eq!(report.accuracy_by_work_type[&WorkType::FallProtection], 1.0);
        assert_eq!(report.accuracy_by_work_type[&WorkType::GeneralConstruction], 0.0);
        assert_eq!(report.accuracy_by_work_type[&WorkType::Electrical], 0.0);
        assert!((report.overall_accuracy - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.cases[0].analyzer_name.as_deref(), Some("checklist"));
        assert!(report.cases[2].error.is_some());
        // General construction and electrical miss their targets.
        assert_eq!(report.recommendations.len(), 2);
        assert_eq!(sink.count("AI_ACCURACY_TEST"), 1);

        // Suite scores land in the tracker but not in the latency history.
        assert_eq!(monitor.accuracy().mean(WorkType::FallProtection), Some(1.0));
        assert!(monitor.history().is_empty());
    }

    #[tokio::test]
    async fn test_accuracy_suite_keeps_shared_history_clean() {
        let (monitor, sink) = monitor_with_sink();
        let orchestrator = FallbackOrchestrator::new(vec![Arc::new(ChecklistAnalyzer::new())])
            .with_monitor(monitor.clone());

        let cases = vec![
            AccuracyTestCase::new(JPEG.to_vec(), WorkType::FallProtection, ["fall-hazard"]),
            AccuracyTestCase::new(Vec::new(), WorkType::Electrical, ["electrical-hazard"]),
        ];
        let report = monitor.test_analysis_accuracy(&orchestrator, &cases).await;
        assert_eq!(report.total_cases, 2);
        assert!(monitor.history().is_empty());
        assert_eq!(sink.count("AI_PERFORMANCE_MONITORED"), 0);

        // Regular traffic through the same orchestrator is still recorded.
        orchestrator
            .analyze(&AnalysisRequest::new(JPEG.to_vec(), WorkType::FallProtection))
            .await
            .unwrap();
        assert_eq!(monitor.history().len(), 1);
    }

    #[test]
    fn test_slow_history_yields_only_response_time_actions() {
        let (monitor, sink) = monitor_with_sink();
        for _ in 0..50 {
            let mut result = AnalysisResult::empty("GPU_OPENCL");
            result.processing_time_ms = 5000;
            monitor.monitor_performance(&result, WorkType::Roofing, None);
        }

        let optimizer = PerformanceOptimizer::from_monitor(&monitor, OptimizerConfig::default());
        let result = optimizer.optimize_performance();

        assert!(!result.actions.is_empty());
        assert!(result
            .actions
            .iter()
            .all(|a| a.category == OptimizationCategory::ResponseTime));
        let types: Vec<OptimizationType> = result.actions.iter().map(|a| a.action_type).collect();
        assert_eq!(types, vec![OptimizationType::Caching, OptimizationType::ModelPruning]);
        assert_eq!(result.response_time_improvement_percent, 40.0);
        assert_eq!(result.accuracy_improvement_percent, 0.0);
        assert_eq!(result.reliability_improvement_percent, 0.0);
        assert_eq!(sink.count("AI_PERFORMANCE_OPTIMIZED"), 1);
    }

    #[test]
    fn test_benchmark_trend_follows_recent_latency() {
        let (monitor, _) = monitor_with_sink();
        let optimizer = PerformanceOptimizer::from_monitor(&monitor, OptimizerConfig::default());

        for ms in [2500u64; 20].into_iter().chain([1200u64; 20]) {
            let mut result = AnalysisResult::empty("NPU_NNAPI");
            result.processing_time_ms = ms;
            monitor.monitor_performance(&result, WorkType::Excavation, None);
        }
        let report = optimizer.generate_benchmark_report();
        assert_eq!(report.sample_count, 40);
        assert_eq!(report.trend, Trend::Improving);
        assert_eq!(report.success_rate, 1.0);
        assert!(report.meets_response_target());
        assert!(report.meets_success_target());

        monitor.history().clear();
        let report = optimizer.generate_benchmark_report();
        assert_eq!(report.sample_count, 0);
        assert_eq!(report.trend, Trend::Stable);
    }

    #[test]
    fn test_monitor_config_capacity_applies() {
        let monitor = PerformanceMonitor::new(MonitorConfig::default().with_metrics_capacity(10));
        for _ in 0..25 {
            monitor.record_failure(WorkType::Roadwork, 50, None);
        }
        assert_eq!(monitor.history().len(), 10);
    }
}
