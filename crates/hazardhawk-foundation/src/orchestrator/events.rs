//! Audit Events
//!
//! The monitor and optimizer report what they did through an [`AuditSink`].
//! Events serialize with an `event_type` tag so downstream log pipelines can
//! route them without knowing the Rust types:
//!
//! ```json
//! { "event_type": "AI_PERFORMANCE_MONITORED", "timestamp": "...", "work_type": "ELECTRICAL", ... }
//! ```

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use super::types::WorkType;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEvent {
    AiAccuracyTest {
        timestamp: DateTime<Utc>,
        total_cases: usize,
        overall_accuracy: f64,
        average_response_time_ms: f64,
        accuracy_by_work_type: BTreeMap<WorkType, f64>,
        recommendation_count: usize,
    },
    AiPerformanceMonitored {
        timestamp: DateTime<Utc>,
        work_type: WorkType,
        success: bool,
        response_time_ms: u64,
        backend: Option<String>,
        accuracy: Option<f64>,
    },
    AiPerformanceOptimized {
        timestamp: DateTime<Utc>,
        samples_analyzed: usize,
        action_count: usize,
        response_time_improvement_percent: f64,
        accuracy_improvement_percent: f64,
        reliability_improvement_percent: f64,
    },
}

impl AuditEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            AuditEvent::AiAccuracyTest { .. } => "AI_ACCURACY_TEST",
            AuditEvent::AiPerformanceMonitored { .. } => "AI_PERFORMANCE_MONITORED",
            AuditEvent::AiPerformanceOptimized { .. } => "AI_PERFORMANCE_OPTIMIZED",
        }
    }
}

/// Receives audit events. Implementations must not block.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Logs each event as a JSON line at `info` level under the
/// `hazardhawk::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => tracing::info!(target: "hazardhawk::audit", event_type = event.event_type(), "{}", json),
            Err(e) => tracing::warn!("AuditSink: cannot serialize {}: {}", event.event_type(), e),
        }
    }
}

/// Events a [`MemoryAuditSink`] keeps before dropping the oldest.
pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

/// Keeps the most recent events in memory for tests and in-app diagnostics
/// screens. Bounded like the metric history: the oldest event is evicted
/// once `capacity` is reached.
#[derive(Debug)]
pub struct MemoryAuditSink {
    capacity: usize,
    events: Mutex<VecDeque<AuditEvent>>,
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A capacity of zero is treated as one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Retained events, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().iter().cloned().collect()
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        let mut events = self.events.lock();
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitored() -> AuditEvent {
        AuditEvent::AiPerformanceMonitored {
            timestamp: Utc::now(),
            work_type: WorkType::Electrical,
            success: true,
            response_time_ms: 420,
            backend: Some("GPU_OPENCL".to_string()),
            accuracy: None,
        }
    }

    #[test]
    fn test_event_type_tag() {
        let json = serde_json::to_value(monitored()).unwrap();
        assert_eq!(json["event_type"], "AI_PERFORMANCE_MONITORED");
        assert_eq!(json["work_type"], "ELECTRICAL");
        assert_eq!(json["response_time_ms"], 420);
    }

    #[test]
    fn test_memory_sink_counts() {
        let sink = MemoryAuditSink::new();
        sink.record(monitored());
        sink.record(monitored());
        assert_eq!(sink.count("AI_PERFORMANCE_MONITORED"), 2);
        assert_eq!(sink.count("AI_ACCURACY_TEST"), 0);
        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_memory_sink_evicts_oldest() {
        let sink = MemoryAuditSink::with_capacity(3);
        for ms in 0..10u64 {
            let mut event = monitored();
            if let AuditEvent::AiPerformanceMonitored {
                response_time_ms, ..
            } = &mut event
            {
                *response_time_ms = ms;
            }
            sink.record(event);
        }

        let kept: Vec<u64> = sink
            .events()
            .iter()
            .filter_map(|e| match e {
                AuditEvent::AiPerformanceMonitored {
                    response_time_ms, ..
                } => Some(*response_time_ms),
                _ => None,
            })
            .collect();
        assert_eq!(kept, vec![7, 8, 9]);
        assert_eq!(MemoryAuditSink::new().capacity(), DEFAULT_AUDIT_CAPACITY);
        assert_eq!(MemoryAuditSink::with_capacity(0).capacity(), 1);
    }

    #[test]
    fn test_tracing_sink_does_not_panic() {
        TracingAuditSink.record(monitored());
    }
}
