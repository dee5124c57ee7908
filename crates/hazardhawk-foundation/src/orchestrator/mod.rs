//! Safety Analysis Orchestrator Module
//!
//! This module provides the complete analysis stack for HazardHawk:
//!
//! ## Layer 1: Backends & Model Engine
//!
//! Hardware-aware execution of an opaque hazard-detection model:
//!
//! - **[`BackendTable`]**: Read-only descriptors (CPU, GPU, NPU, ...) ranked by expected throughput
//! - **[`HardwarePlatform`]**: Probe, memory and thermal telemetry ([`SystemPlatform`] via `sysinfo`)
//! - **[`ModelEngine`]**: Backend selection, OOM pre-flight, cancellation, progress
//!
//! ## Layer 2: Analyzers & Fallback
//!
//! - **[`SafetyAnalyzer`]**: Object-safe async trait for every analysis tier
//! - **[`OnDeviceAnalyzer`]**, **[`CloudAnalyzer`]**, **[`ChecklistAnalyzer`]**
//! - **[`FallbackOrchestrator`]**: Priority chain driven by [`ErrorClass`]
//!
//! ## Layer 3: Monitoring & Optimization
//!
//! - **[`PerformanceMonitor`]**: Bounded metric history, Jaccard accuracy, accuracy suites
//! - **[`PerformanceOptimizer`]**: Threshold-driven recommendations and benchmark reports
//! - **[`AuditSink`]**: `AI_*` audit events
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │              Caller (photo bytes + WorkType)                  │
//! └────────────────────────┬──────────────────────────────────────┘
//!                          │ AnalysisRequest
//!                          ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │                  FallbackOrchestrator                         │
//! │  ┌─────────────────┐  ┌───────────────┐  ┌─────────────────┐  │
//! │  │ OnDeviceAnalyzer│─▶│ CloudAnalyzer │─▶│ChecklistAnalyzer│  │
//! │  └────────┬────────┘  └───────────────┘  └─────────────────┘  │
//! │           │                                                   │
//! │           ▼                                                   │
//! │  ┌─────────────────┐      ┌─────────────────────────────┐     │
//! │  │   ModelEngine   │─────▶│ BackendTable / Platform     │     │
//! │  └─────────────────┘      └─────────────────────────────┘     │
//! └────────────────────────┬──────────────────────────────────────┘
//!                          │ AnalysisResult / FallbackError
//!                          ▼
//! ┌───────────────────────────────────────────────────────────────┐
//! │  PerformanceMonitor ──▶ MetricsHistory ◀── PerformanceOptimizer│
//! │                     ──▶ AccuracyTracker ◀──                   │
//! └───────────────────────────────────────────────────────────────┘
//! ```

// ---------------------------------------------------------------------------
// Layer 1: Backends & Model Engine
// ---------------------------------------------------------------------------

/// Error taxonomy shared by every engine and analyzer.
pub mod error;

/// Core types: AnalysisRequest, AnalysisResult, Hazard, WorkType, etc.
pub mod types;

/// Backend descriptors and the `HardwarePlatform` trait.
pub mod backend;

/// `sysinfo`-backed hardware platform.
pub mod telemetry;

/// Model manifest and the `ModelRuntime` / `ModelSession` seams.
pub mod runtime;

/// Label catalog and result assembly.
pub mod catalog;

/// Layered configuration (defaults, JSON, environment).
pub mod config;

/// The model engine: selection, pre-flight checks, inference.
pub mod engine;

// ---------------------------------------------------------------------------
// Layer 2: Analyzers & Fallback
// ---------------------------------------------------------------------------

/// The `SafetyAnalyzer` trait.
pub mod analyzer;

/// On-device tier backed by `ModelEngine`.
pub mod on_device;

/// Remote tier over HTTP with retry and backoff.
pub mod cloud;

/// Last-resort checklist tier.
pub mod checklist;

/// Priority-ordered fallback chain.
pub mod fallback;

// ---------------------------------------------------------------------------
// Layer 3: Monitoring & Optimization
// ---------------------------------------------------------------------------

/// Audit events and sinks.
pub mod events;

/// Bounded metric history and accuracy tracking.
pub mod metrics;

/// Performance monitor and accuracy suite.
pub mod monitor;

/// Optimization recommendations and benchmark reports.
pub mod optimizer;

#[cfg(test)]
mod test_support;

// ── Re-exports: Layer 1 ──

pub use backend::{
    BackendDescriptor, BackendKind, BackendSelection, BackendTable, HardwarePlatform,
    MemoryTier, PowerEfficiency, ThermalReading, BACKEND_DESCRIPTORS,
};
pub use catalog::{AssemblyOptions, HazardEntry};
pub use config::{ConfigError, EngineConfig, HazardHawkConfig, MonitorConfig, OptimizerConfig};
pub use engine::{EngineMetrics, EngineState, ModelEngine};
pub use error::{AnalysisError, ErrorClass};
pub use runtime::{
    ModelManifest, ModelRuntime, ModelSession, PreparedImage, RawDetection, RawInference,
};
pub use telemetry::SystemPlatform;
pub use types::{
    AnalysisRequest, AnalysisResult, AnalysisStage, BoundingBox, CancelToken, Hazard,
    HazardType, ImageFormat, OshaViolation, PpeDetection, PpeItem, PpeStatus, ProgressSink,
    ProgressUpdate, RiskLevel, Severity, WorkType,
};

// ── Re-exports: Layer 2 ──

pub use analyzer::{AnalysisCapability, AnalyzerTier, SafetyAnalyzer};
pub use checklist::ChecklistAnalyzer;
pub use cloud::{CloudAnalyzer, CloudAnalyzerConfig};
pub use fallback::{AttemptRecord, FallbackError, FallbackOrchestrator, FallbackOutcome};
pub use on_device::OnDeviceAnalyzer;

// ── Re-exports: Layer 3 ──

pub use events::{AuditEvent, AuditSink, MemoryAuditSink, TracingAuditSink};
pub use metrics::{
    jaccard_similarity, AccuracyTracker, MetricSample, MetricsHistory, PerformanceMetricSnapshot,
};
pub use monitor::{
    AccuracyCaseOutcome, AccuracyTestCase, AccuracyTestReport, PerformanceMonitor, UserFeedback,
};
pub use optimizer::{
    BenchmarkReport, BenchmarkTargets, Complexity, OptimizationAction, OptimizationCategory,
    OptimizationType, PerformanceOptimizationResult, PerformanceOptimizer, Trend,
};
