//! FallbackOrchestrator: Tiered Analysis with Typed Fallback
//!
//! The orchestrator walks its analyzers from highest to lowest priority and
//! lets each failure's [`ErrorClass`] decide what happens next:
//!
//! ```text
//!                 ┌─────────────────────────────┐
//!                 │   Trying(analyzer i)        │◀──────────────┐
//!                 └──────────────┬──────────────┘               │
//!          ok                    │ err                          │
//!   ┌────────────────┐           ▼                              │
//!   │ Done(outcome)  │   ┌──────────────────┐                   │
//!   └────────────────┘   │ error.class()    │                   │
//!                        └──┬───┬───┬───┬───┘                   │
//!          Validation ──────┘   │   │   └────── Cancelled ──▶ Cancelled
//!              │                │   │
//!              ▼      Transient │   │ Resource / Initialization
//!          Rejected     (1st)   │   │ Transient (2nd)
//!                     retry i ──┘   └──── i + 1 ───────────────┘
//!                                          │
//!                                  no more analyzers
//!                                          ▼
//!                                     Exhausted
//! ```
//!
//! Fallback is strictly sequential: a lower tier only runs after every
//! higher tier has failed or declared itself unavailable.

use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use super::analyzer::{AnalyzerTier, SafetyAnalyzer};
use super::error::{AnalysisError, ErrorClass};
use super::monitor::PerformanceMonitor;
use super::types::{AnalysisRequest, AnalysisResult};

// ============================================================================
// Outcome types
// ============================================================================

/// One failed attempt, in the order it happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptRecord {
    pub analyzer: String,
    pub tier: AnalyzerTier,
    /// 1 for the first call on this analyzer, 2 for the retry.
    pub attempt: u32,
    pub class: ErrorClass,
    pub reason: String,
}

impl fmt::Display for AttemptRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) attempt {}: {}",
            self.analyzer, self.tier, self.attempt, self.reason
        )
    }
}

/// A successful analysis and the failures it took to get there.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FallbackOutcome {
    pub result: AnalysisResult,
    pub analyzer_name: String,
    pub tier: AnalyzerTier,
    pub attempts: Vec<AttemptRecord>,
}

impl FallbackOutcome {
    /// Whether a failure was masked or only the checklist tier answered.
    pub fn is_degraded(&self) -> bool {
        !self.attempts.is_empty() || self.tier == AnalyzerTier::LegacyLocal
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    #[error("No analyzers registered")]
    NoAnalyzers,

    #[error("Request rejected by {analyzer}: {source}")]
    Rejected {
        analyzer: String,
        #[source]
        source: AnalysisError,
    },

    #[error("Analysis cancelled after {} failed attempt(s)", .attempts.len())]
    Cancelled { attempts: Vec<AttemptRecord> },

    #[error("All analyzers failed: {}", format_attempts(.attempts))]
    Exhausted { attempts: Vec<AttemptRecord> },
}

impl FallbackError {
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            FallbackError::Cancelled { attempts } | FallbackError::Exhausted { attempts } => {
                attempts
            }
            FallbackError::NoAnalyzers | FallbackError::Rejected { .. } => &[],
        }
    }
}

fn format_attempts(attempts: &[AttemptRecord]) -> String {
    attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// FallbackOrchestrator
// ============================================================================

/// Priority-ordered analyzer chain.
///
/// ```rust,ignore
/// let orchestrator = FallbackOrchestrator::new(vec![
///     Arc::new(OnDeviceAnalyzer::new(engine, "/models/hazard.tflite")),
///     Arc::new(CloudAnalyzer::new(cloud_config)),
///     Arc::new(ChecklistAnalyzer::new()),
/// ])
/// .with_monitor(monitor.clone());
///
/// orchestrator.configure_all(Some(api_key)).await;
/// let outcome = orchestrator.analyze(&request).await?;
/// ```
pub struct FallbackOrchestrator {
    analyzers: Vec<Arc<dyn SafetyAnalyzer>>,
    monitor: Option<Arc<PerformanceMonitor>>,
}

impl fmt::Debug for FallbackOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chain: Vec<String> = self
            .analyzers
            .iter()
            .map(|a| format!("{}@{}", a.name(), a.priority()))
            .collect();
        f.debug_struct("FallbackOrchestrator")
            .field("analyzers", &chain)
            .field("monitored", &self.monitor.is_some())
            .finish()
    }
}

impl FallbackOrchestrator {
    /// Analyzers are ordered by descending priority; ties keep insertion order.
    pub fn new(mut analyzers: Vec<Arc<dyn SafetyAnalyzer>>) -> Self {
        analyzers.sort_by_key(|a| Reverse(a.priority()));
        tracing::info!(
            "FallbackOrchestrator: chain = [{}]",
            analyzers
                .iter()
                .map(|a| a.name().to_string())
                .collect::<Vec<_>>()
                .join(" → ")
        );
        Self {
            analyzers,
            monitor: None,
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<PerformanceMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn analyzers(&self) -> &[Arc<dyn SafetyAnalyzer>] {
        &self.analyzers
    }

    pub fn monitor(&self) -> Option<&Arc<PerformanceMonitor>> {
        self.monitor.as_ref()
    }

    /// Configure every analyzer. Failures are logged and returned, never
    /// fatal: an analyzer that fails here is skipped as unavailable later.
    pub async fn configure_all(&self, api_key: Option<&str>) -> Vec<(String, AnalysisError)> {
        let mut failures = Vec::new();
        for analyzer in &self.analyzers {
            if let Err(e) = analyzer.configure(api_key).await {
                tracing::warn!("FallbackOrchestrator: configure '{}' failed: {}", analyzer.name(), e);
                failures.push((analyzer.name().to_string(), e));
            }
        }
        failures
    }

    /// Run `request` down the chain until an analyzer succeeds.
    ///
    /// With a monitor attached, the outcome is recorded with the latency of
    /// the whole chain, including failed higher tiers.
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<FallbackOutcome, FallbackError> {
        self.run(request, self.monitor.as_deref()).await
    }

    /// Same chain as [`analyze`](Self::analyze), but never touches the
    /// monitor's latency history. Used by the accuracy suite.
    pub(crate) async fn analyze_unmonitored(
        &self,
        request: &AnalysisRequest,
    ) -> Result<FallbackOutcome, FallbackError> {
        self.run(request, None).await
    }

    async fn run(
        &self,
        request: &AnalysisRequest,
        monitor: Option<&PerformanceMonitor>,
    ) -> Result<FallbackOutcome, FallbackError> {
        if self.analyzers.is_empty() {
            return Err(FallbackError::NoAnalyzers);
        }

        let started = Instant::now();
        let mut attempts: Vec<AttemptRecord> = Vec::new();

        for analyzer in &self.analyzers {
            if request.cancel.is_cancelled() {
                return Err(FallbackError::Cancelled { attempts });
            }

            if !analyzer.is_available().await {
                tracing::debug!("FallbackOrchestrator: '{}' unavailable, skipping", analyzer.name());
                attempts.push(AttemptRecord {
                    analyzer: analyzer.name().to_string(),
                    tier: analyzer.tier(),
                    attempt: 1,
                    class: ErrorClass::Resource,
                    reason: "analyzer unavailable".to_string(),
                });
                continue;
            }

            let mut attempt = 1;
            loop {
                match analyzer.analyze_photo(request).await {
                    Ok(result) => {
                        let elapsed_ms = started.elapsed().as_millis() as u64;
                        let outcome = Self::finish(analyzer.as_ref(), result, attempts);
                        if let Some(monitor) = monitor {
                            let work_type = request.work_type;
                            monitor.record_success(&outcome.result, work_type, elapsed_ms, None);
                        }
                        return Ok(outcome);
                    }
                    Err(error) => {
                        let class = error.class();
                        if class == ErrorClass::Validation {
                            tracing::info!(
                                "FallbackOrchestrator: '{}' rejected request: {}",
                                analyzer.name(),
                                error
                            );
                            return Err(FallbackError::Rejected {
                                analyzer: analyzer.name().to_string(),
                                source: error,
                            });
                        }

                        tracing::warn!(
                            "FallbackOrchestrator: '{}' attempt {} failed: {}",
                            analyzer.name(),
                            attempt,
                            error
                        );
                        attempts.push(AttemptRecord {
                            analyzer: analyzer.name().to_string(),
                            tier: analyzer.tier(),
                            attempt,
                            class,
                            reason: error.to_string(),
                        });

                        match class {
                            ErrorClass::Cancelled => {
                                return Err(FallbackError::Cancelled { attempts })
                            }
                            ErrorClass::Transient if attempt == 1 => attempt += 1,
                            _ => break,
                        }
                    }
                }
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::error!(
            "FallbackOrchestrator: all {} analyzers failed after {}ms",
            self.analyzers.len(),
            elapsed_ms
        );
        if let Some(monitor) = monitor {
            monitor.record_failure(request.work_type, elapsed_ms, None);
        }
        Err(FallbackError::Exhausted { attempts })
    }

    fn finish(
        analyzer: &dyn SafetyAnalyzer,
        mut result: AnalysisResult,
        attempts: Vec<AttemptRecord>,
    ) -> FallbackOutcome {
        result.analyzer_name = analyzer.name().to_string();
        result.normalize();

        if attempts.is_empty() {
            tracing::debug!("FallbackOrchestrator: served by '{}'", analyzer.name());
        } else {
            tracing::info!(
                "FallbackOrchestrator: served by '{}' after {} failed attempt(s)",
                analyzer.name(),
                attempts.len()
            );
        }

        FallbackOutcome {
            analyzer_name: analyzer.name().to_string(),
            tier: analyzer.tier(),
            result,
            attempts,
        }
    }

    /// Clean up every analyzer.
    pub async fn shutdown(&self) {
        tracing::info!("FallbackOrchestrator: shutting down {} analyzers", self.analyzers.len());
        for analyzer in &self.analyzers {
            analyzer.cleanup().await;
        }
    }
}
