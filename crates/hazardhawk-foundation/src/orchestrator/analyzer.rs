//! SafetyAnalyzer: the Unified Analyzer Abstraction
//!
//! Every tier the fallback orchestrator can call implements [`SafetyAnalyzer`]:
//!
//! | Analyzer | Tier | Default priority |
//! |---|---|---|
//! | [`OnDeviceAnalyzer`](super::on_device::OnDeviceAnalyzer) | on-device model | 100 |
//! | [`CloudAnalyzer`](super::cloud::CloudAnalyzer) | remote model | 50 |
//! | [`ChecklistAnalyzer`](super::checklist::ChecklistAnalyzer) | legacy checklist | 10 |
//!
//! The trait is object-safe (via `async_trait`) so the orchestrator holds a
//! heterogeneous `Vec<Arc<dyn SafetyAnalyzer>>`.

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use super::error::AnalysisError;
use super::types::{AnalysisRequest, AnalysisResult};

/// What an analyzer can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisCapability {
    PpeDetection,
    HazardIdentification,
    OshaCompliance,
    HardwareAcceleration,
    OfflineOperation,
    BoundingBoxes,
}

/// Which kind of analyzer produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalyzerTier {
    OnDevice,
    Cloud,
    LegacyLocal,
}

impl AnalyzerTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyzerTier::OnDevice => "ON_DEVICE",
            AnalyzerTier::Cloud => "CLOUD",
            AnalyzerTier::LegacyLocal => "LEGACY_LOCAL",
        }
    }
}

impl fmt::Display for AnalyzerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A safety analysis tier.
///
/// # Contract
///
/// - `analyze_photo` must return a normalized [`AnalysisResult`] or a typed
///   [`AnalysisError`]; it must never panic on bad input.
/// - `configure` is idempotent and may be retried after a failure.
/// - `cleanup` is idempotent; afterwards `is_available` returns `false`.
#[async_trait]
pub trait SafetyAnalyzer: Send + Sync {
    fn name(&self) -> &str;

    fn tier(&self) -> AnalyzerTier;

    /// Higher runs first.
    fn priority(&self) -> i32;

    fn capabilities(&self) -> BTreeSet<AnalysisCapability>;

    async fn is_available(&self) -> bool;

    /// Prepare the analyzer. Tiers that need no credentials ignore `api_key`.
    async fn configure(&self, api_key: Option<&str>) -> Result<(), AnalysisError>;

    async fn analyze_photo(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError>;

    async fn cleanup(&self);
}
