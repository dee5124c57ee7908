//! Analysis Error Taxonomy
//!
//! Every failure that can come out of an engine or analyzer is an
//! [`AnalysisError`]. The fallback orchestrator never inspects error strings;
//! it matches on [`AnalysisError::class`], which is an exhaustive match so a
//! new variant cannot be added without deciding how the fallback chain treats
//! it.
//!
//! ```text
//! ┌──────────────────┬───────────────────────────────────┬──────────────────────┐
//! │ Class            │ Variants                          │ Orchestrator action  │
//! ├──────────────────┼───────────────────────────────────┼──────────────────────┤
//! │ Initialization   │ Initialization, ModelLoad,        │ next analyzer        │
//! │                  │ UnsupportedBackend                │                      │
//! │ Resource         │ OutOfMemory, Unavailable, Remote  │ next analyzer        │
//! │ Transient        │ Inference, ThermalThrottling      │ retry once, then     │
//! │                  │                                   │ next analyzer        │
//! │ Validation       │ InvalidInput, UnsupportedContent  │ fail immediately     │
//! │ Cancelled        │ Cancelled                         │ stop immediately     │
//! └──────────────────┴───────────────────────────────────┴──────────────────────┘
//! ```

use serde::Serialize;

use super::backend::BackendKind;

/// Typed failure of an engine, analyzer or configuration step.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    /// Engine or analyzer setup failed (no matching descriptor, bad config,
    /// rejected credentials).
    #[error("Initialization failed: {0}")]
    Initialization(String),

    /// The model file or its manifest could not be read or parsed.
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    /// The device lacks the hardware path required by the backend, or the
    /// model was not built for it.
    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(BackendKind),

    /// The pre-flight memory estimate exceeds the available budget.
    #[error("Out of memory: inference needs {required_mb}MB but only {available_mb}MB is available")]
    OutOfMemory { required_mb: u64, available_mb: u64 },

    /// The platform reported thermal throttling around the inference call.
    #[error("Thermal throttling at {temperature_c:.1}°C")]
    ThermalThrottling { temperature_c: f32 },

    /// The model failed while running.
    #[error("Inference failed: {0}")]
    Inference(String),

    /// A remote analysis service failed after its own retry budget. The
    /// budget is spent, so the chain moves on rather than retrying.
    #[error("Remote analysis failed (status {status:?}): {message}")]
    Remote { status: Option<u16>, message: String },

    /// The analyzer is not configured or has been cleaned up.
    #[error("Analyzer unavailable: {0}")]
    Unavailable(String),

    /// The request itself is malformed (empty image, threshold out of range).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The image payload is not a format any analyzer accepts.
    #[error("Unsupported content: {0}")]
    UnsupportedContent(String),

    /// The caller cancelled the request.
    #[error("Analysis cancelled")]
    Cancelled,
}

/// How the fallback chain reacts to an [`AnalysisError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorClass {
    /// Fatal to the current analyzer; fall back without retrying.
    Initialization,
    /// The analyzer cannot serve this request right now; fall back.
    Resource,
    /// Worth one more attempt on the same analyzer.
    Transient,
    /// A defect in the request; no analyzer will do better.
    Validation,
    /// The caller asked to stop.
    Cancelled,
}

impl AnalysisError {
    /// Classify this error for the fallback state machine.
    pub fn class(&self) -> ErrorClass {
        match self {
            AnalysisError::Initialization(_)
            | AnalysisError::ModelLoad(_)
            | AnalysisError::UnsupportedBackend(_) => ErrorClass::Initialization,
            AnalysisError::OutOfMemory { .. }
            | AnalysisError::Unavailable(_)
            | AnalysisError::Remote { .. } => ErrorClass::Resource,
            AnalysisError::Inference(_) | AnalysisError::ThermalThrottling { .. } => {
                ErrorClass::Transient
            }
            AnalysisError::InvalidInput(_) | AnalysisError::UnsupportedContent(_) => {
                ErrorClass::Validation
            }
            AnalysisError::Cancelled => ErrorClass::Cancelled,
        }
    }

    /// Whether the orchestrator may try this same analyzer once more.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Whether the orchestrator may move on to a lower-priority analyzer.
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::Initialization | ErrorClass::Resource | ErrorClass::Transient
        )
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
