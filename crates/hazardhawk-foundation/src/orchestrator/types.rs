//! Core Types for Safety Analysis
//!
//! Request, result, progress and cancellation types shared by every engine,
//! analyzer and the fallback orchestrator.
//!
//! ## Result invariants
//!
//! An [`AnalysisResult`] that leaves the orchestrator always satisfies:
//!
//! - `0.0 <= ai_confidence <= 1.0` (every hazard confidence is clamped too)
//! - `hazards` is ordered by severity descending, then confidence descending
//!
//! Both are established by [`AnalysisResult::normalize`], which every tier
//! calls before returning and which the orchestrator calls again.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::error::AnalysisError;

// ============================================================================
// Work types
// ============================================================================

/// The kind of work shown in the photo; drives PPE requirements and
/// accuracy targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkType {
    GeneralConstruction,
    PpeCompliance,
    FallProtection,
    Electrical,
    HighRiseConstruction,
    Roofing,
    Excavation,
    Roadwork,
    Welding,
}

impl WorkType {
    pub const ALL: [WorkType; 9] = [
        WorkType::GeneralConstruction,
        WorkType::PpeCompliance,
        WorkType::FallProtection,
        WorkType::Electrical,
        WorkType::HighRiseConstruction,
        WorkType::Roofing,
        WorkType::Excavation,
        WorkType::Roadwork,
        WorkType::Welding,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkType::GeneralConstruction => "GENERAL_CONSTRUCTION",
            WorkType::PpeCompliance => "PPE_COMPLIANCE",
            WorkType::FallProtection => "FALL_PROTECTION",
            WorkType::Electrical => "ELECTRICAL",
            WorkType::HighRiseConstruction => "HIGH_RISE_CONSTRUCTION",
            WorkType::Roofing => "ROOFING",
            WorkType::Excavation => "EXCAVATION",
            WorkType::Roadwork => "ROADWORK",
            WorkType::Welding => "WELDING",
        }
    }

    /// Minimum acceptable tag accuracy (mean Jaccard) for this work type.
    pub fn accuracy_target(&self) -> f64 {
        match self {
            WorkType::PpeCompliance => 0.90,
            WorkType::FallProtection => 0.88,
            WorkType::Electrical => 0.85,
            _ => 0.85,
        }
    }

    /// PPE that must be visible for this kind of work.
    pub fn required_ppe(&self) -> &'static [PpeItem] {
        match self {
            WorkType::GeneralConstruction => &[PpeItem::HardHat, PpeItem::SafetyVest],
            WorkType::PpeCompliance => &[
                PpeItem::HardHat,
                PpeItem::SafetyVest,
                PpeItem::SafetyGlasses,
                PpeItem::SafetyBoots,
            ],
            WorkType::FallProtection | WorkType::Roofing => {
                &[PpeItem::HardHat, PpeItem::FallHarness]
            }
            WorkType::HighRiseConstruction => &[PpeItem::HardHat, PpeItem::FallHarness],
            WorkType::Electrical => &[PpeItem::HardHat, PpeItem::Gloves, PpeItem::SafetyGlasses],
            WorkType::Excavation => &[PpeItem::HardHat, PpeItem::SafetyVest],
            WorkType::Roadwork => &[PpeItem::SafetyVest],
            WorkType::Welding => &[PpeItem::SafetyGlasses, PpeItem::Gloves],
        }
    }
}

impl fmt::Display for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Hazards
// ============================================================================

/// Hazard severity. Ordering is ascending: `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HazardType {
    PpeViolation,
    FallHazard,
    ElectricalHazard,
    MachineryHazard,
    VehicleTraffic,
    Housekeeping,
    Other,
}

/// Normalized bounding box; all fields in `[0, 1]` relative to the image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hazard {
    /// Stable tag used for accuracy scoring, e.g. `"no-hard-hat"`.
    pub tag: String,
    pub hazard_type: HazardType,
    pub description: String,
    pub severity: Severity,
    pub confidence: f32,
    pub osha_code: Option<String>,
    pub bounding_box: Option<BoundingBox>,
    pub recommendations: Vec<String>,
}

// ============================================================================
// PPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PpeItem {
    HardHat,
    SafetyVest,
    SafetyGlasses,
    Gloves,
    FallHarness,
    SafetyBoots,
}

impl PpeItem {
    /// Accuracy tag for the item being worn; the catalog's missing-PPE
    /// hazards use the same word with a `no-` prefix.
    pub fn tag(&self) -> &'static str {
        match self {
            PpeItem::HardHat => "hard-hat",
            PpeItem::SafetyVest => "safety-vest",
            PpeItem::SafetyGlasses => "safety-glasses",
            PpeItem::Gloves => "gloves",
            PpeItem::FallHarness => "fall-harness",
            PpeItem::SafetyBoots => "safety-boots",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PpeStatus {
    Present,
    Missing,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PpeDetection {
    pub status: PpeStatus,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OshaViolation {
    pub code: String,
    pub title: String,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Minimal,
    Low,
    Medium,
    High,
    Severe,
}

impl RiskLevel {
    /// Overall risk from the hazard list: the worst severity decides, and
    /// three or more high-severity hazards escalate to `Severe`.
    pub fn assess(hazards: &[Hazard]) -> Self {
        let high_count = hazards
            .iter()
            .filter(|h| h.severity >= Severity::High)
            .count();

        match hazards.iter().map(|h| h.severity).max() {
            None => RiskLevel::Minimal,
            Some(Severity::Critical) => RiskLevel::Severe,
            Some(Severity::High) if high_count >= 3 => RiskLevel::Severe,
            Some(Severity::High) => RiskLevel::High,
            Some(Severity::Medium) => RiskLevel::Medium,
            Some(Severity::Low) => RiskLevel::Low,
        }
    }
}

// ============================================================================
// AnalysisResult
// ============================================================================

/// Outcome of one safety analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: Uuid,
    pub hazards: Vec<Hazard>,
    pub ppe_status: BTreeMap<PpeItem, PpeDetection>,
    pub osha_violations: Vec<OshaViolation>,
    pub overall_risk: RiskLevel,
    pub ai_confidence: f32,
    pub processing_time_ms: u64,
    /// Backend identifier (`"GPU_OPENCL"`) or remote model name.
    pub backend_used: String,
    /// Analyzer that produced the result; stamped by the orchestrator.
    pub analyzer_name: String,
    pub debug_info: Option<String>,
}

impl AnalysisResult {
    /// Empty result for `backend_used`; callers fill in the rest.
    pub fn empty(backend_used: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            hazards: Vec::new(),
            ppe_status: BTreeMap::new(),
            osha_violations: Vec::new(),
            overall_risk: RiskLevel::Minimal,
            ai_confidence: 0.0,
            processing_time_ms: 0,
            backend_used: backend_used.into(),
            analyzer_name: String::new(),
            debug_info: None,
        }
    }

    /// Clamp confidences into `[0, 1]` and order hazards by
    /// (severity desc, confidence desc). Equal keys keep their relative order.
    pub fn normalize(&mut self) {
        self.ai_confidence = clamp_unit(self.ai_confidence);
        for hazard in &mut self.hazards {
            hazard.confidence = clamp_unit(hazard.confidence);
        }
        for detection in self.ppe_status.values_mut() {
            detection.confidence = clamp_unit(detection.confidence);
        }
        self.hazards.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.confidence.total_cmp(&a.confidence))
        });
    }

    /// Tags predicted by this result, used for accuracy scoring: every
    /// hazard tag plus the tag of each PPE item seen being worn.
    pub fn predicted_tags(&self) -> BTreeSet<String> {
        let worn = self
            .ppe_status
            .iter()
            .filter(|(_, d)| d.status == PpeStatus::Present)
            .map(|(item, _)| item.tag().to_string());
        self.hazards.iter().map(|h| h.tag.clone()).chain(worn).collect()
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.hazards.iter().map(|h| h.severity).max()
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Stages of a single on-device inference, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisStage {
    Initializing,
    Preprocessing,
    Inference,
    Postprocessing,
    Finalizing,
}

impl AnalysisStage {
    /// Progress value reported when the stage begins.
    pub fn progress(&self) -> f32 {
        match self {
            AnalysisStage::Initializing => 0.0,
            AnalysisStage::Preprocessing => 0.2,
            AnalysisStage::Inference => 0.4,
            AnalysisStage::Postprocessing => 0.8,
            AnalysisStage::Finalizing => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub stage: AnalysisStage,
    pub progress: f32,
}

/// Non-blocking progress channel from an analysis to its caller.
///
/// Reports go through an unbounded `tokio::sync::mpsc` channel, so the
/// inference task never waits on the consumer and the consumer never runs
/// inside the engine. Reports that would move progress backwards are dropped.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    tx: mpsc::UnboundedSender<ProgressUpdate>,
    last_bits: Arc<std::sync::atomic::AtomicU32>,
}

impl ProgressSink {
    /// Create a sink and the receiver the caller drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                last_bits: Arc::new(std::sync::atomic::AtomicU32::new(0.0f32.to_bits())),
            },
            rx,
        )
    }

    /// Report the start of `stage`.
    pub fn report(&self, stage: AnalysisStage) {
        self.report_progress(stage, stage.progress());
    }

    /// Report an explicit progress value within `stage`.
    pub fn report_progress(&self, stage: AnalysisStage, progress: f32) {
        use std::sync::atomic::Ordering;

        let progress = clamp_unit(progress);
        let last = f32::from_bits(self.last_bits.load(Ordering::Acquire));
        if progress < last {
            return;
        }
        self.last_bits.store(progress.to_bits(), Ordering::Release);
        // A dropped receiver only means nobody is listening.
        let _ = self.tx.send(ProgressUpdate { stage, progress });
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Cloneable cancellation flag backed by `tokio::sync::watch`.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so `wait_for` cannot fail.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

// ============================================================================
// AnalysisRequest
// ============================================================================

/// Recognised photo encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    /// Sniff the format from the leading magic bytes.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageFormat::Png)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageFormat::Webp)
        } else {
            None
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
        }
    }
}

/// Default minimum detection confidence.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;

/// One photo to analyze.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub image: Vec<u8>,
    pub work_type: WorkType,
    pub confidence_threshold: f32,
    pub include_osha_codes: bool,
    pub progress: Option<ProgressSink>,
    pub cancel: CancelToken,
}

impl AnalysisRequest {
    pub fn new(image: Vec<u8>, work_type: WorkType) -> Self {
        Self {
            image,
            work_type,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            include_osha_codes: true,
            progress: None,
            cancel: CancelToken::new(),
        }
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_osha_codes(mut self, include: bool) -> Self {
        self.include_osha_codes = include;
        self
    }

    pub fn with_progress(mut self, sink: ProgressSink) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Reject requests that no analyzer could serve.
    pub fn validate(&self) -> Result<ImageFormat, AnalysisError> {
        if self.image.is_empty() {
            return Err(AnalysisError::invalid_input("image payload is empty"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(AnalysisError::invalid_input(format!(
                "confidence threshold {} is outside [0, 1]",
                self.confidence_threshold
            )));
        }
        ImageFormat::detect(&self.image).ok_or_else(|| {
            AnalysisError::UnsupportedContent(
                "image is not JPEG, PNG or WebP".to_string(),
            )
        })
    }

    pub(crate) fn report(&self, stage: AnalysisStage) {
        if self.cancel.is_cancelled() {
            return;
        }
        if let Some(sink) = &self.progress {
            sink.report(stage);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) const JPEG_HEADER: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

    fn hazard(tag: &str, severity: Severity, confidence: f32) -> Hazard {
        Hazard {
            tag: tag.to_string(),
            hazard_type: HazardType::Other,
            description: String::new(),
            severity,
            confidence,
            osha_code: None,
            bounding_box: None,
            recommendations: Vec::new(),
        }
    }

    #[test]
    fn test_normalize_orders_by_severity_then_confidence() {
        let mut result = AnalysisResult::empty("CPU");
        result.hazards = vec![
            hazard("a", Severity::Medium, 0.9),
            hazard("b", Severity::Critical, 0.4),
            hazard("c", Severity::Medium, 0.95),
            hazard("d", Severity::High, 0.7),
        ];
        result.normalize();

        let tags: Vec<&str> = result.hazards.iter().map(|h| h.tag.as_str()).collect();
        assert_eq!(tags, vec!["b", "d", "c", "a"]);
    }

    #[test]
    fn test_normalize_clamps_confidence() {
        let mut result = AnalysisResult::empty("CPU");
        result.ai_confidence = 1.7;
        result.hazards = vec![hazard("x", Severity::Low, -0.2)];
        result.normalize();
        assert_eq!(result.ai_confidence, 1.0);
        assert_eq!(result.hazards[0].confidence, 0.0);

        result.ai_confidence = f32::NAN;
        result.normalize();
        assert_eq!(result.ai_confidence, 0.0);
    }

    #[test]
    fn test_risk_assessment() {
        assert_eq!(RiskLevel::assess(&[]), RiskLevel::Minimal);
        assert_eq!(
            RiskLevel::assess(&[hazard("a", Severity::Medium, 0.8)]),
            RiskLevel::Medium
        );
        let three_high = vec![
            hazard("a", Severity::High, 0.8),
            hazard("b", Severity::High, 0.8),
            hazard("c", Severity::High, 0.8),
        ];
        assert_eq!(RiskLevel::assess(&three_high), RiskLevel::Severe);
        assert_eq!(
            RiskLevel::assess(&[hazard("a", Severity::Critical, 0.5)]),
            RiskLevel::Severe
        );
    }

    #[test]
    fn test_image_format_detection() {
        assert_eq!(ImageFormat::detect(&JPEG_HEADER), Some(ImageFormat::Jpeg));
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0];
        assert_eq!(ImageFormat::detect(&png), Some(ImageFormat::Png));
        let webp = *b"RIFF\0\0\0\0WEBPVP8 ";
        assert_eq!(ImageFormat::detect(&webp), Some(ImageFormat::Webp));
        assert_eq!(ImageFormat::detect(b"hello world"), None);
    }

    #[test]
    fn test_request_validation() {
        let empty = AnalysisRequest::new(Vec::new(), WorkType::Electrical);
        assert!(matches!(empty.validate(), Err(AnalysisError::InvalidInput(_))));

        let text = AnalysisRequest::new(b"not an image".to_vec(), WorkType::Electrical);
        assert!(matches!(
            text.validate(),
            Err(AnalysisError::UnsupportedContent(_))
        ));

        let bad_threshold = AnalysisRequest::new(JPEG_HEADER.to_vec(), WorkType::Electrical)
            .with_confidence_threshold(1.5);
        assert!(matches!(
            bad_threshold.validate(),
            Err(AnalysisError::InvalidInput(_))
        ));

        let ok = AnalysisRequest::new(JPEG_HEADER.to_vec(), WorkType::Electrical);
        assert_eq!(ok.validate(), Ok(ImageFormat::Jpeg));
    }

    #[test]
    fn test_progress_sink_drops_regressions() {
        let (sink, mut rx) = ProgressSink::channel();
        sink.report(AnalysisStage::Preprocessing);
        sink.report(AnalysisStage::Initializing);
        sink.report(AnalysisStage::Finalizing);

        let mut seen = Vec::new();
        while let Ok(update) = rx.try_recv() {
            seen.push(update.progress);
        }
        assert_eq!(seen, vec![0.2, 1.0]);
    }

    #[tokio::test]
    async fn test_cancel_token() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());

        let waiter = tokio::spawn(async move { clone.cancelled().await });
        token.cancel();
        waiter.await.unwrap();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_accuracy_targets() {
        assert_eq!(WorkType::PpeCompliance.accuracy_target(), 0.90);
        assert_eq!(WorkType::FallProtection.accuracy_target(), 0.88);
        assert_eq!(WorkType::Electrical.accuracy_target(), 0.85);
        assert_eq!(WorkType::Roadwork.accuracy_target(), 0.85);
    }
}
