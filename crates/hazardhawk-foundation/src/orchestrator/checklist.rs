//! Checklist analyzer: the last-resort tier.
//!
//! Needs no model and no network. It cannot see the photo, so it reports the
//! PPE the work type requires as `Unknown` and lists the hazard that work
//! type typically carries, at a fixed low confidence. Its results always
//! count as degraded.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use async_trait::async_trait;

use super::analyzer::{AnalysisCapability, AnalyzerTier, SafetyAnalyzer};
use super::catalog;
use super::error::AnalysisError;
use super::types::{
    AnalysisRequest, AnalysisResult, AnalysisStage, Hazard, PpeDetection, PpeStatus, RiskLevel,
};

pub const DEFAULT_CHECKLIST_PRIORITY: i32 = 10;

/// Confidence attached to checklist output.
pub const CHECKLIST_CONFIDENCE: f32 = 0.3;

#[derive(Debug)]
pub struct ChecklistAnalyzer {
    priority: i32,
    available: AtomicBool,
}

impl Default for ChecklistAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChecklistAnalyzer {
    pub fn new() -> Self {
        Self {
            priority: DEFAULT_CHECKLIST_PRIORITY,
            available: AtomicBool::new(true),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[async_trait]
impl SafetyAnalyzer for ChecklistAnalyzer {
    fn name(&self) -> &str {
        "checklist"
    }

    fn tier(&self) -> AnalyzerTier {
        AnalyzerTier::LegacyLocal
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn capabilities(&self) -> BTreeSet<AnalysisCapability> {
        BTreeSet::from([
            AnalysisCapability::OshaCompliance,
            AnalysisCapability::OfflineOperation,
        ])
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    async fn configure(&self, _api_key: Option<&str>) -> Result<(), AnalysisError> {
        self.available.store(true, Ordering::Release);
        Ok(())
    }

    async fn analyze_photo(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        request.validate()?;
        if !self.available.load(Ordering::Acquire) {
            return Err(AnalysisError::unavailable("checklist analyzer was cleaned up"));
        }
        if request.cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let started = Instant::now();
        request.report(AnalysisStage::Initializing);

        let mut result = AnalysisResult::empty("CHECKLIST");
        for item in request.work_type.required_ppe() {
            result.ppe_status.insert(
                *item,
                PpeDetection {
                    status: PpeStatus::Unknown,
                    confidence: 0.0,
                },
            );
        }

        if let Some(entry) = catalog::typical_hazard(request.work_type) {
            result.hazards.push(Hazard {
                tag: entry.tag.to_string(),
                hazard_type: entry.hazard_type,
                description: format!("Verify on site: {}", entry.description.to_lowercase()),
                severity: entry.severity,
                confidence: CHECKLIST_CONFIDENCE,
                osha_code: request
                    .include_osha_codes
                    .then(|| entry.osha_code.to_string()),
                bounding_box: None,
                recommendations: entry.recommendations.iter().map(|r| r.to_string()).collect(),
            });
        }

        result.overall_risk = RiskLevel::assess(&result.hazards);
        result.ai_confidence = CHECKLIST_CONFIDENCE;
        result.debug_info = Some(format!(
            "checklist for {}; photo not inspected",
            request.work_type
        ));
        result.processing_time_ms = started.elapsed().as_millis() as u64;
        result.normalize();

        request.report(AnalysisStage::Finalizing);
        Ok(result)
    }

    async fn cleanup(&self) {
        self.available.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::test_support::jpeg_request;
    use crate::orchestrator::types::{PpeItem, Severity, WorkType};

    #[tokio::test]
    async fn test_fall_protection_checklist() {
        let analyzer = ChecklistAnalyzer::new();
        let result = analyzer
            .analyze_photo(&jpeg_request(WorkType::FallProtection))
            .await
            .unwrap();

        assert_eq!(result.hazards.len(), 1);
        assert_eq!(result.hazards[0].tag, "fall-hazard");
        assert_eq!(result.hazards[0].severity, Severity::Critical);
        assert_eq!(
            result.ppe_status[&PpeItem::FallHarness].status,
            PpeStatus::Unknown
        );
        assert_eq!(result.ai_confidence, CHECKLIST_CONFIDENCE);
        assert!(result.osha_violations.is_empty());
    }

    #[tokio::test]
    async fn test_general_construction_has_no_typical_hazard() {
        let analyzer = ChecklistAnalyzer::new();
        let result = analyzer
            .analyze_photo(&jpeg_request(WorkType::GeneralConstruction))
            .await
            .unwrap();
        assert!(result.hazards.is_empty());
        assert_eq!(result.overall_risk, RiskLevel::Minimal);
        assert_eq!(result.ppe_status.len(), 2);
    }

    #[tokio::test]
    async fn test_still_validates_input() {
        let analyzer = ChecklistAnalyzer::new();
        let request = AnalysisRequest::new(b"GIF89a".to_vec(), WorkType::Welding);
        assert!(matches!(
            analyzer.analyze_photo(&request).await,
            Err(AnalysisError::UnsupportedContent(_))
        ));
    }

    #[tokio::test]
    async fn test_cleanup_and_reconfigure() {
        let analyzer = ChecklistAnalyzer::new().with_priority(1);
        analyzer.cleanup().await;
        assert!(!analyzer.is_available().await);
        assert!(matches!(
            analyzer.analyze_photo(&jpeg_request(WorkType::Roofing)).await,
            Err(AnalysisError::Unavailable(_))
        ));

        analyzer.configure(None).await.unwrap();
        assert!(analyzer.is_available().await);
        assert_eq!(analyzer.priority(), 1);
    }
}
