//! On-device analyzer backed by the [`ModelEngine`].

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use super::analyzer::{AnalysisCapability, AnalyzerTier, SafetyAnalyzer};
use super::backend::BackendSelection;
use super::engine::ModelEngine;
use super::error::AnalysisError;
use super::types::{AnalysisRequest, AnalysisResult};

pub const DEFAULT_ON_DEVICE_PRIORITY: i32 = 100;

/// Highest tier: runs the local model through a shared engine.
pub struct OnDeviceAnalyzer {
    name: String,
    engine: Arc<ModelEngine>,
    model_path: PathBuf,
    selection: BackendSelection,
    priority: i32,
}

impl std::fmt::Debug for OnDeviceAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnDeviceAnalyzer")
            .field("name", &self.name)
            .field("model_path", &self.model_path)
            .field("selection", &self.selection)
            .field("priority", &self.priority)
            .field("engine_state", &self.engine.state())
            .finish()
    }
}

impl OnDeviceAnalyzer {
    pub fn new(engine: Arc<ModelEngine>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            name: "on-device".to_string(),
            engine,
            model_path: model_path.into(),
            selection: BackendSelection::Auto,
            priority: DEFAULT_ON_DEVICE_PRIORITY,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_backend(mut self, selection: impl Into<BackendSelection>) -> Self {
        self.selection = selection.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn engine(&self) -> &Arc<ModelEngine> {
        &self.engine
    }
}

#[async_trait]
impl SafetyAnalyzer for OnDeviceAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    fn tier(&self) -> AnalyzerTier {
        AnalyzerTier::OnDevice
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn capabilities(&self) -> BTreeSet<AnalysisCapability> {
        let mut caps = BTreeSet::from([
            AnalysisCapability::PpeDetection,
            AnalysisCapability::HazardIdentification,
            AnalysisCapability::OshaCompliance,
            AnalysisCapability::OfflineOperation,
            AnalysisCapability::BoundingBoxes,
        ]);
        if self.engine.active_backend().is_some_and(|k| k.is_accelerated()) {
            caps.insert(AnalysisCapability::HardwareAcceleration);
        }
        caps
    }

    async fn is_available(&self) -> bool {
        self.engine.is_available()
    }

    async fn configure(&self, _api_key: Option<&str>) -> Result<(), AnalysisError> {
        self.engine.initialize(&self.model_path, self.selection).await
    }

    async fn analyze_photo(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        self.engine.generate_safety_analysis(request).await
    }

    async fn cleanup(&self) {
        self.engine.cleanup().await;
    }
}
