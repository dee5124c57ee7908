//! Model Runtime Seam
//!
//! The engine never touches model weights. Loading and running a model is
//! delegated to a [`ModelRuntime`], which hands back a [`ModelSession`] bound
//! to one backend. Sessions return raw class detections; turning those into
//! hazards, PPE status and OSHA citations is the catalog's job.
//!
//! ## Lifecycle
//!
//! ```text
//! ┌────────────────┐     ┌───────────────┐     ┌───────────┐     ┌───────────┐
//! │ read_manifest()│ ──▶ │    load()     │ ──▶ │  infer()  │ ──▶ │ release() │
//! │ (sidecar JSON) │     │ (per backend) │     │ (serial)  │     │           │
//! └────────────────┘     └───────────────┘     └───────────┘     └───────────┘
//! ```
//!
//! Sessions are driven under the engine's mutex, so `infer` takes `&mut self`
//! and implementations need no internal locking.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::backend::{BackendDescriptor, BackendKind};
use super::error::AnalysisError;
use super::types::{BoundingBox, ImageFormat, WorkType};

// ============================================================================
// Model manifest
// ============================================================================

/// Metadata shipped next to a model file.
///
/// ```json
/// {
///   "name": "yolov8n-ppe",
///   "version": "1.2.0",
///   "input_size": 640,
///   "supported_backends": ["CPU", "GPU_OPENCL", "NPU_NNAPI"],
///   "min_memory_gb": 2.0,
///   "accuracy_score": 0.87,
///   "classes": ["person", "hard_hat", "no_hard_hat"],
///   "inference_time_ms": { "CPU": 420, "GPU": 120 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default = "default_input_size")]
    pub input_size: u32,
    /// Wire names; unknown names are ignored.
    pub supported_backends: Vec<String>,
    pub min_memory_gb: f64,
    #[serde(default)]
    pub accuracy_score: Option<f64>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub inference_time_ms: BTreeMap<String, u64>,
}

fn default_input_size() -> u32 {
    640
}

impl ModelManifest {
    pub fn from_json(text: &str) -> Result<Self, AnalysisError> {
        let manifest: ModelManifest = serde_json::from_str(text)
            .map_err(|e| AnalysisError::ModelLoad(format!("invalid model manifest: {}", e)))?;
        if manifest.supported_backends().is_empty() {
            return Err(AnalysisError::ModelLoad(format!(
                "model '{}' declares no known backends",
                manifest.name
            )));
        }
        if !(manifest.min_memory_gb.is_finite() && manifest.min_memory_gb >= 0.0) {
            return Err(AnalysisError::ModelLoad(format!(
                "model '{}' has an invalid memory requirement",
                manifest.name
            )));
        }
        Ok(manifest)
    }

    pub fn supported_backends(&self) -> Vec<BackendKind> {
        let mut kinds: Vec<BackendKind> = Vec::new();
        for kind in self
            .supported_backends
            .iter()
            .filter_map(|name| BackendKind::parse(name))
        {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds
    }

    pub fn supports(&self, backend: BackendKind) -> bool {
        self.supported_backends().contains(&backend)
    }

    /// Resident memory the model needs, in MiB.
    pub fn min_memory_mb(&self) -> u64 {
        (self.min_memory_gb * 1024.0).ceil() as u64
    }

    /// Sidecar manifest location for a model file: `model.tflite` → `model.json`.
    pub fn sidecar_path(model_path: &Path) -> PathBuf {
        model_path.with_extension("json")
    }
}

// ============================================================================
// Session I/O
// ============================================================================

/// Input handed to a session after preprocessing.
#[derive(Debug, Clone, Copy)]
pub struct PreparedImage<'a> {
    pub bytes: &'a [u8],
    pub format: ImageFormat,
    pub work_type: WorkType,
    /// Square model input edge in pixels.
    pub input_size: u32,
}

/// One class detection from the model, before catalog mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub label: String,
    pub score: f32,
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
}

impl RawDetection {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
            bounding_box: None,
        }
    }

    pub fn with_box(mut self, bounding_box: BoundingBox) -> Self {
        self.bounding_box = Some(bounding_box);
        self
    }
}

/// Everything a session returns for one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawInference {
    pub detections: Vec<RawDetection>,
    /// Whole-image confidence if the model produces one.
    #[serde(default)]
    pub overall_confidence: Option<f32>,
}

// ============================================================================
// Traits
// ============================================================================

/// Loads models for a given backend.
#[async_trait]
pub trait ModelRuntime: Send + Sync {
    fn name(&self) -> &str;

    /// Read the manifest for `model_path`.
    ///
    /// The default reads the JSON sidecar next to the model file.
    async fn read_manifest(&self, model_path: &Path) -> Result<ModelManifest, AnalysisError> {
        let sidecar = ModelManifest::sidecar_path(model_path);
        let text = tokio::fs::read_to_string(&sidecar).await.map_err(|e| {
            AnalysisError::ModelLoad(format!(
                "cannot read manifest {}: {}",
                sidecar.display(),
                e
            ))
        })?;
        ModelManifest::from_json(&text)
    }

    /// Load the model onto `backend`.
    async fn load(
        &self,
        model_path: &Path,
        backend: &BackendDescriptor,
        manifest: &ModelManifest,
    ) -> Result<Box<dyn ModelSession>, AnalysisError>;
}

/// A loaded model bound to one backend.
#[async_trait]
pub trait ModelSession: Send {
    async fn infer(&mut self, input: PreparedImage<'_>) -> Result<RawInference, AnalysisError>;

    /// Release native memory. Called exactly once, from cleanup.
    async fn release(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "name": "yolov8n-ppe",
        "supported_backends": ["CPU", "GPU", "NPU_NNAPI", "TPU"],
        "min_memory_gb": 2.0,
        "classes": ["person", "hardhat", "no-hardhat"],
        "inference_time_ms": { "CPU": 420, "GPU": 120 }
    }"#;

    #[test]
    fn test_manifest_parsing() {
        let manifest = ModelManifest::from_json(MANIFEST).unwrap();
        assert_eq!(manifest.input_size, 640);
        assert_eq!(manifest.min_memory_mb(), 2048);
        assert_eq!(
            manifest.supported_backends(),
            vec![BackendKind::Cpu, BackendKind::GpuOpencl, BackendKind::NpuNnapi]
        );
        assert!(!manifest.supports(BackendKind::NpuVendor));
    }

    #[test]
    fn test_manifest_rejects_garbage() {
        let err = ModelManifest::from_json("{not json").unwrap_err();
        assert!(matches!(err, AnalysisError::ModelLoad(_)));
    }

    #[test]
    fn test_manifest_requires_known_backend() {
        let err = ModelManifest::from_json(
            r#"{"name": "m", "supported_backends": ["TPU"], "min_memory_gb": 1.0}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no known backends"));
    }

    #[test]
    fn test_sidecar_path() {
        let path = ModelManifest::sidecar_path(Path::new("/models/hazard.tflite"));
        assert_eq!(path, PathBuf::from("/models/hazard.json"));
    }
}
