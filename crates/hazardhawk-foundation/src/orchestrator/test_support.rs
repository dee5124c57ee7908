//! Shared mocks for unit tests.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::backend::{BackendDescriptor, BackendKind, HardwarePlatform, ThermalReading};
use super::error::AnalysisError;
use super::runtime::{ModelManifest, ModelRuntime, ModelSession, PreparedImage, RawDetection, RawInference};
use super::types::{AnalysisRequest, WorkType};

pub(crate) const JPEG_HEADER: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

pub(crate) fn jpeg_request(work_type: WorkType) -> AnalysisRequest {
    AnalysisRequest::new(JPEG_HEADER.to_vec(), work_type)
}

/// Write `model.tflite` plus its JSON sidecar into a fresh temp dir.
pub(crate) fn write_model(backends: &[&str], min_memory_gb: f64) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let model = dir.path().join("model.tflite");
    std::fs::write(&model, b"weights").unwrap();
    let manifest = serde_json::json!({
        "name": "hazard-detector",
        "supported_backends": backends,
        "min_memory_gb": min_memory_gb,
        "classes": ["person", "hard_hat", "no_hard_hat", "fall_hazard"],
    });
    std::fs::write(ModelManifest::sidecar_path(&model), manifest.to_string()).unwrap();
    (dir, model)
}

// ============================================================================
// MockRuntime
// ============================================================================

#[derive(Default)]
pub(crate) struct MockState {
    pub detections: Vec<RawDetection>,
    pub delay_ms: AtomicU64,
    pub fail_inference: AtomicBool,
    pub infer_calls: AtomicUsize,
    pub release_calls: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub loaded: parking_lot::Mutex<Vec<BackendKind>>,
}

#[derive(Clone)]
pub(crate) struct MockRuntime {
    pub state: Arc<MockState>,
}

impl MockRuntime {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self {
            state: Arc::new(MockState {
                detections,
                ..Default::default()
            }),
        }
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.state
            .delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
        self
    }

    pub fn loaded_backends(&self) -> Vec<BackendKind> {
        self.state.loaded.lock().clone()
    }

    pub fn infer_calls(&self) -> usize {
        self.state.infer_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.state.release_calls.load(Ordering::SeqCst)
    }

    pub fn max_concurrent(&self) -> usize {
        self.state.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelRuntime for MockRuntime {
    fn name(&self) -> &str {
        "MockRuntime"
    }

    async fn load(
        &self,
        _model_path: &Path,
        backend: &BackendDescriptor,
        _manifest: &ModelManifest,
    ) -> Result<Box<dyn ModelSession>, AnalysisError> {
        self.state.loaded.lock().push(backend.kind);
        Ok(Box::new(MockSession {
            state: self.state.clone(),
        }))
    }
}

struct MockSession {
    state: Arc<MockState>,
}

#[async_trait]
impl ModelSession for MockSession {
    async fn infer(&mut self, _input: PreparedImage<'_>) -> Result<RawInference, AnalysisError> {
        let state = &self.state;
        state.infer_calls.fetch_add(1, Ordering::SeqCst);
        let active = state.active.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_active.fetch_max(active, Ordering::SeqCst);

        let delay = state.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        state.active.fetch_sub(1, Ordering::SeqCst);

        if state.fail_inference.load(Ordering::SeqCst) {
            return Err(AnalysisError::inference("mock tensor failure"));
        }
        Ok(RawInference {
            detections: state.detections.clone(),
            overall_confidence: None,
        })
    }

    async fn release(&mut self) {
        self.state.release_calls.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// MockPlatform
// ============================================================================

#[derive(Clone)]
pub(crate) struct MockPlatform {
    supported: BTreeSet<BackendKind>,
    memory_mb: Arc<AtomicU64>,
    thermal_reads: Arc<AtomicUsize>,
    /// 1-based read index from which the platform reports throttling.
    throttle_from: usize,
    throttle_temp_c: f32,
}

impl MockPlatform {
    pub fn new(supported: impl IntoIterator<Item = BackendKind>) -> Self {
        Self {
            supported: supported.into_iter().collect(),
            memory_mb: Arc::new(AtomicU64::new(16 * 1024)),
            thermal_reads: Arc::new(AtomicUsize::new(0)),
            throttle_from: usize::MAX,
            throttle_temp_c: 0.0,
        }
    }

    pub fn with_memory_mb(self, mb: u64) -> Self {
        self.memory_mb.store(mb, Ordering::SeqCst);
        self
    }

    pub fn throttle_from_read(mut self, read: usize, temperature_c: f32) -> Self {
        self.throttle_from = read;
        self.throttle_temp_c = temperature_c;
        self
    }
}

#[async_trait]
impl HardwarePlatform for MockPlatform {
    fn name(&self) -> &str {
        "MockPlatform"
    }

    async fn probe(&self, backend: BackendKind) -> bool {
        self.supported.contains(&backend)
    }

    async fn available_memory_mb(&self) -> u64 {
        self.memory_mb.load(Ordering::SeqCst)
    }

    async fn thermal_state(&self) -> ThermalReading {
        let read = self.thermal_reads.fetch_add(1, Ordering::SeqCst) + 1;
        if read >= self.throttle_from {
            ThermalReading::throttled(self.throttle_temp_c)
        } else {
            ThermalReading::nominal()
        }
    }
}
