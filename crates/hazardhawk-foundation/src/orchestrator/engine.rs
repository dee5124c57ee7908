//! ModelEngine: Backend Selection and Serialized On-Device Inference
//!
//! The engine owns one loaded model bound to one compute backend. It picks
//! the backend, guards every inference with memory and thermal checks, and
//! reports progress while the model runs.
//!
//! ## Backend selection
//!
//! ```text
//!   BackendSelection::Specific(kind)          BackendSelection::Auto
//!              │                                        │
//!              ▼                                        ▼
//!   ┌─────────────────────┐            ┌───────────────────────────────┐
//!   │ kind in table?      │── no ──▶   │ table ordered by expected     │
//!   │  (Initialization)   │            │ throughput, highest first     │
//!   └─────────┬───────────┘            └───────────────┬───────────────┘
//!             ▼                                        ▼
//!   ┌─────────────────────┐            ┌───────────────────────────────┐
//!   │ manifest lists it?  │            │ skip kinds the manifest lacks │
//!   │ platform probes it? │── no ──▶   │ first successful probe wins   │
//!   │ (UnsupportedBackend)│            │ none → Initialization         │
//!   └─────────┬───────────┘            └───────────────┬───────────────┘
//!             └──────────────────┬─────────────────────┘
//!                                ▼
//!                   ModelRuntime::load → Ready(kind)
//! ```
//!
//! ## Inference pipeline
//!
//! ```text
//! INITIALIZING 0.0 → memory pre-flight → PREPROCESSING 0.2 → thermal check
//!   → INFERENCE 0.4 (raced against cancel) → thermal check
//!   → POSTPROCESSING 0.8 → catalog assembly → FINALIZING 1.0
//! ```
//!
//! ## Concurrency
//!
//! The session sits behind a `tokio::sync::Mutex`, so initialize, inference
//! and cleanup on one engine never overlap and `cleanup` waits for an
//! in-flight call. Engine state and metrics sit behind `parking_lot` locks
//! and are readable without touching the session mutex.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use super::backend::{BackendDescriptor, BackendKind, BackendSelection, BackendTable, HardwarePlatform};
use super::catalog::{self, AssemblyOptions};
use super::config::EngineConfig;
use super::error::AnalysisError;
use super::runtime::{ModelManifest, ModelRuntime, ModelSession, PreparedImage};
use super::types::{AnalysisRequest, AnalysisResult, AnalysisStage, ImageFormat};

const BYTES_PER_MB: u64 = 1024 * 1024;

// ============================================================================
// EngineState
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Ready(BackendKind),
    Failed(String),
}

// ============================================================================
// EngineMetrics
// ============================================================================

/// Observed performance of one engine instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngineMetrics {
    pub backend: Option<BackendKind>,
    pub model_name: Option<String>,
    pub initialization_ms: Option<u64>,
    pub total_inferences: u64,
    pub successful_inferences: u64,
    pub failed_inferences: u64,
    /// Mean latency of successful inferences.
    pub average_inference_ms: f64,
    pub last_inference_ms: Option<u64>,
    /// Pre-flight memory estimate of the most recent call.
    pub last_memory_estimate_mb: Option<u64>,
    /// Raw detections per second of successful inference time.
    pub detections_per_second: f64,
}

#[derive(Debug, Default)]
struct MetricsAccumulator {
    metrics: EngineMetrics,
    success_ms_total: u64,
    detections_total: u64,
}

impl MetricsAccumulator {
    fn record(&mut self, outcome: &Result<AnalysisResult, AnalysisError>, elapsed_ms: u64, trace: &InferenceTrace) {
        let m = &mut self.metrics;
        m.total_inferences += 1;
        m.last_inference_ms = Some(elapsed_ms);
        if trace.memory_estimate_mb.is_some() {
            m.last_memory_estimate_mb = trace.memory_estimate_mb;
        }

        match outcome {
            Ok(_) => {
                m.successful_inferences += 1;
                self.success_ms_total += elapsed_ms;
                self.detections_total += trace.detections as u64;
                m.average_inference_ms =
                    self.success_ms_total as f64 / m.successful_inferences as f64;
                m.detections_per_second = if self.success_ms_total == 0 {
                    0.0
                } else {
                    self.detections_total as f64 / (self.success_ms_total as f64 / 1000.0)
                };
            }
            Err(_) => m.failed_inferences += 1,
        }
    }
}

/// Facts gathered while a single inference runs.
#[derive(Debug, Default)]
struct InferenceTrace {
    memory_estimate_mb: Option<u64>,
    detections: usize,
}

struct LoadedModel {
    descriptor: BackendDescriptor,
    manifest: ModelManifest,
    model_path: PathBuf,
    session: Box<dyn ModelSession>,
}

// ============================================================================
// ModelEngine
// ============================================================================

/// On-device inference engine bound to one model and one backend.
///
/// ```rust,ignore
/// let engine = ModelEngine::new(runtime, Arc::new(SystemPlatform::new()));
/// engine.initialize("/models/hazard.tflite", BackendSelection::Auto).await?;
/// let result = engine.generate_safety_analysis(&request).await?;
/// engine.cleanup().await;
/// ```
pub struct ModelEngine {
    runtime: Arc<dyn ModelRuntime>,
    platform: Arc<dyn HardwarePlatform>,
    table: BackendTable,
    config: EngineConfig,
    model: tokio::sync::Mutex<Option<LoadedModel>>,
    state: RwLock<EngineState>,
    metrics: Mutex<MetricsAccumulator>,
}

impl std::fmt::Debug for ModelEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEngine")
            .field("runtime", &self.runtime.name())
            .field("platform", &self.platform.name())
            .field("state", &*self.state.read())
            .field("config", &self.config)
            .finish()
    }
}

impl ModelEngine {
    pub fn new(runtime: Arc<dyn ModelRuntime>, platform: Arc<dyn HardwarePlatform>) -> Self {
        Self {
            runtime,
            platform,
            table: BackendTable::default(),
            config: EngineConfig::default(),
            model: tokio::sync::Mutex::new(None),
            state: RwLock::new(EngineState::Uninitialized),
            metrics: Mutex::new(MetricsAccumulator::default()),
        }
    }

    /// Restrict the backends this engine knows about.
    pub fn with_backend_table(mut self, table: BackendTable) -> Self {
        self.table = table;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state.read().clone()
    }

    pub fn is_available(&self) -> bool {
        matches!(*self.state.read(), EngineState::Ready(_))
    }

    pub fn active_backend(&self) -> Option<BackendKind> {
        match *self.state.read() {
            EngineState::Ready(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn performance_metrics(&self) -> EngineMetrics {
        self.metrics.lock().metrics.clone()
    }

    // ========================================================================
    // Initialization
    // ========================================================================

    /// Load the model at `model_path` onto the selected backend.
    ///
    /// Calling this while `Ready` is a no-op when the selection is `Auto` or
    /// names the active backend; switching backends requires
    /// [`cleanup`](Self::cleanup) first.
    pub async fn initialize(
        &self,
        model_path: impl AsRef<Path>,
        selection: BackendSelection,
    ) -> Result<(), AnalysisError> {
        let model_path = model_path.as_ref();
        let mut slot = self.model.lock().await;

        if let Some(loaded) = slot.as_ref() {
            let active = loaded.descriptor.kind;
            return match selection {
                BackendSelection::Specific(kind) if kind != active => {
                    Err(AnalysisError::Initialization(format!(
                        "engine is ready on {}; cleanup() before switching to {}",
                        active, kind
                    )))
                }
                _ if loaded.model_path != model_path => {
                    Err(AnalysisError::Initialization(format!(
                        "engine already holds {}; cleanup() before loading {}",
                        loaded.model_path.display(),
                        model_path.display()
                    )))
                }
                _ => {
                    tracing::debug!("ModelEngine: already ready on {}, skipping initialize", active);
                    Ok(())
                }
            };
        }

        *self.state.write() = EngineState::Initializing;
        let started = Instant::now();

        match self.load_model(model_path, selection).await {
            Ok(loaded) => {
                let kind = loaded.descriptor.kind;
                let elapsed_ms = started.elapsed().as_millis() as u64;
                tracing::info!(
                    "ModelEngine: '{}' ready on {} ({}) in {}ms",
                    loaded.manifest.name,
                    loaded.descriptor.display_name,
                    kind,
                    elapsed_ms
                );
                {
                    let mut metrics = self.metrics.lock();
                    metrics.metrics.backend = Some(kind);
                    metrics.metrics.model_name = Some(loaded.manifest.name.clone());
                    metrics.metrics.initialization_ms = Some(elapsed_ms);
                }
                *slot = Some(loaded);
                *self.state.write() = EngineState::Ready(kind);
                Ok(())
            }
            Err(e) => {
                tracing::error!("ModelEngine: initialization failed: {}", e);
                *self.state.write() = EngineState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn load_model(
        &self,
        model_path: &Path,
        selection: BackendSelection,
    ) -> Result<LoadedModel, AnalysisError> {
        let manifest = self.runtime.read_manifest(model_path).await?;
        let descriptor = self.resolve_backend(selection, &manifest).await?;
        let session = self.runtime.load(model_path, &descriptor, &manifest).await?;

        Ok(LoadedModel {
            descriptor,
            manifest,
            model_path: model_path.to_path_buf(),
            session,
        })
    }

    async fn resolve_backend(
        &self,
        selection: BackendSelection,
        manifest: &ModelManifest,
    ) -> Result<BackendDescriptor, AnalysisError> {
        match selection {
            BackendSelection::Specific(kind) => {
                let descriptor = *self.table.get(kind).ok_or_else(|| {
                    AnalysisError::Initialization(format!("no descriptor for backend {}", kind))
                })?;
                if !manifest.supports(kind) {
                    tracing::warn!(
                        "ModelEngine: model '{}' was not built for {}",
                        manifest.name,
                        kind
                    );
                    return Err(AnalysisError::UnsupportedBackend(kind));
                }
                if !self.platform.probe(kind).await {
                    tracing::warn!("ModelEngine: {} probe failed on {}", kind, self.platform.name());
                    return Err(AnalysisError::UnsupportedBackend(kind));
                }
                Ok(descriptor)
            }
            BackendSelection::Auto => {
                for descriptor in self.table.by_expected_throughput() {
                    if !manifest.supports(descriptor.kind) {
                        tracing::debug!(
                            "ModelEngine: skipping {}, not in manifest",
                            descriptor.kind
                        );
                        continue;
                    }
                    if self.platform.probe(descriptor.kind).await {
                        tracing::info!(
                            "ModelEngine: auto-selected {} (~{} tok/s expected)",
                            descriptor.kind,
                            descriptor.expected_throughput_tok_per_sec
                        );
                        return Ok(descriptor);
                    }
                }
                Err(AnalysisError::Initialization(format!(
                    "no backend supported by both '{}' and {}",
                    manifest.name,
                    self.platform.name()
                )))
            }
        }
    }

    // ========================================================================
    // Inference
    // ========================================================================

    /// Analyze one photo on the loaded model.
    pub async fn generate_safety_analysis(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResult, AnalysisError> {
        let format = request.validate()?;
        if request.cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        if !self.is_available() {
            return Err(AnalysisError::unavailable("model engine is not initialized"));
        }

        let started = Instant::now();
        let mut trace = InferenceTrace::default();
        let mut outcome = self.run_inference(request, format, &mut trace).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &mut outcome {
            Ok(result) => {
                result.processing_time_ms = elapsed_ms;
                tracing::debug!(
                    "ModelEngine: {} hazards on {} in {}ms",
                    result.hazards.len(),
                    result.backend_used,
                    elapsed_ms
                );
            }
            Err(AnalysisError::Cancelled) => {
                tracing::info!("ModelEngine: inference cancelled after {}ms", elapsed_ms)
            }
            Err(e) => tracing::warn!("ModelEngine: inference failed: {}", e),
        }

        self.metrics.lock().record(&outcome, elapsed_ms, &trace);
        outcome
    }

    async fn run_inference(
        &self,
        request: &AnalysisRequest,
        format: ImageFormat,
        trace: &mut InferenceTrace,
    ) -> Result<AnalysisResult, AnalysisError> {
        request.report(AnalysisStage::Initializing);

        let mut slot = tokio::select! {
            biased;
            _ = request.cancel.cancelled() => return Err(AnalysisError::Cancelled),
            guard = self.model.lock() => guard,
        };
        let loaded = slot
            .as_mut()
            .ok_or_else(|| AnalysisError::unavailable("model was released before inference"))?;

        let required_mb = loaded.manifest.min_memory_mb()
            + image_working_set_mb(request.image.len(), self.config.image_memory_factor);
        let available_mb = self
            .platform
            .available_memory_mb()
            .await
            .saturating_sub(self.config.memory_safety_margin_mb);
        trace.memory_estimate_mb = Some(required_mb);
        if required_mb > available_mb {
            return Err(AnalysisError::OutOfMemory {
                required_mb,
                available_mb,
            });
        }

        check_cancelled(request)?;
        request.report(AnalysisStage::Preprocessing);
        self.check_thermal().await?;
        let input = PreparedImage {
            bytes: &request.image,
            format,
            work_type: request.work_type,
            input_size: loaded.manifest.input_size,
        };

        check_cancelled(request)?;
        request.report(AnalysisStage::Inference);
        let raw = tokio::select! {
            biased;
            _ = request.cancel.cancelled() => return Err(AnalysisError::Cancelled),
            raw = loaded.session.infer(input) => raw?,
        };
        trace.detections = raw.detections.len();

        self.check_thermal().await?;
        check_cancelled(request)?;
        request.report(AnalysisStage::Postprocessing);

        let result = catalog::build_result(
            &raw,
            AssemblyOptions {
                work_type: request.work_type,
                confidence_threshold: request.confidence_threshold,
                include_osha_codes: request.include_osha_codes,
            },
            loaded.descriptor.kind.as_str(),
        );

        request.report(AnalysisStage::Finalizing);
        Ok(result)
    }

    async fn check_thermal(&self) -> Result<(), AnalysisError> {
        let reading = self.platform.thermal_state().await;
        if reading.throttling {
            let temperature_c = reading.temperature_c.unwrap_or_default();
            tracing::warn!("ModelEngine: thermal throttling at {:.1}°C", temperature_c);
            return Err(AnalysisError::ThermalThrottling { temperature_c });
        }
        Ok(())
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    /// Release the model. Waits for an in-flight inference; safe to call
    /// any number of times.
    pub async fn cleanup(&self) {
        let mut slot = self.model.lock().await;
        match slot.take() {
            Some(mut loaded) => {
                loaded.session.release().await;
                tracing::info!(
                    "ModelEngine: released '{}' from {}",
                    loaded.manifest.name,
                    loaded.descriptor.kind
                );
            }
            None => tracing::debug!("ModelEngine: cleanup with no model loaded"),
        }
        *self.state.write() = EngineState::Uninitialized;
        self.metrics.lock().metrics.backend = None;
    }
}

fn check_cancelled(request: &AnalysisRequest) -> Result<(), AnalysisError> {
    if request.cancel.is_cancelled() {
        Err(AnalysisError::Cancelled)
    } else {
        Ok(())
    }
}

/// Decoded working memory for an encoded image, rounded up to whole MiB.
fn image_working_set_mb(encoded_len: usize, factor: u64) -> u64 {
    (encoded_len as u64 * factor).div_ceil(BYTES_PER_MB)
}
