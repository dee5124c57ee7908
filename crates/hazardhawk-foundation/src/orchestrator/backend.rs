//! Compute Backend Descriptors and the Hardware Platform Trait
//!
//! A *backend* is one hardware execution path for model inference. Each path
//! is described once by a static [`BackendDescriptor`]; the table is
//! read-only for the life of the process.
//!
//! ```text
//! ┌─────────────┬─────────────────┬──────────────┬─────────────┬───────────┐
//! │ Kind        │ Display name    │ Expected t/s │ Power       │ Memory    │
//! ├─────────────┼─────────────────┼──────────────┼─────────────┼───────────┤
//! │ NPU_VENDOR  │ Vendor NPU      │         45.0 │ Optimal     │ Adaptive  │
//! │ NPU_NNAPI   │ NNAPI NPU       │         35.0 │ High        │ Adaptive  │
//! │ GPU_OPENCL  │ OpenCL GPU      │         25.0 │ Medium      │ High      │
//! │ GPU_OPENGL  │ OpenGL GPU      │         18.0 │ Medium      │ Medium    │
//! │ CPU         │ CPU (XNNPACK)   │          8.0 │ Low         │ Low       │
//! └─────────────┴─────────────────┴──────────────┴─────────────┴───────────┘
//! ```
//!
//! The throughput figures are static benchmarks, not live measurements. The
//! engine reports what it actually observes through
//! [`EngineMetrics`](super::engine::EngineMetrics) and leaves the table alone.
//!
//! ## Platform Abstraction
//!
//! Whether a path exists on the current device is answered by a
//! [`HardwarePlatform`]. The engine depends only on this trait; each platform
//! (Android NNAPI, desktop, test doubles) provides one implementation.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Backend descriptors
// ============================================================================

/// Identity of a compute backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackendKind {
    Cpu,
    GpuOpencl,
    GpuOpengl,
    NpuNnapi,
    NpuVendor,
}

impl BackendKind {
    /// Wire identifier, e.g. `"GPU_OPENCL"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Cpu => "CPU",
            BackendKind::GpuOpencl => "GPU_OPENCL",
            BackendKind::GpuOpengl => "GPU_OPENGL",
            BackendKind::NpuNnapi => "NPU_NNAPI",
            BackendKind::NpuVendor => "NPU_VENDOR",
        }
    }

    /// Parse a wire identifier. Accepts the plain `"GPU"` alias used by older
    /// model manifests as OpenCL.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "CPU" => Some(BackendKind::Cpu),
            "GPU_OPENCL" | "GPU" => Some(BackendKind::GpuOpencl),
            "GPU_OPENGL" => Some(BackendKind::GpuOpengl),
            "NPU_NNAPI" | "NNAPI" => Some(BackendKind::NpuNnapi),
            "NPU_VENDOR" | "NPU_QTI_HTP" => Some(BackendKind::NpuVendor),
            _ => None,
        }
    }

    pub fn is_accelerated(&self) -> bool {
        !matches!(self, BackendKind::Cpu)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relative energy cost of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PowerEfficiency {
    Low,
    Medium,
    High,
    Optimal,
}

/// How much working memory a backend reserves for a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemoryTier {
    Low,
    Medium,
    High,
    Adaptive,
}

/// Static capability record for one backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BackendDescriptor {
    pub kind: BackendKind,
    pub display_name: &'static str,
    pub expected_throughput_tok_per_sec: f64,
    pub power_efficiency: PowerEfficiency,
    pub memory_tier: MemoryTier,
}

/// The full descriptor table, in declaration order.
pub static BACKEND_DESCRIPTORS: [BackendDescriptor; 5] = [
    BackendDescriptor {
        kind: BackendKind::Cpu,
        display_name: "CPU (XNNPACK)",
        expected_throughput_tok_per_sec: 8.0,
        power_efficiency: PowerEfficiency::Low,
        memory_tier: MemoryTier::Low,
    },
    BackendDescriptor {
        kind: BackendKind::GpuOpencl,
        display_name: "OpenCL GPU",
        expected_throughput_tok_per_sec: 25.0,
        power_efficiency: PowerEfficiency::Medium,
        memory_tier: MemoryTier::High,
    },
    BackendDescriptor {
        kind: BackendKind::GpuOpengl,
        display_name: "OpenGL GPU",
        expected_throughput_tok_per_sec: 18.0,
        power_efficiency: PowerEfficiency::Medium,
        memory_tier: MemoryTier::Medium,
    },
    BackendDescriptor {
        kind: BackendKind::NpuNnapi,
        display_name: "NNAPI NPU",
        expected_throughput_tok_per_sec: 35.0,
        power_efficiency: PowerEfficiency::High,
        memory_tier: MemoryTier::Adaptive,
    },
    BackendDescriptor {
        kind: BackendKind::NpuVendor,
        display_name: "Vendor NPU",
        expected_throughput_tok_per_sec: 45.0,
        power_efficiency: PowerEfficiency::Optimal,
        memory_tier: MemoryTier::Adaptive,
    },
];

/// Requested backend for [`ModelEngine::initialize`](super::engine::ModelEngine::initialize).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackendSelection {
    /// Let the engine pick the fastest backend the device supports.
    #[default]
    Auto,
    Specific(BackendKind),
}

impl From<BackendKind> for BackendSelection {
    fn from(kind: BackendKind) -> Self {
        BackendSelection::Specific(kind)
    }
}

/// The set of backends a platform build knows about.
///
/// Defaults to every entry of [`BACKEND_DESCRIPTORS`]. A platform that has no
/// vendor NPU driver at all can build a narrower table so that asking for that
/// backend fails as an initialization error rather than a probe failure.
#[derive(Debug, Clone)]
pub struct BackendTable {
    descriptors: Vec<BackendDescriptor>,
}

impl Default for BackendTable {
    fn default() -> Self {
        Self {
            descriptors: BACKEND_DESCRIPTORS.to_vec(),
        }
    }
}

impl BackendTable {
    /// Restrict the table to the listed kinds.
    pub fn only(kinds: &[BackendKind]) -> Self {
        Self {
            descriptors: BACKEND_DESCRIPTORS
                .iter()
                .filter(|d| kinds.contains(&d.kind))
                .copied()
                .collect(),
        }
    }

    pub fn get(&self, kind: BackendKind) -> Option<&BackendDescriptor> {
        self.descriptors.iter().find(|d| d.kind == kind)
    }

    pub fn descriptors(&self) -> &[BackendDescriptor] {
        &self.descriptors
    }

    /// Descriptors ordered for automatic selection: highest expected
    /// throughput first. Ties keep table order.
    ///
    /// This deliberately favors speed over power efficiency. A battery-first
    /// policy would sort on [`PowerEfficiency`] instead.
    pub fn by_expected_throughput(&self) -> Vec<BackendDescriptor> {
        let mut ordered = self.descriptors.clone();
        ordered.sort_by(|a, b| {
            b.expected_throughput_tok_per_sec
                .total_cmp(&a.expected_throughput_tok_per_sec)
        });
        ordered
    }
}

// ============================================================================
// Hardware platform
// ============================================================================

/// A single thermal reading from the platform.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ThermalReading {
    /// Hottest sensor in °C, if the platform exposes any.
    pub temperature_c: Option<f32>,
    /// Whether the platform considers itself throttled.
    pub throttling: bool,
}

impl ThermalReading {
    pub fn nominal() -> Self {
        Self::default()
    }

    pub fn throttled(temperature_c: f32) -> Self {
        Self {
            temperature_c: Some(temperature_c),
            throttling: true,
        }
    }
}

/// Device capability surface consumed by the model engine.
///
/// Implementations must be cheap enough to call once per inference.
#[async_trait]
pub trait HardwarePlatform: Send + Sync {
    /// Human-readable platform name for logs.
    fn name(&self) -> &str;

    /// Whether the hardware path for `backend` exists and can be opened.
    async fn probe(&self, backend: BackendKind) -> bool;

    /// Memory currently available to the process, in MiB.
    async fn available_memory_mb(&self) -> u64;

    /// Current thermal state.
    async fn thermal_state(&self) -> ThermalReading;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_order_prefers_throughput() {
        let ordered = BackendTable::default().by_expected_throughput();
        let kinds: Vec<BackendKind> = ordered.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BackendKind::NpuVendor,
                BackendKind::NpuNnapi,
                BackendKind::GpuOpencl,
                BackendKind::GpuOpengl,
                BackendKind::Cpu,
            ]
        );
    }

    #[test]
    fn test_restricted_table() {
        let table = BackendTable::only(&[BackendKind::Cpu, BackendKind::GpuOpengl]);
        assert_eq!(table.descriptors().len(), 2);
        assert!(table.get(BackendKind::NpuVendor).is_none());
        assert_eq!(
            table.get(BackendKind::GpuOpengl).map(|d| d.memory_tier),
            Some(MemoryTier::Medium)
        );
    }

    #[test]
    fn test_parse_wire_names() {
        assert_eq!(BackendKind::parse("gpu_opencl"), Some(BackendKind::GpuOpencl));
        assert_eq!(BackendKind::parse("GPU"), Some(BackendKind::GpuOpencl));
        assert_eq!(BackendKind::parse("NPU_NNAPI"), Some(BackendKind::NpuNnapi));
        assert_eq!(BackendKind::parse("TPU"), None);
        assert_eq!(BackendKind::NpuVendor.to_string(), "NPU_VENDOR");
    }

    #[test]
    fn test_default_selection_is_auto() {
        assert_eq!(BackendSelection::default(), BackendSelection::Auto);
        assert_eq!(
            BackendSelection::from(BackendKind::Cpu),
            BackendSelection::Specific(BackendKind::Cpu)
        );
    }

    #[test]
    fn test_platform_trait_is_object_safe() {
        #[allow(dead_code)]
        fn assert_object_safe(_: &dyn HardwarePlatform) {}
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<Box<dyn HardwarePlatform>>();
    }
}
