//! System Platform: `sysinfo`-backed Hardware Telemetry
//!
//! [`SystemPlatform`] is the default [`HardwarePlatform`] for hosts where the
//! only thing we can measure directly is RAM and component temperatures:
//!
//! 1. **Memory** is read from `sysinfo` on a blocking thread via
//!    `tokio::task::spawn_blocking`, since the underlying reads
//!    (`/proc/meminfo`, `vm_stat`, `GlobalMemoryStatusEx`) are blocking syscalls.
//! 2. **Thermal state** is the hottest component sensor compared against a
//!    configurable throttle limit (default 85°C). Hosts without sensors read
//!    as nominal.
//! 3. **Backend probes** succeed for the CPU always, and for accelerators only
//!    when the embedding application has declared them with
//!    [`SystemPlatform::with_accelerators`]. Opening an NNAPI or vendor NPU
//!    delegate is the job of the platform layer, not this crate.
//!
//! ```text
//! ┌───────────────────────── SystemPlatform ──────────────────────────┐
//! │  probe(CPU)         → true                                         │
//! │  probe(GPU/NPU)     → declared accelerators only                   │
//! │  available_memory   → sysinfo::System::available_memory() / MiB    │
//! │  thermal_state      → max(Components::temperature) ≥ limit ?       │
//! └────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use sysinfo::{Components, MemoryRefreshKind, RefreshKind, System};

use super::backend::{BackendKind, HardwarePlatform, ThermalReading};

/// Default temperature at which the platform is treated as throttled.
const DEFAULT_THERMAL_LIMIT_C: f32 = 85.0;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Host telemetry via `sysinfo`.
pub struct SystemPlatform {
    accelerators: BTreeSet<BackendKind>,
    /// Stored as `f32::to_bits` so the limit can be tuned at runtime.
    thermal_limit_bits: AtomicU32,
}

impl std::fmt::Debug for SystemPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemPlatform")
            .field("accelerators", &self.accelerators)
            .field("thermal_limit_c", &self.thermal_limit_c())
            .finish()
    }
}

impl Default for SystemPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemPlatform {
    /// CPU-only platform with the default 85°C throttle limit.
    pub fn new() -> Self {
        Self {
            accelerators: BTreeSet::new(),
            thermal_limit_bits: AtomicU32::new(DEFAULT_THERMAL_LIMIT_C.to_bits()),
        }
    }

    /// Declare accelerator paths that the host application has verified.
    pub fn with_accelerators(mut self, kinds: impl IntoIterator<Item = BackendKind>) -> Self {
        self.accelerators
            .extend(kinds.into_iter().filter(|k| k.is_accelerated()));
        self
    }

    pub fn with_thermal_limit(self, limit_c: f32) -> Self {
        self.set_thermal_limit(limit_c);
        self
    }

    pub fn set_thermal_limit(&self, limit_c: f32) {
        self.thermal_limit_bits
            .store(limit_c.to_bits(), Ordering::Relaxed);
    }

    pub fn thermal_limit_c(&self) -> f32 {
        f32::from_bits(self.thermal_limit_bits.load(Ordering::Relaxed))
    }

    /// Query `(total_mb, available_mb)`.
    pub async fn query_memory(&self) -> (u64, u64) {
        tokio::task::spawn_blocking(|| {
            let mut sys = System::new_with_specifics(
                RefreshKind::new().with_memory(MemoryRefreshKind::everything()),
            );
            sys.refresh_memory();
            (
                sys.total_memory() / BYTES_PER_MB,
                sys.available_memory() / BYTES_PER_MB,
            )
        })
        .await
        .unwrap_or((0, 0))
    }

    /// Hottest component temperature, if any sensor reports one.
    pub async fn hottest_component_c(&self) -> Option<f32> {
        tokio::task::spawn_blocking(|| {
            let components = Components::new_with_refreshed_list();
            let mut hottest: Option<f32> = None;
            for component in &components {
                let t = component.temperature();
                if t.is_finite() && t > 0.0 {
                    hottest = Some(hottest.map_or(t, |h| h.max(t)));
                }
            }
            hottest
        })
        .await
        .unwrap_or(None)
    }
}

#[async_trait]
impl HardwarePlatform for SystemPlatform {
    fn name(&self) -> &str {
        "SystemPlatform"
    }

    async fn probe(&self, backend: BackendKind) -> bool {
        let supported = !backend.is_accelerated() || self.accelerators.contains(&backend);
        tracing::debug!(
            "SystemPlatform: probe {} → {}",
            backend,
            if supported { "available" } else { "absent" }
        );
        supported
    }

    async fn available_memory_mb(&self) -> u64 {
        let (_, available) = self.query_memory().await;
        available
    }

    async fn thermal_state(&self) -> ThermalReading {
        let temperature_c = self.hottest_component_c().await;
        let limit = self.thermal_limit_c();
        let throttling = temperature_c.is_some_and(|t| t >= limit);

        if throttling {
            tracing::warn!(
                "SystemPlatform: component temperature {:.1}°C at or above limit {:.1}°C",
                temperature_c.unwrap_or_default(),
                limit
            );
        }

        ThermalReading {
            temperature_c,
            throttling,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cpu_always_probes() {
        let platform = SystemPlatform::new();
        assert!(platform.probe(BackendKind::Cpu).await);
        assert!(!platform.probe(BackendKind::NpuNnapi).await);
    }

    #[tokio::test]
    async fn test_declared_accelerators_probe() {
        let platform = SystemPlatform::new()
            .with_accelerators([BackendKind::GpuOpencl, BackendKind::Cpu]);
        assert!(platform.probe(BackendKind::GpuOpencl).await);
        assert!(!platform.probe(BackendKind::GpuOpengl).await);
    }

    #[tokio::test]
    async fn test_query_memory_is_consistent() {
        let platform = SystemPlatform::new();
        let (total, available) = platform.query_memory().await;
        assert!(total > 0, "Total memory should be > 0");
        assert!(available <= total, "Available should be <= total");
    }

    #[tokio::test]
    async fn test_unreachable_limit_never_throttles() {
        let platform = SystemPlatform::new().with_thermal_limit(10_000.0);
        let reading = platform.thermal_state().await;
        assert!(!reading.throttling);
    }

    #[test]
    fn test_thermal_limit_roundtrip() {
        let platform = SystemPlatform::new();
        assert_eq!(platform.thermal_limit_c(), DEFAULT_THERMAL_LIMIT_C);
        platform.set_thermal_limit(70.5);
        assert_eq!(platform.thermal_limit_c(), 70.5);
    }

    #[test]
    fn test_platform_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SystemPlatform>();
    }
}
