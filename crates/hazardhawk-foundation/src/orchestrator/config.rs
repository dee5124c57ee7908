//! Configuration
//!
//! Plain structs with sensible defaults, consuming `with_*` builders, and
//! `serde` support so a host app can ship them as JSON. Environment overrides
//! use the `HAZARDHAWK_` prefix.
//!
//! ```rust
//! use hazardhawk_foundation::orchestrator::config::{HazardHawkConfig, MonitorConfig};
//!
//! let config = HazardHawkConfig::default()
//!     .with_monitor(MonitorConfig::default().with_metrics_capacity(100));
//! assert_eq!(config.monitor.metrics_capacity, 100);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Configuration loading failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

// ============================================================================
// EngineConfig
// ============================================================================

/// Model engine tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Memory kept free for the OS and the rest of the app. Default: 512 MiB.
    pub memory_safety_margin_mb: u64,
    /// Decoded-image working memory as a multiple of the encoded size.
    /// Default: `4`.
    pub image_memory_factor: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_safety_margin_mb: 512,
            image_memory_factor: 4,
        }
    }
}

impl EngineConfig {
    pub fn with_memory_safety_margin_mb(mut self, mb: u64) -> Self {
        self.memory_safety_margin_mb = mb;
        self
    }

    pub fn with_image_memory_factor(mut self, factor: u64) -> Self {
        self.image_memory_factor = factor;
        self
    }
}

// ============================================================================
// MonitorConfig
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Ring buffer capacity for performance snapshots. Default: `200`.
    pub metrics_capacity: usize,
    /// Snapshots used for rolling error rate and throughput. Default: `50`.
    pub rolling_window: usize,
    /// Jaccard scores kept per work type. Default: `50`.
    pub accuracy_window: usize,
    /// Response time above which accuracy tests recommend action. Default: 3000 ms.
    pub response_time_target_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            metrics_capacity: 200,
            rolling_window: 50,
            accuracy_window: 50,
            response_time_target_ms: 3000,
        }
    }
}

impl MonitorConfig {
    pub fn with_metrics_capacity(mut self, capacity: usize) -> Self {
        self.metrics_capacity = capacity;
        self
    }

    pub fn with_rolling_window(mut self, window: usize) -> Self {
        self.rolling_window = window;
        self
    }

    pub fn with_accuracy_window(mut self, window: usize) -> Self {
        self.accuracy_window = window;
        self
    }

    pub fn with_response_time_target_ms(mut self, ms: u64) -> Self {
        self.response_time_target_ms = ms;
        self
    }
}

// ============================================================================
// OptimizerConfig
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Most recent snapshots considered. Default: `50`.
    pub window: usize,
    /// Samples per half of the trend comparison. Default: `20`.
    pub trend_window: usize,
    /// Default: 3000 ms.
    pub response_time_target_ms: u64,
    /// Default: `0.05`.
    pub error_rate_target: f64,
    /// Benchmark accuracy target. Default: `0.85`.
    pub accuracy_target: f64,
    /// Benchmark success-rate target. Default: `0.95`.
    pub success_rate_target: f64,
    /// Relative change that counts as a trend. Default: `0.05`.
    pub trend_tolerance: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            window: 50,
            trend_window: 20,
            response_time_target_ms: 3000,
            error_rate_target: 0.05,
            accuracy_target: 0.85,
            success_rate_target: 0.95,
            trend_tolerance: 0.05,
        }
    }
}

impl OptimizerConfig {
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn with_trend_window(mut self, window: usize) -> Self {
        self.trend_window = window;
        self
    }

    pub fn with_response_time_target_ms(mut self, ms: u64) -> Self {
        self.response_time_target_ms = ms;
        self
    }

    pub fn with_error_rate_target(mut self, rate: f64) -> Self {
        self.error_rate_target = rate;
        self
    }
}

// ============================================================================
// HazardHawkConfig
// ============================================================================

/// Top-level configuration bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardHawkConfig {
    pub engine: EngineConfig,
    pub monitor: MonitorConfig,
    pub optimizer: OptimizerConfig,
}

impl HazardHawkConfig {
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_monitor(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Defaults overlaid with `HAZARDHAWK_*` environment variables.
    pub fn try_from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Apply `HAZARDHAWK_METRICS_CAPACITY`, `HAZARDHAWK_RESPONSE_TARGET_MS`
    /// and `HAZARDHAWK_MEMORY_MARGIN_MB` when set.
    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(capacity) = env_parse::<usize>("HAZARDHAWK_METRICS_CAPACITY")? {
            self.monitor.metrics_capacity = capacity;
        }
        if let Some(target) = env_parse::<u64>("HAZARDHAWK_RESPONSE_TARGET_MS")? {
            self.monitor.response_time_target_ms = target;
            self.optimizer.response_time_target_ms = target;
        }
        if let Some(margin) = env_parse::<u64>("HAZARDHAWK_MEMORY_MARGIN_MB")? {
            self.engine.memory_safety_margin_mb = margin;
        }
        Ok(self)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}
