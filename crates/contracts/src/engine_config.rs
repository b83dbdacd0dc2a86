//! Engine configuration contracts that can be shared across crates.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Default bound on `update()` calls per pull
pub const DEFAULT_RETRY_LIMIT: usize = 1000;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete settings document
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct EngineSettings {
    #[serde(default)]
    pub version: ConfigVersion,

    #[serde(default)]
    #[validate(nested)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Synchronization engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    /// Maximum `update()` calls a single pull may issue
    #[serde(default = "default_retry_limit")]
    #[validate(range(min = 1))]
    pub retry_limit: usize,

    /// Default cache policy for new output items
    #[serde(default)]
    #[validate(nested)]
    pub cache: CacheConfig,

    /// Number of diagnostics retained by the event log
    #[serde(default = "default_event_log_capacity")]
    #[validate(range(min = 1))]
    pub event_log_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_limit: DEFAULT_RETRY_LIMIT,
            cache: CacheConfig::default(),
            event_log_capacity: default_event_log_capacity(),
        }
    }
}

fn default_retry_limit() -> usize {
    DEFAULT_RETRY_LIMIT
}

fn default_event_log_capacity() -> usize {
    256
}

/// Per-item cache policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct CacheConfig {
    #[serde(default)]
    pub interpolation: InterpolationPolicy,

    #[serde(default)]
    #[validate(custom(function = "validate_extrapolation"))]
    pub extrapolation: ExtrapolationPolicy,

    /// Look-back kept behind the earliest time any dependent still requests
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub keep_history: Option<f64>,
}

impl CacheConfig {
    pub fn with_interpolation(mut self, interpolation: InterpolationPolicy) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_extrapolation(mut self, extrapolation: ExtrapolationPolicy) -> Self {
        self.extrapolation = extrapolation;
        self
    }
}

/// How values between two cached records are produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationPolicy {
    /// `below + factor * (above - below)`
    #[default]
    Linear,
    /// Record closest in time, earlier one on ties
    Nearest,
    /// Last record at or before the query time
    UseLast,
}

/// How values outside the cached range are produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExtrapolationPolicy {
    /// Repeat the nearest cached record
    #[default]
    HoldNearest,
    /// Continue the slope of the two outermost records.
    /// `relaxation` 0 is a pure linear continuation, 1 degenerates to hold.
    Linear { relaxation: f64 },
}

fn validate_extrapolation(policy: &ExtrapolationPolicy) -> Result<(), ValidationError> {
    match policy {
        ExtrapolationPolicy::Linear { relaxation } if !(0.0..=1.0).contains(relaxation) => {
            Err(ValidationError::new("relaxation_out_of_range"))
        }
        _ => Ok(()),
    }
}

/// Logging output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Prometheus listener port (None = disabled)
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            metrics_port: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Log line format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human readable
    #[default]
    Pretty,
    /// Single line
    Compact,
}
