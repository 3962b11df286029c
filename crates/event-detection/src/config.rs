//! Detection configuration
//!
//! Loaded from an optional TOML file with `FLEET_*` environment overrides,
//! e.g. `FLEET_OVERSPEED__MINIMAL_DURATION=30`.

use ::config::{Config, Environment, File, FileFormat};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::DetectionError;

/// Motion algorithm selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionAlgorithm {
    /// Duration OR distance confirms a transition
    #[default]
    Legacy,
    /// Duration AND distance must corroborate a transition
    Streak,
}

/// Motion / trip detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    pub enabled: bool,
    pub algorithm: MotionAlgorithm,
    /// Speed above which a report without a `motion` flag counts as moving (knots)
    pub speed_threshold: f64,
    /// Minimal trip distance (meters)
    pub min_trip_distance: f64,
    /// Minimal trip duration (seconds)
    pub min_trip_duration: i64,
    /// Minimal parking duration (seconds)
    pub min_parking_duration: i64,
    /// Ignition off confirms a stop (legacy algorithm only)
    pub use_ignition: bool,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            algorithm: MotionAlgorithm::Legacy,
            speed_threshold: 0.01,
            min_trip_distance: 500.0,
            min_trip_duration: 300,
            min_parking_duration: 300,
            use_ignition: false,
        }
    }
}

/// Seconds as a duration, saturating values chrono cannot represent
pub(crate) fn seconds(value: i64) -> Duration {
    Duration::try_seconds(value).unwrap_or(if value < 0 { Duration::MIN } else { Duration::MAX })
}

impl MotionConfig {
    pub fn min_trip_duration(&self) -> Duration {
        seconds(self.min_trip_duration)
    }

    pub fn min_parking_duration(&self) -> Duration {
        seconds(self.min_parking_duration)
    }
}

/// Overspeed detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverspeedConfig {
    pub enabled: bool,
    /// Global speed limit in knots (0 disables the global fallback)
    pub speed_limit: f64,
    /// Tolerance multiplier applied to the limit
    pub multiplier: f64,
    /// Debounce before an event (seconds)
    pub minimal_duration: i64,
    /// Combine several geofence limits by taking the lowest
    pub prefer_lowest: bool,
}

impl Default for OverspeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            speed_limit: 0.0,
            multiplier: 1.0,
            minimal_duration: 0,
            prefer_lowest: false,
        }
    }
}

impl OverspeedConfig {
    pub fn minimal_duration(&self) -> Duration {
        seconds(self.minimal_duration)
    }
}

/// Geofence enter/exit detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeofenceConfig {
    pub enabled: bool,
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Idle alarm
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    pub enabled: bool,
    /// Idle duration before the alarm (seconds)
    pub threshold: i64,
    /// Speed below which the vehicle counts as standing (knots)
    pub speed_epsilon: f64,
}

impl IdleConfig {
    pub fn threshold(&self) -> Duration {
        seconds(self.threshold)
    }
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 600,
            speed_epsilon: 1.0,
        }
    }
}

/// Toll-road detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TollConfig {
    pub enabled: bool,
    /// Number of recent observations kept
    pub window_size: usize,
    /// Agreeing observations needed to confirm a transition
    pub threshold: usize,
}

impl Default for TollConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_size: 5,
            threshold: 4,
        }
    }
}

impl TollConfig {
    /// Threshold clamped into `1..=window_size`
    pub fn effective_threshold(&self) -> usize {
        self.threshold.clamp(1, self.window_size.max(1))
    }
}

/// Maintenance threshold detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub enabled: bool,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Per-device partitioned dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub partitions: usize,
    pub queue_depth: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            partitions: 4,
            queue_depth: 1024,
        }
    }
}

/// Complete detection configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub motion: MotionConfig,
    pub overspeed: OverspeedConfig,
    pub geofence: GeofenceConfig,
    pub idle: IdleConfig,
    pub toll: TollConfig,
    pub maintenance: MaintenanceConfig,
    pub dispatch: DispatchConfig,
}

impl DetectionConfig {
    /// Load from an optional TOML file plus `FLEET_*` environment overrides
    pub fn load(path: Option<&str>) -> Result<Self, DetectionError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            info!("Loading detection config from {}", path);
            builder = builder.add_source(File::with_name(path));
        }
        let config = builder
            .add_source(
                Environment::with_prefix("FLEET")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Parse a TOML document without environment overrides
    pub fn from_toml(source: &str) -> Result<Self, DetectionError> {
        let config = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}
