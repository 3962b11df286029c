//! Fleet Replay
//!
//! Feeds a JSON-lines stream of positions through the detection pipeline
//! and writes the detected events as JSON lines.

use ::config::{Config, ConfigError, Environment, File, FileFormat};
use anyhow::{Context, Result};
use event_detection::{ChannelSink, DetectionPipeline, DispatchConfig, PartitionedDispatcher};
use fleet_model::{Calendar, Device, Geofence, Maintenance, Position};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storage::{DeviceRepository, MemoryCache};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn, Level};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// `[replay]` section of the configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySettings {
    pub log_level: String,
    pub log_format: LogFormat,
    /// JSON file with devices, geofences, calendars and maintenances
    pub reference_data: Option<String>,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            reference_data: None,
        }
    }
}

impl ReplaySettings {
    /// Load from an optional TOML file plus `FLEET_REPLAY__*` overrides
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        let config = builder
            .add_source(
                Environment::with_prefix("FLEET")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Self::from_config(config)
    }

    pub fn from_toml(source: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;
        Self::from_config(config)
    }

    fn from_config(config: Config) -> Result<Self> {
        match config.get::<ReplaySettings>("replay") {
            Ok(settings) => Ok(settings),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::INFO)
    }
}

/// Initialize logging on stderr; stdout carries the events
pub fn init_logging(settings: &ReplaySettings) -> Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(settings.level())
        .with_target(true)
        .with_writer(std::io::stderr);

    let installed = match settings.log_format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))
}

/// Device to maintenance plan association
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceLink {
    pub device_id: i64,
    pub maintenance_id: i64,
}

/// Reference data loaded before the replay starts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceData {
    pub devices: Vec<Device>,
    pub geofences: Vec<Geofence>,
    pub calendars: Vec<Calendar>,
    pub maintenances: Vec<Maintenance>,
    pub links: Vec<MaintenanceLink>,
}

impl ReferenceData {
    pub fn from_path(path: &str) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read reference data {}", path))?;
        serde_json::from_str(&source).with_context(|| format!("Invalid reference data {}", path))
    }

    /// Populate the cache and the device repository
    pub fn install(self, cache: &MemoryCache, repository: &DeviceRepository) -> Result<()> {
        info!(
            "Installing reference data: devices={}, geofences={}, calendars={}, maintenances={}",
            self.devices.len(),
            self.geofences.len(),
            self.calendars.len(),
            self.maintenances.len()
        );
        for calendar in self.calendars {
            calendar
                .validate()
                .with_context(|| format!("Calendar {} is invalid", calendar.id))?;
            cache.put_calendar(calendar);
        }
        for device in self.devices {
            repository.insert(&device)?;
            cache.put_device(device);
        }
        for geofence in self.geofences {
            cache.put_geofence(geofence);
        }
        for maintenance in self.maintenances {
            cache.put_maintenance(maintenance);
        }
        for link in self.links {
            cache.link_maintenance(link.device_id, link.maintenance_id);
        }
        Ok(())
    }
}

/// Replay counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub positions: usize,
    pub skipped: usize,
    pub events: usize,
}

/// Dispatch every position in `input` and write each event to `output`
///
/// Malformed lines are logged and skipped. Returns once the input is
/// exhausted and every queued position has been processed.
pub async fn replay<R, W>(
    input: R,
    output: &mut W,
    pipeline: Arc<DetectionPipeline>,
    config: &DispatchConfig,
) -> Result<ReplayStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let (sink, mut events) = ChannelSink::channel();
    let dispatcher = PartitionedDispatcher::spawn(pipeline, Arc::new(sink), config);

    let feed = async move {
        let mut lines = input.lines();
        let mut positions: usize = 0;
        let mut skipped: usize = 0;
        let mut number: usize = 0;
        while let Some(line) = lines.next_line().await? {
            number += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Position>(line) {
                Ok(position) => {
                    dispatcher.dispatch(position).await?;
                    positions += 1;
                }
                Err(e) => {
                    warn!("Skipping line {}: {}", number, e);
                    skipped += 1;
                }
            }
        }
        dispatcher.shutdown().await;
        Ok::<_, anyhow::Error>((positions, skipped))
    };

    let drain = async {
        let mut count: usize = 0;
        while let Some(event) = events.recv().await {
            let mut line = serde_json::to_vec(&event)?;
            line.push(b'\n');
            output.write_all(&line).await?;
            count += 1;
        }
        output.flush().await?;
        debug!("Wrote {} events", count);
        Ok::<_, anyhow::Error>(count)
    };

    let (fed, drained) = tokio::join!(feed, drain);
    let (positions, skipped) = fed?;
    Ok(ReplayStats {
        positions,
        skipped,
        events: drained?,
    })
}
