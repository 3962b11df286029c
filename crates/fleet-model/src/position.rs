//! Position reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::attributes::{AttributeExt, Attributes};

/// A single device report
///
/// Identity fields are fixed once the ingestion pipeline builds the
/// report; handlers only ever read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: i64,
    pub device_id: i64,
    /// Time the GPS fix was taken
    pub fix_time: DateTime<Utc>,
    #[serde(default)]
    pub device_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub server_time: Option<DateTime<Utc>>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
    /// Speed in knots
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub course: f64,
    #[serde(default = "default_valid")]
    pub valid: bool,
    /// Geofence membership computed upstream (may be absent)
    #[serde(default)]
    pub geofence_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub attributes: Attributes,
}

fn default_valid() -> bool {
    true
}

impl Position {
    /// Create a valid, stationary position with no attributes
    pub fn new(id: i64, device_id: i64, fix_time: DateTime<Utc>, latitude: f64, longitude: f64) -> Self {
        Self {
            id,
            device_id,
            fix_time,
            device_time: Some(fix_time),
            server_time: Some(fix_time),
            latitude,
            longitude,
            altitude: 0.0,
            speed: 0.0,
            course: 0.0,
            valid: true,
            geofence_ids: None,
            attributes: Attributes::new(),
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_valid(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }

    pub fn with_geofences(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.geofence_ids = Some(ids.into_iter().collect());
        self
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Geofence membership as a set; a missing list is the empty set
    pub fn geofence_set(&self) -> BTreeSet<i64> {
        self.geofence_ids
            .as_deref()
            .unwrap_or_default()
            .iter()
            .copied()
            .collect()
    }

    pub fn boolean(&self, key: &str) -> Option<bool> {
        self.attributes.boolean(key)
    }

    pub fn double(&self, key: &str) -> Option<f64> {
        self.attributes.double(key)
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        self.attributes.string(key)
    }
}
