//! Persisted device entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attributes::{AttributeExt, Attributes};

/// Persisted column names (match the serialized field names)
pub mod columns {
    pub const MOTION_STREAK: &str = "motionStreak";
    pub const MOTION_STATE: &str = "motionState";
    pub const MOTION_TIME: &str = "motionTime";
    pub const MOTION_DISTANCE: &str = "motionDistance";
    pub const MOTION_POSITION_ID: &str = "motionPositionId";
    pub const MOTION_LATITUDE: &str = "motionLatitude";
    pub const MOTION_LONGITUDE: &str = "motionLongitude";
    pub const MOTION_STREAK_TIME: &str = "motionStreakTime";
    pub const MOTION_STREAK_DISTANCE: &str = "motionStreakDistance";
    pub const IDLE_START_TIME: &str = "idleStartTime";
    pub const IDLE_ALARM_FIRED: &str = "idleAlarmFired";
    pub const IDLE_LATITUDE: &str = "idleLatitude";
    pub const IDLE_LONGITUDE: &str = "idleLongitude";
    pub const TOLL_START_TIME: &str = "tollStartTime";
    pub const TOLL_DISTANCE: &str = "tollDistance";
    pub const TOLL_TOTAL_DISTANCE: &str = "tollTotalDistance";
}

/// Tracked device with the derived fields that survive restarts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Device {
    pub id: i64,
    pub name: String,
    pub unique_id: String,
    pub attributes: Attributes,

    // Motion
    pub motion_streak: bool,
    pub motion_state: bool,
    pub motion_time: Option<DateTime<Utc>>,
    pub motion_distance: f64,
    pub motion_position_id: Option<i64>,
    pub motion_latitude: Option<f64>,
    pub motion_longitude: Option<f64>,
    /// Start of the current confirmed streak
    pub motion_streak_time: Option<DateTime<Utc>>,
    /// Distance covered since the streak started (meters)
    pub motion_streak_distance: f64,

    // Idle
    pub idle_start_time: Option<DateTime<Utc>>,
    pub idle_alarm_fired: bool,
    pub idle_latitude: Option<f64>,
    pub idle_longitude: Option<f64>,

    // Toll accounting
    pub toll_start_time: Option<DateTime<Utc>>,
    pub toll_distance: f64,
    pub toll_total_distance: f64,
}

impl Device {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    /// Positive numeric device attribute (per-device config override)
    pub fn positive_attribute(&self, key: &str) -> Option<f64> {
        self.attributes.double(key).filter(|v| *v > 0.0)
    }
}
