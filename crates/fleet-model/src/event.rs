//! Detected events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attributes::Attributes;
use crate::position::Position;

/// Event types emitted by the detection handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    DeviceMoving,
    DeviceStopped,
    DeviceOverspeed,
    GeofenceEnter,
    GeofenceExit,
    DeviceIdle,
    DeviceTollRouteEnter,
    DeviceTollRouteExit,
    Maintenance,
}

impl EventType {
    /// Wire name of the event type
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::DeviceMoving => "deviceMoving",
            EventType::DeviceStopped => "deviceStopped",
            EventType::DeviceOverspeed => "deviceOverspeed",
            EventType::GeofenceEnter => "geofenceEnter",
            EventType::GeofenceExit => "geofenceExit",
            EventType::DeviceIdle => "deviceIdle",
            EventType::DeviceTollRouteEnter => "deviceTollRouteEnter",
            EventType::DeviceTollRouteExit => "deviceTollRouteExit",
            EventType::Maintenance => "maintenance",
        }
    }
}

/// Immutable record of a detected state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub device_id: i64,
    pub position_id: Option<i64>,
    pub event_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geofence_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintenance_id: Option<i64>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Event {
    /// Event stamped with a position's identity and fix time
    pub fn new(event_type: EventType, position: &Position) -> Self {
        Self::at(event_type, position.device_id, Some(position.id), position.fix_time)
    }

    /// Event stamped with an explicit position reference and time
    pub fn at(
        event_type: EventType,
        device_id: i64,
        position_id: Option<i64>,
        event_time: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type,
            device_id,
            position_id,
            event_time,
            geofence_id: None,
            maintenance_id: None,
            attributes: Attributes::new(),
        }
    }

    pub fn with_geofence(mut self, geofence_id: Option<i64>) -> Self {
        self.geofence_id = geofence_id;
        self
    }

    pub fn with_maintenance(mut self, maintenance_id: i64) -> Self {
        self.maintenance_id = Some(maintenance_id);
        self
    }

    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }
}
