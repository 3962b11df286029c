//! Fleet Tracking Data Model
//!
//! Types shared by the event-detection core:
//! - Position reports and their free-form attributes
//! - Devices with persisted derived columns
//! - Geofences, calendars and maintenance plans (reference data)
//! - Detected events
//! - Geodesic distance helpers

pub mod attributes;
pub mod calendar;
pub mod device;
pub mod event;
pub mod geo;
pub mod geofence;
pub mod position;

pub use attributes::{keys, AttributeExt, Attributes};
pub use calendar::{Calendar, Recurrence};
pub use device::{columns, Device};
pub use event::{Event, EventType};
pub use geofence::{Geofence, Maintenance};
pub use position::Position;

use thiserror::Error;

/// Model validation errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("UTC offset of {0} minutes is out of range")]
    InvalidOffset(i32),

    #[error("Calendar {0} has a recurrence without weekdays")]
    EmptyRecurrence(i64),
}
