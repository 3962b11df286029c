//! Free-form attribute maps
//!
//! Devices report whatever they like, so values arrive as booleans,
//! numbers or strings depending on the protocol decoder. The typed
//! accessors here normalize all three so callers never branch on the
//! JSON representation.

use serde_json::Value;
use std::collections::BTreeMap;

/// Ordered attribute map (ordered so serialization is deterministic)
pub type Attributes = BTreeMap<String, Value>;

/// Well-known attribute keys
pub mod keys {
    pub const MOTION: &str = "motion";
    pub const IGNITION: &str = "ignition";
    pub const TOTAL_DISTANCE: &str = "totalDistance";
    pub const HOURS: &str = "hours";
    pub const SPEED: &str = "speed";
    pub const SPEED_LIMIT: &str = "speedLimit";
    pub const TOLL: &str = "toll";
    pub const TOLL_REF: &str = "tollRef";
    pub const TOLL_NAME: &str = "tollName";
    pub const TOLL_DISTANCE: &str = "tollDistance";
    pub const TOLL_DURATION: &str = "tollDuration";
    pub const IDLE_THRESHOLD: &str = "idleThreshold";
    pub const IDLE_DURATION: &str = "idleDuration";
    pub const DISTANCE: &str = "distance";
    pub const DURATION: &str = "duration";
}

/// Typed reads over an attribute map
pub trait AttributeExt {
    /// Boolean value; accepts `true`/`false`, non-zero numbers and
    /// `"true"`/`"false"`/`"1"`/`"0"` strings
    fn boolean(&self, key: &str) -> Option<bool>;

    /// Numeric value; accepts numbers and numeric strings
    fn double(&self, key: &str) -> Option<f64>;

    /// String value; numbers and booleans are not coerced
    fn string(&self, key: &str) -> Option<&str>;
}

impl AttributeExt for Attributes {
    fn boolean(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_f64().map(|v| v != 0.0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    fn double(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|v| v.is_finite())
    }

    fn string(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }
}
