//! Geofence and maintenance reference data

use serde::{Deserialize, Serialize};

use crate::attributes::{keys, AttributeExt, Attributes};

/// Configured geographic boundary
///
/// Membership is computed upstream; only the gating calendar and the
/// optional speed limit matter here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Geofence {
    pub id: i64,
    pub name: String,
    pub calendar_id: Option<i64>,
    pub attributes: Attributes,
}

impl Geofence {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    /// Speed limit in knots, if one is configured
    pub fn speed_limit(&self) -> Option<f64> {
        self.attributes.double(keys::SPEED_LIMIT).filter(|v| *v > 0.0)
    }
}

/// Periodic maintenance plan keyed on a position attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Maintenance {
    pub id: i64,
    pub name: String,
    /// Position attribute tracked by this plan (e.g. `totalDistance`)
    #[serde(rename = "type")]
    pub kind: String,
    pub start: f64,
    pub period: f64,
}
