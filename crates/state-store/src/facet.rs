//! Facet traits

use fleet_model::Device;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// One handler's slice of per-device derived state
pub trait Facet: Serialize + DeserializeOwned + Default + Clone + PartialEq + Send + 'static {
    /// Stable key prefix in the backend
    const NAME: &'static str;
}

/// Facet whose persisted projection lives on the device entity
pub trait DurableFacet: Facet {
    /// Device columns written by [`apply_to`](Self::apply_to)
    const COLUMNS: &'static [&'static str];

    /// Rebuild the facet from persisted device columns
    fn from_device(device: &Device) -> Self;

    /// Copy the persisted projection onto the device
    fn apply_to(&self, device: &mut Device);

    /// True when both values persist to identical columns
    fn persisted_eq(&self, other: &Self) -> bool {
        self == other
    }
}
