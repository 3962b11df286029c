//! Typed facet store

use fleet_model::Device;
use std::sync::Arc;
use tracing::debug;

use crate::backend::{MemoryBackend, StateBackend};
use crate::facet::{DurableFacet, Facet};
use crate::StateError;

/// Typed view over a [`StateBackend`]
///
/// Cloning is cheap; clones share the backend. Callers serialize access
/// per device, the store itself does no per-key locking.
#[derive(Clone)]
pub struct StateStore {
    backend: Arc<dyn StateBackend>,
}

impl StateStore {
    pub fn new(backend: Arc<dyn StateBackend>) -> Self {
        Self { backend }
    }

    /// Store backed by a fresh [`MemoryBackend`]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    fn key<F: Facet>(device_id: i64) -> String {
        format!("{}:{}", F::NAME, device_id)
    }

    pub fn load<F: Facet>(&self, device_id: i64) -> Result<Option<F>, StateError> {
        match self.backend.get(&Self::key::<F>(device_id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn save<F: Facet>(&self, device_id: i64, state: &F) -> Result<(), StateError> {
        let bytes = serde_json::to_vec(state)?;
        debug!("Saving {} state for device {}", F::NAME, device_id);
        self.backend.put(&Self::key::<F>(device_id), bytes)
    }

    pub fn remove<F: Facet>(&self, device_id: i64) -> Result<(), StateError> {
        self.backend.remove(&Self::key::<F>(device_id))
    }

    /// Stored facet, or one rebuilt from the device's persisted columns
    pub fn load_or_seed<F: DurableFacet>(&self, device: &Device) -> Result<F, StateError> {
        match self.load::<F>(device.id)? {
            Some(state) => Ok(state),
            None => {
                debug!("Seeding {} state for device {} from entity", F::NAME, device.id);
                Ok(F::from_device(device))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        count: u32,
        label: Option<String>,
    }

    impl Facet for Counter {
        const NAME: &'static str = "counter";
    }

    impl DurableFacet for Counter {
        const COLUMNS: &'static [&'static str] = &["name"];

        fn from_device(device: &Device) -> Self {
            Self {
                count: 0,
                label: Some(device.name.clone()),
            }
        }

        fn apply_to(&self, device: &mut Device) {
            if let Some(label) = &self.label {
                device.name = label.clone();
            }
        }
    }

    struct BrokenBackend;

    impl StateBackend for BrokenBackend {
        fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, StateError> {
            Err(StateError::Backend("unreachable".into()))
        }
        fn put(&self, _key: &str, _value: Vec<u8>) -> Result<(), StateError> {
            Err(StateError::Backend("unreachable".into()))
        }
        fn remove(&self, _key: &str) -> Result<(), StateError> {
            Ok(())
        }
    }

    #[test]
    fn test_save_and_load() {
        let store = StateStore::in_memory();
        assert!(store.load::<Counter>(1).unwrap().is_none());

        let state = Counter {
            count: 3,
            label: Some("x".into()),
        };
        store.save(1, &state).unwrap();
        assert_eq!(store.load::<Counter>(1).unwrap(), Some(state));
        assert!(store.load::<Counter>(2).unwrap().is_none());

        store.remove::<Counter>(1).unwrap();
        assert!(store.load::<Counter>(1).unwrap().is_none());
    }

    #[test]
    fn test_seed_from_device() {
        let store = StateStore::in_memory();
        let device = Device::new(4, "truck");

        let seeded: Counter = store.load_or_seed(&device).unwrap();
        assert_eq!(seeded.label.as_deref(), Some("truck"));

        store
            .save(4, &Counter {
                count: 9,
                label: None,
            })
            .unwrap();
        let stored: Counter = store.load_or_seed(&device).unwrap();
        assert_eq!(stored.count, 9);
    }

    #[test]
    fn test_backend_errors_propagate() {
        let store = StateStore::new(Arc::new(BrokenBackend));
        assert!(store.load::<Counter>(1).is_err());
        assert!(store.save(1, &Counter::default()).is_err());
    }

    #[test]
    fn test_corrupt_entry_is_serialization_error() {
        let backend = Arc::new(MemoryBackend::new());
        backend.put("counter:1", b"not json".to_vec()).unwrap();
        let store = StateStore::new(backend);
        assert!(matches!(
            store.load::<Counter>(1),
            Err(StateError::Serialization(_))
        ));
    }

    proptest::proptest! {
        #[test]
        fn prop_round_trip_is_lossless(count in 0u32..10_000, label in proptest::option::of("[a-z]{0,12}")) {
            let store = StateStore::in_memory();
            let state = Counter { count, label };
            store.save(7, &state).unwrap();
            proptest::prop_assert_eq!(store.load::<Counter>(7).unwrap(), Some(state));
        }
    }
}
