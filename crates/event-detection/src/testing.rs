//! Shared fixtures for handler tests

use chrono::{DateTime, Duration, TimeZone, Utc};
use fleet_model::{Device, Event, Position};
use state_store::StateStore;
use std::sync::Arc;
use storage::{DeviceRepository, MemoryCache, ObjectCache};

use crate::handler::{EventHandler, HandlerContext};
use crate::sink::CollectingSink;

pub const DEVICE_ID: i64 = 1;

/// Base time plus `seconds`
pub fn at(seconds: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap() + Duration::seconds(seconds)
}

/// Position of the test device `seconds` after the base time
pub fn position(id: i64, seconds: i64) -> Position {
    Position::new(id, DEVICE_ID, at(seconds), 48.0, 11.0)
}

pub struct Harness {
    pub cache: Arc<MemoryCache>,
    pub repository: Arc<DeviceRepository>,
    pub states: StateStore,
    pub ctx: HandlerContext,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_device(Device::new(DEVICE_ID, "test"))
    }

    pub fn with_device(device: Device) -> Self {
        let cache = Arc::new(MemoryCache::new());
        let repository = Arc::new(DeviceRepository::new());
        repository.insert(&device).unwrap();
        cache.put_device(device);
        let states = StateStore::in_memory();
        let ctx = HandlerContext::new(cache.clone(), states.clone(), repository.clone());
        Self {
            cache,
            repository,
            states,
            ctx,
        }
    }

    /// Run one handler and then record the position as the pipeline would
    pub fn run(&self, handler: &dyn EventHandler, position: &Position) -> Vec<Event> {
        let sink = CollectingSink::new();
        handler.analyze(position, &sink).unwrap();
        self.cache.update_position(position);
        sink.take()
    }
}
