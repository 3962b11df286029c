//! Latest-position and reference-data cache

use fleet_model::{Calendar, Device, Geofence, Maintenance, Position};
use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;
use tracing::{debug, info};

/// Read-mostly view of the latest per-device state and reference data
pub trait ObjectCache: Send + Sync {
    /// Latest accepted position for a device
    fn last_position(&self, device_id: i64) -> Option<Position>;

    fn device(&self, device_id: i64) -> Option<Device>;

    fn geofence(&self, geofence_id: i64) -> Option<Geofence>;

    fn calendar(&self, calendar_id: i64) -> Option<Calendar>;

    fn maintenance(&self, maintenance_id: i64) -> Option<Maintenance>;

    /// Maintenance plans linked to a device
    fn device_maintenances(&self, device_id: i64) -> Vec<Maintenance>;

    /// Record a position as the device's latest if it is not older than the cached one
    fn update_position(&self, position: &Position);

    /// Whether `position` is at least as recent as the cached one
    fn is_latest(&self, position: &Position) -> bool {
        self.last_position(position.device_id)
            .map_or(true, |last| position.fix_time >= last.fix_time)
    }
}

/// Process-local cache
#[derive(Default)]
pub struct MemoryCache {
    positions: RwLock<HashMap<i64, Position>>,
    devices: RwLock<HashMap<i64, Device>>,
    geofences: RwLock<HashMap<i64, Geofence>>,
    calendars: RwLock<HashMap<i64, Calendar>>,
    maintenances: RwLock<HashMap<i64, Maintenance>>,
    maintenance_links: RwLock<HashMap<i64, BTreeSet<i64>>>,
}

fn read<K: std::hash::Hash + Eq, V: Clone>(map: &RwLock<HashMap<K, V>>, key: &K) -> Option<V> {
    map.read().ok().and_then(|m| m.get(key).cloned())
}

fn write<K: std::hash::Hash + Eq, V>(map: &RwLock<HashMap<K, V>>, key: K, value: V) {
    if let Ok(mut m) = map.write() {
        m.insert(key, value);
    }
}

fn delete<K: std::hash::Hash + Eq, V>(map: &RwLock<HashMap<K, V>>, key: &K) {
    if let Ok(mut m) = map.write() {
        m.remove(key);
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        info!("Creating in-memory object cache");
        Self::default()
    }

    pub fn put_device(&self, device: Device) {
        write(&self.devices, device.id, device);
    }

    pub fn put_geofence(&self, geofence: Geofence) {
        write(&self.geofences, geofence.id, geofence);
    }

    pub fn put_calendar(&self, calendar: Calendar) {
        write(&self.calendars, calendar.id, calendar);
    }

    pub fn put_maintenance(&self, maintenance: Maintenance) {
        write(&self.maintenances, maintenance.id, maintenance);
    }

    pub fn remove_geofence(&self, geofence_id: i64) {
        delete(&self.geofences, &geofence_id);
    }

    pub fn remove_calendar(&self, calendar_id: i64) {
        delete(&self.calendars, &calendar_id);
    }

    /// Link a maintenance plan to a device
    pub fn link_maintenance(&self, device_id: i64, maintenance_id: i64) {
        if let Ok(mut links) = self.maintenance_links.write() {
            links.entry(device_id).or_default().insert(maintenance_id);
        }
    }

    /// Number of devices with a cached position
    pub fn position_count(&self) -> usize {
        self.positions.read().map(|p| p.len()).unwrap_or(0)
    }
}

impl ObjectCache for MemoryCache {
    fn last_position(&self, device_id: i64) -> Option<Position> {
        read(&self.positions, &device_id)
    }

    fn device(&self, device_id: i64) -> Option<Device> {
        read(&self.devices, &device_id)
    }

    fn geofence(&self, geofence_id: i64) -> Option<Geofence> {
        read(&self.geofences, &geofence_id)
    }

    fn calendar(&self, calendar_id: i64) -> Option<Calendar> {
        read(&self.calendars, &calendar_id)
    }

    fn maintenance(&self, maintenance_id: i64) -> Option<Maintenance> {
        read(&self.maintenances, &maintenance_id)
    }

    fn device_maintenances(&self, device_id: i64) -> Vec<Maintenance> {
        let ids: Vec<i64> = self
            .maintenance_links
            .read()
            .ok()
            .and_then(|links| links.get(&device_id).map(|set| set.iter().copied().collect()))
            .unwrap_or_default();
        ids.into_iter().filter_map(|id| self.maintenance(id)).collect()
    }

    fn update_position(&self, position: &Position) {
        let Ok(mut positions) = self.positions.write() else {
            return;
        };
        match positions.get(&position.device_id) {
            Some(last) if last.fix_time > position.fix_time => {
                debug!(
                    "Keeping newer cached position {} for device {}",
                    last.id, position.device_id
                );
            }
            _ => {
                positions.insert(position.device_id, position.clone());
            }
        }
    }
}
