//! Repository Implementation

use crate::StorageError;
use fleet_model::Device;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

/// Partial-column writes of device entities
pub trait DevicePersistence: Send + Sync {
    /// Write only `columns` of `device`, keyed by its id
    fn update_columns(&self, device: &Device, columns: &[&str]) -> Result<(), StorageError>;
}

/// Repository for device rows (in-memory implementation)
///
/// Rows are kept in their serialized column form so an update touches
/// exactly the named columns and nothing else.
pub struct DeviceRepository {
    rows: Mutex<HashMap<i64, Map<String, Value>>>,
    writes: AtomicUsize,
}

impl DeviceRepository {
    pub fn new() -> Self {
        info!("Creating in-memory device repository");
        Self {
            rows: Mutex::new(HashMap::new()),
            writes: AtomicUsize::new(0),
        }
    }

    fn to_row(device: &Device) -> Result<Map<String, Value>, StorageError> {
        match serde_json::to_value(device)? {
            Value::Object(row) => Ok(row),
            other => Err(StorageError::SerializationError(format!(
                "Device serialized to non-object: {}",
                other
            ))),
        }
    }

    /// Insert or replace a full device row
    pub fn insert(&self, device: &Device) -> Result<(), StorageError> {
        let row = Self::to_row(device)?;
        let mut rows = self
            .rows
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;
        rows.insert(device.id, row);
        Ok(())
    }

    /// Load a device row
    pub fn get(&self, device_id: i64) -> Result<Device, StorageError> {
        let rows = self
            .rows
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;
        let row = rows.get(&device_id).ok_or(StorageError::NotFound(device_id))?;
        Ok(serde_json::from_value(Value::Object(row.clone()))?)
    }

    /// Number of partial updates applied so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl Default for DeviceRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl DevicePersistence for DeviceRepository {
    fn update_columns(&self, device: &Device, columns: &[&str]) -> Result<(), StorageError> {
        let source = Self::to_row(device)?;
        let mut rows = self
            .rows
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))?;
        let row = rows.get_mut(&device.id).ok_or(StorageError::NotFound(device.id))?;

        // Validate every column before touching the row
        let mut updates = Vec::with_capacity(columns.len());
        for column in columns {
            let value = source
                .get(*column)
                .ok_or_else(|| StorageError::UnknownColumn(column.to_string()))?;
            updates.push((column.to_string(), value.clone()));
        }
        for (column, value) in updates {
            row.insert(column, value);
        }

        self.writes.fetch_add(1, Ordering::Relaxed);
        debug!("Updated {} columns of device {}", columns.len(), device.id);
        Ok(())
    }
}
