//! Handler contract and shared collaborators

use fleet_model::{Device, Position};
use state_store::{DurableFacet, Facet, StateStore};
use std::sync::Arc;
use storage::{DevicePersistence, ObjectCache};
use tracing::warn;

use crate::sink::EventSink;
use crate::DetectionError;

/// One detection concern applied to each position
///
/// Handlers never call each other. A failing handler must not stop the
/// remaining handlers for the same position; the pipeline enforces this.
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn enabled(&self) -> bool {
        true
    }

    /// Analyze one position, reporting events to `sink`
    fn analyze(&self, position: &Position, sink: &dyn EventSink) -> Result<(), DetectionError>;
}

/// External collaborators shared by all handlers
#[derive(Clone)]
pub struct HandlerContext {
    pub cache: Arc<dyn ObjectCache>,
    pub states: StateStore,
    pub persistence: Arc<dyn DevicePersistence>,
}

impl HandlerContext {
    pub fn new(
        cache: Arc<dyn ObjectCache>,
        states: StateStore,
        persistence: Arc<dyn DevicePersistence>,
    ) -> Self {
        Self {
            cache,
            states,
            persistence,
        }
    }

    /// Store a session-only facet if it changed
    pub(crate) fn commit<F: Facet>(&self, device_id: i64, before: &F, after: &F) -> Result<(), DetectionError> {
        if before != after {
            self.states.save(device_id, after)?;
        }
        Ok(())
    }

    /// Store a durable facet if it changed and write its columns if the
    /// persisted projection changed
    ///
    /// A failed column write is logged only; the stored facet stays
    /// authoritative until the next report.
    pub(crate) fn commit_durable<F: DurableFacet>(
        &self,
        device: &Device,
        before: &F,
        after: &F,
    ) -> Result<(), DetectionError> {
        if before == after {
            return Ok(());
        }
        self.states.save(device.id, after)?;

        if !before.persisted_eq(after) {
            let mut updated = device.clone();
            after.apply_to(&mut updated);
            if let Err(e) = self.persistence.update_columns(&updated, F::COLUMNS) {
                warn!("Failed to persist {} state of device {}: {}", F::NAME, device.id, e);
            }
        }
        Ok(())
    }
}
