//! Geofence enter/exit detection

use fleet_model::{Event, EventType, Position};
use std::collections::BTreeSet;
use tracing::debug;

use crate::config::GeofenceConfig;
use crate::handler::{EventHandler, HandlerContext};
use crate::sink::EventSink;
use crate::DetectionError;

/// Membership change between two reports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeofenceDiff {
    pub exited: BTreeSet<i64>,
    pub entered: BTreeSet<i64>,
}

impl GeofenceDiff {
    pub fn between(previous: &BTreeSet<i64>, current: &BTreeSet<i64>) -> Self {
        Self {
            exited: previous.difference(current).copied().collect(),
            entered: current.difference(previous).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.exited.is_empty() && self.entered.is_empty()
    }
}

/// Geofence event handler
///
/// Exits are reported before entries, each in ascending id order. A
/// geofence whose calendar is inactive at the fix time is skipped; a
/// deleted geofence is skipped; a deleted calendar no longer gates.
pub struct GeofenceHandler {
    ctx: HandlerContext,
    config: GeofenceConfig,
}

impl GeofenceHandler {
    pub fn new(ctx: HandlerContext, config: GeofenceConfig) -> Self {
        Self { ctx, config }
    }

    fn event_for(&self, geofence_id: i64, event_type: EventType, position: &Position) -> Option<Event> {
        let geofence = self.ctx.cache.geofence(geofence_id)?;
        let active = geofence
            .calendar_id
            .and_then(|id| self.ctx.cache.calendar(id))
            .map_or(true, |calendar| calendar.check_moment(position.fix_time));
        if !active {
            debug!(
                "Geofence {} {} suppressed by calendar",
                geofence_id,
                event_type.as_str()
            );
            return None;
        }
        Some(Event::new(event_type, position).with_geofence(Some(geofence_id)))
    }
}

impl EventHandler for GeofenceHandler {
    fn name(&self) -> &'static str {
        "geofence"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn analyze(&self, position: &Position, sink: &dyn EventSink) -> Result<(), DetectionError> {
        if !self.ctx.cache.is_latest(position) {
            return Ok(());
        }

        let previous = self
            .ctx
            .cache
            .last_position(position.device_id)
            .map(|last| last.geofence_set())
            .unwrap_or_default();
        let diff = GeofenceDiff::between(&previous, &position.geofence_set());

        for id in &diff.exited {
            if let Some(event) = self.event_for(*id, EventType::GeofenceExit, position) {
                sink.event_detected(event);
            }
        }
        for id in &diff.entered {
            if let Some(event) = self.event_for(*id, EventType::GeofenceEnter, position) {
                sink.event_detected(event);
            }
        }
        Ok(())
    }
}
