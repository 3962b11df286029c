//! Periodic maintenance thresholds

use fleet_model::{Event, EventType, Maintenance, Position};
use tracing::debug;

use crate::config::MaintenanceConfig;
use crate::handler::{EventHandler, HandlerContext};
use crate::sink::EventSink;
use crate::DetectionError;

/// Whether moving from `old` to `new` crosses the start or a period boundary
pub fn crossed(maintenance: &Maintenance, old: f64, new: f64) -> bool {
    if maintenance.period == 0.0 || old == 0.0 || new == 0.0 || new < maintenance.start {
        return false;
    }
    if old < maintenance.start {
        return true;
    }
    let periods = |value: f64| ((value - maintenance.start) / maintenance.period).floor() as i64;
    periods(old) < periods(new)
}

/// Maintenance event handler
///
/// Compares the tracked attribute of each linked plan between the last
/// cached position and the current one.
pub struct MaintenanceHandler {
    ctx: HandlerContext,
    config: MaintenanceConfig,
}

impl MaintenanceHandler {
    pub fn new(ctx: HandlerContext, config: MaintenanceConfig) -> Self {
        Self { ctx, config }
    }
}

impl EventHandler for MaintenanceHandler {
    fn name(&self) -> &'static str {
        "maintenance"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn analyze(&self, position: &Position, sink: &dyn EventSink) -> Result<(), DetectionError> {
        if !self.ctx.cache.is_latest(position) {
            return Ok(());
        }
        let Some(last) = self.ctx.cache.last_position(position.device_id) else {
            return Ok(());
        };

        for maintenance in self.ctx.cache.device_maintenances(position.device_id) {
            let old = last.double(&maintenance.kind).unwrap_or(0.0);
            let new = position.double(&maintenance.kind).unwrap_or(0.0);
            if crossed(&maintenance, old, new) {
                debug!(
                    "Device {} reached maintenance {} at {}",
                    position.device_id, maintenance.id, new
                );
                sink.event_detected(
                    Event::new(EventType::Maintenance, position)
                        .with_maintenance(maintenance.id)
                        .set(&maintenance.kind, new),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{position, Harness, DEVICE_ID};
    use fleet_model::keys;
    use serde_json::json;

    fn oil_change() -> Maintenance {
        Maintenance {
            id: 7,
            name: "Oil change".to_string(),
            kind: keys::TOTAL_DISTANCE.to_string(),
            start: 10_000.0,
            period: 5_000.0,
        }
    }

    #[test]
    fn test_crossing_rules() {
        let plan = oil_change();
        assert!(crossed(&plan, 9_000.0, 10_000.0));
        assert!(!crossed(&plan, 10_000.0, 14_999.0));
        assert!(crossed(&plan, 14_999.0, 15_000.0));
        assert!(!crossed(&plan, 5_000.0, 9_999.0));
        // Missing readings never trigger
        assert!(!crossed(&plan, 0.0, 20_000.0));

        let disabled = Maintenance { period: 0.0, ..plan };
        assert!(!crossed(&disabled, 9_000.0, 10_000.0));
    }

    #[test]
    fn test_handler_emits_for_linked_plan() {
        let harness = Harness::new();
        harness.cache.put_maintenance(oil_change());
        harness.cache.link_maintenance(DEVICE_ID, 7);
        let handler = MaintenanceHandler::new(harness.ctx.clone(), MaintenanceConfig::default());

        let first = position(1, 0).with_attribute(keys::TOTAL_DISTANCE, 9_990.0);
        assert!(harness.run(&handler, &first).is_empty());

        let second = position(2, 10).with_attribute(keys::TOTAL_DISTANCE, 10_020.0);
        let events = harness.run(&handler, &second);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Maintenance);
        assert_eq!(events[0].maintenance_id, Some(7));
        assert_eq!(events[0].attributes["totalDistance"], json!(10_020.0));
    }

    #[test]
    fn test_unlinked_plan_ignored() {
        let harness = Harness::new();
        harness.cache.put_maintenance(oil_change());
        let handler = MaintenanceHandler::new(harness.ctx.clone(), MaintenanceConfig::default());

        harness.run(&handler, &position(1, 0).with_attribute(keys::TOTAL_DISTANCE, 9_990.0));
        let events = harness.run(&handler, &position(2, 10).with_attribute(keys::TOTAL_DISTANCE, 10_020.0));
        assert!(events.is_empty());
    }
}
