//! Per-position handler pipeline

use fleet_model::{Event, Position};
use metrics::counter;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

use crate::config::DetectionConfig;
use crate::geofence::GeofenceHandler;
use crate::handler::{EventHandler, HandlerContext};
use crate::idle::IdleHandler;
use crate::maintenance::MaintenanceHandler;
use crate::motion::MotionHandler;
use crate::overspeed::OverspeedHandler;
use crate::sink::EventSink;
use crate::toll::TollHandler;

/// Forwards events while counting them
struct CountingSink<'a> {
    inner: &'a dyn EventSink,
    count: AtomicUsize,
}

impl EventSink for CountingSink<'_> {
    fn event_detected(&self, event: Event) {
        counter!("fleet_events_detected_total", "type" => event.event_type.as_str()).increment(1);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.inner.event_detected(event);
    }
}

/// Runs every enabled handler over each position in a fixed order
pub struct DetectionPipeline {
    ctx: HandlerContext,
    handlers: Vec<Box<dyn EventHandler>>,
}

impl DetectionPipeline {
    /// Build the standard handler chain
    pub fn new(config: &DetectionConfig, ctx: HandlerContext) -> Self {
        let handlers: Vec<Box<dyn EventHandler>> = vec![
            Box::new(MotionHandler::new(ctx.clone(), config.motion.clone())),
            Box::new(OverspeedHandler::new(ctx.clone(), config.overspeed.clone())),
            Box::new(GeofenceHandler::new(ctx.clone(), config.geofence.clone())),
            Box::new(TollHandler::new(ctx.clone(), config.toll.clone())),
            Box::new(IdleHandler::new(ctx.clone(), config.idle.clone())),
            Box::new(MaintenanceHandler::new(ctx.clone(), config.maintenance.clone())),
        ];
        Self::with_handlers(ctx, handlers)
    }

    /// Build a pipeline over an explicit handler list
    pub fn with_handlers(ctx: HandlerContext, handlers: Vec<Box<dyn EventHandler>>) -> Self {
        let pipeline = Self { ctx, handlers };
        info!("Detection pipeline: {:?}", pipeline.handler_names());
        pipeline
    }

    /// Names of the enabled handlers, in execution order
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers
            .iter()
            .filter(|h| h.enabled())
            .map(|h| h.name())
            .collect()
    }

    /// Process one position; returns the number of events emitted
    ///
    /// A handler error is logged and counted; the remaining handlers still
    /// see the position.
    pub fn process(&self, position: &Position, sink: &dyn EventSink) -> usize {
        let counting = CountingSink {
            inner: sink,
            count: AtomicUsize::new(0),
        };

        for handler in self.handlers.iter().filter(|h| h.enabled()) {
            if let Err(e) = handler.analyze(position, &counting) {
                warn!(
                    "Handler {} failed on position {} of device {}: {}",
                    handler.name(),
                    position.id,
                    position.device_id,
                    e
                );
                counter!("fleet_handler_failures_total", "handler" => handler.name()).increment(1);
            }
        }

        self.ctx.cache.update_position(position);

        let count = counting.count.into_inner();
        if count > 0 {
            debug!("Position {} produced {} events", position.id, count);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CollectingSink;
    use crate::testing::{position, Harness, DEVICE_ID};
    use crate::DetectionError;
    use fleet_model::{keys, Device, EventType, Geofence};
    use state_store::StateStore;
    use std::sync::Arc;
    use storage::{DevicePersistence, ObjectCache, StorageError};

    struct FailingHandler;

    impl EventHandler for FailingHandler {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn analyze(&self, _position: &Position, _sink: &dyn EventSink) -> Result<(), DetectionError> {
            Err(StorageError::DatabaseError("boom".to_string()).into())
        }
    }

    struct UnavailableDatabase;

    impl DevicePersistence for UnavailableDatabase {
        fn update_columns(&self, _device: &Device, _columns: &[&str]) -> Result<(), StorageError> {
            Err(StorageError::DatabaseError("connection refused".to_string()))
        }
    }

    fn types(events: &[Event]) -> Vec<EventType> {
        events.iter().map(|e| e.event_type).collect()
    }

    #[test]
    fn test_default_handler_order() {
        let harness = Harness::new();
        let pipeline = DetectionPipeline::new(&DetectionConfig::default(), harness.ctx.clone());
        assert_eq!(
            pipeline.handler_names(),
            vec!["motion", "overspeed", "geofence", "toll", "idle", "maintenance"]
        );
    }

    #[test]
    fn test_disabled_handlers_skipped() {
        let harness = Harness::new();
        let mut config = DetectionConfig::default();
        config.toll.enabled = false;
        config.idle.enabled = false;
        let pipeline = DetectionPipeline::new(&config, harness.ctx.clone());
        assert_eq!(
            pipeline.handler_names(),
            vec!["motion", "overspeed", "geofence", "maintenance"]
        );
    }

    #[test]
    fn test_process_updates_cache_and_counts() {
        let harness = Harness::new();
        harness.cache.put_geofence(Geofence::new(3, "Depot"));
        let pipeline = DetectionPipeline::new(&DetectionConfig::default(), harness.ctx.clone());
        let sink = CollectingSink::new();

        assert_eq!(pipeline.process(&position(1, 0), &sink), 0);
        let count = pipeline.process(&position(2, 10).with_geofences([3]), &sink);

        assert_eq!(count, 1);
        assert_eq!(types(&sink.take()), vec![EventType::GeofenceEnter]);
        assert_eq!(harness.cache.last_position(DEVICE_ID).map(|p| p.id), Some(2));
    }

    #[test]
    fn test_failing_handler_does_not_block_others() {
        let harness = Harness::new();
        harness.cache.put_geofence(Geofence::new(3, "Depot"));
        let handlers: Vec<Box<dyn EventHandler>> = vec![
            Box::new(FailingHandler),
            Box::new(GeofenceHandler::new(harness.ctx.clone(), Default::default())),
        ];
        let pipeline = DetectionPipeline::with_handlers(harness.ctx.clone(), handlers);
        let sink = CollectingSink::new();

        let count = pipeline.process(&position(1, 0).with_geofences([3]), &sink);
        assert_eq!(count, 1);
        assert_eq!(harness.cache.position_count(), 1);
    }

    #[test]
    fn test_persistence_failure_still_emits() {
        let harness = Harness::new();
        let ctx = HandlerContext::new(
            harness.cache.clone(),
            StateStore::in_memory(),
            Arc::new(UnavailableDatabase),
        );
        let mut config = DetectionConfig::default();
        config.idle.threshold = 60;
        let pipeline = DetectionPipeline::new(&config, ctx.clone());
        let sink = CollectingSink::new();

        let idle = |id, seconds| {
            position(id, seconds)
                .with_attribute(keys::IGNITION, true)
                .with_attribute(keys::MOTION, false)
        };
        pipeline.process(&idle(1, 0), &sink);
        pipeline.process(&idle(2, 60), &sink);
        // Stored facet stays authoritative, so the alarm does not repeat
        pipeline.process(&idle(3, 120), &sink);

        assert_eq!(types(&sink.take()), vec![EventType::DeviceIdle]);
        assert_eq!(harness.repository.write_count(), 0);
    }

    #[test]
    fn test_out_of_range_idle_threshold_keeps_pipeline_running() {
        let mut device = Device::new(DEVICE_ID, "bad override");
        device
            .attributes
            .insert(keys::IDLE_THRESHOLD.to_string(), serde_json::json!(1e18));
        let harness = Harness::with_device(device);
        harness.cache.put_geofence(Geofence::new(3, "Depot"));
        let mut config = DetectionConfig::default();
        config.idle.threshold = 60;
        let pipeline = DetectionPipeline::new(&config, harness.ctx.clone());
        let sink = CollectingSink::new();

        let idle = |id, seconds| {
            position(id, seconds)
                .with_attribute(keys::IGNITION, true)
                .with_attribute(keys::MOTION, false)
                .with_geofences([3])
        };
        pipeline.process(&idle(1, 0), &sink);
        pipeline.process(&idle(2, 60), &sink);

        assert_eq!(
            types(&sink.take()),
            vec![EventType::GeofenceEnter, EventType::DeviceIdle]
        );
        assert_eq!(harness.cache.last_position(DEVICE_ID).map(|p| p.id), Some(2));
    }

    #[test]
    fn test_trip_and_overspeed_scenario() {
        let harness = Harness::new();
        let mut config = DetectionConfig::default();
        config.overspeed.speed_limit = 50.0;
        config.motion.min_trip_distance = 100.0;
        let pipeline = DetectionPipeline::new(&config, harness.ctx.clone());
        let sink = CollectingSink::new();

        let drive = |id: i64, seconds: i64, speed: f64, odometer: f64| {
            position(id, seconds)
                .with_speed(speed)
                .with_attribute(keys::TOTAL_DISTANCE, odometer)
        };
        pipeline.process(&drive(1, 0, 0.0, 0.0), &sink);
        pipeline.process(&drive(2, 10, 30.0, 0.0), &sink);
        pipeline.process(&drive(3, 20, 60.0, 200.0), &sink);
        pipeline.process(&drive(4, 30, 60.0, 400.0), &sink);

        assert_eq!(
            types(&sink.take()),
            vec![EventType::DeviceMoving, EventType::DeviceOverspeed]
        );
    }
}
