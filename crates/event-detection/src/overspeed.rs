//! Overspeed detection
//!
//! An event fires only after the vehicle stayed above its effective
//! speed limit for the minimal duration. After each event the debounce
//! restarts from scratch on the next above-limit report, so a vehicle
//! that keeps speeding gets repeated events rather than one long one.

use chrono::{DateTime, Duration, Utc};
use fleet_model::{keys, Device, Event, EventType, Geofence, Position};
use serde::{Deserialize, Serialize};
use state_store::Facet;
use tracing::debug;

use crate::config::OverspeedConfig;
use crate::handler::{EventHandler, HandlerContext};
use crate::sink::EventSink;
use crate::DetectionError;

/// Per-device overspeed state (session only)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverspeedState {
    pub active: bool,
    /// Start of the running debounce period
    pub time: Option<DateTime<Utc>>,
    /// Geofence that supplied the limit, if any
    pub geofence_id: Option<i64>,
}

impl Facet for OverspeedState {
    const NAME: &'static str = "overspeed";
}

/// Effective limit for one report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedLimit {
    /// Knots
    pub value: f64,
    pub geofence_id: Option<i64>,
}

/// Resolve the limit: position > geofences > device > global config
///
/// Geofence limits are combined by `prefer_lowest`; zero means "no
/// limit" at every level. Returns `None` when nothing is configured.
pub fn resolve_speed_limit(
    position: &Position,
    geofences: &[Geofence],
    device: Option<&Device>,
    config: &OverspeedConfig,
) -> Option<SpeedLimit> {
    if let Some(value) = position.double(keys::SPEED_LIMIT).filter(|v| *v > 0.0) {
        return Some(SpeedLimit {
            value,
            geofence_id: None,
        });
    }

    let mut best: Option<SpeedLimit> = None;
    for geofence in geofences {
        let Some(value) = geofence.speed_limit() else {
            continue;
        };
        let better = match best {
            None => true,
            Some(current) if config.prefer_lowest => value < current.value,
            Some(current) => value > current.value,
        };
        if better {
            best = Some(SpeedLimit {
                value,
                geofence_id: Some(geofence.id),
            });
        }
    }
    if best.is_some() {
        return best;
    }

    device
        .and_then(|d| d.positive_attribute(keys::SPEED_LIMIT))
        .or_else(|| Some(config.speed_limit).filter(|v| *v > 0.0))
        .map(|value| SpeedLimit {
            value,
            geofence_id: None,
        })
}

/// Advance the state with one report; returns an event once the debounce elapsed
pub fn update_state(
    state: &mut OverspeedState,
    position: &Position,
    limit: SpeedLimit,
    multiplier: f64,
    minimal_duration: Duration,
) -> Option<Event> {
    let above = position.speed > limit.value * multiplier;

    if !state.active {
        if above {
            state.active = true;
            state.time = Some(position.fix_time);
            state.geofence_id = limit.geofence_id;
        }
        return None;
    }

    if !above {
        *state = OverspeedState::default();
        return None;
    }

    match state.time {
        Some(start) if position.fix_time - start >= minimal_duration => {
            state.time = None;
            Some(
                Event::new(EventType::DeviceOverspeed, position)
                    .with_geofence(state.geofence_id)
                    .set(keys::SPEED, position.speed)
                    .set(keys::SPEED_LIMIT, limit.value)
                    .set(keys::DURATION, (position.fix_time - start).num_seconds()),
            )
        }
        Some(_) => None,
        None => {
            state.time = Some(position.fix_time);
            state.geofence_id = limit.geofence_id;
            None
        }
    }
}

/// Overspeed event handler
pub struct OverspeedHandler {
    ctx: HandlerContext,
    config: OverspeedConfig,
}

impl OverspeedHandler {
    pub fn new(ctx: HandlerContext, config: OverspeedConfig) -> Self {
        Self { ctx, config }
    }
}

impl EventHandler for OverspeedHandler {
    fn name(&self) -> &'static str {
        "overspeed"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn analyze(&self, position: &Position, sink: &dyn EventSink) -> Result<(), DetectionError> {
        if !position.valid || !self.ctx.cache.is_latest(position) {
            return Ok(());
        }

        let geofences: Vec<Geofence> = position
            .geofence_set()
            .into_iter()
            .filter_map(|id| self.ctx.cache.geofence(id))
            .collect();
        let device = self.ctx.cache.device(position.device_id);
        let Some(limit) = resolve_speed_limit(position, &geofences, device.as_ref(), &self.config) else {
            return Ok(());
        };

        let before: OverspeedState = self
            .ctx
            .states
            .load(position.device_id)?
            .unwrap_or_default();
        let mut state = before.clone();

        if let Some(event) = update_state(
            &mut state,
            position,
            limit,
            self.config.multiplier,
            self.config.minimal_duration(),
        ) {
            debug!(
                "Device {} overspeed {:.1} > {:.1} kn",
                position.device_id, position.speed, limit.value
            );
            sink.event_detected(event);
        }

        self.ctx.commit(position.device_id, &before, &state)
    }
}
