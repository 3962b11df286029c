//! Idle alarm
//!
//! Fires once when a vehicle stands with the ignition on for longer than
//! the threshold, then re-arms when the vehicle stops idling. Reports may
//! arrive out of order; the start of the idle period only moves backwards
//! until the alarm fired.

use chrono::{DateTime, Duration, Utc};
use fleet_model::{columns, keys, Device, Event, EventType, Position};
use serde::{Deserialize, Serialize};
use state_store::{DurableFacet, Facet};
use tracing::{debug, info, warn};

use crate::config::IdleConfig;
use crate::handler::{EventHandler, HandlerContext};
use crate::sink::EventSink;
use crate::DetectionError;

/// Per-device idle state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdleState {
    pub start_time: Option<DateTime<Utc>>,
    pub alarm_fired: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Facet for IdleState {
    const NAME: &'static str = "idle";
}

impl DurableFacet for IdleState {
    const COLUMNS: &'static [&'static str] = &[
        columns::IDLE_START_TIME,
        columns::IDLE_ALARM_FIRED,
        columns::IDLE_LATITUDE,
        columns::IDLE_LONGITUDE,
    ];

    fn from_device(device: &Device) -> Self {
        Self {
            start_time: device.idle_start_time,
            alarm_fired: device.idle_alarm_fired,
            latitude: device.idle_latitude,
            longitude: device.idle_longitude,
        }
    }

    fn apply_to(&self, device: &mut Device) {
        device.idle_start_time = self.start_time;
        device.idle_alarm_fired = self.alarm_fired;
        device.idle_latitude = self.latitude;
        device.idle_longitude = self.longitude;
    }
}

/// Ignition on, not moving and slower than `speed_epsilon`
///
/// A report without a `motion` flag counts as not moving; the speed
/// check still applies.
pub fn is_idle(position: &Position, speed_epsilon: f64) -> bool {
    position.boolean(keys::IGNITION) == Some(true)
        && position.boolean(keys::MOTION) != Some(true)
        && position.speed < speed_epsilon
}

/// Advance the state with one report; returns the alarm when it fires
pub fn update_state(
    state: &mut IdleState,
    position: &Position,
    threshold: Duration,
    speed_epsilon: f64,
) -> Option<Event> {
    let fix_time = position.fix_time;

    if !is_idle(position, speed_epsilon) {
        match state.start_time {
            Some(start) if fix_time < start => {}
            _ => *state = IdleState::default(),
        }
        return None;
    }

    let start = match state.start_time {
        None => {
            state.start_time = Some(fix_time);
            state.latitude = Some(position.latitude);
            state.longitude = Some(position.longitude);
            fix_time
        }
        Some(start) if fix_time < start && !state.alarm_fired => {
            state.start_time = Some(fix_time);
            state.latitude = Some(position.latitude);
            state.longitude = Some(position.longitude);
            fix_time
        }
        Some(start) => start,
    };

    let elapsed = fix_time - start;
    if state.alarm_fired || elapsed < threshold {
        return None;
    }

    state.alarm_fired = true;
    state.start_time = Some(start.checked_add_signed(threshold).unwrap_or(fix_time));
    Some(Event::new(EventType::DeviceIdle, position).set(keys::IDLE_DURATION, elapsed.num_seconds()))
}

/// Idle alarm handler
pub struct IdleHandler {
    ctx: HandlerContext,
    config: IdleConfig,
}

impl IdleHandler {
    pub fn new(ctx: HandlerContext, config: IdleConfig) -> Self {
        Self { ctx, config }
    }

    /// Device attribute `idleThreshold` (seconds) overrides the configured threshold
    fn threshold(&self, device: &Device) -> Duration {
        if let Some(seconds) = device.positive_attribute(keys::IDLE_THRESHOLD) {
            match Duration::try_seconds(seconds as i64) {
                Some(threshold) => return threshold,
                None => warn!(
                    "Ignoring out-of-range idleThreshold {} of device {}",
                    seconds, device.id
                ),
            }
        }
        self.config.threshold()
    }
}

impl EventHandler for IdleHandler {
    fn name(&self) -> &'static str {
        "idle"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn analyze(&self, position: &Position, sink: &dyn EventSink) -> Result<(), DetectionError> {
        let Some(device) = self.ctx.cache.device(position.device_id) else {
            debug!("Idle skipped: device {} not cached", position.device_id);
            return Ok(());
        };

        let before: IdleState = self.ctx.states.load_or_seed(&device)?;
        let mut state = before.clone();

        if let Some(event) = update_state(
            &mut state,
            position,
            self.threshold(&device),
            self.config.speed_epsilon,
        ) {
            info!("Device {} idle since {:?}", device.id, before.start_time);
            sink.event_detected(event);
        }

        self.ctx.commit_durable(&device, &before, &state)
    }
}
