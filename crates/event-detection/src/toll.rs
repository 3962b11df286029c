//! Toll-road entry/exit detection
//!
//! Devices report a per-fix `toll` flag that flickers near interchanges
//! and under bridges. A sliding window of recent flags must agree before
//! an entry or exit is confirmed.

use chrono::{DateTime, Utc};
use fleet_model::geo::segment_distance;
use fleet_model::{columns, keys, Device, Event, EventType, Position};
use serde::{Deserialize, Serialize};
use state_store::{DurableFacet, Facet};
use std::collections::VecDeque;
use tracing::debug;

use crate::config::TollConfig;
use crate::handler::{EventHandler, HandlerContext};
use crate::sink::EventSink;
use crate::DetectionError;

/// Per-device toll state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TollState {
    /// Recent observations, oldest first
    pub window: VecDeque<bool>,
    /// Set while on a toll road
    pub start_time: Option<DateTime<Utc>>,
    /// Distance on the current toll road (meters)
    pub distance: f64,
    /// Distance on all completed toll roads (meters)
    pub total_distance: f64,
    pub toll_ref: Option<String>,
    pub toll_name: Option<String>,
}

impl Facet for TollState {
    const NAME: &'static str = "toll";
}

impl DurableFacet for TollState {
    const COLUMNS: &'static [&'static str] = &[
        columns::TOLL_START_TIME,
        columns::TOLL_DISTANCE,
        columns::TOLL_TOTAL_DISTANCE,
    ];

    fn from_device(device: &Device) -> Self {
        Self {
            start_time: device.toll_start_time,
            distance: device.toll_distance,
            total_distance: device.toll_total_distance,
            ..Default::default()
        }
    }

    fn apply_to(&self, device: &mut Device) {
        device.toll_start_time = self.start_time;
        device.toll_distance = self.distance;
        device.toll_total_distance = self.total_distance;
    }

    fn persisted_eq(&self, other: &Self) -> bool {
        self.start_time == other.start_time
            && self.distance == other.distance
            && self.total_distance == other.total_distance
    }
}

impl TollState {
    pub fn on_toll(&self) -> bool {
        self.start_time.is_some()
    }

    fn observe(&mut self, on_toll: bool, window_size: usize) {
        self.window.push_back(on_toll);
        while self.window.len() > window_size.max(1) {
            self.window.pop_front();
        }
    }

    fn count(&self, value: bool) -> usize {
        self.window.iter().filter(|v| **v == value).count()
    }
}

fn with_toll_names(mut event: Event, state: &TollState) -> Event {
    if let Some(toll_ref) = &state.toll_ref {
        event = event.set(keys::TOLL_REF, toll_ref.as_str());
    }
    if let Some(toll_name) = &state.toll_name {
        event = event.set(keys::TOLL_NAME, toll_name.as_str());
    }
    event
}

/// Advance the state with one report; returns an event on a confirmed transition
pub fn update_state(
    state: &mut TollState,
    last: Option<&Position>,
    position: &Position,
    config: &TollConfig,
) -> Option<Event> {
    if state.on_toll() {
        if let Some(last) = last {
            state.distance += segment_distance(last, position);
        }
    }

    let on_toll = position.boolean(keys::TOLL)?;
    state.observe(on_toll, config.window_size);
    let threshold = config.effective_threshold();

    match state.start_time {
        None if state.count(true) >= threshold => {
            state.start_time = Some(position.fix_time);
            state.distance = 0.0;
            state.toll_ref = position.string(keys::TOLL_REF).map(str::to_string);
            state.toll_name = position.string(keys::TOLL_NAME).map(str::to_string);
            state.window.clear();
            Some(with_toll_names(
                Event::new(EventType::DeviceTollRouteEnter, position),
                state,
            ))
        }
        Some(start) if state.count(false) >= threshold => {
            let event = with_toll_names(
                Event::new(EventType::DeviceTollRouteExit, position),
                state,
            )
            .set(keys::TOLL_DISTANCE, state.distance)
            .set(keys::TOLL_DURATION, (position.fix_time - start).num_seconds());

            state.total_distance += state.distance;
            state.start_time = None;
            state.distance = 0.0;
            state.toll_ref = None;
            state.toll_name = None;
            state.window.clear();
            Some(event)
        }
        _ => None,
    }
}

/// Toll event handler
pub struct TollHandler {
    ctx: HandlerContext,
    config: TollConfig,
}

impl TollHandler {
    pub fn new(ctx: HandlerContext, config: TollConfig) -> Self {
        Self { ctx, config }
    }
}

impl EventHandler for TollHandler {
    fn name(&self) -> &'static str {
        "toll"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn analyze(&self, position: &Position, sink: &dyn EventSink) -> Result<(), DetectionError> {
        if !self.ctx.cache.is_latest(position) {
            return Ok(());
        }
        let Some(device) = self.ctx.cache.device(position.device_id) else {
            debug!("Toll skipped: device {} not cached", position.device_id);
            return Ok(());
        };

        let last = self.ctx.cache.last_position(device.id);
        let before: TollState = self.ctx.states.load_or_seed(&device)?;
        let mut state = before.clone();

        if let Some(event) = update_state(&mut state, last.as_ref(), position, &self.config) {
            debug!("Device {} {}", device.id, event.event_type.as_str());
            sink.event_detected(event);
        }

        self.ctx.commit_durable(&device, &before, &state)
    }
}
