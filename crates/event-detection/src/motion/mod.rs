//! Motion / trip detection
//!
//! Each report carries a raw motion flag. A flag change opens a
//! candidate transition; the candidate is confirmed (trip start or stop)
//! once enough evidence accumulates, or cancelled when the flag returns
//! to the confirmed streak. Two confirmation rules exist side by side
//! and are selected once from configuration.

mod legacy;
mod streak;

pub use legacy::LegacyMotion;
pub use streak::StreakMotion;

use chrono::{DateTime, Duration, Utc};
use fleet_model::geo::segment_distance;
use fleet_model::{columns, keys, Device, Event, EventType, Position};
use serde::{Deserialize, Serialize};
use state_store::{DurableFacet, Facet};
use tracing::debug;

use crate::config::{MotionAlgorithm, MotionConfig};
use crate::handler::{EventHandler, HandlerContext};
use crate::sink::EventSink;
use crate::DetectionError;

/// Per-device motion state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionState {
    /// Confirmed state (true = on a trip)
    pub streak: bool,
    /// Raw flag of the latest report
    pub state: bool,
    /// Start of the open candidate transition
    pub time: Option<DateTime<Utc>>,
    /// Distance accumulated since the candidate opened (meters)
    pub distance: f64,
    pub position_id: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Start of the current confirmed streak
    pub streak_time: Option<DateTime<Utc>>,
    /// Distance covered since the streak started (meters)
    pub streak_distance: f64,
}

impl Facet for MotionState {
    const NAME: &'static str = "motion";
}

impl DurableFacet for MotionState {
    const COLUMNS: &'static [&'static str] = &[
        columns::MOTION_STREAK,
        columns::MOTION_STATE,
        columns::MOTION_TIME,
        columns::MOTION_DISTANCE,
        columns::MOTION_POSITION_ID,
        columns::MOTION_LATITUDE,
        columns::MOTION_LONGITUDE,
        columns::MOTION_STREAK_TIME,
        columns::MOTION_STREAK_DISTANCE,
    ];

    fn from_device(device: &Device) -> Self {
        Self {
            streak: device.motion_streak,
            state: device.motion_state,
            time: device.motion_time,
            distance: device.motion_distance,
            position_id: device.motion_position_id,
            latitude: device.motion_latitude,
            longitude: device.motion_longitude,
            streak_time: device.motion_streak_time,
            streak_distance: device.motion_streak_distance,
        }
    }

    fn apply_to(&self, device: &mut Device) {
        device.motion_streak = self.streak;
        device.motion_state = self.state;
        device.motion_time = self.time;
        device.motion_distance = self.distance;
        device.motion_position_id = self.position_id;
        device.motion_latitude = self.latitude;
        device.motion_longitude = self.longitude;
        device.motion_streak_time = self.streak_time;
        device.motion_streak_distance = self.streak_distance;
    }
}

/// Evidence gathered for an open candidate
#[derive(Debug, Clone, Copy)]
pub(crate) struct Progress {
    pub elapsed: Duration,
    pub distance: f64,
}

impl MotionState {
    fn open_candidate(&mut self, position: &Position) {
        self.time = Some(position.fix_time);
        self.distance = 0.0;
        self.position_id = Some(position.id);
        self.latitude = Some(position.latitude);
        self.longitude = Some(position.longitude);
    }

    fn clear_candidate(&mut self) {
        self.time = None;
        self.distance = 0.0;
        self.position_id = None;
        self.latitude = None;
        self.longitude = None;
    }

    /// Bookkeeping shared by both algorithms
    ///
    /// Every report extends the current streak. Returns the candidate's
    /// evidence when the flag still agrees with an open candidate; `None`
    /// when the flag just changed or nothing is pending.
    pub(crate) fn track(&mut self, last: Option<&Position>, position: &Position, moving: bool) -> Option<Progress> {
        let segment = last.map_or(0.0, |last| segment_distance(last, position));
        if self.streak_time.is_none() {
            self.streak_time = Some(position.fix_time);
        } else {
            self.streak_distance += segment;
        }

        if moving != self.state {
            self.state = moving;
            if moving == self.streak {
                self.clear_candidate();
            } else {
                self.open_candidate(position);
            }
            return None;
        }

        let start = self.time?;
        self.distance += segment;
        Some(Progress {
            elapsed: position.fix_time - start,
            distance: self.distance,
        })
    }

    /// Confirm the open candidate and reset the accumulators
    ///
    /// The finished streak ends where the candidate began; the candidate's
    /// evidence carries over into the new streak.
    pub(crate) fn confirm(&mut self, position: &Position) -> MotionTransition {
        let time = self.time.unwrap_or(position.fix_time);
        let streak_start = self.streak_time.unwrap_or(time);
        let transition = MotionTransition {
            moving: self.state,
            position_id: self.position_id,
            time,
            distance: self.distance,
            duration: position.fix_time - time,
            streak_distance: (self.streak_distance - self.distance).max(0.0),
            streak_duration: time - streak_start,
        };
        self.streak = self.state;
        self.streak_time = Some(time);
        self.streak_distance = self.distance;
        self.clear_candidate();
        transition
    }
}

/// A confirmed start or stop
#[derive(Debug, Clone, PartialEq)]
pub struct MotionTransition {
    pub moving: bool,
    /// Report where the transition began
    pub position_id: Option<i64>,
    pub time: DateTime<Utc>,
    /// Evidence gathered by the candidate
    pub distance: f64,
    pub duration: Duration,
    /// The streak this transition ends (the trip for a stop, the parking
    /// period for a start)
    pub streak_distance: f64,
    pub streak_duration: Duration,
}

impl MotionTransition {
    pub fn into_event(self, device_id: i64) -> Event {
        let event_type = if self.moving {
            EventType::DeviceMoving
        } else {
            EventType::DeviceStopped
        };
        Event::at(event_type, device_id, self.position_id, self.time)
            .set(keys::DISTANCE, self.streak_distance)
            .set(keys::DURATION, self.streak_duration.num_seconds())
    }
}

/// Transition rule
pub trait MotionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Advance `state` with one report; returns a confirmed transition
    fn compute_motion_transition(
        &self,
        state: &mut MotionState,
        last: Option<&Position>,
        position: &Position,
        moving: bool,
    ) -> Option<MotionTransition>;
}

impl MotionAlgorithm {
    /// Build the configured strategy
    pub fn build(self, config: &MotionConfig) -> Box<dyn MotionStrategy> {
        match self {
            MotionAlgorithm::Legacy => Box::new(LegacyMotion::new(config)),
            MotionAlgorithm::Streak => Box::new(StreakMotion::new(config)),
        }
    }
}

/// Motion event handler
pub struct MotionHandler {
    ctx: HandlerContext,
    config: MotionConfig,
    strategy: Box<dyn MotionStrategy>,
}

impl MotionHandler {
    pub fn new(ctx: HandlerContext, config: MotionConfig) -> Self {
        let strategy = config.algorithm.build(&config);
        debug!("Motion handler using {} algorithm", strategy.name());
        Self {
            ctx,
            config,
            strategy,
        }
    }

    fn is_moving(&self, position: &Position) -> bool {
        position
            .boolean(keys::MOTION)
            .unwrap_or(position.speed > self.config.speed_threshold)
    }
}

impl EventHandler for MotionHandler {
    fn name(&self) -> &'static str {
        "motion"
    }

    fn enabled(&self) -> bool {
        self.config.enabled
    }

    fn analyze(&self, position: &Position, sink: &dyn EventSink) -> Result<(), DetectionError> {
        if !position.valid || !self.ctx.cache.is_latest(position) {
            return Ok(());
        }
        let Some(device) = self.ctx.cache.device(position.device_id) else {
            debug!("Motion skipped: device {} not cached", position.device_id);
            return Ok(());
        };

        let last = self.ctx.cache.last_position(device.id);
        let before: MotionState = self.ctx.states.load_or_seed(&device)?;
        let mut state = before.clone();

        let moving = self.is_moving(position);
        if let Some(transition) =
            self.strategy
                .compute_motion_transition(&mut state, last.as_ref(), position, moving)
        {
            debug!(
                "Device {} {} after {}s / {:.0}m",
                device.id,
                if transition.moving { "started moving" } else { "stopped" },
                transition.streak_duration.num_seconds(),
                transition.streak_distance
            );
            sink.event_detected(transition.into_event(device.id));
        }

        self.ctx.commit_durable(&device, &before, &state)
    }
}
