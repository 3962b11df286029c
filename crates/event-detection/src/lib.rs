//! Fleet Event Detection
//!
//! Per-device state machines over a stream of position reports:
//! - Motion (trip start/stop) with two selectable algorithms
//! - Overspeed with debounce and geofence speed limits
//! - Geofence enter/exit gated by calendars
//! - Toll-road entry/exit with sliding-window confidence
//! - Idle alarm with one-shot re-arming
//! - Periodic maintenance thresholds
//!
//! Handlers emit events through an [`EventSink`] and persist durable
//! state through the storage layer. The [`PartitionedDispatcher`] keeps
//! each device's reports strictly ordered while devices run in parallel.

pub mod config;
pub mod dispatch;
pub mod geofence;
pub mod handler;
pub mod idle;
pub mod maintenance;
pub mod motion;
pub mod overspeed;
pub mod pipeline;
pub mod sink;
pub mod toll;

pub use config::{
    DetectionConfig, DispatchConfig, GeofenceConfig, IdleConfig, MaintenanceConfig, MotionAlgorithm,
    MotionConfig, OverspeedConfig, TollConfig,
};
pub use dispatch::PartitionedDispatcher;
pub use geofence::GeofenceHandler;
pub use handler::{EventHandler, HandlerContext};
pub use idle::{IdleHandler, IdleState};
pub use maintenance::MaintenanceHandler;
pub use motion::{LegacyMotion, MotionHandler, MotionState, MotionStrategy, MotionTransition, StreakMotion};
pub use overspeed::{OverspeedHandler, OverspeedState, SpeedLimit};
pub use pipeline::DetectionPipeline;
pub use sink::{ChannelSink, CollectingSink, EventSink};
pub use toll::{TollHandler, TollState};

use state_store::StateError;
use storage::StorageError;
use thiserror::Error;

/// Detection error types
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("State store error: {0}")]
    State(#[from] StateError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Dispatcher is shut down")]
    DispatcherClosed,
}

#[cfg(test)]
pub(crate) mod testing;
