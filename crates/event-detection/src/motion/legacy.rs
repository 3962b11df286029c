//! Duration-or-distance motion rule

use chrono::Duration;
use fleet_model::{keys, Position};

use super::{MotionState, MotionStrategy, MotionTransition};
use crate::config::MotionConfig;

/// Confirms a start once the candidate lasted long enough or went far
/// enough, and a stop once it lasted long enough or ignition went off
pub struct LegacyMotion {
    min_trip_distance: f64,
    min_trip_duration: Duration,
    min_parking_duration: Duration,
    use_ignition: bool,
}

impl LegacyMotion {
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            min_trip_distance: config.min_trip_distance,
            min_trip_duration: config.min_trip_duration(),
            min_parking_duration: config.min_parking_duration(),
            use_ignition: config.use_ignition,
        }
    }
}

impl MotionStrategy for LegacyMotion {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn compute_motion_transition(
        &self,
        state: &mut MotionState,
        last: Option<&Position>,
        position: &Position,
        moving: bool,
    ) -> Option<MotionTransition> {
        let progress = state.track(last, position, moving)?;

        let confirmed = if moving {
            progress.elapsed >= self.min_trip_duration || progress.distance >= self.min_trip_distance
        } else {
            progress.elapsed >= self.min_parking_duration
                || (self.use_ignition && position.boolean(keys::IGNITION) == Some(false))
        };

        confirmed.then(|| state.confirm(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, position};

    fn strategy(use_ignition: bool) -> LegacyMotion {
        LegacyMotion::new(&MotionConfig {
            min_trip_distance: 500.0,
            min_trip_duration: 300,
            min_parking_duration: 300,
            use_ignition,
            ..Default::default()
        })
    }

    #[test]
    fn test_start_confirmed_by_duration_alone() {
        let motion = strategy(false);
        let mut state = MotionState::default();
        let p1 = position(1, 0);
        let p2 = position(2, 300);

        assert!(motion.compute_motion_transition(&mut state, None, &p1, true).is_none());
        let transition = motion
            .compute_motion_transition(&mut state, Some(&p1), &p2, true)
            .unwrap();

        assert!(transition.moving);
        assert_eq!(transition.position_id, Some(1));
        assert_eq!(transition.time, at(0));
        assert_eq!(transition.duration, Duration::seconds(300));
        assert!(state.streak);
        assert!(state.time.is_none());
        assert_eq!(state.distance, 0.0);
    }

    #[test]
    fn test_start_confirmed_by_distance_alone() {
        let motion = strategy(false);
        let mut state = MotionState::default();
        let p1 = position(1, 0).with_attribute(keys::TOTAL_DISTANCE, 1000.0);
        let p2 = position(2, 20).with_attribute(keys::TOTAL_DISTANCE, 1600.0);

        motion.compute_motion_transition(&mut state, None, &p1, true);
        let transition = motion
            .compute_motion_transition(&mut state, Some(&p1), &p2, true)
            .unwrap();
        assert_eq!(transition.distance, 600.0);
    }

    #[test]
    fn test_short_jitter_not_confirmed() {
        let motion = strategy(false);
        let mut state = MotionState::default();
        let p1 = position(1, 0);
        let p2 = position(2, 30);

        motion.compute_motion_transition(&mut state, None, &p1, true);
        assert!(motion.compute_motion_transition(&mut state, Some(&p1), &p2, true).is_none());
        assert_eq!(state.time, Some(at(0)));
        assert!(!state.streak);
    }

    #[test]
    fn test_ignition_off_confirms_stop() {
        let motion = strategy(true);
        let mut state = MotionState {
            streak: true,
            state: true,
            ..Default::default()
        };
        let p1 = position(1, 0);
        let p2 = position(2, 10).with_attribute(keys::IGNITION, false);

        motion.compute_motion_transition(&mut state, None, &p1, false);
        let transition = motion
            .compute_motion_transition(&mut state, Some(&p1), &p2, false)
            .unwrap();
        assert!(!transition.moving);
        assert!(!state.streak);
    }

    #[test]
    fn test_ignition_ignored_when_disabled() {
        let motion = strategy(false);
        let mut state = MotionState {
            streak: true,
            state: true,
            ..Default::default()
        };
        let p1 = position(1, 0);
        let p2 = position(2, 10).with_attribute(keys::IGNITION, false);

        motion.compute_motion_transition(&mut state, None, &p1, false);
        assert!(motion.compute_motion_transition(&mut state, Some(&p1), &p2, false).is_none());
    }
}
