//! Duration-and-distance motion rule

use chrono::Duration;
use fleet_model::geo::haversine_distance;
use fleet_model::Position;

use super::{MotionState, MotionStrategy, MotionTransition};
use crate::config::MotionConfig;

/// Requires corroborating evidence for every transition
///
/// A start needs both the minimal duration and the minimal distance. A
/// stop needs the minimal parking duration while the device stayed
/// within the minimal distance of where it stopped.
pub struct StreakMotion {
    min_distance: f64,
    min_trip_duration: Duration,
    min_parking_duration: Duration,
}

impl StreakMotion {
    pub fn new(config: &MotionConfig) -> Self {
        Self {
            min_distance: config.min_trip_distance,
            min_trip_duration: config.min_trip_duration(),
            min_parking_duration: config.min_parking_duration(),
        }
    }
}

fn displacement(state: &MotionState, position: &Position) -> f64 {
    match (state.latitude, state.longitude) {
        (Some(lat), Some(lon)) => haversine_distance(lat, lon, position.latitude, position.longitude),
        _ => 0.0,
    }
}

impl MotionStrategy for StreakMotion {
    fn name(&self) -> &'static str {
        "streak"
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
            progress.elapsed >= self.min_trip_duration && progress.distance >= self.min_distance
        } else {
            progress.elapsed >= self.min_parking_duration
                && displacement(state, position) < self.min_distance
        };

        confirmed.then(|| state.confirm(position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::position;
    use fleet_model::keys;

    fn strategy() -> StreakMotion {
        StreakMotion::new(&MotionConfig {
            min_trip_distance: 500.0,
            min_trip_duration: 300,
            min_parking_duration: 300,
            ..Default::default()
        })
    }

    fn odometer(id: i64, seconds: i64, meters: f64) -> Position {
        position(id, seconds).with_attribute(keys::TOTAL_DISTANCE, meters)
    }

    #[test]
    fn test_duration_without_distance_is_not_a_trip() {
        let motion = strategy();
        let mut state = MotionState::default();
        let p1 = odometer(1, 0, 0.0);
        let p2 = odometer(2, 600, 100.0);

        motion.compute_motion_transition(&mut state, None, &p1, true);
        assert!(motion.compute_motion_transition(&mut state, Some(&p1), &p2, true).is_none());
        assert!(!state.streak);
        assert_eq!(state.distance, 100.0);
    }

    #[test]
    fn test_distance_without_duration_is_not_a_trip() {
        let motion = strategy();
        let mut state = MotionState::default();
        let p1 = odometer(1, 0, 0.0);
        let p2 = odometer(2, 60, 900.0);

        motion.compute_motion_transition(&mut state, None, &p1, true);
        assert!(motion.compute_motion_transition(&mut state, Some(&p1), &p2, true).is_none());
    }

    #[test]
    fn test_both_confirm_trip_and_accumulate_across_reports() {
        let motion = strategy();
        let mut state = MotionState::default();
        let p1 = odometer(1, 0, 0.0);
        let p2 = odometer(2, 200, 300.0);
        let p3 = odometer(3, 320, 650.0);

        motion.compute_motion_transition(&mut state, None, &p1, true);
        assert!(motion.compute_motion_transition(&mut state, Some(&p1), &p2, true).is_none());
        let transition = motion
            .compute_motion_transition(&mut state, Some(&p2), &p3, true)
            .unwrap();
        assert!(transition.moving);
        assert_eq!(transition.distance, 650.0);
        assert_eq!(transition.position_id, Some(1));
        assert!(state.streak);
    }

    #[test]
    fn test_stop_requires_staying_put() {
        let motion = strategy();
        let mut state = MotionState {
            streak: true,
            state: true,
            ..Default::default()
        };
        let p1 = position(1, 0);
        let mut drifted = position(2, 400);
        drifted.latitude += 0.01; // ~1.1 km away

        motion.compute_motion_transition(&mut state, None, &p1, false);
        assert!(motion
            .compute_motion_transition(&mut state, Some(&p1), &drifted, false)
            .is_none());

        let p3 = position(3, 500);
        let mut state = MotionState {
            streak: true,
            state: true,
            ..Default::default()
        };
        motion.compute_motion_transition(&mut state, None, &p1, false);
        let transition = motion
            .compute_motion_transition(&mut state, Some(&p1), &p3, false)
            .unwrap();
        assert!(!transition.moving);
        assert!(!state.streak);
    }
}
