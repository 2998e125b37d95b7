//! Per-agent thresholds, speeds and behavior modes. Enemy variants differ
//! only in these values.

use serde::{Deserialize, Serialize};

use crate::error::{NavError, NavResult};
use crate::nav::path::SearchStrategy;

/// How range to the target is measured for the chase and attack radii.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeMetric {
    /// Ground-plane distance; height is gated separately.
    #[default]
    Horizontal,
    Full3d,
}

/// What a chasing agent does while it has no route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoPathFallback {
    #[default]
    Hold,
    /// Head straight for the target and let the mover deal with walls.
    DirectSeek,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdleBehavior {
    #[default]
    Stand,
    /// Walk back to the spawn point while nothing is in range.
    ReturnToSpawn,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    /// Move speed and chase radius for this level of difficulty.
    pub fn speed_and_chase_radius(self) -> (f32, f32) {
        match self {
            Difficulty::Easy => (3.0, 8.0),
            Difficulty::Normal => (4.0, 12.0),
            Difficulty::Hard => (5.0, 15.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PursuitTuning {
    pub chase_radius: f32,
    pub attack_radius: f32,
    /// Half-angle of the attack cone, in degrees.
    pub facing_angle_deg: f32,
    pub vertical_tolerance: f32,
    /// Seconds between path searches while chasing.
    pub repath_interval: f32,
    /// Seconds between damage applications while attacking.
    pub attack_cooldown: f32,
    pub attack_damage: u32,
    /// Units per second.
    pub move_speed: f32,
    /// Radians per second.
    pub turn_rate: f32,
    /// Horizontal distance at which a waypoint counts as reached.
    pub reach_threshold: f32,
    /// Sight probes start this far above the agent's feet.
    pub eye_height: f32,
    /// Sight probes aim this far above the target's feet.
    pub target_eye_height: f32,
    pub range_metric: RangeMetric,
    pub fallback: NoPathFallback,
    pub idle_behavior: IdleBehavior,
    pub search: SearchStrategy,
}

impl Default for PursuitTuning {
    fn default() -> Self {
        Self::for_difficulty(Difficulty::Normal)
    }
}

impl PursuitTuning {
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        let (move_speed, chase_radius) = difficulty.speed_and_chase_radius();
        Self {
            chase_radius,
            attack_radius: 1.5,
            facing_angle_deg: 45.0,
            vertical_tolerance: 1.0,
            repath_interval: 0.5,
            attack_cooldown: 2.0,
            attack_damage: 20,
            move_speed,
            turn_rate: 6.0,
            reach_threshold: 0.2,
            eye_height: 1.0,
            target_eye_height: 1.0,
            range_metric: RangeMetric::Horizontal,
            fallback: NoPathFallback::Hold,
            idle_behavior: IdleBehavior::Stand,
            search: SearchStrategy::LinearScan,
        }
    }

    /// Swap in the speed and chase radius of a difficulty, keeping the rest.
    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        let (move_speed, chase_radius) = difficulty.speed_and_chase_radius();
        self.move_speed = move_speed;
        self.chase_radius = chase_radius;
        self
    }

    pub fn validate(&self) -> NavResult<()> {
        let non_negative = [
            ("chase_radius", self.chase_radius),
            ("attack_radius", self.attack_radius),
            ("vertical_tolerance", self.vertical_tolerance),
            ("repath_interval", self.repath_interval),
            ("attack_cooldown", self.attack_cooldown),
            ("move_speed", self.move_speed),
            ("turn_rate", self.turn_rate),
            ("reach_threshold", self.reach_threshold),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(NavError::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if !(0.0..=180.0).contains(&self.facing_angle_deg) {
            return Err(NavError::InvalidConfig(format!(
                "facing_angle_deg must be within 0..=180, got {}",
                self.facing_angle_deg
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_presets() {
        assert_eq!(PursuitTuning::for_difficulty(Difficulty::Easy).move_speed, 3.0);
        assert_eq!(PursuitTuning::for_difficulty(Difficulty::Hard).chase_radius, 15.0);
        let normal = PursuitTuning::default();
        assert_eq!((normal.move_speed, normal.chase_radius), (4.0, 12.0));
    }

    #[test]
    fn with_difficulty_keeps_other_fields() {
        let tuning = PursuitTuning {
            attack_damage: 35,
            ..Default::default()
        }
        .with_difficulty(Difficulty::Easy);
        assert_eq!(tuning.attack_damage, 35);
        assert_eq!(tuning.chase_radius, 8.0);
    }

    #[test]
    fn rejects_bad_values() {
        let mut tuning = PursuitTuning::default();
        assert!(tuning.validate().is_ok());
        tuning.attack_cooldown = -1.0;
        assert!(tuning.validate().is_err());
        tuning.attack_cooldown = 1.0;
        tuning.facing_angle_deg = 270.0;
        assert!(tuning.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let tuning: PursuitTuning =
            serde_json::from_str(r#"{ "attack_radius": 2.0, "fallback": "DirectSeek" }"#).unwrap();
        assert_eq!(tuning.attack_radius, 2.0);
        assert_eq!(tuning.fallback, NoPathFallback::DirectSeek);
        assert_eq!(tuning.chase_radius, 12.0);
    }
}
