//! Bounded movement and turning. Agents only decide where to go; a mover
//! applies the result with [`apply`] (or its own collision-aware logic).

use bevy::math::{Quat, Vec3};

/// Position and facing of an agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    /// Unit heading. Only the ground-plane part is used for facing.
    pub forward: Vec3,
}

impl Pose {
    pub fn new(position: Vec3, forward: Vec3) -> Self {
        Self { position, forward }
    }
}

/// Desired motion for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Steering {
    /// Point to move toward; `None` holds position.
    pub destination: Option<Vec3>,
    pub max_speed: f32,
    /// Point to turn toward; defaults to the destination.
    pub look_at: Option<Vec3>,
}

impl Steering {
    pub fn hold() -> Self {
        Self::default()
    }

    pub fn toward(destination: Vec3, max_speed: f32) -> Self {
        Self {
            destination: Some(destination),
            max_speed,
            look_at: None,
        }
    }

    /// Stay put but keep facing `point`.
    pub fn face(point: Vec3) -> Self {
        Self {
            destination: None,
            max_speed: 0.0,
            look_at: Some(point),
        }
    }

    pub fn is_moving(&self) -> bool {
        self.destination.is_some() && self.max_speed > 0.0
    }

    fn facing_target(&self) -> Option<Vec3> {
        self.look_at.or(self.destination)
    }
}

/// Move at most `max_step` toward `target`, never overshooting.
pub fn move_towards(from: Vec3, target: Vec3, max_step: f32) -> Vec3 {
    let delta = target - from;
    let distance = delta.length();
    if distance <= max_step || distance <= f32::EPSILON {
        target
    } else {
        from + delta / distance * max_step
    }
}

/// Turn `forward` about the vertical axis toward `desired`, by at most
/// `max_angle` radians. Vertical components are dropped.
pub fn rotate_towards(forward: Vec3, desired: Vec3, max_angle: f32) -> Vec3 {
    let current = Vec3::new(forward.x, 0.0, forward.z);
    let Some(current) = current.try_normalize() else {
        return Vec3::new(desired.x, 0.0, desired.z)
            .try_normalize()
            .unwrap_or(forward);
    };
    let Some(desired) = Vec3::new(desired.x, 0.0, desired.z).try_normalize() else {
        return current;
    };

    // Signed yaw from current to desired; positive turns counter-clockwise
    // seen from above.
    let angle = current.cross(desired).y.atan2(current.dot(desired));
    if angle.abs() <= max_angle {
        desired
    } else {
        Quat::from_rotation_y(max_angle.copysign(angle)) * current
    }
}

/// Advance a pose by one movement tick.
pub fn apply(pose: Pose, steering: &Steering, turn_rate: f32, dt: f32) -> Pose {
    let mut next = pose;
    if let Some(destination) = steering.destination {
        next.position = move_towards(pose.position, destination, steering.max_speed * dt);
    }
    if let Some(point) = steering.facing_target() {
        next.forward = rotate_towards(pose.forward, point - pose.position, turn_rate * dt);
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn moves_are_bounded_and_do_not_overshoot() {
        let next = move_towards(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), 2.0);
        assert_eq!(next, Vec3::new(2.0, 0.0, 0.0));
        let arrived = move_towards(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0), 2.0);
        assert_eq!(arrived, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn turns_are_bounded() {
        let turned = rotate_towards(Vec3::Z, Vec3::X, 0.1);
        let angle = Vec3::Z.angle_between(turned);
        assert!((angle - 0.1).abs() < 1e-4);
        assert!(turned.x > 0.0, "turns the short way");

        let snapped = rotate_towards(Vec3::Z, Vec3::X, FRAC_PI_2 + 0.01);
        assert!((snapped - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn turning_ignores_vertical_component() {
        let turned = rotate_towards(Vec3::Z, Vec3::new(0.0, 5.0, 1.0), 1.0);
        assert!((turned - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn hold_keeps_position_but_can_track() {
        let pose = Pose::new(Vec3::ZERO, Vec3::Z);
        let held = apply(pose, &Steering::hold(), 10.0, 0.1);
        assert_eq!(held, pose);

        let tracking = apply(pose, &Steering::face(Vec3::new(1.0, 0.0, 1.0)), 100.0, 0.1);
        assert_eq!(tracking.position, Vec3::ZERO);
        assert!(tracking.forward.x > 0.5);
    }
}
