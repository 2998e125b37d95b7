//! Geometric predicates an agent evaluates against its target.

use bevy::math::{Vec3, Vec3Swizzles};

use crate::ai::tuning::RangeMetric;
use crate::nav::geometry::{BodyId, CollisionQuery, RayProbe};

/// What an agent may know about its target this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetView {
    /// Feet position.
    pub position: Vec3,
    /// Collision body of the target, if it has one. Sight probes that hit it
    /// (or a part attached to it) count as clear.
    pub body: Option<BodyId>,
    /// Dead, sheltered or otherwise off limits.
    pub neutralized: bool,
}

impl TargetView {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            body: None,
            neutralized: false,
        }
    }
}

pub fn horizontal_distance(a: Vec3, b: Vec3) -> f32 {
    a.xz().distance(b.xz())
}

pub fn range_to(metric: RangeMetric, from: Vec3, to: Vec3) -> f32 {
    match metric {
        RangeMetric::Horizontal => horizontal_distance(from, to),
        RangeMetric::Full3d => from.distance(to),
    }
}

/// Angle test on the ground plane. A target straight above or below passes;
/// an agent with no horizontal heading fails.
pub fn facing_within(forward: Vec3, from: Vec3, to: Vec3, max_angle_deg: f32) -> bool {
    let toward = (to - from).xz();
    let Some(heading) = forward.xz().try_normalize() else {
        return false;
    };
    let Some(toward) = toward.try_normalize() else {
        return true;
    };
    heading.angle_to(toward).abs().to_degrees() <= max_angle_deg
}

pub fn height_within(from: Vec3, to: Vec3, tolerance: f32) -> bool {
    (from.y - to.y).abs() <= tolerance
}

/// Probe from `from_eye` to `to_eye`. Clear when nothing is in the way or the
/// first thing hit is the target itself. Hits on `exclude` (the looker) are
/// ignored.
pub fn line_of_sight<G: CollisionQuery + ?Sized>(
    geometry: &G,
    from_eye: Vec3,
    to_eye: Vec3,
    target_body: Option<BodyId>,
    exclude: Option<BodyId>,
) -> bool {
    let Some(probe) = RayProbe::between(from_eye, to_eye) else {
        return true;
    };
    match geometry.cast_ray(&probe.excluding(exclude)) {
        None => true,
        Some(hit) => target_body.is_some_and(|body| hit.belongs_to(body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nav::geometry::BoxGeometry;

    #[test]
    fn horizontal_range_ignores_height() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 10.0, 4.0);
        assert_eq!(range_to(RangeMetric::Horizontal, a, b), 5.0);
        assert!(range_to(RangeMetric::Full3d, a, b) > 11.0);
    }

    #[test]
    fn facing_cone() {
        let from = Vec3::ZERO;
        let forward = Vec3::Z;
        assert!(facing_within(forward, from, Vec3::new(0.0, 0.0, 2.0), 45.0));
        assert!(facing_within(forward, from, Vec3::new(1.0, 5.0, 1.1), 45.0));
        assert!(!facing_within(forward, from, Vec3::new(2.0, 0.0, 1.0), 45.0));
        assert!(!facing_within(forward, from, Vec3::new(0.0, 0.0, -2.0), 45.0));
        assert!(facing_within(forward, from, Vec3::new(0.0, 3.0, 0.0), 45.0));
        assert!(!facing_within(Vec3::Y, from, Vec3::Z, 45.0));
    }

    #[test]
    fn height_gate() {
        assert!(height_within(Vec3::ZERO, Vec3::new(5.0, 1.0, 0.0), 1.0));
        assert!(!height_within(Vec3::ZERO, Vec3::new(0.0, -1.5, 0.0), 1.0));
    }

    #[test]
    fn walls_block_sight_but_the_target_does_not() {
        let mut geo = BoxGeometry::new();
        geo.add_body(7, Vec3::new(0.0, 1.0, 3.0), Vec3::splat(0.4), "Target", 2);
        let eye = Vec3::new(0.0, 1.0, 0.0);
        let target_eye = Vec3::new(0.0, 1.0, 3.0);
        assert!(line_of_sight(&geo, eye, target_eye, Some(7), None));
        assert!(!line_of_sight(&geo, eye, target_eye, None, None));

        geo.add_box(Vec3::new(0.0, 1.0, 1.5), Vec3::new(1.0, 1.0, 0.2), "Wall", 1);
        assert!(!line_of_sight(&geo, eye, target_eye, Some(7), None));
    }

    #[test]
    fn looker_does_not_block_itself() {
        let mut geo = BoxGeometry::new();
        geo.add_body(1, Vec3::new(0.0, 1.0, 0.0), Vec3::splat(0.4), "Enemy", 2);
        let eye = Vec3::new(0.0, 1.0, 0.0);
        let target_eye = Vec3::new(0.0, 1.0, 3.0);
        assert!(!line_of_sight(&geo, eye, target_eye, None, None));
        assert!(line_of_sight(&geo, eye, target_eye, None, Some(1)));
    }
}
