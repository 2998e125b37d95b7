use bevy::prelude::*;

use crate::ai::steering::Steering;
use crate::ai::{AgentState, PursuitAgent};
use crate::nav::geometry::BodyId;

// ---------------------------------------------------------------------------
// Entity markers
// ---------------------------------------------------------------------------

/// Enemy driven by a [`Pursuer`].
#[derive(Component, Debug)]
pub struct Hostile;

/// Something enemies chase.
#[derive(Component, Debug)]
pub struct Quarry;

/// Target is dead; enemies stop tracking it.
#[derive(Component, Debug)]
pub struct Neutralized;

/// Target stands in a safe zone and cannot be tracked.
#[derive(Component, Debug)]
pub struct Sheltered;

/// Where an entity entered the level.
#[derive(Component, Debug, Clone, Copy)]
pub struct SpawnPoint(pub Vec3);

// ---------------------------------------------------------------------------
// Pursuit
// ---------------------------------------------------------------------------

#[derive(Component, Debug, Deref, DerefMut)]
pub struct Pursuer(pub PursuitAgent);

/// Latest steering request, applied by the mover every frame.
#[derive(Component, Debug, Default, Clone, Copy, Deref, DerefMut)]
pub struct DesiredMove(pub Steering);

/// Radians per second the mover may turn this entity.
#[derive(Component, Debug, Clone, Copy)]
pub struct TurnRate(pub f32);

/// Display hints for animation and audio. Observational only.
#[derive(Component, Debug, Default, Clone, Copy, PartialEq)]
pub struct AgentHints {
    pub state: AgentState,
    pub speed: f32,
}

// ---------------------------------------------------------------------------
// Collision
// ---------------------------------------------------------------------------

/// Box hit volume mirrored into the level geometry, resting on the entity's
/// translation (feet).
#[derive(Component, Debug, Clone)]
pub struct HitVolume {
    pub half_size: Vec3,
    pub tag: String,
    pub layer: u32,
}

impl HitVolume {
    pub fn new(half_size: Vec3, tag: impl Into<String>, layer: u32) -> Self {
        Self {
            half_size,
            tag: tag.into(),
            layer,
        }
    }

    pub fn center(&self, feet: Vec3) -> Vec3 {
        feet + Vec3::Y * self.half_size.y
    }
}

/// Collision body id of an entity.
pub fn body_id(entity: Entity) -> BodyId {
    entity.to_bits()
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Health {
    pub current: u32,
    pub max: u32,
    /// Seconds of immunity after each hit.
    pub invulnerability: f32,
    invulnerable_for: f32,
}

impl Health {
    pub fn new(max: u32, invulnerability: f32) -> Self {
        Self {
            current: max,
            max,
            invulnerability,
            invulnerable_for: 0.0,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.current == 0
    }

    pub fn is_invulnerable(&self) -> bool {
        self.invulnerable_for > 0.0
    }

    /// Apply a hit. Returns the damage actually taken; zero while dead or
    /// invulnerable.
    pub fn apply(&mut self, amount: u32) -> u32 {
        if self.is_dead() || self.is_invulnerable() {
            return 0;
        }
        let taken = amount.min(self.current);
        self.current -= taken;
        self.invulnerable_for = self.invulnerability;
        taken
    }

    pub fn tick(&mut self, dt: f32) {
        self.invulnerable_for = (self.invulnerable_for - dt).max(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invulnerability_window_absorbs_hits() {
        let mut health = Health::new(100, 1.0);
        assert_eq!(health.apply(20), 20);
        assert_eq!(health.apply(20), 0);
        health.tick(0.5);
        assert_eq!(health.apply(20), 0);
        health.tick(0.5);
        assert_eq!(health.apply(20), 20);
        assert_eq!(health.current, 60);
    }

    #[test]
    fn damage_stops_at_zero() {
        let mut health = Health::new(30, 0.0);
        assert_eq!(health.apply(20), 20);
        assert_eq!(health.apply(20), 10);
        assert!(health.is_dead());
        assert_eq!(health.apply(20), 0);
    }
}
