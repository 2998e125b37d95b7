//! Safe zones: while the target stands inside one, enemies lose track of it.

use bevy::prelude::*;
use micromegas_tracing::prelude::*;

use crate::app_state::AppState;
use crate::components::{Quarry, Sheltered};
use crate::plugins::level::LevelBlueprint;

pub struct SafeZonePlugin;

impl Plugin for SafeZonePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SafeZones>();
        app.add_systems(OnEnter(AppState::Running), init_safe_zones);
        app.add_systems(
            FixedUpdate,
            update_shelter.run_if(in_state(AppState::Running)),
        );
    }
}

/// Ground-plane rectangles `(min, max)` on the XZ plane.
#[derive(Resource, Debug, Default, Clone)]
pub struct SafeZones(pub Vec<(Vec2, Vec2)>);

impl SafeZones {
    pub fn contains(&self, point: Vec3) -> bool {
        let p = Vec2::new(point.x, point.z);
        self.0
            .iter()
            .any(|(min, max)| p.cmpge(*min).all() && p.cmple(*max).all())
    }
}

fn init_safe_zones(mut commands: Commands, blueprint: Res<LevelBlueprint>) {
    let zones: Vec<(Vec2, Vec2)> = blueprint
        .safe_cells
        .iter()
        .map(|(x, z)| blueprint.tile_rect(*x, *z))
        .collect();
    info!("{} safe zone tiles", zones.len());
    commands.insert_resource(SafeZones(zones));
}

/// Tag targets standing in a safe zone.
pub fn update_shelter(
    mut commands: Commands,
    zones: Res<SafeZones>,
    targets: Query<(Entity, &Transform, Has<Sheltered>), With<Quarry>>,
) {
    for (entity, transform, sheltered) in &targets {
        let inside = zones.contains(transform.translation);
        if inside && !sheltered {
            commands.entity(entity).insert(Sheltered);
            info!("target entered a safe zone");
        } else if !inside && sheltered {
            commands.entity(entity).remove::<Sheltered>();
            info!("target left the safe zone");
        }
    }
}
