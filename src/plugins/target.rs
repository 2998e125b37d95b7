//! The chased target: spawn at the blueprint's `P` tile, and an optional
//! wander behavior that walks it between random valid cells.

use std::collections::VecDeque;

use bevy::prelude::*;
use micromegas_tracing::prelude::*;

use crate::ai::perception::horizontal_distance;
use crate::ai::steering::Steering;
use crate::app_state::AppState;
use crate::components::*;
use crate::events::TargetNeutralized;
use crate::nav::path::{PathFinder, SearchStrategy};
use crate::plugins::level::LevelBlueprint;
use crate::plugins::movement::apply_desired_moves;
use crate::resources::{NavGrid, PursuitSettings, SimRng};

pub struct TargetPlugin;

impl Plugin for TargetPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(AppState::Running), spawn_target);
        app.add_systems(
            Update,
            wander
                .before(apply_desired_moves)
                .run_if(in_state(AppState::Running)),
        );
        app.add_observer(on_target_neutralized);
    }
}

pub const TARGET_TAG: &str = "Target";
pub const TARGET_LAYER: u32 = 3;
const TARGET_HALF_SIZE: Vec3 = Vec3::new(0.3, 0.9, 0.3);
const TARGET_TURN_RATE: f32 = 10.0;
/// Horizontal distance at which a wander waypoint counts as reached.
const WANDER_REACH: f32 = 0.05;

/// Route the target is walking, as floor points.
#[derive(Component, Debug, Default)]
pub struct Wander {
    route: VecDeque<Vec3>,
    generation: u32,
}

pub fn spawn_target(
    mut commands: Commands,
    settings: Res<PursuitSettings>,
    blueprint: Res<LevelBlueprint>,
) {
    let (x, z) = blueprint.target_spawn;
    let position = blueprint.floor_point(x, z);
    let mut target = commands.spawn((
        Quarry,
        SpawnPoint(position),
        Health::new(settings.target_health, settings.target_invulnerability),
        HitVolume::new(TARGET_HALF_SIZE, TARGET_TAG, TARGET_LAYER),
        DesiredMove::default(),
        TurnRate(TARGET_TURN_RATE),
        Transform::from_translation(position),
    ));
    if settings.target_wander {
        target.insert(Wander::default());
    }
    info!("target spawned at ({}, {})", x, z);
}

/// Follow the current route; pick a new random destination when it runs out
/// or the graph is rebuilt.
#[allow(clippy::type_complexity)]
#[span_fn]
fn wander(
    grid: Res<NavGrid>,
    settings: Res<PursuitSettings>,
    mut rng: ResMut<SimRng>,
    mut targets: Query<(&Transform, &mut Wander, &mut DesiredMove), (With<Quarry>, Without<Neutralized>)>,
) {
    let finder = PathFinder::new(SearchStrategy::BinaryHeap);
    for (transform, mut wander, mut desired) in &mut targets {
        let here = transform.translation;
        while wander
            .route
            .front()
            .is_some_and(|p| horizontal_distance(here, *p) <= WANDER_REACH)
        {
            wander.route.pop_front();
        }

        if wander.route.is_empty() || wander.generation != grid.generation() {
            wander.generation = grid.generation();
            wander.route = grid
                .random_valid_position(&mut rng.0, 0.0)
                .map(|goal| finder.find_path_between(&grid.0, here, goal))
                .map(|path| path.waypoints().iter().copied().collect())
                .unwrap_or_default();
        }

        **desired = match wander.route.front() {
            Some(next) => Steering::toward(*next, settings.target_speed),
            None => Steering::hold(),
        };
    }
}

/// A dead target stops where it fell.
fn on_target_neutralized(
    event: On<TargetNeutralized>,
    mut commands: Commands,
    mut targets: Query<&mut DesiredMove, With<Quarry>>,
) {
    let neutralized = *event;
    if let Ok(mut desired) = targets.get_mut(neutralized.target) {
        **desired = Steering::hold();
    }
    commands.entity(neutralized.target).remove::<Wander>();
    info!("target neutralized");
}
