//! Enemy spawning and the decision-rate pursuit tick.

use bevy::prelude::*;
use micromegas_tracing::prelude::*;

use crate::ai::perception::{TargetView, horizontal_distance};
use crate::ai::steering::Pose;
use crate::ai::{AgentState, PursuitAgent, TickContext};
use crate::app_state::AppState;
use crate::components::*;
use crate::events::{AgentStateChanged, DamageDealt};
use crate::nav::spawn::SpawnSampler;
use crate::plugins::level::LevelBlueprint;
use crate::plugins::safe_zone::update_shelter;
use crate::plugins::target::spawn_target;
use crate::resources::{LevelGeometry, NavGrid, PursuitSettings, SimRng, SimStats};

pub struct EnemyPlugin;

impl Plugin for EnemyPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(AppState::Running), spawn_enemies.after(spawn_target));
        app.add_systems(
            FixedUpdate,
            pursuit_tick
                .after(update_shelter)
                .run_if(in_state(AppState::Running)),
        );
    }
}

pub const ENEMY_TAG: &str = "Enemy";
pub const ENEMY_LAYER: u32 = 2;
const ENEMY_HALF_SIZE: Vec3 = Vec3::new(0.3, 0.9, 0.3);

/// Bundle for one enemy at `position`.
pub fn enemy_bundle(agent: PursuitAgent, position: Vec3) -> impl Bundle {
    let turn_rate = agent.tuning.turn_rate;
    (
        Hostile,
        Pursuer(agent),
        SpawnPoint(position),
        DesiredMove::default(),
        AgentHints::default(),
        TurnRate(turn_rate),
        HitVolume::new(ENEMY_HALF_SIZE, ENEMY_TAG, ENEMY_LAYER),
        Transform::from_translation(position),
    )
}

/// Spawn an enemy on every `G` tile, then scatter the extra ones away from
/// the target.
pub fn spawn_enemies(
    mut commands: Commands,
    settings: Res<PursuitSettings>,
    blueprint: Res<LevelBlueprint>,
    grid: Res<NavGrid>,
    mut rng: ResMut<SimRng>,
    targets: Query<&Transform, With<Quarry>>,
) {
    span_scope!("spawn_enemies");
    let tuning = settings.effective_tuning();
    let mut positions: Vec<Vec3> = blueprint
        .enemy_spawns
        .iter()
        .map(|(x, z)| blueprint.floor_point(*x, *z))
        .collect();

    if settings.extra_agents > 0 {
        let mut sampler = SpawnSampler::new(&grid.0, settings.spawn.clone());
        for p in &positions {
            sampler.reserve(*p);
        }
        let avoid = targets.iter().next().map(|t| t.translation);
        let scatter = sampler.scatter(&mut rng.0, settings.extra_agents, 0.0, avoid);
        if scatter.shortfall > 0 {
            warn!(
                "{} of {} extra enemies could not be placed",
                scatter.shortfall, settings.extra_agents
            );
        }
        positions.extend(scatter.placed);
    }

    for position in &positions {
        let mut entity = commands.spawn_empty();
        let agent = PursuitAgent::new(tuning.clone(), *position).with_body(body_id(entity.id()));
        entity.insert(enemy_bundle(agent, *position));
    }
    info!("spawned {} enemies", positions.len());
}

/// Nearest trackable target, by ground-plane distance.
fn pick_target(
    from: Vec3,
    targets: &[(Entity, TargetView)],
) -> Option<&(Entity, TargetView)> {
    targets.iter().min_by(|a, b| {
        horizontal_distance(from, a.1.position).total_cmp(&horizontal_distance(from, b.1.position))
    })
}

/// Decision tick: evaluate, advance along the path, strike.
#[allow(clippy::type_complexity)]
#[span_fn]
pub fn pursuit_tick(
    time: Res<Time>,
    grid: Res<NavGrid>,
    geometry: Res<LevelGeometry>,
    targets: Query<(Entity, &Transform, Has<Neutralized>, Has<Sheltered>), With<Quarry>>,
    mut agents: Query<
        (Entity, &Transform, &mut Pursuer, &mut DesiredMove, &mut AgentHints),
        (With<Hostile>, Without<Quarry>),
    >,
    mut changes: MessageWriter<AgentStateChanged>,
    mut stats: ResMut<SimStats>,
    mut commands: Commands,
) {
    let dt = time.delta_secs();
    let ctx = TickContext {
        graph: &grid.0,
        geometry: &geometry.0,
    };
    let views: Vec<(Entity, TargetView)> = targets
        .iter()
        .map(|(entity, transform, neutralized, sheltered)| {
            (
                entity,
                TargetView {
                    position: transform.translation,
                    body: Some(body_id(entity)),
                    neutralized: neutralized || sheltered,
                },
            )
        })
        .collect();
    // Prefer targets that can still be tracked.
    let live: Vec<(Entity, TargetView)> = views
        .iter()
        .copied()
        .filter(|(_, view)| !view.neutralized)
        .collect();

    for (entity, transform, mut pursuer, mut desired, mut hints) in &mut agents {
        let pose = Pose::new(transform.translation, *transform.forward());
        let tracked = pick_target(pose.position, &live).or_else(|| pick_target(pose.position, &views));
        let out = pursuer.tick(dt, &pose, tracked.map(|(_, view)| view), &ctx);

        **desired = out.steering;
        *hints = AgentHints {
            state: out.state,
            speed: out.speed,
        };
        if out.repathed {
            stats.repaths += 1;
        }
        if let Some((from, to)) = out.changed {
            stats.state_changes += 1;
            changes.write(AgentStateChanged { entity, from, to });
        }
        if let (Some(amount), Some((target, _))) = (out.damage, tracked) {
            stats.strikes += 1;
            commands.trigger(DamageDealt {
                attacker: entity,
                target: *target,
                amount,
            });
        }
    }
}

/// Number of agents in each state, for gauges.
pub fn count_states<'a>(hints: impl Iterator<Item = &'a AgentHints>) -> (u64, u64, u64) {
    hints.fold((0, 0, 0), |(idle, chase, attack), h| match h.state {
        AgentState::Idle => (idle + 1, chase, attack),
        AgentState::Chase => (idle, chase + 1, attack),
        AgentState::Attack => (idle, chase, attack + 1),
    })
}
