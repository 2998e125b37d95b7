//! Damage delivery: strikes arrive as [`DamageDealt`] triggers, pass through
//! the target's invulnerability window, and neutralize it at zero health.

use bevy::prelude::*;
use micromegas_tracing::prelude::{imetric, info};

use crate::app_state::AppState;
use crate::components::{Health, Neutralized};
use crate::events::{DamageDealt, TargetNeutralized};
use crate::resources::SimStats;

pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        app.add_observer(on_damage_dealt);
        app.add_systems(
            FixedUpdate,
            tick_invulnerability.run_if(in_state(AppState::Running)),
        );
    }
}

fn on_damage_dealt(
    event: On<DamageDealt>,
    mut commands: Commands,
    mut targets: Query<&mut Health, Without<Neutralized>>,
    mut stats: ResMut<SimStats>,
) {
    let hit = *event;
    let Ok(mut health) = targets.get_mut(hit.target) else {
        return;
    };
    let taken = health.apply(hit.amount);
    if taken == 0 {
        return;
    }

    stats.damage_dealt += u64::from(taken);
    imetric!("damage_taken", "hp", u64::from(taken));
    info!(
        "target hit for {} ({}/{} left)",
        taken, health.current, health.max
    );

    if health.is_dead() {
        stats.targets_neutralized += 1;
        commands.entity(hit.target).insert(Neutralized);
        commands.trigger(TargetNeutralized { target: hit.target });
    }
}

/// Count down post-hit immunity.
fn tick_invulnerability(time: Res<Time>, mut healths: Query<&mut Health>) {
    let dt = time.delta_secs();
    for mut health in &mut healths {
        if health.is_invulnerable() {
            health.tick(dt);
        }
    }
}
