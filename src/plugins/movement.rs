//! Reference movement executor: applies each entity's [`DesiredMove`] every
//! frame with bounded speed and turn rate. No collision response; agents
//! follow graph waypoints, which only cross walkable cells.

use bevy::prelude::*;
use micromegas_tracing::prelude::*;

use crate::ai::steering::{self, Pose};
use crate::app_state::AppState;
use crate::components::{DesiredMove, TurnRate};

pub struct MovementPlugin;

impl Plugin for MovementPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            apply_desired_moves.run_if(in_state(AppState::Running)),
        );
    }
}

#[span_fn]
pub fn apply_desired_moves(
    time: Res<Time>,
    mut movers: Query<(&mut Transform, &DesiredMove, &TurnRate)>,
) {
    let dt = time.delta_secs();
    if dt <= 0.0 {
        return;
    }
    for (mut transform, desired, turn_rate) in &mut movers {
        if desired.destination.is_none() && desired.look_at.is_none() {
            continue;
        }
        let pose = Pose::new(transform.translation, *transform.forward());
        let next = steering::apply(pose, desired, turn_rate.0, dt);
        transform.translation = next.position;
        if next.forward != pose.forward {
            transform.look_to(next.forward, Vec3::Y);
        }
    }
}
