//! Frame-level telemetry: frame time plus per-state agent gauges.

use bevy::prelude::*;
use micromegas_tracing::prelude::{fmetric, imetric, span_scope};

use crate::components::AgentHints;
use crate::plugins::enemies::count_states;

pub struct TelemetryPlugin;

impl Plugin for TelemetryPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Last, (frame_telemetry, agent_gauges));
    }
}

fn frame_telemetry(time: Res<Time>) {
    span_scope!("frame");
    let dt_ms = time.delta_secs_f64() * 1000.0;
    fmetric!("frame_time_ms", "ms", dt_ms);
}

fn agent_gauges(hints: Query<&AgentHints>) {
    if hints.is_empty() {
        return;
    }
    let (idle, chasing, attacking) = count_states(hints.iter());
    imetric!("agents_idle", "count", idle);
    imetric!("agents_chasing", "count", chasing);
    imetric!("agents_attacking", "count", attacking);
}
