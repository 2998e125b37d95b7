pub mod ai;
pub mod app_state;
pub mod components;
pub mod error;
pub mod events;
pub mod nav;
pub mod plugins;
pub mod resources;
pub mod tracing_bridge;

use bevy::prelude::*;
use micromegas_tracing::prelude::*;

use app_state::AppState;
use events::{AgentStateChanged, NavGraphRebuilt, RefreshNavGraph};
use plugins::combat::CombatPlugin;
use plugins::enemies::EnemyPlugin;
use plugins::level::LevelPlugin;
use plugins::movement::MovementPlugin;
use plugins::safe_zone::SafeZonePlugin;
use plugins::target::TargetPlugin;
use plugins::telemetry::TelemetryPlugin;
use resources::{NavFailureReason, PursuitSettings, SimStats};

/// Everything needed to run pursuit agents against a blueprint level.
/// Expects `StatesPlugin` (part of `DefaultPlugins`) and a time source.
pub struct PursuitPlugin;

impl Plugin for PursuitPlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<AppState>();

        // Settings may be inserted before the plugin; keep them if so.
        app.init_resource::<PursuitSettings>();
        app.init_resource::<SimStats>();

        app.add_message::<RefreshNavGraph>();
        app.add_message::<NavGraphRebuilt>();
        app.add_message::<AgentStateChanged>();

        app.add_plugins(LevelPlugin);
        app.add_plugins(TargetPlugin);
        app.add_plugins(SafeZonePlugin);
        app.add_plugins(EnemyPlugin);
        app.add_plugins(MovementPlugin);
        app.add_plugins(CombatPlugin);
        app.add_plugins(TelemetryPlugin);

        app.add_systems(OnEnter(AppState::NavFailure), report_nav_failure);
    }
}

#[span_fn]
fn report_nav_failure(reason: Option<Res<NavFailureReason>>) {
    let reason = reason.map(|r| r.0.clone()).unwrap_or_default();
    error!("pursuit disabled, no usable navigation graph: {}", reason);
}
