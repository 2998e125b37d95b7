use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use bevy::state::app::StatesPlugin;
use bevy::tasks::{ComputeTaskPool, TaskPoolBuilder};
use micromegas_telemetry_sink::TelemetryGuardBuilder;
use micromegas_telemetry_sink::tracing_interop::TracingCaptureLayer;
use micromegas_tracing::dispatch::init_thread_stream;
use micromegas_tracing::levels::LevelFilter;
use micromegas_tracing::prelude::{error, info};
use pursuit::PursuitPlugin;
use pursuit::app_state::AppState;
use pursuit::resources::{PursuitSettings, SimStats};
use pursuit::tracing_bridge::MicromegasBridgeLayer;
use tracing_subscriber::Registry;
use tracing_subscriber::layer::SubscriberExt;

/// Simulated seconds before the demo exits.
const RUN_SECONDS: f32 = 30.0;
/// Fixed frame period of the headless loop.
const FRAME: Duration = Duration::from_millis(16);

fn main() {
    // Spans need MICROMEGAS_ENABLE_CPU_TRACING=true; logs and metrics always flow.
    let _telemetry_guard = TelemetryGuardBuilder::default()
        .with_install_tracing_capture(false)
        .build()
        .expect("failed to initialize telemetry");

    // Must be installed before Bevy starts emitting schedule spans.
    let bridge = if std::env::var_os("PURSUIT_TRACE_SYSTEMS").is_some() {
        MicromegasBridgeLayer::new().with_systems()
    } else {
        MicromegasBridgeLayer::new()
    };
    let subscriber = Registry::default().with(bridge).with(TracingCaptureLayer {
        max_level: LevelFilter::Info,
    });
    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");

    // Must happen before App::new() so TaskPoolPlugin keeps this pool.
    ComputeTaskPool::get_or_init(|| {
        TaskPoolBuilder::new()
            .on_thread_spawn(|| {
                init_thread_stream();
            })
            .on_thread_destroy(|| {
                micromegas_tracing::dispatch::flush_thread_buffer();
                micromegas_tracing::dispatch::unregister_thread_stream();
            })
            .build()
    });

    let settings = match std::env::args().nth(1) {
        Some(path) => PursuitSettings::load(&path).expect("failed to load settings"),
        None => PursuitSettings::default(),
    };
    info!(
        "pursuit demo starting: level {}, seed {:?}",
        settings.level_path.display(),
        settings.seed
    );

    let exit = App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(FRAME)))
        .add_plugins(StatesPlugin)
        .insert_resource(settings)
        .add_plugins(PursuitPlugin)
        .add_systems(OnEnter(AppState::NavFailure), exit_on_failure)
        .add_systems(Update, exit_after_run.run_if(in_state(AppState::Running)))
        .add_systems(Last, report_on_exit)
        .run();

    if exit.is_error() {
        std::process::exit(1);
    }
}

fn exit_on_failure(mut exit: MessageWriter<AppExit>) {
    error!("no navigation graph, exiting");
    exit.write(AppExit::error());
}

fn exit_after_run(time: Res<Time>, mut exit: MessageWriter<AppExit>) {
    if time.elapsed_secs() >= RUN_SECONDS {
        exit.write(AppExit::Success);
    }
}

fn report_on_exit(mut exits: MessageReader<AppExit>, stats: Res<SimStats>) {
    if exits.read().next().is_none() {
        return;
    }
    info!(
        "run finished: {} strikes, {} damage, {} state changes, {} repaths, {} targets neutralized, {} graph rebuilds",
        stats.strikes,
        stats.damage_dealt,
        stats.state_changes,
        stats.repaths,
        stats.targets_neutralized,
        stats.graph_rebuilds
    );
}
