use bevy::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, States)]
pub enum AppState {
    /// Level geometry and the navigation graph are being built.
    #[default]
    Loading,
    Running,
    /// The level produced no usable navigation graph. Nothing is spawned.
    NavFailure,
}
