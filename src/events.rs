//! Events triggered by the pursuit systems and observed by combat, plus
//! buffered messages for whoever wants to listen.

use bevy::prelude::*;

use crate::ai::AgentState;

/// An agent landed a strike.
#[derive(Event, Debug, Clone, Copy)]
pub struct DamageDealt {
    pub attacker: Entity,
    pub target: Entity,
    pub amount: u32,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct TargetNeutralized {
    pub target: Entity,
}

/// Ask for a stop-the-world rebuild of the navigation graph.
#[derive(Message, Debug, Clone, Copy, Default)]
pub struct RefreshNavGraph;

#[derive(Message, Debug, Clone, Copy)]
pub struct NavGraphRebuilt {
    pub generation: u32,
    pub valid: usize,
}

#[derive(Message, Debug, Clone, Copy)]
pub struct AgentStateChanged {
    pub entity: Entity,
    pub from: AgentState,
    pub to: AgentState,
}
