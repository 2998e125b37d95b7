//! Pursuit agent: one configurable Idle / Chase / Attack state machine shared
//! by every enemy variant. Variants differ only in [`PursuitTuning`].
//!
//! The machine is condition driven: each decision tick re-evaluates the state
//! from geometry, then advances along the current path, then applies the
//! attack cooldown, in that order.

pub mod perception;
pub mod steering;
pub mod tuning;

use std::fmt;

use bevy::math::Vec3;
use micromegas_tracing::prelude::*;
use serde::{Deserialize, Serialize};

use crate::nav::geometry::{BodyId, CollisionQuery};
use crate::nav::graph::NavGraph;
use crate::nav::path::{Path, PathFinder};

use perception::{TargetView, facing_within, height_within, horizontal_distance, line_of_sight, range_to};
use steering::{Pose, Steering};
use tuning::{IdleBehavior, NoPathFallback, PursuitTuning};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentState {
    #[default]
    Idle,
    Chase,
    Attack,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentState::Idle => "idle",
            AgentState::Chase => "chase",
            AgentState::Attack => "attack",
        };
        f.write_str(name)
    }
}

/// Read-only world access for one decision tick.
pub struct TickContext<'a, G: CollisionQuery + ?Sized> {
    pub graph: &'a NavGraph,
    pub geometry: &'a G,
}

/// Everything one decision tick produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    pub state: AgentState,
    pub steering: Steering,
    /// Damage to apply to the target this tick.
    pub damage: Option<u32>,
    /// A path search ran this tick.
    pub repathed: bool,
    /// `(from, to)` when the state changed this tick.
    pub changed: Option<(AgentState, AgentState)>,
    /// Requested speed, for animation hints.
    pub speed: f32,
}

#[derive(Debug, Clone)]
pub struct PursuitAgent {
    pub tuning: PursuitTuning,
    state: AgentState,
    path: Path,
    cursor: usize,
    since_repath: f32,
    cooldown_left: f32,
    /// Search on the next movement step without waiting for the timer.
    needs_repath: bool,
    spawn_point: Vec3,
    body: Option<BodyId>,
}

impl PursuitAgent {
    pub fn new(tuning: PursuitTuning, spawn_point: Vec3) -> Self {
        Self {
            tuning,
            state: AgentState::Idle,
            path: Path::default(),
            cursor: 0,
            since_repath: 0.0,
            cooldown_left: 0.0,
            needs_repath: true,
            spawn_point,
            body: None,
        }
    }

    /// Collision body of the agent itself, ignored by its own sight probes.
    pub fn with_body(mut self, body: BodyId) -> Self {
        self.body = Some(body);
        self
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn spawn_point(&self) -> Vec3 {
        self.spawn_point
    }

    pub fn body(&self) -> Option<BodyId> {
        self.body
    }

    /// Seconds until the next strike is allowed.
    pub fn cooldown_remaining(&self) -> f32 {
        self.cooldown_left
    }

    /// Drop the current path. The next search still waits for the repath
    /// timer.
    fn clear_path(&mut self) {
        self.path = Path::default();
        self.cursor = 0;
    }

    fn finder(&self) -> PathFinder {
        PathFinder::new(self.tuning.search)
    }

    /// The state the agent should be in, from geometry alone.
    pub fn evaluate<G: CollisionQuery + ?Sized>(
        &self,
        pose: &Pose,
        target: Option<&TargetView>,
        geometry: &G,
    ) -> AgentState {
        let Some(target) = target.filter(|t| !t.neutralized) else {
            return AgentState::Idle;
        };
        let tuning = &self.tuning;
        let range = range_to(tuning.range_metric, pose.position, target.position);

        if range <= tuning.attack_radius && self.can_strike(pose, target, geometry) {
            AgentState::Attack
        } else if range <= tuning.chase_radius {
            AgentState::Chase
        } else {
            AgentState::Idle
        }
    }

    /// Facing, height and sight gates for an attack.
    fn can_strike<G: CollisionQuery + ?Sized>(
        &self,
        pose: &Pose,
        target: &TargetView,
        geometry: &G,
    ) -> bool {
        let tuning = &self.tuning;
        facing_within(pose.forward, pose.position, target.position, tuning.facing_angle_deg)
            && height_within(pose.position, target.position, tuning.vertical_tolerance)
            && line_of_sight(
                geometry,
                pose.position + Vec3::Y * tuning.eye_height,
                target.position + Vec3::Y * tuning.target_eye_height,
                target.body,
                self.body,
            )
    }

    /// One decision tick.
    pub fn tick<G: CollisionQuery + ?Sized>(
        &mut self,
        dt: f32,
        pose: &Pose,
        target: Option<&TargetView>,
        ctx: &TickContext<'_, G>,
    ) -> TickOutput {
        self.since_repath += dt;
        self.cooldown_left = (self.cooldown_left - dt).max(0.0);

        let previous = self.state;
        let state = self.evaluate(pose, target, ctx.geometry);
        let changed = (state != previous).then_some((previous, state));
        if changed.is_some() {
            debug!("agent state {} -> {}", previous, state);
            self.state = state;
            self.clear_path();
        }

        let mut out = TickOutput {
            state,
            steering: Steering::hold(),
            damage: None,
            repathed: false,
            changed,
            speed: 0.0,
        };

        let live_target = target.filter(|t| !t.neutralized);
        match (state, live_target) {
            (AgentState::Chase, Some(target)) => {
                let (steering, repathed) = self.follow(pose, target.position, true, ctx.graph);
                out.steering = steering;
                out.repathed = repathed;
            }
            (AgentState::Attack, Some(target)) => {
                out.steering = Steering::face(target.position);
                if self.cooldown_left <= 0.0 {
                    out.damage = Some(self.tuning.attack_damage);
                    self.cooldown_left = self.tuning.attack_cooldown;
                }
            }
            _ => {
                if self.tuning.idle_behavior == IdleBehavior::ReturnToSpawn {
                    let (steering, repathed) = self.return_to_spawn(pose, ctx.graph);
                    out.steering = steering;
                    out.repathed = repathed;
                }
            }
        }

        if out.steering.is_moving() {
            out.speed = out.steering.max_speed;
        }
        out
    }

    fn return_to_spawn(&mut self, pose: &Pose, graph: &NavGraph) -> (Steering, bool) {
        if horizontal_distance(pose.position, self.spawn_point) <= self.tuning.reach_threshold {
            if !self.path.is_empty() {
                self.clear_path();
            }
            return (Steering::hold(), false);
        }
        self.follow(pose, self.spawn_point, false, graph)
    }

    /// Walk the path toward `goal`. Searches run on the repath timer, plus at
    /// once for the agent's first search and for stale paths.
    fn follow(
        &mut self,
        pose: &Pose,
        goal: Vec3,
        allow_fallback: bool,
        graph: &NavGraph,
    ) -> (Steering, bool) {
        let speed = self.tuning.move_speed;
        let reach = self.tuning.reach_threshold;
        let interval = self.tuning.repath_interval;

        // Paths from an older graph generation are searched again at once.
        if !self.path.is_empty() && self.path.is_stale(graph) {
            self.clear_path();
            self.needs_repath = true;
        }

        let mut repathed = false;
        if self.needs_repath || self.since_repath >= interval {
            self.path = self.finder().find_path_between(graph, pose.position, goal);
            self.cursor = self.first_waypoint(pose.position);
            self.since_repath = 0.0;
            self.needs_repath = false;
            repathed = true;
        }

        if self.path.is_empty() {
            let steering = match (allow_fallback, self.tuning.fallback) {
                (true, NoPathFallback::DirectSeek) => Steering::toward(goal, speed),
                _ => Steering::hold(),
            };
            return (steering, repathed);
        }

        while let Some(waypoint) = self.path.waypoint(self.cursor) {
            if horizontal_distance(pose.position, waypoint) > reach {
                return (Steering::toward(waypoint, speed), repathed);
            }
            self.cursor += 1;
        }

        // Past the last node: close the remaining gap directly.
        if horizontal_distance(pose.position, goal) > reach {
            (Steering::toward(goal, speed), repathed)
        } else {
            (Steering::face(goal), repathed)
        }
    }

    /// Cursor for a fresh path. The first node is the one nearest the agent;
    /// skip it when the agent already sits between it and the second node.
    fn first_waypoint(&self, position: Vec3) -> usize {
        match (self.path.waypoint(0), self.path.waypoint(1)) {
            (Some(first), Some(second))
                if horizontal_distance(position, second) < horizontal_distance(first, second) =>
            {
                1
            }
            _ => 0,
        }
    }
}
