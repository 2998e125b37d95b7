//! Spawn Sampler: random walkable positions that keep apart from each other
//! and from a point to avoid (usually the target).

use bevy::math::Vec3;
use micromegas_tracing::prelude::*;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::nav::graph::NavGraph;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnRules {
    /// Minimum distance between two placed points.
    pub min_separation: f32,
    /// Minimum distance from the avoid point.
    pub min_distance_from_avoid: f32,
    pub max_attempts: u32,
    /// After `max_attempts`, accept an unconstrained valid position.
    pub allow_fallback: bool,
}

impl Default for SpawnRules {
    fn default() -> Self {
        Self {
            min_separation: 5.0,
            min_distance_from_avoid: 15.0,
            max_attempts: 100,
            allow_fallback: false,
        }
    }
}

/// Outcome of [`SpawnSampler::scatter`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scatter {
    pub placed: Vec<Vec3>,
    /// Requested points that could not be placed.
    pub shortfall: usize,
}

pub struct SpawnSampler<'g> {
    graph: &'g NavGraph,
    rules: SpawnRules,
    placed: Vec<Vec3>,
}

impl<'g> SpawnSampler<'g> {
    pub fn new(graph: &'g NavGraph, rules: SpawnRules) -> Self {
        Self {
            graph,
            rules,
            placed: Vec::new(),
        }
    }

    /// Points already handed out by this sampler.
    pub fn placed(&self) -> &[Vec3] {
        &self.placed
    }

    /// Count an externally placed point toward the separation rule.
    pub fn reserve(&mut self, point: Vec3) {
        self.placed.push(point);
    }

    fn accepts(&self, candidate: Vec3, avoid: Option<Vec3>) -> bool {
        if !self.graph.is_walkable(candidate) {
            return false;
        }
        if let Some(avoid) = avoid
            && candidate.distance(avoid) < self.rules.min_distance_from_avoid
        {
            return false;
        }
        self.placed
            .iter()
            .all(|p| candidate.distance(*p) >= self.rules.min_separation)
    }

    /// Draw one position meeting the rules. `None` when the graph is empty or
    /// the attempts run out without fallback.
    pub fn sample<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        height_offset: f32,
        avoid: Option<Vec3>,
    ) -> Option<Vec3> {
        for _ in 0..self.rules.max_attempts {
            let floor = self.graph.random_valid_position(rng, 0.0)?;
            if self.accepts(floor, avoid) {
                self.placed.push(floor);
                return Some(floor + Vec3::Y * height_offset);
            }
        }

        if self.rules.allow_fallback {
            let floor = self.graph.random_valid_position(rng, 0.0)?;
            warn!(
                "no spawn point met the rules after {} attempts, falling back",
                self.rules.max_attempts
            );
            self.placed.push(floor);
            return Some(floor + Vec3::Y * height_offset);
        }
        None
    }

    /// Place up to `count` points.
    pub fn scatter<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        count: usize,
        height_offset: f32,
        avoid: Option<Vec3>,
    ) -> Scatter {
        let mut result = Scatter::default();
        for _ in 0..count {
            match self.sample(rng, height_offset, avoid) {
                Some(point) => result.placed.push(point),
                None => result.shortfall += 1,
            }
        }
        if result.shortfall > 0 {
            warn!(
                "placed {} of {} spawn points",
                result.placed.len(),
                count
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn open_field(size: u32) -> NavGraph {
        let cells = (0..size).flat_map(|z| {
            (0..size).map(move |x| Some(Vec3::new(x as f32 + 0.5, 0.0, z as f32 + 0.5)))
        });
        NavGraph::from_cells(Vec3::ZERO, 1.0, size, size, 0, cells)
    }

    #[test]
    fn placed_points_respect_separation_and_avoidance() {
        let graph = open_field(30);
        let rules = SpawnRules {
            min_separation: 4.0,
            min_distance_from_avoid: 8.0,
            ..Default::default()
        };
        let avoid = Vec3::new(15.0, 0.0, 15.0);
        let mut rng = StdRng::seed_from_u64(7);
        let mut sampler = SpawnSampler::new(&graph, rules);
        let scatter = sampler.scatter(&mut rng, 6, 0.0, Some(avoid));

        assert_eq!(scatter.placed.len() + scatter.shortfall, 6);
        for (i, a) in scatter.placed.iter().enumerate() {
            assert!(graph.is_walkable(*a));
            assert!(a.distance(avoid) >= 8.0);
            for b in &scatter.placed[i + 1..] {
                assert!(a.distance(*b) >= 4.0);
            }
        }
    }

    #[test]
    fn impossible_rules_without_fallback_give_none() {
        let graph = open_field(3);
        let mut rng = StdRng::seed_from_u64(1);
        let mut sampler = SpawnSampler::new(&graph, SpawnRules::default());
        assert_eq!(sampler.sample(&mut rng, 0.0, Some(Vec3::ONE)), None);
    }

    #[test]
    fn fallback_accepts_any_valid_cell() {
        let graph = open_field(3);
        let mut rng = StdRng::seed_from_u64(1);
        let rules = SpawnRules {
            allow_fallback: true,
            max_attempts: 5,
            ..Default::default()
        };
        let mut sampler = SpawnSampler::new(&graph, rules);
        let point = sampler.sample(&mut rng, 1.0, Some(Vec3::ONE)).unwrap();
        assert!(graph.is_walkable(point));
        assert_eq!(point.y, 1.0);
    }

    #[test]
    fn empty_graph_never_spawns() {
        let graph = NavGraph::empty();
        let mut rng = StdRng::seed_from_u64(3);
        let rules = SpawnRules {
            allow_fallback: true,
            ..Default::default()
        };
        let scatter = SpawnSampler::new(&graph, rules).scatter(&mut rng, 2, 0.0, None);
        assert!(scatter.placed.is_empty());
        assert_eq!(scatter.shortfall, 2);
    }
}
