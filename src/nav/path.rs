//! Shortest paths over the navigation graph.
//!
//! Edge weights are the Euclidean distance between adjacent node positions.
//! The reference search is Dijkstra with a linear minimum scan; a binary-heap
//! frontier gives the same paths faster on big grids, and A* gives paths of
//! equal length.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use bevy::math::Vec3;
use micromegas_tracing::prelude::*;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::nav::graph::{NavGraph, NodeHandle};

/// Result of one search. Empty means no route, never "already there".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    generation: u32,
    nodes: Vec<NodeHandle>,
    waypoints: Vec<Vec3>,
}

impl Path {
    fn from_nodes(graph: &NavGraph, nodes: Vec<NodeHandle>) -> Self {
        let waypoints = nodes.iter().filter_map(|h| graph.position(*h)).collect();
        Self {
            generation: graph.generation(),
            nodes,
            waypoints,
        }
    }

    pub fn empty(generation: u32) -> Self {
        Self {
            generation,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn nodes(&self) -> &[NodeHandle] {
        &self.nodes
    }

    pub fn waypoints(&self) -> &[Vec3] {
        &self.waypoints
    }

    pub fn waypoint(&self, index: usize) -> Option<Vec3> {
        self.waypoints.get(index).copied()
    }

    /// Sum of edge weights along the path.
    pub fn length(&self) -> f32 {
        self.waypoints
            .windows(2)
            .map(|pair| pair[0].distance(pair[1]))
            .sum()
    }

    /// True once the graph has moved on to another generation.
    pub fn is_stale(&self, graph: &NavGraph) -> bool {
        self.generation != graph.generation()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchStrategy {
    /// O(V^2) Dijkstra with a linear scan for the closest unvisited node.
    #[default]
    LinearScan,
    /// Dijkstra with a binary-heap frontier. Same paths as `LinearScan`.
    BinaryHeap,
    /// A* with a straight-line heuristic. Same path length, maybe another route.
    AStar,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathFinder {
    pub strategy: SearchStrategy,
}

/// Dense per-search bookkeeping over the walkable nodes, in index order.
struct SearchSpace {
    /// Walkable node handles; a node's position in this list is its rank.
    handles: Vec<NodeHandle>,
    positions: Vec<Vec3>,
    /// Cell index to rank.
    rank_of: Vec<Option<usize>>,
}

impl SearchSpace {
    fn new(graph: &NavGraph) -> Self {
        let mut space = Self {
            handles: Vec::with_capacity(graph.valid_count()),
            positions: Vec::with_capacity(graph.valid_count()),
            rank_of: vec![None; graph.cell_count()],
        };
        for (handle, node) in graph.walkable_nodes() {
            space.rank_of[handle.index()] = Some(space.handles.len());
            space.handles.push(handle);
            space.positions.push(node.position);
        }
        space
    }

    fn rank(&self, handle: NodeHandle) -> Option<usize> {
        self.rank_of.get(handle.index()).copied().flatten()
    }

    fn edges<'a>(
        &'a self,
        graph: &'a NavGraph,
        rank: usize,
    ) -> impl Iterator<Item = (usize, f32)> + 'a {
        let from = self.positions[rank];
        graph
            .neighbors(self.handles[rank])
            .iter()
            .filter_map(move |h| self.rank(*h))
            .map(move |r| (r, from.distance(self.positions[r])))
    }

    /// Walk predecessors back from `goal`. Empty when the goal was never
    /// reached.
    fn unwind(&self, prev: &[Option<usize>], start: usize, goal: usize) -> Vec<NodeHandle> {
        let mut ranks = vec![goal];
        let mut current = goal;
        while current != start {
            match prev[current] {
                Some(p) => {
                    ranks.push(p);
                    current = p;
                }
                None => return Vec::new(),
            }
        }
        ranks.reverse();
        ranks.into_iter().map(|r| self.handles[r]).collect()
    }
}

impl PathFinder {
    pub fn new(strategy: SearchStrategy) -> Self {
        Self { strategy }
    }

    /// Shortest path from `start` to `goal`, both inclusive. Absent, stale or
    /// unwalkable endpoints give an empty path without searching.
    pub fn find_path(&self, graph: &NavGraph, start: NodeHandle, goal: NodeHandle) -> Path {
        span_scope!("find_path");
        let walkable = |h| graph.node(h).is_some_and(|n| n.walkable);
        if !walkable(start) || !walkable(goal) {
            return Path::empty(graph.generation());
        }
        if start == goal {
            return Path::from_nodes(graph, vec![start]);
        }

        let space = SearchSpace::new(graph);
        let (Some(s), Some(g)) = (space.rank(start), space.rank(goal)) else {
            return Path::empty(graph.generation());
        };

        let (nodes, explored) = match self.strategy {
            SearchStrategy::LinearScan => linear_scan(graph, &space, s, g),
            SearchStrategy::BinaryHeap => binary_heap(graph, &space, s, g),
            SearchStrategy::AStar => a_star(graph, &space, s, g),
        };
        imetric!("path_search_nodes", "count", explored as u64);
        Path::from_nodes(graph, nodes)
    }

    /// Path between the nodes nearest to two world points.
    pub fn find_path_between(&self, graph: &NavGraph, from: Vec3, to: Vec3) -> Path {
        match (graph.nearest_node(from), graph.nearest_node(to)) {
            (Some(start), Some(goal)) => self.find_path(graph, start, goal),
            _ => Path::empty(graph.generation()),
        }
    }
}

fn linear_scan(
    graph: &NavGraph,
    space: &SearchSpace,
    start: usize,
    goal: usize,
) -> (Vec<NodeHandle>, usize) {
    let count = space.handles.len();
    let mut dist = vec![f32::INFINITY; count];
    let mut prev = vec![None; count];
    let mut visited = vec![false; count];
    let mut explored = 0;
    dist[start] = 0.0;

    loop {
        let mut current = None;
        let mut best = f32::INFINITY;
        for rank in 0..count {
            if !visited[rank] && (current.is_none() || dist[rank] < best) {
                current = Some(rank);
                best = dist[rank];
            }
        }
        // Nothing left, or everything left is unreachable.
        let Some(current) = current else { break };
        if best == f32::INFINITY {
            break;
        }

        visited[current] = true;
        explored += 1;
        if current == goal {
            break;
        }

        for (next, weight) in space.edges(graph, current) {
            if visited[next] {
                continue;
            }
            let candidate = best + weight;
            if candidate < dist[next] {
                dist[next] = candidate;
                prev[next] = Some(current);
            }
        }
    }

    (space.unwind(&prev, start, goal), explored)
}

fn binary_heap(
    graph: &NavGraph,
    space: &SearchSpace,
    start: usize,
    goal: usize,
) -> (Vec<NodeHandle>, usize) {
    let count = space.handles.len();
    let mut dist = vec![f32::INFINITY; count];
    let mut prev = vec![None; count];
    let mut visited = vec![false; count];
    let mut explored = 0;
    let mut frontier = BinaryHeap::new();
    dist[start] = 0.0;
    // Rank breaks distance ties the same way the linear scan does.
    frontier.push(Reverse((OrderedFloat(0.0f32), start)));

    while let Some(Reverse((OrderedFloat(d), current))) = frontier.pop() {
        if visited[current] || d > dist[current] {
            continue;
        }
        visited[current] = true;
        explored += 1;
        if current == goal {
            break;
        }
        for (next, weight) in space.edges(graph, current) {
            if visited[next] {
                continue;
            }
            let candidate = d + weight;
            if candidate < dist[next] {
                dist[next] = candidate;
                prev[next] = Some(current);
                frontier.push(Reverse((OrderedFloat(candidate), next)));
            }
        }
    }

    (space.unwind(&prev, start, goal), explored)
}

fn a_star(
    graph: &NavGraph,
    space: &SearchSpace,
    start: usize,
    goal: usize,
) -> (Vec<NodeHandle>, usize) {
    let target = space.positions[goal];
    let mut explored = 0;
    let found = pathfinding::prelude::astar(
        &start,
        |rank| {
            explored += 1;
            space
                .edges(graph, *rank)
                .map(|(r, w)| (r, OrderedFloat(w)))
                .collect::<Vec<_>>()
        },
        |rank| OrderedFloat(space.positions[*rank].distance(target)),
        |rank| *rank == goal,
    );
    let nodes = found
        .map(|(ranks, _cost)| ranks.into_iter().map(|r| space.handles[r]).collect())
        .unwrap_or_default();
    (nodes, explored)
}
