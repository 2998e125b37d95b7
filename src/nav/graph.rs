//! Navigation graph: a dense grid of optional floor nodes with 4-directional
//! adjacency, plus the world-space queries consumers use (nearest node,
//! walkability, random valid position).
//!
//! Nodes live in an arena owned by the graph. Everyone else holds
//! [`NodeHandle`]s, which embed the graph generation; a handle issued before a
//! rebuild or edit no longer resolves.

use bevy::math::Vec3;
use rand::Rng;

/// Non-owning reference to a node of one graph generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle {
    index: u32,
    generation: u32,
}

impl NodeHandle {
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// A sampled point on walkable floor.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Exact probe contact point, not the idealized cell center.
    pub position: Vec3,
    pub walkable: bool,
    neighbors: Vec<NodeHandle>,
}

impl Node {
    pub fn neighbors(&self) -> &[NodeHandle] {
        &self.neighbors
    }
}

/// Cardinal offsets, in the order neighbors are linked: +X, -X, +Z, -Z.
const CARDINALS: [(i64, i64); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

#[derive(Debug, Clone, Default)]
pub struct NavGraph {
    origin: Vec3,
    spacing: f32,
    width: u32,
    height: u32,
    generation: u32,
    /// Row-major by z: `index = z * width + x`.
    cells: Vec<Option<Node>>,
    /// Positions of walkable nodes, in index order. Cached for sampling.
    valid: Vec<Vec3>,
}

impl NavGraph {
    /// A graph with no cells at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Assemble a graph from fully sampled cells. Adjacency is computed here,
    /// after every cell is known.
    ///
    /// `cells` must hold `width * height` entries, row-major by z; missing
    /// trailing entries are treated as absent and extra ones are dropped.
    pub fn from_cells(
        origin: Vec3,
        spacing: f32,
        width: u32,
        height: u32,
        generation: u32,
        cells: impl IntoIterator<Item = Option<Vec3>>,
    ) -> Self {
        let count = width as usize * height as usize;
        let mut positions: Vec<Option<Vec3>> = cells.into_iter().take(count).collect();
        positions.resize(count, None);

        let cells = positions
            .iter()
            .map(|p| {
                p.map(|position| Node {
                    position,
                    walkable: true,
                    neighbors: Vec::with_capacity(4),
                })
            })
            .collect();

        let mut graph = Self {
            origin,
            spacing,
            width,
            height,
            generation,
            cells,
            valid: Vec::new(),
        };
        graph.link_neighbors();
        graph.refresh_valid();
        graph
    }

    fn link_neighbors(&mut self) {
        for z in 0..self.height {
            for x in 0..self.width {
                let index = self.index_of(x, z);
                if !self.is_walkable_index(index) {
                    continue;
                }
                let neighbors: Vec<NodeHandle> = CARDINALS
                    .iter()
                    .filter_map(|(dx, dz)| self.offset_index(x, z, *dx, *dz))
                    .filter(|i| self.is_walkable_index(*i))
                    .map(|i| self.handle_for(i))
                    .collect();
                if let Some(node) = self.cells[index].as_mut() {
                    node.neighbors = neighbors;
                }
            }
        }
    }

    fn refresh_valid(&mut self) {
        self.valid = self
            .cells
            .iter()
            .flatten()
            .filter(|n| n.walkable)
            .map(|n| n.position)
            .collect();
    }

    fn index_of(&self, x: u32, z: u32) -> usize {
        z as usize * self.width as usize + x as usize
    }

    fn offset_index(&self, x: u32, z: u32, dx: i64, dz: i64) -> Option<usize> {
        let nx = i64::from(x) + dx;
        let nz = i64::from(z) + dz;
        if nx < 0 || nz < 0 || nx >= i64::from(self.width) || nz >= i64::from(self.height) {
            return None;
        }
        Some(self.index_of(nx as u32, nz as u32))
    }

    fn handle_for(&self, index: usize) -> NodeHandle {
        NodeHandle {
            index: index as u32,
            generation: self.generation,
        }
    }

    fn is_walkable_index(&self, index: usize) -> bool {
        self.cells
            .get(index)
            .and_then(Option::as_ref)
            .is_some_and(|n| n.walkable)
    }

    // -----------------------------------------------------------------------
    // Layout
    // -----------------------------------------------------------------------

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn spacing(&self) -> f32 {
        self.spacing
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Number of cells in the grid, present or not.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn valid_count(&self) -> usize {
        self.valid.len()
    }

    pub fn valid_positions(&self) -> &[Vec3] {
        &self.valid
    }

    // -----------------------------------------------------------------------
    // Handles
    // -----------------------------------------------------------------------

    /// Resolve a handle. Stale handles and absent cells give `None`.
    pub fn node(&self, handle: NodeHandle) -> Option<&Node> {
        if handle.generation != self.generation {
            return None;
        }
        self.cells.get(handle.index()).and_then(Option::as_ref)
    }

    pub fn is_current(&self, handle: NodeHandle) -> bool {
        self.node(handle).is_some()
    }

    pub fn position(&self, handle: NodeHandle) -> Option<Vec3> {
        self.node(handle).map(|n| n.position)
    }

    /// Neighbors of a node; empty for stale handles.
    pub fn neighbors(&self, handle: NodeHandle) -> &[NodeHandle] {
        self.node(handle).map(Node::neighbors).unwrap_or(&[])
    }

    /// Handle of the present node at cell `(x, z)`.
    pub fn handle_at(&self, x: u32, z: u32) -> Option<NodeHandle> {
        if x >= self.width || z >= self.height {
            return None;
        }
        let index = self.index_of(x, z);
        self.cells[index].as_ref().map(|_| self.handle_for(index))
    }

    /// Grid cell of a handle.
    pub fn cell_of(&self, handle: NodeHandle) -> Option<(u32, u32)> {
        self.node(handle)?;
        let width = self.width as usize;
        Some(((handle.index() % width) as u32, (handle.index() / width) as u32))
    }

    /// Present nodes with their handles, in index order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeHandle, &Node)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|n| (self.handle_for(i), n)))
    }

    /// Walkable nodes only, in index order. This is the path finder's node set.
    pub fn walkable_nodes(&self) -> impl Iterator<Item = (NodeHandle, &Node)> + '_ {
        self.nodes().filter(|(_, n)| n.walkable)
    }

    // -----------------------------------------------------------------------
    // World queries
    // -----------------------------------------------------------------------

    /// Cell index nearest to a world point by grid coordinates. Points outside
    /// the grid clamp to an edge cell, so this is an approximation for them.
    pub fn nearest_cell(&self, world: Vec3) -> Option<(u32, u32)> {
        if self.width == 0 || self.height == 0 || self.spacing <= 0.0 {
            return None;
        }
        let local = (world - self.origin) / self.spacing;
        // Cell centers sit at half-cell offsets.
        let fx = (local.x - 0.5).clamp(0.0, (self.width - 1) as f32);
        let fz = (local.z - 0.5).clamp(0.0, (self.height - 1) as f32);
        let x = (fx.round() as u32).min(self.width - 1);
        let z = (fz.round() as u32).min(self.height - 1);
        Some((x, z))
    }

    /// Node at the cell nearest to a world point. `None` when that cell has no
    /// floor.
    pub fn nearest_node(&self, world: Vec3) -> Option<NodeHandle> {
        let (x, z) = self.nearest_cell(world)?;
        self.handle_at(x, z)
    }

    /// Absent and unwalkable cells both report false.
    pub fn is_walkable(&self, world: Vec3) -> bool {
        self.nearest_node(world)
            .and_then(|h| self.node(h))
            .is_some_and(|n| n.walkable)
    }

    /// Uniform pick over the valid cells, raised by `height_offset`.
    pub fn random_valid_position<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        height_offset: f32,
    ) -> Option<Vec3> {
        if self.valid.is_empty() {
            return None;
        }
        let pick = self.valid[rng.gen_range(0..self.valid.len())];
        Some(pick + Vec3::Y * height_offset)
    }

    // -----------------------------------------------------------------------
    // Edits (between ticks only)
    // -----------------------------------------------------------------------

    /// Mark a node unwalkable and unlink it from its neighbors. Starts a new
    /// generation. Returns false for stale handles.
    pub fn block(&mut self, handle: NodeHandle) -> bool {
        if !self.is_current(handle) {
            return false;
        }
        let index = handle.index();
        let neighbors = match self.cells[index].as_mut() {
            Some(node) => {
                node.walkable = false;
                std::mem::take(&mut node.neighbors)
            }
            None => return false,
        };
        for neighbor in neighbors {
            if let Some(node) = self.cells[neighbor.index()].as_mut() {
                node.neighbors.retain(|h| h.index() != index);
            }
        }
        self.bump_generation();
        self.refresh_valid();
        true
    }

    /// Remove the edge between two nodes in both directions. Starts a new
    /// generation when an edge was removed.
    pub fn unlink(&mut self, a: NodeHandle, b: NodeHandle) -> bool {
        if !self.is_current(a) || !self.is_current(b) {
            return false;
        }
        let mut removed = false;
        for (from, to) in [(a.index(), b.index()), (b.index(), a.index())] {
            if let Some(node) = self.cells[from].as_mut() {
                let before = node.neighbors.len();
                node.neighbors.retain(|h| h.index() != to);
                removed |= node.neighbors.len() != before;
            }
        }
        if removed {
            self.bump_generation();
        }
        removed
    }

    /// Re-stamp every stored handle with the next generation.
    fn bump_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        let generation = self.generation;
        for node in self.cells.iter_mut().flatten() {
            for neighbor in node.neighbors.iter_mut() {
                neighbor.generation = generation;
            }
        }
    }

    /// Replace this graph with a freshly built one of the next generation.
    pub(crate) fn replace_with(&mut self, mut rebuilt: NavGraph) {
        rebuilt.generation = self.generation.wrapping_add(1);
        for node in rebuilt.cells.iter_mut().flatten() {
            for neighbor in node.neighbors.iter_mut() {
                neighbor.generation = rebuilt.generation;
            }
        }
        *self = rebuilt;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// Flat grid centered on the origin, all cells present except `holes`.
    fn flat(width: u32, height: u32, holes: &[(u32, u32)]) -> NavGraph {
        let origin = Vec3::new(-(width as f32) / 2.0, 0.0, -(height as f32) / 2.0);
        let cells = (0..height).flat_map(|z| {
            (0..width).map(move |x| {
                if holes.contains(&(x, z)) {
                    None
                } else {
                    Some(origin + Vec3::new(x as f32 + 0.5, 0.0, z as f32 + 0.5))
                }
            })
        });
        NavGraph::from_cells(origin, 1.0, width, height, 0, cells)
    }

    #[test]
    fn adjacency_is_symmetric() {
        let graph = flat(6, 5, &[(2, 2), (0, 4), (5, 0)]);
        for (a, node) in graph.nodes() {
            for &b in node.neighbors() {
                assert!(
                    graph.neighbors(b).contains(&a),
                    "{:?} lists {:?} but not the reverse",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn neighbors_are_cardinal_and_present() {
        let graph = flat(3, 3, &[(1, 0)]);
        let center = graph.handle_at(1, 1).unwrap();
        let cells: Vec<_> = graph
            .neighbors(center)
            .iter()
            .map(|h| graph.cell_of(*h).unwrap())
            .collect();
        assert_eq!(cells, vec![(2, 1), (0, 1), (1, 2)]);

        let corner = graph.handle_at(0, 0).unwrap();
        assert_eq!(graph.neighbors(corner).len(), 1);
    }

    #[test]
    fn nearest_node_rounds_to_cell_centers() {
        let graph = flat(5, 5, &[]);
        // Cell centers at -2, -1, 0, 1, 2.
        let at = |x: f32, z: f32| {
            graph
                .nearest_node(Vec3::new(x, 0.0, z))
                .and_then(|h| graph.cell_of(h))
        };
        assert_eq!(at(0.0, 0.0), Some((2, 2)));
        assert_eq!(at(0.6, 0.0), Some((3, 2)));
        assert_eq!(at(0.4, -1.2), Some((2, 1)));
        assert_eq!(at(-2.0, 2.0), Some((0, 4)));
    }

    #[test]
    fn far_points_clamp_to_edge_cells() {
        let graph = flat(5, 5, &[]);
        let handle = graph.nearest_node(Vec3::new(1000.0, 3.0, -1000.0)).unwrap();
        assert_eq!(graph.cell_of(handle), Some((4, 0)));
    }

    #[test]
    fn holes_are_not_walkable() {
        let graph = flat(5, 5, &[(2, 2)]);
        assert!(!graph.is_walkable(Vec3::ZERO));
        assert!(graph.nearest_node(Vec3::ZERO).is_none());
        assert!(graph.is_walkable(Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(graph.valid_count(), 24);
    }

    #[test]
    fn empty_graph_answers_none() {
        let graph = NavGraph::empty();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(graph.nearest_node(Vec3::ZERO).is_none());
        assert!(!graph.is_walkable(Vec3::ZERO));
        assert!(graph.random_valid_position(&mut rng, 1.0).is_none());
    }

    #[test]
    fn random_position_is_a_valid_cell_plus_offset() {
        let graph = flat(4, 4, &[(0, 0), (3, 3)]);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let p = graph.random_valid_position(&mut rng, 0.5).unwrap();
            let floor = p - Vec3::Y * 0.5;
            assert!(graph.valid_positions().contains(&floor));
        }
    }

    #[test]
    fn blocking_unlinks_and_invalidates_old_handles() {
        let mut graph = flat(3, 3, &[]);
        let center = graph.handle_at(1, 1).unwrap();
        let left = graph.handle_at(0, 1).unwrap();

        assert!(graph.block(center));
        assert!(graph.node(left).is_none(), "old handle must be stale");

        let left = graph.handle_at(0, 1).unwrap();
        let center = graph.handle_at(1, 1).unwrap();
        assert!(!graph.neighbors(left).iter().any(|h| *h == center));
        assert!(graph.neighbors(center).is_empty());
        assert!(!graph.is_walkable(Vec3::ZERO));
        assert_eq!(graph.valid_count(), 8);
    }

    #[test]
    fn unlink_is_symmetric() {
        let mut graph = flat(2, 1, &[]);
        let a = graph.handle_at(0, 0).unwrap();
        let b = graph.handle_at(1, 0).unwrap();
        assert!(graph.unlink(a, b));
        let a = graph.handle_at(0, 0).unwrap();
        let b = graph.handle_at(1, 0).unwrap();
        assert!(graph.neighbors(a).is_empty());
        assert!(graph.neighbors(b).is_empty());
        assert!(!graph.unlink(a, b));
    }

    #[test]
    fn replace_bumps_generation() {
        let mut graph = flat(2, 2, &[]);
        let before = graph.handle_at(0, 0).unwrap();
        graph.replace_with(flat(2, 2, &[]));
        assert_eq!(graph.generation(), 1);
        assert!(graph.node(before).is_none());
        let after = graph.handle_at(0, 0).unwrap();
        assert!(graph.neighbors(after).iter().all(|h| graph.is_current(*h)));
    }
}
