//! Navigation: collision queries, the floor-sampled grid graph, shortest paths
//! and spawn placement. Nothing in here depends on the ECS.

pub mod geometry;
pub mod graph;
pub mod path;
pub mod sampler;
pub mod spawn;

pub use geometry::{BodyId, BoxGeometry, CollisionQuery, RayHit, RayProbe, StaticGeometry};
pub use graph::{NavGraph, Node, NodeHandle};
pub use path::{Path, PathFinder, SearchStrategy};
pub use sampler::{DetectionMethod, FloorPredicate, FloorSampler, FloorScanConfig, ScanReport};
pub use spawn::{Scatter, SpawnRules, SpawnSampler};
