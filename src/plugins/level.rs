//! Level loading: ASCII blueprints compiled into box collision geometry, the
//! floor scan that turns that geometry into the navigation graph, and the
//! bookkeeping that keeps moving hit volumes in the collision world.

use bevy::prelude::*;
use micromegas_tracing::prelude::*;

use crate::app_state::AppState;
use crate::components::{HitVolume, body_id};
use crate::error::{NavError, NavResult};
use crate::events::{NavGraphRebuilt, RefreshNavGraph};
use crate::nav::geometry::BoxGeometry;
use crate::nav::sampler::{FloorPredicate, FloorSampler, FloorScanConfig};
use crate::plugins::enemies::pursuit_tick;
use crate::resources::{
    LevelGeometry, NavFailureReason, NavGrid, PursuitSettings, SimRng, SimStats,
};

pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(AppState::Loading), load_level);
        app.add_systems(
            FixedUpdate,
            sync_hit_volumes
                .before(pursuit_tick)
                .run_if(in_state(AppState::Running)),
        );
        app.add_systems(
            Update,
            refresh_nav_graph.run_if(in_state(AppState::Running)),
        );
    }
}

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const FLOOR_TAG: &str = "Floor";
pub const WALL_TAG: &str = "Wall";
pub const FLOOR_LAYER: u32 = 0;
pub const WALL_LAYER: u32 = 1;

/// Wall blocks rise this high above the floor.
const WALL_HEIGHT: f32 = 2.0;
/// Floor slabs are this thick, top face at y = 0.
const SLAB_THICKNESS: f32 = 0.2;
/// Top of a raised floor tile.
pub const RAISED_HEIGHT: f32 = 0.5;

// ---------------------------------------------------------------------------
// Tile types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tile {
    Wall,
    Floor,
    /// Hole in the floor.
    Pit,
    Raised,
    TargetSpawn,
    EnemySpawn,
    SafeZone,
}

impl Tile {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '#' => Some(Tile::Wall),
            ' ' | '.' => Some(Tile::Floor),
            '_' => Some(Tile::Pit),
            '=' => Some(Tile::Raised),
            'P' => Some(Tile::TargetSpawn),
            'G' => Some(Tile::EnemySpawn),
            'S' => Some(Tile::SafeZone),
            _ => None,
        }
    }

    pub fn has_floor(&self) -> bool {
        !matches!(self, Tile::Wall | Tile::Pit)
    }

    /// Height of the walkable surface.
    pub fn floor_height(&self) -> f32 {
        if *self == Tile::Raised {
            RAISED_HEIGHT
        } else {
            0.0
        }
    }
}

// ---------------------------------------------------------------------------
// Blueprint
// ---------------------------------------------------------------------------

/// Parsed level layout. Rows run along +Z, columns along +X, and tile
/// `(0, 0)` has its corner at the world origin.
#[derive(Resource, Debug, Clone)]
pub struct LevelBlueprint {
    pub width: u32,
    pub height: u32,
    pub tile_size: f32,
    pub tiles: Vec<Vec<Tile>>,
    pub target_spawn: (u32, u32),
    pub enemy_spawns: Vec<(u32, u32)>,
    pub safe_cells: Vec<(u32, u32)>,
}

impl LevelBlueprint {
    pub fn parse(text: &str, tile_size: f32) -> NavResult<Self> {
        let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        if lines.is_empty() {
            return Err(NavError::Blueprint("empty blueprint".to_string()));
        }
        let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);

        let mut tiles = Vec::with_capacity(lines.len());
        let mut target_spawn = None;
        let mut enemy_spawns = Vec::new();
        let mut safe_cells = Vec::new();

        for (z, line) in lines.iter().enumerate() {
            let mut row = Vec::with_capacity(width);
            for (x, ch) in line.chars().enumerate() {
                let tile = Tile::from_char(ch).ok_or_else(|| {
                    NavError::Blueprint(format!("unknown tile '{}' at ({}, {})", ch, x, z))
                })?;
                let cell = (x as u32, z as u32);
                match tile {
                    Tile::TargetSpawn => {
                        if target_spawn.is_some() {
                            return Err(NavError::Blueprint(format!(
                                "second target spawn at ({}, {})",
                                x, z
                            )));
                        }
                        target_spawn = Some(cell);
                    }
                    Tile::EnemySpawn => enemy_spawns.push(cell),
                    Tile::SafeZone => safe_cells.push(cell),
                    _ => {}
                }
                row.push(tile);
            }
            // Short rows are open pits.
            row.resize(width, Tile::Pit);
            tiles.push(row);
        }

        let target_spawn = target_spawn
            .ok_or_else(|| NavError::Blueprint("no target spawn ('P') found".to_string()))?;

        Ok(Self {
            width: width as u32,
            height: tiles.len() as u32,
            tile_size,
            tiles,
            target_spawn,
            enemy_spawns,
            safe_cells,
        })
    }

    pub fn tile(&self, x: u32, z: u32) -> Option<Tile> {
        self.tiles
            .get(z as usize)
            .and_then(|row| row.get(x as usize))
            .copied()
    }

    /// Point on the walking surface at the middle of a tile.
    pub fn floor_point(&self, x: u32, z: u32) -> Vec3 {
        let height = self.tile(x, z).map(|t| t.floor_height()).unwrap_or(0.0);
        Vec3::new(
            (x as f32 + 0.5) * self.tile_size,
            height,
            (z as f32 + 0.5) * self.tile_size,
        )
    }

    /// Ground-plane rectangle `(min, max)` covered by a tile.
    pub fn tile_rect(&self, x: u32, z: u32) -> (Vec2, Vec2) {
        let min = Vec2::new(x as f32, z as f32) * self.tile_size;
        (min, min + Vec2::splat(self.tile_size))
    }

    /// Compile into tagged collision boxes.
    pub fn build_geometry(&self) -> BoxGeometry {
        span_scope!("build_geometry");
        let mut geometry = BoxGeometry::new();
        let half = self.tile_size / 2.0;
        for z in 0..self.height {
            for x in 0..self.width {
                let Some(tile) = self.tile(x, z) else {
                    continue;
                };
                let center = self.floor_point(x, z);
                match tile {
                    Tile::Pit => {}
                    Tile::Wall => {
                        geometry.add_box(
                            Vec3::new(center.x, WALL_HEIGHT / 2.0, center.z),
                            Vec3::new(half, WALL_HEIGHT / 2.0, half),
                            WALL_TAG,
                            WALL_LAYER,
                        );
                    }
                    _ => {
                        // Slab from below the base floor up to this tile's surface.
                        let top = tile.floor_height();
                        let bottom = -SLAB_THICKNESS;
                        geometry.add_box(
                            Vec3::new(center.x, (top + bottom) / 2.0, center.z),
                            Vec3::new(half, (top - bottom) / 2.0, half),
                            FLOOR_TAG,
                            FLOOR_LAYER,
                        );
                    }
                }
            }
        }
        geometry
    }

    /// Scan grid with one cell per tile.
    pub fn scan_config(&self, predicate: FloorPredicate) -> FloorScanConfig {
        FloorScanConfig {
            origin: [0.0; 3],
            spacing: self.tile_size,
            width: self.width,
            height: self.height,
            predicate,
            ..Default::default()
        }
    }
}

/// Blueprint and sampler of the running level, kept for rebuilds.
#[derive(Resource, Debug, Clone)]
pub struct LoadedLevel {
    pub blueprint: LevelBlueprint,
    pub sampler: FloorSampler,
}

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

fn prepare_level(settings: &PursuitSettings) -> NavResult<(LoadedLevel, BoxGeometry)> {
    settings.validate()?;
    let text = settings.blueprint_text()?;
    let blueprint = LevelBlueprint::parse(&text, settings.tile_size)?;
    let sampler = FloorSampler::new(blueprint.scan_config(settings.floor.clone()))?;
    let geometry = blueprint.build_geometry();
    Ok((LoadedLevel { blueprint, sampler }, geometry))
}

/// Build geometry and the navigation graph, then move on to `Running`, or to
/// `NavFailure` when the level is unusable.
#[span_fn]
pub fn load_level(
    mut commands: Commands,
    settings: Res<PursuitSettings>,
    rng: Option<Res<SimRng>>,
    mut next_state: ResMut<NextState<AppState>>,
) {
    if rng.is_none() {
        commands.insert_resource(SimRng::new(settings.seed));
    }

    let built = prepare_level(&settings).and_then(|(level, geometry)| {
        let graph = level.sampler.build(&geometry.statics(), 0)?;
        Ok((level, geometry, graph))
    });

    match built {
        Ok((level, geometry, graph)) => {
            info!(
                "level loaded: {}x{} tiles, {} walkable cells, {} enemy spawns",
                level.blueprint.width,
                level.blueprint.height,
                graph.valid_count(),
                level.blueprint.enemy_spawns.len()
            );
            commands.insert_resource(NavGrid(graph));
            commands.insert_resource(LevelGeometry(geometry));
            commands.insert_resource(level.blueprint.clone());
            commands.insert_resource(level);
            next_state.set(AppState::Running);
        }
        Err(err) => {
            error!("level load failed: {}", err);
            commands.insert_resource(NavFailureReason(err.to_string()));
            next_state.set(AppState::NavFailure);
        }
    }
}

/// Mirror hit volumes into the collision world.
#[span_fn]
fn sync_hit_volumes(
    mut geometry: ResMut<LevelGeometry>,
    volumes: Query<(Entity, &Transform, &HitVolume)>,
    mut removed: RemovedComponents<HitVolume>,
) {
    for entity in removed.read() {
        geometry.remove_body(body_id(entity));
    }
    for (entity, transform, volume) in &volumes {
        let id = body_id(entity);
        let center = volume.center(transform.translation);
        if !geometry.move_body(id, center) {
            geometry.add_body(id, center, volume.half_size, volume.tag.clone(), volume.layer);
        }
    }
}

/// Stop-the-world rebuild. Agents notice the new generation and re-path.
#[span_fn]
fn refresh_nav_graph(
    mut requests: MessageReader<RefreshNavGraph>,
    level: Res<LoadedLevel>,
    geometry: Res<LevelGeometry>,
    mut grid: ResMut<NavGrid>,
    mut rebuilt: MessageWriter<NavGraphRebuilt>,
    mut stats: ResMut<SimStats>,
) {
    if requests.read().count() == 0 {
        return;
    }
    match grid.refresh(&level.sampler, &geometry.statics()) {
        Ok(valid) => {
            stats.graph_rebuilds += 1;
            info!(
                "navigation graph rebuilt: generation {}, {} cells",
                grid.generation(),
                valid
            );
            rebuilt.write(NavGraphRebuilt {
                generation: grid.generation(),
                valid,
            });
        }
        Err(err) => {
            warn!("navigation graph rebuild failed, keeping the previous graph: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARENA: &str = "\
#######
#P   G#
# ### #
#  =  #
#_S  G#
#######";

    #[test]
    fn parse_finds_spawns_and_zones() {
        let bp = LevelBlueprint::parse(ARENA, 1.0).unwrap();
        assert_eq!((bp.width, bp.height), (7, 6));
        assert_eq!(bp.target_spawn, (1, 1));
        assert_eq!(bp.enemy_spawns, vec![(5, 1), (5, 4)]);
        assert_eq!(bp.safe_cells, vec![(2, 4)]);
        assert_eq!(bp.tile(1, 4), Some(Tile::Pit));
    }

    #[test]
    fn parse_rejects_bad_blueprints() {
        assert!(matches!(
            LevelBlueprint::parse("#P?#", 1.0),
            Err(NavError::Blueprint(_))
        ));
        assert!(LevelBlueprint::parse("# G #", 1.0).is_err());
        assert!(LevelBlueprint::parse("#PP#", 1.0).is_err());
        assert!(LevelBlueprint::parse("", 1.0).is_err());
    }

    #[test]
    fn floor_scan_matches_the_blueprint() {
        let bp = LevelBlueprint::parse(ARENA, 1.0).unwrap();
        let geometry = bp.build_geometry();
        let sampler = FloorSampler::new(bp.scan_config(FloorPredicate::default())).unwrap();
        let graph = sampler.build(&geometry, 0).unwrap();

        for z in 0..bp.height {
            for x in 0..bp.width {
                let has_node = graph.handle_at(x, z).is_some();
                let tile = bp.tile(x, z).unwrap();
                assert_eq!(has_node, tile.has_floor(), "tile {:?} at ({}, {})", tile, x, z);
            }
        }
        let raised = graph.handle_at(3, 3).and_then(|h| graph.position(h)).unwrap();
        assert!((raised.y - RAISED_HEIGHT).abs() < 1e-5);
    }

    #[test]
    fn larger_tiles_scale_positions() {
        let bp = LevelBlueprint::parse("P G", 2.0).unwrap();
        assert_eq!(bp.floor_point(2, 0), Vec3::new(5.0, 0.0, 1.0));
        assert_eq!(bp.tile_rect(1, 0), (Vec2::new(2.0, 0.0), Vec2::new(4.0, 2.0)));
    }
}
