use std::path::{Path, PathBuf};

use bevy::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::ai::tuning::{Difficulty, PursuitTuning};
use crate::error::{NavError, NavResult};
use crate::nav::geometry::BoxGeometry;
use crate::nav::graph::NavGraph;
use crate::nav::sampler::FloorPredicate;
use crate::nav::spawn::SpawnRules;

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The navigation graph all agents read. Replaced wholesale on refresh.
#[derive(Resource, Debug, Default, Deref, DerefMut)]
pub struct NavGrid(pub NavGraph);

/// Level collision world: static level boxes plus moving hit volumes.
#[derive(Resource, Debug, Default, Deref, DerefMut)]
pub struct LevelGeometry(pub BoxGeometry);

/// Why loading stopped in `AppState::NavFailure`.
#[derive(Resource, Debug, Clone)]
pub struct NavFailureReason(pub String);

#[derive(Resource, Deref, DerefMut)]
pub struct SimRng(pub StdRng);

impl SimRng {
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self(StdRng::seed_from_u64(seed)),
            None => Self(StdRng::from_entropy()),
        }
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Settings document for a pursuit session, usually loaded from JSON.
/// Every field is optional in the document.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PursuitSettings {
    /// When set, overrides the tuning's move speed and chase radius.
    pub difficulty: Option<Difficulty>,
    pub tuning: PursuitTuning,
    pub spawn: SpawnRules,
    /// Level blueprint file.
    pub level_path: PathBuf,
    /// Inline blueprint; takes precedence over `level_path`.
    pub blueprint: Option<String>,
    /// Edge length of one blueprint tile in world units.
    pub tile_size: f32,
    pub floor: FloorPredicate,
    /// Agents placed at random on top of the blueprint's `G` tiles.
    pub extra_agents: usize,
    pub seed: Option<u64>,
    pub target_health: u32,
    /// Seconds of immunity after the target takes a hit.
    pub target_invulnerability: f32,
    pub target_speed: f32,
    /// Let the target roam between random cells.
    pub target_wander: bool,
}

impl Default for PursuitSettings {
    fn default() -> Self {
        Self {
            difficulty: None,
            tuning: PursuitTuning::default(),
            spawn: SpawnRules::default(),
            level_path: PathBuf::from("assets/levels/arena.txt"),
            blueprint: None,
            tile_size: 1.0,
            floor: FloorPredicate::default(),
            extra_agents: 0,
            seed: None,
            target_health: 100,
            target_invulnerability: 1.0,
            target_speed: 3.5,
            target_wander: false,
        }
    }
}

impl PursuitSettings {
    pub fn from_json_str(text: &str) -> NavResult<Self> {
        let settings: Self = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> NavResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| NavError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> NavResult<()> {
        self.tuning.validate()?;
        if !(self.tile_size.is_finite() && self.tile_size > 0.0) {
            return Err(NavError::InvalidConfig(format!(
                "tile_size must be positive, got {}",
                self.tile_size
            )));
        }
        Ok(())
    }

    /// Tuning with the difficulty preset applied.
    pub fn effective_tuning(&self) -> PursuitTuning {
        match self.difficulty {
            Some(difficulty) => self.tuning.clone().with_difficulty(difficulty),
            None => self.tuning.clone(),
        }
    }

    /// Blueprint text, inline or read from `level_path`.
    pub fn blueprint_text(&self) -> NavResult<String> {
        match &self.blueprint {
            Some(text) => Ok(text.clone()),
            None => std::fs::read_to_string(&self.level_path).map_err(|source| NavError::Io {
                path: self.level_path.clone(),
                source,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

#[derive(Resource, Debug, Default, Clone)]
pub struct SimStats {
    pub strikes: u32,
    pub damage_dealt: u64,
    pub state_changes: u32,
    pub repaths: u64,
    pub targets_neutralized: u32,
    pub graph_rebuilds: u32,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
