//! Floor Sampler: turns collision geometry into a [`NavGraph`] by casting one
//! downward probe per grid cell and keeping the hits that identify as floor.

use bevy::math::Vec3;
use micromegas_tracing::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{NavError, NavResult};
use crate::nav::geometry::{CollisionQuery, RayHit, RayProbe};
use crate::nav::graph::NavGraph;

/// Below this many valid cells the graph is usable but probably misconfigured.
pub const SPARSE_GRAPH_WARNING: usize = 10;

/// Auto-fitted grids never go below this many cells per side.
pub const MIN_FITTED_CELLS: u32 = 10;

/// How a probe hit is identified as floor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionMethod {
    #[default]
    Tag,
    Layer,
    TagOrLayer,
    TagAndLayer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorPredicate {
    pub method: DetectionMethod,
    pub tag: String,
    /// Bitmask over collision layers; layer `n` matches bit `1 << n`.
    pub layer_mask: u32,
}

impl Default for FloorPredicate {
    fn default() -> Self {
        Self {
            method: DetectionMethod::Tag,
            tag: "Floor".to_string(),
            layer_mask: 1,
        }
    }
}

impl FloorPredicate {
    pub fn matches(&self, hit: &RayHit) -> bool {
        let tag = hit.tag == self.tag;
        let layer = hit.layer < 32 && self.layer_mask & (1 << hit.layer) != 0;
        match self.method {
            DetectionMethod::Tag => tag,
            DetectionMethod::Layer => layer,
            DetectionMethod::TagOrLayer => tag || layer,
            DetectionMethod::TagAndLayer => tag && layer,
        }
    }
}

/// Grid placement and probe parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloorScanConfig {
    /// Corner of cell (0, 0), in world space.
    pub origin: [f32; 3],
    pub spacing: f32,
    pub width: u32,
    pub height: u32,
    /// Probes start this far above each cell center.
    pub probe_height: f32,
    pub max_probe_distance: f32,
    /// Extra start height for levels with stairs or ramps.
    pub adaptive_height_bonus: f32,
    pub predicate: FloorPredicate,
}

impl Default for FloorScanConfig {
    fn default() -> Self {
        Self {
            origin: [0.0; 3],
            spacing: 1.0,
            width: 20,
            height: 20,
            probe_height: 5.0,
            max_probe_distance: 50.0,
            adaptive_height_bonus: 0.0,
            predicate: FloorPredicate::default(),
        }
    }
}

impl FloorScanConfig {
    pub fn validate(&self) -> NavResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(NavError::InvalidConfig(format!(
                "grid extents must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if !(self.spacing.is_finite() && self.spacing > 0.0) {
            return Err(NavError::InvalidConfig(format!(
                "cell spacing must be positive, got {}",
                self.spacing
            )));
        }
        if !(self.max_probe_distance.is_finite() && self.max_probe_distance > 0.0) {
            return Err(NavError::InvalidConfig(format!(
                "max probe distance must be positive, got {}",
                self.max_probe_distance
            )));
        }
        if !self.probe_height.is_finite() || !self.adaptive_height_bonus.is_finite() {
            return Err(NavError::InvalidConfig(
                "probe height must be finite".to_string(),
            ));
        }
        Ok(())
    }

    pub fn origin(&self) -> Vec3 {
        Vec3::from_array(self.origin)
    }

    /// World-space center of cell `(x, z)` at the origin's height.
    pub fn cell_center(&self, x: u32, z: u32) -> Vec3 {
        self.origin()
            + Vec3::new(
                (x as f32 + 0.5) * self.spacing,
                0.0,
                (z as f32 + 0.5) * self.spacing,
            )
    }

    /// Starting height of every probe, above the origin.
    pub fn effective_probe_height(&self) -> f32 {
        self.probe_height + self.adaptive_height_bonus
    }

    /// Derive origin and extents from geometry bounds, padded on every side.
    /// Probe height grows to clear the tallest surface.
    pub fn fit_to_bounds(&mut self, min: Vec3, max: Vec3, spacing: f32, padding: f32) {
        let spacing = if spacing > 0.0 { spacing } else { self.spacing };
        let min = min - Vec3::new(padding, 0.0, padding);
        let max = max + Vec3::new(padding, 0.0, padding);
        let cells = |extent: f32| ((extent / spacing).ceil() as u32).max(MIN_FITTED_CELLS);

        self.origin = [min.x, min.y, min.z];
        self.spacing = spacing;
        self.width = cells(max.x - min.x);
        self.height = cells(max.z - min.z);
        self.probe_height = self.probe_height.max(max.y - min.y + 1.0);
        self.max_probe_distance = self
            .max_probe_distance
            .max(self.effective_probe_height() + 1.0);
    }

    pub fn cell_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Counts from one scan. `scanned - valid - skipped` probes hit nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub scanned: usize,
    pub valid: usize,
    /// Probes that hit something other than floor.
    pub skipped: usize,
}

impl ScanReport {
    pub fn missed(&self) -> usize {
        self.scanned - self.valid - self.skipped
    }

    pub fn coverage(&self) -> f32 {
        if self.scanned == 0 {
            0.0
        } else {
            self.valid as f32 / self.scanned as f32
        }
    }
}

#[derive(Debug, Clone)]
pub struct FloorSampler {
    config: FloorScanConfig,
}

impl FloorSampler {
    pub fn new(config: FloorScanConfig) -> NavResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FloorScanConfig {
        &self.config
    }

    /// Probe one cell. `Ok` carries the floor point; `Err(true)` means a
    /// non-floor surface was hit and `Err(false)` that nothing was.
    fn probe_cell(&self, geometry: &impl CollisionQuery, x: u32, z: u32) -> Result<Vec3, bool> {
        let start = self.config.cell_center(x, z) + Vec3::Y * self.config.effective_probe_height();
        let probe = RayProbe::down(start, self.config.max_probe_distance);
        match geometry.cast_ray(&probe) {
            Some(hit) if self.config.predicate.matches(&hit) => Ok(hit.point),
            Some(_) => Err(true),
            None => Err(false),
        }
    }

    /// Sample every cell, then link neighbors. Never fails; an empty graph is
    /// reported through `ScanReport::valid`.
    #[span_fn]
    pub fn scan(&self, geometry: &impl CollisionQuery, generation: u32) -> (NavGraph, ScanReport) {
        let config = &self.config;
        let mut report = ScanReport {
            scanned: config.cell_count(),
            ..Default::default()
        };

        let mut cells = Vec::with_capacity(config.cell_count());
        for z in 0..config.height {
            for x in 0..config.width {
                match self.probe_cell(geometry, x, z) {
                    Ok(point) => {
                        report.valid += 1;
                        cells.push(Some(point));
                    }
                    Err(hit_something) => {
                        if hit_something {
                            report.skipped += 1;
                        }
                        cells.push(None);
                    }
                }
            }
        }

        let graph = NavGraph::from_cells(
            config.origin(),
            config.spacing,
            config.width,
            config.height,
            generation,
            cells,
        );
        (graph, report)
    }

    /// Scan and reject a graph with no walkable cell.
    pub fn build(&self, geometry: &impl CollisionQuery, generation: u32) -> NavResult<NavGraph> {
        let (graph, report) = self.scan(geometry, generation);
        let config = &self.config;
        imetric!("nav_valid_cells", "count", report.valid as u64);

        if report.valid == 0 {
            error!(
                "floor scan found no walkable cells: method={:?} tag={} layer_mask={:#x} probe_height={} max_distance={} origin={:?} spacing={} grid={}x{}",
                config.predicate.method,
                config.predicate.tag,
                config.predicate.layer_mask,
                config.effective_probe_height(),
                config.max_probe_distance,
                config.origin,
                config.spacing,
                config.width,
                config.height
            );
            return Err(NavError::EmptyGraph {
                scanned: report.scanned,
            });
        }

        info!(
            "floor scan: {} scanned, {} valid, {} skipped, {} missed ({:.1}% coverage)",
            report.scanned,
            report.valid,
            report.skipped,
            report.missed(),
            report.coverage() * 100.0
        );
        if report.valid < SPARSE_GRAPH_WARNING {
            warn!(
                "floor scan found only {} walkable cells; check the floor predicate",
                report.valid
            );
        }
        Ok(graph)
    }
}

impl NavGraph {
    /// Rebuild from geometry as the next generation. On failure the current
    /// graph is left untouched.
    pub fn refresh(
        &mut self,
        sampler: &FloorSampler,
        geometry: &impl CollisionQuery,
    ) -> NavResult<usize> {
        let rebuilt = sampler.build(geometry, self.generation().wrapping_add(1))?;
        self.replace_with(rebuilt);
        Ok(self.valid_count())
    }
}
