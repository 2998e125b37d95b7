//! Level collision geometry and the ray probe used by the floor sampler and
//! the line-of-sight check.
//!
//! [`CollisionQuery`] is the only thing the navigation core needs from a level:
//! "cast a ray from P along D up to L, give me the nearest hit". [`BoxGeometry`]
//! is an axis-aligned box world that implements it with Bevy's bounding-volume
//! ray casts. Boxes carry a surface tag and a layer index so floor detection
//! can tell floor from walls and props.

use bevy::math::bounding::{Aabb3d, RayCast3d};
use bevy::math::{Dir3, Ray3d, Vec3, Vec3A};

/// Identity of a movable body (an agent's or a target's hit volume).
/// The ECS layer uses `Entity::to_bits()`.
pub type BodyId = u64;

/// Nearest surface struck by a ray probe.
#[derive(Debug, Clone, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
    pub tag: String,
    /// Layer index in `0..32`.
    pub layer: u32,
    /// Body owning the struck collider, `None` for static level geometry.
    pub body: Option<BodyId>,
    /// Body the struck collider is attached to (a weapon on a hand, a head on
    /// a torso). Equal to `body` for a root collider.
    pub root: Option<BodyId>,
}

impl RayHit {
    /// Whether this hit landed on `body` or on a part attached to it.
    pub fn belongs_to(&self, body: BodyId) -> bool {
        self.body == Some(body) || self.root == Some(body)
    }
}

/// A single ray probe request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayProbe {
    pub origin: Vec3,
    pub direction: Dir3,
    pub max_distance: f32,
    /// Colliders owned by (or attached to) this body are ignored.
    pub exclude: Option<BodyId>,
}

impl RayProbe {
    pub fn new(origin: Vec3, direction: Dir3, max_distance: f32) -> Self {
        Self {
            origin,
            direction,
            max_distance,
            exclude: None,
        }
    }

    /// Straight down from `origin`.
    pub fn down(origin: Vec3, max_distance: f32) -> Self {
        Self::new(origin, Dir3::NEG_Y, max_distance)
    }

    /// From `from` toward `to`, limited to their separation. `None` when the
    /// two points coincide.
    pub fn between(from: Vec3, to: Vec3) -> Option<Self> {
        let delta = to - from;
        let distance = delta.length();
        let direction = Dir3::new(delta).ok()?;
        Some(Self::new(from, direction, distance))
    }

    pub fn excluding(mut self, body: Option<BodyId>) -> Self {
        self.exclude = body;
        self
    }
}

/// Level collision query surface.
pub trait CollisionQuery {
    /// Nearest hit along the probe, if any.
    fn cast_ray(&self, probe: &RayProbe) -> Option<RayHit>;

    /// World-space bounds of the static geometry, used to auto-fit a scan.
    fn bounds(&self) -> Option<(Vec3, Vec3)> {
        None
    }
}

impl<T: CollisionQuery + ?Sized> CollisionQuery for &T {
    fn cast_ray(&self, probe: &RayProbe) -> Option<RayHit> {
        (**self).cast_ray(probe)
    }

    fn bounds(&self) -> Option<(Vec3, Vec3)> {
        (**self).bounds()
    }
}

// ---------------------------------------------------------------------------
// Box world
// ---------------------------------------------------------------------------

/// Axis-aligned box collider.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxCollider {
    pub min: Vec3,
    pub max: Vec3,
    pub tag: String,
    pub layer: u32,
    pub body: Option<BodyId>,
    pub root: Option<BodyId>,
}

impl BoxCollider {
    pub fn half_size(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    fn aabb(&self) -> Aabb3d {
        Aabb3d {
            min: Vec3A::from(self.min),
            max: Vec3A::from(self.max),
        }
    }

    /// Outward normal of the face nearest to `point`.
    fn face_normal(&self, point: Vec3) -> Vec3 {
        let faces = [
            (point.x - self.min.x, Vec3::NEG_X),
            (self.max.x - point.x, Vec3::X),
            (point.y - self.min.y, Vec3::NEG_Y),
            (self.max.y - point.y, Vec3::Y),
            (point.z - self.min.z, Vec3::NEG_Z),
            (self.max.z - point.z, Vec3::Z),
        ];
        faces
            .iter()
            .min_by(|a, b| a.0.abs().total_cmp(&b.0.abs()))
            .map(|(_, n)| *n)
            .unwrap_or(Vec3::Y)
    }
}

/// Collision world made of tagged boxes. Static level pieces have no body;
/// movable hit volumes are registered per body and can be moved between ticks.
#[derive(Debug, Clone, Default)]
pub struct BoxGeometry {
    colliders: Vec<BoxCollider>,
}

impl BoxGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a static box. Returns its collider index.
    pub fn add_box(
        &mut self,
        center: Vec3,
        half_size: Vec3,
        tag: impl Into<String>,
        layer: u32,
    ) -> usize {
        self.push(center, half_size, tag.into(), layer, None, None)
    }

    /// Add a hit volume owned by `body`.
    pub fn add_body(
        &mut self,
        body: BodyId,
        center: Vec3,
        half_size: Vec3,
        tag: impl Into<String>,
        layer: u32,
    ) -> usize {
        self.push(center, half_size, tag.into(), layer, Some(body), Some(body))
    }

    /// Add a part (its own body id) attached to `root`.
    pub fn add_attached(
        &mut self,
        part: BodyId,
        root: BodyId,
        center: Vec3,
        half_size: Vec3,
        tag: impl Into<String>,
        layer: u32,
    ) -> usize {
        self.push(center, half_size, tag.into(), layer, Some(part), Some(root))
    }

    fn push(
        &mut self,
        center: Vec3,
        half_size: Vec3,
        tag: String,
        layer: u32,
        body: Option<BodyId>,
        root: Option<BodyId>,
    ) -> usize {
        let half_size = half_size.abs();
        self.colliders.push(BoxCollider {
            min: center - half_size,
            max: center + half_size,
            tag,
            layer: layer.min(31),
            body,
            root,
        });
        self.colliders.len() - 1
    }

    /// Recenter every collider owned by `body`. Returns false when the body
    /// has no collider.
    pub fn move_body(&mut self, body: BodyId, center: Vec3) -> bool {
        let mut moved = false;
        for collider in self.colliders.iter_mut().filter(|c| c.body == Some(body)) {
            let half = collider.half_size();
            collider.min = center - half;
            collider.max = center + half;
            moved = true;
        }
        moved
    }

    /// Remove every collider owned by or attached to `body`.
    pub fn remove_body(&mut self, body: BodyId) {
        self.colliders
            .retain(|c| c.body != Some(body) && c.root != Some(body));
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }
}

impl BoxGeometry {
    fn cast_filtered(
        &self,
        probe: &RayProbe,
        keep: impl Fn(&BoxCollider) -> bool,
    ) -> Option<RayHit> {
        let ray = RayCast3d::from_ray(Ray3d::new(probe.origin, probe.direction), probe.max_distance);

        self.colliders
            .iter()
            .filter(|c| keep(*c))
            .filter(|c| match probe.exclude {
                Some(excluded) => c.body != Some(excluded) && c.root != Some(excluded),
                None => true,
            })
            .filter_map(|c| ray.aabb_intersection_at(&c.aabb()).map(|t| (t, c)))
            .filter(|(t, _)| *t <= probe.max_distance)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(distance, collider)| {
                let point = probe.origin + *probe.direction * distance;
                RayHit {
                    point,
                    normal: collider.face_normal(point),
                    distance,
                    tag: collider.tag.clone(),
                    layer: collider.layer,
                    body: collider.body,
                    root: collider.root,
                }
            })
    }

    /// The level without its movable bodies. Floor scans run against this so
    /// agents standing on a cell do not hide it.
    pub fn statics(&self) -> StaticGeometry<'_> {
        StaticGeometry(self)
    }
}

impl CollisionQuery for BoxGeometry {
    fn cast_ray(&self, probe: &RayProbe) -> Option<RayHit> {
        self.cast_filtered(probe, |_| true)
    }

    fn bounds(&self) -> Option<(Vec3, Vec3)> {
        self.colliders
            .iter()
            .filter(|c| c.body.is_none())
            .fold(None, |acc, c| match acc {
                None => Some((c.min, c.max)),
                Some((min, max)) => Some((min.min(c.min), max.max(c.max))),
            })
    }
}

/// Borrowed view of a [`BoxGeometry`] that only sees static colliders.
#[derive(Debug, Clone, Copy)]
pub struct StaticGeometry<'a>(&'a BoxGeometry);

impl CollisionQuery for StaticGeometry<'_> {
    fn cast_ray(&self, probe: &RayProbe) -> Option<RayHit> {
        self.0.cast_filtered(probe, |c| c.body.is_none())
    }

    fn bounds(&self) -> Option<(Vec3, Vec3)> {
        self.0.bounds()
    }
}
