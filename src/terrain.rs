//! Analytic terrain backend.
//!
//! [`StaticTerrain`] is a resource of infinite planes and oriented boxes that
//! answers ray casts without a physics engine. It backs headless simulation
//! and the test-suite through [`StaticTerrainBackend`].

use bevy::prelude::*;

use crate::backend::{LocomotionBackend, RayFilter, TerrainQuery};
use crate::collision::TerrainHit;

const PARALLEL_EPSILON: f32 = 1e-8;

/// Geometry of one terrain surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TerrainShape {
    /// One-sided infinite plane, hit only from the side its normal faces.
    Plane {
        /// Any point on the plane.
        point: Vec3,
        /// Unit normal.
        normal: Vec3,
    },
    /// Solid oriented box.
    Cuboid {
        /// World-space center.
        center: Vec3,
        /// Half size along each local axis.
        half_extents: Vec3,
        /// World-space rotation.
        rotation: Quat,
    },
}

/// A surface in a [`StaticTerrain`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainSurface {
    /// Surface geometry.
    pub shape: TerrainShape,
    /// Entity reported in hits and matched against [`RayFilter::exclude`].
    pub entity: Option<Entity>,
    /// Collision group bits this surface belongs to.
    pub membership: u32,
}

impl TerrainSurface {
    /// Create a surface belonging to every collision group.
    pub fn new(shape: TerrainShape) -> Self {
        Self {
            shape,
            entity: None,
            membership: u32::MAX,
        }
    }

    /// Builder: tag the surface with an entity.
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Builder: set collision group membership.
    pub fn with_membership(mut self, membership: u32) -> Self {
        self.membership = membership;
        self
    }

    fn accepts(&self, filter: &RayFilter) -> bool {
        if self.entity.is_some() && self.entity == filter.exclude {
            return false;
        }
        match filter.groups {
            Some((_, filters)) => self.membership & filters != 0,
            None => true,
        }
    }

    /// Intersect a normalized ray with this surface.
    fn intersect(&self, origin: Vec3, direction: Vec3) -> Option<(f32, Vec3)> {
        match self.shape {
            TerrainShape::Plane { point, normal } => {
                let denom = normal.dot(direction);
                if denom > -PARALLEL_EPSILON {
                    return None;
                }
                let distance = normal.dot(point - origin) / denom;
                (distance >= 0.0).then_some((distance, normal))
            }
            TerrainShape::Cuboid {
                center,
                half_extents,
                rotation,
            } => {
                let inverse = rotation.inverse();
                let local_origin = inverse * (origin - center);
                let local_direction = inverse * direction;

                let mut t_near = f32::NEG_INFINITY;
                let mut t_far = f32::INFINITY;
                let mut local_normal = -local_direction;
                for axis in 0..3 {
                    let o = local_origin[axis];
                    let d = local_direction[axis];
                    let h = half_extents[axis];
                    if d.abs() < PARALLEL_EPSILON {
                        if o.abs() > h {
                            return None;
                        }
                        continue;
                    }
                    let t1 = (-h - o) / d;
                    let t2 = (h - o) / d;
                    let (near, far, sign) = if t1 < t2 {
                        (t1, t2, -1.0)
                    } else {
                        (t2, t1, 1.0)
                    };
                    if near > t_near {
                        t_near = near;
                        let mut axis_normal = Vec3::ZERO;
                        axis_normal[axis] = sign;
                        local_normal = axis_normal;
                    }
                    t_far = t_far.min(far);
                    if t_near > t_far {
                        return None;
                    }
                }
                if t_far < 0.0 {
                    return None;
                }
                if t_near < 0.0 {
                    // origin inside a solid box
                    return Some((0.0, -direction));
                }
                Some((t_near, (rotation * local_normal).normalize_or_zero()))
            }
        }
    }
}

/// Resource holding analytic terrain for [`StaticTerrainBackend`].
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use msg_procedural_locomotion::prelude::*;
///
/// // Flat floor with a 0.3 m step two meters ahead
/// let terrain = StaticTerrain::new()
///     .with_floor(0.0)
///     .with_cuboid(Vec3::new(0.0, 0.15, -4.0), Vec3::new(2.0, 0.15, 2.0));
/// assert_eq!(terrain.len(), 2);
/// ```
#[derive(Resource, Debug, Clone, Default)]
pub struct StaticTerrain {
    surfaces: Vec<TerrainSurface>,
}

impl StaticTerrain {
    /// Empty terrain (every ray misses).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a surface.
    pub fn add(&mut self, surface: TerrainSurface) -> &mut Self {
        self.surfaces.push(surface);
        self
    }

    /// Builder: add a surface.
    pub fn with_surface(mut self, surface: TerrainSurface) -> Self {
        self.add(surface);
        self
    }

    /// Builder: add a one-sided plane through `point` facing `normal`.
    ///
    /// A zero normal is ignored.
    pub fn with_plane(self, point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize_or_zero();
        if normal == Vec3::ZERO {
            return self;
        }
        self.with_surface(TerrainSurface::new(TerrainShape::Plane { point, normal }))
    }

    /// Builder: add a horizontal floor plane at `height`.
    pub fn with_floor(self, height: f32) -> Self {
        self.with_plane(Vec3::new(0.0, height, 0.0), Vec3::Y)
    }

    /// Builder: add an axis-aligned box.
    pub fn with_cuboid(self, center: Vec3, half_extents: Vec3) -> Self {
        self.with_rotated_cuboid(center, half_extents, Quat::IDENTITY)
    }

    /// Builder: add an oriented box.
    pub fn with_rotated_cuboid(self, center: Vec3, half_extents: Vec3, rotation: Quat) -> Self {
        self.with_surface(TerrainSurface::new(TerrainShape::Cuboid {
            center,
            half_extents: half_extents.abs(),
            rotation: rotation.normalize(),
        }))
    }

    /// All surfaces.
    pub fn surfaces(&self) -> &[TerrainSurface] {
        &self.surfaces
    }

    /// Number of surfaces.
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    /// Whether the terrain has no surfaces.
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

impl TerrainQuery for StaticTerrain {
    fn cast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        filter: &RayFilter,
    ) -> Option<TerrainHit> {
        let direction = direction.normalize_or_zero();
        if direction == Vec3::ZERO || max_distance <= 0.0 {
            return None;
        }
        self.surfaces
            .iter()
            .filter(|surface| surface.accepts(filter))
            .filter_map(|surface| {
                surface
                    .intersect(origin, direction)
                    .filter(|(distance, _)| *distance <= max_distance)
                    .map(|(distance, normal)| {
                        TerrainHit::new(
                            distance,
                            normal,
                            origin + direction * distance,
                            surface.entity,
                        )
                    })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

/// Backend that casts rays against the [`StaticTerrain`] resource.
pub struct StaticTerrainBackend;

impl LocomotionBackend for StaticTerrainBackend {
    type Terrain = Option<Res<'static, StaticTerrain>>;

    fn plugin() -> impl Plugin {
        StaticTerrainPlugin
    }

    fn cast_ray(
        terrain: &Option<Res<StaticTerrain>>,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        filter: &RayFilter,
    ) -> Option<TerrainHit> {
        terrain
            .as_deref()
            .and_then(|terrain| terrain.cast(origin, direction, max_distance, filter))
    }
}

/// Plugin that makes sure a [`StaticTerrain`] resource exists.
pub struct StaticTerrainPlugin;

impl Plugin for StaticTerrainPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<StaticTerrain>();
    }
}
