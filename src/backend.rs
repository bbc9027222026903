//! Terrain query abstraction.
//!
//! The locomotion core only needs one thing from the world: synchronous ray
//! casts against static or kinematic collision geometry. [`TerrainQuery`] is
//! that seam for the engine-agnostic core, and [`LocomotionBackend`] plugs a
//! physics engine into the bevy systems (Rapier3D, the analytic
//! [`StaticTerrain`](crate::terrain::StaticTerrain), or a custom one).

use bevy::ecs::system::{SystemParam, SystemParamItem};
use bevy::prelude::*;

use crate::collision::TerrainHit;

/// Filtering applied to every ray a character casts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RayFilter {
    /// Entity to ignore (usually the casting character).
    pub exclude: Option<Entity>,
    /// Collision groups as `(memberships, filters)` bit masks.
    pub groups: Option<(u32, u32)>,
}

impl RayFilter {
    /// A filter that accepts every surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignore `entity`.
    pub fn excluding(mut self, entity: Entity) -> Self {
        self.exclude = Some(entity);
        self
    }

    /// Only hit surfaces matching these collision groups.
    pub fn with_groups(mut self, memberships: u32, filters: u32) -> Self {
        self.groups = Some((memberships, filters));
        self
    }
}

/// Collision groups a character's terrain rays should respect.
///
/// Optional. Without it the systems cast rays against every surface except
/// the character's own body.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Eq)]
#[reflect(Component)]
pub struct RayGroups {
    /// Groups the rays belong to.
    pub memberships: u32,
    /// Groups the rays may hit.
    pub filters: u32,
}

impl RayGroups {
    /// Create ray groups from bit masks.
    pub fn new(memberships: u32, filters: u32) -> Self {
        Self {
            memberships,
            filters,
        }
    }

    /// Build the filter for rays cast by `entity`.
    pub fn filter_for(groups: Option<&Self>, entity: Entity) -> RayFilter {
        let filter = RayFilter::new().excluding(entity);
        match groups {
            Some(groups) => filter.with_groups(groups.memberships, groups.filters),
            None => filter,
        }
    }
}

/// Synchronous ray intersection against world geometry.
///
/// `direction` need not be normalized; implementations normalize it and return
/// `None` for a zero direction or a non-positive `max_distance`.
pub trait TerrainQuery {
    /// Cast a ray and return the closest hit within `max_distance`.
    fn cast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        filter: &RayFilter,
    ) -> Option<TerrainHit>;
}

impl<T: TerrainQuery + ?Sized> TerrainQuery for &T {
    fn cast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        filter: &RayFilter,
    ) -> Option<TerrainHit> {
        (**self).cast(origin, direction, max_distance, filter)
    }
}

/// Trait for physics backend implementations.
///
/// A backend names the system parameter that gives read access to its
/// collision world and casts rays through it. The locomotion systems request
/// `B::Terrain` and wrap it in a [`BackendTerrain`] before handing it to the
/// core algorithms.
pub trait LocomotionBackend: 'static + Send + Sync {
    /// Read-only access to the backend's collision world.
    type Terrain: SystemParam + 'static;

    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;

    /// Cast a ray through the backend.
    ///
    /// # Arguments
    /// * `terrain` - The backend's system parameter
    /// * `origin` - Ray origin in world space
    /// * `direction` - Ray direction (normalized by the caller)
    /// * `max_distance` - Maximum cast distance
    /// * `filter` - Excluded entity and collision groups
    fn cast_ray(
        terrain: &SystemParamItem<Self::Terrain>,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        filter: &RayFilter,
    ) -> Option<TerrainHit>;
}

/// Adapts a backend's system parameter to [`TerrainQuery`].
pub struct BackendTerrain<'a, 'w, 's, B: LocomotionBackend> {
    param: &'a SystemParamItem<'w, 's, B::Terrain>,
}

impl<'a, 'w, 's, B: LocomotionBackend> BackendTerrain<'a, 'w, 's, B> {
    /// Wrap a backend system parameter.
    pub fn new(param: &'a SystemParamItem<'w, 's, B::Terrain>) -> Self {
        Self { param }
    }
}

impl<B: LocomotionBackend> TerrainQuery for BackendTerrain<'_, '_, '_, B> {
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
        B::cast_ray(self.param, origin, direction, max_distance, filter)
    }
}

/// Empty plugin for backends that don't need additional setup.
pub struct NoOpBackendPlugin;

impl Plugin for NoOpBackendPlugin {
    fn build(&self, _app: &mut App) {}
}
