//! Rapier3D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier3D.
//! Enable with the `rapier3d` feature.

use bevy::prelude::*;
use bevy_rapier3d::geometry::Group;
use bevy_rapier3d::prelude::*;

use crate::backend::{LocomotionBackend, RayFilter, RayGroups};
use crate::collision::TerrainHit;
use crate::locomotion::LocomotionController;

/// Rapier3D physics backend for the locomotion systems.
///
/// Terrain rays go through the default Rapier context's query pipeline.
/// Sensors are never hit and the casting body is excluded.
pub struct Rapier3dBackend;

impl LocomotionBackend for Rapier3dBackend {
    type Terrain = ReadRapierContext<'static, 'static>;

    fn plugin() -> impl Plugin {
        Rapier3dBackendPlugin
    }

    fn cast_ray(
        terrain: &ReadRapierContext,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        filter: &RayFilter,
    ) -> Option<TerrainHit> {
        let context = terrain.single().ok()?;
        rapier_raycast(&context, origin, direction, max_distance, filter)
    }
}

/// Plugin that sets up Rapier3D-specific systems for the locomotion stages.
pub struct Rapier3dBackendPlugin;

impl Plugin for Rapier3dBackendPlugin {
    fn build(&self, app: &mut App) {
        use crate::LocomotionSet;

        app.add_systems(FixedUpdate, sync_ray_groups.in_set(LocomotionSet::Input));
    }
}

/// Mirror a character's Rapier `CollisionGroups` into its [`RayGroups`].
pub fn sync_ray_groups(
    mut commands: Commands,
    q_characters: Query<
        (Entity, &CollisionGroups, Option<&RayGroups>),
        (With<LocomotionController>, Changed<CollisionGroups>),
    >,
) {
    for (entity, groups, current) in &q_characters {
        let synced = RayGroups::new(groups.memberships.bits(), groups.filters.bits());
        if current != Some(&synced) {
            commands.entity(entity).insert(synced);
        }
    }
}

/// Translate a [`RayFilter`] into a Rapier query filter.
fn query_filter(filter: &RayFilter) -> QueryFilter<'static> {
    let mut query = QueryFilter::default().exclude_sensors();

    if let Some(entity) = filter.exclude {
        query = query.exclude_rigid_body(entity).exclude_collider(entity);
    }

    if let Some((memberships, filters)) = filter.groups {
        query = query.groups(CollisionGroups::new(
            Group::from_bits_truncate(memberships),
            Group::from_bits_truncate(filters),
        ));
    }

    query
}

fn rapier_raycast(
    context: &RapierContext,
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    filter: &RayFilter,
) -> Option<TerrainHit> {
    context
        .cast_ray_and_get_normal(
            origin,
            direction,
            max_distance,
            true, // solid: a ray starting inside a collider hits at 0
            query_filter(filter),
        )
        .map(|(hit_entity, hit)| {
            TerrainHit::new(hit.time_of_impact, hit.normal, hit.point, Some(hit_entity))
        })
}

/// Bundle of Rapier components for a locomotion character.
///
/// The locomotion systems move the body through its `Transform`, so the body
/// is kinematic and position based: Rapier follows the transform and other
/// bodies collide with it.
///
/// # Example
///
/// ```ignore
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use msg_procedural_locomotion::prelude::*;
///
/// fn spawn_player(mut commands: Commands) {
///     commands.spawn((
///         Transform::from_xyz(0.0, 0.0, 0.0),
///         LocomotionBundle::new(LocomotionConfig::walking()),
///         Rapier3dCharacterBundle::new(),
///         Collider::capsule_y(0.6, 0.3),
///     ));
/// }
/// ```
///
/// # Defaults
///
/// - `rigid_body`: [`RigidBody::KinematicPositionBased`]
/// - `locked_axes`: [`LockedAxes::ROTATION_LOCKED_X`] and `Z`, so only yaw changes
#[derive(Bundle)]
pub struct Rapier3dCharacterBundle {
    /// The rigid body type. Kinematic so the transform drives it.
    pub rigid_body: RigidBody,
    /// Axes the body may not rotate about.
    pub locked_axes: LockedAxes,
}

impl Default for Rapier3dCharacterBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl Rapier3dCharacterBundle {
    /// Create a kinematic character bundle.
    pub fn new() -> Self {
        Self {
            rigid_body: RigidBody::KinematicPositionBased,
            locked_axes: LockedAxes::ROTATION_LOCKED_X | LockedAxes::ROTATION_LOCKED_Z,
        }
    }

    /// Set the rigid body type for the character.
    pub fn with_body(mut self, body: RigidBody) -> Self {
        self.rigid_body = body;
        self
    }

    /// Set which axes are locked.
    pub fn with_locked_axes(mut self, axes: LockedAxes) -> Self {
        self.locked_axes = axes;
        self
    }
}
