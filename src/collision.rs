//! Terrain query results.
//!
//! A [`TerrainHit`] is produced fresh by every ray cast and is never cached
//! across ticks.

use bevy::prelude::*;

/// Information about a ray hitting terrain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainHit {
    /// Distance along the ray to the hit point.
    pub distance: f32,
    /// Surface normal at the hit point (unit length).
    pub normal: Vec3,
    /// World position of the hit point.
    pub point: Vec3,
    /// Entity that was hit (if the backend knows it).
    pub entity: Option<Entity>,
}

impl TerrainHit {
    /// Create a hit result.
    pub fn new(distance: f32, normal: Vec3, point: Vec3, entity: Option<Entity>) -> Self {
        Self {
            distance,
            normal,
            point,
            entity,
        }
    }

    /// Angle between the surface normal and `up`, in degrees.
    ///
    /// 0° is flat floor, 90° is a vertical wall.
    pub fn angle_from_up(&self, up: Vec3) -> f32 {
        self.normal
            .normalize_or_zero()
            .dot(up)
            .clamp(-1.0, 1.0)
            .acos()
            .to_degrees()
    }

    /// Whether the surface is at least `min_angle_deg` away from flat.
    pub fn is_steeper_than(&self, up: Vec3, min_angle_deg: f32) -> bool {
        self.angle_from_up(up) >= min_angle_deg
    }
}
