//! Body locomotion.
//!
//! [`LocomotionController`] integrates a per-tick velocity request into body
//! displacement. Ledges are climbed and dropped by a pending vertical offset
//! that is smoothed toward zero, and horizontal motion follows slopes.

use bevy::prelude::*;

use crate::backend::{RayFilter, TerrainQuery};
use crate::config::LocomotionConfig;
use crate::geometry::{project_on_plane, Pose, WORLD_UP};

/// Requests shorter than this are treated as standing still.
const MOVE_EPSILON: f32 = 1e-4;

/// A pending offset closer than this to zero is applied in full.
const SETTLE_EPSILON: f32 = 1e-4;

/// Something that can move a character body.
///
/// Implementations may clamp the displacement against external collision and
/// return what was actually applied.
pub trait KinematicMover {
    /// Current body pose.
    fn pose(&self) -> Pose;

    /// Translate the body, returning the displacement actually applied.
    fn move_by(&mut self, delta: Vec3) -> Vec3;

    /// Rotate the body in world space.
    fn rotate_by(&mut self, rotation: Quat);
}

impl KinematicMover for Pose {
    fn pose(&self) -> Pose {
        *self
    }

    fn move_by(&mut self, delta: Vec3) -> Vec3 {
        self.position += delta;
        delta
    }

    fn rotate_by(&mut self, rotation: Quat) {
        self.orientation = (rotation * self.orientation).normalize();
    }
}

impl KinematicMover for Transform {
    fn pose(&self) -> Pose {
        Pose::from(self)
    }

    fn move_by(&mut self, delta: Vec3) -> Vec3 {
        self.translation += delta;
        delta
    }

    fn rotate_by(&mut self, rotation: Quat) {
        self.rotate(rotation);
    }
}

/// Outcome of the ledge checks in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgeEvent {
    /// A climbable riser was found ahead.
    StepUp,
    /// The ground dropped away below the feet.
    StepDown,
}

/// Per-character locomotion state.
///
/// Positive `vertical_offset` is a pending climb, negative a pending descent.
/// Once set its magnitude only decreases, and a new ledge is only detected
/// while it is close to zero.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Component)]
pub struct LocomotionController {
    vertical_offset: f32,
    applied_velocity: Vec3,
    #[reflect(ignore)]
    last_event: Option<LedgeEvent>,
}

impl LocomotionController {
    /// Create a controller at rest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending vertical lift (positive) or drop (negative).
    #[inline]
    pub fn vertical_offset(&self) -> f32 {
        self.vertical_offset
    }

    /// World velocity applied on the last tick.
    #[inline]
    pub fn applied_velocity(&self) -> Vec3 {
        self.applied_velocity
    }

    /// Ledge detected on the last tick, if any.
    #[inline]
    pub fn last_event(&self) -> Option<LedgeEvent> {
        self.last_event
    }

    /// Whether a climb is in progress.
    pub fn is_climbing(&self) -> bool {
        self.vertical_offset > 0.0
    }

    /// Whether a descent is in progress.
    pub fn is_descending(&self) -> bool {
        self.vertical_offset < 0.0
    }

    /// Advance the body by one tick.
    ///
    /// `local_request` is in body space (`-Z` forward, `+X` right) and is
    /// scaled by `config.speed`. Returns the world velocity applied, which
    /// feeds stride prediction. A non-positive `dt` skips the tick and returns
    /// the previous velocity.
    pub fn tick<T, M>(
        &mut self,
        config: &LocomotionConfig,
        local_request: Vec3,
        dt: f32,
        terrain: &T,
        filter: &RayFilter,
        mover: &mut M,
    ) -> Vec3
    where
        T: TerrainQuery + ?Sized,
        M: KinematicMover + ?Sized,
    {
        self.last_event = None;
        if !(dt > 0.0 && dt.is_finite()) {
            return self.applied_velocity;
        }

        let pose = mover.pose();
        let mut target_move = pose.to_world(local_request) * config.speed;
        let moving = target_move.length() > MOVE_EPSILON;

        let may_climb = self.vertical_offset <= config.climb_start_threshold
            && self.vertical_offset >= -config.descend_start_threshold;
        if moving && may_climb && self.detect_step_up(config, &pose, target_move, terrain, filter)
        {
            self.vertical_offset += config.step_height;
            self.last_event = Some(LedgeEvent::StepUp);
            debug!(
                "step up detected at {:?}, pending offset {:.3}",
                pose.position, self.vertical_offset
            );
        }

        if self.vertical_offset.abs() <= config.descend_start_threshold {
            if let Some(drop) = self.detect_step_down(config, &pose, terrain, filter) {
                if self.riser_below_ahead(config, &pose, drop, terrain, filter) {
                    trace!("drop of {drop:.3} ignored, still in front of a riser");
                } else {
                    self.vertical_offset = -drop;
                    self.last_event = Some(LedgeEvent::StepDown);
                    debug!("step down of {drop:.3} detected at {:?}", pose.position);
                }
            }
        }

        let vertical_step = self.smooth_vertical_offset(config, dt);

        if let Some(ground) = terrain.cast(
            pose.position + WORLD_UP * config.slope_probe_height,
            -WORLD_UP,
            config.slope_probe_distance,
            filter,
        ) {
            target_move = project_on_plane(target_move, ground.normal);
        }

        let applied = mover.move_by(target_move * dt + WORLD_UP * vertical_step);
        self.applied_velocity = (applied - WORLD_UP * vertical_step) / dt;
        self.applied_velocity
    }

    /// Yaw the body about world up.
    ///
    /// Positive input turns right. The sign is flipped by `invert_turn`.
    pub fn turn<M: KinematicMover + ?Sized>(
        &self,
        config: &LocomotionConfig,
        yaw_input: f32,
        dt: f32,
        mover: &mut M,
    ) {
        if dt <= 0.0 || yaw_input == 0.0 {
            return;
        }
        let degrees = yaw_input * config.turn_speed * dt * config.turn_sign();
        mover.rotate_by(Quat::from_axis_angle(WORLD_UP, -degrees.to_radians()));
    }

    fn detect_step_up<T: TerrainQuery + ?Sized>(
        &self,
        config: &LocomotionConfig,
        pose: &Pose,
        target_move: Vec3,
        terrain: &T,
        filter: &RayFilter,
    ) -> bool {
        let direction = project_on_plane(target_move, WORLD_UP).normalize_or_zero();
        if direction == Vec3::ZERO {
            return false;
        }
        let cast_at = |height: f32| {
            terrain.cast(
                pose.position + WORLD_UP * height,
                direction,
                config.step_check_distance,
                filter,
            )
        };

        let Some(foot) = cast_at(config.foot_ray_height) else {
            return false;
        };
        if !foot.is_steeper_than(WORLD_UP, config.riser_min_angle) {
            return false;
        }
        cast_at(config.step_height * 0.5).is_some()
            && cast_at(config.clearance_ray_height()).is_none()
    }

    fn detect_step_down<T: TerrainQuery + ?Sized>(
        &self,
        config: &LocomotionConfig,
        pose: &Pose,
        terrain: &T,
        filter: &RayFilter,
    ) -> Option<f32> {
        let hit = terrain.cast(
            pose.position + WORLD_UP * config.step_down_probe_height,
            -WORLD_UP,
            config.step_down_probe_height + config.max_step_down(),
            filter,
        )?;
        let drop = hit.distance - config.step_down_probe_height;
        (drop > config.step_down_min_drop && drop <= config.max_step_down()).then_some(drop)
    }

    /// Whether a riser stands in front of the body at the floor a drop would land on.
    ///
    /// After a climb that settles before the body reaches the riser, the
    /// ground under the body is still the lower floor.
    fn riser_below_ahead<T: TerrainQuery + ?Sized>(
        &self,
        config: &LocomotionConfig,
        pose: &Pose,
        drop: f32,
        terrain: &T,
        filter: &RayFilter,
    ) -> bool {
        let forward = pose.planar_forward();
        let origin = pose.position + WORLD_UP * (config.foot_ray_height - drop);
        terrain
            .cast(origin, forward, config.step_check_distance, filter)
            .is_some_and(|hit| hit.is_steeper_than(WORLD_UP, config.riser_min_angle))
    }

    /// Move part of the pending offset into this tick, returning the part applied.
    fn smooth_vertical_offset(&mut self, config: &LocomotionConfig, dt: f32) -> f32 {
        if self.vertical_offset == 0.0 {
            return 0.0;
        }
        let mut step = self.vertical_offset * dt * config.climb_smoothing;
        if step.abs() > self.vertical_offset.abs()
            || (self.vertical_offset - step).abs() < SETTLE_EPSILON
        {
            step = self.vertical_offset;
        }
        self.vertical_offset -= step;
        step
    }
}
