//! Terrain-aware foot placement.
//!
//! [`FootPlacementSolver`] refines an incoming foot goal (from the gait engine
//! or the animation) against the ground: it plants the sole on the surface,
//! aligns it to the slope and lifts it over steps and risers ahead. The result
//! is blended exponentially so corrections never pop.

use bevy::prelude::*;

use crate::backend::{RayFilter, TerrainQuery};
use crate::config::{FootGoalSource, LocomotionConfig};
use crate::geometry::{
    exp_blend, look_rotation, planar_distance, project_on_plane, FootGoal, FootPair, FootSide,
    Pose, WORLD_UP,
};

/// Why a foot was lifted on the last solve.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LiftReason {
    /// No lift.
    #[default]
    None,
    /// Ground ahead is higher.
    Ascending,
    /// Ground ahead is lower.
    Descending,
    /// A riser is right in front of the toes.
    Riser,
}

/// Per-foot placement state.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct FootPlacementSolver {
    side: FootSide,
    position: Vec3,
    rotation: Quat,
    lift: f32,
    reason: LiftReason,
    initialized: bool,
}

impl FootPlacementSolver {
    /// Create a solver for one foot.
    pub fn new(side: FootSide) -> Self {
        Self {
            side,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            lift: 0.0,
            reason: LiftReason::None,
            initialized: false,
        }
    }

    /// Foot this solver drives.
    pub fn side(&self) -> FootSide {
        self.side
    }

    /// Last corrected goal.
    pub fn current(&self) -> FootGoal {
        FootGoal::new(self.position, self.rotation)
    }

    /// Lift added on the last solve, after the proximity ramp.
    pub fn lift(&self) -> f32 {
        self.lift
    }

    /// Why the foot was lifted on the last solve.
    pub fn lift_reason(&self) -> LiftReason {
        self.reason
    }

    /// Refine `goal` against the terrain and blend toward the result.
    ///
    /// The first call starts from `goal` itself. When no ground is found
    /// under the goal the output blends back toward the uncorrected goal.
    pub fn solve<T: TerrainQuery + ?Sized>(
        &mut self,
        config: &LocomotionConfig,
        goal: FootGoal,
        body: &Pose,
        dt: f32,
        terrain: &T,
        filter: &RayFilter,
    ) -> FootGoal {
        if !self.initialized {
            self.position = goal.position;
            self.rotation = goal.rotation;
            self.initialized = true;
        }

        let alpha = exp_blend(config.ik_lerp_speed, dt);
        let Some(now) = terrain.cast(
            goal.position + WORLD_UP * config.foot_probe_height,
            -WORLD_UP,
            config.foot_probe_distance,
            filter,
        ) else {
            self.lift = 0.0;
            self.reason = LiftReason::None;
            self.blend_toward(goal.position, goal.rotation, alpha);
            return self.current();
        };

        let forward = body.planar_forward();
        let lateral = body.right() * self.side.sign() * config.lateral_foot_offset;
        let future_point = body.position + forward * config.body_look_ahead + lateral;
        let future = terrain.cast(
            future_point + WORLD_UP * config.hip_probe_height,
            -WORLD_UP,
            config.hip_probe_height + config.foot_probe_distance,
            filter,
        );
        let wall = terrain.cast(
            goal.position + WORLD_UP * config.ankle_height,
            forward,
            config.toe_ray_length,
            filter,
        );

        let rise = future.map(|hit| hit.point.y - now.point.y);
        let (lift, reason) = match rise {
            Some(rise) if rise > config.elevation_threshold => {
                (config.step_lift_height, LiftReason::Ascending)
            }
            Some(rise) if rise < -config.elevation_threshold => (
                config.step_lift_height * config.descent_lift_factor,
                LiftReason::Descending,
            ),
            _ if wall.is_some_and(|hit| hit.is_steeper_than(WORLD_UP, config.riser_min_angle)) => {
                (config.step_lift_height, LiftReason::Riser)
            }
            _ => (0.0, LiftReason::None),
        };

        let arc = (config.max_arc_distance - planar_distance(goal.position, future_point, WORLD_UP))
            .clamp(0.0, 1.0);
        let lift = lift * arc;
        let nudge = if lift > 0.0 {
            forward * config.edge_nudge * arc
        } else {
            Vec3::ZERO
        };

        // gait goals carry their swing arc above the sole clearance
        let swing = match config.foot_goal_source {
            FootGoalSource::Gait => (goal.position.y - now.point.y - config.foot_clearance).max(0.0),
            FootGoalSource::Animation => 0.0,
        };
        let target_position =
            now.point + WORLD_UP * (config.foot_clearance + swing + lift) + nudge;
        let goal_forward = project_on_plane(goal.rotation * Vec3::NEG_Z, now.normal);
        let target_rotation = look_rotation(goal_forward, now.normal).unwrap_or(goal.rotation);

        self.lift = lift;
        self.reason = reason;
        self.blend_toward(target_position, target_rotation, alpha);
        self.current()
    }

    fn blend_toward(&mut self, position: Vec3, rotation: Quat, alpha: f32) {
        self.position = self.position.lerp(position, alpha);
        self.rotation = self.rotation.slerp(rotation, alpha).normalize();
    }
}

/// Foot solvers for both feet of a character.
#[derive(Component, Reflect, Debug, Clone, PartialEq)]
#[reflect(Component)]
pub struct FootPlacement {
    solvers: FootPair<FootPlacementSolver>,
}

impl Default for FootPlacement {
    fn default() -> Self {
        Self {
            solvers: FootPair::from_fn(FootPlacementSolver::new),
        }
    }
}

impl FootPlacement {
    /// Create solvers for both feet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Solver for one foot.
    pub fn solver(&self, side: FootSide) -> &FootPlacementSolver {
        self.solvers.get(side)
    }

    /// Solve both feet independently.
    pub fn solve<T: TerrainQuery + ?Sized>(
        &mut self,
        config: &LocomotionConfig,
        goals: &FootPair<FootGoal>,
        body: &Pose,
        dt: f32,
        terrain: &T,
        filter: &RayFilter,
    ) -> FootPair<FootGoal> {
        FootPair::new(
            self.solvers
                .left
                .solve(config, goals.left, body, dt, terrain, filter),
            self.solvers
                .right
                .solve(config, goals.right, body, dt, terrain, filter),
        )
    }
}
