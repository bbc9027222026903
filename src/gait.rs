//! Phase-driven gait.
//!
//! [`GaitPhaseEngine`] turns a cyclic gait phase angle into per-foot targets.
//! The right leg swings during `[0, 180)` and the left leg during `[180, 360)`.
//! A swinging foot travels from the point where its swing began to a landing
//! point predicted from body velocity, lifted along a sine arc. The planted
//! foot follows the ground under it.

use std::f32::consts::PI;

use bevy::prelude::*;

use crate::backend::{RayFilter, TerrainQuery};
use crate::config::LocomotionConfig;
use crate::geometry::{
    delta_angle, exp_blend, look_rotation, wrap_degrees, FootGoal, FootPair, FootSide, Pose,
    WORLD_UP,
};

/// Height of the swing arc at progress `t` through a half-cycle.
///
/// Zero at `t = 0` and `t = 1`, `step_height` at `t = 0.5`.
#[inline]
pub fn swing_lift(step_height: f32, t: f32) -> f32 {
    step_height * (t * PI).sin()
}

/// Progress `t ∈ [0, 1]` through the current half-cycle for a wrapped angle.
pub fn half_cycle_progress(angle_deg: f32) -> f32 {
    let angle = wrap_degrees(angle_deg);
    let t = if angle < 180.0 {
        angle / 180.0
    } else {
        (angle - 180.0) / 180.0
    };
    t.clamp(0.0, 1.0)
}

/// Tracked state of one foot.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct FootState {
    /// Current foot position.
    pub position: Vec3,
    /// Current foot rotation.
    pub rotation: Quat,
    /// Where the most recent swing of this foot began.
    pub step_start: Vec3,
    /// Knee hint for the two-bone IK solver.
    pub knee_hint: Vec3,
}

impl Default for FootState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            step_start: Vec3::ZERO,
            knee_hint: Vec3::ZERO,
        }
    }
}

impl FootState {
    /// The pose part of this state as an IK goal.
    pub fn goal(&self) -> FootGoal {
        FootGoal::new(self.position, self.rotation)
    }
}

/// Converts a gait phase angle into left/right foot targets.
#[derive(Component, Reflect, Debug, Clone, Default)]
#[reflect(Component)]
pub struct GaitPhaseEngine {
    angle: Option<f32>,
    swing_side: Option<FootSide>,
    feet: FootPair<FootState>,
    swing_entries: FootPair<u32>,
    initialized: bool,
}

impl GaitPhaseEngine {
    /// Create an engine. Feet are placed under the body on the first tick.
    pub fn new() -> Self {
        Self::default()
    }

    /// Smoothed phase angle in `[0, 360)`, or `None` before the first phase.
    #[inline]
    pub fn angle(&self) -> Option<f32> {
        self.angle
    }

    /// Foot currently swinging, or `None` before the first phase.
    #[inline]
    pub fn swing_side(&self) -> Option<FootSide> {
        self.swing_side
    }

    /// State of one foot.
    #[inline]
    pub fn foot(&self, side: FootSide) -> &FootState {
        self.feet.get(side)
    }

    /// State of both feet.
    #[inline]
    pub fn feet(&self) -> &FootPair<FootState> {
        &self.feet
    }

    /// Number of swings `side` has started.
    #[inline]
    pub fn swing_entries(&self, side: FootSide) -> u32 {
        *self.swing_entries.get(side)
    }

    /// Advance the gait by one tick.
    ///
    /// `phase_deg` is the raw phase angle; `None` freezes the gait at the
    /// last known angle. Before any phase has arrived both feet stay planted.
    #[allow(clippy::too_many_arguments)]
    pub fn tick<T: TerrainQuery + ?Sized>(
        &mut self,
        config: &LocomotionConfig,
        phase_deg: Option<f32>,
        body: &Pose,
        body_velocity: Vec3,
        dt: f32,
        terrain: &T,
        filter: &RayFilter,
    ) -> &FootPair<FootState> {
        if !self.initialized {
            self.initialize(config, body, terrain, filter);
        }

        if let Some(raw) = phase_deg.filter(|angle| angle.is_finite()) {
            self.update_angle(config, raw, dt);
        }

        let Some(angle) = self.angle else {
            for side in FootSide::ALL {
                self.plant(config, side, body, terrain, filter);
            }
            self.update_knee_hints(config, body);
            return &self.feet;
        };

        let swing = FootSide::swing_at(angle);
        if self.swing_side != Some(swing) {
            let foot = self.feet.get_mut(swing);
            foot.step_start = foot.position;
            let entries = self.swing_entries.get_mut(swing);
            *entries = entries.wrapping_add(1);
            self.swing_side = Some(swing);
            trace!("{swing:?} foot swing started at {:?}", foot.step_start);
        }

        let t = half_cycle_progress(angle);
        let landing = self.predicted_landing(config, swing, body, body_velocity, terrain, filter);
        let facing = look_rotation(body.planar_forward(), WORLD_UP).unwrap_or(body.orientation);

        let foot = self.feet.get_mut(swing);
        foot.position =
            foot.step_start.lerp(landing, t) + WORLD_UP * swing_lift(config.step_height, t);
        foot.rotation = body.orientation.slerp(facing, t);

        self.plant(config, swing.other(), body, terrain, filter);
        self.update_knee_hints(config, body);
        &self.feet
    }

    /// Ground point under the body for `side`, used as the landing target.
    pub fn predicted_landing<T: TerrainQuery + ?Sized>(
        &self,
        config: &LocomotionConfig,
        side: FootSide,
        body: &Pose,
        body_velocity: Vec3,
        terrain: &T,
        filter: &RayFilter,
    ) -> Vec3 {
        let lateral = body.right() * side.sign() * config.lateral_foot_offset;
        let ahead = body.position + body_velocity * config.stride_prediction + lateral;
        ground_point(config, ahead, body.position.y, terrain, filter)
    }

    fn initialize<T: TerrainQuery + ?Sized>(
        &mut self,
        config: &LocomotionConfig,
        body: &Pose,
        terrain: &T,
        filter: &RayFilter,
    ) {
        self.feet = FootPair::from_fn(|side| {
            let lateral = body.right() * side.sign() * config.lateral_foot_offset;
            let position =
                ground_point(config, body.position + lateral, body.position.y, terrain, filter);
            FootState {
                position,
                rotation: body.orientation,
                step_start: position,
                knee_hint: position,
            }
        });
        self.initialized = true;
    }

    fn update_angle(&mut self, config: &LocomotionConfig, raw_deg: f32, dt: f32) {
        let target = wrap_degrees(raw_deg + config.angle_offset);
        let smoothed = match self.angle {
            None => target,
            Some(_) if config.phase_smooth_time <= 0.0 => target,
            Some(current) => {
                let alpha = exp_blend(1.0 / config.phase_smooth_time, dt);
                wrap_degrees(current + delta_angle(current, target) * alpha)
            }
        };
        trace!("gait phase raw {raw_deg:.1} smoothed {smoothed:.1}");
        self.angle = Some(smoothed);
    }

    /// Keep a planted foot where it is, following the ground height under it.
    fn plant<T: TerrainQuery + ?Sized>(
        &mut self,
        config: &LocomotionConfig,
        side: FootSide,
        body: &Pose,
        terrain: &T,
        filter: &RayFilter,
    ) {
        let foot = self.feet.get_mut(side);
        foot.position = ground_point(config, foot.position, body.position.y, terrain, filter);
    }

    fn update_knee_hints(&mut self, config: &LocomotionConfig, body: &Pose) {
        let base = body.position
            + WORLD_UP * config.knee_hint_height
            + body.planar_forward() * config.knee_hint_forward;
        for side in FootSide::ALL {
            self.feet.get_mut(side).knee_hint =
                base + body.right() * side.sign() * config.knee_hint_lateral;
        }
    }
}

/// Project `point` onto the ground, keeping its horizontal position.
///
/// The probe starts `ground_probe_height` above `reference_height`. Without a
/// hit the point is placed at `reference_height`.
pub fn ground_point<T: TerrainQuery + ?Sized>(
    config: &LocomotionConfig,
    point: Vec3,
    reference_height: f32,
    terrain: &T,
    filter: &RayFilter,
) -> Vec3 {
    let origin = Vec3::new(point.x, reference_height + config.ground_probe_height, point.z);
    match terrain.cast(origin, -WORLD_UP, config.ground_probe_distance, filter) {
        Some(hit) => hit.point + WORLD_UP * config.foot_clearance,
        None => Vec3::new(point.x, reference_height, point.z),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::StaticTerrain;

    const DT: f32 = 1.0 / 60.0;

    fn snap_config() -> LocomotionConfig {
        LocomotionConfig::default().with_phase(0.0, 0.0)
    }

    fn floor() -> StaticTerrain {
        StaticTerrain::new().with_floor(0.0)
    }

    // ===== Swing Arc Tests =====

    #[test]
    fn swing_lift_is_zero_at_ends_and_peaks_mid_swing() {
        for step_height in [0.05, 0.3, 1.0, 7.5] {
            assert!(swing_lift(step_height, 0.0).abs() < 1e-6);
            assert!(swing_lift(step_height, 1.0).abs() < step_height * 1e-5);
            let peak = swing_lift(step_height, 0.5);
            assert!((peak - step_height).abs() <= step_height * 0.01);
        }
    }

    #[test]
    fn progress_restarts_each_half_cycle() {
        assert_eq!(half_cycle_progress(0.0), 0.0);
        assert!((half_cycle_progress(90.0) - 0.5).abs() < 1e-6);
        assert_eq!(half_cycle_progress(180.0), 0.0);
        assert!((half_cycle_progress(270.0) - 0.5).abs() < 1e-6);
        assert!(half_cycle_progress(359.9) < 1.0);
    }

    // ===== Initialization Tests =====

    #[test]
    fn feet_start_on_ground_beside_body() {
        let config = snap_config();
        let mut engine = GaitPhaseEngine::new();
        let body = Pose::from_position(Vec3::new(0.0, 0.0, 0.0));

        engine.tick(&config, None, &body, Vec3::ZERO, DT, &floor(), &RayFilter::new());

        let left = engine.foot(FootSide::Left);
        let right = engine.foot(FootSide::Right);
        assert!((left.position - Vec3::new(-0.2, 0.1, 0.0)).length() < 1e-5);
        assert!((right.position - Vec3::new(0.2, 0.1, 0.0)).length() < 1e-5);
        assert_eq!(left.step_start, left.position);
    }

    #[test]
    fn no_ground_falls_back_to_body_height() {
        let config = snap_config();
        let mut engine = GaitPhaseEngine::new();
        let body = Pose::from_position(Vec3::new(1.0, 3.0, 0.0));

        engine.tick(&config, None, &body, Vec3::ZERO, DT, &StaticTerrain::new(), &RayFilter::new());

        assert!((engine.foot(FootSide::Right).position - Vec3::new(1.2, 3.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn without_phase_both_feet_stay_planted() {
        let config = snap_config();
        let mut engine = GaitPhaseEngine::new();
        let mut body = Pose::default();
        let terrain = floor();

        engine.tick(&config, None, &body, Vec3::ZERO, DT, &terrain, &RayFilter::new());
        let start = *engine.feet();
        body.position.z -= 1.0;
        engine.tick(&config, None, &body, Vec3::NEG_Z, DT, &terrain, &RayFilter::new());

        assert_eq!(engine.angle(), None);
        assert_eq!(engine.swing_side(), None);
        assert_eq!(engine.feet().left.position, start.left.position);
        assert_eq!(engine.feet().right.position, start.right.position);
    }

    // ===== Phase Tests =====

    #[test]
    fn swing_side_follows_angle() {
        let config = snap_config();
        let mut engine = GaitPhaseEngine::new();
        let body = Pose::default();
        let terrain = floor();

        engine.tick(&config, Some(45.0), &body, Vec3::ZERO, DT, &terrain, &RayFilter::new());
        assert_eq!(engine.swing_side(), Some(FootSide::Right));

        engine.tick(&config, Some(200.0), &body, Vec3::ZERO, DT, &terrain, &RayFilter::new());
        assert_eq!(engine.swing_side(), Some(FootSide::Left));
    }

    #[test]
    fn angle_offset_is_applied_and_wrapped() {
        let config = LocomotionConfig::default().with_phase(90.0, 0.0);
        let mut engine = GaitPhaseEngine::new();

        engine.tick(&config, Some(300.0), &Pose::default(), Vec3::ZERO, DT, &floor(), &RayFilter::new());

        assert!((engine.angle().unwrap() - 30.0).abs() < 1e-4);
        assert_eq!(engine.swing_side(), Some(FootSide::Right));
    }

    #[test]
    fn smoothing_takes_shorter_path() {
        let config = LocomotionConfig::default().with_phase(0.0, 0.1);
        let mut engine = GaitPhaseEngine::new();
        let body = Pose::default();
        let terrain = floor();

        engine.tick(&config, Some(350.0), &body, Vec3::ZERO, DT, &terrain, &RayFilter::new());
        engine.tick(&config, Some(10.0), &body, Vec3::ZERO, DT, &terrain, &RayFilter::new());

        let angle = engine.angle().unwrap();
        // moved forward across 0, not backward through 180
        assert!(angle > 350.0 || angle < 10.0);
        assert!(angle != 350.0);
    }

    #[test]
    fn missing_phase_freezes_angle() {
        let config = LocomotionConfig::default().with_phase(0.0, 0.1);
        let mut engine = GaitPhaseEngine::new();
        let body = Pose::default();
        let terrain = floor();

        engine.tick(&config, Some(120.0), &body, Vec3::ZERO, DT, &terrain, &RayFilter::new());
        let frozen = engine.angle();
        for _ in 0..10 {
            engine.tick(&config, None, &body, Vec3::ZERO, DT, &terrain, &RayFilter::new());
        }

        assert_eq!(engine.angle(), frozen);
    }

    // ===== Anchor Tests =====

    #[test]
    fn anchor_locks_once_per_swing_entry() {
        let config = snap_config();
        let mut engine = GaitPhaseEngine::new();
        let body = Pose::default();
        let terrain = floor();

        engine.tick(&config, Some(10.0), &body, Vec3::ZERO, DT, &terrain, &RayFilter::new());
        assert_eq!(engine.swing_entries(FootSide::Right), 1);

        // staying inside the right half (even moving backward) never relocks
        for angle in [40.0, 20.0, 170.0, 5.0] {
            engine.tick(&config, Some(angle), &body, Vec3::ZERO, DT, &terrain, &RayFilter::new());
        }
        assert_eq!(engine.swing_entries(FootSide::Right), 1);
        assert_eq!(engine.swing_entries(FootSide::Left), 0);

        engine.tick(&config, Some(190.0), &body, Vec3::ZERO, DT, &terrain, &RayFilter::new());
        assert_eq!(engine.swing_entries(FootSide::Left), 1);
    }

    #[test]
    fn swing_counter_wraps() {
        let config = snap_config();
        let mut engine = GaitPhaseEngine::new();
        *engine.swing_entries.get_mut(FootSide::Right) = u32::MAX;

        engine.tick(&config, Some(10.0), &Pose::default(), Vec3::ZERO, DT, &floor(), &RayFilter::new());

        assert_eq!(engine.swing_entries(FootSide::Right), 0);
    }

    #[test]
    fn anchor_equals_position_at_transition() {
        let config = snap_config();
        let mut engine = GaitPhaseEngine::new();
        let mut body = Pose::default();
        let terrain = floor();

        engine.tick(&config, Some(0.0), &body, Vec3::NEG_Z, DT, &terrain, &RayFilter::new());
        body.position.z -= 0.4;
        engine.tick(&config, Some(170.0), &body, Vec3::NEG_Z, DT, &terrain, &RayFilter::new());
        let left_before = engine.foot(FootSide::Left).position;

        engine.tick(&config, Some(180.0), &body, Vec3::NEG_Z, DT, &terrain, &RayFilter::new());

        let left = engine.foot(FootSide::Left);
        assert_eq!(left.step_start, left_before);
        // t = 0 at swing start: no lift, no travel
        assert!((left.position - left_before).length() < 1e-5);
    }

    // ===== Swing Tests =====

    #[test]
    fn swing_reaches_predicted_landing() {
        let config = snap_config().with_stride_prediction(0.5);
        let mut engine = GaitPhaseEngine::new();
        let body = Pose::default();
        let velocity = Vec3::new(0.0, 0.0, -1.0);
        let terrain = floor();

        engine.tick(&config, Some(0.0), &body, velocity, DT, &terrain, &RayFilter::new());
        engine.tick(&config, Some(179.99), &body, velocity, DT, &terrain, &RayFilter::new());

        let landing = engine.predicted_landing(
            &config,
            FootSide::Right,
            &body,
            velocity,
            &terrain,
            &RayFilter::new(),
        );
        assert!((landing - Vec3::new(0.2, 0.1, -0.5)).length() < 1e-5);
        assert!((engine.foot(FootSide::Right).position - landing).length() < 1e-3);
    }

    #[test]
    fn mid_swing_is_lifted_by_step_height() {
        let config = snap_config().with_step(0.3, 0.5);
        let mut engine = GaitPhaseEngine::new();
        let body = Pose::default();
        let terrain = floor();

        engine.tick(&config, Some(0.0), &body, Vec3::ZERO, DT, &terrain, &RayFilter::new());
        engine.tick(&config, Some(90.0), &body, Vec3::ZERO, DT, &terrain, &RayFilter::new());

        let right = engine.foot(FootSide::Right);
        assert!((right.position.y - (0.1 + 0.3)).abs() < 1e-5);
    }

    #[test]
    fn stance_foot_follows_ground_height() {
        let config = snap_config();
        let mut engine = GaitPhaseEngine::new();
        let body = Pose::default();

        engine.tick(&config, Some(10.0), &body, Vec3::ZERO, DT, &floor(), &RayFilter::new());
        let left_x = engine.foot(FootSide::Left).position.x;

        let raised = StaticTerrain::new().with_floor(0.25);
        engine.tick(&config, Some(20.0), &body, Vec3::ZERO, DT, &raised, &RayFilter::new());

        let left = engine.foot(FootSide::Left);
        assert!((left.position.y - 0.35).abs() < 1e-5);
        assert_eq!(left.position.x, left_x);
    }

    #[test]
    fn knee_hints_sit_ahead_and_outside() {
        let config = snap_config();
        let mut engine = GaitPhaseEngine::new();

        engine.tick(&config, Some(0.0), &Pose::default(), Vec3::ZERO, DT, &floor(), &RayFilter::new());

        let left = engine.foot(FootSide::Left).knee_hint;
        let right = engine.foot(FootSide::Right).knee_hint;
        assert!(left.z < 0.0 && right.z < 0.0);
        assert!(left.x < 0.0 && right.x > 0.0);
    }
}
