//! Standalone per-tick driver.
//!
//! [`LocomotionCharacter`] owns every piece of per-character state and runs
//! the stages in order: body locomotion, gait, foot placement, rig apply.
//! It is what the bevy systems do, packaged for use outside a schedule.

use bevy::prelude::*;

use crate::backend::{RayFilter, TerrainQuery};
use crate::config::{FootGoalSource, LocomotionConfig};
use crate::control::{ControlMode, DriveCommand};
use crate::foot_placement::FootPlacement;
use crate::gait::{FootState, GaitPhaseEngine};
use crate::geometry::{FootGoal, FootPair, FootSide, Pose, WORLD_UP};
use crate::intent::LocomotionIntent;
use crate::locomotion::{KinematicMover, LocomotionController};
use crate::phase::GaitPhaseSource;
use crate::rig::SkeletalRigPort;

/// Foot goals the solver should refine this tick.
pub fn incoming_goals<R: SkeletalRigPort + ?Sized>(
    config: &LocomotionConfig,
    gait: &FootPair<FootState>,
    rig: &R,
) -> FootPair<FootGoal> {
    match config.foot_goal_source {
        FootGoalSource::Gait => FootPair::from_fn(|side| gait.get(side).goal()),
        FootGoalSource::Animation => FootPair::from_fn(|side| rig.goal(side)),
    }
}

/// Write solved goals, knee hints and the hip offset to the rig.
pub fn apply_feet_to_rig<R: SkeletalRigPort + ?Sized>(
    config: &LocomotionConfig,
    solved: &FootPair<FootGoal>,
    gait: &FootPair<FootState>,
    rig: &mut R,
) {
    rig.begin_frame();
    for side in FootSide::ALL {
        let goal = solved.get(side);
        rig.set_goal(side, goal.position, goal.rotation, 1.0, 1.0);
        rig.set_hint(side, gait.get(side).knee_hint, 1.0);
    }
    if config.hip_height_offset != 0.0 {
        rig.adjust_body_offset(WORLD_UP * config.hip_height_offset);
    }
}

/// A character's complete locomotion state.
#[derive(Debug, Clone)]
pub struct LocomotionCharacter {
    config: LocomotionConfig,
    mode: ControlMode,
    filter: RayFilter,
    controller: LocomotionController,
    gait: GaitPhaseEngine,
    feet: FootPlacement,
    last_command: DriveCommand,
}

impl LocomotionCharacter {
    /// Create a character in automatic control mode.
    pub fn new(config: LocomotionConfig) -> Self {
        Self {
            config,
            mode: ControlMode::default(),
            filter: RayFilter::default(),
            controller: LocomotionController::new(),
            gait: GaitPhaseEngine::new(),
            feet: FootPlacement::new(),
            last_command: DriveCommand::default(),
        }
    }

    /// Builder: set the control mode.
    pub fn with_mode(mut self, mode: ControlMode) -> Self {
        self.mode = mode;
        self
    }

    /// Builder: set the ray filter used for every terrain query.
    pub fn with_filter(mut self, filter: RayFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &LocomotionConfig {
        &self.config
    }

    /// Active control mode.
    pub fn mode(&self) -> &ControlMode {
        &self.mode
    }

    /// Body locomotion state.
    pub fn controller(&self) -> &LocomotionController {
        &self.controller
    }

    /// Gait state.
    pub fn gait(&self) -> &GaitPhaseEngine {
        &self.gait
    }

    /// Foot solvers.
    pub fn feet(&self) -> &FootPlacement {
        &self.feet
    }

    /// Command produced on the last [`step`](Self::step).
    pub fn last_command(&self) -> &DriveCommand {
        &self.last_command
    }

    /// Turn and move the body. Returns the applied world velocity.
    pub fn advance_locomotion<T, M>(
        &mut self,
        command: &DriveCommand,
        dt: f32,
        terrain: &T,
        mover: &mut M,
    ) -> Vec3
    where
        T: TerrainQuery + ?Sized,
        M: KinematicMover + ?Sized,
    {
        self.controller.turn(&self.config, command.turn, dt, mover);
        self.controller.tick(
            &self.config,
            command.velocity_request,
            dt,
            terrain,
            &self.filter,
            mover,
        )
    }

    /// Advance the gait phase and compute raw foot targets.
    pub fn advance_gait<T: TerrainQuery + ?Sized>(
        &mut self,
        phase: Option<f32>,
        body: &Pose,
        body_velocity: Vec3,
        dt: f32,
        terrain: &T,
    ) -> &FootPair<FootState> {
        self.gait.tick(
            &self.config,
            phase,
            body,
            body_velocity,
            dt,
            terrain,
            &self.filter,
        )
    }

    /// Correct foot goals against the terrain.
    pub fn solve_feet<T: TerrainQuery + ?Sized>(
        &mut self,
        goals: &FootPair<FootGoal>,
        body: &Pose,
        dt: f32,
        terrain: &T,
    ) -> FootPair<FootGoal> {
        self.feet
            .solve(&self.config, goals, body, dt, terrain, &self.filter)
    }

    /// Push solved goals and knee hints to the rig.
    pub fn apply_to_rig<R: SkeletalRigPort + ?Sized>(&self, solved: &FootPair<FootGoal>, rig: &mut R) {
        apply_feet_to_rig(&self.config, solved, self.gait.feet(), rig);
    }

    /// Run one full tick.
    ///
    /// Returns the foot goals written to the rig.
    pub fn step<S, T, M, R>(
        &mut self,
        intent: &LocomotionIntent,
        signal: &S,
        dt: f32,
        terrain: &T,
        mover: &mut M,
        rig: &mut R,
    ) -> FootPair<FootGoal>
    where
        S: GaitPhaseSource,
        T: TerrainQuery + ?Sized,
        M: KinematicMover + ?Sized,
        R: SkeletalRigPort + ?Sized,
    {
        let before = mover.pose();
        let command = self.mode.drive(&self.config, intent, signal, &before, dt);
        self.last_command = command;

        let velocity = self.advance_locomotion(&command, dt, terrain, mover);
        let body = mover.pose();
        self.advance_gait(command.phase, &body, velocity, dt, terrain);

        let goals = incoming_goals(&self.config, self.gait.feet(), &*rig);
        let solved = self.solve_feet(&goals, &body, dt, terrain);
        self.apply_to_rig(&solved, rig);
        solved
    }
}
