//! Locomotion systems.
//!
//! One system per stage, run in the chained [`LocomotionSet`](crate::LocomotionSet)s
//! during `FixedUpdate`. Systems that cast rays are generic over the backend
//! and receive its terrain access as a system parameter.

use bevy::ecs::system::StaticSystemParam;
use bevy::prelude::*;

use crate::backend::{BackendTerrain, LocomotionBackend, RayGroups};
use crate::character::{apply_feet_to_rig, incoming_goals};
use crate::config::LocomotionConfig;
use crate::control::ControlMode;
use crate::foot_placement::FootPlacement;
use crate::gait::GaitPhaseEngine;
use crate::geometry::Pose;
use crate::intent::LocomotionIntent;
use crate::locomotion::LocomotionController;
use crate::phase::{PhaseSignal, PhaseSnapshot};
use crate::rig::RigTargets;
use crate::state::{Climbing, Descending, LocallyDriven, LocomotionFrame};

/// Fixed timestep length, falling back to 60 Hz when the clock has not ticked.
pub fn fixed_dt(time: Option<&Time<Fixed>>) -> f32 {
    time.map(|t| t.delta_secs())
        .filter(|&d| d > 0.0)
        .unwrap_or(1.0 / 60.0)
}

/// Take this tick's snapshot of every external phase signal.
pub fn poll_phase_signals(mut q_signals: Query<&mut PhaseSignal>) {
    for mut signal in &mut q_signals {
        signal.poll();
    }
}

/// Resolve control, turn the body and move it over the terrain.
pub fn drive_locomotion<B: LocomotionBackend>(
    terrain: StaticSystemParam<B::Terrain>,
    time: Option<Res<Time<Fixed>>>,
    mut q_characters: Query<(
        Entity,
        &mut Transform,
        &LocomotionConfig,
        &mut ControlMode,
        &mut LocomotionController,
        &mut LocomotionFrame,
        Option<&LocomotionIntent>,
        Option<&PhaseSignal>,
        Option<&RayGroups>,
    )>,
) {
    let dt = fixed_dt(time.as_deref());
    let terrain = BackendTerrain::<B>::new(&*terrain);

    for (entity, mut transform, config, mut mode, mut controller, mut frame, intent, signal, groups) in
        &mut q_characters
    {
        let intent = intent.copied().unwrap_or_default();
        let signal = signal.map_or_else(PhaseSnapshot::default, PhaseSignal::snapshot);
        let filter = RayGroups::filter_for(groups, entity);

        let body = Pose::from(&*transform);
        let command = mode.drive(config, &intent, &signal, &body, dt);

        controller.turn(config, command.turn, dt, &mut *transform);
        let velocity = controller.tick(
            config,
            command.velocity_request,
            dt,
            &terrain,
            &filter,
            &mut *transform,
        );

        frame.command = command;
        frame.velocity = velocity;
    }
}

/// Advance the gait phase and place the raw foot targets.
pub fn advance_gait<B: LocomotionBackend>(
    terrain: StaticSystemParam<B::Terrain>,
    time: Option<Res<Time<Fixed>>>,
    mut q_characters: Query<(
        Entity,
        &Transform,
        &LocomotionConfig,
        &LocomotionFrame,
        &mut GaitPhaseEngine,
        Option<&RayGroups>,
    )>,
) {
    let dt = fixed_dt(time.as_deref());
    let terrain = BackendTerrain::<B>::new(&*terrain);

    for (entity, transform, config, frame, mut gait, groups) in &mut q_characters {
        let filter = RayGroups::filter_for(groups, entity);
        gait.tick(
            config,
            frame.command.phase,
            &Pose::from(transform),
            frame.velocity,
            dt,
            &terrain,
            &filter,
        );
    }
}

/// Correct the incoming foot goals against the terrain.
pub fn solve_feet<B: LocomotionBackend>(
    terrain: StaticSystemParam<B::Terrain>,
    time: Option<Res<Time<Fixed>>>,
    mut q_characters: Query<(
        Entity,
        &Transform,
        &LocomotionConfig,
        &GaitPhaseEngine,
        &RigTargets,
        &mut FootPlacement,
        &mut LocomotionFrame,
        Option<&RayGroups>,
    )>,
) {
    let dt = fixed_dt(time.as_deref());
    let terrain = BackendTerrain::<B>::new(&*terrain);

    for (entity, transform, config, gait, rig, mut feet, mut frame, groups) in &mut q_characters {
        let filter = RayGroups::filter_for(groups, entity);
        let goals = incoming_goals(config, gait.feet(), rig);
        frame.solved = feet.solve(
            config,
            &goals,
            &Pose::from(transform),
            dt,
            &terrain,
            &filter,
        );
    }
}

/// Write solved goals, knee hints and the hip offset to the rig targets.
pub fn apply_to_rig(
    mut q_characters: Query<(
        &LocomotionConfig,
        &LocomotionFrame,
        &GaitPhaseEngine,
        &mut RigTargets,
    )>,
) {
    for (config, frame, gait, mut rig) in &mut q_characters {
        apply_feet_to_rig(config, &frame.solved, gait.feet(), &mut *rig);
    }
}

/// Sync state marker components with the controller and control mode.
pub fn sync_state_markers(
    mut commands: Commands,
    q_characters: Query<(
        Entity,
        &LocomotionController,
        Option<&ControlMode>,
        Has<Climbing>,
        Has<Descending>,
        Has<LocallyDriven>,
    )>,
) {
    for (entity, controller, mode, has_climbing, has_descending, has_local) in &q_characters {
        let climbing = controller.is_climbing();
        let descending = controller.is_descending();

        if climbing && !has_climbing {
            commands.entity(entity).insert(Climbing);
        } else if !climbing && has_climbing {
            commands.entity(entity).remove::<Climbing>();
        }

        if descending && !has_descending {
            commands.entity(entity).insert(Descending);
        } else if !descending && has_descending {
            commands.entity(entity).remove::<Descending>();
        }

        let local = mode.is_some_and(ControlMode::is_local);
        if local && !has_local {
            commands.entity(entity).insert(LocallyDriven);
        } else if !local && has_local {
            commands.entity(entity).remove::<LocallyDriven>();
        }
    }
}

/// Clear local intents at the end of each fixed tick.
pub fn reset_intents(mut q_intents: Query<&mut LocomotionIntent>) {
    for mut intent in &mut q_intents {
        if intent.is_active() {
            intent.clear();
        }
    }
}
