//! # `msg_procedural_locomotion`
//!
//! Procedural bipedal locomotion and adaptive foot placement for kinematic
//! characters, with a physics backend abstraction.
//!
//! This crate moves a character body over uneven terrain and drives its feet:
//! - Moves a kinematic body from local input or an external gait signal
//! - Climbs steps and drops off ledges with a smoothed vertical offset
//! - Alternates swing and stance feet from a gait phase angle
//! - Predicts where the swing foot lands from the body velocity
//! - Lifts and nudges feet over edges, slopes and risers before IK
//! - Abstracts the physics backend for ray casts (Rapier3D included)
//!
//! ## Architecture
//!
//! Each fixed tick runs four stages in order:
//! 1. **Locomotion** resolves the control mode, turns the body and moves it
//! 2. **Gait** advances the phase angle and places the raw foot targets
//! 3. **Foot placement** corrects the foot goals against the terrain
//! 4. **Rig apply** writes IK goals, knee hints and the hip offset
//!
//! The same stages run outside bevy schedules through
//! [`LocomotionCharacter`](character::LocomotionCharacter).
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use msg_procedural_locomotion::prelude::*;
//!
//! let terrain = StaticTerrain::new().with_floor(0.0);
//! let mut character = LocomotionCharacter::new(LocomotionConfig::walking())
//!     .with_mode(ControlMode::local_input());
//! let mut body = Pose::default();
//! let mut rig = RigTargets::new();
//!
//! let mut intent = LocomotionIntent::new();
//! intent.set_forward(1.0);
//! character.step(&intent, &PhaseSnapshot::default(), 1.0 / 60.0, &terrain, &mut body, &mut rig);
//!
//! assert!(body.position.z < 0.0);
//! ```

use bevy::prelude::*;

pub mod backend;
pub mod bundle;
pub mod character;
pub mod collision;
pub mod config;
pub mod control;
pub mod error;
pub mod foot_placement;
pub mod gait;
pub mod geometry;
pub mod intent;
pub mod locomotion;
pub mod phase;
pub mod rig;
pub mod state;
pub mod systems;
pub mod terrain;

#[cfg(feature = "rapier3d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::backend::{LocomotionBackend, RayFilter, RayGroups, TerrainQuery};
    pub use crate::bundle::LocomotionBundle;
    pub use crate::character::LocomotionCharacter;
    pub use crate::collision::TerrainHit;
    pub use crate::config::{FootGoalSource, LocomotionConfig};
    pub use crate::control::{ControlMode, DriveCommand};
    pub use crate::error::{LocomotionError, Result};
    pub use crate::foot_placement::{FootPlacement, LiftReason};
    pub use crate::gait::GaitPhaseEngine;
    pub use crate::geometry::{FootGoal, FootPair, FootSide, Pose};
    pub use crate::intent::LocomotionIntent;
    pub use crate::locomotion::{KinematicMover, LocomotionController};
    pub use crate::phase::{GaitPhaseSource, PhaseMailbox, PhaseSample, PhaseSignal, PhaseSnapshot};
    pub use crate::rig::{RigTargets, SkeletalRigPort};
    pub use crate::state::{Climbing, Descending, LocallyDriven, LocomotionFrame};
    pub use crate::terrain::{StaticTerrain, StaticTerrainBackend};
    pub use crate::{LocomotionPlugin, LocomotionSet};

    #[cfg(feature = "rapier3d")]
    pub use crate::rapier::{Rapier3dBackend, Rapier3dCharacterBundle};
}

/// Ordered stages of a locomotion tick, run in `FixedUpdate`.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocomotionSet {
    /// Poll external signals.
    Input,
    /// Resolve control and move the body.
    Locomotion,
    /// Advance the gait phase.
    Gait,
    /// Correct foot goals against the terrain.
    FootPlacement,
    /// Write IK targets and sync state markers.
    RigApply,
}

/// Main plugin for the locomotion system.
///
/// This plugin is generic over a physics backend `B` which provides the ray
/// casts the stages need.
///
/// # Type Parameters
/// - `B`: The physics backend implementation (e.g., `Rapier3dBackend`)
///
/// # Examples
///
/// With Rapier3D backend:
/// ```rust,ignore
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use msg_procedural_locomotion::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
///     .add_plugins(LocomotionPlugin::<Rapier3dBackend>::default())
///     .run();
/// ```
///
/// Headless, against analytic terrain:
/// ```rust
/// use bevy::prelude::*;
/// use msg_procedural_locomotion::prelude::*;
///
/// let mut app = App::new();
/// app.add_plugins(MinimalPlugins)
///     .add_plugins(LocomotionPlugin::<StaticTerrainBackend>::default())
///     .insert_resource(StaticTerrain::new().with_floor(0.0));
/// ```
pub struct LocomotionPlugin<B: backend::LocomotionBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::LocomotionBackend> Default for LocomotionPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::LocomotionBackend> Plugin for LocomotionPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<config::LocomotionConfig>();
        app.register_type::<config::FootGoalSource>();
        app.register_type::<control::ControlMode>();
        app.register_type::<intent::LocomotionIntent>();
        app.register_type::<locomotion::LocomotionController>();
        app.register_type::<gait::GaitPhaseEngine>();
        app.register_type::<foot_placement::FootPlacement>();
        app.register_type::<rig::RigTargets>();
        app.register_type::<backend::RayGroups>();
        app.register_type::<state::Climbing>();
        app.register_type::<state::Descending>();
        app.register_type::<state::LocallyDriven>();

        // Add the physics backend plugin
        app.add_plugins(B::plugin());

        app.configure_sets(
            FixedUpdate,
            (
                LocomotionSet::Input,
                LocomotionSet::Locomotion,
                LocomotionSet::Gait,
                LocomotionSet::FootPlacement,
                LocomotionSet::RigApply,
            )
                .chain(),
        );

        app.add_systems(
            FixedUpdate,
            (
                systems::poll_phase_signals.in_set(LocomotionSet::Input),
                systems::drive_locomotion::<B>.in_set(LocomotionSet::Locomotion),
                systems::advance_gait::<B>.in_set(LocomotionSet::Gait),
                systems::solve_feet::<B>.in_set(LocomotionSet::FootPlacement),
                (systems::apply_to_rig, systems::sync_state_markers)
                    .chain()
                    .in_set(LocomotionSet::RigApply),
            ),
        );

        // Local intents hold for one tick
        app.add_systems(FixedPostUpdate, systems::reset_intents);
    }
}
