//! Spawn bundle for locomotion characters.

use bevy::prelude::*;

use crate::config::LocomotionConfig;
use crate::control::ControlMode;
use crate::foot_placement::FootPlacement;
use crate::gait::GaitPhaseEngine;
use crate::intent::LocomotionIntent;
use crate::locomotion::LocomotionController;
use crate::rig::RigTargets;
use crate::state::LocomotionFrame;

/// Every component the locomotion systems need on a character.
///
/// Add a `Transform` alongside it. Add a
/// [`PhaseSignal`](crate::phase::PhaseSignal) to feed an external gait signal
/// and a [`RayGroups`](crate::backend::RayGroups) to filter terrain rays.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use msg_procedural_locomotion::prelude::*;
///
/// fn spawn_walker(mut commands: Commands) {
///     commands.spawn((
///         Transform::from_xyz(0.0, 0.0, 0.0),
///         LocomotionBundle::new(LocomotionConfig::walking())
///             .with_mode(ControlMode::local_input()),
///     ));
/// }
/// ```
#[derive(Bundle, Default)]
pub struct LocomotionBundle {
    /// Tunables.
    pub config: LocomotionConfig,
    /// Who drives the character.
    pub mode: ControlMode,
    /// Local input, cleared after every fixed tick.
    pub intent: LocomotionIntent,
    /// Body motion and ledge handling.
    pub controller: LocomotionController,
    /// Gait phase and raw foot targets.
    pub gait: GaitPhaseEngine,
    /// Terrain-aware foot solvers.
    pub feet: FootPlacement,
    /// IK targets for the animation rig.
    pub rig: RigTargets,
    /// Stage outputs of the last tick.
    pub frame: LocomotionFrame,
}

impl LocomotionBundle {
    /// Create a bundle with the given configuration in automatic control.
    pub fn new(config: LocomotionConfig) -> Self {
        Self {
            config,
            ..default()
        }
    }

    /// Builder: set the control mode.
    pub fn with_mode(mut self, mode: ControlMode) -> Self {
        self.mode = mode;
        self
    }

    /// Builder: seed the animation-authored foot goals.
    pub fn with_rig(mut self, rig: RigTargets) -> Self {
        self.rig = rig;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_spawns_every_stage_component() {
        let mut world = World::new();
        let entity = world
            .spawn((
                Transform::default(),
                LocomotionBundle::new(LocomotionConfig::pedaling())
                    .with_mode(ControlMode::external_signal()),
            ))
            .id();

        assert!(world.get::<LocomotionController>(entity).is_some());
        assert!(world.get::<GaitPhaseEngine>(entity).is_some());
        assert!(world.get::<FootPlacement>(entity).is_some());
        assert!(world.get::<RigTargets>(entity).is_some());
        assert!(world.get::<LocomotionFrame>(entity).is_some());
        assert_eq!(
            world.get::<ControlMode>(entity),
            Some(&ControlMode::external_signal())
        );
        assert_eq!(
            world.get::<LocomotionConfig>(entity),
            Some(&LocomotionConfig::pedaling())
        );
    }
}
