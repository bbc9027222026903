//! State marker components.
//!
//! These markers mirror the pending vertical offset of a character's
//! [`LocomotionController`](crate::locomotion::LocomotionController). They are
//! added and removed by the locomotion systems each fixed tick.

use bevy::prelude::*;

use crate::control::DriveCommand;
use crate::geometry::{FootGoal, FootPair};

/// Marker component indicating the body is climbing onto a step.
///
/// This is a marker component - it has no data, just indicates state.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use msg_procedural_locomotion::prelude::*;
///
/// fn is_climbing(climbing: Option<&Climbing>) -> bool {
///     climbing.is_some()
/// }
/// ```
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Climbing;

/// Marker component indicating the body is dropping off a ledge.
///
/// Mutually exclusive with [`Climbing`].
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Descending;

/// Marker component indicating local input currently drives the character.
///
/// Added while the [`ControlMode`](crate::control::ControlMode) is local input,
/// or automatic with local input held.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct LocallyDriven;

/// Per-tick results handed from one locomotion stage to the next.
///
/// Written by the locomotion systems; read it to inspect what the last fixed
/// tick did.
#[derive(Component, Debug, Clone, Default)]
pub struct LocomotionFrame {
    /// Command the control mode produced.
    pub command: DriveCommand,
    /// World velocity applied to the body.
    pub velocity: Vec3,
    /// Foot goals after terrain correction.
    pub solved: FootPair<FootGoal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_starts_empty() {
        let frame = LocomotionFrame::default();
        assert_eq!(frame.command.phase, None);
        assert_eq!(frame.velocity, Vec3::ZERO);
        assert_eq!(frame.solved.left, FootGoal::default());
    }
}
