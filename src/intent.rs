//! Local movement intent.
//!
//! Player input or AI writes a [`LocomotionIntent`] every frame. The
//! locomotion systems read it during the fixed tick and it is cleared
//! afterwards, so an intent that is not rewritten stops the character.

use bevy::prelude::*;

/// Intents below this magnitude count as released.
const INTENT_EPSILON: f32 = 1e-3;

/// Desired body motion from local input.
///
/// # Example
///
/// ```rust
/// use bevy::prelude::*;
/// use msg_procedural_locomotion::prelude::*;
///
/// let mut intent = LocomotionIntent::new();
/// intent.set_forward(1.0);
/// assert!(intent.is_moving());
/// assert_eq!(intent.local_request(), Vec3::NEG_Z);
///
/// intent.clear();
/// assert!(!intent.is_active());
/// ```
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq)]
#[reflect(Component)]
pub struct LocomotionIntent {
    /// Forward/backward input (-1.0 = backward, 1.0 = forward).
    pub forward: f32,
    /// Sideways input (-1.0 = left, 1.0 = right).
    pub strafe: f32,
    /// Yaw input (-1.0 = turn left, 1.0 = turn right).
    pub turn: f32,
}

impl LocomotionIntent {
    /// Create an empty intent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the forward input.
    pub fn set_forward(&mut self, value: f32) {
        self.forward = value.clamp(-1.0, 1.0);
    }

    /// Set the sideways input.
    pub fn set_strafe(&mut self, value: f32) {
        self.strafe = value.clamp(-1.0, 1.0);
    }

    /// Set the yaw input.
    pub fn set_turn(&mut self, value: f32) {
        self.turn = value.clamp(-1.0, 1.0);
    }

    /// Clear all inputs.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Whether translation is requested.
    pub fn is_moving(&self) -> bool {
        self.forward.abs() > INTENT_EPSILON || self.strafe.abs() > INTENT_EPSILON
    }

    /// Whether any input is held.
    pub fn is_active(&self) -> bool {
        self.is_moving() || self.turn.abs() > INTENT_EPSILON
    }

    /// Whether the forward input points backward.
    pub fn is_backward(&self) -> bool {
        self.forward < -INTENT_EPSILON
    }

    /// Velocity request in body space (`-Z` forward, `+X` right).
    pub fn local_request(&self) -> Vec3 {
        Vec3::new(self.strafe, 0.0, -self.forward)
    }
}
