//! Skeletal rig interface.
//!
//! The locomotion core never touches bones directly. It reads the animation's
//! foot goals and writes IK goals, knee hints and a body offset through
//! [`SkeletalRigPort`]. [`RigTargets`] is a plain component implementation
//! that an animation or IK layer can read each frame.

use bevy::prelude::*;

use crate::geometry::{FootGoal, FootPair, FootSide};

/// Access to a skeletal rig's foot IK goals.
pub trait SkeletalRigPort {
    /// Foot goal authored by the current animation.
    fn goal(&self, side: FootSide) -> FootGoal;

    /// Set the IK goal for a foot.
    fn set_goal(
        &mut self,
        side: FootSide,
        position: Vec3,
        rotation: Quat,
        position_weight: f32,
        rotation_weight: f32,
    );

    /// Set the knee hint for a foot.
    fn set_hint(&mut self, side: FootSide, position: Vec3, weight: f32);

    /// Offset the body (hips) for this frame.
    fn adjust_body_offset(&mut self, delta: Vec3);

    /// Called once per tick before any goal is written.
    fn begin_frame(&mut self) {}
}

/// IK output for one foot.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct FootIkTarget {
    /// Goal position.
    pub position: Vec3,
    /// Goal rotation.
    pub rotation: Quat,
    /// Blend weight of the position goal.
    pub position_weight: f32,
    /// Blend weight of the rotation goal.
    pub rotation_weight: f32,
    /// Knee hint position.
    pub hint: Vec3,
    /// Blend weight of the knee hint.
    pub hint_weight: f32,
}

impl Default for FootIkTarget {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            position_weight: 0.0,
            rotation_weight: 0.0,
            hint: Vec3::ZERO,
            hint_weight: 0.0,
        }
    }
}

/// Rig port stored on the character entity.
///
/// The animation layer writes `animation` goals; the locomotion systems write
/// `feet` and `body_offset`.
#[derive(Component, Reflect, Debug, Clone, Default, PartialEq)]
#[reflect(Component)]
pub struct RigTargets {
    /// Goals authored by the animation.
    pub animation: FootPair<FootGoal>,
    /// IK output per foot.
    pub feet: FootPair<FootIkTarget>,
    /// Body offset accumulated this frame.
    pub body_offset: Vec3,
}

impl RigTargets {
    /// Create empty rig targets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the animation goals.
    pub fn with_animation(mut self, left: FootGoal, right: FootGoal) -> Self {
        self.animation = FootPair::new(left, right);
        self
    }

    /// Set the animation goal for one foot.
    pub fn set_animation_goal(&mut self, side: FootSide, goal: FootGoal) {
        *self.animation.get_mut(side) = goal;
    }

    /// IK output for one foot.
    pub fn foot(&self, side: FootSide) -> &FootIkTarget {
        self.feet.get(side)
    }
}

impl SkeletalRigPort for RigTargets {
    fn goal(&self, side: FootSide) -> FootGoal {
        *self.animation.get(side)
    }

    fn set_goal(
        &mut self,
        side: FootSide,
        position: Vec3,
        rotation: Quat,
        position_weight: f32,
        rotation_weight: f32,
    ) {
        let foot = self.feet.get_mut(side);
        foot.position = position;
        foot.rotation = rotation;
        foot.position_weight = position_weight.clamp(0.0, 1.0);
        foot.rotation_weight = rotation_weight.clamp(0.0, 1.0);
    }

    fn set_hint(&mut self, side: FootSide, position: Vec3, weight: f32) {
        let foot = self.feet.get_mut(side);
        foot.hint = position;
        foot.hint_weight = weight.clamp(0.0, 1.0);
    }

    fn adjust_body_offset(&mut self, delta: Vec3) {
        self.body_offset += delta;
    }

    fn begin_frame(&mut self) {
        self.body_offset = Vec3::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_reads_animation() {
        let left = FootGoal::new(Vec3::new(-0.2, 0.0, 0.0), Quat::IDENTITY);
        let right = FootGoal::new(Vec3::new(0.2, 0.1, -0.3), Quat::IDENTITY);
        let rig = RigTargets::new().with_animation(left, right);

        assert_eq!(rig.goal(FootSide::Left), left);
        assert_eq!(rig.goal(FootSide::Right), right);
    }

    #[test]
    fn set_goal_clamps_weights() {
        let mut rig = RigTargets::new();
        rig.set_goal(FootSide::Right, Vec3::ONE, Quat::IDENTITY, 2.0, -1.0);

        let foot = rig.foot(FootSide::Right);
        assert_eq!(foot.position, Vec3::ONE);
        assert_eq!(foot.position_weight, 1.0);
        assert_eq!(foot.rotation_weight, 0.0);
        assert_eq!(rig.foot(FootSide::Left).position_weight, 0.0);
    }

    #[test]
    fn hint_is_per_foot() {
        let mut rig = RigTargets::new();
        rig.set_hint(FootSide::Left, Vec3::new(-0.2, 0.5, -1.0), 1.0);

        assert_eq!(rig.foot(FootSide::Left).hint_weight, 1.0);
        assert_eq!(rig.foot(FootSide::Right).hint_weight, 0.0);
    }

    #[test]
    fn body_offset_accumulates_within_frame() {
        let mut rig = RigTargets::new();
        rig.adjust_body_offset(Vec3::Y * 0.1);
        rig.adjust_body_offset(Vec3::Y * 0.05);
        assert!((rig.body_offset.y - 0.15).abs() < 1e-6);

        rig.begin_frame();
        assert_eq!(rig.body_offset, Vec3::ZERO);
    }
}
