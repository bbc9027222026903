//! Shared pose and math helpers.
//!
//! Conventions follow bevy: world up is `+Y`, a body's forward is its local
//! `-Z` and its right is local `+X`.

use bevy::prelude::*;

/// World up direction used by every terrain probe.
pub const WORLD_UP: Vec3 = Vec3::Y;

/// Position and orientation of a character root.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// World-space position of the root (at the feet).
    pub position: Vec3,
    /// World-space orientation (unit quaternion).
    pub orientation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
        }
    }
}

impl Pose {
    /// Create a pose.
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Create an unrotated pose at `position`.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..default()
        }
    }

    /// Body forward direction (local `-Z`).
    #[inline]
    pub fn forward(&self) -> Vec3 {
        self.orientation * Vec3::NEG_Z
    }

    /// Body right direction (local `+X`).
    #[inline]
    pub fn right(&self) -> Vec3 {
        self.orientation * Vec3::X
    }

    /// Forward direction flattened onto the ground plane.
    ///
    /// Falls back to world `-Z` when the body faces straight up or down.
    pub fn planar_forward(&self) -> Vec3 {
        let flat = project_on_plane(self.forward(), WORLD_UP).normalize_or_zero();
        if flat == Vec3::ZERO {
            Vec3::NEG_Z
        } else {
            flat
        }
    }

    /// Convert a body-local vector into world space.
    #[inline]
    pub fn to_world(&self, local: Vec3) -> Vec3 {
        self.orientation * local
    }
}

impl From<&Transform> for Pose {
    fn from(transform: &Transform) -> Self {
        Self {
            position: transform.translation,
            orientation: transform.rotation,
        }
    }
}

impl From<Transform> for Pose {
    fn from(transform: Transform) -> Self {
        Self::from(&transform)
    }
}

/// Which foot (or which leg is swinging).
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FootSide {
    /// Left foot.
    Left,
    /// Right foot.
    Right,
}

impl FootSide {
    /// Both sides, left first.
    pub const ALL: [FootSide; 2] = [FootSide::Left, FootSide::Right];

    /// Swing side for a gait phase angle.
    ///
    /// The right leg swings in `[0, 180)`, the left leg in `[180, 360)`.
    /// The angle is wrapped first, so any finite value is accepted.
    pub fn swing_at(angle_deg: f32) -> Self {
        if wrap_degrees(angle_deg) < 180.0 {
            FootSide::Right
        } else {
            FootSide::Left
        }
    }

    /// The opposite foot.
    pub fn other(self) -> Self {
        match self {
            FootSide::Left => FootSide::Right,
            FootSide::Right => FootSide::Left,
        }
    }

    /// `+1` for the right foot, `-1` for the left foot.
    ///
    /// Multiplying the body's right vector by this gives the outward lateral
    /// direction of the foot.
    pub fn sign(self) -> f32 {
        match self {
            FootSide::Left => -1.0,
            FootSide::Right => 1.0,
        }
    }
}

/// One value per foot.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Default)]
pub struct FootPair<T> {
    /// Left foot value.
    pub left: T,
    /// Right foot value.
    pub right: T,
}

impl<T> FootPair<T> {
    /// Create a pair.
    pub fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    /// Borrow the value for `side`.
    pub fn get(&self, side: FootSide) -> &T {
        match side {
            FootSide::Left => &self.left,
            FootSide::Right => &self.right,
        }
    }

    /// Mutably borrow the value for `side`.
    pub fn get_mut(&mut self, side: FootSide) -> &mut T {
        match side {
            FootSide::Left => &mut self.left,
            FootSide::Right => &mut self.right,
        }
    }

    /// Build a pair by evaluating `f` for each side.
    pub fn from_fn(mut f: impl FnMut(FootSide) -> T) -> Self {
        Self {
            left: f(FootSide::Left),
            right: f(FootSide::Right),
        }
    }
}

/// A foot IK goal: where the sole should be and how it should be oriented.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct FootGoal {
    /// World-space position of the foot.
    pub position: Vec3,
    /// World-space rotation of the foot.
    pub rotation: Quat,
}

impl Default for FootGoal {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl FootGoal {
    /// Create a goal.
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }
}

/// Wrap an angle in degrees into `[0, 360)`.
pub fn wrap_degrees(angle_deg: f32) -> f32 {
    let wrapped = angle_deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Signed shortest angular difference `to - from` in degrees, in `(-180, 180]`.
pub fn delta_angle(from_deg: f32, to_deg: f32) -> f32 {
    let delta = wrap_degrees(to_deg - from_deg);
    if delta > 180.0 {
        delta - 360.0
    } else {
        delta
    }
}

/// Blend factor for exponential smoothing at `rate` per second over `dt`.
///
/// Always in `[0, 1)`: a finite rate never snaps to the target in one tick.
/// Returns 0 for non-positive rates or timesteps.
pub fn exp_blend(rate: f32, dt: f32) -> f32 {
    if rate <= 0.0 || dt <= 0.0 {
        return 0.0;
    }
    1.0 - (-rate * dt).exp()
}

/// Remove the component of `v` along `normal`.
pub fn project_on_plane(v: Vec3, normal: Vec3) -> Vec3 {
    let n = normal.normalize_or_zero();
    v - n * v.dot(n)
}

/// Distance between two points ignoring the `up` component.
pub fn planar_distance(a: Vec3, b: Vec3, up: Vec3) -> f32 {
    project_on_plane(a - b, up).length()
}

/// Rotation whose forward (local `-Z`) points along `forward` with local `+Y`
/// as close to `up` as possible.
///
/// Returns `None` when `forward` is zero or parallel to `up`.
pub fn look_rotation(forward: Vec3, up: Vec3) -> Option<Quat> {
    let f = forward.normalize_or_zero();
    let right = f.cross(up).normalize_or_zero();
    if f == Vec3::ZERO || right == Vec3::ZERO {
        return None;
    }
    let true_up = right.cross(f);
    Some(Quat::from_mat3(&Mat3::from_cols(right, true_up, -f)).normalize())
}

/// Critically damped approach of `current` toward `target`.
///
/// `velocity` carries the rate of change between calls. Never overshoots.
pub fn smooth_damp(current: f32, target: f32, velocity: &mut f32, smooth_time: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        return current;
    }
    let smooth_time = smooth_time.max(1e-4);
    let omega = 2.0 / smooth_time;
    let x = omega * dt;
    let decay = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);

    let change = current - target;
    let temp = (*velocity + omega * change) * dt;
    *velocity = (*velocity - omega * temp) * decay;
    let mut output = target + (change + temp) * decay;

    if (target - current > 0.0) == (output > target) {
        output = target;
        *velocity = 0.0;
    }
    output
}
