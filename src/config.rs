//! Locomotion configuration.
//!
//! A single flat [`LocomotionConfig`] component holds every tunable used by
//! the locomotion controller, the gait engine and the foot solver. Configs can
//! be built in code from presets and `with_*` builders, or loaded from TOML.
//! Missing TOML keys fall back to the defaults.

use std::path::Path;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{LocomotionError, Result};

/// Where the foot solver takes its incoming foot goals from.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FootGoalSource {
    /// Refine the procedural targets produced by the gait engine.
    #[default]
    Gait,
    /// Refine the animation-authored goals currently held by the rig.
    Animation,
}

/// Tunables for one character.
///
/// Distances are in meters, angles in degrees, rates per second.
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[reflect(Component)]
#[serde(default)]
pub struct LocomotionConfig {
    // === Movement ===
    /// Body speed for a unit velocity request.
    pub speed: f32,
    /// Yaw rate for a unit turn request (degrees/second).
    pub turn_speed: f32,
    /// Negate turn input.
    pub invert_turn: bool,

    // === Step Up / Step Down ===
    /// Tallest obstacle the body climbs, also the swing-arc height.
    pub step_height: f32,
    /// Reach of the horizontal step-up rays.
    pub step_check_distance: f32,
    /// Height of the lowest step-up ray above the feet.
    pub foot_ray_height: f32,
    /// Extra height of the clearance ray above `step_height`.
    pub step_clearance_margin: f32,
    /// Minimum angle (from up) for a surface to count as a riser rather than a ramp.
    pub riser_min_angle: f32,
    /// Rate at which a pending vertical offset is applied.
    pub climb_smoothing: f32,
    /// A new step-up is only detected while the pending offset is at or below this.
    pub climb_start_threshold: f32,
    /// A new step-down is only detected while the pending offset is at or below this.
    pub descend_start_threshold: f32,
    /// Height above the feet the step-down ray starts from.
    pub step_down_probe_height: f32,
    /// Drops shorter than this are ignored.
    pub step_down_min_drop: f32,
    /// Deepest detected drop, as a multiple of `step_height`.
    pub step_down_reach: f32,
    /// Height above the feet the slope ray starts from.
    pub slope_probe_height: f32,
    /// Reach of the slope ray.
    pub slope_probe_distance: f32,

    // === Gait ===
    /// Seconds of body velocity used to predict a landing point.
    pub stride_prediction: f32,
    /// Sideways distance of each foot from the body center line.
    pub lateral_foot_offset: f32,
    /// Height of a planted sole above the ground hit point.
    pub foot_clearance: f32,
    /// Height above the body the ground projection ray starts from.
    pub ground_probe_height: f32,
    /// Reach of the ground projection ray.
    pub ground_probe_distance: f32,
    /// Offset added to the incoming phase angle (degrees).
    pub angle_offset: f32,
    /// Time constant of the phase angle filter. Zero disables smoothing.
    pub phase_smooth_time: f32,
    /// Knee hint distance ahead of the body.
    pub knee_hint_forward: f32,
    /// Knee hint distance to the side of the body.
    pub knee_hint_lateral: f32,
    /// Knee hint height above the body root.
    pub knee_hint_height: f32,
    /// Body offset pushed to the rig each tick when non-zero.
    pub hip_height_offset: f32,

    // === Foot Placement ===
    /// Which foot goals the solver refines.
    pub foot_goal_source: FootGoalSource,
    /// Rate of the exponential blend toward the corrected foot target.
    pub ik_lerp_speed: f32,
    /// Height above a goal the "now" ray starts from.
    pub foot_probe_height: f32,
    /// Reach of the "now" ray.
    pub foot_probe_distance: f32,
    /// Extra foot lift when stepping onto higher ground or over a riser.
    pub step_lift_height: f32,
    /// Multiplier on `step_lift_height` when stepping down.
    pub descent_lift_factor: f32,
    /// Distance ahead of the body the "future" ray is cast.
    pub body_look_ahead: f32,
    /// Height above the body the "future" ray starts from.
    pub hip_probe_height: f32,
    /// Reach of the forward toe ray.
    pub toe_ray_length: f32,
    /// Height of the toe ray above the foot goal.
    pub ankle_height: f32,
    /// Ground height difference that counts as a step.
    pub elevation_threshold: f32,
    /// Planar distance at which the lift starts ramping in.
    pub max_arc_distance: f32,
    /// Forward nudge applied to a lifted foot.
    pub edge_nudge: f32,

    // === External Signal ===
    /// Angular velocities below this (degrees/second) count as standing still.
    pub deadzone: f32,
    /// Distance covered by one step.
    pub stride_length: f32,
    /// Smoothing time of the cadence-derived speed.
    pub cadence_smooth_time: f32,
    /// Gait cycles per second generated while driven by local input.
    pub virtual_cadence: f32,
    /// Seconds without a new sample before the signal counts as lost.
    pub signal_timeout: f32,
}

impl Default for LocomotionConfig {
    fn default() -> Self {
        Self {
            // Movement
            speed: 2.0,
            turn_speed: 90.0,
            invert_turn: false,

            // Step up / step down
            step_height: 0.3,
            step_check_distance: 0.5,
            foot_ray_height: 0.1,
            step_clearance_margin: 0.05,
            riser_min_angle: 70.0,
            climb_smoothing: 4.0,
            climb_start_threshold: 0.05,
            descend_start_threshold: 0.01,
            step_down_probe_height: 0.1,
            step_down_min_drop: 0.05,
            step_down_reach: 1.2,
            slope_probe_height: 0.5,
            slope_probe_distance: 1.5,

            // Gait
            stride_prediction: 0.5,
            lateral_foot_offset: 0.2,
            foot_clearance: 0.1,
            ground_probe_height: 2.0,
            ground_probe_distance: 5.0,
            angle_offset: 0.0,
            phase_smooth_time: 0.05,
            knee_hint_forward: 1.0,
            knee_hint_lateral: 0.2,
            knee_hint_height: 0.5,
            hip_height_offset: 0.0,

            // Foot placement
            foot_goal_source: FootGoalSource::Gait,
            ik_lerp_speed: 20.0,
            foot_probe_height: 0.5,
            foot_probe_distance: 1.5,
            step_lift_height: 0.25,
            descent_lift_factor: 0.8,
            body_look_ahead: 0.4,
            hip_probe_height: 1.0,
            toe_ray_length: 0.3,
            ankle_height: 0.1,
            elevation_threshold: 0.1,
            max_arc_distance: 1.0,
            edge_nudge: 0.05,

            // External signal
            deadzone: 10.0,
            stride_length: 0.7,
            cadence_smooth_time: 0.3,
            virtual_cadence: 1.0,
            signal_timeout: 0.5,
        }
    }
}

impl LocomotionConfig {
    /// Config for a character walking under local input.
    pub fn walking() -> Self {
        Self::default()
    }

    /// Config for a character driven by a pedaling sensor.
    ///
    /// Heavier phase and cadence smoothing absorb sensor jitter.
    pub fn pedaling() -> Self {
        Self {
            phase_smooth_time: 0.1,
            deadzone: 15.0,
            stride_length: 0.8,
            cadence_smooth_time: 0.5,
            ..default()
        }
    }

    /// Parse a config from TOML text and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| LocomotionError::config_io(path, e))?;
        let config = Self::from_toml_str(&text)?;
        debug!("loaded locomotion config from {}", path.display());
        Ok(config)
    }

    /// Load a config from `path`, falling back to the defaults on any error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::load(path).unwrap_or_else(|err| {
            warn!("using default locomotion config: {err}");
            Self::default()
        })
    }

    /// Check that every tunable is finite and in range.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("speed", self.speed),
            ("turn_speed", self.turn_speed),
            ("step_height", self.step_height),
            ("step_check_distance", self.step_check_distance),
            ("foot_ray_height", self.foot_ray_height),
            ("step_clearance_margin", self.step_clearance_margin),
            ("riser_min_angle", self.riser_min_angle),
            ("climb_smoothing", self.climb_smoothing),
            ("climb_start_threshold", self.climb_start_threshold),
            ("descend_start_threshold", self.descend_start_threshold),
            ("step_down_probe_height", self.step_down_probe_height),
            ("step_down_min_drop", self.step_down_min_drop),
            ("step_down_reach", self.step_down_reach),
            ("slope_probe_height", self.slope_probe_height),
            ("slope_probe_distance", self.slope_probe_distance),
            ("stride_prediction", self.stride_prediction),
            ("lateral_foot_offset", self.lateral_foot_offset),
            ("foot_clearance", self.foot_clearance),
            ("ground_probe_height", self.ground_probe_height),
            ("ground_probe_distance", self.ground_probe_distance),
            ("angle_offset", self.angle_offset),
            ("phase_smooth_time", self.phase_smooth_time),
            ("knee_hint_forward", self.knee_hint_forward),
            ("knee_hint_lateral", self.knee_hint_lateral),
            ("knee_hint_height", self.knee_hint_height),
            ("hip_height_offset", self.hip_height_offset),
            ("ik_lerp_speed", self.ik_lerp_speed),
            ("foot_probe_height", self.foot_probe_height),
            ("foot_probe_distance", self.foot_probe_distance),
            ("step_lift_height", self.step_lift_height),
            ("descent_lift_factor", self.descent_lift_factor),
            ("body_look_ahead", self.body_look_ahead),
            ("hip_probe_height", self.hip_probe_height),
            ("toe_ray_length", self.toe_ray_length),
            ("ankle_height", self.ankle_height),
            ("elevation_threshold", self.elevation_threshold),
            ("max_arc_distance", self.max_arc_distance),
            ("edge_nudge", self.edge_nudge),
            ("deadzone", self.deadzone),
            ("stride_length", self.stride_length),
            ("cadence_smooth_time", self.cadence_smooth_time),
            ("signal_timeout", self.signal_timeout),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(LocomotionError::invalid_config(
                    field,
                    format!("must be finite, got {value}"),
                ));
            }
        }
        if !self.virtual_cadence.is_finite() || self.virtual_cadence < 0.0 {
            return Err(LocomotionError::invalid_config(
                "virtual_cadence",
                format!("must be finite and non-negative, got {}", self.virtual_cadence),
            ));
        }

        let positive = [
            ("step_height", self.step_height),
            ("step_check_distance", self.step_check_distance),
            ("climb_smoothing", self.climb_smoothing),
            ("ik_lerp_speed", self.ik_lerp_speed),
            ("foot_probe_distance", self.foot_probe_distance),
            ("ground_probe_distance", self.ground_probe_distance),
            ("slope_probe_distance", self.slope_probe_distance),
            ("signal_timeout", self.signal_timeout),
        ];
        for (field, value) in positive {
            if value <= 0.0 {
                return Err(LocomotionError::invalid_config(
                    field,
                    format!("must be positive, got {value}"),
                ));
            }
        }

        let non_negative = [
            ("speed", self.speed),
            ("turn_speed", self.turn_speed),
            ("stride_prediction", self.stride_prediction),
            ("phase_smooth_time", self.phase_smooth_time),
            ("step_lift_height", self.step_lift_height),
            ("descent_lift_factor", self.descent_lift_factor),
            ("toe_ray_length", self.toe_ray_length),
            ("deadzone", self.deadzone),
            ("stride_length", self.stride_length),
            ("cadence_smooth_time", self.cadence_smooth_time),
        ];
        for (field, value) in non_negative {
            if value < 0.0 {
                return Err(LocomotionError::invalid_config(
                    field,
                    format!("must be non-negative, got {value}"),
                ));
            }
        }

        if !(0.0..=90.0).contains(&self.riser_min_angle) {
            return Err(LocomotionError::invalid_config(
                "riser_min_angle",
                format!("must be within 0..=90 degrees, got {}", self.riser_min_angle),
            ));
        }
        Ok(())
    }

    /// Deepest drop (below the feet) the step-down check looks for.
    #[inline]
    pub fn max_step_down(&self) -> f32 {
        self.step_height * self.step_down_reach
    }

    /// Height of the step-up clearance ray above the feet.
    #[inline]
    pub fn clearance_ray_height(&self) -> f32 {
        self.step_height + self.step_clearance_margin
    }

    /// Signed yaw multiplier applied to turn input.
    #[inline]
    pub fn turn_sign(&self) -> f32 {
        if self.invert_turn {
            -1.0
        } else {
            1.0
        }
    }

    /// Builder: set body speed.
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Builder: set turn rate and sign.
    pub fn with_turning(mut self, turn_speed: f32, invert: bool) -> Self {
        self.turn_speed = turn_speed;
        self.invert_turn = invert;
        self
    }

    /// Builder: set step-up geometry.
    pub fn with_step(mut self, height: f32, check_distance: f32) -> Self {
        self.step_height = height;
        self.step_check_distance = check_distance;
        self
    }

    /// Builder: set climb smoothing rate.
    pub fn with_climb_smoothing(mut self, rate: f32) -> Self {
        self.climb_smoothing = rate;
        self
    }

    /// Builder: set stride prediction time.
    pub fn with_stride_prediction(mut self, seconds: f32) -> Self {
        self.stride_prediction = seconds;
        self
    }

    /// Builder: set phase angle offset and smoothing.
    pub fn with_phase(mut self, angle_offset: f32, smooth_time: f32) -> Self {
        self.angle_offset = angle_offset;
        self.phase_smooth_time = smooth_time;
        self
    }

    /// Builder: set foot IK blend rate.
    pub fn with_ik_lerp_speed(mut self, rate: f32) -> Self {
        self.ik_lerp_speed = rate;
        self
    }

    /// Builder: set the foot lift used over steps.
    pub fn with_step_lift(mut self, height: f32, descent_factor: f32) -> Self {
        self.step_lift_height = height;
        self.descent_lift_factor = descent_factor;
        self
    }

    /// Builder: set the foot solver's look-ahead rays.
    pub fn with_look_ahead(mut self, body_look_ahead: f32, toe_ray_length: f32) -> Self {
        self.body_look_ahead = body_look_ahead;
        self.toe_ray_length = toe_ray_length;
        self
    }

    /// Builder: set the foot goal source.
    pub fn with_foot_goal_source(mut self, source: FootGoalSource) -> Self {
        self.foot_goal_source = source;
        self
    }

    /// Builder: set the hip height offset.
    pub fn with_hip_height_offset(mut self, offset: f32) -> Self {
        self.hip_height_offset = offset;
        self
    }

    /// Builder: set cadence-to-speed parameters.
    pub fn with_cadence(mut self, deadzone: f32, stride_length: f32, smooth_time: f32) -> Self {
        self.deadzone = deadzone;
        self.stride_length = stride_length;
        self.cadence_smooth_time = smooth_time;
        self
    }

    /// Builder: set the virtual cadence used under local input.
    pub fn with_virtual_cadence(mut self, cycles_per_second: f32) -> Self {
        self.virtual_cadence = cycles_per_second;
        self
    }

    /// Builder: set how long the external signal may go silent.
    pub fn with_signal_timeout(mut self, seconds: f32) -> Self {
        self.signal_timeout = seconds;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===== Preset Tests =====

    #[test]
    fn default_config_is_valid() {
        assert!(LocomotionConfig::default().validate().is_ok());
        assert!(LocomotionConfig::walking().validate().is_ok());
        assert!(LocomotionConfig::pedaling().validate().is_ok());
    }

    #[test]
    fn pedaling_smooths_more_than_walking() {
        let walking = LocomotionConfig::walking();
        let pedaling = LocomotionConfig::pedaling();
        assert!(pedaling.phase_smooth_time > walking.phase_smooth_time);
        assert!(pedaling.cadence_smooth_time > walking.cadence_smooth_time);
    }

    #[test]
    fn derived_lengths() {
        let config = LocomotionConfig::default().with_step(0.3, 0.5);
        assert!((config.max_step_down() - 0.36).abs() < 1e-6);
        assert!((config.clearance_ray_height() - 0.35).abs() < 1e-6);
    }

    #[test]
    fn turn_sign_follows_flag() {
        assert_eq!(LocomotionConfig::default().turn_sign(), 1.0);
        assert_eq!(
            LocomotionConfig::default().with_turning(90.0, true).turn_sign(),
            -1.0
        );
    }

    // ===== Builder Tests =====

    #[test]
    fn builders_set_fields() {
        let config = LocomotionConfig::default()
            .with_speed(3.0)
            .with_climb_smoothing(8.0)
            .with_step_lift(0.4, 1.0)
            .with_foot_goal_source(FootGoalSource::Animation)
            .with_cadence(5.0, 0.9, 0.2)
            .with_signal_timeout(1.5);

        assert_eq!(config.speed, 3.0);
        assert_eq!(config.climb_smoothing, 8.0);
        assert_eq!(config.step_lift_height, 0.4);
        assert_eq!(config.descent_lift_factor, 1.0);
        assert_eq!(config.foot_goal_source, FootGoalSource::Animation);
        assert_eq!(config.deadzone, 5.0);
        assert_eq!(config.stride_length, 0.9);
        assert_eq!(config.signal_timeout, 1.5);
    }

    // ===== Validation Tests =====

    #[test]
    fn rejects_non_finite() {
        let config = LocomotionConfig {
            angle_offset: f32::NAN,
            ..default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("angle_offset"));
    }

    #[test]
    fn rejects_zero_climb_smoothing() {
        let config = LocomotionConfig::default().with_climb_smoothing(0.0);
        assert!(matches!(
            config.validate(),
            Err(LocomotionError::InvalidConfig {
                field: "climb_smoothing",
                ..
            })
        ));
    }

    #[test]
    fn rejects_negative_deadzone() {
        let config = LocomotionConfig::default().with_cadence(-1.0, 0.7, 0.3);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_signal_timeout() {
        let config = LocomotionConfig::default().with_signal_timeout(0.0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("signal_timeout"));
    }

    #[test]
    fn rejects_riser_angle_out_of_range() {
        let config = LocomotionConfig {
            riser_min_angle: 120.0,
            ..default()
        };
        assert!(config.validate().is_err());
    }

    // ===== TOML Tests =====

    #[test]
    fn partial_toml_uses_defaults() {
        let config = LocomotionConfig::from_toml_str(
            r#"
            speed = 3.5
            invert_turn = true
            foot_goal_source = "animation"
            "#,
        )
        .unwrap();

        assert_eq!(config.speed, 3.5);
        assert!(config.invert_turn);
        assert_eq!(config.foot_goal_source, FootGoalSource::Animation);
        assert_eq!(config.step_height, LocomotionConfig::default().step_height);
    }

    #[test]
    fn empty_toml_is_default() {
        let config = LocomotionConfig::from_toml_str("").unwrap();
        assert_eq!(config, LocomotionConfig::default());
    }

    #[test]
    fn invalid_toml_values_are_rejected() {
        let result = LocomotionConfig::from_toml_str("climb_smoothing = -2.0");
        assert!(matches!(
            result,
            Err(LocomotionError::InvalidConfig { .. })
        ));

        let result = LocomotionConfig::from_toml_str("speed = \"fast\"");
        assert!(matches!(result, Err(LocomotionError::ConfigParse(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = LocomotionConfig::load("/nonexistent/locomotion.toml");
        assert!(matches!(result, Err(LocomotionError::ConfigIo { .. })));
        assert_eq!(
            LocomotionConfig::load_or_default("/nonexistent/locomotion.toml"),
            LocomotionConfig::default()
        );
    }

    #[test]
    fn load_reads_file() {
        let path = std::env::temp_dir().join("msg_procedural_locomotion_config_test.toml");
        std::fs::write(&path, "stride_prediction = 0.75\n").unwrap();
        let config = LocomotionConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(config.stride_prediction, 0.75);
    }
}
