//! Control modes.
//!
//! A character is driven either by local input (keyboard, gamepad, AI), by an
//! external gait signal (a pedaling or walking-in-place sensor), or by the
//! signal with local input taking over while it is held. [`ControlMode`]
//! holds the per-mode state and turns the inputs of one tick into a
//! [`DriveCommand`].

use bevy::prelude::*;

use crate::config::LocomotionConfig;
use crate::geometry::{smooth_damp, wrap_degrees, Pose};
use crate::intent::LocomotionIntent;
use crate::phase::GaitPhaseSource;

/// What the locomotion stages should do this tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DriveCommand {
    /// Body-space velocity request, scaled by `speed` downstream.
    pub velocity_request: Vec3,
    /// Yaw input (positive turns right).
    pub turn: f32,
    /// Raw gait phase angle, `None` to freeze the gait.
    pub phase: Option<f32>,
}

/// Forward speed derived from pedal cadence.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq)]
pub struct CadenceDrive {
    speed: f32,
    speed_rate: f32,
    silent_for: f32,
}

impl CadenceDrive {
    /// Create a drive at rest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Smoothed forward speed in m/s.
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Speed a cadence maps to before smoothing.
    ///
    /// One gait cycle covers two strides.
    pub fn target_speed(config: &LocomotionConfig, angular_velocity: f32) -> f32 {
        let cadence = angular_velocity.abs();
        if cadence < config.deadzone {
            return 0.0;
        }
        let rotations_per_second = cadence / 360.0;
        rotations_per_second * config.stride_length * 2.0
    }

    /// Whether the signal has been silent longer than `signal_timeout`.
    pub fn is_stale(&self, config: &LocomotionConfig) -> bool {
        self.silent_for > config.signal_timeout
    }

    /// Track how long the signal has gone without a new sample.
    ///
    /// Returns `true` while the signal is stale.
    pub fn observe(&mut self, config: &LocomotionConfig, fresh: bool, dt: f32) -> bool {
        let was_stale = self.is_stale(config);
        if fresh {
            self.silent_for = 0.0;
        } else if dt > 0.0 {
            self.silent_for += dt;
        }
        let stale = self.is_stale(config);
        if stale && !was_stale {
            warn!(
                "gait signal silent for {:.2}s, standing still",
                self.silent_for
            );
        } else if was_stale && !stale {
            info!("gait signal resumed");
        }
        stale
    }

    /// Observe `signal` and move the speed toward its cadence.
    ///
    /// A stale signal drives toward standing still. Returns `true` while stale.
    pub fn follow(
        &mut self,
        config: &LocomotionConfig,
        signal: &impl GaitPhaseSource,
        dt: f32,
    ) -> bool {
        let stale = self.observe(config, signal.is_fresh(), dt);
        let angular_velocity = if stale {
            0.0
        } else {
            signal.angular_velocity()
        };
        self.update(config, angular_velocity, dt);
        stale
    }

    /// Move the smoothed speed toward the cadence target.
    pub fn update(&mut self, config: &LocomotionConfig, angular_velocity: f32, dt: f32) -> f32 {
        let target = Self::target_speed(config, angular_velocity);
        self.speed = smooth_damp(
            self.speed,
            target,
            &mut self.speed_rate,
            config.cadence_smooth_time,
            dt,
        );
        self.speed
    }

    /// Smoothed speed as a forward request normalized by `config.speed`.
    pub fn forward_request(&self, config: &LocomotionConfig) -> f32 {
        if config.speed > 0.0 {
            self.speed / config.speed
        } else {
            0.0
        }
    }
}

/// Gait phase generated from how long local input has been held.
#[derive(Reflect, Debug, Clone, Copy, Default, PartialEq)]
pub struct VirtualPhaseClock {
    cycle: f32,
    running: bool,
}

impl VirtualPhaseClock {
    /// Create a stopped clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether input is currently advancing the clock.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advance by `dt` and return the phase angle.
    ///
    /// The clock restarts from zero when it was stopped. Moving backward
    /// mirrors the angle so the legs cycle in reverse.
    pub fn advance(&mut self, config: &LocomotionConfig, dt: f32, backward: bool) -> f32 {
        if !self.running {
            self.cycle = 0.0;
            self.running = true;
        } else if dt > 0.0 {
            self.cycle = (self.cycle + dt * config.virtual_cadence).fract();
        }
        let angle = self.cycle * 360.0;
        if backward {
            wrap_degrees(360.0 - angle)
        } else {
            angle
        }
    }

    /// Stop the clock; the next advance restarts it.
    pub fn stop(&mut self) {
        self.running = false;
    }
}

/// Who drives the character.
#[derive(Component, Reflect, Debug, Clone, PartialEq)]
#[reflect(Component)]
pub enum ControlMode {
    /// Only local intent drives body and gait.
    LocalInput {
        /// Phase generator for the gait.
        clock: VirtualPhaseClock,
    },
    /// Only the external signal drives body and gait.
    ExternalSignal {
        /// Cadence-to-speed state.
        cadence: CadenceDrive,
    },
    /// The external signal drives, local input overrides while held.
    Automatic {
        /// Cadence-to-speed state.
        cadence: CadenceDrive,
        /// Phase generator while local input is held.
        manual: Option<VirtualPhaseClock>,
    },
}

impl Default for ControlMode {
    fn default() -> Self {
        Self::automatic()
    }
}

impl ControlMode {
    /// Local input only.
    pub fn local_input() -> Self {
        Self::LocalInput {
            clock: VirtualPhaseClock::new(),
        }
    }

    /// External signal only.
    pub fn external_signal() -> Self {
        Self::ExternalSignal {
            cadence: CadenceDrive::new(),
        }
    }

    /// External signal with local override.
    pub fn automatic() -> Self {
        Self::Automatic {
            cadence: CadenceDrive::new(),
            manual: None,
        }
    }

    /// Short name for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::LocalInput { .. } => "local input",
            Self::ExternalSignal { .. } => "external signal",
            Self::Automatic { manual: Some(_), .. } => "automatic (local override)",
            Self::Automatic { manual: None, .. } => "automatic (external signal)",
        }
    }

    /// Whether local input currently drives the character.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::LocalInput { .. } | Self::Automatic { manual: Some(_), .. }
        )
    }

    /// Hand control between the signal and local input in automatic mode.
    ///
    /// Returns `true` when control changed hands.
    pub fn transition(&mut self, intent: &LocomotionIntent) -> bool {
        let Self::Automatic { manual, .. } = self else {
            return false;
        };
        match (manual.is_some(), intent.is_active()) {
            (false, true) => *manual = Some(VirtualPhaseClock::new()),
            (true, false) => *manual = None,
            _ => return false,
        }
        info!("locomotion now driven by {}", self.label());
        true
    }

    /// Turn this tick's inputs into a drive command.
    pub fn drive(
        &mut self,
        config: &LocomotionConfig,
        intent: &LocomotionIntent,
        signal: &impl GaitPhaseSource,
        body: &Pose,
        dt: f32,
    ) -> DriveCommand {
        self.transition(intent);
        match self {
            Self::LocalInput { clock } => local_command(clock, config, intent, dt),
            Self::ExternalSignal { cadence } => signal_command(cadence, config, signal, body, dt),
            Self::Automatic {
                cadence,
                manual: Some(clock),
            } => {
                // keep the cadence filter warm for the hand-back
                cadence.follow(config, signal, dt);
                local_command(clock, config, intent, dt)
            }
            Self::Automatic {
                cadence,
                manual: None,
            } => signal_command(cadence, config, signal, body, dt),
        }
    }
}

fn local_command(
    clock: &mut VirtualPhaseClock,
    config: &LocomotionConfig,
    intent: &LocomotionIntent,
    dt: f32,
) -> DriveCommand {
    let phase = if intent.is_moving() {
        Some(clock.advance(config, dt, intent.is_backward()))
    } else {
        clock.stop();
        None
    };
    DriveCommand {
        velocity_request: intent.local_request(),
        turn: intent.turn,
        phase,
    }
}

fn signal_command(
    cadence: &mut CadenceDrive,
    config: &LocomotionConfig,
    signal: &impl GaitPhaseSource,
    body: &Pose,
    dt: f32,
) -> DriveCommand {
    let stale = cadence.follow(config, signal, dt);
    let speed = cadence.speed();
    let hint = if stale {
        None
    } else {
        signal.body_velocity_hint()
    };
    let velocity_request = match hint {
        Some(world) if config.speed > 0.0 => body.orientation.inverse() * world / config.speed,
        Some(_) => Vec3::ZERO,
        None if config.speed > 0.0 => Vec3::NEG_Z * (speed / config.speed),
        None => Vec3::ZERO,
    };
    DriveCommand {
        velocity_request,
        turn: 0.0,
        phase: signal.phase_angle_degrees(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::{PhaseSample, PhaseSnapshot};

    const DT: f32 = 1.0 / 60.0;

    fn signal(angle: f32, angular_velocity: f32) -> PhaseSnapshot {
        PhaseSnapshot {
            sample: Some(PhaseSample::new(angle, angular_velocity, 0.0)),
            fresh: true,
        }
    }

    fn forward_intent() -> LocomotionIntent {
        LocomotionIntent {
            forward: 1.0,
            ..default()
        }
    }

    // ===== Cadence Tests =====

    #[test]
    fn cadence_below_deadzone_is_standing() {
        let config = LocomotionConfig::default().with_cadence(10.0, 0.7, 0.3);
        assert_eq!(CadenceDrive::target_speed(&config, 9.0), 0.0);
        assert_eq!(CadenceDrive::target_speed(&config, -9.0), 0.0);
    }

    #[test]
    fn one_rotation_per_second_covers_two_strides() {
        let config = LocomotionConfig::default().with_cadence(10.0, 0.7, 0.3);
        assert!((CadenceDrive::target_speed(&config, 360.0) - 1.4).abs() < 1e-6);
        assert!((CadenceDrive::target_speed(&config, -360.0) - 1.4).abs() < 1e-6);
    }

    #[test]
    fn cadence_speed_is_smoothed() {
        let config = LocomotionConfig::default()
            .with_speed(2.0)
            .with_cadence(10.0, 0.7, 0.3);
        let mut drive = CadenceDrive::new();

        let first = drive.update(&config, 360.0, DT);
        assert!(first > 0.0 && first < 1.4);

        for _ in 0..600 {
            drive.update(&config, 360.0, DT);
        }
        assert!((drive.speed() - 1.4).abs() < 1e-3);
        assert!((drive.forward_request(&config) - 0.7).abs() < 1e-3);
    }

    #[test]
    fn silent_signal_decays_to_standing() {
        let config = LocomotionConfig::default()
            .with_cadence(10.0, 0.7, 0.3)
            .with_signal_timeout(0.5);
        let mut drive = CadenceDrive::new();
        let live = signal(0.0, 360.0);
        let silent = PhaseSnapshot {
            fresh: false,
            ..live
        };

        for _ in 0..120 {
            drive.follow(&config, &live, DT);
        }
        assert!(drive.speed() > 1.3);

        // the last cadence holds until the timeout
        for _ in 0..20 {
            assert!(!drive.follow(&config, &silent, DT));
        }
        assert!(drive.speed() > 1.3);

        for _ in 0..300 {
            drive.follow(&config, &silent, DT);
        }
        assert!(drive.is_stale(&config));
        assert!(drive.speed() < 1e-3);

        assert!(!drive.follow(&config, &live, DT));
    }

    #[test]
    fn stale_signal_drops_body_velocity_hint() {
        let config = LocomotionConfig::default().with_signal_timeout(0.1);
        let mut mode = ControlMode::external_signal();
        let snapshot = PhaseSnapshot {
            sample: Some(PhaseSample::new(30.0, 0.0, 0.0).with_body_velocity(Vec3::NEG_Z)),
            fresh: false,
        };

        let mut command = DriveCommand::default();
        for _ in 0..12 {
            command = mode.drive(&config, &LocomotionIntent::default(), &snapshot, &Pose::default(), DT);
        }

        assert_eq!(command.velocity_request, Vec3::ZERO);
        assert_eq!(command.phase, Some(30.0));
    }

    // ===== Virtual Clock Tests =====

    #[test]
    fn virtual_clock_advances_at_cadence() {
        let config = LocomotionConfig::default().with_virtual_cadence(1.0);
        let mut clock = VirtualPhaseClock::new();

        assert_eq!(clock.advance(&config, 0.25, false), 0.0);
        let angle = clock.advance(&config, 0.25, false);
        assert!((angle - 90.0).abs() < 1e-3);
    }

    #[test]
    fn virtual_clock_mirrors_backward() {
        let config = LocomotionConfig::default().with_virtual_cadence(1.0);
        let mut clock = VirtualPhaseClock::new();

        clock.advance(&config, 0.0, true);
        let angle = clock.advance(&config, 0.25, true);
        assert!((angle - 270.0).abs() < 1e-3);
    }

    #[test]
    fn virtual_clock_restarts_after_stop() {
        let config = LocomotionConfig::default().with_virtual_cadence(1.0);
        let mut clock = VirtualPhaseClock::new();

        clock.advance(&config, 0.0, false);
        clock.advance(&config, 0.4, false);
        clock.stop();

        assert!(!clock.is_running());
        assert_eq!(clock.advance(&config, 0.1, false), 0.0);
    }

    // ===== Mode Tests =====

    #[test]
    fn local_input_ignores_signal() {
        let config = LocomotionConfig::default();
        let mut mode = ControlMode::local_input();

        let idle = mode.drive(&config, &LocomotionIntent::default(), &signal(90.0, 360.0), &Pose::default(), DT);
        assert_eq!(idle.phase, None);
        assert_eq!(idle.velocity_request, Vec3::ZERO);

        let moving = mode.drive(&config, &forward_intent(), &signal(90.0, 360.0), &Pose::default(), DT);
        assert_eq!(moving.phase, Some(0.0));
        assert_eq!(moving.velocity_request, Vec3::NEG_Z);
    }

    #[test]
    fn external_signal_ignores_intent() {
        let config = LocomotionConfig::default();
        let mut mode = ControlMode::external_signal();
        let mut intent = forward_intent();
        intent.set_turn(1.0);

        let command = mode.drive(&config, &intent, &signal(123.0, 0.0), &Pose::default(), DT);

        assert_eq!(command.phase, Some(123.0));
        assert_eq!(command.turn, 0.0);
        assert_eq!(command.velocity_request, Vec3::ZERO);
        assert!(!mode.is_local());
    }

    #[test]
    fn external_signal_without_phase_freezes() {
        let config = LocomotionConfig::default();
        let mut mode = ControlMode::external_signal();

        let command = mode.drive(
            &config,
            &LocomotionIntent::default(),
            &PhaseSnapshot::default(),
            &Pose::default(),
            DT,
        );

        assert_eq!(command.phase, None);
    }

    #[test]
    fn body_velocity_hint_becomes_local_request() {
        let config = LocomotionConfig::default().with_speed(2.0);
        let mut mode = ControlMode::external_signal();
        let snapshot = PhaseSnapshot {
            sample: Some(PhaseSample::new(0.0, 0.0, 0.0).with_body_velocity(Vec3::new(1.0, 0.0, 0.0))),
            fresh: true,
        };
        // body faces +X
        let body = Pose::new(Vec3::ZERO, Quat::from_rotation_y(-std::f32::consts::FRAC_PI_2));

        let command = mode.drive(&config, &LocomotionIntent::default(), &snapshot, &body, DT);

        assert!((command.velocity_request - Vec3::new(0.0, 0.0, -0.5)).length() < 1e-5);
    }

    #[test]
    fn automatic_hands_over_and_back() {
        let config = LocomotionConfig::default();
        let mut mode = ControlMode::automatic();
        let body = Pose::default();

        let command = mode.drive(&config, &LocomotionIntent::default(), &signal(200.0, 0.0), &body, DT);
        assert_eq!(command.phase, Some(200.0));
        assert!(!mode.is_local());

        let command = mode.drive(&config, &forward_intent(), &signal(210.0, 0.0), &body, DT);
        assert!(mode.is_local());
        assert_eq!(command.phase, Some(0.0));
        assert_eq!(command.velocity_request, Vec3::NEG_Z);

        // released: the signal drives again on the same tick
        let command = mode.drive(&config, &LocomotionIntent::default(), &signal(220.0, 0.0), &body, DT);
        assert!(!mode.is_local());
        assert_eq!(command.phase, Some(220.0));
    }

    #[test]
    fn transition_is_the_only_edge() {
        let mut mode = ControlMode::automatic();
        assert!(mode.transition(&forward_intent()));
        assert!(!mode.transition(&forward_intent()));
        assert!(mode.transition(&LocomotionIntent::default()));
        assert!(!mode.transition(&LocomotionIntent::default()));

        let mut local = ControlMode::local_input();
        assert!(!local.transition(&forward_intent()));
    }

    #[test]
    fn labels_name_the_driver() {
        assert_eq!(ControlMode::local_input().label(), "local input");
        assert_eq!(ControlMode::default().label(), "automatic (external signal)");
    }
}
