//! External gait phase signal.
//!
//! A background receiver (network, serial, simulation) posts the latest phase
//! sample into a single-slot [`PhaseMailbox`]. The simulation tick takes a
//! [`PhaseSnapshot`] without blocking: if the producer is writing at that
//! moment the previous snapshot is reused.

use std::sync::{Arc, Mutex, PoisonError, TryLockError};

use bevy::prelude::*;

/// One reading of the external gait signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseSample {
    /// Gait phase angle in degrees.
    pub angle_deg: f32,
    /// Rate of change of the angle in degrees/second (pedal cadence).
    pub angular_velocity: f32,
    /// Body velocity measured by the producer, if it has one.
    pub body_velocity: Option<Vec3>,
    /// Producer timestamp in seconds.
    pub timestamp: f64,
}

impl PhaseSample {
    /// Create a sample without a body velocity hint.
    pub fn new(angle_deg: f32, angular_velocity: f32, timestamp: f64) -> Self {
        Self {
            angle_deg,
            angular_velocity,
            body_velocity: None,
            timestamp,
        }
    }

    /// Builder: attach a body velocity hint.
    pub fn with_body_velocity(mut self, velocity: Vec3) -> Self {
        self.body_velocity = Some(velocity);
        self
    }
}

/// Anything that supplies a gait phase each tick.
pub trait GaitPhaseSource {
    /// Current phase angle in degrees, or `None` if no signal has arrived.
    fn phase_angle_degrees(&self) -> Option<f32>;

    /// Angular velocity of the phase in degrees/second.
    fn angular_velocity(&self) -> f32;

    /// Body velocity supplied alongside the phase, if any.
    fn body_velocity_hint(&self) -> Option<Vec3>;

    /// Whether a new sample arrived since the previous tick.
    fn is_fresh(&self) -> bool {
        true
    }
}

/// Single-slot, latest-value-wins mailbox.
#[derive(Debug, Clone, Default)]
pub struct PhaseMailbox {
    slot: Arc<Mutex<Option<PhaseSample>>>,
}

impl PhaseMailbox {
    /// Create an empty mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Producer handle. Can be moved to another thread.
    pub fn sender(&self) -> PhaseSender {
        PhaseSender {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Consumer handle for the simulation tick.
    pub fn reader(&self) -> PhaseReader {
        PhaseReader {
            slot: Arc::clone(&self.slot),
            cached: None,
        }
    }
}

/// Producer side of a [`PhaseMailbox`].
#[derive(Debug, Clone)]
pub struct PhaseSender {
    slot: Arc<Mutex<Option<PhaseSample>>>,
}

impl PhaseSender {
    /// Replace the stored sample.
    pub fn post(&self, sample: PhaseSample) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(sample);
    }

    /// Drop the stored sample, as if the signal was lost.
    pub fn clear(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }
}

/// Consumer side of a [`PhaseMailbox`].
#[derive(Debug)]
pub struct PhaseReader {
    slot: Arc<Mutex<Option<PhaseSample>>>,
    cached: Option<PhaseSample>,
}

impl PhaseReader {
    /// Read the latest sample without blocking.
    pub fn snapshot(&mut self) -> PhaseSnapshot {
        let previous = self.cached;
        match self.slot.try_lock() {
            Ok(slot) => self.cached = *slot,
            Err(TryLockError::WouldBlock) => {}
            Err(TryLockError::Poisoned(poisoned)) => {
                warn!("phase mailbox poisoned by a panicking producer, recovering");
                self.cached = *poisoned.into_inner();
                self.slot.clear_poison();
            }
        }
        let fresh = match (previous, self.cached) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(old), Some(new)) => new.timestamp != old.timestamp,
        };
        PhaseSnapshot {
            sample: self.cached,
            fresh,
        }
    }
}

/// A phase reading taken at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PhaseSnapshot {
    /// Latest sample received, if any.
    pub sample: Option<PhaseSample>,
    /// Whether the sample changed since the previous snapshot.
    pub fresh: bool,
}

impl GaitPhaseSource for PhaseSnapshot {
    fn phase_angle_degrees(&self) -> Option<f32> {
        self.sample.map(|s| s.angle_deg)
    }

    fn angular_velocity(&self) -> f32 {
        self.sample.map_or(0.0, |s| s.angular_velocity)
    }

    fn body_velocity_hint(&self) -> Option<Vec3> {
        self.sample.and_then(|s| s.body_velocity)
    }

    fn is_fresh(&self) -> bool {
        self.fresh
    }
}

/// Connects a character to an external phase signal.
#[derive(Component, Debug)]
pub struct PhaseSignal {
    reader: PhaseReader,
    snapshot: PhaseSnapshot,
}

impl PhaseSignal {
    /// Read from `mailbox`.
    pub fn new(mailbox: &PhaseMailbox) -> Self {
        Self {
            reader: mailbox.reader(),
            snapshot: PhaseSnapshot::default(),
        }
    }

    /// Take a new snapshot from the mailbox.
    pub fn poll(&mut self) -> PhaseSnapshot {
        self.snapshot = self.reader.snapshot();
        self.snapshot
    }

    /// Snapshot taken by the last [`poll`](Self::poll).
    pub fn snapshot(&self) -> PhaseSnapshot {
        self.snapshot
    }
}
