//! Power-state flags shared by the throughput monitor and tethering.
//!
//! Two independent engagement flags gate calls into the performance HAL: the
//! general low-power mode driven by the throughput monitor, and the tether
//! mode held while tethering runs. The TCP ack-reduction ratio written
//! alongside low-power mode is tracked here as well so it can always be
//! restored.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use strum::Display;
use thiserror::Error;
use tracing::{debug, info, warn};

pub(crate) const POWER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::power");

/// Binary state of a power flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Engagement {
    /// The mode is not held.
    #[default]
    NotEngaged,
    /// The mode is held.
    Engaged,
}

impl Engagement {
    /// Whether the mode is held.
    #[must_use]
    pub fn is_engaged(self) -> bool {
        matches!(self, Self::Engaged)
    }
}

/// Mode held through the performance HAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum PerfMode {
    /// Little-core low-power mode.
    LowPower,
    /// Tethering power mode.
    Tether,
}

/// TCP delayed-ack ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckRatio(u8);

impl AckRatio {
    /// Wraps a ratio value.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Raw ratio value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for AckRatio {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Error reported by the performance HAL.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("perf backend failure: {message}")]
pub struct PerfError {
    message: String,
}

impl PerfError {
    /// Creates an error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors surfaced by power-state transitions.
#[derive(Debug, Error)]
pub enum PowerError {
    /// The HAL rejected a transition.
    #[error("{operation} failed: {source}")]
    Perf {
        /// Transition that failed.
        operation: &'static str,
        /// HAL failure.
        #[source]
        source: PerfError,
    },
}

/// Performance HAL collaborator.
#[cfg_attr(test, mockall::automock)]
pub trait PerfBackend: Send + Sync {
    /// Acquires `mode`.
    fn acquire(&self, mode: PerfMode) -> Result<(), PerfError>;

    /// Releases `mode`.
    fn release(&self, mode: PerfMode) -> Result<(), PerfError>;

    /// Writes the ack ratio; `None` restores the kernel default.
    fn write_ack_ratio(&self, ratio: Option<AckRatio>) -> Result<(), PerfError>;
}

/// HAL stand-in that logs every call and accepts it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingPerfBackend;

impl PerfBackend for LoggingPerfBackend {
    fn acquire(&self, mode: PerfMode) -> Result<(), PerfError> {
        debug!(target: POWER_TARGET, %mode, "perf mode acquired");
        Ok(())
    }

    fn release(&self, mode: PerfMode) -> Result<(), PerfError> {
        debug!(target: POWER_TARGET, %mode, "perf mode released");
        Ok(())
    }

    fn write_ack_ratio(&self, ratio: Option<AckRatio>) -> Result<(), PerfError> {
        match ratio {
            Some(ratio) => debug!(target: POWER_TARGET, %ratio, "ack ratio written"),
            None => debug!(target: POWER_TARGET, "ack ratio restored"),
        }
        Ok(())
    }
}

/// Point-in-time view of the power flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerSnapshot {
    /// General low-power flag.
    pub low_power: Engagement,
    /// Tether flag.
    pub tether: Engagement,
    /// Ack ratio currently written, if any.
    pub ack_reduction: Option<AckRatio>,
    /// Whether the test-SIM gate lets the monitor act.
    pub test_sim: bool,
}

#[derive(Debug)]
struct Flags {
    low_power: Engagement,
    tether: Engagement,
    ack_reduction: Option<AckRatio>,
    test_sim: bool,
}

/// Mutex-guarded power flags and their HAL.
pub struct PowerState {
    perf: Arc<dyn PerfBackend>,
    flags: Mutex<Flags>,
}

impl fmt::Debug for PowerState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PowerState")
            .field("flags", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl PowerState {
    /// Builds the power state with both flags released.
    pub fn new(perf: Arc<dyn PerfBackend>, test_sim: bool) -> Self {
        Self {
            perf,
            flags: Mutex::new(Flags {
                low_power: Engagement::NotEngaged,
                tether: Engagement::NotEngaged,
                ack_reduction: None,
                test_sim,
            }),
        }
    }

    // A panic while holding the lock leaves the flags consistent: every
    // mutation is a single assignment after the HAL call returns.
    fn lock(&self) -> MutexGuard<'_, Flags> {
        self.flags.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current flags.
    #[must_use]
    pub fn snapshot(&self) -> PowerSnapshot {
        let flags = self.lock();
        PowerSnapshot {
            low_power: flags.low_power,
            tether: flags.tether,
            ack_reduction: flags.ack_reduction,
            test_sim: flags.test_sim,
        }
    }

    /// Engages low-power mode. No-op when already engaged.
    pub fn enter(&self) -> Result<(), PowerError> {
        let mut flags = self.lock();
        self.enter_locked(&mut flags)
    }

    /// Releases low-power mode. No-op when not engaged.
    ///
    /// The flag is cleared even when the HAL reports a failure, since the
    /// handle cannot be reused afterwards.
    pub fn exit(&self) -> Result<(), PowerError> {
        let mut flags = self.lock();
        self.exit_locked(&mut flags)
    }

    /// Engages tether mode. No-op when already engaged.
    pub fn enter_tether(&self) -> Result<(), PowerError> {
        let mut flags = self.lock();
        if flags.tether.is_engaged() {
            return Ok(());
        }
        self.perf
            .acquire(PerfMode::Tether)
            .map_err(|source| PowerError::Perf {
                operation: "enter tether mode",
                source,
            })?;
        flags.tether = Engagement::Engaged;
        info!(target: POWER_TARGET, "tether power mode engaged");
        Ok(())
    }

    /// Releases tether mode. No-op when not engaged.
    pub fn exit_tether(&self) -> Result<(), PowerError> {
        let mut flags = self.lock();
        if !flags.tether.is_engaged() {
            return Ok(());
        }
        flags.tether = Engagement::NotEngaged;
        info!(target: POWER_TARGET, "tether power mode released");
        self.perf
            .release(PerfMode::Tether)
            .map_err(|source| PowerError::Perf {
                operation: "exit tether mode",
                source,
            })
    }

    /// Writes the ack-reduction ratio.
    pub fn set_ack_reduction(&self, ratio: AckRatio) -> Result<(), PowerError> {
        let mut flags = self.lock();
        self.set_ack_locked(&mut flags, ratio)
    }

    /// Restores the kernel ack ratio. No-op when no reduction is active.
    pub fn restore_ack_reduction(&self) -> Result<(), PowerError> {
        let mut flags = self.lock();
        self.restore_ack_locked(&mut flags)
    }

    /// Whether the test-SIM gate lets the monitor act.
    #[must_use]
    pub fn test_sim_active(&self) -> bool {
        self.lock().test_sim
    }

    /// Opens or closes the test-SIM gate.
    pub fn set_test_sim(&self, active: bool) {
        self.lock().test_sim = active;
        info!(target: POWER_TARGET, active, "test sim gate updated");
    }

    /// Enters low-power mode with ack reduction when neither flag is held.
    ///
    /// Returns whether the mode was engaged by this call.
    pub fn engage_if_idle(&self, ratio: AckRatio) -> Result<bool, PowerError> {
        let mut flags = self.lock();
        if flags.low_power.is_engaged() || flags.tether.is_engaged() {
            return Ok(false);
        }
        self.enter_locked(&mut flags)?;
        self.set_ack_locked(&mut flags, ratio)?;
        Ok(true)
    }

    /// Leaves low-power mode and restores the ack ratio when engaged.
    ///
    /// Returns whether the mode was released by this call.
    pub fn disengage(&self) -> Result<bool, PowerError> {
        let mut flags = self.lock();
        if !flags.low_power.is_engaged() {
            return Ok(false);
        }
        let exited = self.exit_locked(&mut flags);
        let restored = self.restore_ack_locked(&mut flags);
        exited.and(restored).map(|()| true)
    }

    fn enter_locked(&self, flags: &mut Flags) -> Result<(), PowerError> {
        if flags.low_power.is_engaged() {
            return Ok(());
        }
        self.perf
            .acquire(PerfMode::LowPower)
            .map_err(|source| PowerError::Perf {
                operation: "enter low-power mode",
                source,
            })?;
        flags.low_power = Engagement::Engaged;
        info!(target: POWER_TARGET, "low-power mode engaged");
        Ok(())
    }

    fn exit_locked(&self, flags: &mut Flags) -> Result<(), PowerError> {
        if !flags.low_power.is_engaged() {
            return Ok(());
        }
        flags.low_power = Engagement::NotEngaged;
        info!(target: POWER_TARGET, "low-power mode released");
        self.perf
            .release(PerfMode::LowPower)
            .map_err(|source| PowerError::Perf {
                operation: "exit low-power mode",
                source,
            })
    }

    fn set_ack_locked(&self, flags: &mut Flags, ratio: AckRatio) -> Result<(), PowerError> {
        self.perf
            .write_ack_ratio(Some(ratio))
            .map_err(|source| PowerError::Perf {
                operation: "set ack reduction",
                source,
            })?;
        flags.ack_reduction = Some(ratio);
        Ok(())
    }

    fn restore_ack_locked(&self, flags: &mut Flags) -> Result<(), PowerError> {
        if flags.ack_reduction.take().is_none() {
            return Ok(());
        }
        self.perf.write_ack_ratio(None).map_err(|source| {
            warn!(target: POWER_TARGET, error = %source, "ack ratio restore failed");
            PowerError::Perf {
                operation: "restore ack reduction",
                source,
            }
        })
    }
}
