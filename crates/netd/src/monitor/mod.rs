//! Background throughput monitor.
//!
//! One worker thread samples the receive counters of the cellular interfaces
//! every tick and drives [`PowerState`] by a single threshold: a per-tick
//! delta above the threshold engages low-power mode with ack reduction, and
//! any tick at or below it releases both.

mod sampler;
#[cfg(test)]
mod tests;

use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use strum::Display;
use thiserror::Error;
use tracing::{debug, info, warn};

use netd_config::Config;

use crate::power::{AckRatio, PowerState};

pub use sampler::{CounterReadError, CounterSampler, SysfsCounterSampler};
#[cfg(test)]
pub(crate) use sampler::MockCounterSampler;

pub(crate) const MONITOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::monitor");

/// Tuning of the monitor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Bytes per tick above which low-power mode engages.
    pub threshold: u64,
    /// Ack ratio written while engaged.
    pub ack_ratio: AckRatio,
    /// Wait between sampling ticks.
    pub tick: Duration,
    /// Wait between checks while the test-SIM gate is closed.
    pub idle_tick: Duration,
}

impl MonitorSettings {
    /// Reads the monitor tuning from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            threshold: config.lowpower_threshold(),
            ack_ratio: AckRatio::new(config.ack_ratio()),
            tick: config.monitor_tick(),
            idle_tick: config.monitor_idle_tick(),
        }
    }
}

/// Lifecycle state of the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum MonitorStatus {
    /// No worker thread.
    Stopped,
    /// Worker thread sampling.
    Running,
}

/// Errors surfaced by monitor lifecycle calls.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The worker thread could not be spawned.
    #[error("failed to spawn monitor thread: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The worker thread panicked.
    #[error("monitor thread panicked")]
    WorkerPanicked,
}

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    /// The test-SIM gate is closed.
    Gated,
    /// Low-power mode was engaged.
    Engaged { bits_per_second: u64 },
    /// Low-power mode was released.
    Released { bits_per_second: u64 },
    /// Nothing changed.
    Steady,
}

/// Counter totals carried between ticks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SampleWindow {
    pub(crate) last: u64,
}

/// The sampling and decision half of the monitor, free of threading.
pub(crate) struct MonitorCore {
    sampler: Arc<dyn CounterSampler>,
    power: Arc<PowerState>,
    settings: MonitorSettings,
}

impl MonitorCore {
    pub(crate) fn new(
        sampler: Arc<dyn CounterSampler>,
        power: Arc<PowerState>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            sampler,
            power,
            settings,
        }
    }

    /// Runs one tick against `window`.
    pub(crate) fn tick(&self, window: &mut SampleWindow) -> TickOutcome {
        if !self.power.test_sim_active() {
            if let Err(error) = self.power.disengage() {
                warn!(target: MONITOR_TARGET, %error, "release while gated failed");
            }
            return TickOutcome::Gated;
        }

        let current = self.sampler.sample();
        let delta = current.saturating_sub(window.last);
        window.last = current;
        let bits_per_second = delta.saturating_mul(8);

        if delta > self.settings.threshold {
            match self.power.engage_if_idle(self.settings.ack_ratio) {
                Ok(true) => {
                    info!(
                        target: MONITOR_TARGET,
                        bits_per_second,
                        "throughput above low-power threshold"
                    );
                    TickOutcome::Engaged { bits_per_second }
                }
                Ok(false) => TickOutcome::Steady,
                Err(error) => {
                    warn!(target: MONITOR_TARGET, %error, "low-power engagement failed");
                    TickOutcome::Steady
                }
            }
        } else {
            match self.power.disengage() {
                Ok(true) => {
                    info!(
                        target: MONITOR_TARGET,
                        bits_per_second,
                        "throughput below low-power threshold"
                    );
                    TickOutcome::Released { bits_per_second }
                }
                Ok(false) => TickOutcome::Steady,
                Err(error) => {
                    warn!(target: MONITOR_TARGET, %error, "low-power release failed");
                    TickOutcome::Steady
                }
            }
        }
    }

    fn wait_after(&self, outcome: TickOutcome) -> Duration {
        match outcome {
            TickOutcome::Gated => self.settings.idle_tick,
            _ => self.settings.tick,
        }
    }
}

/// Running flag paired with a condvar so stop wakes a sleeping worker.
#[derive(Debug, Default)]
struct RunSignal {
    running: Mutex<bool>,
    wake: Condvar,
}

impl RunSignal {
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_running(&self) -> bool {
        *self.lock()
    }

    fn stop(&self) {
        *self.lock() = false;
        self.wake.notify_all();
    }

    /// Sleeps for `timeout` unless stopped first. Returns whether still running.
    fn wait(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let (guard, _) = self
            .wake
            .wait_timeout_while(guard, timeout, |running| *running)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

struct MonitorTask {
    signal: Arc<RunSignal>,
    handle: JoinHandle<()>,
}

/// Owns the monitor worker thread.
pub struct ThroughputMonitor {
    core: Arc<MonitorCore>,
    task: Mutex<Option<MonitorTask>>,
}

impl std::fmt::Debug for ThroughputMonitor {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ThroughputMonitor")
            .field("settings", &self.core.settings)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl ThroughputMonitor {
    /// Builds a stopped monitor.
    pub fn new(
        sampler: Arc<dyn CounterSampler>,
        power: Arc<PowerState>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            core: Arc::new(MonitorCore::new(sampler, power, settings)),
            task: Mutex::new(None),
        }
    }

    /// Builds a stopped monitor reading the configured sysfs counters.
    #[must_use]
    pub fn from_config(config: &Config, power: Arc<PowerState>) -> Self {
        let sampler = SysfsCounterSampler::new(
            config.counter_root().to_path_buf(),
            config.monitor_interfaces(),
        );
        Self::new(Arc::new(sampler), power, MonitorSettings::from_config(config))
    }

    fn task(&self) -> MutexGuard<'_, Option<MonitorTask>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> MonitorStatus {
        if self.task().is_some() {
            MonitorStatus::Running
        } else {
            MonitorStatus::Stopped
        }
    }

    /// Whether the worker runs.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status() == MonitorStatus::Running
    }

    /// Spawns the worker. Starting a running monitor logs and succeeds.
    pub fn start(&self) -> Result<(), MonitorError> {
        let mut task = self.task();
        if task.is_some() {
            warn!(target: MONITOR_TARGET, "throughput monitor already running");
            return Ok(());
        }
        let signal = Arc::new(RunSignal::default());
        *signal.lock() = true;
        let core = Arc::clone(&self.core);
        let worker_signal = Arc::clone(&signal);
        let handle = thread::Builder::new()
            .name("netd-monitor".to_owned())
            .spawn(move || run(&core, &worker_signal))
            .map_err(|source| MonitorError::Spawn { source })?;
        *task = Some(MonitorTask { signal, handle });
        info!(target: MONITOR_TARGET, "throughput monitor started");
        Ok(())
    }

    /// Stops and joins the worker, then releases low-power mode.
    ///
    /// Stopping a stopped monitor logs and succeeds. The task slot stays
    /// locked until the release is done, so a concurrent [`start`] waits for
    /// it and its worker never has its engagement undone by this call.
    ///
    /// [`start`]: Self::start
    pub fn stop(&self) -> Result<(), MonitorError> {
        // The worker never touches the task slot, so joining under it is safe.
        let mut task = self.task();
        let Some(MonitorTask { signal, handle }) = task.take() else {
            info!(target: MONITOR_TARGET, "throughput monitor already stopped");
            return Ok(());
        };
        signal.stop();
        let joined = handle.join().map_err(|_| MonitorError::WorkerPanicked);

        if let Err(error) = self.core.power.exit() {
            warn!(target: MONITOR_TARGET, %error, "low-power release on stop failed");
        }
        if let Err(error) = self.core.power.restore_ack_reduction() {
            warn!(target: MONITOR_TARGET, %error, "ack restore on stop failed");
        }
        drop(task);
        info!(target: MONITOR_TARGET, "throughput monitor stopped");
        joined
    }
}

impl Drop for ThroughputMonitor {
    fn drop(&mut self) {
        if let Err(error) = self.stop() {
            warn!(target: MONITOR_TARGET, %error, "monitor shutdown on drop failed");
        }
    }
}

fn run(core: &MonitorCore, signal: &RunSignal) {
    debug!(target: MONITOR_TARGET, "monitor worker entered");
    let mut window = SampleWindow::default();
    while signal.is_running() {
        let outcome = core.tick(&mut window);
        if !signal.wait(core.wait_after(outcome)) {
            break;
        }
    }
    debug!(target: MONITOR_TARGET, "monitor worker exiting");
}
