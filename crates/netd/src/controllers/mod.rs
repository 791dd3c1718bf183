//! Subsystem controllers owning the daemon's kernel-facing network state.
//!
//! Every controller guards its state with its own mutex, so concurrent client
//! connections can call into the same controller safely. Mutations follow the
//! same shape everywhere: validate against current state, describe the change
//! to the [`NetBackend`], and commit the new state only when the backend
//! accepts it. A failed backend call therefore leaves the controller exactly
//! as it was.
//!
//! All controllers implement [`Controller`]. Those with a global on/off state
//! machine also implement [`Switchable`], whose repeat-call behaviour is fixed
//! per controller by a [`TogglePolicy`].

mod backend;
mod bandwidth;
mod clatd;
mod dual_on;
mod firewall;
mod idletimer;
mod interface;
mod ipv6_tether;
mod nat;
mod ppp;
mod pppoe;
mod resolver;
mod softap;
mod strict;
mod tether;
mod throttle;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use strum::{Display, EnumIter, EnumString};
use thiserror::Error;

use netd_config::Config;

use crate::monitor::ThroughputMonitor;
use crate::power::PowerState;

pub use backend::{BackendError, KernelChange, LoggingNetBackend, NetBackend};
pub(crate) use backend::KernelLink;
#[cfg(test)]
pub(crate) use backend::MockNetBackend;
pub use bandwidth::{AppList, BandwidthController};
pub use clatd::ClatdController;
pub use dual_on::{DualOnController, DualOnPair};
pub use firewall::{ChildChain, FirewallController, FirewallRule, FirewallType};
pub use idletimer::{IdletimerController, IdletimerEntry};
pub use interface::{InterfaceConfig, InterfaceController, InterfaceFlag};
pub use ipv6_tether::Ipv6TetherController;
pub use nat::NatController;
pub use ppp::{PppController, PppLink};
pub use pppoe::{PppoeController, PppoeCredentials};
pub use resolver::{ResolverController, ResolverSettings};
pub use softap::{SoftapController, SoftapFirmware, SoftapSecurity, SoftapSettings};
pub use strict::{CleartextPenalty, StrictController};
pub use tether::{DhcpRange, IpFamily, TetherController};
pub use throttle::{ThrottleController, ThrottleDirection, ThrottleLimits};

pub(crate) const CONTROLLERS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::controllers");

/// Network subsystems owned by a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Subsystem {
    /// Interface addressing, MTU and IPv6 state.
    Interface,
    /// Tethering, DHCP ranges, DNS forwarders and IP forwarding.
    Tether,
    /// IPv6 prefix sharing onto tethered interfaces.
    Ipv6Tether,
    /// NAT between internal and external interfaces.
    Nat,
    /// PPP links over serial ttys.
    Ppp,
    /// PPP over Ethernet sessions.
    Pppoe,
    /// Soft access point.
    Softap,
    /// Bandwidth accounting and quotas.
    Bandwidth,
    /// Interface idle timers.
    Idletimer,
    /// Per-network DNS resolver settings.
    Resolver,
    /// Packet filtering chains.
    Firewall,
    /// 464XLAT daemons.
    Clatd,
    /// Cleartext traffic policing.
    Strict,
    /// Interface rate limits.
    Throttle,
    /// Simultaneous use of two uplinks.
    DualOn,
}

/// Errors produced by controller operations.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// The subsystem was enabled already and its policy rejects repeats.
    #[error("{subsystem} is already enabled")]
    AlreadyEnabled {
        /// Subsystem that rejected the call.
        subsystem: Subsystem,
    },
    /// The subsystem was disabled already and its policy rejects repeats.
    #[error("{subsystem} is not enabled")]
    NotEnabled {
        /// Subsystem that rejected the call.
        subsystem: Subsystem,
    },
    /// The entry being added exists already.
    #[error("{what} already exists")]
    AlreadyExists {
        /// Description of the duplicate entry.
        what: String,
    },
    /// The entry being removed or queried does not exist.
    #[error("{what} not found")]
    NotFound {
        /// Description of the missing entry.
        what: String,
    },
    /// The kernel backend rejected the change.
    #[error("kernel rejected {subsystem} change: {source}")]
    Backend {
        /// Subsystem whose change failed.
        subsystem: Subsystem,
        /// Backend failure.
        #[source]
        source: BackendError,
    },
    /// A previous holder of the state lock panicked.
    #[error("{subsystem} state lock poisoned")]
    Poisoned {
        /// Subsystem whose lock is poisoned.
        subsystem: Subsystem,
    },
}

impl ControllerError {
    pub(crate) fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists { what: what.into() }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }
}

/// Capability shared by every controller.
pub trait Controller: Send + Sync {
    /// Subsystem owned by this controller.
    fn subsystem(&self) -> Subsystem;

    /// Pure read of whether the subsystem is currently active.
    fn is_enabled(&self) -> bool;
}

/// Controllers with a global on/off state machine.
pub trait Switchable: Controller {
    /// Transitions Disabled to Enabled.
    fn enable(&self) -> Result<(), ControllerError>;

    /// Transitions Enabled to Disabled.
    fn disable(&self) -> Result<(), ControllerError>;
}

/// What a repeated identical transition does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    /// Succeed without touching the kernel.
    NoOp,
    /// Fail with an operation error.
    Reject,
}

/// Repeat behaviour of a [`Switchable`] controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TogglePolicy {
    /// Behaviour of `enable()` while enabled.
    pub repeat_enable: Repeat,
    /// Behaviour of `disable()` while disabled.
    pub repeat_disable: Repeat,
}

impl TogglePolicy {
    /// Both directions are silent no-ops when repeated.
    pub const IDEMPOTENT: Self = Self {
        repeat_enable: Repeat::NoOp,
        repeat_disable: Repeat::NoOp,
    };

    /// Starting twice is an error; stopping twice is not.
    pub const EXCLUSIVE_START: Self = Self {
        repeat_enable: Repeat::Reject,
        repeat_disable: Repeat::NoOp,
    };
}

/// On/off flag with policy-driven repeat handling.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Toggle {
    enabled: bool,
}

impl Toggle {
    pub(crate) fn is_enabled(self) -> bool {
        self.enabled
    }

    /// Returns whether moving to `target` requires a kernel change.
    ///
    /// A repeated transition yields `Ok(false)` or an error per `policy`.
    pub(crate) fn needs_change(
        self,
        target: bool,
        policy: TogglePolicy,
        subsystem: Subsystem,
    ) -> Result<bool, ControllerError> {
        if self.enabled != target {
            return Ok(true);
        }
        let repeat = if target {
            policy.repeat_enable
        } else {
            policy.repeat_disable
        };
        match (repeat, target) {
            (Repeat::NoOp, _) => Ok(false),
            (Repeat::Reject, true) => Err(ControllerError::AlreadyEnabled { subsystem }),
            (Repeat::Reject, false) => Err(ControllerError::NotEnabled { subsystem }),
        }
    }

    pub(crate) fn set(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

/// Locks controller state for mutation, reporting poisoning as an error.
pub(crate) fn lock_state<T>(
    subsystem: Subsystem,
    mutex: &Mutex<T>,
) -> Result<MutexGuard<'_, T>, ControllerError> {
    mutex
        .lock()
        .map_err(|_| ControllerError::Poisoned { subsystem })
}

/// Locks controller state for a pure read. Reads tolerate poisoning.
pub(crate) fn read_state<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Composition root holding the single instance of every controller.
///
/// Bootstrap builds exactly one `Controllers` and shares it with the
/// dispatcher behind an `Arc`; nothing else constructs controllers.
#[derive(Debug)]
pub struct Controllers {
    pub(crate) interface: InterfaceController,
    pub(crate) tether: TetherController,
    pub(crate) ipv6_tether: Ipv6TetherController,
    pub(crate) nat: NatController,
    pub(crate) ppp: PppController,
    pub(crate) pppoe: PppoeController,
    pub(crate) softap: SoftapController,
    pub(crate) bandwidth: BandwidthController,
    pub(crate) idletimer: IdletimerController,
    pub(crate) resolver: ResolverController,
    pub(crate) firewall: FirewallController,
    pub(crate) clatd: ClatdController,
    pub(crate) strict: StrictController,
    pub(crate) throttle: ThrottleController,
    pub(crate) dual_on: DualOnController,
    pub(crate) power: Arc<PowerState>,
    pub(crate) monitor: Arc<ThroughputMonitor>,
}

impl Controllers {
    /// Builds every controller against the shared kernel backend.
    pub fn new(
        config: &Config,
        backend: &Arc<dyn NetBackend>,
        power: Arc<PowerState>,
        monitor: Arc<ThroughputMonitor>,
    ) -> Self {
        let link = |subsystem| KernelLink::new(subsystem, Arc::clone(backend));
        Self {
            interface: InterfaceController::new(
                link(Subsystem::Interface),
                config.counter_root().to_path_buf(),
            ),
            tether: TetherController::new(link(Subsystem::Tether)),
            ipv6_tether: Ipv6TetherController::new(link(Subsystem::Ipv6Tether)),
            nat: NatController::new(link(Subsystem::Nat)),
            ppp: PppController::new(link(Subsystem::Ppp), PppController::default_ttys()),
            pppoe: PppoeController::new(link(Subsystem::Pppoe)),
            softap: SoftapController::new(link(Subsystem::Softap)),
            bandwidth: BandwidthController::new(link(Subsystem::Bandwidth)),
            idletimer: IdletimerController::new(link(Subsystem::Idletimer)),
            resolver: ResolverController::new(link(Subsystem::Resolver)),
            firewall: FirewallController::new(link(Subsystem::Firewall)),
            clatd: ClatdController::new(link(Subsystem::Clatd)),
            strict: StrictController::new(link(Subsystem::Strict)),
            throttle: ThrottleController::new(link(Subsystem::Throttle)),
            dual_on: DualOnController::new(link(Subsystem::DualOn)),
            power,
            monitor,
        }
    }

    /// Returns the controller owning `subsystem`.
    #[must_use]
    pub fn controller(&self, subsystem: Subsystem) -> &dyn Controller {
        match subsystem {
            Subsystem::Interface => &self.interface,
            Subsystem::Tether => &self.tether,
            Subsystem::Ipv6Tether => &self.ipv6_tether,
            Subsystem::Nat => &self.nat,
            Subsystem::Ppp => &self.ppp,
            Subsystem::Pppoe => &self.pppoe,
            Subsystem::Softap => &self.softap,
            Subsystem::Bandwidth => &self.bandwidth,
            Subsystem::Idletimer => &self.idletimer,
            Subsystem::Resolver => &self.resolver,
            Subsystem::Firewall => &self.firewall,
            Subsystem::Clatd => &self.clatd,
            Subsystem::Strict => &self.strict,
            Subsystem::Throttle => &self.throttle,
            Subsystem::DualOn => &self.dual_on,
        }
    }

    /// Returns the switchable controller owning `subsystem`, if it has one.
    #[must_use]
    pub fn switchable(&self, subsystem: Subsystem) -> Option<&dyn Switchable> {
        match subsystem {
            Subsystem::Tether => Some(&self.tether),
            Subsystem::Softap => Some(&self.softap),
            Subsystem::Bandwidth => Some(&self.bandwidth),
            Subsystem::Idletimer => Some(&self.idletimer),
            Subsystem::Firewall => Some(&self.firewall),
            Subsystem::Strict => Some(&self.strict),
            _ => None,
        }
    }

    /// Shared power-state controller.
    #[must_use]
    pub fn power(&self) -> &Arc<PowerState> {
        &self.power
    }

    /// Shared throughput monitor.
    #[must_use]
    pub fn monitor(&self) -> &Arc<ThroughputMonitor> {
        &self.monitor
    }
}
