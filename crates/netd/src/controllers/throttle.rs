use std::collections::BTreeMap;
use std::sync::Mutex;

use strum::{Display, EnumString};

use super::{Controller, ControllerError, KernelLink, Subsystem, lock_state, read_state};

/// Traffic direction of a rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ThrottleDirection {
    /// Ingress.
    Rx,
    /// Egress.
    Tx,
}

/// Rate limits of one interface in kilobits per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThrottleLimits {
    /// Ingress limit.
    pub rx_kbps: u32,
    /// Egress limit.
    pub tx_kbps: u32,
}

impl ThrottleLimits {
    /// Limit in `direction`.
    #[must_use]
    pub fn get(self, direction: ThrottleDirection) -> u32 {
        match direction {
            ThrottleDirection::Rx => self.rx_kbps,
            ThrottleDirection::Tx => self.tx_kbps,
        }
    }
}

/// Owns per-interface rate limits.
#[derive(Debug)]
pub struct ThrottleController {
    kernel: KernelLink,
    limits: Mutex<BTreeMap<String, ThrottleLimits>>,
}

impl ThrottleController {
    pub(crate) fn new(kernel: KernelLink) -> Self {
        Self {
            kernel,
            limits: Mutex::new(BTreeMap::new()),
        }
    }

    /// Installs or replaces the limits of `interface`.
    pub fn set(&self, interface: &str, limits: ThrottleLimits) -> Result<(), ControllerError> {
        let mut table = lock_state(Subsystem::Throttle, &self.limits)?;
        self.kernel.apply(format!(
            "shape {interface} rx={}kbps tx={}kbps",
            limits.rx_kbps, limits.tx_kbps
        ))?;
        table.insert(interface.to_owned(), limits);
        Ok(())
    }

    /// Limit of `interface` in `direction`; zero when unthrottled.
    #[must_use]
    pub fn get(&self, interface: &str, direction: ThrottleDirection) -> u32 {
        read_state(&self.limits)
            .get(interface)
            .copied()
            .unwrap_or_default()
            .get(direction)
    }

    /// Removes the limits of `interface`. Unthrottled interfaces are left alone.
    pub fn reset(&self, interface: &str) -> Result<(), ControllerError> {
        let mut table = lock_state(Subsystem::Throttle, &self.limits)?;
        if !table.contains_key(interface) {
            return Ok(());
        }
        self.kernel.apply(format!("remove shaping on {interface}"))?;
        table.remove(interface);
        Ok(())
    }
}

impl Controller for ThrottleController {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Throttle
    }

    fn is_enabled(&self) -> bool {
        !read_state(&self.limits).is_empty()
    }
}
