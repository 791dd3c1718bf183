//! IPv6 tethering: prefix delegation and neighbour proxying from an upstream
//! interface onto a tethered one.

use std::collections::BTreeSet;
use std::sync::Mutex;

use super::{Controller, ControllerError, KernelLink, Subsystem, lock_state, read_state};

/// Owns IPv6 tethering between internal and external interfaces.
///
/// Active while at least one pair is installed.
#[derive(Debug)]
pub struct Ipv6TetherController {
    kernel: KernelLink,
    pairs: Mutex<BTreeSet<(String, String)>>,
}

impl Ipv6TetherController {
    pub(crate) fn new(kernel: KernelLink) -> Self {
        Self {
            kernel,
            pairs: Mutex::new(BTreeSet::new()),
        }
    }

    /// Shares the IPv6 prefix of `external` with clients on `internal`.
    pub fn enable(&self, internal: &str, external: &str) -> Result<(), ControllerError> {
        let mut pairs = lock_state(Subsystem::Ipv6Tether, &self.pairs)?;
        let key = (internal.to_owned(), external.to_owned());
        if pairs.contains(&key) {
            return Err(ControllerError::already_exists(format!(
                "ipv6 tether {internal} <- {external}"
            )));
        }
        self.kernel
            .apply(format!("proxy ipv6 prefix {external} -> {internal}"))?;
        pairs.insert(key);
        Ok(())
    }

    /// Stops sharing a previously shared prefix.
    pub fn disable(&self, internal: &str, external: &str) -> Result<(), ControllerError> {
        let mut pairs = lock_state(Subsystem::Ipv6Tether, &self.pairs)?;
        let key = (internal.to_owned(), external.to_owned());
        if !pairs.contains(&key) {
            return Err(ControllerError::not_found(format!(
                "ipv6 tether {internal} <- {external}"
            )));
        }
        self.kernel
            .apply(format!("stop ipv6 prefix proxy {external} -> {internal}"))?;
        pairs.remove(&key);
        Ok(())
    }

    /// Installed pairs as `(internal, external)`.
    #[must_use]
    pub fn pairs(&self) -> Vec<(String, String)> {
        read_state(&self.pairs).iter().cloned().collect()
    }
}

impl Controller for Ipv6TetherController {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Ipv6Tether
    }

    fn is_enabled(&self) -> bool {
        !read_state(&self.pairs).is_empty()
    }
}
