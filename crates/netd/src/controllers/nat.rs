use std::collections::BTreeSet;
use std::sync::Mutex;

use super::{Controller, ControllerError, KernelLink, Subsystem, lock_state, read_state};

/// Owns masquerading between internal and external interfaces.
///
/// NAT is active while at least one pair is installed.
#[derive(Debug)]
pub struct NatController {
    kernel: KernelLink,
    pairs: Mutex<BTreeSet<(String, String)>>,
}

impl NatController {
    pub(crate) fn new(kernel: KernelLink) -> Self {
        Self {
            kernel,
            pairs: Mutex::new(BTreeSet::new()),
        }
    }

    /// Masquerades traffic from `internal` out of `external`.
    pub fn enable(&self, internal: &str, external: &str) -> Result<(), ControllerError> {
        let mut pairs = lock_state(Subsystem::Nat, &self.pairs)?;
        let key = (internal.to_owned(), external.to_owned());
        if pairs.contains(&key) {
            return Err(ControllerError::already_exists(format!(
                "nat {internal} -> {external}"
            )));
        }
        self.kernel
            .apply(format!("masquerade {internal} -> {external}"))?;
        pairs.insert(key);
        Ok(())
    }

    /// Removes a previously installed pair.
    pub fn disable(&self, internal: &str, external: &str) -> Result<(), ControllerError> {
        let mut pairs = lock_state(Subsystem::Nat, &self.pairs)?;
        let key = (internal.to_owned(), external.to_owned());
        if !pairs.contains(&key) {
            return Err(ControllerError::not_found(format!(
                "nat {internal} -> {external}"
            )));
        }
        self.kernel
            .apply(format!("remove masquerade {internal} -> {external}"))?;
        pairs.remove(&key);
        Ok(())
    }

    /// Installed pairs as `(internal, external)`.
    #[must_use]
    pub fn pairs(&self) -> Vec<(String, String)> {
        read_state(&self.pairs).iter().cloned().collect()
    }
}

impl Controller for NatController {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Nat
    }

    fn is_enabled(&self) -> bool {
        !read_state(&self.pairs).is_empty()
    }
}
