//! PPP over Ethernet sessions.

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{Controller, ControllerError, KernelLink, Subsystem, lock_state, read_state};

/// Credentials for one PPPoE dial.
#[derive(Clone, PartialEq, Eq)]
pub struct PppoeCredentials {
    /// Account name sent to the access concentrator.
    pub user: String,
    /// Account secret. Kept out of controller state and change descriptions.
    pub password: String,
}

impl std::fmt::Debug for PppoeCredentials {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PppoeCredentials")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Owns PPPoE sessions keyed by the Ethernet interface they ride on.
#[derive(Debug)]
pub struct PppoeController {
    kernel: KernelLink,
    sessions: Mutex<BTreeMap<String, String>>,
}

impl PppoeController {
    pub(crate) fn new(kernel: KernelLink) -> Self {
        Self {
            kernel,
            sessions: Mutex::new(BTreeMap::new()),
        }
    }

    /// Dials a session over `interface`.
    pub fn start(
        &self,
        interface: &str,
        credentials: PppoeCredentials,
    ) -> Result<(), ControllerError> {
        let mut sessions = lock_state(Subsystem::Pppoe, &self.sessions)?;
        if sessions.contains_key(interface) {
            return Err(ControllerError::already_exists(format!(
                "pppoe session on {interface}"
            )));
        }
        self.kernel.apply(format!(
            "dial pppoe on {interface} user={}",
            credentials.user
        ))?;
        sessions.insert(interface.to_owned(), credentials.user);
        Ok(())
    }

    /// Hangs up the session over `interface`.
    pub fn stop(&self, interface: &str) -> Result<(), ControllerError> {
        let mut sessions = lock_state(Subsystem::Pppoe, &self.sessions)?;
        if !sessions.contains_key(interface) {
            return Err(ControllerError::not_found(format!(
                "pppoe session on {interface}"
            )));
        }
        self.kernel.apply(format!("hang up pppoe on {interface}"))?;
        sessions.remove(interface);
        Ok(())
    }

    /// User of the session over `interface`, if one is up.
    #[must_use]
    pub fn session(&self, interface: &str) -> Option<String> {
        read_state(&self.sessions).get(interface).cloned()
    }
}

impl Controller for PppoeController {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Pppoe
    }

    fn is_enabled(&self) -> bool {
        !read_state(&self.sessions).is_empty()
    }
}
