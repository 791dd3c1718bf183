use std::collections::BTreeSet;
use std::sync::Mutex;

use super::{Controller, ControllerError, KernelLink, Subsystem, lock_state, read_state};

/// Owns the per-interface 464XLAT daemons.
///
/// Starting a daemon that already runs, or stopping one that does not, is an
/// error.
#[derive(Debug)]
pub struct ClatdController {
    kernel: KernelLink,
    running: Mutex<BTreeSet<String>>,
}

impl ClatdController {
    pub(crate) fn new(kernel: KernelLink) -> Self {
        Self {
            kernel,
            running: Mutex::new(BTreeSet::new()),
        }
    }

    /// Starts clatd on `interface`.
    pub fn start(&self, interface: &str) -> Result<(), ControllerError> {
        let mut running = lock_state(Subsystem::Clatd, &self.running)?;
        if running.contains(interface) {
            return Err(ControllerError::already_exists(format!(
                "clatd on {interface}"
            )));
        }
        self.kernel.apply(format!("start clatd on {interface}"))?;
        running.insert(interface.to_owned());
        Ok(())
    }

    /// Stops clatd on `interface`.
    pub fn stop(&self, interface: &str) -> Result<(), ControllerError> {
        let mut running = lock_state(Subsystem::Clatd, &self.running)?;
        if !running.contains(interface) {
            return Err(ControllerError::not_found(format!("clatd on {interface}")));
        }
        self.kernel.apply(format!("stop clatd on {interface}"))?;
        running.remove(interface);
        Ok(())
    }

    /// Whether clatd runs on `interface`.
    #[must_use]
    pub fn is_running(&self, interface: &str) -> bool {
        read_state(&self.running).contains(interface)
    }
}

impl Controller for ClatdController {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Clatd
    }

    fn is_enabled(&self) -> bool {
        !read_state(&self.running).is_empty()
    }
}
