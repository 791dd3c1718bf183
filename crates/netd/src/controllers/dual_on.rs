use std::fmt;
use std::sync::Mutex;

use super::{Controller, ControllerError, KernelLink, Subsystem, lock_state, read_state};

/// The two uplinks kept active together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DualOnPair {
    /// Uplink carrying the default route.
    pub primary: String,
    /// Uplink kept alive alongside the primary.
    pub secondary: String,
}

impl fmt::Display for DualOnPair {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} {}", self.primary, self.secondary)
    }
}

/// Owns simultaneous use of two uplinks.
///
/// Enabling while enabled is rejected so a second pair cannot silently
/// replace the first; disabling while disabled does nothing.
#[derive(Debug)]
pub struct DualOnController {
    kernel: KernelLink,
    pair: Mutex<Option<DualOnPair>>,
}

impl DualOnController {
    pub(crate) fn new(kernel: KernelLink) -> Self {
        Self {
            kernel,
            pair: Mutex::new(None),
        }
    }

    /// Activates both uplinks.
    pub fn enable(&self, pair: DualOnPair) -> Result<(), ControllerError> {
        let mut current = lock_state(Subsystem::DualOn, &self.pair)?;
        if current.is_some() {
            return Err(ControllerError::AlreadyEnabled {
                subsystem: Subsystem::DualOn,
            });
        }
        self.kernel.apply(format!("activate uplinks {pair}"))?;
        *current = Some(pair);
        Ok(())
    }

    /// Returns to a single uplink.
    pub fn disable(&self) -> Result<(), ControllerError> {
        let mut current = lock_state(Subsystem::DualOn, &self.pair)?;
        let Some(pair) = current.as_ref() else {
            return Ok(());
        };
        self.kernel.apply(format!("deactivate secondary {}", pair.secondary))?;
        *current = None;
        Ok(())
    }

    /// Active pair, if any.
    #[must_use]
    pub fn status(&self) -> Option<DualOnPair> {
        read_state(&self.pair).clone()
    }
}

impl Controller for DualOnController {
    fn subsystem(&self) -> Subsystem {
        Subsystem::DualOn
    }

    fn is_enabled(&self) -> bool {
        read_state(&self.pair).is_some()
    }
}
