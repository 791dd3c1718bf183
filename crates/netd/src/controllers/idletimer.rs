use std::collections::BTreeSet;
use std::sync::Mutex;

use super::{
    Controller, ControllerError, KernelLink, Subsystem, Switchable, Toggle, TogglePolicy,
    lock_state, read_state,
};

const POLICY: TogglePolicy = TogglePolicy::IDEMPOTENT;

/// Idle timer attached to an interface.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct IdletimerEntry {
    /// Interface being watched.
    pub interface: String,
    /// Idle timeout in seconds.
    pub timeout_secs: u32,
    /// Label reported when the timer fires.
    pub label: String,
}

#[derive(Debug, Default)]
struct IdletimerState {
    toggle: Toggle,
    timers: BTreeSet<IdletimerEntry>,
}

/// Owns interface idle timers.
#[derive(Debug)]
pub struct IdletimerController {
    kernel: KernelLink,
    state: Mutex<IdletimerState>,
}

impl IdletimerController {
    pub(crate) fn new(kernel: KernelLink) -> Self {
        Self {
            kernel,
            state: Mutex::new(IdletimerState::default()),
        }
    }

    /// Attaches a timer. The controller must be enabled.
    pub fn add(&self, entry: IdletimerEntry) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Idletimer, &self.state)?;
        if !state.toggle.is_enabled() {
            return Err(ControllerError::NotEnabled {
                subsystem: Subsystem::Idletimer,
            });
        }
        if state.timers.contains(&entry) {
            return Err(ControllerError::already_exists(describe(&entry)));
        }
        self.kernel.apply(format!("add {}", describe(&entry)))?;
        state.timers.insert(entry);
        Ok(())
    }

    /// Detaches a timer.
    pub fn remove(&self, entry: &IdletimerEntry) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Idletimer, &self.state)?;
        if !state.timers.contains(entry) {
            return Err(ControllerError::not_found(describe(entry)));
        }
        self.kernel.apply(format!("remove {}", describe(entry)))?;
        state.timers.remove(entry);
        Ok(())
    }

    /// Attached timers.
    #[must_use]
    pub fn timers(&self) -> Vec<IdletimerEntry> {
        read_state(&self.state).timers.iter().cloned().collect()
    }
}

fn describe(entry: &IdletimerEntry) -> String {
    format!(
        "idletimer {} timeout={}s label={}",
        entry.interface, entry.timeout_secs, entry.label
    )
}

impl Controller for IdletimerController {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Idletimer
    }

    fn is_enabled(&self) -> bool {
        read_state(&self.state).toggle.is_enabled()
    }
}

impl Switchable for IdletimerController {
    fn enable(&self) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Idletimer, &self.state)?;
        if !state.toggle.needs_change(true, POLICY, Subsystem::Idletimer)? {
            return Ok(());
        }
        self.kernel.apply("install idletimer chains")?;
        state.toggle.set(true);
        Ok(())
    }

    fn disable(&self) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Idletimer, &self.state)?;
        if !state.toggle.needs_change(false, POLICY, Subsystem::Idletimer)? {
            return Ok(());
        }
        self.kernel.apply("remove idletimer chains")?;
        *state = IdletimerState::default();
        Ok(())
    }
}
