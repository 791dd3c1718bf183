use std::collections::BTreeMap;
use std::sync::Mutex;

use strum::{Display, EnumString};

use super::{
    Controller, ControllerError, KernelLink, Subsystem, Switchable, Toggle, TogglePolicy,
    lock_state, read_state,
};

const POLICY: TogglePolicy = TogglePolicy::IDEMPOTENT;

/// Treatment of cleartext traffic from a uid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum CleartextPenalty {
    /// Let the traffic through.
    Accept,
    /// Let the traffic through and log it.
    Log,
    /// Drop the traffic.
    Reject,
}

#[derive(Debug, Default)]
struct StrictState {
    toggle: Toggle,
    policies: BTreeMap<u32, CleartextPenalty>,
}

/// Owns cleartext traffic policing.
#[derive(Debug)]
pub struct StrictController {
    kernel: KernelLink,
    state: Mutex<StrictState>,
}

impl StrictController {
    pub(crate) fn new(kernel: KernelLink) -> Self {
        Self {
            kernel,
            state: Mutex::new(StrictState::default()),
        }
    }

    /// Sets the cleartext policy of `uid`. `Accept` removes any override.
    pub fn set_uid_cleartext_policy(
        &self,
        uid: u32,
        penalty: CleartextPenalty,
    ) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Strict, &self.state)?;
        self.kernel
            .apply(format!("uid {uid} cleartext={penalty}"))?;
        if penalty == CleartextPenalty::Accept {
            state.policies.remove(&uid);
        } else {
            state.policies.insert(uid, penalty);
        }
        Ok(())
    }

    /// Policy applied to `uid`.
    #[must_use]
    pub fn uid_cleartext_policy(&self, uid: u32) -> CleartextPenalty {
        read_state(&self.state)
            .policies
            .get(&uid)
            .copied()
            .unwrap_or(CleartextPenalty::Accept)
    }
}

impl Controller for StrictController {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Strict
    }

    fn is_enabled(&self) -> bool {
        read_state(&self.state).toggle.is_enabled()
    }
}

impl Switchable for StrictController {
    fn enable(&self) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Strict, &self.state)?;
        if !state.toggle.needs_change(true, POLICY, Subsystem::Strict)? {
            return Ok(());
        }
        self.kernel.apply("install strict chains")?;
        state.toggle.set(true);
        Ok(())
    }

    fn disable(&self) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Strict, &self.state)?;
        if !state.toggle.needs_change(false, POLICY, Subsystem::Strict)? {
            return Ok(());
        }
        self.kernel.apply("remove strict chains")?;
        *state = StrictState::default();
        Ok(())
    }
}
