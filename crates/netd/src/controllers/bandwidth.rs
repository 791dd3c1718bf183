//! Bandwidth accounting: per-interface quotas, the global alert and the
//! naughty/nice application lists.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use super::{
    Controller, ControllerError, KernelLink, Subsystem, Switchable, Toggle, TogglePolicy,
    lock_state, read_state,
};

const POLICY: TogglePolicy = TogglePolicy::IDEMPOTENT;

#[derive(Debug, Default)]
struct BandwidthState {
    toggle: Toggle,
    interface_quotas: BTreeMap<String, u64>,
    global_alert: Option<u64>,
    naughty_apps: BTreeSet<u32>,
    nice_apps: BTreeSet<u32>,
}

/// Which special application list an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppList {
    /// Apps whose traffic is rejected once quota is reached.
    Naughty,
    /// Apps exempt from quota enforcement.
    Nice,
}

impl AppList {
    fn label(self) -> &'static str {
        match self {
            Self::Naughty => "naughty",
            Self::Nice => "nice",
        }
    }
}

/// Owns bandwidth accounting state.
#[derive(Debug)]
pub struct BandwidthController {
    kernel: KernelLink,
    state: Mutex<BandwidthState>,
}

impl BandwidthController {
    pub(crate) fn new(kernel: KernelLink) -> Self {
        Self {
            kernel,
            state: Mutex::new(BandwidthState::default()),
        }
    }

    /// Sets or replaces the quota of `interface`.
    pub fn set_interface_quota(&self, interface: &str, bytes: u64) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Bandwidth, &self.state)?;
        self.kernel
            .apply(format!("quota {interface} bytes={bytes}"))?;
        state.interface_quotas.insert(interface.to_owned(), bytes);
        Ok(())
    }

    /// Removes the quota of `interface`.
    pub fn remove_interface_quota(&self, interface: &str) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Bandwidth, &self.state)?;
        if !state.interface_quotas.contains_key(interface) {
            return Err(ControllerError::not_found(format!("quota for {interface}")));
        }
        self.kernel.apply(format!("remove quota {interface}"))?;
        state.interface_quotas.remove(interface);
        Ok(())
    }

    /// Quota configured for `interface`.
    pub fn interface_quota(&self, interface: &str) -> Result<u64, ControllerError> {
        read_state(&self.state)
            .interface_quotas
            .get(interface)
            .copied()
            .ok_or_else(|| ControllerError::not_found(format!("quota for {interface}")))
    }

    /// Sets or replaces the global alert threshold.
    pub fn set_global_alert(&self, bytes: u64) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Bandwidth, &self.state)?;
        self.kernel.apply(format!("global alert bytes={bytes}"))?;
        state.global_alert = Some(bytes);
        Ok(())
    }

    /// Removes the global alert.
    pub fn remove_global_alert(&self) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Bandwidth, &self.state)?;
        if state.global_alert.is_none() {
            return Err(ControllerError::not_found("global alert"));
        }
        self.kernel.apply("remove global alert")?;
        state.global_alert = None;
        Ok(())
    }

    /// Global alert threshold, when set.
    #[must_use]
    pub fn global_alert(&self) -> Option<u64> {
        read_state(&self.state).global_alert
    }

    /// Adds uids to an application list. Uids already present are ignored.
    pub fn add_apps(&self, list: AppList, uids: &[u32]) -> Result<(), ControllerError> {
        self.update_apps(list, uids, true)
    }

    /// Removes uids from an application list. Absent uids are ignored.
    pub fn remove_apps(&self, list: AppList, uids: &[u32]) -> Result<(), ControllerError> {
        self.update_apps(list, uids, false)
    }

    /// Uids in an application list.
    #[must_use]
    pub fn apps(&self, list: AppList) -> Vec<u32> {
        let state = read_state(&self.state);
        let set = match list {
            AppList::Naughty => &state.naughty_apps,
            AppList::Nice => &state.nice_apps,
        };
        set.iter().copied().collect()
    }

    fn update_apps(&self, list: AppList, uids: &[u32], add: bool) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Bandwidth, &self.state)?;
        let verb = if add { "add" } else { "remove" };
        let listed = uids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.kernel
            .apply(format!("{verb} {} apps [{listed}]", list.label()))?;
        let set = match list {
            AppList::Naughty => &mut state.naughty_apps,
            AppList::Nice => &mut state.nice_apps,
        };
        for uid in uids {
            if add {
                set.insert(*uid);
            } else {
                set.remove(uid);
            }
        }
        Ok(())
    }
}

impl Controller for BandwidthController {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Bandwidth
    }

    fn is_enabled(&self) -> bool {
        read_state(&self.state).toggle.is_enabled()
    }
}

impl Switchable for BandwidthController {
    fn enable(&self) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Bandwidth, &self.state)?;
        if !state.toggle.needs_change(true, POLICY, Subsystem::Bandwidth)? {
            return Ok(());
        }
        self.kernel.apply("install accounting chains")?;
        state.toggle.set(true);
        Ok(())
    }

    /// Disabling tears down the chains along with every quota and list.
    fn disable(&self) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Bandwidth, &self.state)?;
        if !state.toggle.needs_change(false, POLICY, Subsystem::Bandwidth)? {
            return Ok(());
        }
        self.kernel.apply("remove accounting chains")?;
        *state = BandwidthState::default();
        Ok(())
    }
}
