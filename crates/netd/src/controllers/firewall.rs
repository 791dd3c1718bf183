//! Packet filtering: interface, egress and per-uid rules, plus the power
//! saving child chains.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::sync::Mutex;

use strum::{Display, EnumString};

use super::{
    Controller, ControllerError, KernelLink, Subsystem, Switchable, Toggle, TogglePolicy,
    lock_state, read_state,
};

const POLICY: TogglePolicy = TogglePolicy::IDEMPOTENT;

/// Default verdict of the firewall.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum FirewallType {
    /// Drop everything that is not explicitly allowed.
    Whitelist,
    /// Accept everything that is not explicitly denied.
    #[default]
    Blacklist,
}

/// Verdict attached to a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum FirewallRule {
    /// Accept matching traffic.
    Allow,
    /// Drop matching traffic.
    Deny,
}

/// Chain a uid rule is installed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ChildChain {
    /// The main firewall chain.
    None,
    /// Chain consulted while the device dozes.
    Dozable,
    /// Chain consulted for apps in standby.
    Standby,
}

#[derive(Debug, Default)]
struct FirewallState {
    toggle: Toggle,
    kind: FirewallType,
    interface_rules: BTreeMap<String, FirewallRule>,
    egress_source_rules: BTreeMap<IpAddr, FirewallRule>,
    egress_dest_rules: BTreeMap<(IpAddr, u16), FirewallRule>,
    uid_rules: BTreeMap<(ChildChain, u32), FirewallRule>,
    active_chains: BTreeSet<ChildChain>,
}

/// Owns firewall state.
#[derive(Debug)]
pub struct FirewallController {
    kernel: KernelLink,
    state: Mutex<FirewallState>,
}

impl FirewallController {
    pub(crate) fn new(kernel: KernelLink) -> Self {
        Self {
            kernel,
            state: Mutex::new(FirewallState::default()),
        }
    }

    /// Enables the firewall, switching its default verdict when it differs.
    pub fn enable_with(&self, kind: FirewallType) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Firewall, &self.state)?;
        let changes = state.toggle.needs_change(true, POLICY, Subsystem::Firewall)?;
        if !changes && state.kind == kind {
            return Ok(());
        }
        self.kernel.apply(format!("enable firewall type={kind}"))?;
        state.toggle.set(true);
        state.kind = kind;
        Ok(())
    }

    /// Default verdict currently installed.
    #[must_use]
    pub fn firewall_type(&self) -> FirewallType {
        read_state(&self.state).kind
    }

    /// Sets the verdict for traffic on `interface`.
    pub fn set_interface_rule(
        &self,
        interface: &str,
        rule: FirewallRule,
    ) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Firewall, &self.state)?;
        self.kernel
            .apply(format!("interface {interface} rule={rule}"))?;
        state.interface_rules.insert(interface.to_owned(), rule);
        Ok(())
    }

    /// Sets the verdict for egress traffic from `source`.
    pub fn set_egress_source_rule(
        &self,
        source: IpAddr,
        rule: FirewallRule,
    ) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Firewall, &self.state)?;
        self.kernel
            .apply(format!("egress source {source} rule={rule}"))?;
        state.egress_source_rules.insert(source, rule);
        Ok(())
    }

    /// Sets the verdict for egress traffic to `destination:port`.
    pub fn set_egress_dest_rule(
        &self,
        destination: IpAddr,
        port: u16,
        rule: FirewallRule,
    ) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Firewall, &self.state)?;
        self.kernel
            .apply(format!("egress dest {destination}:{port} rule={rule}"))?;
        state.egress_dest_rules.insert((destination, port), rule);
        Ok(())
    }

    /// Sets the verdict for `uid` in `chain`.
    pub fn set_uid_rule(
        &self,
        chain: ChildChain,
        uid: u32,
        rule: FirewallRule,
    ) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Firewall, &self.state)?;
        self.kernel
            .apply(format!("uid {uid} chain={chain} rule={rule}"))?;
        state.uid_rules.insert((chain, uid), rule);
        Ok(())
    }

    /// Verdict recorded for `uid` in `chain`.
    #[must_use]
    pub fn uid_rule(&self, chain: ChildChain, uid: u32) -> Option<FirewallRule> {
        read_state(&self.state).uid_rules.get(&(chain, uid)).copied()
    }

    /// Attaches or detaches a child chain. Repeats are no-ops.
    pub fn set_chain_enabled(
        &self,
        chain: ChildChain,
        enabled: bool,
    ) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Firewall, &self.state)?;
        if state.active_chains.contains(&chain) == enabled {
            return Ok(());
        }
        let verb = if enabled { "attach" } else { "detach" };
        self.kernel.apply(format!("{verb} chain {chain}"))?;
        if enabled {
            state.active_chains.insert(chain);
        } else {
            state.active_chains.remove(&chain);
        }
        Ok(())
    }

    /// Whether `chain` is attached.
    #[must_use]
    pub fn chain_enabled(&self, chain: ChildChain) -> bool {
        read_state(&self.state).active_chains.contains(&chain)
    }
}

impl Controller for FirewallController {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Firewall
    }

    fn is_enabled(&self) -> bool {
        read_state(&self.state).toggle.is_enabled()
    }
}

impl Switchable for FirewallController {
    fn enable(&self) -> Result<(), ControllerError> {
        let kind = read_state(&self.state).kind;
        self.enable_with(kind)
    }

    /// Disabling flushes every rule and detaches every child chain.
    fn disable(&self) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Firewall, &self.state)?;
        if !state.toggle.needs_change(false, POLICY, Subsystem::Firewall)? {
            return Ok(());
        }
        self.kernel.apply("disable firewall and flush rules")?;
        *state = FirewallState::default();
        Ok(())
    }
}
