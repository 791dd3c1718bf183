//! Tethering: DHCP service, tethered interfaces, DNS forwarders and the
//! IP forwarding switch shared by everything that routes traffic.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Mutex;

use strum::Display;

use super::{
    Controller, ControllerError, KernelLink, Subsystem, Switchable, Toggle, TogglePolicy,
    lock_state, read_state,
};

const POLICY: TogglePolicy = TogglePolicy::EXCLUSIVE_START;

/// Inclusive IPv4 range leased by the tethering DHCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DhcpRange {
    /// First leased address.
    pub start: Ipv4Addr,
    /// Last leased address.
    pub end: Ipv4Addr,
}

impl fmt::Display for DhcpRange {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}-{}", self.start, self.end)
    }
}

/// Address family whose forwarding switch a requester holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
pub enum IpFamily {
    /// IPv4 forwarding.
    #[strum(serialize = "ipv4")]
    V4,
    /// IPv6 forwarding.
    #[strum(serialize = "ipv6")]
    V6,
}

impl IpFamily {
    fn sysctl(self) -> &'static str {
        match self {
            Self::V4 => "ip_forward",
            Self::V6 => "ipv6_forward",
        }
    }
}

#[derive(Debug, Default)]
struct TetherState {
    service: Toggle,
    ranges: Vec<DhcpRange>,
    interfaces: BTreeSet<String>,
    dns_net_id: Option<u32>,
    dns_forwarders: Vec<IpAddr>,
    forwarding_requesters: BTreeMap<IpFamily, BTreeSet<String>>,
}

/// Owns tethering state.
#[derive(Debug)]
pub struct TetherController {
    kernel: KernelLink,
    state: Mutex<TetherState>,
}

impl TetherController {
    pub(crate) fn new(kernel: KernelLink) -> Self {
        Self {
            kernel,
            state: Mutex::new(TetherState::default()),
        }
    }

    /// Starts the DHCP/DNS service with the given lease ranges.
    pub fn start(&self, ranges: Vec<DhcpRange>) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Tether, &self.state)?;
        if !state.service.needs_change(true, POLICY, Subsystem::Tether)? {
            return Ok(());
        }
        let listed = ranges
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.kernel.apply(format!("start dhcp service ranges=[{listed}]"))?;
        state.service.set(true);
        state.ranges = ranges;
        Ok(())
    }

    /// Stops the DHCP/DNS service.
    pub fn stop(&self) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Tether, &self.state)?;
        if !state.service.needs_change(false, POLICY, Subsystem::Tether)? {
            return Ok(());
        }
        self.kernel.apply("stop dhcp service")?;
        state.service.set(false);
        state.ranges.clear();
        Ok(())
    }

    /// DHCP ranges of the running service.
    #[must_use]
    pub fn ranges(&self) -> Vec<DhcpRange> {
        read_state(&self.state).ranges.clone()
    }

    /// Adds an interface to the tethered set.
    pub fn add_interface(&self, name: &str) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Tether, &self.state)?;
        if state.interfaces.contains(name) {
            return Err(ControllerError::already_exists(format!(
                "tethered interface {name}"
            )));
        }
        self.kernel.apply(format!("tether interface {name}"))?;
        state.interfaces.insert(name.to_owned());
        Ok(())
    }

    /// Removes an interface from the tethered set.
    pub fn remove_interface(&self, name: &str) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Tether, &self.state)?;
        if !state.interfaces.contains(name) {
            return Err(ControllerError::not_found(format!(
                "tethered interface {name}"
            )));
        }
        self.kernel.apply(format!("untether interface {name}"))?;
        state.interfaces.remove(name);
        Ok(())
    }

    /// Tethered interfaces in name order.
    #[must_use]
    pub fn interfaces(&self) -> Vec<String> {
        read_state(&self.state).interfaces.iter().cloned().collect()
    }

    /// Replaces the upstream DNS servers used by the forwarder.
    pub fn set_dns_forwarders(
        &self,
        net_id: u32,
        servers: Vec<IpAddr>,
    ) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Tether, &self.state)?;
        let listed = servers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.kernel
            .apply(format!("set dns forwarders netid={net_id} servers=[{listed}]"))?;
        state.dns_net_id = Some(net_id);
        state.dns_forwarders = servers;
        Ok(())
    }

    /// Network and servers the DNS forwarder targets.
    #[must_use]
    pub fn dns_forwarders(&self) -> (Option<u32>, Vec<IpAddr>) {
        let state = read_state(&self.state);
        (state.dns_net_id, state.dns_forwarders.clone())
    }

    /// Registers `requester` as needing `family` forwarding.
    ///
    /// Forwarding is switched on in the kernel when the first requester of a
    /// family arrives. Registering the same requester twice is a no-op.
    pub fn enable_forwarding(
        &self,
        family: IpFamily,
        requester: &str,
    ) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Tether, &self.state)?;
        let requesters = state.forwarding_requesters.entry(family).or_default();
        if requesters.contains(requester) {
            return Ok(());
        }
        if requesters.is_empty() {
            self.kernel.apply(format!("{}=1", family.sysctl()))?;
        }
        requesters.insert(requester.to_owned());
        Ok(())
    }

    /// Drops `requester`; `family` forwarding is switched off after the last one.
    pub fn disable_forwarding(
        &self,
        family: IpFamily,
        requester: &str,
    ) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Tether, &self.state)?;
        let requesters = state.forwarding_requesters.entry(family).or_default();
        if !requesters.contains(requester) {
            return Err(ControllerError::not_found(format!(
                "{family} forwarding requester {requester}"
            )));
        }
        if requesters.len() == 1 {
            self.kernel.apply(format!("{}=0", family.sysctl()))?;
        }
        requesters.remove(requester);
        Ok(())
    }

    /// Whether any requester holds `family` forwarding on.
    #[must_use]
    pub fn forwarding_enabled(&self, family: IpFamily) -> bool {
        read_state(&self.state)
            .forwarding_requesters
            .get(&family)
            .is_some_and(|requesters| !requesters.is_empty())
    }
}

impl Controller for TetherController {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Tether
    }

    fn is_enabled(&self) -> bool {
        read_state(&self.state).service.is_enabled()
    }
}

impl Switchable for TetherController {
    fn enable(&self) -> Result<(), ControllerError> {
        self.start(Vec::new())
    }

    fn disable(&self) -> Result<(), ControllerError> {
        self.stop()
    }
}
