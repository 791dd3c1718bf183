use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Mutex;

use super::{Controller, ControllerError, KernelLink, Subsystem, lock_state, read_state};

/// Parameters of a PPP link attached to a tty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PppLink {
    /// Local address of the link.
    pub local: Ipv4Addr,
    /// Peer address of the link.
    pub remote: Ipv4Addr,
    /// Primary DNS server pushed to the peer.
    pub dns1: Ipv4Addr,
    /// Secondary DNS server pushed to the peer.
    pub dns2: Ipv4Addr,
}

/// Owns PPP links over USB gadget serial ports.
#[derive(Debug)]
pub struct PppController {
    kernel: KernelLink,
    ttys: Vec<String>,
    links: Mutex<BTreeMap<String, PppLink>>,
}

impl PppController {
    pub(crate) fn new(kernel: KernelLink, ttys: Vec<String>) -> Self {
        Self {
            kernel,
            ttys,
            links: Mutex::new(BTreeMap::new()),
        }
    }

    /// Gadget serial ports available for PPP.
    pub(crate) fn default_ttys() -> Vec<String> {
        vec!["ttyGS0".to_owned(), "ttyGS1".to_owned()]
    }

    /// Ttys that can carry a link.
    #[must_use]
    pub fn ttys(&self) -> &[String] {
        &self.ttys
    }

    /// Whether `tty` is one of the available ttys.
    #[must_use]
    pub fn knows_tty(&self, tty: &str) -> bool {
        self.ttys.iter().any(|known| known == tty)
    }

    /// Starts pppd on `tty`.
    pub fn attach(&self, tty: &str, link: PppLink) -> Result<(), ControllerError> {
        let mut links = lock_state(Subsystem::Ppp, &self.links)?;
        if links.contains_key(tty) {
            return Err(ControllerError::already_exists(format!("pppd on {tty}")));
        }
        self.kernel.apply(format!(
            "start pppd on {tty} local={} remote={} dns={},{}",
            link.local, link.remote, link.dns1, link.dns2
        ))?;
        links.insert(tty.to_owned(), link);
        Ok(())
    }

    /// Stops pppd on `tty`.
    pub fn detach(&self, tty: &str) -> Result<(), ControllerError> {
        let mut links = lock_state(Subsystem::Ppp, &self.links)?;
        if !links.contains_key(tty) {
            return Err(ControllerError::not_found(format!("pppd on {tty}")));
        }
        self.kernel.apply(format!("stop pppd on {tty}"))?;
        links.remove(tty);
        Ok(())
    }

    /// Link attached to `tty`.
    #[must_use]
    pub fn link(&self, tty: &str) -> Option<PppLink> {
        read_state(&self.links).get(tty).cloned()
    }
}

impl Controller for PppController {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Ppp
    }

    fn is_enabled(&self) -> bool {
        !read_state(&self.links).is_empty()
    }
}
