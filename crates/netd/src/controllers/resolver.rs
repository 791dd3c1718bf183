use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Mutex;

use super::{Controller, ControllerError, KernelLink, Subsystem, lock_state, read_state};

/// DNS settings of one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverSettings {
    /// Search domains.
    pub domains: Vec<String>,
    /// Name servers in priority order.
    pub servers: Vec<IpAddr>,
}

/// Owns per-network resolver configuration.
#[derive(Debug)]
pub struct ResolverController {
    kernel: KernelLink,
    networks: Mutex<BTreeMap<u32, ResolverSettings>>,
}

impl ResolverController {
    pub(crate) fn new(kernel: KernelLink) -> Self {
        Self {
            kernel,
            networks: Mutex::new(BTreeMap::new()),
        }
    }

    /// Installs or replaces the settings of `net_id`.
    pub fn set(&self, net_id: u32, settings: ResolverSettings) -> Result<(), ControllerError> {
        let mut networks = lock_state(Subsystem::Resolver, &self.networks)?;
        self.kernel.apply(format!(
            "net {net_id} servers={} domains={}",
            join(&settings.servers),
            settings.domains.join(",")
        ))?;
        networks.insert(net_id, settings);
        Ok(())
    }

    /// Drops the settings of `net_id`. Unconfigured networks are left alone.
    pub fn clear(&self, net_id: u32) -> Result<(), ControllerError> {
        let mut networks = lock_state(Subsystem::Resolver, &self.networks)?;
        if !networks.contains_key(&net_id) {
            return Ok(());
        }
        self.kernel.apply(format!("clear net {net_id}"))?;
        networks.remove(&net_id);
        Ok(())
    }

    /// Settings of `net_id`.
    pub fn get(&self, net_id: u32) -> Result<ResolverSettings, ControllerError> {
        read_state(&self.networks)
            .get(&net_id)
            .cloned()
            .ok_or_else(|| ControllerError::not_found(format!("resolver net {net_id}")))
    }

    /// Flushes the answer cache of `net_id`.
    pub fn flush(&self, net_id: u32) -> Result<(), ControllerError> {
        let _networks = lock_state(Subsystem::Resolver, &self.networks)?;
        self.kernel.apply(format!("flush cache of net {net_id}"))
    }
}

fn join(servers: &[IpAddr]) -> String {
    servers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

impl Controller for ResolverController {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Resolver
    }

    fn is_enabled(&self) -> bool {
        !read_state(&self.networks).is_empty()
    }
}
