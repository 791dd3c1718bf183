//! Interface addressing, link flags, MTU and IPv6 state.
//!
//! The set of known interfaces is the union of the directories under the
//! counter root (`/sys/class/net` on a device) and the interfaces this
//! controller has configured.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Mutex;

use camino::Utf8PathBuf;
use strum::{Display, EnumString};
use tracing::debug;

use super::{
    CONTROLLERS_TARGET, Controller, ControllerError, KernelLink, Subsystem, lock_state,
    read_state,
};

/// Link flag accepted by `setcfg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum InterfaceFlag {
    /// Administratively up.
    Up,
    /// Administratively down.
    Down,
}

/// Configuration of one interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceConfig {
    /// Primary address.
    pub address: IpAddr,
    /// Prefix length of the primary address.
    pub prefix_length: u8,
    /// Whether the link is up.
    pub up: bool,
    /// MTU, when set explicitly.
    pub mtu: Option<u32>,
    /// Whether IPv6 is enabled.
    pub ipv6: bool,
}

impl Default for InterfaceConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            prefix_length: 0,
            up: false,
            mtu: None,
            ipv6: false,
        }
    }
}

impl fmt::Display for InterfaceConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let link = if self.up {
            InterfaceFlag::Up
        } else {
            InterfaceFlag::Down
        };
        write!(formatter, "{} {} {link}", self.address, self.prefix_length)?;
        if let Some(mtu) = self.mtu {
            write!(formatter, " mtu {mtu}")?;
        }
        if self.ipv6 {
            formatter.write_str(" ipv6")?;
        }
        Ok(())
    }
}

/// Owns per-interface configuration.
#[derive(Debug)]
pub struct InterfaceController {
    kernel: KernelLink,
    counter_root: Utf8PathBuf,
    configs: Mutex<BTreeMap<String, InterfaceConfig>>,
}

impl InterfaceController {
    pub(crate) fn new(kernel: KernelLink, counter_root: Utf8PathBuf) -> Self {
        Self {
            kernel,
            counter_root,
            configs: Mutex::new(BTreeMap::new()),
        }
    }

    /// Known interface names in sorted order.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = read_state(&self.configs).keys().cloned().collect();
        match self.counter_root.read_dir_utf8() {
            Ok(entries) => {
                names.extend(
                    entries
                        .filter_map(Result::ok)
                        .map(|entry| entry.file_name().to_owned()),
                );
            }
            Err(error) => debug!(
                target: CONTROLLERS_TARGET,
                root = %self.counter_root,
                %error,
                "interface directory unreadable"
            ),
        }
        names.into_iter().collect()
    }

    /// Whether `name` is a known interface.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        read_state(&self.configs).contains_key(name) || self.counter_root.join(name).is_dir()
    }

    /// Configuration of `name`; defaults for a known but unconfigured interface.
    #[must_use]
    pub fn config(&self, name: &str) -> InterfaceConfig {
        read_state(&self.configs)
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Sets the address of `name` and applies `flags` in order.
    pub fn set_config(
        &self,
        name: &str,
        address: IpAddr,
        prefix_length: u8,
        flags: &[InterfaceFlag],
    ) -> Result<(), ControllerError> {
        self.update(name, |config| {
            config.address = address;
            config.prefix_length = prefix_length;
            for flag in flags {
                config.up = *flag == InterfaceFlag::Up;
            }
            format!("configure {name} {address}/{prefix_length}")
        })
    }

    /// Sets the MTU of `name`.
    pub fn set_mtu(&self, name: &str, mtu: u32) -> Result<(), ControllerError> {
        self.update(name, |config| {
            config.mtu = Some(mtu);
            format!("set {name} mtu {mtu}")
        })
    }

    /// Enables or disables IPv6 on `name`.
    pub fn set_ipv6(&self, name: &str, enabled: bool) -> Result<(), ControllerError> {
        self.update(name, |config| {
            config.ipv6 = enabled;
            let verb = if enabled { "enable" } else { "disable" };
            format!("{verb} ipv6 on {name}")
        })
    }

    /// Removes every address from `name`.
    pub fn clear_addresses(&self, name: &str) -> Result<(), ControllerError> {
        self.update(name, |config| {
            config.address = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
            config.prefix_length = 0;
            format!("flush addresses of {name}")
        })
    }

    /// Computes a new configuration, applies it, and commits on success.
    fn update(
        &self,
        name: &str,
        change: impl FnOnce(&mut InterfaceConfig) -> String,
    ) -> Result<(), ControllerError> {
        let mut configs = lock_state(Subsystem::Interface, &self.configs)?;
        let mut next = configs.get(name).cloned().unwrap_or_default();
        let action = change(&mut next);
        self.kernel.apply(action)?;
        configs.insert(name.to_owned(), next);
        Ok(())
    }
}

impl Controller for InterfaceController {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Interface
    }

    fn is_enabled(&self) -> bool {
        !read_state(&self.configs).is_empty()
    }
}
