//! Soft access point: hostapd lifecycle, firmware selection and settings.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;

use strum::{Display, EnumString};

use super::{
    Controller, ControllerError, KernelLink, Subsystem, Switchable, Toggle, TogglePolicy,
    lock_state, read_state,
};

const POLICY: TogglePolicy = TogglePolicy::EXCLUSIVE_START;

/// Firmware image loaded into the wireless chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum SoftapFirmware {
    /// Access point firmware.
    #[strum(serialize = "AP")]
    Ap,
    /// Wi-Fi Direct firmware.
    #[strum(serialize = "P2P")]
    P2p,
    /// Station firmware.
    #[strum(serialize = "STA")]
    Sta,
}

/// Link security of the access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum SoftapSecurity {
    /// No authentication.
    #[strum(serialize = "open")]
    Open,
    /// WPA with a pre-shared key.
    #[strum(serialize = "wpa-psk")]
    WpaPsk,
    /// WPA2 with a pre-shared key.
    #[strum(serialize = "wpa2-psk")]
    Wpa2Psk,
}

impl SoftapSecurity {
    /// Whether this mode needs a passphrase.
    #[must_use]
    pub fn requires_key(self) -> bool {
        !matches!(self, Self::Open)
    }
}

/// Access point configuration written before the service starts.
#[derive(Clone, PartialEq, Eq)]
pub struct SoftapSettings {
    /// Interface hosting the access point.
    pub interface: String,
    /// Network name.
    pub ssid: String,
    /// Whether the SSID is left out of beacons.
    pub hidden: bool,
    /// Radio channel.
    pub channel: u8,
    /// Link security.
    pub security: SoftapSecurity,
    /// Passphrase, present for the PSK modes.
    pub passphrase: Option<String>,
}

impl fmt::Debug for SoftapSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SoftapSettings")
            .field("interface", &self.interface)
            .field("ssid", &self.ssid)
            .field("hidden", &self.hidden)
            .field("channel", &self.channel)
            .field("security", &self.security)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Default)]
struct SoftapState {
    toggle: Toggle,
    settings: Option<SoftapSettings>,
    firmware: BTreeMap<String, SoftapFirmware>,
}

/// Owns the soft access point.
#[derive(Debug)]
pub struct SoftapController {
    kernel: KernelLink,
    state: Mutex<SoftapState>,
}

impl SoftapController {
    pub(crate) fn new(kernel: KernelLink) -> Self {
        Self {
            kernel,
            state: Mutex::new(SoftapState::default()),
        }
    }

    /// Loads `firmware` for `interface`.
    pub fn reload_firmware(
        &self,
        interface: &str,
        firmware: SoftapFirmware,
    ) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Softap, &self.state)?;
        self.kernel
            .apply(format!("reload {interface} firmware {firmware}"))?;
        state.firmware.insert(interface.to_owned(), firmware);
        Ok(())
    }

    /// Firmware last loaded for `interface`.
    #[must_use]
    pub fn firmware(&self, interface: &str) -> Option<SoftapFirmware> {
        read_state(&self.state).firmware.get(interface).copied()
    }

    /// Replaces the access point settings. Takes effect on the next start.
    pub fn configure(&self, settings: SoftapSettings) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Softap, &self.state)?;
        self.kernel.apply(format!(
            "write hostapd config {} ssid={} channel={} security={}{}",
            settings.interface,
            settings.ssid,
            settings.channel,
            settings.security,
            if settings.hidden { " hidden" } else { "" },
        ))?;
        state.settings = Some(settings);
        Ok(())
    }

    /// Current access point settings.
    #[must_use]
    pub fn settings(&self) -> Option<SoftapSettings> {
        read_state(&self.state).settings.clone()
    }
}

impl Controller for SoftapController {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Softap
    }

    fn is_enabled(&self) -> bool {
        read_state(&self.state).toggle.is_enabled()
    }
}

impl Switchable for SoftapController {
    fn enable(&self) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Softap, &self.state)?;
        if !state.toggle.needs_change(true, POLICY, Subsystem::Softap)? {
            return Ok(());
        }
        self.kernel.apply("start hostapd")?;
        state.toggle.set(true);
        Ok(())
    }

    fn disable(&self) -> Result<(), ControllerError> {
        let mut state = lock_state(Subsystem::Softap, &self.state)?;
        if !state.toggle.needs_change(false, POLICY, Subsystem::Softap)? {
            return Ok(());
        }
        self.kernel.apply("stop hostapd")?;
        state.toggle.set(false);
        Ok(())
    }
}
