//! Shared configuration for the netd daemon.
//!
//! Values are layered by `ortho_config`: built-in defaults, then an optional
//! configuration file, then `NETD_*` environment variables, then command-line
//! flags. The resulting [`Config`] describes where the control socket lives,
//! how telemetry is rendered, and how the throughput monitor samples the
//! cellular interfaces.

mod defaults;
mod logging;
mod socket;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_ACK_RATIO, DEFAULT_COUNTER_ROOT, DEFAULT_LOG_FILTER, DEFAULT_LOWPOWER_THRESHOLD,
    DEFAULT_MONITOR_IDLE_TICK_MS, DEFAULT_MONITOR_INTERFACES, DEFAULT_MONITOR_TICK_MS,
    DEFAULT_TCP_PORT, default_counter_root, default_log_filter, default_log_filter_string,
    default_log_format, default_monitor_interfaces, default_socket_endpoint,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "NETD")]
pub struct Config {
    /// Control socket the daemon listens on.
    #[ortho_config(default = default_socket_endpoint())]
    pub daemon_socket: SocketEndpoint,
    /// `tracing` filter directive.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Telemetry output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Directory holding `<iface>/statistics/rx_bytes` counters.
    #[ortho_config(default = default_counter_root())]
    pub counter_root: Utf8PathBuf,
    /// Comma-separated interfaces sampled by the throughput monitor.
    #[ortho_config(default = DEFAULT_MONITOR_INTERFACES.join(","))]
    pub monitor_interfaces: String,
    /// Bytes per tick above which low-power mode engages.
    #[ortho_config(default = DEFAULT_LOWPOWER_THRESHOLD)]
    pub lowpower_threshold: u64,
    /// Ack ratio applied while low-power mode is engaged.
    #[ortho_config(default = DEFAULT_ACK_RATIO)]
    pub ack_ratio: u8,
    /// Monitor sampling period in milliseconds.
    #[ortho_config(default = DEFAULT_MONITOR_TICK_MS)]
    pub monitor_tick_ms: u64,
    /// Monitor back-off period in milliseconds while the test SIM gate is closed.
    #[ortho_config(default = DEFAULT_MONITOR_IDLE_TICK_MS)]
    pub monitor_idle_tick_ms: u64,
    /// Starts the throughput monitor during bootstrap.
    #[ortho_config(default = true)]
    pub monitor_autostart: bool,
    /// Initial state of the test SIM gate.
    #[ortho_config(default = true)]
    pub test_sim: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_socket: default_socket_endpoint(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            counter_root: default_counter_root(),
            monitor_interfaces: DEFAULT_MONITOR_INTERFACES.join(","),
            lowpower_threshold: DEFAULT_LOWPOWER_THRESHOLD,
            ack_ratio: DEFAULT_ACK_RATIO,
            monitor_tick_ms: DEFAULT_MONITOR_TICK_MS,
            monitor_idle_tick_ms: DEFAULT_MONITOR_IDLE_TICK_MS,
            monitor_autostart: true,
            test_sim: true,
        }
    }
}

impl Config {
    /// Control socket endpoint.
    #[must_use]
    pub fn daemon_socket(&self) -> &SocketEndpoint {
        &self.daemon_socket
    }

    /// `tracing` filter directive.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Telemetry output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Root of the per-interface counter tree.
    #[must_use]
    pub fn counter_root(&self) -> &Utf8Path {
        &self.counter_root
    }

    /// Interfaces sampled by the throughput monitor, in configuration order.
    ///
    /// Empty entries produced by stray commas are dropped.
    #[must_use]
    pub fn monitor_interfaces(&self) -> Vec<String> {
        self.monitor_interfaces
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// Bytes per tick above which low-power mode engages.
    #[must_use]
    pub fn lowpower_threshold(&self) -> u64 {
        self.lowpower_threshold
    }

    /// Ack ratio applied while low-power mode is engaged.
    #[must_use]
    pub fn ack_ratio(&self) -> u8 {
        self.ack_ratio
    }

    /// Monitor sampling period.
    #[must_use]
    pub fn monitor_tick(&self) -> Duration {
        Duration::from_millis(self.monitor_tick_ms)
    }

    /// Monitor back-off period while the test SIM gate is closed.
    #[must_use]
    pub fn monitor_idle_tick(&self) -> Duration {
        Duration::from_millis(self.monitor_idle_tick_ms)
    }

    /// Whether bootstrap starts the throughput monitor.
    #[must_use]
    pub fn monitor_autostart(&self) -> bool {
        self.monitor_autostart
    }

    /// Initial state of the test SIM gate.
    #[must_use]
    pub fn test_sim(&self) -> bool {
        self.test_sim
    }
}
