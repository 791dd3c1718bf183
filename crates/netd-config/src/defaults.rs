use camino::Utf8PathBuf;
use std::env;

#[cfg(unix)]
use libc::geteuid;

#[cfg(unix)]
use dirs::runtime_dir;

use crate::socket::SocketEndpoint;

/// Default TCP port used when Unix domain sockets are not available.
pub const DEFAULT_TCP_PORT: u16 = 9780;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Directory exposing per-interface statistics on Linux.
pub const DEFAULT_COUNTER_ROOT: &str = "/sys/class/net";

/// Cellular interfaces sampled by the throughput monitor.
pub const DEFAULT_MONITOR_INTERFACES: [&str; 3] = ["ccmni0", "ccmni1", "ccmni2"];

/// Received bytes per tick above which low-power mode is engaged.
///
/// `k << 17` bytes per second corresponds to `k` Mbit/s, so `35 << 18` is
/// roughly 70 Mbit/s with the default one second tick.
pub const DEFAULT_LOWPOWER_THRESHOLD: u64 = 35 << 18;

/// Data-to-ack ratio minus one written while low-power mode is engaged.
pub const DEFAULT_ACK_RATIO: u8 = 3;

/// Sampling period of the throughput monitor.
pub const DEFAULT_MONITOR_TICK_MS: u64 = 1_000;

/// Back-off period while the test SIM gate is closed.
pub const DEFAULT_MONITOR_IDLE_TICK_MS: u64 = 2_000;

/// Default log filter expression used by the daemon.
#[must_use]
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Default logging format for the daemon.
#[must_use]
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}

/// Default root directory for interface counters.
#[must_use]
pub fn default_counter_root() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_COUNTER_ROOT)
}

/// Default list of interfaces sampled by the throughput monitor.
#[must_use]
pub fn default_monitor_interfaces() -> Vec<String> {
    DEFAULT_MONITOR_INTERFACES
        .iter()
        .map(|name| (*name).to_owned())
        .collect()
}

/// Computes the default socket endpoint for the daemon.
#[must_use]
pub fn default_socket_endpoint() -> SocketEndpoint {
    default_socket_endpoint_inner()
}

#[cfg(unix)]
fn default_socket_endpoint_inner() -> SocketEndpoint {
    let (mut base, apply_namespace) = match runtime_base_directory() {
        Some(dir) => (dir, false),
        None => (fallback_base_directory(), true),
    };

    base.push("netd");
    if apply_namespace {
        base.push(user_namespace());
    }

    let socket_path = base.join("netd.sock");
    SocketEndpoint::unix(socket_path)
}

#[cfg(unix)]
fn runtime_base_directory() -> Option<Utf8PathBuf> {
    runtime_dir().and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}

#[cfg(unix)]
fn fallback_base_directory() -> Utf8PathBuf {
    let candidate = env::temp_dir();
    Utf8PathBuf::from_path_buf(candidate).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}

#[cfg(unix)]
fn user_namespace() -> String {
    let uid = unsafe { geteuid() };
    format!("uid-{uid}")
}

#[cfg(not(unix))]
fn default_socket_endpoint_inner() -> SocketEndpoint {
    SocketEndpoint::tcp("127.0.0.1", DEFAULT_TCP_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_matches_seventy_megabits_per_second() {
        assert_eq!(DEFAULT_LOWPOWER_THRESHOLD, 9_175_040);
    }

    #[cfg(unix)]
    #[test]
    fn default_socket_lives_in_netd_directory() {
        let endpoint = default_socket_endpoint();
        let path = endpoint.unix_path().expect("unix endpoint on unix hosts");
        assert_eq!(path.file_name(), Some("netd.sock"));
        assert!(path.as_str().contains("netd"));
    }
}
