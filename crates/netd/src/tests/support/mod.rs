//! Shared harness for the daemon test suites.

mod config_loader;
mod daemon;
mod reporter;

pub use config_loader::{FailingConfigLoader, TestConfigLoader};
pub use daemon::{TestDaemon, write_rx_bytes};
pub use reporter::{HealthEvent, RecordingHealthReporter};

/// Removes one layer of surrounding double quotes captured by a step pattern.
pub fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
}
