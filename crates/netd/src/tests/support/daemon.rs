//! A bootstrapped daemon for suites that serve it over a test listener.

use std::fs;
use std::sync::Arc;

use camino::Utf8Path;

use crate::bootstrap::{Daemon, bootstrap_with};
use crate::controllers::LoggingNetBackend;
use crate::dispatch::Dispatcher;
use crate::power::LoggingPerfBackend;

use super::config_loader::TestConfigLoader;
use super::reporter::RecordingHealthReporter;

/// Daemon bootstrapped against a temporary counter tree.
pub struct TestDaemon {
    loader: TestConfigLoader,
    daemon: Daemon,
}

impl TestDaemon {
    pub fn new() -> Self {
        let loader = TestConfigLoader::new();
        let daemon = bootstrap_with(
            &loader,
            Arc::new(RecordingHealthReporter::default()),
            Arc::new(LoggingPerfBackend),
            Arc::new(LoggingNetBackend),
        )
        .expect("bootstrap test daemon");
        Self {
            loader,
            daemon,
        }
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(self.daemon.dispatcher())
    }

    pub fn counter_root(&self) -> camino::Utf8PathBuf {
        self.loader.counter_root()
    }

    /// Makes `name` appear as a kernel interface.
    pub fn add_interface(&self, name: &str) {
        write_rx_bytes(&self.counter_root(), name, 0);
    }
}

/// Writes a `statistics/rx_bytes` counter for `interface` below `root`.
pub fn write_rx_bytes(root: &Utf8Path, interface: &str, value: u64) {
    let statistics = root.join(interface).join("statistics");
    fs::create_dir_all(&statistics).expect("create statistics directory");
    fs::write(statistics.join("rx_bytes"), format!("{value}\n")).expect("write rx_bytes");
}
