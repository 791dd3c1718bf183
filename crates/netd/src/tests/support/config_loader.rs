//! Configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use tempfile::TempDir;

use netd_config::{Config, SocketEndpoint};

use crate::bootstrap::ConfigLoader;

/// Loader placing the control socket and the counter tree in a temporary
/// directory.
pub struct TestConfigLoader {
    dir: TempDir,
    autostart: bool,
}

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temporary directory");
        std::fs::create_dir(dir.path().join("net")).expect("create counter root");
        Self {
            dir,
            autostart: false,
        }
    }

    /// Starts the monitor when the daemon launches.
    #[must_use]
    pub fn with_autostart(mut self) -> Self {
        self.autostart = true;
        self
    }

    fn root(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.dir.path().to_path_buf())
            .expect("temporary directory path was not valid UTF-8")
    }

    pub fn socket_path(&self) -> Utf8PathBuf {
        self.root().join("run").join("netd.sock")
    }

    pub fn counter_root(&self) -> Utf8PathBuf {
        self.root().join("net")
    }

    pub fn config(&self) -> Config {
        Config {
            daemon_socket: SocketEndpoint::unix(self.socket_path()),
            counter_root: self.counter_root(),
            monitor_tick_ms: 10,
            monitor_idle_tick_ms: 10,
            monitor_autostart: self.autostart,
            ..Config::default()
        }
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config())
    }
}

/// Loader that fails by passing an unsupported socket scheme.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("netd"),
            OsString::from("--daemon-socket"),
            OsString::from("invalid://socket"),
        ];
        Config::load_from_iter(args)
    }
}
