//! Reads cumulative receive counters from sysfs-style statistics trees.

use std::fs::File;
use std::io::{self, Read};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use super::MONITOR_TARGET;

/// Largest counter file the sampler will read.
const MAX_COUNTER_BYTES: u64 = 79;

/// Source of the per-tick byte total.
#[cfg_attr(test, mockall::automock)]
pub trait CounterSampler: Send + Sync {
    /// Returns the summed receive counters of every watched interface.
    fn sample(&self) -> u64;
}

/// Failure reading one counter file.
#[derive(Debug, Error)]
pub enum CounterReadError {
    /// The file could not be opened or read.
    #[error("failed to read counter '{path}': {source}")]
    Io {
        /// Counter file.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The file did not hold a decimal integer.
    #[error("malformed counter '{path}': {content:?}")]
    Malformed {
        /// Counter file.
        path: Utf8PathBuf,
        /// Trimmed file content.
        content: String,
    },
}

/// Sums `<root>/<iface>/statistics/rx_bytes` across a fixed interface list.
#[derive(Debug, Clone)]
pub struct SysfsCounterSampler {
    root: Utf8PathBuf,
    interfaces: Vec<String>,
}

impl SysfsCounterSampler {
    /// Builds a sampler over `interfaces` below `root`.
    pub fn new(root: impl Into<Utf8PathBuf>, interfaces: Vec<String>) -> Self {
        Self {
            root: root.into(),
            interfaces,
        }
    }

    /// Counter file of `interface`.
    #[must_use]
    pub fn counter_path(&self, interface: &str) -> Utf8PathBuf {
        self.root
            .join(interface)
            .join("statistics")
            .join("rx_bytes")
    }

    /// Reads one counter. `Ok(None)` means the file does not exist.
    pub fn read_counter(path: &Utf8Path) -> Result<Option<u64>, CounterReadError> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CounterReadError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let mut buffer = Vec::new();
        file.take(MAX_COUNTER_BYTES)
            .read_to_end(&mut buffer)
            .map_err(|source| CounterReadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let content = String::from_utf8_lossy(&buffer);
        let trimmed = content.trim();
        trimmed
            .parse::<u64>()
            .map(Some)
            .map_err(|_| CounterReadError::Malformed {
                path: path.to_path_buf(),
                content: trimmed.to_owned(),
            })
    }
}

impl CounterSampler for SysfsCounterSampler {
    fn sample(&self) -> u64 {
        self.interfaces.iter().fold(0_u64, |total, interface| {
            let path = self.counter_path(interface);
            match Self::read_counter(&path) {
                Ok(Some(value)) => total.saturating_add(value),
                Ok(None) => {
                    debug!(target: MONITOR_TARGET, %path, "counter absent");
                    total
                }
                Err(error) => {
                    warn!(target: MONITOR_TARGET, %error, "counter read failed");
                    total
                }
            }
        })
    }
}
