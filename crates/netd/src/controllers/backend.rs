//! Boundary between controllers and the kernel.
//!
//! Controllers never program netfilter, routing or tethering plumbing
//! themselves. They describe each change as a [`KernelChange`] and hand it to a
//! [`NetBackend`], committing their own state only when the backend accepts
//! the change.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::{CONTROLLERS_TARGET, ControllerError, Subsystem};

/// A single kernel-facing change requested by a controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelChange {
    /// Subsystem requesting the change.
    pub subsystem: Subsystem,
    /// Human-readable description of the change.
    pub action: String,
}

impl KernelChange {
    /// Builds a change for `subsystem`.
    pub fn new(subsystem: Subsystem, action: impl Into<String>) -> Self {
        Self {
            subsystem,
            action: action.into(),
        }
    }
}

impl fmt::Display for KernelChange {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.subsystem, self.action)
    }
}

/// Error reported by a kernel backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    /// Creates an error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the backend's message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Applies kernel changes on behalf of controllers.
#[cfg_attr(test, mockall::automock)]
pub trait NetBackend: Send + Sync {
    /// Applies `change`, returning an error when the kernel rejects it.
    fn apply(&self, change: &KernelChange) -> Result<(), BackendError>;
}

/// Backend that records every change through `tracing` and accepts it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNetBackend;

impl NetBackend for LoggingNetBackend {
    fn apply(&self, change: &KernelChange) -> Result<(), BackendError> {
        debug!(
            target: CONTROLLERS_TARGET,
            subsystem = %change.subsystem,
            action = %change.action,
            "kernel change applied"
        );
        Ok(())
    }
}

/// A controller's handle on the shared backend, tagged with its subsystem.
#[derive(Clone)]
pub(crate) struct KernelLink {
    subsystem: Subsystem,
    backend: Arc<dyn NetBackend>,
}

impl KernelLink {
    pub(crate) fn new(subsystem: Subsystem, backend: Arc<dyn NetBackend>) -> Self {
        Self { subsystem, backend }
    }

    /// Applies a change and maps backend failures into controller errors.
    pub(crate) fn apply(&self, action: impl Into<String>) -> Result<(), ControllerError> {
        let change = KernelChange::new(self.subsystem, action);
        self.backend
            .apply(&change)
            .map_err(|source| ControllerError::Backend {
                subsystem: self.subsystem,
                source,
            })
    }
}

impl fmt::Debug for KernelLink {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("KernelLink")
            .field("subsystem", &self.subsystem)
            .finish_non_exhaustive()
    }
}
