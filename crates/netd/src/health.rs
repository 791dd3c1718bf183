//! Structured health reporting for daemon lifecycle events.

use std::sync::Arc;

use netd_config::{Config, SocketEndpoint};

use crate::bootstrap::BootstrapError;
use crate::monitor::MonitorError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the control socket accepts connections.
    fn listener_ready(&self, endpoint: &SocketEndpoint);

    /// Invoked after the throughput monitor starts at launch.
    fn monitor_started(&self);

    /// Invoked when the throughput monitor cannot be started or stopped.
    fn monitor_failed(&self, error: &MonitorError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn listener_ready(&self, endpoint: &SocketEndpoint) {
        (**self).listener_ready(endpoint);
    }

    fn monitor_started(&self) {
        (**self).monitor_started();
    }

    fn monitor_failed(&self, error: &MonitorError) {
        (**self).monitor_failed(error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.daemon_socket(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            counter_root = %config.counter_root(),
            monitor_interfaces = ?config.monitor_interfaces(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn listener_ready(&self, endpoint: &SocketEndpoint) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "listener_ready",
            socket = %endpoint,
            "control socket ready"
        );
    }

    fn monitor_started(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "monitor_started",
            "throughput monitor running"
        );
    }

    fn monitor_failed(&self, error: &MonitorError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "monitor_failed",
            error = %error,
            "throughput monitor failure"
        );
    }
}
