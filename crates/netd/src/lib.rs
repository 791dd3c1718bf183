//! Network management daemon.
//!
//! `netd` accepts newline-terminated text commands on a control socket and
//! routes each one to the controller owning the named subsystem: interfaces,
//! IPv4 and IPv6 tethering and forwarding, NAT, PPP and PPPoE, soft access
//! point, bandwidth accounting, idle timers, DNS resolver settings, firewall,
//! 464XLAT, cleartext policy, throttling and dual-uplink pairing. Every command produces exactly one terminal status
//! line, optionally preceded by list items, with protocol status codes taken
//! from a fixed table.
//!
//! Controllers record the state the daemon believes the kernel is in and pass
//! each change to a [`NetBackend`](controllers::NetBackend). Any failure there
//! leaves the recorded state untouched.
//!
//! ## Throughput monitor
//!
//! A background worker sums the receive counters of the cellular interfaces
//! each tick. When the bytes received since the previous tick exceed the
//! configured threshold it engages low-power mode and reduces the TCP ack
//! ratio through a [`PerfBackend`](power::PerfBackend); once traffic falls
//! back it releases both. Tethering holds its own power flag and suppresses
//! engagement while active.
//!
//! ## Lifecycle
//!
//! [`run_daemon`] loads configuration, initialises telemetry, builds the
//! controllers and the command table, binds the control socket and then
//! blocks until SIGTERM, SIGINT, SIGQUIT or SIGHUP. Shutdown stops the monitor,
//! releases low-power mode and removes the socket file.

mod bootstrap;
pub mod controllers;
pub mod dispatch;
mod health;
pub mod monitor;
pub mod power;
mod process;
mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::ListenerError;

#[cfg(test)]
mod tests;
