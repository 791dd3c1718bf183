//! Test suites for the netd daemon.

mod command_surface;
mod dispatch_behaviour;
pub(crate) mod support;
