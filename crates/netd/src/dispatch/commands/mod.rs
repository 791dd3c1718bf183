//! Handlers for every control-protocol command.
//!
//! Each handler validates its arguments completely before calling a
//! controller. Argument-count and sub-command errors are syntax errors;
//! malformed values are parameter errors; controller refusals are operation
//! errors naming the failing operation.

mod args;
mod bandwidth;
mod firewall;
mod interface;
mod ppp;
mod resolver;
mod softap;
mod tether;
mod throughput;
mod uplink;

use crate::controllers::Subsystem;

use super::errors::{CommandError, RegistryError};
use super::registry::{CommandContext, CommandRegistry};

/// Builds a registry holding every command.
pub fn default_registry() -> Result<CommandRegistry, RegistryError> {
    let mut registry = CommandRegistry::new();
    interface::register(&mut registry)?;
    tether::register(&mut registry)?;
    ppp::register(&mut registry)?;
    softap::register(&mut registry)?;
    bandwidth::register(&mut registry)?;
    resolver::register(&mut registry)?;
    firewall::register(&mut registry)?;
    uplink::register(&mut registry)?;
    throughput::register(&mut registry)?;
    Ok(registry)
}

/// Turns the switchable controller owning `subsystem` on or off.
///
/// `operation` names the command in the failure reply.
pub(crate) fn switch(
    context: &CommandContext<'_>,
    subsystem: Subsystem,
    enable: bool,
    operation: &'static str,
) -> Result<(), CommandError> {
    let controller = context
        .controllers
        .switchable(subsystem)
        .ok_or_else(|| CommandError::fatal(format!("{subsystem} cannot be switched")))?;
    let outcome = if enable {
        controller.enable()
    } else {
        controller.disable()
    };
    outcome.map_err(CommandError::failed(operation))
}

/// Whether the controller owning `subsystem` reports itself active.
pub(crate) fn is_active(context: &CommandContext<'_>, subsystem: Subsystem) -> bool {
    context.controllers.controller(subsystem).is_enabled()
}
