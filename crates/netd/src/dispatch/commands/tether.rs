//! `tether`, `ipv6tether`, `ipfwd`, `ipv6fwd` and `nat` commands.

use std::net::{IpAddr, Ipv4Addr};

use tracing::warn;

use crate::controllers::{DhcpRange, IpFamily, Subsystem};
use crate::dispatch::DISPATCH_TARGET;
use crate::dispatch::errors::{CommandError, RegistryError};
use crate::dispatch::registry::{CommandContext, CommandRegistry};
use crate::dispatch::response::{Reply, ResponseCode};

use super::args::Args;

const TETHER_USAGE: &str = "Usage: tether <start|stop|status|interface|dns> [args]";
const IPFWD_USAGE: &str = "Usage: ipfwd <status|enable|disable> [requester]";
const IPV6FWD_USAGE: &str = "Usage: ipv6fwd <status|enable|disable> [requester]";
const IPV6TETHER_USAGE: &str = "Usage: ipv6tether <enable|disable|status> [<internal> <external>]";
const NAT_USAGE: &str = "Usage: nat <enable|disable> <internal> <external>";

pub(crate) fn register(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register("tether", tether)?;
    registry.register("ipv6tether", ipv6tether)?;
    registry.register("ipfwd", |context: &CommandContext<'_>, tokens: &[String]| {
        forwarding(context, &Args::new(IPFWD_USAGE, tokens), IpFamily::V4)
    })?;
    registry.register("ipv6fwd", |context: &CommandContext<'_>, tokens: &[String]| {
        forwarding(context, &Args::new(IPV6FWD_USAGE, tokens), IpFamily::V6)
    })?;
    registry.register("nat", nat)
}

fn tether(context: &CommandContext<'_>, tokens: &[String]) -> Result<Reply, CommandError> {
    let args = Args::new(TETHER_USAGE, tokens);
    let controller = &context.controllers.tether;
    match args.subcommand()? {
        "start" => {
            let ranges = dhcp_ranges(&args)?;
            controller
                .start(ranges)
                .map_err(CommandError::failed("tether start"))?;
            if let Err(error) = context.controllers.power().enter_tether() {
                warn!(target: DISPATCH_TARGET, %error, "tether power mode unavailable");
            }
            Ok(Reply::ok("Tether operation succeeded"))
        }
        "stop" => {
            args.exact(1)?;
            super::switch(context, Subsystem::Tether, false, "tether stop")?;
            if let Err(error) = context.controllers.power().exit_tether() {
                warn!(target: DISPATCH_TARGET, %error, "tether power mode release failed");
            }
            Ok(Reply::ok("Tether operation succeeded"))
        }
        "status" => {
            args.exact(1)?;
            let state = if super::is_active(context, Subsystem::Tether) {
                "started"
            } else {
                "stopped"
            };
            Ok(Reply::new(
                ResponseCode::TetherStatusResult,
                format!("Tethering services {state}"),
            ))
        }
        "interface" => tether_interface(context, &args),
        "dns" => tether_dns(context, &args),
        _ => Err(args.usage()),
    }
}

/// Pairs of `<start> <end>` addresses after `start`.
fn dhcp_ranges(args: &Args<'_>) -> Result<Vec<DhcpRange>, CommandError> {
    let bounds: Vec<Ipv4Addr> = args.parse_rest(1, "dhcp range address")?;
    if bounds.len() % 2 != 0 {
        return Err(args.usage());
    }
    bounds
        .chunks_exact(2)
        .map(|pair| {
            let (start, end) = (pair[0], pair[1]);
            if u32::from(start) > u32::from(end) {
                Err(CommandError::parameter(format!(
                    "Invalid dhcp range {start}-{end}"
                )))
            } else {
                Ok(DhcpRange { start, end })
            }
        })
        .collect()
}

fn tether_interface(
    context: &CommandContext<'_>,
    args: &Args<'_>,
) -> Result<Reply, CommandError> {
    let controller = &context.controllers.tether;
    match args.get(1)? {
        "add" => {
            args.exact(3)?;
            controller
                .add_interface(args.interface(2)?)
                .map_err(CommandError::failed("tether interface add"))?;
            Ok(Reply::ok("Tether operation succeeded"))
        }
        "remove" => {
            args.exact(3)?;
            controller
                .remove_interface(args.interface(2)?)
                .map_err(CommandError::failed("tether interface remove"))?;
            Ok(Reply::ok("Tether operation succeeded"))
        }
        "list" => {
            args.exact(2)?;
            Ok(Reply::list(
                ResponseCode::TetherInterfaceListResult,
                controller.interfaces(),
                "Tether interface list completed",
            ))
        }
        _ => Err(args.usage()),
    }
}

fn tether_dns(context: &CommandContext<'_>, args: &Args<'_>) -> Result<Reply, CommandError> {
    let controller = &context.controllers.tether;
    match args.get(1)? {
        "set" => {
            args.at_least(4)?;
            let net_id: u32 = args.parse(2, "netId")?;
            let servers: Vec<IpAddr> = args.parse_rest(3, "dns server")?;
            controller
                .set_dns_forwarders(net_id, servers)
                .map_err(CommandError::failed("tether dns set"))?;
            Ok(Reply::ok("Tether operation succeeded"))
        }
        "list" => {
            args.exact(2)?;
            let (_, servers) = controller.dns_forwarders();
            Ok(Reply::list(
                ResponseCode::TetherDnsFwdTgtListResult,
                servers.iter().map(ToString::to_string),
                "Tether dns fwd list completed",
            ))
        }
        _ => Err(args.usage()),
    }
}

fn forwarding(
    context: &CommandContext<'_>,
    args: &Args<'_>,
    family: IpFamily,
) -> Result<Reply, CommandError> {
    let controller = &context.controllers.tether;
    let label = match family {
        IpFamily::V4 => "ipfwd",
        IpFamily::V6 => "ipv6fwd",
    };
    match args.subcommand()? {
        "status" => {
            args.exact(1)?;
            let state = if controller.forwarding_enabled(family) {
                "enabled"
            } else {
                "disabled"
            };
            let message = match family {
                IpFamily::V4 => format!("Forwarding {state}"),
                IpFamily::V6 => format!("IPv6 forwarding {state}"),
            };
            Ok(Reply::new(ResponseCode::IpFwdStatusResult, message))
        }
        "enable" => {
            args.exact(2)?;
            controller
                .enable_forwarding(family, args.get(1)?)
                .map_err(|source| CommandError::operation(format!("{label} enable"), source))?;
            Ok(Reply::ok(format!("{label} operation succeeded")))
        }
        "disable" => {
            args.exact(2)?;
            controller
                .disable_forwarding(family, args.get(1)?)
                .map_err(|source| CommandError::operation(format!("{label} disable"), source))?;
            Ok(Reply::ok(format!("{label} operation succeeded")))
        }
        _ => Err(args.usage()),
    }
}

fn ipv6tether(context: &CommandContext<'_>, tokens: &[String]) -> Result<Reply, CommandError> {
    let args = Args::new(IPV6TETHER_USAGE, tokens);
    let controller = &context.controllers.ipv6_tether;
    let enable = match args.subcommand()? {
        "status" => {
            args.exact(1)?;
            let state = if super::is_active(context, Subsystem::Ipv6Tether) {
                "started"
            } else {
                "stopped"
            };
            return Ok(Reply::new(
                ResponseCode::TetherStatusResult,
                format!("IPv6 tethering {state}"),
            ));
        }
        "enable" => true,
        "disable" => false,
        _ => return Err(args.usage()),
    };
    let (internal, external) = interface_pair(&args)?;
    if enable {
        controller
            .enable(internal, external)
            .map_err(CommandError::failed("ipv6tether enable"))?;
    } else {
        controller
            .disable(internal, external)
            .map_err(CommandError::failed("ipv6tether disable"))?;
    }
    Ok(Reply::ok("IPv6 tether operation succeeded"))
}

/// `<internal> <external>` after the sub-command; the two must differ.
fn interface_pair<'a>(args: &Args<'a>) -> Result<(&'a str, &'a str), CommandError> {
    args.exact(3)?;
    let internal = args.interface(1)?;
    let external = args.interface(2)?;
    if internal == external {
        return Err(CommandError::parameter(
            "Internal and external interfaces must differ",
        ));
    }
    Ok((internal, external))
}

fn nat(context: &CommandContext<'_>, tokens: &[String]) -> Result<Reply, CommandError> {
    let args = Args::new(NAT_USAGE, tokens);
    let controller = &context.controllers.nat;
    let enable = match args.subcommand()? {
        "enable" => true,
        "disable" => false,
        _ => return Err(args.usage()),
    };
    let (internal, external) = interface_pair(&args)?;
    if enable {
        controller
            .enable(internal, external)
            .map_err(CommandError::failed("nat enable"))?;
    } else {
        controller
            .disable(internal, external)
            .map_err(CommandError::failed("nat disable"))?;
    }
    Ok(Reply::ok("Nat operation succeeded"))
}
