//! `interface` command.

use std::net::IpAddr;

use crate::controllers::{InterfaceController, InterfaceFlag};
use crate::dispatch::errors::{CommandError, RegistryError};
use crate::dispatch::registry::{CommandContext, CommandRegistry};
use crate::dispatch::response::{Reply, ResponseCode};

use super::args::{Args, parse_switch, parse_value};

const USAGE: &str = "Usage: interface <list|getcfg|setcfg|setmtu|ipv6|clearaddrs> [args]";

pub(crate) fn register(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register("interface", handle)
}

fn handle(context: &CommandContext<'_>, tokens: &[String]) -> Result<Reply, CommandError> {
    let args = Args::new(USAGE, tokens);
    let interfaces = &context.controllers.interface;
    match args.subcommand()? {
        "list" => {
            args.exact(1)?;
            Ok(Reply::list(
                ResponseCode::InterfaceListResult,
                interfaces.list(),
                "Interface list completed",
            ))
        }
        "getcfg" => {
            args.exact(2)?;
            let name = known(interfaces, &args, 1)?;
            Ok(Reply::new(
                ResponseCode::InterfaceGetCfgResult,
                interfaces.config(name).to_string(),
            ))
        }
        "setcfg" => {
            args.at_least(4)?;
            let name = known(interfaces, &args, 1)?;
            let address: IpAddr = args.parse(2, "address")?;
            let prefix_length: u8 = args.parse(3, "prefix length")?;
            let limit = if address.is_ipv4() { 32 } else { 128 };
            if prefix_length > limit {
                return Err(CommandError::parameter(format!(
                    "Invalid prefix length '{prefix_length}'"
                )));
            }
            let flags = args
                .rest(4)
                .iter()
                .map(|token| parse_value::<InterfaceFlag>(token, "flag"))
                .collect::<Result<Vec<_>, _>>()?;
            interfaces
                .set_config(name, address, prefix_length, &flags)
                .map_err(CommandError::failed("interface setcfg"))?;
            Ok(Reply::ok("Interface configuration set"))
        }
        "setmtu" => {
            args.exact(3)?;
            let name = known(interfaces, &args, 1)?;
            let mtu: u32 = args.parse(2, "mtu")?;
            if !(68..=65_535).contains(&mtu) {
                return Err(CommandError::parameter(format!("Invalid mtu '{mtu}'")));
            }
            interfaces
                .set_mtu(name, mtu)
                .map_err(CommandError::failed("interface setmtu"))?;
            Ok(Reply::ok("MTU changed"))
        }
        "ipv6" => {
            args.exact(3)?;
            let name = known(interfaces, &args, 1)?;
            let enabled = parse_switch(args.get(2)?)?;
            interfaces
                .set_ipv6(name, enabled)
                .map_err(CommandError::failed("interface ipv6"))?;
            Ok(Reply::ok("IPv6 state changed"))
        }
        "clearaddrs" => {
            args.exact(2)?;
            let name = known(interfaces, &args, 1)?;
            interfaces
                .clear_addresses(name)
                .map_err(CommandError::failed("interface clearaddrs"))?;
            Ok(Reply::ok("Interface IP addresses cleared"))
        }
        _ => Err(args.usage()),
    }
}

/// Validated name of an interface the controller knows about.
fn known<'a>(
    interfaces: &InterfaceController,
    args: &Args<'a>,
    index: usize,
) -> Result<&'a str, CommandError> {
    let name = args.interface(index)?;
    if interfaces.exists(name) {
        Ok(name)
    } else {
        Err(CommandError::parameter(format!("Unknown interface '{name}'")))
    }
}
