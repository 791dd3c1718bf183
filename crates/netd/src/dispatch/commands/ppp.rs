//! `list_ttys`, `pppd` and `pppoectl` commands.

use std::net::Ipv4Addr;

use crate::controllers::{PppLink, PppoeCredentials};
use crate::dispatch::errors::{CommandError, RegistryError};
use crate::dispatch::registry::{CommandContext, CommandRegistry};
use crate::dispatch::response::{Reply, ResponseCode};

use super::args::Args;

const LIST_USAGE: &str = "Usage: list_ttys";
const PPPD_USAGE: &str = "Usage: pppd <attach|detach> <tty> [<local> <remote> <dns1> <dns2>]";
const PPPOE_USAGE: &str = "Usage: pppoectl <start|stop|status> <interface> [<user> <password>]";

pub(crate) fn register(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register("list_ttys", list_ttys)?;
    registry.register("pppd", pppd)?;
    registry.register("pppoectl", pppoectl)
}

fn list_ttys(context: &CommandContext<'_>, tokens: &[String]) -> Result<Reply, CommandError> {
    Args::new(LIST_USAGE, tokens).exact(0)?;
    Ok(Reply::list(
        ResponseCode::TtyListResult,
        context.controllers.ppp.ttys().iter().cloned(),
        "Ttys listed",
    ))
}

fn pppd(context: &CommandContext<'_>, tokens: &[String]) -> Result<Reply, CommandError> {
    let args = Args::new(PPPD_USAGE, tokens);
    let controller = &context.controllers.ppp;
    let subcommand = args.subcommand()?;
    let tty = args.get(1)?;
    match subcommand {
        "attach" => {
            args.exact(6)?;
            if !controller.knows_tty(tty) {
                return Err(CommandError::parameter(format!("Unknown tty '{tty}'")));
            }
            let address = |index| args.parse::<Ipv4Addr>(index, "address");
            let link = PppLink {
                local: address(2)?,
                remote: address(3)?,
                dns1: address(4)?,
                dns2: address(5)?,
            };
            controller
                .attach(tty, link)
                .map_err(CommandError::failed("pppd attach"))?;
        }
        "detach" => {
            args.exact(2)?;
            controller
                .detach(tty)
                .map_err(CommandError::failed("pppd detach"))?;
        }
        _ => return Err(args.usage()),
    }
    Ok(Reply::ok("Pppd operation succeeded"))
}

fn pppoectl(context: &CommandContext<'_>, tokens: &[String]) -> Result<Reply, CommandError> {
    let args = Args::new(PPPOE_USAGE, tokens);
    let controller = &context.controllers.pppoe;
    match args.subcommand()? {
        "start" => {
            args.exact(4)?;
            let interface = args.interface(1)?;
            let credentials = PppoeCredentials {
                user: args.get(2)?.to_owned(),
                password: args.get(3)?.to_owned(),
            };
            controller
                .start(interface, credentials)
                .map_err(CommandError::failed("pppoectl start"))?;
        }
        "stop" => {
            args.exact(2)?;
            controller
                .stop(args.interface(1)?)
                .map_err(CommandError::failed("pppoectl stop"))?;
        }
        "status" => {
            args.exact(2)?;
            let interface = args.interface(1)?;
            let message = match controller.session(interface) {
                Some(user) => format!("PPPoE session on {interface} up as {user}"),
                None => format!("PPPoE session on {interface} down"),
            };
            return Ok(Reply::ok(message));
        }
        _ => return Err(args.usage()),
    }
    Ok(Reply::ok("PPPoE operation succeeded"))
}
