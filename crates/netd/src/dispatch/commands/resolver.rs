//! `resolver` command.

use std::net::IpAddr;

use crate::controllers::ResolverSettings;
use crate::dispatch::errors::{CommandError, RegistryError};
use crate::dispatch::registry::{CommandContext, CommandRegistry};
use crate::dispatch::response::{Reply, ResponseCode};

use super::args::Args;

const USAGE: &str = "Usage: resolver <setnetdns|clearnetdns|getnetdns|flushnet> <netId> [args]";

pub(crate) fn register(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register("resolver", handle)
}

fn handle(context: &CommandContext<'_>, tokens: &[String]) -> Result<Reply, CommandError> {
    let args = Args::new(USAGE, tokens);
    let controller = &context.controllers.resolver;
    let subcommand = args.subcommand()?;
    let net_id: u32 = args.parse(1, "netId")?;
    match subcommand {
        "setnetdns" => {
            args.at_least(4)?;
            // Search domains arrive as one space-separated token.
            let domains = args
                .get(2)?
                .split_ascii_whitespace()
                .map(str::to_owned)
                .collect();
            let servers: Vec<IpAddr> = args.parse_rest(3, "dns server")?;
            controller
                .set(net_id, ResolverSettings { domains, servers })
                .map_err(CommandError::failed("resolver setnetdns"))?;
        }
        "clearnetdns" => {
            args.exact(2)?;
            controller
                .clear(net_id)
                .map_err(CommandError::failed("resolver clearnetdns"))?;
        }
        "getnetdns" => {
            args.exact(2)?;
            let settings = controller
                .get(net_id)
                .map_err(CommandError::failed("resolver getnetdns"))?;
            let servers = settings
                .servers
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            return Ok(Reply::new(
                ResponseCode::ResolverResult,
                format!(
                    "{net_id} servers={servers} domains={}",
                    settings.domains.join(",")
                ),
            ));
        }
        "flushnet" => {
            args.exact(2)?;
            controller
                .flush(net_id)
                .map_err(CommandError::failed("resolver flushnet"))?;
        }
        _ => return Err(args.usage()),
    }
    Ok(Reply::ok("Resolver command succeeded"))
}
