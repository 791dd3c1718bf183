//! `firewall` and `strict` commands.

use std::net::IpAddr;

use crate::controllers::{ChildChain, CleartextPenalty, FirewallRule, FirewallType, Subsystem};
use crate::dispatch::errors::{CommandError, RegistryError};
use crate::dispatch::registry::{CommandContext, CommandRegistry};
use crate::dispatch::response::Reply;

use super::args::Args;

const FIREWALL_USAGE: &str = "Usage: firewall <enable|disable|is_enabled|set_interface_rule|\
set_egress_source_rule|set_egress_dest_rule|set_uid_rule|enable_chain|disable_chain> [args]";
const STRICT_USAGE: &str =
    "Usage: strict <enable|disable|set_uid_cleartext_policy> [<uid> <accept|log|reject>]";

pub(crate) fn register(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register("firewall", firewall)?;
    registry.register("strict", strict)
}

fn firewall(context: &CommandContext<'_>, tokens: &[String]) -> Result<Reply, CommandError> {
    let args = Args::new(FIREWALL_USAGE, tokens);
    let controller = &context.controllers.firewall;
    match args.subcommand()? {
        "enable" => {
            args.exact(2)?;
            let kind: FirewallType = args.parse(1, "firewall type")?;
            controller
                .enable_with(kind)
                .map_err(CommandError::failed("firewall enable"))?;
        }
        "disable" => {
            args.exact(1)?;
            super::switch(context, Subsystem::Firewall, false, "firewall disable")?;
        }
        "is_enabled" => {
            args.exact(1)?;
            let state = if super::is_active(context, Subsystem::Firewall) {
                format!("enabled {}", controller.firewall_type())
            } else {
                "disabled".to_owned()
            };
            return Ok(Reply::ok(state));
        }
        "set_interface_rule" => {
            args.exact(3)?;
            let rule: FirewallRule = args.parse(2, "rule")?;
            controller
                .set_interface_rule(args.interface(1)?, rule)
                .map_err(CommandError::failed("firewall set_interface_rule"))?;
        }
        "set_egress_source_rule" => {
            args.exact(3)?;
            let source: IpAddr = args.parse(1, "address")?;
            let rule: FirewallRule = args.parse(2, "rule")?;
            controller
                .set_egress_source_rule(source, rule)
                .map_err(CommandError::failed("firewall set_egress_source_rule"))?;
        }
        "set_egress_dest_rule" => {
            args.exact(4)?;
            let destination: IpAddr = args.parse(1, "address")?;
            let port: u16 = args.parse(2, "port")?;
            let rule: FirewallRule = args.parse(3, "rule")?;
            controller
                .set_egress_dest_rule(destination, port, rule)
                .map_err(CommandError::failed("firewall set_egress_dest_rule"))?;
        }
        "set_uid_rule" => {
            args.exact(4)?;
            let chain: ChildChain = args.parse(1, "chain")?;
            let uid: u32 = args.parse(2, "uid")?;
            let rule: FirewallRule = args.parse(3, "rule")?;
            controller
                .set_uid_rule(chain, uid, rule)
                .map_err(CommandError::failed("firewall set_uid_rule"))?;
        }
        verb @ ("enable_chain" | "disable_chain") => {
            args.exact(2)?;
            let chain: ChildChain = args.parse(1, "chain")?;
            if chain == ChildChain::None {
                return Err(CommandError::parameter("Only child chains can be toggled"));
            }
            controller
                .set_chain_enabled(chain, verb == "enable_chain")
                .map_err(CommandError::failed("firewall chain toggle"))?;
        }
        _ => return Err(args.usage()),
    }
    Ok(Reply::ok("Firewall command succeeded"))
}

fn strict(context: &CommandContext<'_>, tokens: &[String]) -> Result<Reply, CommandError> {
    let args = Args::new(STRICT_USAGE, tokens);
    let controller = &context.controllers.strict;
    match args.subcommand()? {
        "enable" => {
            args.exact(1)?;
            super::switch(context, Subsystem::Strict, true, "strict enable")?;
        }
        "disable" => {
            args.exact(1)?;
            super::switch(context, Subsystem::Strict, false, "strict disable")?;
        }
        "set_uid_cleartext_policy" => {
            args.exact(3)?;
            let uid: u32 = args.parse(1, "uid")?;
            let penalty: CleartextPenalty = args.parse(2, "cleartext policy")?;
            controller
                .set_uid_cleartext_policy(uid, penalty)
                .map_err(CommandError::failed("strict set_uid_cleartext_policy"))?;
        }
        _ => return Err(args.usage()),
    }
    Ok(Reply::ok("Strict command succeeded"))
}
