//! `clatd`, `throttle` and `dualon` commands.

use crate::controllers::{DualOnPair, ThrottleDirection, ThrottleLimits};
use crate::dispatch::errors::{CommandError, RegistryError};
use crate::dispatch::registry::{CommandContext, CommandRegistry};
use crate::dispatch::response::{Reply, ResponseCode};

use super::args::Args;

const CLATD_USAGE: &str = "Usage: clatd <start|stop|status> <interface>";
const THROTTLE_USAGE: &str = "Usage: throttle <set|get|reset> <interface> [args]";
const DUALON_USAGE: &str = "Usage: dualon <enable|disable|status> [<primary> <secondary>]";

pub(crate) fn register(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register("clatd", clatd)?;
    registry.register("throttle", throttle)?;
    registry.register("dualon", dualon)
}

fn clatd(context: &CommandContext<'_>, tokens: &[String]) -> Result<Reply, CommandError> {
    let args = Args::new(CLATD_USAGE, tokens);
    let controller = &context.controllers.clatd;
    let subcommand = args.subcommand()?;
    args.exact(2)?;
    let interface = args.interface(1)?;
    match subcommand {
        "start" => controller
            .start(interface)
            .map_err(CommandError::failed("clatd start"))?,
        "stop" => controller
            .stop(interface)
            .map_err(CommandError::failed("clatd stop"))?,
        "status" => {
            let state = if controller.is_running(interface) {
                "started"
            } else {
                "stopped"
            };
            return Ok(Reply::new(
                ResponseCode::ClatdStatusResult,
                format!("Clatd status: {state}"),
            ));
        }
        _ => return Err(args.usage()),
    }
    Ok(Reply::ok("Clatd operation succeeded"))
}

fn throttle(context: &CommandContext<'_>, tokens: &[String]) -> Result<Reply, CommandError> {
    let args = Args::new(THROTTLE_USAGE, tokens);
    let controller = &context.controllers.throttle;
    match args.subcommand()? {
        "set" => {
            args.exact(4)?;
            let interface = args.interface(1)?;
            let limits = ThrottleLimits {
                rx_kbps: args.parse(2, "rx rate")?,
                tx_kbps: args.parse(3, "tx rate")?,
            };
            controller
                .set(interface, limits)
                .map_err(CommandError::failed("throttle set"))?;
            Ok(Reply::ok("Interface throttling set"))
        }
        "get" => {
            args.exact(3)?;
            let interface = args.interface(1)?;
            let direction: ThrottleDirection = args.parse(2, "direction")?;
            Ok(Reply::new(
                ResponseCode::ThrottleResult,
                controller.get(interface, direction).to_string(),
            ))
        }
        "reset" => {
            args.exact(2)?;
            controller
                .reset(args.interface(1)?)
                .map_err(CommandError::failed("throttle reset"))?;
            Ok(Reply::ok("Interface throttling reset"))
        }
        _ => Err(args.usage()),
    }
}

fn dualon(context: &CommandContext<'_>, tokens: &[String]) -> Result<Reply, CommandError> {
    let args = Args::new(DUALON_USAGE, tokens);
    let controller = &context.controllers.dual_on;
    match args.subcommand()? {
        "enable" => {
            args.exact(3)?;
            let primary = args.interface(1)?;
            let secondary = args.interface(2)?;
            if primary == secondary {
                return Err(CommandError::parameter("Uplinks must differ"));
            }
            controller
                .enable(DualOnPair {
                    primary: primary.to_owned(),
                    secondary: secondary.to_owned(),
                })
                .map_err(CommandError::failed("dualon enable"))?;
            Ok(Reply::ok("DualOn operation succeeded"))
        }
        "disable" => {
            args.exact(1)?;
            controller
                .disable()
                .map_err(CommandError::failed("dualon disable"))?;
            Ok(Reply::ok("DualOn operation succeeded"))
        }
        "status" => {
            args.exact(1)?;
            let state = controller
                .status()
                .map_or_else(|| "disabled".to_owned(), |pair| format!("enabled {pair}"));
            Ok(Reply::new(ResponseCode::DualOnStatusResult, state))
        }
        _ => Err(args.usage()),
    }
}
