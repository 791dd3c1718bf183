//! `throughput` command controlling the background monitor.

use crate::dispatch::errors::{CommandError, RegistryError};
use crate::dispatch::registry::{CommandContext, CommandRegistry};
use crate::dispatch::response::{Reply, ResponseCode};

use super::args::Args;

const USAGE: &str = "Usage: throughput <start|stop|status|testsim> [on|off]";

pub(crate) fn register(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register("throughput", handle)
}

fn handle(context: &CommandContext<'_>, tokens: &[String]) -> Result<Reply, CommandError> {
    let args = Args::new(USAGE, tokens);
    let monitor = context.controllers.monitor();
    let power = context.controllers.power();
    match args.subcommand()? {
        "start" => {
            args.exact(1)?;
            monitor
                .start()
                .map_err(CommandError::failed("throughput start"))?;
        }
        "stop" => {
            args.exact(1)?;
            monitor
                .stop()
                .map_err(CommandError::failed("throughput stop"))?;
        }
        "status" => {
            args.exact(1)?;
            let snapshot = power.snapshot();
            let ack = snapshot
                .ack_reduction
                .map_or_else(|| "default".to_owned(), |ratio| ratio.to_string());
            return Ok(Reply::new(
                ResponseCode::ThroughputStatusResult,
                format!(
                    "{} low_power={} tether={} ack={ack} testsim={}",
                    monitor.status(),
                    snapshot.low_power,
                    snapshot.tether,
                    if snapshot.test_sim { "on" } else { "off" },
                ),
            ));
        }
        "testsim" => {
            args.exact(2)?;
            let active = match args.get(1)? {
                "on" => true,
                "off" => false,
                other => {
                    return Err(CommandError::parameter(format!(
                        "Expected on or off, got '{other}'"
                    )));
                }
            };
            power.set_test_sim(active);
        }
        _ => return Err(args.usage()),
    }
    Ok(Reply::ok("Throughput command succeeded"))
}
