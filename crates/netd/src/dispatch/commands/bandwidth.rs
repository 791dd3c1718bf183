//! `bandwidth` and `idletimer` commands.

use crate::controllers::{AppList, IdletimerEntry, Subsystem};
use crate::dispatch::errors::{CommandError, RegistryError};
use crate::dispatch::registry::{CommandContext, CommandRegistry};
use crate::dispatch::response::{Reply, ResponseCode};

use super::args::Args;

const BANDWIDTH_USAGE: &str = "Usage: bandwidth <enable|disable|setiquota|removeiquota|getiquota|\
setglobalalert|removeglobalalert|addnaughtyapps|removenaughtyapps|addniceapps|removeniceapps> [args]";
const IDLETIMER_USAGE: &str = "Usage: idletimer <enable|disable|add|remove> [<if> <timeout> <label>]";

pub(crate) fn register(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register("bandwidth", bandwidth)?;
    registry.register("idletimer", idletimer)
}

fn bandwidth(context: &CommandContext<'_>, tokens: &[String]) -> Result<Reply, CommandError> {
    let args = Args::new(BANDWIDTH_USAGE, tokens);
    let controller = &context.controllers.bandwidth;
    let done = || Ok(Reply::ok("Bandwidth command succeeded"));
    match args.subcommand()? {
        "enable" => {
            args.exact(1)?;
            super::switch(context, Subsystem::Bandwidth, true, "bandwidth enable")?;
            done()
        }
        "disable" => {
            args.exact(1)?;
            super::switch(context, Subsystem::Bandwidth, false, "bandwidth disable")?;
            done()
        }
        "setiquota" => {
            args.exact(3)?;
            let bytes: u64 = args.parse(2, "quota")?;
            controller
                .set_interface_quota(args.interface(1)?, bytes)
                .map_err(CommandError::failed("bandwidth setiquota"))?;
            done()
        }
        "removeiquota" => {
            args.exact(2)?;
            controller
                .remove_interface_quota(args.interface(1)?)
                .map_err(CommandError::failed("bandwidth removeiquota"))?;
            done()
        }
        "getiquota" => {
            args.exact(2)?;
            let bytes = controller
                .interface_quota(args.interface(1)?)
                .map_err(CommandError::failed("bandwidth getiquota"))?;
            Ok(Reply::new(ResponseCode::QuotaCounterResult, bytes.to_string()))
        }
        "setglobalalert" => {
            args.exact(2)?;
            let bytes: u64 = args.parse(1, "alert")?;
            controller
                .set_global_alert(bytes)
                .map_err(CommandError::failed("bandwidth setglobalalert"))?;
            done()
        }
        "removeglobalalert" => {
            args.exact(1)?;
            controller
                .remove_global_alert()
                .map_err(CommandError::failed("bandwidth removeglobalalert"))?;
            done()
        }
        "addnaughtyapps" => app_list(&args, context, AppList::Naughty, true),
        "removenaughtyapps" => app_list(&args, context, AppList::Naughty, false),
        "addniceapps" => app_list(&args, context, AppList::Nice, true),
        "removeniceapps" => app_list(&args, context, AppList::Nice, false),
        _ => Err(args.usage()),
    }
}

fn app_list(
    args: &Args<'_>,
    context: &CommandContext<'_>,
    list: AppList,
    add: bool,
) -> Result<Reply, CommandError> {
    args.at_least(2)?;
    let uids: Vec<u32> = args.parse_rest(1, "uid")?;
    let controller = &context.controllers.bandwidth;
    let outcome = if add {
        controller.add_apps(list, &uids)
    } else {
        controller.remove_apps(list, &uids)
    };
    outcome.map_err(CommandError::failed("bandwidth app list update"))?;
    Ok(Reply::ok("Bandwidth command succeeded"))
}

fn idletimer(context: &CommandContext<'_>, tokens: &[String]) -> Result<Reply, CommandError> {
    let args = Args::new(IDLETIMER_USAGE, tokens);
    let controller = &context.controllers.idletimer;
    match args.subcommand()? {
        "enable" => {
            args.exact(1)?;
            super::switch(context, Subsystem::Idletimer, true, "idletimer enable")?;
        }
        "disable" => {
            args.exact(1)?;
            super::switch(context, Subsystem::Idletimer, false, "idletimer disable")?;
        }
        "add" => {
            controller
                .add(entry(&args)?)
                .map_err(CommandError::failed("idletimer add"))?;
        }
        "remove" => {
            controller
                .remove(&entry(&args)?)
                .map_err(CommandError::failed("idletimer remove"))?;
        }
        _ => return Err(args.usage()),
    }
    Ok(Reply::ok("Idletimer command succeeded"))
}

fn entry(args: &Args<'_>) -> Result<IdletimerEntry, CommandError> {
    args.exact(4)?;
    let timeout_secs: u32 = args.parse(2, "timeout")?;
    if timeout_secs == 0 {
        return Err(CommandError::parameter("Timeout must be positive"));
    }
    Ok(IdletimerEntry {
        interface: args.interface(1)?.to_owned(),
        timeout_secs,
        label: args.get(3)?.to_owned(),
    })
}
