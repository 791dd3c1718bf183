//! `softap` command.

use crate::controllers::{SoftapFirmware, SoftapSecurity, SoftapSettings, Subsystem};
use crate::dispatch::errors::{CommandError, RegistryError};
use crate::dispatch::registry::{CommandContext, CommandRegistry};
use crate::dispatch::response::{Reply, ResponseCode};

use super::args::Args;

const USAGE: &str = "Usage: softap <startap|stopap|status|fwreload|set> [args]";

/// WPA passphrases are 8 to 63 printable characters.
const PASSPHRASE_LENGTH: std::ops::RangeInclusive<usize> = 8..=63;

/// Longest SSID in bytes.
const MAX_SSID_BYTES: usize = 32;

pub(crate) fn register(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    registry.register("softap", handle)
}

fn handle(context: &CommandContext<'_>, tokens: &[String]) -> Result<Reply, CommandError> {
    let args = Args::new(USAGE, tokens);
    let controller = &context.controllers.softap;
    match args.subcommand()? {
        "startap" => {
            args.exact(1)?;
            super::switch(context, Subsystem::Softap, true, "softap startap")?;
            Ok(Reply::ok("Softap operation succeeded"))
        }
        "stopap" => {
            args.exact(1)?;
            super::switch(context, Subsystem::Softap, false, "softap stopap")?;
            Ok(Reply::ok("Softap operation succeeded"))
        }
        "status" => {
            args.exact(1)?;
            let state = if super::is_active(context, Subsystem::Softap) {
                "running"
            } else {
                "not running"
            };
            Ok(Reply::new(
                ResponseCode::SoftapStatusResult,
                format!("Softap service is {state}"),
            ))
        }
        "fwreload" => {
            args.exact(3)?;
            let interface = args.interface(1)?;
            let firmware: SoftapFirmware = args.parse(2, "firmware")?;
            controller
                .reload_firmware(interface, firmware)
                .map_err(CommandError::failed("softap fwreload"))?;
            Ok(Reply::ok("Softap operation succeeded"))
        }
        "set" => {
            let settings = settings(&args)?;
            controller
                .configure(settings)
                .map_err(CommandError::failed("softap set"))?;
            Ok(Reply::ok("Softap operation succeeded"))
        }
        _ => Err(args.usage()),
    }
}

/// `set <if> <ssid> <broadcast|hidden> <channel> <security> [<key>]`
fn settings(args: &Args<'_>) -> Result<SoftapSettings, CommandError> {
    args.at_least(6)?;
    let interface = args.interface(1)?;
    let ssid = args.get(2)?;
    if ssid.is_empty() || ssid.len() > MAX_SSID_BYTES {
        return Err(CommandError::parameter(format!("Invalid ssid '{ssid}'")));
    }
    let hidden = match args.get(3)? {
        "broadcast" => false,
        "hidden" => true,
        other => {
            return Err(CommandError::parameter(format!(
                "Invalid visibility '{other}'"
            )));
        }
    };
    let channel: u8 = args.parse(4, "channel")?;
    if !(1..=165).contains(&channel) {
        return Err(CommandError::parameter(format!("Invalid channel '{channel}'")));
    }
    let security: SoftapSecurity = args.parse(5, "security")?;
    let passphrase = if security.requires_key() {
        args.exact(7)?;
        let key = args.get(6)?;
        if !PASSPHRASE_LENGTH.contains(&key.len()) {
            return Err(CommandError::parameter("Passphrase must be 8 to 63 characters"));
        }
        Some(key.to_owned())
    } else {
        args.exact(6)?;
        None
    };
    Ok(SoftapSettings {
        interface: interface.to_owned(),
        ssid: ssid.to_owned(),
        hidden,
        channel,
        security,
        passphrase,
    })
}
