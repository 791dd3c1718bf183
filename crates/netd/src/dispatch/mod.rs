//! Text command dispatch for the control socket.
//!
//! Clients write one command per line. The first token names the command and
//! the remaining tokens are its arguments, with double quotes grouping tokens
//! that contain spaces:
//!
//! ```text
//! softap set wlan0 "Home Network" broadcast 6 wpa2-psk "secret passphrase"
//! ```
//!
//! Every line produces zero or more `1xx` item lines followed by exactly one
//! terminal line carrying a `2xx`, `4xx` or `5xx` code:
//!
//! ```text
//! 110 lo
//! 110 wlan0
//! 200 Interface list completed
//! ```
//!
//! A connection stays open for any number of commands. Replies are written
//! in request order.

mod commands;
mod errors;
mod handler;
mod registry;
mod request;
mod response;

pub use self::commands::default_registry;
pub use self::errors::{CommandError, OperationSource, RegistryError};
pub(crate) use self::handler::DispatchConnectionHandler;
pub use self::registry::{ClientInfo, CommandContext, CommandHandler, CommandRegistry, Dispatcher};
pub use self::request::{CommandLine, TokenizeError};
pub use self::response::{Reply, ReplyLine, ResponseCode, ResponseWriter};

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
