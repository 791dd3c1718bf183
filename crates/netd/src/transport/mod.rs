//! Control socket transport.
//!
//! The listener binds the configured endpoint and serves every accepted
//! connection on its own thread through a [`ConnectionHandler`].

mod errors;
mod handler;
mod listener;
#[cfg(test)]
mod listener_tests;
#[cfg(test)]
mod test_utils;

pub use self::errors::ListenerError;
pub(crate) use self::errors::LineError;
pub(crate) use self::handler::{ConnectionHandler, ConnectionStream, LineReader, MAX_LINE_BYTES};
pub(crate) use self::listener::{ListenerHandle, SocketListener};
#[cfg(test)]
pub(crate) use self::test_utils::{CountingHandler, EchoHandler};

const LISTENER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");
