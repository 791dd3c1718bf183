//! Command registry and dispatcher.
//!
//! Handlers are registered once at startup under a unique name and looked up
//! by exact, case-sensitive match on the first token of each command line.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::controllers::Controllers;

use super::DISPATCH_TARGET;
use super::errors::{CommandError, RegistryError};
use super::request::CommandLine;
use super::response::Reply;

/// Identity of the client issuing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    peer: String,
}

impl ClientInfo {
    /// Describes a client by its peer address.
    pub fn new(peer: impl Into<String>) -> Self {
        Self { peer: peer.into() }
    }

    /// Peer address.
    #[must_use]
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

/// State handed to every handler invocation.
pub struct CommandContext<'a> {
    /// Every subsystem controller.
    pub controllers: &'a Controllers,
    /// Issuing client.
    pub client: &'a ClientInfo,
}

/// A registered command implementation.
pub type CommandHandler =
    Box<dyn Fn(&CommandContext<'_>, &[String]) -> Result<Reply, CommandError> + Send + Sync>;

/// Name to handler map, immutable once the dispatcher is built.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, CommandHandler>,
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        formatter
            .debug_struct("CommandRegistry")
            .field("commands", &names)
            .finish()
    }
}

impl CommandRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`.
    pub fn register<F>(&mut self, name: &str, handler: F) -> Result<(), RegistryError>
    where
        F: Fn(&CommandContext<'_>, &[String]) -> Result<Reply, CommandError>
            + Send
            + Sync
            + 'static,
    {
        if self.handlers.contains_key(name) {
            return Err(RegistryError::Duplicate {
                name: name.to_owned(),
            });
        }
        self.handlers.insert(name.to_owned(), Box::new(handler));
        Ok(())
    }

    /// Whether a handler is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn get(&self, name: &str) -> Option<&CommandHandler> {
        self.handlers.get(name)
    }
}

/// Routes command lines to their handlers.
#[derive(Debug)]
pub struct Dispatcher {
    registry: CommandRegistry,
    controllers: Arc<Controllers>,
}

impl Dispatcher {
    /// Freezes `registry` and binds it to the controllers.
    pub fn new(registry: CommandRegistry, controllers: Arc<Controllers>) -> Self {
        Self {
            registry,
            controllers,
        }
    }

    /// Shared controllers.
    #[must_use]
    pub fn controllers(&self) -> &Arc<Controllers> {
        &self.controllers
    }

    /// Runs one command line, always producing exactly one reply.
    pub fn dispatch(&self, client: &ClientInfo, line: &str) -> Reply {
        match self.try_dispatch(client, line) {
            Ok(reply) => reply,
            Err(error) => Reply::from_error(&error),
        }
    }

    fn try_dispatch(&self, client: &ClientInfo, line: &str) -> Result<Reply, CommandError> {
        let command = CommandLine::parse(line)?
            .ok_or_else(|| CommandError::syntax("Command not recognized"))?;
        let Some(handler) = self.registry.get(command.name()) else {
            warn!(
                target: DISPATCH_TARGET,
                command = command.name(),
                peer = client.peer(),
                "command not recognized"
            );
            return Err(CommandError::syntax("Command not recognized"));
        };

        debug!(
            target: DISPATCH_TARGET,
            command = command.name(),
            argc = command.args().len(),
            peer = client.peer(),
            "dispatching command"
        );
        let context = CommandContext {
            controllers: &self.controllers,
            client,
        };
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&context, command.args())));
        match outcome {
            Ok(result) => {
                if let Err(failure) = &result {
                    debug!(
                        target: DISPATCH_TARGET,
                        command = command.name(),
                        code = failure.code().value(),
                        error = %failure,
                        "command failed"
                    );
                }
                result
            }
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                error!(
                    target: DISPATCH_TARGET,
                    command = command.name(),
                    panic = %detail,
                    "command handler panicked"
                );
                Err(CommandError::fatal(format!(
                    "{} handler fault: {detail}",
                    command.name()
                )))
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_owned()
    }
}
