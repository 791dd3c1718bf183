//! Error types for command parsing and dispatch.
//!
//! Every [`CommandError`] maps onto exactly one protocol status code, so a
//! handler never chooses codes for its failures directly.

use std::error::Error as StdError;

use thiserror::Error;

use super::request::TokenizeError;
use super::response::ResponseCode;

/// Boxed cause of an operation failure.
pub type OperationSource = Box<dyn StdError + Send + Sync + 'static>;

/// Failures a command can report to the client.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command line is malformed or the argument count is wrong.
    #[error("{usage}")]
    Syntax {
        /// Usage text or parse failure returned to the client.
        usage: String,
    },
    /// An argument has the right shape but an unacceptable value.
    #[error("{message}")]
    Parameter {
        /// Description of the rejected argument.
        message: String,
    },
    /// The controller or collaborator refused the operation.
    #[error("{operation} failed: {source}")]
    Operation {
        /// Operation that failed.
        operation: String,
        /// Underlying failure.
        #[source]
        source: OperationSource,
    },
    /// A handler broke the dispatch contract, for example by panicking.
    #[error("{message}")]
    Fatal {
        /// Description of the fault.
        message: String,
    },
}

impl CommandError {
    /// Status code reported for this error.
    #[must_use]
    pub fn code(&self) -> ResponseCode {
        match self {
            Self::Syntax { .. } => ResponseCode::CommandSyntaxError,
            Self::Parameter { .. } => ResponseCode::CommandParameterError,
            Self::Operation { .. } | Self::Fatal { .. } => ResponseCode::OperationFailed,
        }
    }

    /// Creates a syntax error carrying `usage`.
    pub fn syntax(usage: impl Into<String>) -> Self {
        Self::Syntax {
            usage: usage.into(),
        }
    }

    /// Creates a parameter error.
    pub fn parameter(message: impl Into<String>) -> Self {
        Self::Parameter {
            message: message.into(),
        }
    }

    /// Wraps a collaborator failure for `operation`.
    pub fn operation(operation: impl Into<String>, source: impl Into<OperationSource>) -> Self {
        Self::Operation {
            operation: operation.into(),
            source: source.into(),
        }
    }

    /// Creates a fatal error.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    /// Returns an adapter mapping a collaborator error into an operation error.
    pub fn failed<E>(operation: &'static str) -> impl FnOnce(E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        move |source| Self::operation(operation, source)
    }
}

impl From<TokenizeError> for CommandError {
    fn from(error: TokenizeError) -> Self {
        Self::syntax(error.to_string())
    }
}

/// Errors raised while building the command registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Two handlers were registered under one name.
    #[error("command '{name}' is already registered")]
    Duplicate {
        /// Name registered twice.
        name: String,
    },
}
