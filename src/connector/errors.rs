//! connector::errors
//!
//! Error types for connector operations.
//!
//! # Design
//!
//! Every dispatched command that fails produces a [`CommandError`]: the
//! command name, the repository it targeted, the query parameters it sent
//! and a [`Cause`]. Translation from transport and parse failures happens in
//! one place in the dispatcher so all commands report failures the same way.
//!
//! Error messages never contain credentials. Parameters are recorded, but
//! credentials travel in the authorization header and are not part of them.
//!
//! # Example
//!
//! ```
//! use geoconnect::connector::{Cause, CommandError};
//!
//! let err = CommandError::new(
//!     "status",
//!     "http://localhost:8080/geoserver/geogit/ws:repo",
//!     vec![("output_format".into(), "json".into())],
//!     "unable to get status",
//!     Cause::Transport("connection refused".into()),
//! );
//! assert!(err.to_string().contains("unable to get status"));
//! assert!(err.to_string().contains("ws:repo"));
//! assert!(err.cause.is_transient());
//! ```

use thiserror::Error;

use crate::core::types::TransactionId;

/// The underlying reason a command failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Cause {
    /// Network or connection failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body or reason phrase
        message: String,
    },

    /// The response body was not the JSON shape the command expects.
    #[error("parse error: {0}")]
    Parse(String),

    /// The requested reference or object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server processed the request and reported `success: false`.
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// The caller passed an argument that cannot be sent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The per-request timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// The request was cancelled through the connector's token.
    #[error("request cancelled")]
    Cancelled,
}

impl Cause {
    /// Classify a `reqwest` failure.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Cause::Timeout
        } else if err.is_decode() {
            Cause::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            Cause::Status {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string(),
            }
        } else {
            Cause::Transport(err.to_string())
        }
    }

    /// Check if this failure might succeed when retried unchanged.
    pub fn is_transient(&self) -> bool {
        match self {
            Cause::Transport(_) | Cause::Timeout => true,
            Cause::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Check if the server answered with a client-side (4xx) status.
    pub fn is_client_status(&self) -> bool {
        matches!(self, Cause::Status { status, .. } if (400..500).contains(status))
    }
}

/// A failed command, with enough context to log it without further lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{summary}: `{command}` against {repository}: {cause}")]
pub struct CommandError {
    /// Remote command name (e.g. `refparse`)
    pub command: String,
    /// Base URL of the target repository
    pub repository: String,
    /// Query parameters sent with the request
    pub params: Vec<(String, String)>,
    /// Short human-readable description of what failed
    pub summary: &'static str,
    /// The underlying failure
    #[source]
    pub cause: Cause,
}

impl CommandError {
    /// Create a new command error.
    pub fn new(
        command: impl Into<String>,
        repository: impl Into<String>,
        params: Vec<(String, String)>,
        summary: &'static str,
        cause: Cause,
    ) -> Self {
        Self {
            command: command.into(),
            repository: repository.into(),
            params,
            summary,
            cause,
        }
    }
}

/// Invalid transitions of the transaction state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    /// `begin` was called while a transaction was open.
    #[error("transaction {0} is already open")]
    AlreadyOpen(TransactionId),

    /// `end` was called with no open transaction.
    #[error("no transaction is open")]
    NotOpen,

    /// A handle was used after its transaction ended.
    #[error("transaction {0} is no longer active")]
    Stale(TransactionId),

    /// The server accepted `beginTransaction` without issuing an id.
    #[error("server did not return a transaction id")]
    MissingId,
}

/// Errors surfaced by connectors.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// A dispatched command failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The transaction state machine rejected a transition.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Raw transport failure from an administrative request.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// An administrative request was cancelled.
    #[error("request cancelled")]
    Cancelled,

    /// The repository handle or connector settings are unusable.
    #[error("invalid repository handle: {0}")]
    InvalidHandle(String),
}

impl ConnectorError {
    /// The command error, if this is one.
    pub fn as_command(&self) -> Option<&CommandError> {
        match self {
            ConnectorError::Command(err) => Some(err),
            _ => None,
        }
    }

    /// The underlying cause of a command failure.
    pub fn cause(&self) -> Option<&Cause> {
        self.as_command().map(|err| &err.cause)
    }

    /// Check if this error reports a missing reference or object.
    pub fn is_not_found(&self) -> bool {
        matches!(self.cause(), Some(Cause::NotFound(_)))
    }

    /// Check if this error reports a stale transaction, either detected
    /// locally or rejected by the server.
    pub fn is_stale_transaction(&self) -> bool {
        matches!(
            self,
            ConnectorError::Transaction(TransactionError::Stale(_))
                | ConnectorError::Transaction(TransactionError::NotOpen)
        ) || matches!(self.cause(), Some(Cause::Rejected(_)))
    }
}
