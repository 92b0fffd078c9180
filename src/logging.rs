//! logging
//!
//! Logging capability injected into connectors at construction.
//!
//! # Design
//!
//! The crate never touches global logger state. A connector owns an
//! `Arc<dyn Logger>` and routes every diagnostic through it. Two
//! implementations ship with the crate:
//!
//! - [`TracingLogger`] (default) emits `tracing` events under the
//!   `geoconnect` target, leaving subscriber setup to the application.
//! - [`ConsoleLogger`] writes to stderr, gated by a [`Verbosity`] level.

use std::sync::Arc;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Quiet mode - nothing but errors
    Quiet,
    /// Normal mode - warnings
    #[default]
    Normal,
    /// Debug mode - every outgoing request
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// A sink for connector diagnostics.
///
/// Implementations must be `Send + Sync` so a connector can be shared
/// across tasks.
pub trait Logger: Send + Sync {
    /// Record a debug-level message (outgoing requests, parameters).
    fn debug(&self, message: &str);

    /// Record a warning (swallowed failures, unexpected payload shapes).
    fn warn(&self, message: &str);
}

/// Logger that forwards to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!(target: "geoconnect", "{}", message);
    }

    fn warn(&self, message: &str) {
        tracing::warn!(target: "geoconnect", "{}", message);
    }
}

/// Logger that prints to stderr according to a verbosity level.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleLogger {
    verbosity: Verbosity,
}

impl ConsoleLogger {
    /// Create a console logger with the given verbosity.
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    /// The configured verbosity.
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }
}

impl Logger for ConsoleLogger {
    fn debug(&self, message: &str) {
        if self.verbosity == Verbosity::Debug {
            eprintln!("[debug] {}", message);
        }
    }

    fn warn(&self, message: &str) {
        if self.verbosity != Verbosity::Quiet {
            eprintln!("warning: {}", message);
        }
    }
}

/// The logger used when none is supplied.
pub fn default_logger() -> Arc<dyn Logger> {
    Arc::new(TracingLogger)
}
