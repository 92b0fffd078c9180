//! geoconnect - A client for the GeoGit web API
//!
//! geoconnect exposes the operations of a remote versioned geospatial
//! repository (status, log, revision resolution, transactions, push/pull,
//! tree listing, blame, version info and repository creation) over the
//! server's HTTP+JSON API.
//!
//! # Architecture
//!
//! - [`connector`] - The `Connector` trait, the HTTP implementation, the
//!   in-memory mock and the transaction manager
//! - [`core`] - Domain types and configuration
//! - [`logging`] - Injected logging capability
//!
//! # Correctness Invariants
//!
//! 1. Every request carries `output_format=json`
//! 2. Every failed command surfaces as an error naming the command, the
//!    repository and the cause; credentials never appear in errors or logs
//! 3. At most one transaction is open per transaction manager, and a
//!    handle cannot be used after it has been ended

pub mod connector;
pub mod core;
pub mod logging;
