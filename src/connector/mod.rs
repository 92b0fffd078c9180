//! connector
//!
//! Client side of the repository server's HTTP+JSON remote API.
//!
//! # Architecture
//!
//! The [`Connector`] trait defines one method per repository operation.
//! [`GeoServerConnector`] implements it over HTTP; [`mock::MockConnector`]
//! implements it in memory for tests. Each HTTP command flows through:
//!
//! - `request`: [`CommandRequest`] and [`CommandParams`] build the outbound
//!   request (URL, query, basic auth)
//! - `envelope`: unwraps the `response` envelope and parses typed results
//! - `geoserver`: dispatches commands and translates every failure into a
//!   [`CommandError`]
//! - `transaction`: [`TransactionManager`] owns the Open/Closed lifecycle
//!   of server transactions
//!
//! # Example
//!
//! ```ignore
//! use geoconnect::connector::{
//!     Connector, Credentials, GeoServerConnector, RepositoryHandle, TransactionManager,
//! };
//! use geoconnect::core::types::RefSpec;
//!
//! let handle = RepositoryHandle::new("http://localhost:8080/geoserver/geogit/ws:roads")?
//!     .with_credentials(Credentials::new("admin", Some(password)));
//! let connector = GeoServerConnector::new(handle);
//!
//! if connector.check_is_repo().await {
//!     let mut tx = TransactionManager::new(&connector);
//!     let handle = tx.begin().await?;
//!     tx.pull(&handle, "origin", &RefSpec::same("master")?).await?;
//!     tx.commit(handle).await?;
//! }
//! ```

pub mod envelope;
mod errors;
pub mod geoserver;
mod handle;
pub mod mock;
mod request;
mod traits;
mod transaction;

pub use envelope::{
    CommitRecord, Payload, Reference, Signature, StatusReport, SyncKind, SyncReport,
    TransactionReceipt, TreeListing, TreeNode, VersionInfo,
};
pub use errors::{Cause, CommandError, ConnectorError, TransactionError};
pub use geoserver::{GeoServerConnector, GeoServerConnectorBuilder, DEFAULT_TIMEOUT};
pub use handle::{Credentials, RepositoryHandle};
pub use request::{CommandParams, CommandRequest, Method, OUTPUT_FORMAT_JSON, OUTPUT_FORMAT_KEY};
pub use traits::*;
pub use transaction::{TransactionHandle, TransactionManager, TransactionState};
