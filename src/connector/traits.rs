//! connector::traits
//!
//! The `Connector` trait and the option types its commands take.
//!
//! # Design
//!
//! The trait is async because every command is network I/O. Each command
//! issues exactly one request and returns; nothing runs in the background.
//! All methods return `Result<_, ConnectorError>` except
//! [`Connector::check_is_repo`], an availability probe that never fails.
//!
//! # Example
//!
//! ```ignore
//! use geoconnect::connector::{Connector, LogOptions};
//!
//! async fn recent(connector: &dyn Connector) -> Result<(), ConnectorError> {
//!     if !connector.check_is_repo().await {
//!         return Ok(());
//!     }
//!     let commits = connector
//!         .log(LogOptions { limit: Some(5), ..Default::default() })
//!         .await?;
//!     for commit in commits {
//!         println!("{:?} {:?}", commit.id(), commit.message());
//!     }
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;

use super::envelope::{
    CommitRecord, Payload, Reference, StatusReport, SyncReport, TransactionReceipt, TreeListing,
    VersionInfo,
};
use super::errors::ConnectorError;
use super::request::CommandParams;
use crate::core::types::{RefSpec, TransactionId};

/// How `endTransaction` finishes a transaction.
///
/// **The default is [`EndMode::Cancel`]**: ending a transaction without
/// choosing a mode discards every change made inside it. Use
/// [`EndMode::Commit`] (or `TransactionManager::commit`) to keep the work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndMode {
    /// Discard the transaction's pending changes
    #[default]
    Cancel,
    /// Apply the transaction's pending changes
    Commit,
}

impl EndMode {
    /// Value of the `cancel` query parameter.
    pub fn cancel_flag(self) -> bool {
        matches!(self, EndMode::Cancel)
    }
}

impl std::fmt::Display for EndMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndMode::Cancel => write!(f, "cancel"),
            EndMode::Commit => write!(f, "commit"),
        }
    }
}

/// Filters for the `log` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Only commits touching this path
    pub path: Option<String>,
    /// Maximum number of commits
    pub limit: Option<u32>,
    /// Number of commits to skip
    pub offset: Option<u32>,
    /// Branch to walk instead of the current one
    pub branch: Option<String>,
    /// Start of the commit range (exclusive)
    pub since: Option<String>,
    /// End of the commit range (inclusive)
    pub until: Option<String>,
    /// Read the log as seen inside this transaction
    pub transaction_id: Option<TransactionId>,
}

impl LogOptions {
    /// Query parameters for these options, in a stable order.
    pub fn to_params(&self) -> CommandParams {
        CommandParams::new()
            .with_opt("path", self.path.as_deref())
            .with_opt("limit", self.limit)
            .with_opt("offset", self.offset)
            .with_opt("branch", self.branch.as_deref())
            .with_opt("since", self.since.as_deref())
            .with_opt("until", self.until.as_deref())
            .with_opt("transactionId", self.transaction_id.as_ref())
    }
}

/// A client for one remote repository.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// Failures arrive as `ConnectorError::Command` carrying the command name,
/// the repository and a `Cause`. Callers usually only need:
/// - `Cause::NotFound`: the reference does not exist
/// - `Cause::Rejected`: the server refused (e.g. stale transaction id)
/// - `Cause::Transport` / `Cause::Timeout`: check connectivity
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connector name (e.g. "geoserver", "mock").
    fn name(&self) -> &'static str;

    /// Working tree status, including `header.branch`.
    async fn status(&self) -> Result<StatusReport, ConnectorError>;

    /// Check whether the endpoint is a reachable repository.
    ///
    /// True iff `status` succeeds with `success: true`. Every failure,
    /// including transport errors, is reported as `false`.
    async fn check_is_repo(&self) -> bool {
        match self.status().await {
            Ok(report) => report.success(),
            Err(_) => false,
        }
    }

    /// Resolve a reference name (e.g. `master`) to its `Ref` mapping.
    ///
    /// # Errors
    ///
    /// - `Cause::InvalidArgument` if `name` is empty
    /// - `Cause::NotFound` if the server does not know the reference
    async fn rev_parse(&self, name: &str) -> Result<Reference, ConnectorError>;

    /// Commit history in server order (newest first). An empty history is
    /// not an error.
    async fn log(&self, options: LogOptions) -> Result<Vec<CommitRecord>, ConnectorError>;

    /// Build and version metadata of the server.
    async fn version(&self) -> Result<VersionInfo, ConnectorError>;

    /// Open a server-side transaction.
    async fn begin_transaction(&self) -> Result<TransactionReceipt, ConnectorError>;

    /// Close a transaction, discarding or applying its changes.
    ///
    /// See [`EndMode`]: the default discards.
    async fn end_transaction(
        &self,
        id: &TransactionId,
        mode: EndMode,
    ) -> Result<Payload, ConnectorError>;

    /// Push `spec` to `remote`.
    async fn push(
        &self,
        remote: &str,
        spec: &RefSpec,
        transaction: Option<&TransactionId>,
    ) -> Result<SyncReport, ConnectorError>;

    /// Pull `spec` from `remote`.
    async fn pull(
        &self,
        remote: &str,
        spec: &RefSpec,
        transaction: Option<&TransactionId>,
    ) -> Result<SyncReport, ConnectorError>;

    /// List the tree of the current head.
    async fn ls_tree(&self) -> Result<TreeListing, ConnectorError>;

    /// Line-by-line attribution of `path` as of `commit`.
    async fn blame(&self, commit: &str, path: &str) -> Result<Payload, ConnectorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_mode_default_is_cancel() {
        assert_eq!(EndMode::default(), EndMode::Cancel);
        assert!(EndMode::default().cancel_flag());
        assert!(!EndMode::Commit.cancel_flag());
    }

    #[test]
    fn end_mode_display() {
        assert_eq!(format!("{}", EndMode::Cancel), "cancel");
        assert_eq!(format!("{}", EndMode::Commit), "commit");
    }

    #[test]
    fn log_options_default_has_no_params() {
        assert!(LogOptions::default().to_params().is_empty());
    }

    #[test]
    fn log_options_params() {
        let options = LogOptions {
            path: Some("roads".into()),
            limit: Some(10),
            offset: Some(20),
            branch: Some("dev".into()),
            since: None,
            until: Some("HEAD".into()),
            transaction_id: Some(TransactionId::new("tx").unwrap()),
        };
        let params = options.to_params();
        let keys: Vec<&str> = params.pairs().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["path", "limit", "offset", "branch", "until", "transactionId"]
        );
        assert_eq!(params.get("limit"), Some("10"));
        assert_eq!(params.get("transactionId"), Some("tx"));
    }
}
