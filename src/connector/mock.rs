//! connector::mock
//!
//! Mock connector for deterministic testing.
//!
//! # Design
//!
//! The mock keeps a small repository in memory (current branch, refs, log,
//! open transactions) and answers every `Connector` command from it. It
//! mirrors the server's transaction bookkeeping: ending or using an id that
//! is not open is rejected, so stale-handle behavior can be tested without
//! a network. Failures can be injected per command and every call is
//! recorded for later verification.
//!
//! # Example
//!
//! ```
//! use geoconnect::connector::mock::MockConnector;
//! use geoconnect::connector::{Connector, EndMode};
//!
//! # tokio_test::block_on(async {
//! let connector = MockConnector::new();
//!
//! let receipt = connector.begin_transaction().await.unwrap();
//! let id = receipt.transaction_id().unwrap();
//! connector.end_transaction(&id, EndMode::Commit).await.unwrap();
//!
//! // The id is dead now
//! assert!(connector.end_transaction(&id, EndMode::Cancel).await.is_err());
//! # });
//! ```

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::envelope::{
    parse_commits, parse_reference, unwrap_envelope, CommitRecord, Payload, Reference,
    StatusReport, SyncKind, SyncReport, TransactionReceipt, TreeListing, VersionInfo,
};
use super::errors::{Cause, CommandError, ConnectorError};
use super::traits::{Connector, EndMode, LogOptions};
use crate::core::types::{RefSpec, TransactionId};

/// Repository label used in mock command errors.
const MOCK_REPOSITORY: &str = "mock://repository";

/// Mock connector for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone)]
pub struct MockConnector {
    /// Internal state shared across clones.
    inner: Arc<Mutex<MockConnectorInner>>,
}

/// Internal mutable state.
#[derive(Debug)]
struct MockConnectorInner {
    /// Current branch reported by status.
    branch: String,
    /// Short ref name -> (full name, object id).
    refs: HashMap<String, (String, String)>,
    /// Raw commit entries, newest first.
    log: Vec<Value>,
    /// Paths returned by ls-tree.
    tree: Vec<String>,
    /// Currently open transactions.
    open: HashSet<TransactionId>,
    /// Next transaction number to issue.
    next_transaction: u64,
    /// Command to fail on (for testing error paths).
    fail_on: Option<FailOn>,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

/// Configuration for which command should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail status (and therefore check_is_repo) with the given cause.
    Status(Cause),
    /// Fail rev_parse with the given cause.
    RevParse(Cause),
    /// Fail log with the given cause.
    Log(Cause),
    /// Fail version with the given cause.
    Version(Cause),
    /// Fail begin_transaction with the given cause.
    BeginTransaction(Cause),
    /// Fail end_transaction with the given cause.
    EndTransaction(Cause),
    /// Fail push with the given cause.
    Push(Cause),
    /// Fail pull with the given cause.
    Pull(Cause),
    /// Fail ls_tree with the given cause.
    LsTree(Cause),
    /// Fail blame with the given cause.
    Blame(Cause),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    Status,
    RevParse {
        name: String,
    },
    Log {
        options: LogOptions,
    },
    Version,
    BeginTransaction,
    EndTransaction {
        id: TransactionId,
        mode: EndMode,
    },
    Push {
        remote: String,
        spec: RefSpec,
        transaction: Option<TransactionId>,
    },
    Pull {
        remote: String,
        spec: RefSpec,
        transaction: Option<TransactionId>,
    },
    LsTree,
    Blame {
        commit: String,
        path: String,
    },
}

impl MockConnector {
    /// Create a mock repository on `master` with a single `master` ref.
    pub fn new() -> Self {
        let mut refs = HashMap::new();
        refs.insert(
            "master".to_string(),
            (
                "refs/heads/master".to_string(),
                "0000000000000000000000000000000000000001".to_string(),
            ),
        );

        Self {
            inner: Arc::new(Mutex::new(MockConnectorInner {
                branch: "master".to_string(),
                refs,
                log: Vec::new(),
                tree: Vec::new(),
                open: HashSet::new(),
                next_transaction: 1,
                fail_on: None,
                operations: Vec::new(),
            })),
        }
    }

    /// Seed the log with raw commit entries, newest first.
    ///
    /// # Example
    ///
    /// ```
    /// use geoconnect::connector::mock::MockConnector;
    /// use serde_json::json;
    ///
    /// let connector = MockConnector::new()
    ///     .with_log(vec![json!({"id": "c2", "parents": ["c1"]}), json!({"id": "c1"})]);
    /// ```
    pub fn with_log(self, entries: Vec<Value>) -> Self {
        self.inner.lock().unwrap().log = entries;
        self
    }

    /// Add a branch ref.
    pub fn with_branch(self, name: &str, object_id: &str) -> Self {
        self.inner.lock().unwrap().refs.insert(
            name.to_string(),
            (format!("refs/heads/{}", name), object_id.to_string()),
        );
        self
    }

    /// Seed the paths returned by ls-tree.
    pub fn with_tree(self, paths: &[&str]) -> Self {
        self.inner.lock().unwrap().tree = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Configure the mock to fail on a specific command.
    ///
    /// # Example
    ///
    /// ```
    /// use geoconnect::connector::mock::{MockConnector, FailOn};
    /// use geoconnect::connector::Cause;
    ///
    /// let connector = MockConnector::new()
    ///     .fail_on(FailOn::Status(Cause::Transport("connection refused".into())));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.fail_on = Some(fail_on);
        }
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_on = None;
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        let inner = self.inner.lock().unwrap();
        inner.operations.clone()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.clear();
    }

    /// Currently open transactions (for test verification).
    pub fn open_transactions(&self) -> Vec<TransactionId> {
        let inner = self.inner.lock().unwrap();
        inner.open.iter().cloned().collect()
    }

    /// Record an operation.
    fn record(&self, op: MockOperation) {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(op);
    }

    /// Return the injected cause if `command` is configured to fail.
    fn check_fail(&self, command: &str) -> Option<Cause> {
        let inner = self.inner.lock().unwrap();
        match &inner.fail_on {
            Some(FailOn::Status(c)) if command == "status" => Some(c.clone()),
            Some(FailOn::RevParse(c)) if command == "refparse" => Some(c.clone()),
            Some(FailOn::Log(c)) if command == "log" => Some(c.clone()),
            Some(FailOn::Version(c)) if command == "version" => Some(c.clone()),
            Some(FailOn::BeginTransaction(c)) if command == "beginTransaction" => {
                Some(c.clone())
            }
            Some(FailOn::EndTransaction(c)) if command == "endTransaction" => Some(c.clone()),
            Some(FailOn::Push(c)) if command == "push" => Some(c.clone()),
            Some(FailOn::Pull(c)) if command == "pull" => Some(c.clone()),
            Some(FailOn::LsTree(c)) if command == "ls-tree" => Some(c.clone()),
            Some(FailOn::Blame(c)) if command == "blame" => Some(c.clone()),
            _ => None,
        }
    }

    fn fail(command: &str, summary: &'static str, cause: Cause) -> ConnectorError {
        CommandError::new(command, MOCK_REPOSITORY, Vec::new(), summary, cause).into()
    }

    /// Fail with an injected cause or a server-style rejection of a
    /// transaction id that is not open.
    fn guard(
        &self,
        command: &str,
        summary: &'static str,
        transaction: Option<&TransactionId>,
    ) -> Result<(), ConnectorError> {
        if let Some(cause) = self.check_fail(command) {
            return Err(Self::fail(command, summary, cause));
        }
        if let Some(id) = transaction {
            let inner = self.inner.lock().unwrap();
            if !inner.open.contains(id) {
                return Err(Self::fail(
                    command,
                    summary,
                    Cause::Rejected(format!("Transaction '{}' not found", id)),
                ));
            }
        }
        Ok(())
    }

    fn payload(value: Value) -> Payload {
        unwrap_envelope(json!({ "response": value }))
    }

    fn sync(
        &self,
        kind: SyncKind,
        remote: &str,
        spec: &RefSpec,
        transaction: Option<&TransactionId>,
    ) -> Result<SyncReport, ConnectorError> {
        let (command, summary) = match kind {
            SyncKind::Push => ("push", "unable to push"),
            SyncKind::Pull => ("pull", "unable to pull"),
        };
        self.guard(command, summary, transaction)?;

        let echo = match kind {
            SyncKind::Push => json!("Success"),
            SyncKind::Pull => json!({"Remote": remote, "Ref": spec.remote()}),
        };
        let mut body = Map::new();
        body.insert("success".into(), Value::Bool(true));
        body.insert(kind.echo_key().into(), echo);
        Ok(SyncReport::new(kind, Payload::from_map(body)))
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn status(&self) -> Result<StatusReport, ConnectorError> {
        self.record(MockOperation::Status);
        self.guard("status", "unable to get status", None)?;

        let branch = self.inner.lock().unwrap().branch.clone();
        Ok(StatusReport::from(Self::payload(json!({
            "success": true,
            "header": {"branch": branch}
        }))))
    }

    async fn rev_parse(&self, name: &str) -> Result<Reference, ConnectorError> {
        const SUMMARY: &str = "reference not found";
        self.record(MockOperation::RevParse {
            name: name.to_string(),
        });
        self.guard("refparse", SUMMARY, None)?;

        if name.trim().is_empty() {
            return Err(Self::fail(
                "refparse",
                SUMMARY,
                Cause::InvalidArgument("reference name cannot be empty".into()),
            ));
        }

        let found = {
            let inner = self.inner.lock().unwrap();
            let short = name.strip_prefix("refs/heads/").unwrap_or(name);
            inner.refs.get(short).cloned()
        };
        let (full, object_id) =
            found.ok_or_else(|| Self::fail("refparse", SUMMARY, Cause::NotFound(name.into())))?;

        let payload = Self::payload(json!({
            "success": true,
            "Ref": {"name": full, "objectId": object_id}
        }));
        parse_reference(payload)
            .map_err(|cause| Self::fail("refparse", SUMMARY, cause))
    }

    async fn log(&self, options: LogOptions) -> Result<Vec<CommitRecord>, ConnectorError> {
        const SUMMARY: &str = "unable to retrieve log";
        self.record(MockOperation::Log {
            options: options.clone(),
        });
        self.guard("log", SUMMARY, options.transaction_id.as_ref())?;

        let entries = self.inner.lock().unwrap().log.clone();
        let offset = options.offset.unwrap_or(0) as usize;
        let limit = options.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        let page: Vec<Value> = entries.into_iter().skip(offset).take(limit).collect();

        parse_commits(&Self::payload(json!({"success": true, "commit": page})))
            .map_err(|cause| Self::fail("log", SUMMARY, cause))
    }

    async fn version(&self) -> Result<VersionInfo, ConnectorError> {
        self.record(MockOperation::Version);
        self.guard("version", "unable to retrieve version", None)?;
        Ok(VersionInfo::from(Self::payload(json!({
            "success": true,
            "ProjectVersion": "mock",
        }))))
    }

    async fn begin_transaction(&self) -> Result<TransactionReceipt, ConnectorError> {
        self.record(MockOperation::BeginTransaction);
        self.guard("beginTransaction", "unable to begin transaction", None)?;

        let mut inner = self.inner.lock().unwrap();
        let number = inner.next_transaction;
        inner.next_transaction += 1;
        let id = format!("mock-tx-{}", number);
        if let Ok(tx) = TransactionId::new(id.clone()) {
            inner.open.insert(tx);
        }

        Ok(TransactionReceipt::from(Self::payload(json!({
            "success": true,
            "Transaction": {"ID": id}
        }))))
    }

    async fn end_transaction(
        &self,
        id: &TransactionId,
        mode: EndMode,
    ) -> Result<Payload, ConnectorError> {
        self.record(MockOperation::EndTransaction {
            id: id.clone(),
            mode,
        });
        self.guard("endTransaction", "unable to end transaction", Some(id))?;

        self.inner.lock().unwrap().open.remove(id);
        Ok(Self::payload(json!({
            "success": true,
            "Transaction": {"ID": id.as_str(), "cancelled": mode.cancel_flag()}
        })))
    }

    async fn push(
        &self,
        remote: &str,
        spec: &RefSpec,
        transaction: Option<&TransactionId>,
    ) -> Result<SyncReport, ConnectorError> {
        self.record(MockOperation::Push {
            remote: remote.to_string(),
            spec: spec.clone(),
            transaction: transaction.cloned(),
        });
        self.sync(SyncKind::Push, remote, spec, transaction)
    }

    async fn pull(
        &self,
        remote: &str,
        spec: &RefSpec,
        transaction: Option<&TransactionId>,
    ) -> Result<SyncReport, ConnectorError> {
        self.record(MockOperation::Pull {
            remote: remote.to_string(),
            spec: spec.clone(),
            transaction: transaction.cloned(),
        });
        self.sync(SyncKind::Pull, remote, spec, transaction)
    }

    async fn ls_tree(&self) -> Result<TreeListing, ConnectorError> {
        const SUMMARY: &str = "unable to list tree";
        self.record(MockOperation::LsTree);
        self.guard("ls-tree", SUMMARY, None)?;

        let nodes: Vec<Value> = self
            .inner
            .lock()
            .unwrap()
            .tree
            .iter()
            .map(|path| json!({"path": path}))
            .collect();
        TreeListing::from_payload(Self::payload(json!({"success": true, "node": nodes})))
            .map_err(|cause| Self::fail("ls-tree", SUMMARY, cause))
    }

    async fn blame(&self, commit: &str, path: &str) -> Result<Payload, ConnectorError> {
        self.record(MockOperation::Blame {
            commit: commit.to_string(),
            path: path.to_string(),
        });
        self.guard("blame", "unable to blame", None)?;
        Ok(Self::payload(json!({
            "success": true,
            "Blame": {"commit": commit, "path": path}
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_reports_branch() {
        let connector = MockConnector::new();
        let report = connector.status().await.unwrap();
        assert!(report.success());
        assert_eq!(report.branch(), Some("master"));
        assert!(connector.check_is_repo().await);
    }

    #[tokio::test]
    async fn failing_status_is_not_a_repo() {
        let connector =
            MockConnector::new().fail_on(FailOn::Status(Cause::Transport("refused".into())));
        assert!(!connector.check_is_repo().await);

        connector.clear_fail_on();
        assert!(connector.check_is_repo().await);
    }

    #[tokio::test]
    async fn rev_parse_known_and_unknown() {
        let connector = MockConnector::new().with_branch("dev", "abc");
        let master = connector.rev_parse("master").await.unwrap();
        assert_eq!(master.name(), Some("refs/heads/master"));

        let dev = connector.rev_parse("refs/heads/dev").await.unwrap();
        assert_eq!(dev.object_id(), Some("abc"));

        let err = connector.rev_parse("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn log_pages_entries() {
        let connector = MockConnector::new().with_log(vec![
            json!({"id": "c3"}),
            json!({"id": "c2"}),
            json!({"id": "c1"}),
        ]);
        let page = connector
            .log(LogOptions {
                offset: Some(1),
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id(), Some("c2"));
    }

    #[tokio::test]
    async fn transactions_are_tracked() {
        let connector = MockConnector::new();
        let first = connector
            .begin_transaction()
            .await
            .unwrap()
            .transaction_id()
            .unwrap();
        let second = connector
            .begin_transaction()
            .await
            .unwrap()
            .transaction_id()
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(connector.open_transactions().len(), 2);

        connector
            .end_transaction(&first, EndMode::Cancel)
            .await
            .unwrap();
        assert_eq!(connector.open_transactions(), vec![second]);
    }

    #[tokio::test]
    async fn push_with_stale_transaction_rejected() {
        let connector = MockConnector::new();
        let id = connector
            .begin_transaction()
            .await
            .unwrap()
            .transaction_id()
            .unwrap();
        connector.end_transaction(&id, EndMode::Cancel).await.unwrap();

        let spec = RefSpec::same("master").unwrap();
        let err = connector
            .push("origin", &spec, Some(&id))
            .await
            .unwrap_err();
        assert!(err.is_stale_transaction());
    }

    #[tokio::test]
    async fn operations_are_recorded() {
        let connector = MockConnector::new().with_tree(&["roads"]);
        connector.ls_tree().await.unwrap();
        connector.blame("HEAD", "roads/1").await.unwrap();
        assert_eq!(
            connector.operations(),
            vec![
                MockOperation::LsTree,
                MockOperation::Blame {
                    commit: "HEAD".into(),
                    path: "roads/1".into()
                }
            ]
        );
        connector.clear_operations();
        assert!(connector.operations().is_empty());
    }

    #[tokio::test]
    async fn pull_echoes_remote() {
        let connector = MockConnector::new();
        let spec = RefSpec::new("master:dev").unwrap();
        let report = connector.pull("origin", &spec, None).await.unwrap();
        assert_eq!(report.kind(), SyncKind::Pull);
        assert_eq!(report.echo().unwrap()["Ref"], json!("dev"));
    }
}
