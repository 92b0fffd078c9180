//! connector::transaction
//!
//! Explicit state machine around `beginTransaction` / `endTransaction`.
//!
//! # States
//!
//! ```text
//!            begin()                      end(handle, mode)
//!   Closed ----------> Open(id) ------------------------------> Closed
//!     ^                   |  begin() -> AlreadyOpen
//!     |                   |  end(other handle) -> Stale
//!     +-- end() -> NotOpen
//! ```
//!
//! A [`TransactionHandle`] is not `Clone` and is consumed by `end`, so a
//! handle cannot be ended twice. Commands run through the manager attach
//! the open transaction id and refuse handles that are no longer open.
//!
//! # Ending a transaction
//!
//! **`EndMode::default()` is `Cancel`: pending changes are discarded.**
//! Prefer [`TransactionManager::commit`] and [`TransactionManager::cancel`],
//! which say what they do.
//!
//! # Example
//!
//! ```
//! use geoconnect::connector::mock::MockConnector;
//! use geoconnect::connector::TransactionManager;
//! use geoconnect::core::types::RefSpec;
//!
//! # tokio_test::block_on(async {
//! let connector = MockConnector::new();
//! let mut tx = TransactionManager::new(&connector);
//!
//! let handle = tx.begin().await.unwrap();
//! tx.pull(&handle, "origin", &RefSpec::same("master").unwrap()).await.unwrap();
//! tx.commit(handle).await.unwrap();
//!
//! assert!(!tx.is_open());
//! # });
//! ```

use super::envelope::{CommitRecord, Payload, SyncReport};
use super::errors::{Cause, ConnectorError, TransactionError};
use super::traits::{Connector, EndMode, LogOptions};
use crate::core::types::{RefSpec, TransactionId};

/// Proof that a transaction was opened by a [`TransactionManager`].
#[derive(Debug, PartialEq, Eq)]
pub struct TransactionHandle {
    id: TransactionId,
}

impl TransactionHandle {
    /// The server-issued id.
    pub fn id(&self) -> &TransactionId {
        &self.id
    }
}

/// State of a [`TransactionManager`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransactionState {
    /// No transaction is open
    #[default]
    Closed,
    /// A transaction is open on the server
    Open(TransactionId),
}

/// Scopes a sequence of mutating commands to one server transaction.
pub struct TransactionManager<'a, C: Connector + ?Sized> {
    connector: &'a C,
    state: TransactionState,
}

impl<'a, C: Connector + ?Sized> TransactionManager<'a, C> {
    /// Create a manager in the `Closed` state.
    pub fn new(connector: &'a C) -> Self {
        Self {
            connector,
            state: TransactionState::Closed,
        }
    }

    /// Current state.
    pub fn state(&self) -> &TransactionState {
        &self.state
    }

    /// Check if a transaction is open.
    pub fn is_open(&self) -> bool {
        matches!(self.state, TransactionState::Open(_))
    }

    /// The open transaction's id, if any.
    pub fn current(&self) -> Option<&TransactionId> {
        match &self.state {
            TransactionState::Open(id) => Some(id),
            TransactionState::Closed => None,
        }
    }

    /// Open a transaction.
    ///
    /// # Errors
    ///
    /// - `TransactionError::AlreadyOpen` if one is already open
    /// - `TransactionError::MissingId` if the server issued no id
    /// - `ConnectorError::Command` if `beginTransaction` fails; the manager
    ///   stays `Closed`
    pub async fn begin(&mut self) -> Result<TransactionHandle, ConnectorError> {
        if let TransactionState::Open(id) = &self.state {
            return Err(TransactionError::AlreadyOpen(id.clone()).into());
        }

        let receipt = self.connector.begin_transaction().await?;
        let id = receipt
            .transaction_id()
            .ok_or(TransactionError::MissingId)?;

        self.state = TransactionState::Open(id.clone());
        Ok(TransactionHandle { id })
    }

    /// Close the transaction, discarding or applying its changes.
    ///
    /// On success the manager is `Closed`. If the server rejects the id the
    /// transaction is dead either way and the manager closes too. Any other
    /// failure (network, timeout, cancellation) leaves it `Open`; use
    /// [`reclaim`](Self::reclaim) to get a handle and retry.
    ///
    /// # Errors
    ///
    /// - `TransactionError::NotOpen` if nothing is open
    /// - `TransactionError::Stale` if `handle` is not the open transaction
    pub async fn end(
        &mut self,
        handle: TransactionHandle,
        mode: EndMode,
    ) -> Result<Payload, ConnectorError> {
        self.check(&handle)?;

        match self.connector.end_transaction(&handle.id, mode).await {
            Ok(payload) => {
                self.state = TransactionState::Closed;
                Ok(payload)
            }
            Err(err) => {
                if matches!(err.cause(), Some(Cause::Rejected(_))) {
                    self.state = TransactionState::Closed;
                }
                Err(err)
            }
        }
    }

    /// End the transaction and apply its changes.
    pub async fn commit(&mut self, handle: TransactionHandle) -> Result<Payload, ConnectorError> {
        self.end(handle, EndMode::Commit).await
    }

    /// End the transaction and discard its changes.
    pub async fn cancel(&mut self, handle: TransactionHandle) -> Result<Payload, ConnectorError> {
        self.end(handle, EndMode::Cancel).await
    }

    /// A fresh handle for the still-open transaction.
    ///
    /// Used to retry `end` after a failure that left the manager `Open`.
    pub fn reclaim(&self) -> Option<TransactionHandle> {
        self.current().map(|id| TransactionHandle { id: id.clone() })
    }

    /// Push inside the transaction.
    pub async fn push(
        &self,
        handle: &TransactionHandle,
        remote: &str,
        spec: &RefSpec,
    ) -> Result<SyncReport, ConnectorError> {
        let id = self.check(handle)?;
        self.connector.push(remote, spec, Some(id)).await
    }

    /// Pull inside the transaction.
    pub async fn pull(
        &self,
        handle: &TransactionHandle,
        remote: &str,
        spec: &RefSpec,
    ) -> Result<SyncReport, ConnectorError> {
        let id = self.check(handle)?;
        self.connector.pull(remote, spec, Some(id)).await
    }

    /// Read the log as seen inside the transaction.
    pub async fn log(
        &self,
        handle: &TransactionHandle,
        options: LogOptions,
    ) -> Result<Vec<CommitRecord>, ConnectorError> {
        let id = self.check(handle)?.clone();
        self.connector
            .log(LogOptions {
                transaction_id: Some(id),
                ..options
            })
            .await
    }

    /// Verify `handle` names the open transaction.
    fn check(&self, handle: &TransactionHandle) -> Result<&TransactionId, TransactionError> {
        match &self.state {
            TransactionState::Open(id) if *id == handle.id => Ok(id),
            TransactionState::Open(_) => Err(TransactionError::Stale(handle.id.clone())),
            TransactionState::Closed => Err(TransactionError::NotOpen),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::mock::{FailOn, MockConnector, MockOperation};

    #[tokio::test]
    async fn begin_opens() {
        let connector = MockConnector::new();
        let mut tx = TransactionManager::new(&connector);
        assert_eq!(tx.state(), &TransactionState::Closed);

        let handle = tx.begin().await.unwrap();
        assert_eq!(tx.current(), Some(handle.id()));
        assert!(tx.is_open());
    }

    #[tokio::test]
    async fn double_begin_rejected() {
        let connector = MockConnector::new();
        let mut tx = TransactionManager::new(&connector);
        let handle = tx.begin().await.unwrap();

        let err = tx.begin().await.unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::Transaction(TransactionError::AlreadyOpen(ref id)) if id == handle.id()
        ));
        // Only one transaction reached the server
        assert_eq!(connector.open_transactions().len(), 1);
    }

    #[tokio::test]
    async fn failed_begin_stays_closed() {
        let connector = MockConnector::new()
            .fail_on(FailOn::BeginTransaction(Cause::Transport("refused".into())));
        let mut tx = TransactionManager::new(&connector);

        assert!(tx.begin().await.is_err());
        assert!(!tx.is_open());
    }

    #[tokio::test]
    async fn commit_closes_and_sends_cancel_false() {
        let connector = MockConnector::new();
        let mut tx = TransactionManager::new(&connector);
        let handle = tx.begin().await.unwrap();
        let id = handle.id().clone();

        tx.commit(handle).await.unwrap();
        assert!(!tx.is_open());
        assert!(connector.operations().contains(&MockOperation::EndTransaction {
            id,
            mode: EndMode::Commit
        }));
    }

    #[tokio::test]
    async fn end_default_mode_cancels() {
        let connector = MockConnector::new();
        let mut tx = TransactionManager::new(&connector);
        let handle = tx.begin().await.unwrap();
        let id = handle.id().clone();

        tx.end(handle, EndMode::default()).await.unwrap();
        assert!(connector.operations().contains(&MockOperation::EndTransaction {
            id,
            mode: EndMode::Cancel
        }));
    }

    #[tokio::test]
    async fn end_while_closed_rejected() {
        let connector = MockConnector::new();
        let mut first = TransactionManager::new(&connector);
        let handle = first.begin().await.unwrap();

        let mut other = TransactionManager::new(&connector);
        let err = other.cancel(handle).await.unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::Transaction(TransactionError::NotOpen)
        ));
    }

    #[tokio::test]
    async fn stale_handle_rejected_locally() {
        let connector = MockConnector::new();
        let mut tx = TransactionManager::new(&connector);
        let first = tx.begin().await.unwrap();
        let stale = TransactionHandle {
            id: first.id().clone(),
        };
        tx.cancel(first).await.unwrap();
        let _second = tx.begin().await.unwrap();

        let spec = RefSpec::same("master").unwrap();
        let err = tx.push(&stale, "origin", &spec).await.unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::Transaction(TransactionError::Stale(_))
        ));
        assert!(err.is_stale_transaction());
    }

    #[tokio::test]
    async fn scoped_commands_attach_transaction_id() {
        let connector = MockConnector::new();
        let mut tx = TransactionManager::new(&connector);
        let handle = tx.begin().await.unwrap();
        let spec = RefSpec::same("master").unwrap();

        tx.push(&handle, "origin", &spec).await.unwrap();
        tx.log(&handle, LogOptions::default()).await.unwrap();

        let ops = connector.operations();
        assert!(ops.iter().any(|op| matches!(
            op,
            MockOperation::Push { transaction: Some(id), .. } if id == handle.id()
        )));
        assert!(ops.iter().any(|op| matches!(
            op,
            MockOperation::Log { options } if options.transaction_id.as_ref() == Some(handle.id())
        )));
    }

    #[tokio::test]
    async fn transport_failure_on_end_keeps_open() {
        let connector = MockConnector::new();
        let mut tx = TransactionManager::new(&connector);
        let handle = tx.begin().await.unwrap();

        // Clones share state, so this configures `connector` too
        let failing = connector
            .clone()
            .fail_on(FailOn::EndTransaction(Cause::Timeout));
        assert!(tx.commit(handle).await.is_err());
        assert!(tx.is_open());

        failing.clear_fail_on();
        let retry = tx.reclaim().unwrap();
        tx.commit(retry).await.unwrap();
        assert!(!tx.is_open());
    }

    #[tokio::test]
    async fn server_rejection_on_end_closes() {
        let connector = MockConnector::new();
        let mut tx = TransactionManager::new(&connector);
        let handle = tx.begin().await.unwrap();

        let _failing = connector.clone().fail_on(FailOn::EndTransaction(Cause::Rejected(
            "Transaction not found".into(),
        )));
        let err = tx.cancel(handle).await.unwrap_err();
        assert!(err.is_stale_transaction());
        assert!(!tx.is_open());
        assert!(tx.reclaim().is_none());
    }

    #[tokio::test]
    async fn works_through_trait_object() {
        let connector = MockConnector::new();
        let dyn_connector: &dyn Connector = &connector;
        let mut tx = TransactionManager::new(dyn_connector);
        let handle = tx.begin().await.unwrap();
        tx.cancel(handle).await.unwrap();
    }
}
