//! connector::geoserver
//!
//! Connector for repositories served through the GeoServer GeoGit web API.
//!
//! # Design
//!
//! Every command follows the same path: build a [`CommandRequest`], send
//! it to `{repository}/{command}`, unwrap the JSON envelope, then parse the
//! payload into the command's result type. Failures anywhere along that
//! path are translated once, in `GeoServerConnector::dispatch`, into a
//! `CommandError` naming the command, the repository and the parameters.
//!
//! # Timeouts and cancellation
//!
//! Each request carries a timeout (30 seconds unless configured) and is
//! raced against the connector's `CancellationToken`. Use
//! [`GeoServerConnector::with_cancel_token`] to scope a group of calls to
//! a token the caller controls.
//!
//! # Example
//!
//! ```ignore
//! use geoconnect::connector::{Connector, GeoServerConnector, RepositoryHandle};
//!
//! let handle = RepositoryHandle::new("http://localhost:8080/geoserver/geogit/ws:roads")?;
//! let connector = GeoServerConnector::new(handle);
//!
//! let reference = connector.rev_parse("master").await?;
//! println!("master is at {:?}", reference.object_id());
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::envelope::{
    parse_commits, parse_reference, unwrap_envelope, CommitRecord, Payload, Reference,
    StatusReport, SyncKind, SyncReport, TransactionReceipt, TreeListing, VersionInfo,
};
use super::errors::{Cause, CommandError, ConnectorError};
use super::handle::RepositoryHandle;
use super::request::{CommandRequest, Method};
use super::traits::{Connector, EndMode, LogOptions};
use crate::core::types::{RefSpec, TransactionId};
use crate::logging::{default_logger, Logger};

/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body quoted in a `Cause::Status` message.
const MAX_ERROR_BODY: usize = 200;

/// GeoGit web API connector.
///
/// Cheap to clone: clones share the HTTP client and the repository handle.
#[derive(Clone)]
pub struct GeoServerConnector {
    /// HTTP client for making requests
    client: Client,
    /// Target repository, read-only
    handle: Arc<RepositoryHandle>,
    /// Injected diagnostics sink
    logger: Arc<dyn Logger>,
    /// Cancels in-flight requests when triggered
    cancel: CancellationToken,
    /// Per-request timeout
    timeout: Duration,
}

// Custom Debug to skip the client and logger
impl std::fmt::Debug for GeoServerConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoServerConnector")
            .field("handle", &self.handle)
            .field("timeout", &self.timeout)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Builder for [`GeoServerConnector`].
pub struct GeoServerConnectorBuilder {
    handle: Arc<RepositoryHandle>,
    client: Option<Client>,
    logger: Option<Arc<dyn Logger>>,
    cancel: Option<CancellationToken>,
    timeout: Duration,
}

impl GeoServerConnectorBuilder {
    /// Use an existing HTTP client (e.g. one with a proxy configured).
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Route diagnostics to `logger` instead of `tracing`.
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Tie every request to `token`.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Finish building.
    pub fn build(self) -> GeoServerConnector {
        GeoServerConnector {
            client: self.client.unwrap_or_default(),
            handle: self.handle,
            logger: self.logger.unwrap_or_else(default_logger),
            cancel: self.cancel.unwrap_or_default(),
            timeout: self.timeout,
        }
    }
}

impl GeoServerConnector {
    /// Create a connector with default settings.
    pub fn new(handle: impl Into<Arc<RepositoryHandle>>) -> Self {
        Self::builder(handle).build()
    }

    /// Start configuring a connector for `handle`.
    pub fn builder(handle: impl Into<Arc<RepositoryHandle>>) -> GeoServerConnectorBuilder {
        GeoServerConnectorBuilder {
            handle: handle.into(),
            client: None,
            logger: None,
            cancel: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// A clone of this connector bound to a different cancellation token.
    pub fn with_cancel_token(&self, token: CancellationToken) -> Self {
        Self {
            cancel: token,
            ..self.clone()
        }
    }

    /// The target repository.
    pub fn handle(&self) -> &RepositoryHandle {
        &self.handle
    }

    /// The token cancelling this connector's requests.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Create a repository on the server (administrative).
    ///
    /// Sends `name` as a raw text body to `target`. Success is any
    /// non-error HTTP status; the response body is ignored.
    ///
    /// # Errors
    ///
    /// Unlike dispatched commands, failures are the transport's own error
    /// (`ConnectorError::Transport`), including non-success statuses.
    /// Returns `ConnectorError::Cancelled` if the token fires first.
    pub async fn create_repo(&self, target: &str, name: &str) -> Result<(), ConnectorError> {
        let url = Url::parse(target)
            .map_err(|e| ConnectorError::InvalidHandle(format!("'{}': {}", target, e)))?;
        let request = CommandRequest::new("createRepo")
            .method(Method::Post)
            .raw_body(name);

        self.logger.debug(&request.describe(&url));

        let send = request
            .build(&self.client, url, self.handle.credentials())
            .timeout(self.timeout)
            .send();

        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ConnectorError::Cancelled),
            result = send => result?,
        };
        response.error_for_status()?;
        Ok(())
    }

    /// Run `fut` unless the cancellation token fires first.
    async fn cancellable<T>(
        &self,
        fut: impl Future<Output = Result<T, Cause>>,
    ) -> Result<T, Cause> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Cause::Cancelled),
            result = fut => result,
        }
    }

    /// Send a request and return the unwrapped, successful payload.
    async fn exchange(&self, request: &CommandRequest) -> Result<Payload, Cause> {
        let url = self.handle.command_url(request.command());
        self.logger.debug(&request.describe(&url));

        let builder = request
            .build(&self.client, url, self.handle.credentials())
            .timeout(self.timeout);

        self.cancellable(async move {
            let response = builder.send().await.map_err(|e| Cause::from_reqwest(&e))?;
            let body = Self::read_json(response).await?;
            let payload = unwrap_envelope(body);
            payload.ensure_success()?;
            Ok(payload)
        })
        .await
    }

    /// Decode a JSON body, turning error statuses into `Cause::Status`.
    ///
    /// An error status whose body carries a `success: false` envelope is a
    /// server rejection and becomes `Cause::Rejected` instead.
    async fn read_json(response: Response) -> Result<Value, Cause> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if let Some(message) = Self::rejection_message(&text) {
                return Err(Cause::Rejected(message));
            }
            let message = Self::error_message(&text)
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(Cause::Status {
                status: status.as_u16(),
                message,
            });
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                Cause::Timeout
            } else {
                Cause::Parse(format!("response body is not JSON: {}", e))
            }
        })
    }

    /// The server's error text if `body` is a `success: false` envelope.
    fn rejection_message(body: &str) -> Option<String> {
        let payload = unwrap_envelope(serde_json::from_str::<Value>(body).ok()?);
        if !payload.is_rejected() {
            return None;
        }
        Some(
            payload
                .error_message()
                .unwrap_or("server reported failure")
                .to_string(),
        )
    }

    /// Best-effort error text from an error response body.
    fn error_message(body: &str) -> Option<String> {
        if let Ok(value) = serde_json::from_str::<Value>(body) {
            let payload = unwrap_envelope(value);
            if let Some(message) = payload.error_message() {
                return Some(message.to_string());
            }
        }
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(trimmed.chars().take(MAX_ERROR_BODY).collect())
    }

    /// Execute `request`, parse the payload, and translate any failure.
    async fn dispatch<T>(
        &self,
        request: CommandRequest,
        summary: &'static str,
        parse: impl FnOnce(Payload) -> Result<T, Cause> + Send,
    ) -> Result<T, ConnectorError> {
        let result = match self.exchange(&request).await {
            Ok(payload) => parse(payload),
            Err(cause) => Err(cause),
        };
        result.map_err(|cause| self.command_error(&request, summary, cause))
    }

    fn command_error(
        &self,
        request: &CommandRequest,
        summary: &'static str,
        cause: Cause,
    ) -> ConnectorError {
        let err = CommandError::new(
            request.command(),
            self.handle.display_url(),
            request.final_params().into_pairs(),
            summary,
            cause,
        );
        self.logger.debug(&err.to_string());
        err.into()
    }

    async fn push_pull(
        &self,
        kind: SyncKind,
        remote: &str,
        spec: &RefSpec,
        transaction: Option<&TransactionId>,
    ) -> Result<SyncReport, ConnectorError> {
        let request = CommandRequest::new(kind.command())
            .param("remoteName", remote)
            .param("ref", spec);
        let request = match transaction {
            Some(id) => request.param("transactionId", id),
            None => request,
        };
        let summary = match kind {
            SyncKind::Push => "unable to push",
            SyncKind::Pull => "unable to pull",
        };

        if remote.trim().is_empty() {
            return Err(self.command_error(
                &request,
                summary,
                Cause::InvalidArgument("remote name cannot be empty".into()),
            ));
        }

        self.dispatch(request, summary, move |payload| {
            Ok(SyncReport::new(kind, payload))
        })
        .await
    }
}

#[async_trait]
impl Connector for GeoServerConnector {
    fn name(&self) -> &'static str {
        "geoserver"
    }

    async fn status(&self) -> Result<StatusReport, ConnectorError> {
        self.dispatch(
            CommandRequest::new("status"),
            "unable to get status",
            |payload| Ok(StatusReport::from(payload)),
        )
        .await
    }

    async fn check_is_repo(&self) -> bool {
        match self.status().await {
            Ok(report) => report.success(),
            Err(err) => {
                self.logger
                    .warn(&format!("treating endpoint as not a repository: {}", err));
                false
            }
        }
    }

    async fn rev_parse(&self, name: &str) -> Result<Reference, ConnectorError> {
        const SUMMARY: &str = "reference not found";
        let request = CommandRequest::new("refparse").param("name", name);

        if name.trim().is_empty() {
            return Err(self.command_error(
                &request,
                SUMMARY,
                Cause::InvalidArgument("reference name cannot be empty".into()),
            ));
        }

        let result = match self.exchange(&request).await {
            Ok(payload) => parse_reference(payload),
            // An unknown reference surfaces as a 4xx or a rejection.
            Err(cause) if cause.is_client_status() => Err(Cause::NotFound(format!(
                "{} ({})",
                name, cause
            ))),
            Err(Cause::Rejected(message)) => {
                Err(Cause::NotFound(format!("{} ({})", name, message)))
            }
            Err(cause) => Err(cause),
        };
        result.map_err(|cause| self.command_error(&request, SUMMARY, cause))
    }

    async fn log(&self, options: LogOptions) -> Result<Vec<CommitRecord>, ConnectorError> {
        let request = CommandRequest::new("log").params(options.to_params());
        self.dispatch(request, "unable to retrieve log", |payload| {
            parse_commits(&payload)
        })
        .await
    }

    async fn version(&self) -> Result<VersionInfo, ConnectorError> {
        self.dispatch(
            CommandRequest::new("version"),
            "unable to retrieve version",
            |payload| Ok(VersionInfo::from(payload)),
        )
        .await
    }

    async fn begin_transaction(&self) -> Result<TransactionReceipt, ConnectorError> {
        self.dispatch(
            CommandRequest::new("beginTransaction"),
            "unable to begin transaction",
            |payload| Ok(TransactionReceipt::from(payload)),
        )
        .await
    }

    async fn end_transaction(
        &self,
        id: &TransactionId,
        mode: EndMode,
    ) -> Result<Payload, ConnectorError> {
        let request = CommandRequest::new("endTransaction")
            .param("transactionId", id)
            .param("cancel", mode.cancel_flag());
        self.dispatch(request, "unable to end transaction", Ok).await
    }

    async fn push(
        &self,
        remote: &str,
        spec: &RefSpec,
        transaction: Option<&TransactionId>,
    ) -> Result<SyncReport, ConnectorError> {
        self.push_pull(SyncKind::Push, remote, spec, transaction)
            .await
    }

    async fn pull(
        &self,
        remote: &str,
        spec: &RefSpec,
        transaction: Option<&TransactionId>,
    ) -> Result<SyncReport, ConnectorError> {
        self.push_pull(SyncKind::Pull, remote, spec, transaction)
            .await
    }

    async fn ls_tree(&self) -> Result<TreeListing, ConnectorError> {
        self.dispatch(
            CommandRequest::new("ls-tree"),
            "unable to list tree",
            TreeListing::from_payload,
        )
        .await
    }

    async fn blame(&self, commit: &str, path: &str) -> Result<Payload, ConnectorError> {
        let request = CommandRequest::new("blame")
            .param("commit", commit)
            .param("path", path);
        self.dispatch(request, "unable to blame", Ok).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::handle::Credentials;

    fn connector() -> GeoServerConnector {
        let handle = RepositoryHandle::new("http://localhost:1/geogit/ws:repo").unwrap();
        GeoServerConnector::new(handle)
    }

    #[test]
    fn default_timeout() {
        assert_eq!(connector().timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn builder_overrides_timeout() {
        let handle = RepositoryHandle::new("http://localhost/repo").unwrap();
        let connector = GeoServerConnector::builder(handle)
            .timeout(Duration::from_millis(250))
            .build();
        assert_eq!(connector.timeout(), Duration::from_millis(250));
    }

    #[test]
    fn with_cancel_token_shares_handle() {
        let base = connector();
        let token = CancellationToken::new();
        let scoped = base.with_cancel_token(token.clone());
        token.cancel();
        assert!(scoped.cancel_token().is_cancelled());
        assert!(!base.cancel_token().is_cancelled());
        assert!(Arc::ptr_eq(&base.handle, &scoped.handle));
    }

    #[test]
    fn debug_hides_password() {
        let handle = RepositoryHandle::new("http://localhost/repo")
            .unwrap()
            .with_credentials(Credentials::new("admin", Some("hunter2".into())));
        let debug = format!("{:?}", GeoServerConnector::new(handle));
        assert!(debug.contains("GeoServerConnector"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn error_message_prefers_envelope_error() {
        let body = r#"{"response": {"success": false, "error": "No such ref"}}"#;
        assert_eq!(
            GeoServerConnector::error_message(body),
            Some("No such ref".to_string())
        );
    }

    #[test]
    fn rejection_message_only_for_unsuccessful_envelope() {
        let rejected = r#"{"response": {"success": false, "error": "No transaction"}}"#;
        assert_eq!(
            GeoServerConnector::rejection_message(rejected),
            Some("No transaction".to_string())
        );
        assert_eq!(
            GeoServerConnector::rejection_message(r#"{"response": {"success": false}}"#),
            Some("server reported failure".to_string())
        );
        assert_eq!(
            GeoServerConnector::rejection_message(r#"{"response": {"error": "boom"}}"#),
            None
        );
        assert_eq!(GeoServerConnector::rejection_message("Internal failure"), None);
    }

    #[test]
    fn error_message_falls_back_to_text() {
        assert_eq!(
            GeoServerConnector::error_message("  Internal failure \n"),
            Some("Internal failure".to_string())
        );
        assert_eq!(GeoServerConnector::error_message("   "), None);
    }

    #[test]
    fn error_message_is_truncated() {
        let long = "x".repeat(1000);
        assert_eq!(
            GeoServerConnector::error_message(&long).unwrap().len(),
            MAX_ERROR_BODY
        );
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let connector = connector().with_cancel_token(token);

        let err = connector.version().await.unwrap_err();
        assert_eq!(err.cause(), Some(&Cause::Cancelled));
        assert!(!connector.check_is_repo().await);
    }

    #[tokio::test]
    async fn empty_reference_rejected_before_sending() {
        let err = connector().rev_parse("  ").await.unwrap_err();
        assert!(matches!(err.cause(), Some(Cause::InvalidArgument(_))));
        assert_eq!(err.as_command().unwrap().summary, "reference not found");
    }

    #[tokio::test]
    async fn empty_remote_rejected_before_sending() {
        let spec = RefSpec::same("master").unwrap();
        let err = connector().push("", &spec, None).await.unwrap_err();
        assert!(matches!(err.cause(), Some(Cause::InvalidArgument(_))));
        assert_eq!(err.as_command().unwrap().command, "push");
    }
}
