//! connector::handle
//!
//! Caller-owned identification of a remote repository.
//!
//! A [`RepositoryHandle`] is immutable once built. Connectors hold it behind
//! an `Arc` and only ever read it, so one handle can back many connectors.

use reqwest::Url;

use super::errors::ConnectorError;

/// Basic-auth credentials for a repository.
///
/// Both fields empty is valid and means anonymous access.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    username: Option<String>,
    password: Option<String>,
}

// Custom Debug to avoid exposing the password
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("has_password", &self.password.is_some())
            .finish()
    }
}

impl Credentials {
    /// Credentials with a username and optional password.
    pub fn new(username: impl Into<String>, password: Option<String>) -> Self {
        Self {
            username: Some(username.into()),
            password,
        }
    }

    /// No credentials; requests are sent anonymously.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Check if no username is configured.
    pub fn is_anonymous(&self) -> bool {
        self.username.is_none()
    }

    /// The username, if any.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// The password, if any.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

/// Base URL and credentials of a remote repository endpoint.
///
/// # Example
///
/// ```
/// use geoconnect::connector::{Credentials, RepositoryHandle};
///
/// let handle = RepositoryHandle::new("http://localhost:8080/geoserver/geogit/ws:roads")
///     .unwrap()
///     .with_credentials(Credentials::new("admin", Some("s3cret".into())));
///
/// assert_eq!(
///     handle.command_url("status").as_str(),
///     "http://localhost:8080/geoserver/geogit/ws:roads/status"
/// );
/// assert!(!format!("{:?}", handle).contains("s3cret"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryHandle {
    url: Url,
    credentials: Credentials,
}

impl RepositoryHandle {
    /// Create an anonymous handle for the repository at `url`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::InvalidHandle` if the URL does not parse or
    /// is not an `http`/`https` base URL.
    pub fn new(url: &str) -> Result<Self, ConnectorError> {
        let url = Url::parse(url)
            .map_err(|e| ConnectorError::InvalidHandle(format!("'{}': {}", url, e)))?;
        Self::from_url(url)
    }

    /// Create an anonymous handle from an already parsed URL.
    pub fn from_url(url: Url) -> Result<Self, ConnectorError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConnectorError::InvalidHandle(format!(
                "unsupported scheme '{}' in {}",
                url.scheme(),
                url
            )));
        }
        if url.cannot_be_a_base() {
            return Err(ConnectorError::InvalidHandle(format!(
                "{} cannot be used as a base URL",
                url
            )));
        }
        Ok(Self {
            url,
            credentials: Credentials::anonymous(),
        })
    }

    /// Attach credentials to the handle.
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// The repository base URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The configured credentials.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// URL of a named remote command: `{base}/{command}`.
    ///
    /// A trailing slash on the base URL is tolerated.
    pub fn command_url(&self, command: &str) -> Url {
        let mut url = self.url.clone();
        // `from_url` rejects cannot-be-a-base URLs, so segments are available.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(command);
        }
        url
    }

    /// The base URL as a display string without a trailing slash.
    pub fn display_url(&self) -> String {
        self.url.as_str().trim_end_matches('/').to_string()
    }
}
