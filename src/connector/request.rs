//! connector::request
//!
//! Construction of outbound requests for named remote commands.
//!
//! # Parameter merging
//!
//! [`CommandParams`] keeps query parameters in insertion order. Caller
//! values are set explicitly with [`CommandParams::set`]; connector defaults
//! go through [`CommandParams::set_default`], which only inserts a key that
//! is not already present. Every finished request carries
//! `output_format=json`; no other representation is ever requested.
//!
//! # Example
//!
//! ```
//! use geoconnect::connector::{CommandParams, CommandRequest};
//!
//! let request = CommandRequest::new("log")
//!     .params(CommandParams::new().with("limit", "10"));
//!
//! let params = request.final_params();
//! assert_eq!(params.get("limit"), Some("10"));
//! assert_eq!(params.get("output_format"), Some("json"));
//! ```

use reqwest::header::{HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, RequestBuilder, Url};

use super::handle::Credentials;

/// Query parameter selecting the response representation.
pub const OUTPUT_FORMAT_KEY: &str = "output_format";

/// The only representation the connector understands.
pub const OUTPUT_FORMAT_JSON: &str = "json";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = concat!("geoconnect/", env!("CARGO_PKG_VERSION"));

/// Ordered query parameters for a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandParams {
    pairs: Vec<(String, String)>,
}

impl CommandParams {
    /// Create an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter explicitly, replacing any existing value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    /// Set a parameter only if the key is absent.
    ///
    /// Returns `true` if the default was inserted.
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if self.contains(&key) {
            return false;
        }
        self.pairs.push((key, value.into()));
        true
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value.to_string());
        self
    }

    /// Builder form of [`set`](Self::set) that skips `None`.
    pub fn with_opt<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    /// Look up a parameter value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Check if a parameter is present.
    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Check if there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Parameters in insertion order.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Consume into the ordered pairs.
    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.pairs
    }
}

impl std::fmt::Display for CommandParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> = self
            .pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(f, "{{{}}}", rendered.join(", "))
    }
}

/// HTTP method used for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// Read-only commands
    #[default]
    Get,
    /// Commands that create resources
    Post,
}

impl Method {
    fn as_reqwest(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
        }
    }
}

/// A fully specified request for one remote command.
///
/// Transient: built per call and dropped after the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    command: String,
    method: Method,
    params: CommandParams,
    body: Option<String>,
}

impl CommandRequest {
    /// Start a `GET` request for `command`.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            method: Method::default(),
            params: CommandParams::new(),
            body: None,
        }
    }

    /// Override the HTTP method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Set one caller parameter explicitly.
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.set(key, value.to_string());
        self
    }

    /// Merge caller parameters; each one is an explicit set.
    pub fn params(mut self, params: CommandParams) -> Self {
        for (key, value) in params.into_pairs() {
            self.params.set(key, value);
        }
        self
    }

    /// Send a raw text body instead of an empty one.
    pub fn raw_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// The remote command name.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The HTTP method.
    pub fn http_method(&self) -> Method {
        self.method
    }

    /// The raw body, if any.
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Caller parameters merged with connector defaults.
    pub fn final_params(&self) -> CommandParams {
        let mut params = self.params.clone();
        params.set_default(OUTPUT_FORMAT_KEY, OUTPUT_FORMAT_JSON);
        params
    }

    /// Build the `reqwest` request against `url`.
    ///
    /// Basic auth is attached when a username is configured; otherwise the
    /// request is anonymous.
    pub fn build(&self, client: &Client, url: Url, credentials: &Credentials) -> RequestBuilder {
        let params = self.final_params();
        let mut builder = client
            .request(self.method.as_reqwest(), url)
            .header(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE))
            .query(params.pairs());

        if let Some(username) = credentials.username() {
            builder = builder.basic_auth(username, credentials.password());
        }

        if let Some(body) = &self.body {
            builder = builder
                .header(CONTENT_TYPE, HeaderValue::from_static("text/plain"))
                .body(body.clone());
        }

        builder
    }

    /// One-line description used for debug logging.
    pub fn describe(&self, url: &Url) -> String {
        format!(
            "Making a {} request to {}, with the following parameters: {}",
            self.method,
            url,
            self.final_params()
        )
    }
}
