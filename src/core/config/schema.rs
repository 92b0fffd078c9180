//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Validation
//!
//! Config values are validated after parsing: repository URLs must be
//! usable as a `RepositoryHandle`, the timeout must be non-zero, and a
//! password is only accepted together with a username.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::connector::RepositoryHandle;

/// Top-level configuration file.
///
/// # Example
///
/// ```toml
/// [connector]
/// timeout_secs = 30
/// default_repository = "roads"
///
/// [repositories.roads]
/// url = "http://localhost:8080/geoserver/geogit/topp:roads"
/// username = "admin"
/// password = "geoserver"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Connector settings
    pub connector: Option<ConnectorSettings>,

    /// Named repository endpoints
    pub repositories: BTreeMap<String, RepositoryConfig>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(connector) = &self.connector {
            connector.validate()?;

            if let Some(name) = &connector.default_repository {
                if !self.repositories.contains_key(name) {
                    return Err(ConfigError::InvalidValue(format!(
                        "default_repository '{}' is not defined under [repositories]",
                        name
                    )));
                }
            }
        }

        for (name, repo) in &self.repositories {
            repo.validate()
                .map_err(|e| ConfigError::InvalidValue(format!("repositories.{}: {}", name, e)))?;
        }

        Ok(())
    }
}

/// Connector settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectorSettings {
    /// Per-request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Repository used when none is named
    pub default_repository: Option<String>,
}

impl ConnectorSettings {
    /// Validate connector settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue(
                "timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// One repository endpoint.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Base URL of the repository's web API
    pub url: String,

    /// Basic auth username
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Basic auth password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl std::fmt::Debug for RepositoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl RepositoryConfig {
    /// Validate the repository entry.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the URL is not a usable
    /// http(s) base URL or a password is given without a username.
    pub fn validate(&self) -> Result<(), ConfigError> {
        RepositoryHandle::new(&self.url)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        if self.password.is_some() && self.username.is_none() {
            return Err(ConfigError::InvalidValue(
                "password requires a username".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(url: &str) -> RepositoryConfig {
        RepositoryConfig {
            url: url.into(),
            username: None,
            password: None,
        }
    }

    #[test]
    fn empty_config_is_valid() {
        let config: GlobalConfig = toml::from_str("").unwrap();
        assert_eq!(config, GlobalConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_config() {
        let config: GlobalConfig = toml::from_str(
            r#"
            [connector]
            timeout_secs = 10
            default_repository = "roads"

            [repositories.roads]
            url = "http://localhost:8080/geoserver/geogit/topp:roads"
            username = "admin"
            password = "geoserver"
            "#,
        )
        .unwrap();

        let connector = config.connector.as_ref().unwrap();
        assert_eq!(connector.timeout_secs, Some(10));
        assert_eq!(connector.default_repository.as_deref(), Some("roads"));

        let roads = &config.repositories["roads"];
        assert_eq!(roads.username.as_deref(), Some("admin"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_fields_rejected() {
        let result: Result<GlobalConfig, _> = toml::from_str("retries = 3");
        assert!(result.is_err());

        let result: Result<GlobalConfig, _> = toml::from_str(
            r#"
            [repositories.roads]
            url = "http://localhost/geogit"
            token = "abc"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn repository_requires_url() {
        let result: Result<GlobalConfig, _> = toml::from_str(
            r#"
            [repositories.roads]
            username = "admin"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = GlobalConfig {
            connector: Some(ConnectorSettings {
                timeout_secs: Some(0),
                default_repository: None,
            }),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn unknown_default_repository_rejected() {
        let config = GlobalConfig {
            connector: Some(ConnectorSettings {
                timeout_secs: None,
                default_repository: Some("missing".into()),
            }),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn invalid_url_rejected() {
        assert!(repo("not a url").validate().is_err());
        assert!(repo("ftp://example.com/repo").validate().is_err());
        assert!(repo("https://example.com/geogit/ws:roads").validate().is_ok());
    }

    #[test]
    fn password_without_username_rejected() {
        let mut entry = repo("http://localhost/geogit");
        entry.password = Some("secret".into());
        assert!(entry.validate().is_err());

        entry.username = Some("admin".into());
        assert!(entry.validate().is_ok());
    }

    #[test]
    fn debug_redacts_password() {
        let mut entry = repo("http://localhost/geogit");
        entry.username = Some("admin".into());
        entry.password = Some("hunter2".into());

        let debug = format!("{:?}", entry);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn invalid_entry_error_names_repository() {
        let mut config = GlobalConfig::default();
        config.repositories.insert("roads".into(), repo("nope"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("repositories.roads"));
    }
}
