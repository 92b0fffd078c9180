//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! The configuration file names repository endpoints (URL and credentials)
//! and connector settings such as the request timeout. A missing file is
//! not an error; defaults apply.
//!
//! # Locations
//!
//! Searched in order:
//! 1. `$GEOCONNECT_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/geoconnect/config.toml`
//! 3. `~/.geoconnect/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use geoconnect::core::config::Config;
//!
//! let config = Config::load().unwrap();
//!
//! // Connector for the default repository, with the configured timeout
//! let connector = config.connector(None).unwrap().build();
//! println!("Talking to {}", connector.handle().display_url());
//! ```

pub mod schema;

pub use schema::{ConnectorSettings, GlobalConfig, RepositoryConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::connector::{
    Credentials, GeoServerConnector, GeoServerConnectorBuilder, RepositoryHandle, DEFAULT_TIMEOUT,
};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "GEOCONNECT_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("unknown repository '{0}'")]
    UnknownRepository(String),

    #[error("no repository named and no default_repository configured")]
    NoDefaultRepository,

    #[error("home directory not found")]
    NoHomeDir,
}

/// Loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed configuration file
    pub global: GlobalConfig,
    /// Path the configuration was loaded from (if any)
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or
    /// fails validation. Missing config files are not an error.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::locate() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load and validate configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let global = Self::read_config(path)?;
        global.validate()?;
        Ok(Config {
            global,
            path: Some(path.to_path_buf()),
        })
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let global: GlobalConfig =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError {
                path: PathBuf::from("<string>"),
                message: e.to_string(),
            })?;
        global.validate()?;
        Ok(Config { global, path: None })
    }

    /// Find the first existing config file in search order.
    fn locate() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("geoconnect/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        if let Some(home) = dirs::home_dir() {
            let path = home.join(".geoconnect/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Read and parse a config file.
    fn read_config(path: &Path) -> Result<GlobalConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Path the configuration was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get the canonical path for the config file.
    ///
    /// Returns `~/.geoconnect/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".geoconnect/config.toml"))
    }

    /// Write config to the canonical location atomically.
    pub fn write_global(config: &GlobalConfig) -> Result<PathBuf, ConfigError> {
        let path = Self::global_config_path()?;
        Self::write_to(&path, config)?;
        Ok(path)
    }

    /// Validate and write config to `path` atomically.
    ///
    /// Creates parent directories if needed. Writes to a temp file in the
    /// same directory, then renames it over the target.
    pub fn write_to(path: &Path, config: &GlobalConfig) -> Result<(), ConfigError> {
        config.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        file.sync_all().map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Per-request timeout.
    ///
    /// Defaults to [`DEFAULT_TIMEOUT`] if not configured.
    pub fn timeout(&self) -> Duration {
        self.global
            .connector
            .as_ref()
            .and_then(|c| c.timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Name of the default repository, if configured.
    pub fn default_repository(&self) -> Option<&str> {
        self.global
            .connector
            .as_ref()
            .and_then(|c| c.default_repository.as_deref())
    }

    /// Names of all configured repositories, sorted.
    pub fn repository_names(&self) -> impl Iterator<Item = &str> {
        self.global.repositories.keys().map(String::as_str)
    }

    /// Look up a repository entry, falling back to the default repository
    /// when `name` is `None`.
    pub fn repository(&self, name: Option<&str>) -> Result<&RepositoryConfig, ConfigError> {
        let name = match name {
            Some(name) => name,
            None => self
                .default_repository()
                .ok_or(ConfigError::NoDefaultRepository)?,
        };

        self.global
            .repositories
            .get(name)
            .ok_or_else(|| ConfigError::UnknownRepository(name.to_string()))
    }

    /// Build a [`RepositoryHandle`] for a configured repository.
    ///
    /// # Errors
    ///
    /// - `UnknownRepository` if `name` is not configured
    /// - `NoDefaultRepository` if `name` is `None` and no default is set
    /// - `InvalidValue` if the stored URL is unusable
    pub fn handle(&self, name: Option<&str>) -> Result<RepositoryHandle, ConfigError> {
        let entry = self.repository(name)?;
        let handle = RepositoryHandle::new(&entry.url)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        Ok(match &entry.username {
            Some(username) => handle.with_credentials(Credentials::new(
                username.clone(),
                entry.password.clone(),
            )),
            None => handle,
        })
    }

    /// Connector builder for a configured repository, with the configured
    /// timeout applied.
    pub fn connector(&self, name: Option<&str>) -> Result<GeoServerConnectorBuilder, ConfigError> {
        let handle = self.handle(name)?;
        Ok(GeoServerConnector::builder(handle).timeout(self.timeout()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
        [connector]
        timeout_secs = 5
        default_repository = "roads"

        [repositories.roads]
        url = "http://localhost:8080/geoserver/geogit/topp:roads"
        username = "admin"
        password = "geoserver"

        [repositories.rivers]
        url = "https://example.com/geogit/topp:rivers"
    "#;

    #[test]
    fn defaults_without_file() {
        let config = Config::default();
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
        assert!(config.default_repository().is_none());
        assert!(config.path().is_none());
        assert_eq!(config.repository_names().count(), 0);
    }

    #[test]
    fn load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, SAMPLE).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.path(), Some(path.as_path()));
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert_eq!(config.default_repository(), Some("roads"));
        assert_eq!(
            config.repository_names().collect::<Vec<_>>(),
            vec!["rivers", "roads"]
        );
    }

    #[test]
    fn load_from_missing_file_is_read_error() {
        let temp = TempDir::new().unwrap();
        let result = Config::load_from(&temp.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn load_from_malformed_file_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[connector\ntimeout_secs = ").unwrap();

        let result = Config::load_from(&path);
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn load_from_rejects_invalid_values() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[connector]\ntimeout_secs = 0\n").unwrap();

        let result = Config::load_from(&path);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn handle_with_credentials() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let handle = config.handle(Some("roads")).unwrap();

        assert_eq!(
            handle.url().as_str(),
            "http://localhost:8080/geoserver/geogit/topp:roads"
        );
        assert_eq!(handle.credentials().username(), Some("admin"));
        assert_eq!(handle.credentials().password(), Some("geoserver"));
    }

    #[test]
    fn handle_without_credentials_is_anonymous() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let handle = config.handle(Some("rivers")).unwrap();
        assert!(handle.credentials().is_anonymous());
    }

    #[test]
    fn handle_falls_back_to_default() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let handle = config.handle(None).unwrap();
        assert_eq!(handle.credentials().username(), Some("admin"));
    }

    #[test]
    fn handle_unknown_repository() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let result = config.handle(Some("lakes"));
        assert!(matches!(result, Err(ConfigError::UnknownRepository(name)) if name == "lakes"));
    }

    #[test]
    fn handle_without_default() {
        let config = Config::from_toml(
            r#"
            [repositories.roads]
            url = "http://localhost/geogit"
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.handle(None),
            Err(ConfigError::NoDefaultRepository)
        ));
    }

    #[test]
    fn connector_uses_configured_timeout() {
        let config = Config::from_toml(SAMPLE).unwrap();
        let connector = config.connector(Some("rivers")).unwrap().build();
        assert_eq!(connector.timeout(), Duration::from_secs(5));
        assert_eq!(
            connector.handle().url().as_str(),
            "https://example.com/geogit/topp:rivers"
        );
    }

    #[test]
    fn write_atomic_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/config.toml");

        let original = Config::from_toml(SAMPLE).unwrap();
        Config::write_to(&path, &original.global).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("toml.tmp").exists());

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.global, original.global);
    }

    #[test]
    fn write_rejects_invalid_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");

        let mut global = GlobalConfig::default();
        global.connector = Some(ConnectorSettings {
            timeout_secs: Some(0),
            default_repository: None,
        });

        assert!(Config::write_to(&path, &global).is_err());
        assert!(!path.exists());
    }
}
