//! Connection and retry configuration for the oVirt client.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment variables read by [`ClientConfig::load`].
pub const ENV_PREFIX: &str = "OVIRT";

/// Connection settings for an oVirt engine.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Engine API URL, e.g. `https://engine.example.com/ovirt-engine/api`
    pub url: String,
    /// User name including the profile, e.g. `admin@internal`
    pub username: String,
    /// Password
    #[serde(default)]
    pub password: String,
    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: bool,
    /// PEM bundle with additional CA certificates
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Default retry budgets
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_request_timeout() -> u64 {
    60
}

/// Default retry budgets and back-off, applied when a call supplies none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Budget for read calls in seconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Budget for mutating calls in seconds
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,
    /// Budget for status polls in seconds
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,
    /// First back-off delay in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    /// Multiplier applied to the delay after each wait
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u32,
    /// Upper bound on a single delay in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_read_timeout() -> u64 {
    300
}

fn default_write_timeout() -> u64 {
    300
}

fn default_wait_timeout() -> u64 {
    900
}

fn default_initial_backoff() -> u64 {
    1_000
}

fn default_backoff_factor() -> u32 {
    2
}

fn default_max_backoff() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            read_timeout_secs: default_read_timeout(),
            write_timeout_secs: default_write_timeout(),
            wait_timeout_secs: default_wait_timeout(),
            initial_backoff_ms: default_initial_backoff(),
            backoff_factor: default_backoff_factor(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl RetryConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Validate the retry settings.
    pub fn validate(&self) -> Result<()> {
        if self.read_timeout_secs == 0
            || self.write_timeout_secs == 0
            || self.wait_timeout_secs == 0
        {
            return Err(Error::Config("retry timeouts must be positive".into()));
        }
        if self.backoff_factor == 0 {
            return Err(Error::Config("backoff_factor must be at least 1".into()));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(Error::Config(
                "max_backoff_ms must not be smaller than initial_backoff_ms".into(),
            ));
        }
        Ok(())
    }
}

impl ClientConfig {
    /// Create a configuration with default timeouts.
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
            insecure: false,
            ca_file: None,
            request_timeout_secs: default_request_timeout(),
            retry: RetryConfig::default(),
        }
    }

    /// Load configuration from an optional TOML file, overridden by
    /// `OVIRT_*` environment variables (`OVIRT_RETRY__WAIT_TIMEOUT_SECS`
    /// for nested keys).
    ///
    /// Environment values stay strings until deserialization, so a password
    /// such as `007` is kept as written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read, a value has the
    /// wrong type, or the result fails [`ClientConfig::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let config: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .source(env),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.url.starts_with("https://") || self.url.starts_with("http://")) {
            return Err(Error::Config(format!(
                "url must start with http:// or https://, got {:?}",
                self.url
            )));
        }
        if self.username.is_empty() {
            return Err(Error::Config("username must not be empty".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be positive".into()));
        }
        self.retry.validate()
    }

    /// Get the per-request timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("insecure", &self.insecure)
            .field("ca_file", &self.ca_file)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_default_retry_config() {
        let retry = RetryConfig::default();
        assert_eq!(retry.read_timeout(), Duration::from_secs(300));
        assert_eq!(retry.write_timeout(), Duration::from_secs(300));
        assert_eq!(retry.wait_timeout(), Duration::from_secs(900));
        assert_eq!(retry.initial_backoff(), Duration::from_secs(1));
        assert_eq!(retry.max_backoff(), Duration::from_secs(30));
        assert_eq!(retry.backoff_factor, 2);
    }

    #[test]
    fn test_new_is_valid() {
        let config =
            ClientConfig::new("https://engine/ovirt-engine/api", "admin@internal", "secret");
        assert!(config.validate().is_ok());
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = ClientConfig::new("engine", "admin@internal", "secret");
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::Config);

        let config = ClientConfig::new("https://engine", "", "secret");
        assert!(config.validate().is_err());

        let mut config = ClientConfig::new("https://engine", "admin@internal", "secret");
        config.retry.backoff_factor = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = ClientConfig::new("https://engine", "admin@internal", "hunter2");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_load_from_file() {
        let path =
            std::env::temp_dir().join(format!("ovirt-config-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"
url = "https://engine.example.com/ovirt-engine/api"
username = "admin@internal"
password = "secret"
insecure = true

[retry]
wait_timeout_secs = 60
"#,
        )
        .unwrap();

        let config = ClientConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.url, "https://engine.example.com/ovirt-engine/api");
        assert!(config.insecure);
        assert_eq!(config.retry.wait_timeout(), Duration::from_secs(60));
        assert_eq!(config.retry.read_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_load_from_env_keeps_strings() {
        let env: config::Map<String, String> = [
            ("OVIRT_URL", "https://engine.example.com/ovirt-engine/api"),
            ("OVIRT_USERNAME", "1234"),
            ("OVIRT_PASSWORD", "007"),
            ("OVIRT_INSECURE", "true"),
            ("OVIRT_REQUEST_TIMEOUT_SECS", "15"),
            ("OVIRT_RETRY__WAIT_TIMEOUT_SECS", "60"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = ClientConfig::load_with_env(None, Some(env)).unwrap();

        assert_eq!(config.username, "1234");
        assert_eq!(config.password, "007");
        assert!(config.insecure);
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.retry.wait_timeout(), Duration::from_secs(60));
    }
}
