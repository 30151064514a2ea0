//! Client configuration.
//!
//! A [`ClientConfig`] holds the service root, the credentials and the
//! request timeout. Each client captures its own copy, so clients pointed at
//! different services can live side by side.
//!
//! ```rust
//! use std::time::Duration;
//! use sqldata_query::config::ClientConfig;
//!
//! let config = ClientConfig::builder()
//!     .base_url("https://api.example.com/")
//!     .credentials("reader", "secret")
//!     .timeout(Duration::from_secs(30))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.base(), "https://api.example.com");
//! assert!(!format!("{:?}", config).contains("secret"));
//! ```

use std::fmt;
use std::time::Duration;
use tracing::info;

use crate::env::{EnvSource, StdEnvSource};
use crate::error::{QueryError, QueryResult};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable names read by [`ClientConfig::from_env`].
pub mod vars {
    /// Service root URL.
    pub const BASE_URL: &str = "SQLDATA_BASE_URL";
    /// Login user name.
    pub const USERNAME: &str = "SQLDATA_USERNAME";
    /// Login password.
    pub const PASSWORD: &str = "SQLDATA_PASSWORD";
    /// Pre-shared access token.
    pub const ACCESS_TOKEN: &str = "SQLDATA_ACCESS_TOKEN";
    /// Request timeout in milliseconds.
    pub const TIMEOUT_MS: &str = "SQLDATA_TIMEOUT_MS";
}

/// Connection settings for the data service.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Service root, e.g. `https://api.example.com`.
    pub base_url: String,
    /// User name exchanged for a bearer token.
    pub username: Option<String>,
    /// Password exchanged for a bearer token.
    pub password: Option<String>,
    /// Token appended to every URL as `$accessToken`.
    pub access_token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: None,
            password: None,
            access_token: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ClientConfig {
    /// Create a configuration for `base_url` with no credentials.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Start a builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Load from the process environment.
    pub fn from_env() -> QueryResult<Self> {
        Self::from_env_source(&StdEnvSource)
    }

    /// Load from an arbitrary environment source.
    pub fn from_env_source<S: EnvSource>(source: &S) -> QueryResult<Self> {
        let mut builder = Self::builder();

        if let Some(base_url) = source.get(vars::BASE_URL) {
            builder = builder.base_url(base_url);
        }
        if let (Some(username), Some(password)) =
            (source.get(vars::USERNAME), source.get(vars::PASSWORD))
        {
            builder = builder.credentials(username, password);
        }
        if let Some(token) = source.get(vars::ACCESS_TOKEN) {
            builder = builder.access_token(token);
        }
        if let Some(raw) = source.get(vars::TIMEOUT_MS) {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                QueryError::invalid_configuration(format!(
                    "{} is not a number of milliseconds: {}",
                    vars::TIMEOUT_MS,
                    raw
                ))
            })?;
            builder = builder.timeout(Duration::from_millis(millis));
        }

        let config = builder.build()?;
        info!(
            base_url = %config.base_url,
            has_credentials = config.has_credentials(),
            has_access_token = config.access_token.is_some(),
            "ClientConfig loaded from environment"
        );
        Ok(config)
    }

    /// Service root without trailing slashes.
    pub fn base(&self) -> &str {
        self.base_url.trim().trim_end_matches('/')
    }

    /// Check whether a username and password are both set.
    pub fn has_credentials(&self) -> bool {
        matches!(
            (&self.username, &self.password),
            (Some(u), Some(p)) if !u.trim().is_empty() && !p.trim().is_empty()
        )
    }

    /// Access token, if set and not blank.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    access_token: Option<String>,
    timeout: Option<Duration>,
}

impl ClientConfigBuilder {
    /// Set the service root.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the login credentials.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the pre-shared access token.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> QueryResult<ClientConfig> {
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(QueryError::invalid_configuration("timeout must be greater than zero"));
        }

        Ok(ClientConfig {
            base_url: self.base_url.unwrap_or_default(),
            username: self.username,
            password: self.password,
            access_token: self.access_token,
            timeout,
        })
    }
}
