//! Typed client configuration.
//!
//! Loaded once by the caller (usually from TOML) and handed to
//! [`crate::IpfsClient::new`], which validates it before anything touches the
//! network. Nothing here is mutated afterwards.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use url::Url;

use crate::address::{AddressError, NodeAddress};

const REDACTED: &str = "<redacted>";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {field}: {source}")]
    Address {
        field: &'static str,
        #[source]
        source: AddressError,
    },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("{feature} is enabled but {field} is not set")]
    Missing {
        feature: &'static str,
        field: &'static str,
    },
}

/// How API credentials are presented to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    /// HTTP basic auth with `api_key:api_secret`
    #[default]
    Basic,
    /// `Authorization: Bearer <api_key>`
    Bearer,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalApiAuth {
    #[serde(alias = "apiKey")]
    pub api_key: String,
    #[serde(alias = "apiSecret", default)]
    pub api_secret: String,
    #[serde(default)]
    pub scheme: AuthScheme,
}

impl fmt::Debug for ExternalApiAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalApiAuth")
            .field("api_key", &self.api_key)
            .field("api_secret", &REDACTED)
            .field("scheme", &self.scheme)
            .finish()
    }
}

/// Bounds on a session's connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionLimits {
    /// Requests allowed in flight at once; further requests queue
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Idle connections kept open per host
    #[serde(default = "default_max_keepalive_connections")]
    pub max_keepalive_connections: usize,
    /// Seconds before an idle connection is dropped
    #[serde(default = "default_keepalive_expiry")]
    pub keepalive_expiry: u64,
}

fn default_max_connections() -> usize {
    100
}

fn default_max_keepalive_connections() -> usize {
    50
}

fn default_keepalive_expiry() -> u64 {
    300
}

fn default_timeout() -> u64 {
    60
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            max_keepalive_connections: default_max_keepalive_connections(),
            keepalive_expiry: default_keepalive_expiry(),
        }
    }
}

impl ConnectionLimits {
    pub fn keepalive_expiry(&self) -> Duration {
        Duration::from_secs(self.keepalive_expiry)
    }
}

/// What a foreground add does when the remote pin fails.
///
/// Background pins never reach this policy; their failures are only logged
/// and published as [`crate::PinEvent`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemotePinFailurePolicy {
    /// Fail the add with [`crate::Error::RemotePin`] after the S3 step,
    /// keep the local pin
    #[default]
    Surface,
    /// Return the CID and record the failure on the receipt
    Degrade,
    /// Unpin locally and skip S3, then fail the add
    Rollback,
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePinningConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub service_name: String,
    /// Pinning Service API root, e.g. `https://api.pinata.cloud/psa`
    #[serde(default)]
    pub service_endpoint: String,
    #[serde(default)]
    pub service_token: String,
    #[serde(default)]
    pub background_pinning: bool,
    #[serde(default)]
    pub on_failure: RemotePinFailurePolicy,
}

impl fmt::Debug for RemotePinningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemotePinningConfig")
            .field("enabled", &self.enabled)
            .field("service_name", &self.service_name)
            .field("service_endpoint", &self.service_endpoint)
            .field("service_token", &REDACTED)
            .field("background_pinning", &self.background_pinning)
            .field("on_failure", &self.on_failure)
            .finish()
    }
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub endpoint_url: String,
    #[serde(default)]
    pub bucket_name: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("enabled", &self.enabled)
            .field("endpoint_url", &self.endpoint_url)
            .field("bucket_name", &self.bucket_name)
            .field("access_key", &self.access_key)
            .field("secret_key", &REDACTED)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Primary node, used for every mutation (URL or multiaddr)
    pub url: String,
    #[serde(default)]
    pub url_auth: Option<ExternalApiAuth>,
    /// Node or gateway used for reads (URL or multiaddr)
    pub reader_url: String,
    #[serde(default)]
    pub reader_url_auth: Option<ExternalApiAuth>,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub connection_limits: ConnectionLimits,
    #[serde(default)]
    pub remote_pinning: RemotePinningConfig,
    #[serde(default)]
    pub s3: S3Config,
}

impl ClientConfig {
    /// Config that reads and writes through the same node, with every
    /// secondary backend disabled.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            reader_url: url.clone(),
            url,
            url_auth: None,
            reader_url_auth: None,
            timeout: default_timeout(),
            connection_limits: ConnectionLimits::default(),
            remote_pinning: RemotePinningConfig::default(),
            s3: S3Config::default(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Reject combinations that would only fail at first use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        NodeAddress::parse(&self.url).map_err(|source| ConfigError::Address {
            field: "url",
            source,
        })?;
        NodeAddress::parse(&self.reader_url).map_err(|source| ConfigError::Address {
            field: "reader_url",
            source,
        })?;

        for (field, auth) in [
            ("url_auth.api_key", &self.url_auth),
            ("reader_url_auth.api_key", &self.reader_url_auth),
        ] {
            if matches!(auth, Some(a) if a.api_key.trim().is_empty()) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must not be empty".to_string(),
                });
            }
        }

        if self.timeout == 0 {
            return Err(ConfigError::Invalid {
                field: "timeout",
                reason: "must be at least one second".to_string(),
            });
        }

        let limits = &self.connection_limits;
        if limits.max_connections == 0 {
            return Err(ConfigError::Invalid {
                field: "connection_limits.max_connections",
                reason: "must be greater than zero".to_string(),
            });
        }
        if limits.max_connections > Semaphore::MAX_PERMITS {
            return Err(ConfigError::Invalid {
                field: "connection_limits.max_connections",
                reason: format!("must not exceed {}", Semaphore::MAX_PERMITS),
            });
        }
        if limits.max_keepalive_connections > limits.max_connections {
            return Err(ConfigError::Invalid {
                field: "connection_limits.max_keepalive_connections",
                reason: format!(
                    "{} exceeds max_connections ({})",
                    limits.max_keepalive_connections, limits.max_connections
                ),
            });
        }

        let pinning = &self.remote_pinning;
        if pinning.enabled {
            require("remote pinning", "service_name", &pinning.service_name)?;
            require("remote pinning", "service_endpoint", &pinning.service_endpoint)?;
            require("remote pinning", "service_token", &pinning.service_token)?;
            require_http_url("remote_pinning.service_endpoint", &pinning.service_endpoint)?;
        }

        let s3 = &self.s3;
        if s3.enabled {
            require("s3", "endpoint_url", &s3.endpoint_url)?;
            require("s3", "bucket_name", &s3.bucket_name)?;
            require("s3", "access_key", &s3.access_key)?;
            require("s3", "secret_key", &s3.secret_key)?;
            require_http_url("s3.endpoint_url", &s3.endpoint_url)?;
        }

        Ok(())
    }
}

fn require(feature: &'static str, field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing { feature, field });
    }
    Ok(())
}

fn require_http_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::Invalid {
        field,
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Invalid {
            field,
            reason: format!("unsupported scheme '{}'", other),
        }),
    }
}
