//! Read and write sessions against the node.
//!
//! The write session talks to the primary node and carries every mutation.
//! The read session talks to the reader node (often a public gateway) and
//! carries every get. They never share a pool, so a burst of reads cannot
//! starve writes and vice versa.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use bytes::Bytes;
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart::Form;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use url::Url;

use crate::address::{resolve, BaseUrl};
use crate::config::{AuthScheme, ClientConfig, ConfigError, ConnectionLimits, ExternalApiAuth};
use crate::error::{NodeError, Result};

const USER_AGENT: &str = concat!("jax-ipfs/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    Write,
    Read,
}

impl std::fmt::Display for SessionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionRole::Write => f.write_str("write"),
            SessionRole::Read => f.write_str("read"),
        }
    }
}

/// One pooled HTTP session bound to a single node.
///
/// `max_connections` is enforced with a semaphore: each request holds a
/// permit until its body has been read, so excess requests wait in line
/// instead of failing.
#[derive(Debug)]
pub struct Session {
    role: SessionRole,
    base: BaseUrl,
    client: Client,
    permits: Semaphore,
}

impl Session {
    pub fn new(
        role: SessionRole,
        base: BaseUrl,
        auth: Option<&ExternalApiAuth>,
        timeout: Duration,
        limits: &ConnectionLimits,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(auth_headers(auth)?)
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_max_idle_per_host(limits.max_keepalive_connections)
            .pool_idle_timeout(limits.keepalive_expiry())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(NodeError::Build)?;

        Ok(Self {
            role,
            base,
            client,
            permits: Semaphore::new(limits.max_connections),
        })
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.base
    }

    /// The underlying HTTP client, for requests outside the RPC API.
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    pub fn endpoint(&self, path: &str) -> Url {
        self.base.endpoint(path)
    }

    /// Requests that may start right now without queueing.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// POST an RPC endpoint and return the raw body of a 2xx response.
    pub(crate) async fn post(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, &str)],
        form: Option<Form>,
    ) -> std::result::Result<Bytes, NodeError> {
        let _permit = self.permits.acquire().await.map_err(|_| NodeError::Closed)?;

        let mut request = self.client.post(self.endpoint(path)).query(query);
        if let Some(form) = form {
            request = request.multipart(form);
        }

        tracing::trace!(session = %self.role, operation, "sending request");
        let response = request
            .send()
            .await
            .map_err(|source| NodeError::Transport { operation, source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NodeError::Status {
                operation,
                status,
                body,
            });
        }

        response
            .bytes()
            .await
            .map_err(|source| NodeError::Transport { operation, source })
    }

    pub(crate) async fn post_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, &str)],
        form: Option<Form>,
    ) -> std::result::Result<T, NodeError> {
        let body = self.post(operation, path, query, form).await?;
        serde_json::from_slice(&body).map_err(|e| NodeError::malformed(operation, e))
    }

    fn close(&self) {
        self.permits.close();
    }
}

fn auth_headers(auth: Option<&ExternalApiAuth>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let Some(auth) = auth else {
        return Ok(headers);
    };

    let value = match auth.scheme {
        AuthScheme::Basic => {
            let credentials = format!("{}:{}", auth.api_key, auth.api_secret);
            format!(
                "Basic {}",
                base64::engine::general_purpose::STANDARD.encode(credentials)
            )
        }
        AuthScheme::Bearer => format!("Bearer {}", auth.api_key),
    };
    let mut value = HeaderValue::from_str(&value).map_err(|e| ConfigError::Invalid {
        field: "auth",
        reason: e.to_string(),
    })?;
    value.set_sensitive(true);
    headers.insert(AUTHORIZATION, value);

    Ok(headers)
}

/// The write and read sessions, shared by every operation.
#[derive(Debug, Clone)]
pub struct SessionPair {
    pub write: Arc<Session>,
    pub read: Arc<Session>,
}

impl SessionPair {
    pub fn open(config: &ClientConfig) -> Result<Self> {
        let timeout = config.timeout();
        let limits = &config.connection_limits;

        let write = Session::new(
            SessionRole::Write,
            resolve(&config.url)?,
            config.url_auth.as_ref(),
            timeout,
            limits,
        )?;
        let read = Session::new(
            SessionRole::Read,
            resolve(&config.reader_url)?,
            config.reader_url_auth.as_ref(),
            timeout,
            limits,
        )?;

        Ok(Self {
            write: Arc::new(write),
            read: Arc::new(read),
        })
    }

    fn close(&self) {
        self.write.close();
        self.read.close();
    }
}

#[derive(Debug)]
enum State {
    Uninitialized,
    Open(SessionPair),
    Closed,
}

/// Owns the session pair and its init/close lifecycle.
#[derive(Debug)]
pub struct SessionManager {
    config: Arc<ClientConfig>,
    state: RwLock<State>,
}

impl SessionManager {
    pub fn new(config: Arc<ClientConfig>) -> Self {
        Self {
            config,
            state: RwLock::new(State::Uninitialized),
        }
    }

    /// Open both sessions. Calling this again while open keeps the existing
    /// sessions; calling it after [`close`](Self::close) fails.
    pub fn init(&self) -> Result<()> {
        let mut state = self.state.write();
        match &*state {
            State::Open(_) => {
                tracing::debug!("sessions already initialized");
                Ok(())
            }
            State::Closed => Err(NodeError::Closed.into()),
            State::Uninitialized => {
                let pair = SessionPair::open(&self.config)?;
                tracing::debug!(
                    write = %pair.write.base_url(),
                    read = %pair.read.base_url(),
                    "initialized IPFS sessions"
                );
                *state = State::Open(pair);
                Ok(())
            }
        }
    }

    /// Release both pools. Requests already queued fail with
    /// [`NodeError::Closed`]; safe to call more than once.
    pub fn close(&self) {
        let mut state = self.state.write();
        if let State::Open(pair) = &*state {
            pair.close();
            tracing::debug!("closed IPFS sessions");
        }
        *state = State::Closed;
    }

    pub fn is_open(&self) -> bool {
        matches!(&*self.state.read(), State::Open(_))
    }

    pub fn pair(&self) -> std::result::Result<SessionPair, NodeError> {
        match &*self.state.read() {
            State::Open(pair) => Ok(pair.clone()),
            State::Uninitialized => Err(NodeError::NotInitialized),
            State::Closed => Err(NodeError::Closed),
        }
    }
}
