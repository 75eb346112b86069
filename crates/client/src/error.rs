//! Error kinds for every backend the client talks to.
//!
//! Primary-node failures ([`NodeError`]) are always fatal to the operation
//! that hit them. Secondary-backend failures ([`RemotePinError`],
//! [`S3Error`]) are fatal or degraded depending on the step and on
//! configuration; the [`crate::orchestrator`] decides which.

use reqwest::StatusCode;

use crate::address::AddressError;
use crate::cid::ContentId;
use crate::config::ConfigError;
use crate::orchestrator::Shortfall;

/// A request against the primary (or reader) node failed.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("{operation}: request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation}: node returned HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("{operation}: malformed response: {reason}")]
    Malformed {
        operation: &'static str,
        reason: String,
    },

    #[error("failed to build HTTP session: {0}")]
    Build(#[source] reqwest::Error),

    #[error("sessions are not initialized, call init() first")]
    NotInitialized,

    #[error("sessions are closed")]
    Closed,
}

impl NodeError {
    /// Whether the node reported that the content or pin does not exist.
    ///
    /// The RPC API answers most lookups with a 500 and a message rather than
    /// a 404, so the body is inspected as well.
    pub fn is_not_found(&self) -> bool {
        match self {
            NodeError::Status { status, body, .. } => {
                if *status == StatusCode::NOT_FOUND {
                    return true;
                }
                let body = body.to_lowercase();
                body.contains("not pinned")
                    || body.contains("not found")
                    || body.contains("no link named")
            }
            _ => false,
        }
    }

    pub(crate) fn malformed(operation: &'static str, reason: impl ToString) -> Self {
        NodeError::Malformed {
            operation,
            reason: reason.to_string(),
        }
    }
}

/// A request against the remote pinning service failed.
#[derive(Debug, thiserror::Error)]
pub enum RemotePinError {
    #[error("pinning service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("pinning service returned HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("pinning service returned a malformed response: {0}")]
    Malformed(String),

    #[error("pinning service rejected pin request {request_id}")]
    Rejected { request_id: String },

    #[error("invalid pinning service endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// An object-storage step failed.
#[derive(Debug, thiserror::Error)]
pub enum S3Error {
    #[error("S3 upload of {cid} failed: {source}")]
    Upload {
        cid: ContentId,
        #[source]
        source: object_store::Error,
    },

    #[error("S3 delete of {cid} failed: {source}")]
    Delete {
        cid: ContentId,
        #[source]
        source: object_store::Error,
    },

    #[error("S3 read of {cid} failed: {source}")]
    Read {
        cid: ContentId,
        #[source]
        source: object_store::Error,
    },

    #[error("invalid S3 configuration: {0}")]
    Setup(#[source] object_store::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Node(#[from] NodeError),

    /// Remote pinning failed in the foreground. The content is still held by
    /// the primary node unless the rollback policy removed it. `shortfalls`
    /// lists the other replicas that were also missed.
    #[error("remote pin of {cid} failed: {source}")]
    RemotePin {
        cid: ContentId,
        #[source]
        source: RemotePinError,
        shortfalls: Vec<Shortfall>,
    },

    #[error(transparent)]
    S3(#[from] S3Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Node(e) if e.is_not_found())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
