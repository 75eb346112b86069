/**
 * Node address parsing.
 *  Accepts plain URLs and `/ip4|ip6/.../tcp/.../http|https`
 *  multiaddrs and resolves both to one base URL.
 */
pub mod address;
pub mod cid;
/**
 * Typed client configuration and validation.
 */
pub mod config;
/**
 * Raw bytes, text and JSON against the node.
 */
pub mod content;
/**
 * DAG put/get and the lazily decoded block type.
 */
pub mod dag;
pub mod error;
/**
 * The saga that keeps the primary node, the remote
 *  pinning service and object storage in step on
 *  add and remove.
 */
pub mod orchestrator;
/**
 * IPFS Pinning Service API adapter.
 */
pub mod pinning;
/**
 * S3-compatible object storage adapter.
 */
pub mod s3;
/**
 * Pooled read/write HTTP sessions and their
 *  init/close lifecycle.
 */
pub mod session;

mod client;

pub use client::IpfsClient;
pub use error::{Error, Result};
pub use orchestrator::PinEvent;

pub mod prelude {
    pub use crate::address::{resolve, AddressError, BaseUrl, NodeAddress};
    pub use crate::cid::ContentId;
    pub use crate::config::{
        AuthScheme, ClientConfig, ConfigError, ConnectionLimits, ExternalApiAuth,
        RemotePinFailurePolicy, RemotePinningConfig, S3Config,
    };
    pub use crate::dag::DagBlock;
    pub use crate::error::{Error, NodeError, RemotePinError, Result, S3Error};
    pub use crate::orchestrator::{
        AddReceipt, Backend, PinEvent, RemoveOptions, RemoveReport, SagaState, Shortfall,
        StepOutcome,
    };
    pub use crate::pinning::{PinState, PinStatus};
    pub use crate::IpfsClient;
}
