//! Add/remove as one logical operation across the primary node, the remote
//! pinning service and object storage.
//!
//! The primary node always goes first and is authoritative: a CID only
//! exists once the node has the content. The secondary backends are
//! downstream replicas of that decision, so their failures during `add` are
//! degraded success (or an error, depending on [`RemotePinFailurePolicy`]),
//! and during `remove` they are collected rather than aborting the rest.
//! A failed remote pin never stops the S3 upload unless the add is rolled
//! back.

use std::fmt;

use bytes::Bytes;
use tokio::sync::broadcast;

use crate::cid::ContentId;
use crate::config::{ClientConfig, RemotePinFailurePolicy};
use crate::content::ContentOps;
use crate::dag::DagOps;
use crate::error::{Error, RemotePinError, Result, S3Error};
use crate::pinning::{PinStatus, RemotePinAdapter};
use crate::s3::S3Adapter;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaState {
    NotStarted,
    LocalAdded,
    RemotePinRequested,
    S3Uploaded,
    Committed,
    RollingBack,
}

impl fmt::Display for SagaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SagaState::NotStarted => "not_started",
            SagaState::LocalAdded => "local_added",
            SagaState::RemotePinRequested => "remote_pin_requested",
            SagaState::S3Uploaded => "s3_uploaded",
            SagaState::Committed => "committed",
            SagaState::RollingBack => "rolling_back",
        };
        f.write_str(s)
    }
}

/// A secondary backend that did not receive its copy during `add`.
#[derive(Debug)]
pub enum Shortfall {
    RemotePin(RemotePinError),
    S3Upload(S3Error),
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shortfall::RemotePin(e) => write!(f, "remote pin: {}", e),
            Shortfall::S3Upload(e) => write!(f, "s3 upload: {}", e),
        }
    }
}

/// Result of a successful add.
///
/// The CID is always usable; `shortfalls` lists the durability steps that
/// failed without failing the add.
#[derive(Debug)]
pub struct AddReceipt {
    pub cid: ContentId,
    pub state: SagaState,
    /// Status returned by a foreground remote pin
    pub remote_pin: Option<PinStatus>,
    /// True when the remote pin was handed to a background task
    pub pin_backgrounded: bool,
    pub shortfalls: Vec<Shortfall>,
}

impl AddReceipt {
    pub fn is_degraded(&self) -> bool {
        !self.shortfalls.is_empty()
    }
}

/// Outcome of a background remote pin, published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinEvent {
    Pinned { cid: ContentId, request_id: String },
    Failed { cid: ContentId, reason: String },
}

impl PinEvent {
    pub fn cid(&self) -> &ContentId {
        match self {
            PinEvent::Pinned { cid, .. } | PinEvent::Failed { cid, .. } => cid,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    pub skip_remote: bool,
    pub skip_s3: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Local,
    RemotePin,
    S3,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Local => f.write_str("local"),
            Backend::RemotePin => f.write_str("remote_pin"),
            Backend::S3 => f.write_str("s3"),
        }
    }
}

#[derive(Debug)]
pub enum StepOutcome {
    Done,
    /// Backend disabled or skipped by the caller
    Skipped,
    Failed(Error),
}

impl StepOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            StepOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Per-backend outcome of a remove.
#[derive(Debug)]
pub struct RemoveReport {
    pub cid: ContentId,
    pub local: StepOutcome,
    pub remote_pin: StepOutcome,
    pub s3: StepOutcome,
}

impl RemoveReport {
    /// True only if every attempted step succeeded.
    pub fn succeeded(&self) -> bool {
        !self.local.is_failed() && !self.remote_pin.is_failed() && !self.s3.is_failed()
    }

    pub fn failures(&self) -> impl Iterator<Item = (Backend, &Error)> {
        [
            (Backend::Local, &self.local),
            (Backend::RemotePin, &self.remote_pin),
            (Backend::S3, &self.s3),
        ]
        .into_iter()
        .filter_map(|(backend, outcome)| outcome.error().map(|e| (backend, e)))
    }
}

#[derive(Debug, Clone)]
struct RemotePinning {
    adapter: RemotePinAdapter,
    background: bool,
    on_failure: RemotePinFailurePolicy,
}

/// Tracks one add through its states.
struct Saga {
    cid: ContentId,
    state: SagaState,
}

impl Saga {
    fn start(cid: &ContentId) -> Self {
        let mut saga = Self {
            cid: cid.clone(),
            state: SagaState::NotStarted,
        };
        saga.advance(SagaState::LocalAdded);
        saga
    }

    fn advance(&mut self, next: SagaState) {
        tracing::debug!(cid = %self.cid, from = %self.state, to = %next, "saga transition");
        self.state = next;
    }
}

#[derive(Debug, Clone)]
pub struct PinOrchestrator {
    remote: Option<RemotePinning>,
    s3: Option<S3Adapter>,
    events: broadcast::Sender<PinEvent>,
}

impl PinOrchestrator {
    /// Build the enabled secondary backends from a validated config.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let pinning = &config.remote_pinning;
        let remote = if pinning.enabled {
            let adapter = RemotePinAdapter::new(pinning, config.timeout()).map_err(|source| {
                crate::config::ConfigError::Invalid {
                    field: "remote_pinning",
                    reason: source.to_string(),
                }
            })?;
            Some(RemotePinning {
                adapter,
                background: pinning.background_pinning,
                on_failure: pinning.on_failure,
            })
        } else {
            None
        };

        let s3 = if config.s3.enabled {
            Some(S3Adapter::from_config(&config.s3, config.timeout())?)
        } else {
            None
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self { remote, s3, events })
    }

    /// Replace (or enable) the object-storage backend.
    pub fn set_s3(&mut self, s3: S3Adapter) {
        self.s3 = Some(s3);
    }

    pub fn remote_pinning_enabled(&self) -> bool {
        self.remote.is_some()
    }

    pub fn s3_enabled(&self) -> bool {
        self.s3.is_some()
    }

    pub fn s3(&self) -> Option<&S3Adapter> {
        self.s3.as_ref()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PinEvent> {
        self.events.subscribe()
    }

    /// Add raw bytes to the primary node, then replicate.
    pub async fn add(&self, content: &ContentOps, data: Bytes) -> Result<AddReceipt> {
        let cid = content.add_bytes(data.clone()).await?;
        self.replicate(content, cid, data).await
    }

    /// Put a dag-json node on the primary node, then replicate.
    ///
    /// An unpinned put is left to the node's garbage collector, so it is
    /// not replicated either.
    pub async fn put_dag(
        &self,
        dag: &DagOps,
        content: &ContentOps,
        data: Bytes,
        pin: bool,
    ) -> Result<AddReceipt> {
        let cid = dag.put(data.clone(), pin).await?.cid;
        if !pin {
            tracing::debug!(cid = %cid, "unpinned dag put, skipping replication");
            let state = Saga::start(&cid).state;
            return Ok(AddReceipt {
                cid,
                state,
                remote_pin: None,
                pin_backgrounded: false,
                shortfalls: Vec::new(),
            });
        }
        self.replicate(content, cid, data).await
    }

    async fn replicate(
        &self,
        content: &ContentOps,
        cid: ContentId,
        data: Bytes,
    ) -> Result<AddReceipt> {
        let mut saga = Saga::start(&cid);
        let mut shortfalls = Vec::new();
        let mut remote_pin = None;
        let mut pin_backgrounded = false;
        let mut surfaced = None;

        if let Some(remote) = &self.remote {
            saga.advance(SagaState::RemotePinRequested);
            if remote.background {
                self.spawn_background_pin(remote.adapter.clone(), cid.clone());
                pin_backgrounded = true;
            } else {
                match remote.adapter.pin(&cid).await {
                    Ok(status) => remote_pin = Some(status),
                    Err(source) => match remote.on_failure {
                        RemotePinFailurePolicy::Degrade => {
                            tracing::warn!(cid = %cid, error = %source, "remote pin failed, continuing");
                            shortfalls.push(Shortfall::RemotePin(source));
                        }
                        RemotePinFailurePolicy::Surface => {
                            tracing::warn!(cid = %cid, error = %source, "remote pin failed, local pin kept");
                            surfaced = Some(source);
                        }
                        // the content is leaving the node, so S3 is not written either
                        RemotePinFailurePolicy::Rollback => {
                            saga.advance(SagaState::RollingBack);
                            rollback_local(content, &cid).await;
                            return Err(Error::RemotePin {
                                cid,
                                source,
                                shortfalls: Vec::new(),
                            });
                        }
                    },
                }
            }
        }

        if let Some(s3) = &self.s3 {
            match s3.upload(&cid, data).await {
                Ok(()) => saga.advance(SagaState::S3Uploaded),
                Err(e) => {
                    tracing::warn!(cid = %cid, backend = "s3", error = %e, "upload failed, continuing");
                    shortfalls.push(Shortfall::S3Upload(e));
                }
            }
        }

        if let Some(source) = surfaced {
            return Err(Error::RemotePin {
                cid,
                source,
                shortfalls,
            });
        }

        saga.advance(SagaState::Committed);
        let state = saga.state;
        Ok(AddReceipt {
            cid,
            state,
            remote_pin,
            pin_backgrounded,
            shortfalls,
        })
    }

    fn spawn_background_pin(&self, adapter: RemotePinAdapter, cid: ContentId) {
        let events = self.events.clone();
        tokio::spawn(async move {
            let event = match adapter.pin(&cid).await {
                Ok(status) => {
                    tracing::info!(
                        cid = %cid,
                        service = %adapter.service_name(),
                        request_id = %status.requestid,
                        "background remote pin accepted"
                    );
                    PinEvent::Pinned {
                        cid,
                        request_id: status.requestid,
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        cid = %cid,
                        service = %adapter.service_name(),
                        error = %e,
                        "background remote pin failed"
                    );
                    PinEvent::Failed {
                        cid,
                        reason: e.to_string(),
                    }
                }
            };
            // no subscribers is fine
            let _ = events.send(event);
        });
    }

    /// Remove `cid` from every enabled backend, attempting all of them.
    pub async fn remove(
        &self,
        content: &ContentOps,
        cid: &ContentId,
        options: RemoveOptions,
    ) -> RemoveReport {
        let local = match content.unpin(cid).await {
            Ok(()) => StepOutcome::Done,
            Err(e) => {
                tracing::warn!(cid = %cid, backend = "local", error = %e, "unpin failed");
                StepOutcome::Failed(e)
            }
        };

        let remote_pin = match &self.remote {
            Some(remote) if !options.skip_remote => match remote.adapter.unpin(cid).await {
                Ok(_) => StepOutcome::Done,
                Err(source) => {
                    tracing::warn!(cid = %cid, backend = "remote_pin", error = %source, "unpin failed");
                    StepOutcome::Failed(Error::RemotePin {
                        cid: cid.clone(),
                        source,
                        shortfalls: Vec::new(),
                    })
                }
            },
            _ => StepOutcome::Skipped,
        };

        let s3 = match &self.s3 {
            Some(s3) if !options.skip_s3 => match s3.delete(cid).await {
                Ok(()) => StepOutcome::Done,
                Err(e) => {
                    tracing::warn!(cid = %cid, backend = "s3", error = %e, "delete failed");
                    StepOutcome::Failed(e.into())
                }
            },
            _ => StepOutcome::Skipped,
        };

        let report = RemoveReport {
            cid: cid.clone(),
            local,
            remote_pin,
            s3,
        };
        tracing::debug!(cid = %cid, succeeded = report.succeeded(), "remove finished");
        report
    }
}

async fn rollback_local(content: &ContentOps, cid: &ContentId) {
    match content.unpin(cid).await {
        Ok(()) => tracing::info!(cid = %cid, "rolled back local pin"),
        Err(e) if e.is_not_found() => {}
        Err(e) => tracing::warn!(cid = %cid, error = %e, "rollback of local pin failed"),
    }
}
