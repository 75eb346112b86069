use std::sync::Arc;

use bytes::Bytes;
use object_store::ObjectStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::cid::ContentId;
use crate::config::ClientConfig;
use crate::content::ContentOps;
use crate::dag::{DagBlock, DagOps};
use crate::error::Result;
use crate::orchestrator::{AddReceipt, PinEvent, PinOrchestrator, RemoveOptions, RemoveReport};
use crate::s3::S3Adapter;
use crate::session::{Session, SessionManager, SessionPair};

/// Owned handle to the primary node and its replicas.
///
/// Construct once, call [`init`](Self::init) before use and
/// [`close`](Self::close) at shutdown. Cloning is not supported; share it
/// behind an `Arc`.
#[derive(Debug)]
pub struct IpfsClient {
    config: Arc<ClientConfig>,
    sessions: SessionManager,
    orchestrator: PinOrchestrator,
}

impl IpfsClient {
    /// Validate `config` and build the secondary backends. No connection is
    /// opened until [`init`](Self::init).
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let orchestrator = PinOrchestrator::new(&config)?;
        Ok(Self {
            sessions: SessionManager::new(config.clone()),
            config,
            orchestrator,
        })
    }

    /// `new` followed by `init`.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let client = Self::new(config)?;
        client.init()?;
        Ok(client)
    }

    /// Mirror added content into `store` instead of the configured S3
    /// endpoint. Enables the S3 step if the config left it off.
    pub fn with_object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        let bucket = if self.config.s3.bucket_name.is_empty() {
            "memory".to_string()
        } else {
            self.config.s3.bucket_name.clone()
        };
        self.orchestrator.set_s3(S3Adapter::with_store(bucket, store));
        self
    }

    pub fn init(&self) -> Result<()> {
        self.sessions.init()
    }

    pub fn close(&self) {
        self.sessions.close()
    }

    pub fn is_open(&self) -> bool {
        self.sessions.is_open()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &PinOrchestrator {
        &self.orchestrator
    }

    pub fn sessions(&self) -> Result<SessionPair> {
        Ok(self.sessions.pair()?)
    }

    /// The write session (primary node).
    pub fn writer(&self) -> Result<Arc<Session>> {
        Ok(self.sessions.pair()?.write)
    }

    /// The read session (reader node or gateway).
    pub fn reader(&self) -> Result<Arc<Session>> {
        Ok(self.sessions.pair()?.read)
    }

    /// Direct content operations, bypassing replication.
    pub fn content(&self) -> Result<ContentOps> {
        Ok(ContentOps::new(&self.sessions.pair()?))
    }

    /// Direct DAG operations, bypassing replication.
    pub fn dag(&self) -> Result<DagOps> {
        Ok(DagOps::new(&self.sessions.pair()?))
    }

    /// Outcomes of background remote pins started after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<PinEvent> {
        self.orchestrator.subscribe()
    }

    pub async fn add_bytes(&self, data: impl Into<Bytes>) -> Result<AddReceipt> {
        let content = self.content()?;
        self.orchestrator.add(&content, data.into()).await
    }

    pub async fn add_str(&self, text: &str) -> Result<AddReceipt> {
        self.add_bytes(Bytes::copy_from_slice(text.as_bytes())).await
    }

    pub async fn add_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<AddReceipt> {
        let data = serde_json::to_vec(value)?;
        self.add_bytes(data).await
    }

    pub async fn cat(&self, cid: &ContentId) -> Result<Bytes> {
        self.content()?.cat(cid).await
    }

    pub async fn cat_text(&self, cid: &ContentId) -> Result<String> {
        self.content()?.cat_text(cid).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, cid: &ContentId) -> Result<T> {
        self.content()?.get_json(cid).await
    }

    pub async fn dag_put(&self, data: impl Into<Bytes>, pin: bool) -> Result<AddReceipt> {
        let pair = self.sessions.pair()?;
        self.orchestrator
            .put_dag(&DagOps::new(&pair), &ContentOps::new(&pair), data.into(), pin)
            .await
    }

    pub async fn dag_put_json<T: Serialize + ?Sized>(
        &self,
        value: &T,
        pin: bool,
    ) -> Result<AddReceipt> {
        let data = serde_json::to_vec(value)?;
        self.dag_put(data, pin).await
    }

    pub async fn dag_get(&self, cid: &ContentId) -> Result<DagBlock> {
        self.dag()?.get(cid).await
    }

    pub async fn is_pinned(&self, cid: &ContentId) -> Result<bool> {
        self.content()?.is_pinned(cid).await
    }

    /// Remove `cid` from every enabled backend. Only fails outright when
    /// the sessions are unavailable; backend failures land in the report.
    pub async fn remove(&self, cid: &ContentId, options: RemoveOptions) -> Result<RemoveReport> {
        let content = self.content()?;
        Ok(self.orchestrator.remove(&content, cid, options).await)
    }
}

impl Drop for IpfsClient {
    fn drop(&mut self) {
        self.sessions.close();
    }
}
