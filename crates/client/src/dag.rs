use std::fmt;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cid::ContentId;
use crate::content::{file_form, parse_cid};
use crate::error::Result;
use crate::session::{Session, SessionPair};

#[derive(Debug, Deserialize)]
struct CidLink {
    #[serde(rename = "/")]
    link: String,
}

#[derive(Debug, Deserialize)]
struct RawDagPutResponse {
    #[serde(rename = "Cid")]
    cid: CidLink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DagPutResponse {
    pub cid: ContentId,
}

/// A DAG node as returned by `dag/get`.
///
/// The raw JSON is kept as received; the decoded view is computed on first
/// access and cached.
pub struct DagBlock {
    raw: Bytes,
    decoded: OnceLock<serde_json::Value>,
}

impl DagBlock {
    pub fn new(raw: Bytes) -> Self {
        Self {
            raw,
            decoded: OnceLock::new(),
        }
    }

    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub fn as_json(&self) -> Result<&serde_json::Value> {
        if let Some(value) = self.decoded.get() {
            return Ok(value);
        }
        let value = serde_json::from_slice(&self.raw)?;
        Ok(self.decoded.get_or_init(|| value))
    }

    pub fn is_decoded(&self) -> bool {
        self.decoded.get().is_some()
    }

    /// Decode into a typed value. Not cached.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.raw)?)
    }
}

impl fmt::Debug for DagBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DagBlock")
            .field("len", &self.raw.len())
            .field("decoded", &self.is_decoded())
            .finish()
    }
}

impl fmt::Display for DagBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.raw))
    }
}

#[derive(Debug, Clone)]
pub struct DagOps {
    write: Arc<Session>,
    read: Arc<Session>,
}

impl DagOps {
    pub fn new(sessions: &SessionPair) -> Self {
        Self {
            write: sessions.write.clone(),
            read: sessions.read.clone(),
        }
    }

    /// Store a dag-json encoded node on the primary node.
    pub async fn put(&self, data: Bytes, pin: bool) -> Result<DagPutResponse> {
        let pin = if pin { "true" } else { "false" };
        let response: RawDagPutResponse = self
            .write
            .post_json("dag/put", "dag/put", &[("pin", pin)], Some(file_form(data)))
            .await?;
        let cid = parse_cid("dag/put", &response.cid.link)?;
        tracing::debug!(cid = %cid, "put DAG node");
        Ok(DagPutResponse { cid })
    }

    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        value: &T,
        pin: bool,
    ) -> Result<DagPutResponse> {
        let data = serde_json::to_vec(value)?;
        self.put(Bytes::from(data), pin).await
    }

    pub async fn get(&self, cid: &ContentId) -> Result<DagBlock> {
        let body = self
            .read
            .post("dag/get", "dag/get", &[("arg", cid.as_str())], None)
            .await?;
        Ok(DagBlock::new(body))
    }
}
