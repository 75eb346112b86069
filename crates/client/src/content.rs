//! Raw byte and JSON content against the node.
//!
//! Plain request/response: nothing here retries or touches a secondary
//! backend. Replication is layered on by [`crate::orchestrator`].

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cid::ContentId;
use crate::error::{NodeError, Result};
use crate::session::{Session, SessionPair};

#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

#[derive(Debug, Deserialize)]
struct PinsResponse {
    #[serde(rename = "Pins", default)]
    pins: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PinLsResponse {
    #[serde(rename = "Keys", default)]
    keys: HashMap<String, serde_json::Value>,
}

/// Multipart body with a single file part, the shape `add` and `dag/put`
/// expect.
pub(crate) fn file_form(data: Bytes) -> Form {
    let len = data.len() as u64;
    let part = Part::stream_with_length(data, len).file_name("file");
    Form::new().part("file", part)
}

pub(crate) fn parse_cid(
    operation: &'static str,
    raw: &str,
) -> std::result::Result<ContentId, NodeError> {
    ContentId::parse(raw).map_err(|e| NodeError::malformed(operation, e))
}

/// Content operations over a session pair: writes on the write session,
/// reads on the read session.
#[derive(Debug, Clone)]
pub struct ContentOps {
    write: Arc<Session>,
    read: Arc<Session>,
}

impl ContentOps {
    pub fn new(sessions: &SessionPair) -> Self {
        Self {
            write: sessions.write.clone(),
            read: sessions.read.clone(),
        }
    }

    /// Add bytes to the primary node (CIDv1) and return their identifier.
    pub async fn add_bytes(&self, data: Bytes) -> Result<ContentId> {
        let response: AddResponse = self
            .write
            .post_json("add", "add", &[("cid-version", "1")], Some(file_form(data)))
            .await?;
        let cid = parse_cid("add", &response.hash)?;
        tracing::debug!(cid = %cid, "added content to primary node");
        Ok(cid)
    }

    pub async fn add_str(&self, text: &str) -> Result<ContentId> {
        self.add_bytes(Bytes::copy_from_slice(text.as_bytes())).await
    }

    pub async fn add_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<ContentId> {
        let data = serde_json::to_vec(value)?;
        self.add_bytes(Bytes::from(data)).await
    }

    /// Read raw content through the reader node.
    pub async fn cat(&self, cid: &ContentId) -> Result<Bytes> {
        let body = self
            .read
            .post("cat", "cat", &[("arg", cid.as_str())], None)
            .await?;
        Ok(body)
    }

    /// Read content as UTF-8 text.
    pub async fn cat_text(&self, cid: &ContentId) -> Result<String> {
        let body = self.cat(cid).await?;
        String::from_utf8(body.to_vec())
            .map_err(|e| NodeError::malformed("cat", e).into())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, cid: &ContentId) -> Result<T> {
        let body = self.cat(cid).await?;
        serde_json::from_slice(&body).map_err(|e| NodeError::malformed("cat", e).into())
    }

    /// Pin on the primary node.
    pub async fn pin(&self, cid: &ContentId) -> Result<()> {
        let response: PinsResponse = self
            .write
            .post_json("pin/add", "pin/add", &[("arg", cid.as_str())], None)
            .await?;
        tracing::debug!(cid = %cid, pins = ?response.pins, "pinned on primary node");
        Ok(())
    }

    /// Remove the primary node's pin. Fails with a not-found
    /// [`NodeError`] when the content was not pinned.
    pub async fn unpin(&self, cid: &ContentId) -> Result<()> {
        let _: PinsResponse = self
            .write
            .post_json("pin/rm", "pin/rm", &[("arg", cid.as_str())], None)
            .await?;
        tracing::debug!(cid = %cid, "unpinned from primary node");
        Ok(())
    }

    /// Whether the primary node holds a pin for `cid`.
    pub async fn is_pinned(&self, cid: &ContentId) -> Result<bool> {
        let result: std::result::Result<PinLsResponse, NodeError> = self
            .write
            .post_json("pin/ls", "pin/ls", &[("arg", cid.as_str())], None)
            .await;
        match result {
            Ok(response) => Ok(response.keys.contains_key(cid.as_str())),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
