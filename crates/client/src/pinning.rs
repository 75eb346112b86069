//! Remote pinning through the IPFS Pinning Service API.
//!
//! A thin request builder: it knows the service's REST shape and bearer
//! auth, nothing about the other backends.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cid::ContentId;
use crate::config::RemotePinningConfig;
use crate::error::RemotePinError;

const ALL_STATES: &str = "queued,pinning,pinned,failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinState {
    Queued,
    Pinning,
    Pinned,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pin {
    pub cid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The service's view of one pin request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinStatus {
    pub requestid: String,
    pub status: PinState,
    pub created: DateTime<Utc>,
    pub pin: Pin,
    #[serde(default)]
    pub delegates: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PinResults {
    #[serde(default)]
    results: Vec<PinStatus>,
}

#[derive(Debug, Clone)]
pub struct RemotePinAdapter {
    service_name: String,
    endpoint: Url,
    client: Client,
}

impl RemotePinAdapter {
    pub fn new(config: &RemotePinningConfig, timeout: Duration) -> Result<Self, RemotePinError> {
        let endpoint = Url::parse(config.service_endpoint.trim_end_matches('/'))?;

        let mut token = HeaderValue::from_str(&format!("Bearer {}", config.service_token))
            .map_err(|e| RemotePinError::Malformed(format!("invalid service token: {}", e)))?;
        token.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, token);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            service_name: config.service_name.clone(),
            endpoint,
            client,
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    fn pins_url(&self, request_id: Option<&str>) -> Url {
        let mut url = self.endpoint.clone();
        let base = url.path().trim_end_matches('/').to_string();
        match request_id {
            Some(id) => url.set_path(&format!("{}/pins/{}", base, id)),
            None => url.set_path(&format!("{}/pins", base)),
        }
        url
    }

    /// Ask the service to pin `cid`. Returns once the request is accepted,
    /// not once the service finishes fetching.
    pub async fn pin(&self, cid: &ContentId) -> Result<PinStatus, RemotePinError> {
        let body = Pin {
            cid: cid.to_string(),
            name: None,
        };
        let response = self
            .client
            .post(self.pins_url(None))
            .json(&body)
            .send()
            .await?;
        let status: PinStatus = read_json(response).await?;

        if status.status == PinState::Failed {
            return Err(RemotePinError::Rejected {
                request_id: status.requestid,
            });
        }
        tracing::debug!(
            cid = %cid,
            service = %self.service_name,
            request_id = %status.requestid,
            state = ?status.status,
            "remote pin accepted"
        );
        Ok(status)
    }

    /// Pin requests the service holds for `cid`, in any state.
    pub async fn find(&self, cid: &ContentId) -> Result<Vec<PinStatus>, RemotePinError> {
        // services list only `pinned` requests when no status is given
        let response = self
            .client
            .get(self.pins_url(None))
            .query(&[("cid", cid.as_str()), ("status", ALL_STATES)])
            .send()
            .await?;
        let results: PinResults = read_json(response).await?;
        Ok(results.results)
    }

    /// Delete every pin request for `cid`. No matching request counts as
    /// already removed.
    pub async fn unpin(&self, cid: &ContentId) -> Result<usize, RemotePinError> {
        let requests = self.find(cid).await?;
        let mut removed = 0;
        for request in requests.iter().filter(|r| r.pin.cid == cid.as_str()) {
            let response = self
                .client
                .delete(self.pins_url(Some(&request.requestid)))
                .send()
                .await?;
            match response.status() {
                s if s.is_success() => removed += 1,
                StatusCode::NOT_FOUND => {}
                status => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(RemotePinError::Status { status, body });
                }
            }
        }
        tracing::debug!(cid = %cid, service = %self.service_name, removed, "remote pins removed");
        Ok(removed)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, RemotePinError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RemotePinError::Status { status, body });
    }
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| RemotePinError::Malformed(e.to_string()))
}
