//! In-process fake peers for integration tests: a primary node speaking the
//! `/api/v0` subset the client uses, and a Pinning Service API.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, post};
use axum::{Json, Router};
use cid::Cid;
use ipfs_client::prelude::*;
use multihash::Multihash;
use parking_lot::Mutex;
use serde_json::json;
use sha2::{Digest, Sha256};
use tokio::net::TcpListener;

const RAW: u64 = 0x55;
const DAG_JSON: u64 = 0x0129;
const SHA2_256: u64 = 0x12;

/// CIDv1 of `data` under `codec`, as the node computes it.
pub fn cid_for(codec: u64, data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let hash = Multihash::<64>::wrap(SHA2_256, &digest).unwrap();
    Cid::new_v1(codec, hash).to_string()
}

pub fn raw_cid(data: &[u8]) -> String {
    cid_for(RAW, data)
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// An address nothing listens on.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn node_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "Message": message, "Code": 0, "Type": "error" })),
    )
        .into_response()
}

#[derive(Default)]
struct NodeState {
    blocks: HashMap<String, Bytes>,
    pins: HashSet<String>,
    auth: Vec<Option<String>>,
}

/// Fake primary node. Unpinning drops the block, as if garbage collected.
#[derive(Clone, Default)]
pub struct FakeNode {
    state: Arc<Mutex<NodeState>>,
    delay: Arc<Mutex<Option<Duration>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
    pub addr: Option<SocketAddr>,
}

impl FakeNode {
    pub async fn start() -> Self {
        let mut node = FakeNode::default();
        let router = Router::new()
            .route("/api/v0/add", post(node_add))
            .route("/api/v0/cat", post(node_cat))
            .route("/api/v0/dag/put", post(node_dag_put))
            .route("/api/v0/dag/get", post(node_cat))
            .route("/api/v0/pin/add", post(node_pin_add))
            .route("/api/v0/pin/rm", post(node_pin_rm))
            .route("/api/v0/pin/ls", post(node_pin_ls))
            .with_state(node.clone());
        node.addr = Some(serve(router).await);
        node
    }

    pub fn port(&self) -> u16 {
        self.addr.unwrap().port()
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port())
    }

    pub fn multiaddr(&self) -> String {
        format!("/ip4/127.0.0.1/tcp/{}/http", self.port())
    }

    /// Slow down every `add` by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn has_block(&self, cid: &str) -> bool {
        self.state.lock().blocks.contains_key(cid)
    }

    pub fn is_pinned(&self, cid: &str) -> bool {
        self.state.lock().pins.contains(cid)
    }

    /// Authorization headers seen so far, in order.
    pub fn auth_headers(&self) -> Vec<Option<String>> {
        self.state.lock().auth.clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn record_auth(&self, headers: &HeaderMap) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.state.lock().auth.push(auth);
    }

    fn store(&self, cid: String, data: Bytes, pin: bool) {
        let mut state = self.state.lock();
        state.blocks.insert(cid.clone(), data);
        if pin {
            state.pins.insert(cid);
        }
    }
}

async fn read_file(mut multipart: Multipart) -> Option<Bytes> {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            return field.bytes().await.ok();
        }
    }
    None
}

async fn node_add(
    State(node): State<FakeNode>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    node.record_auth(&headers);
    let current = node.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    node.peak_in_flight.fetch_max(current, Ordering::SeqCst);

    let delay = *node.delay.lock();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let response = match read_file(multipart).await {
        Some(data) => {
            let cid = raw_cid(&data);
            let size = data.len();
            node.store(cid.clone(), data, true);
            Json(json!({ "Name": "file", "Hash": cid, "Size": size.to_string() })).into_response()
        }
        None => node_error("file argument 'path' is required".to_string()),
    };
    node.in_flight.fetch_sub(1, Ordering::SeqCst);
    response
}

async fn node_cat(
    State(node): State<FakeNode>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    node.record_auth(&headers);
    let arg = query.get("arg").cloned().unwrap_or_default();
    match node.state.lock().blocks.get(&arg) {
        Some(data) => data.clone().into_response(),
        None => node_error(format!("block was not found locally (offline): {}", arg)),
    }
}

async fn node_dag_put(
    State(node): State<FakeNode>,
    Query(query): Query<HashMap<String, String>>,
    multipart: Multipart,
) -> Response {
    let Some(data) = read_file(multipart).await else {
        return node_error("file argument 'object data' is required".to_string());
    };
    let value: serde_json::Value = match serde_json::from_slice(&data) {
        Ok(value) => value,
        Err(e) => return node_error(format!("failed to decode dag-json: {}", e)),
    };
    // serde_json maps sort their keys, close enough to dag-json canonical form
    let encoded = Bytes::from(serde_json::to_vec(&value).unwrap());
    let cid = cid_for(DAG_JSON, &encoded);
    let pin = query.get("pin").map(|p| p == "true").unwrap_or(false);
    node.store(cid.clone(), encoded, pin);
    Json(json!({ "Cid": { "/": cid } })).into_response()
}

async fn node_pin_add(
    State(node): State<FakeNode>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let arg = query.get("arg").cloned().unwrap_or_default();
    let mut state = node.state.lock();
    if !state.blocks.contains_key(&arg) {
        return node_error(format!("pin: block was not found locally (offline): {}", arg));
    }
    state.pins.insert(arg.clone());
    Json(json!({ "Pins": [arg] })).into_response()
}

async fn node_pin_rm(
    State(node): State<FakeNode>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let arg = query.get("arg").cloned().unwrap_or_default();
    let mut state = node.state.lock();
    if !state.pins.remove(&arg) {
        return node_error("not pinned or pinned indirectly".to_string());
    }
    state.blocks.remove(&arg);
    Json(json!({ "Pins": [arg] })).into_response()
}

async fn node_pin_ls(
    State(node): State<FakeNode>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let arg = query.get("arg").cloned().unwrap_or_default();
    if node.state.lock().pins.contains(&arg) {
        Json(json!({ "Keys": { arg: { "Type": "recursive" } } })).into_response()
    } else {
        node_error(format!("path '{}' is not pinned", arg))
    }
}

pub const PIN_TOKEN: &str = "psa-secret";

#[derive(Default)]
struct ServiceState {
    pins: HashMap<String, serde_json::Value>,
    delay: Option<Duration>,
    reject: bool,
}

/// Fake Pinning Service API.
#[derive(Clone, Default)]
pub struct FakePinService {
    state: Arc<Mutex<ServiceState>>,
    pub addr: Option<SocketAddr>,
}

impl FakePinService {
    pub async fn start() -> Self {
        let mut service = FakePinService::default();
        let router = Router::new()
            .route("/psa/pins", post(psa_add).get(psa_list))
            .route("/psa/pins/:requestid", delete(psa_delete))
            .with_state(service.clone());
        service.addr = Some(serve(router).await);
        service
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}/psa", self.addr.unwrap())
    }

    /// Hold every pin request for `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = Some(delay);
    }

    /// Answer pin requests with status `failed`.
    pub fn set_reject(&self, reject: bool) {
        self.state.lock().reject = reject;
    }

    /// Move every held request to `status`, as the service would once it
    /// starts or finishes fetching.
    pub fn set_all_status(&self, status: &str) {
        for pin in self.state.lock().pins.values_mut() {
            pin["status"] = json!(status);
        }
    }

    /// CIDs of every request still held, whatever its status.
    pub fn pinned_cids(&self) -> Vec<String> {
        self.state
            .lock()
            .pins
            .values()
            .filter_map(|p| p["pin"]["cid"].as_str().map(str::to_string))
            .collect()
    }

    pub fn config(
        &self,
        background: bool,
        on_failure: RemotePinFailurePolicy,
    ) -> RemotePinningConfig {
        RemotePinningConfig {
            enabled: true,
            service_name: "fake-psa".to_string(),
            service_endpoint: self.endpoint(),
            service_token: PIN_TOKEN.to_string(),
            background_pinning: background,
            on_failure,
        }
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", PIN_TOKEN))
        .unwrap_or(false)
}

async fn psa_add(
    State(service): State<FakePinService>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let (delay, reject) = {
        let state = service.state.lock();
        (state.delay, state.reject)
    };
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let request_id = uuid::Uuid::new_v4().to_string();
    let status = json!({
        "requestid": request_id,
        "status": if reject { "failed" } else { "queued" },
        "created": chrono::Utc::now().to_rfc3339(),
        "pin": { "cid": body["cid"], "name": body["name"] },
        "delegates": [],
    });
    if !reject {
        service
            .state
            .lock()
            .pins
            .insert(request_id, status.clone());
    }
    (StatusCode::ACCEPTED, Json(status)).into_response()
}

async fn psa_list(
    State(service): State<FakePinService>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let cid = query.get("cid").cloned().unwrap_or_default();
    // the Pinning Service API lists only pinned requests by default
    let statuses = query.get("status").map(String::as_str).unwrap_or("pinned");
    let statuses: Vec<&str> = statuses.split(',').collect();
    let results: Vec<_> = service
        .state
        .lock()
        .pins
        .values()
        .filter(|p| p["pin"]["cid"] == cid.as_str())
        .filter(|p| p["status"].as_str().is_some_and(|s| statuses.contains(&s)))
        .cloned()
        .collect();
    Json(json!({ "count": results.len(), "results": results })).into_response()
}

async fn psa_delete(
    State(service): State<FakePinService>,
    headers: HeaderMap,
    Path(request_id): Path<String>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match service.state.lock().pins.remove(&request_id) {
        Some(_) => StatusCode::ACCEPTED.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Config pointing both sessions at `node` through its multiaddr.
pub fn node_config(node: &FakeNode) -> ClientConfig {
    let mut config = ClientConfig::new(node.multiaddr());
    config.timeout = 2;
    config
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
