//! Integration tests for add across the node, the pinning service and S3

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use ipfs_client::prelude::*;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;

use common::{node_config, unreachable_url, FakeNode, FakePinService};

#[tokio::test]
async fn test_foreground_pin_and_s3_upload() {
    common::init_tracing();
    let node = FakeNode::start().await;
    let service = FakePinService::start().await;
    let store = Arc::new(InMemory::new());

    let mut config = node_config(&node);
    config.remote_pinning = service.config(false, RemotePinFailurePolicy::Surface);
    let client = IpfsClient::connect(config)
        .unwrap()
        .with_object_store(store.clone());

    let receipt = client.add_str("replicated").await.unwrap();
    assert_eq!(receipt.state, SagaState::Committed);
    assert!(!receipt.is_degraded());
    assert!(!receipt.pin_backgrounded);

    let status = receipt.remote_pin.as_ref().unwrap();
    assert_eq!(status.pin.cid, receipt.cid.as_str());
    assert_eq!(status.status, PinState::Queued);
    assert_eq!(service.pinned_cids(), vec![receipt.cid.to_string()]);

    let object = store
        .get(&ObjectPath::from(receipt.cid.as_str()))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(object, Bytes::from_static(b"replicated"));
}

#[tokio::test]
async fn test_unreachable_pin_service_degrades() {
    let node = FakeNode::start().await;

    let mut config = node_config(&node);
    config.remote_pinning = RemotePinningConfig {
        enabled: true,
        service_name: "down".to_string(),
        service_endpoint: unreachable_url().await,
        service_token: "t".to_string(),
        background_pinning: false,
        on_failure: RemotePinFailurePolicy::Degrade,
    };
    let client = IpfsClient::connect(config).unwrap();

    let receipt = client.add_str("still stored").await.unwrap();
    assert!(receipt.is_degraded());
    assert!(matches!(
        receipt.shortfalls.as_slice(),
        [Shortfall::RemotePin(RemotePinError::Transport(_))]
    ));
    assert_eq!(client.cat_text(&receipt.cid).await.unwrap(), "still stored");
}

#[tokio::test]
async fn test_pin_failure_surfaces_and_keeps_local_pin() {
    let node = FakeNode::start().await;
    let service = FakePinService::start().await;
    service.set_reject(true);

    let mut config = node_config(&node);
    config.remote_pinning = service.config(false, RemotePinFailurePolicy::Surface);
    let client = IpfsClient::connect(config).unwrap();

    let err = client.add_str("surface").await.unwrap_err();
    let Error::RemotePin {
        cid,
        source,
        shortfalls,
    } = err
    else {
        panic!("expected a remote pin error");
    };
    assert!(matches!(source, RemotePinError::Rejected { .. }));
    assert!(shortfalls.is_empty());
    assert!(node.is_pinned(cid.as_str()));
}

#[tokio::test]
async fn test_pin_failure_still_uploads_to_s3() {
    let node = FakeNode::start().await;
    let service = FakePinService::start().await;
    service.set_reject(true);
    let store = Arc::new(InMemory::new());

    let mut config = node_config(&node);
    config.remote_pinning = service.config(false, RemotePinFailurePolicy::Surface);
    let client = IpfsClient::connect(config)
        .unwrap()
        .with_object_store(store.clone());

    let err = client.add_str("kept in s3").await.unwrap_err();
    let Error::RemotePin {
        cid, shortfalls, ..
    } = err
    else {
        panic!("expected a remote pin error");
    };
    assert!(shortfalls.is_empty());
    assert!(node.is_pinned(cid.as_str()));

    let object = store
        .get(&ObjectPath::from(cid.as_str()))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(object, Bytes::from_static(b"kept in s3"));
}

#[tokio::test]
async fn test_pin_failure_reports_s3_shortfall() {
    let node = FakeNode::start().await;
    let service = FakePinService::start().await;
    service.set_reject(true);

    let mut config = node_config(&node);
    config.remote_pinning = service.config(false, RemotePinFailurePolicy::Surface);
    config.s3 = S3Config {
        enabled: true,
        endpoint_url: unreachable_url().await,
        bucket_name: "replicas".to_string(),
        access_key: "minio".to_string(),
        secret_key: "minio123".to_string(),
    };
    let client = IpfsClient::connect(config).unwrap();

    let err = client.add_str("nowhere to go").await.unwrap_err();
    let Error::RemotePin { shortfalls, .. } = err else {
        panic!("expected a remote pin error");
    };
    assert!(matches!(shortfalls.as_slice(), [Shortfall::S3Upload(_)]));
}

#[tokio::test]
async fn test_pin_failure_rolls_back_local_pin() {
    let node = FakeNode::start().await;
    let service = FakePinService::start().await;
    service.set_reject(true);

    let store = Arc::new(InMemory::new());

    let mut config = node_config(&node);
    config.remote_pinning = service.config(false, RemotePinFailurePolicy::Rollback);
    let client = IpfsClient::connect(config)
        .unwrap()
        .with_object_store(store.clone());

    let err = client.add_str("rollback").await.unwrap_err();
    let Error::RemotePin { cid, .. } = err else {
        panic!("expected a remote pin error");
    };
    assert!(!node.is_pinned(cid.as_str()));
    assert!(store.head(&ObjectPath::from(cid.as_str())).await.is_err());
}

#[tokio::test]
async fn test_background_pin_does_not_block_add() {
    let node = FakeNode::start().await;
    let service = FakePinService::start().await;
    service.set_delay(Duration::from_secs(3));

    let mut config = node_config(&node);
    config.timeout = 1;
    config.remote_pinning = service.config(true, RemotePinFailurePolicy::Surface);
    let client = IpfsClient::connect(config).unwrap();
    let mut events = client.subscribe();

    let started = Instant::now();
    let receipt = client.add_bytes(&b"x"[..]).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(900));
    assert!(receipt.pin_backgrounded);
    assert!(receipt.remote_pin.is_none());
    assert!(!receipt.is_degraded());

    // the timeout shows up only on the event channel
    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, PinEvent::Failed { .. }));
    assert_eq!(event.cid(), &receipt.cid);
}

#[tokio::test]
async fn test_background_pin_success_event() {
    let node = FakeNode::start().await;
    let service = FakePinService::start().await;

    let mut config = node_config(&node);
    config.remote_pinning = service.config(true, RemotePinFailurePolicy::Surface);
    let client = IpfsClient::connect(config).unwrap();
    let mut events = client.subscribe();

    let receipt = client.add_str("background").await.unwrap();
    let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(event, PinEvent::Pinned { ref cid, .. } if *cid == receipt.cid));
    assert_eq!(service.pinned_cids(), vec![receipt.cid.to_string()]);
}

#[tokio::test]
async fn test_s3_failure_is_reported_separately() {
    let node = FakeNode::start().await;

    let mut config = node_config(&node);
    config.s3 = S3Config {
        enabled: true,
        endpoint_url: unreachable_url().await,
        bucket_name: "ipfs".to_string(),
        access_key: "minio".to_string(),
        secret_key: "minio123".to_string(),
    };
    let client = IpfsClient::connect(config).unwrap();

    let receipt = client.add_str("no bucket").await.unwrap();
    assert_eq!(receipt.state, SagaState::Committed);
    assert!(matches!(
        receipt.shortfalls.as_slice(),
        [Shortfall::S3Upload(S3Error::Upload { .. })]
    ));
    assert!(node.is_pinned(receipt.cid.as_str()));
}

#[tokio::test]
async fn test_dag_put_replicates() {
    let node = FakeNode::start().await;
    let store = Arc::new(InMemory::new());
    let client = IpfsClient::connect(node_config(&node))
        .unwrap()
        .with_object_store(store.clone());

    let receipt = client
        .dag_put_json(&serde_json::json!({ "k": "v" }), true)
        .await
        .unwrap();
    assert!(store
        .head(&ObjectPath::from(receipt.cid.as_str()))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_unpinned_dag_put_is_not_replicated() {
    let node = FakeNode::start().await;
    let service = FakePinService::start().await;
    let store = Arc::new(InMemory::new());

    let mut config = node_config(&node);
    config.remote_pinning = service.config(false, RemotePinFailurePolicy::Surface);
    let client = IpfsClient::connect(config)
        .unwrap()
        .with_object_store(store.clone());

    let receipt = client
        .dag_put_json(&serde_json::json!({ "scratch": true }), false)
        .await
        .unwrap();
    assert_eq!(receipt.state, SagaState::LocalAdded);
    assert!(receipt.remote_pin.is_none());
    assert!(!node.is_pinned(receipt.cid.as_str()));
    assert!(service.pinned_cids().is_empty());
    assert!(store
        .head(&ObjectPath::from(receipt.cid.as_str()))
        .await
        .is_err());
}
