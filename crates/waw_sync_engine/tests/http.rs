//! HTTP tests for the reqwest-backed remote.
//!
//! The blocking client must not run on an executor thread, so each test
//! drives it from `spawn_blocking`.

use serde_json::json;
use std::time::Duration;
use tempfile::tempdir;
use waw_profile_store::MemoryProfileStore;
use waw_sync_engine::{
    HttpRemote, MarkerStore, MissingChecksumPolicy, ModelOutcome, ModelReconciler, ProfileOutcome,
    ProfileReconciler, ReqwestClient, RemoteModelClient, RemoteProfileClient, SyncError,
};
use waw_sync_protocol::{ContentHash, LogicalTimestamp, ProfilePayload};
use waw_testkit::sample_profile;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn http_remote(uri: String, timeout: Duration) -> HttpRemote<ReqwestClient> {
    HttpRemote::new(uri, ReqwestClient::new(timeout).unwrap())
}

fn upsert_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": "ok",
        "count": 1,
        "stored": {
            "id": "user-1",
            "name": "Test User",
            "email": "test@example.com",
            "phone": "+15550100",
            "updated_at": "1970-01-01T00:16:40Z"
        }
    }))
}

#[tokio::test(flavor = "multi_thread")]
async fn profile_is_posted_as_json_with_integer_timestamp() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/profile"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "id": "user-1",
            "name": "Test User",
            "email": "test@example.com",
            "phone": "+15550100",
            "updated_at": 1000
        })))
        .respond_with(upsert_ok())
        .expect(1)
        .mount(&server)
        .await;

    let uri = format!("{}/", server.uri());
    let (outcome, marker) = tokio::task::spawn_blocking(move || {
        let dir = tempdir().unwrap();
        let reconciler = ProfileReconciler::new(
            MemoryProfileStore::with_profile(sample_profile("user-1", 1000)),
            http_remote(uri, Duration::from_secs(5)),
            MarkerStore::new(dir.path().join("state.json")),
        );
        let first = reconciler.reconcile();
        // Second cycle is skipped, so the mock still sees exactly one call.
        let second = reconciler.reconcile();
        assert!(matches!(second, ProfileOutcome::Skipped(_)));
        (first, reconciler.marker().load().unwrap())
    })
    .await
    .unwrap();

    assert!(matches!(outcome, ProfileOutcome::Pushed { .. }), "{outcome}");
    assert_eq!(marker, Some(LogicalTimestamp::from_secs(1000)));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_is_rejection() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/profile"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let outcome = tokio::task::spawn_blocking(move || {
        let dir = tempdir().unwrap();
        let reconciler = ProfileReconciler::new(
            MemoryProfileStore::with_profile(sample_profile("user-1", 1000)),
            http_remote(uri, Duration::from_secs(5)),
            MarkerStore::new(dir.path().join("state.json")),
        );
        let outcome = reconciler.reconcile();
        assert!(!dir.path().join("state.json").exists());
        outcome
    })
    .await
    .unwrap();

    match outcome {
        ProfileOutcome::Failed(SyncError::RemoteRejection { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "Internal Server Error");
        }
        other => panic!("unexpected {other}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_remote_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/profile"))
        .respond_with(upsert_ok().set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = tokio::task::spawn_blocking(move || {
        let payload = ProfilePayload {
            id: "user-1".into(),
            name: None,
            email: None,
            phone: None,
            updated_at: LogicalTimestamp::from_secs(1000),
        };
        http_remote(uri, Duration::from_millis(200)).push_profile(&payload)
    })
    .await
    .unwrap();

    assert!(matches!(result, Err(SyncError::Timeout)), "{result:?}");
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_remote_is_retryable_transport_error() {
    // Bind and drop a listener to get a port nobody listens on.
    let uri = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://{}", listener.local_addr().unwrap())
    };

    let result = tokio::task::spawn_blocking(move || {
        http_remote(uri, Duration::from_secs(2)).fetch_latest().map(|d| d.descriptor)
    })
    .await
    .unwrap();

    match result {
        Err(e @ SyncError::Transport { .. }) => assert!(e.is_retryable()),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_delete_maps_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/profile/user-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "deleted", "id": "user-1"})))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/profile/ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Profile not found"})))
        .mount(&server)
        .await;

    let uri = server.uri();
    let (deleted, missing) = tokio::task::spawn_blocking(move || {
        let remote = http_remote(uri, Duration::from_secs(5));
        (
            remote.delete_profile("user-1").unwrap(),
            remote.delete_profile("ghost").unwrap(),
        )
    })
    .await
    .unwrap();

    assert!(deleted);
    assert!(!missing);
}

#[tokio::test(flavor = "multi_thread")]
async fn model_download_verified_and_installed() {
    let body = vec![0xABu8; 64 * 1024 + 3];
    let hash = ContentHash::of_bytes(&body);

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/model/latest"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Model-SHA256", hash.as_str())
                .set_body_bytes(body.clone()),
        )
        .mount(&server)
        .await;

    let uri = server.uri();
    let expected = hash.clone();
    let (first, second, installed) = tokio::task::spawn_blocking(move || {
        let dir = tempdir().unwrap();
        let reconciler = ModelReconciler::new(
            http_remote(uri, Duration::from_secs(5)),
            dir.path().join("models").join("model.bin"),
        );
        let first = reconciler.reconcile();
        let second = reconciler.reconcile();
        let installed = std::fs::read(reconciler.artifact_path()).unwrap();
        (first, second, installed)
    })
    .await
    .unwrap();

    match first {
        ModelOutcome::Updated { sha256, verified } => {
            assert_eq!(sha256, expected);
            assert!(verified);
        }
        other => panic!("unexpected {other}"),
    }
    assert!(matches!(second, ModelOutcome::UpToDate));
    assert_eq!(installed, body);
}

#[tokio::test(flavor = "multi_thread")]
async fn model_hash_mismatch_keeps_artifact() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/model/latest"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Model-SHA256", ContentHash::of_bytes(b"model v2").as_str())
                .set_body_bytes(b"tampered".to_vec()),
        )
        .mount(&server)
        .await;

    let uri = server.uri();
    let (outcome, artifact) = tokio::task::spawn_blocking(move || {
        let dir = tempdir().unwrap();
        let artifact = dir.path().join("model.bin");
        std::fs::write(&artifact, b"model v1").unwrap();
        let reconciler = ModelReconciler::new(http_remote(uri, Duration::from_secs(5)), &artifact);
        let outcome = reconciler.reconcile();
        assert!(reconciler.staging_files().unwrap().is_empty());
        (outcome, std::fs::read(&artifact).unwrap())
    })
    .await
    .unwrap();

    assert!(matches!(outcome, ModelOutcome::VerificationFailed { .. }));
    assert_eq!(artifact, b"model v1");
}

#[tokio::test(flavor = "multi_thread")]
async fn model_without_header_follows_policy() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/model/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"unsigned".to_vec()))
        .mount(&server)
        .await;

    let uri = server.uri();
    let (skip, replace) = tokio::task::spawn_blocking(move || {
        let dir = tempdir().unwrap();
        let artifact = dir.path().join("model.bin");

        let skipping = ModelReconciler::new(http_remote(uri.clone(), Duration::from_secs(5)), &artifact)
            .with_missing_checksum(MissingChecksumPolicy::Skip);
        let skip = skipping.reconcile();
        assert!(!artifact.exists());

        let replacing = ModelReconciler::new(http_remote(uri, Duration::from_secs(5)), &artifact);
        let replace = replacing.reconcile();
        assert_eq!(std::fs::read(&artifact).unwrap(), b"unsigned");
        (skip, replace)
    })
    .await
    .unwrap();

    assert!(matches!(skip, ModelOutcome::UnverifiableSkipped));
    assert!(matches!(replace, ModelOutcome::Updated { verified: false, .. }));
}
