//! Integration tests for `RestClient` against a wiremock cluster.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shoal_api::{ClientOptions, Error, Query, RestClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

fn fast_job_options() -> ClientOptions {
    ClientOptions {
        max_concurrent_requests: 6,
        job_poll_interval: Duration::from_millis(10),
        job_timeout: Duration::from_millis(200),
    }
}

async fn setup_with(options: ClientOptions) -> (MockServer, RestClient) {
    let server = MockServer::start().await;
    let client = RestClient::new(
        &server.uri(),
        "admin",
        SecretString::from("netapp1!"),
        &TransportConfig::default(),
        options,
    )
    .unwrap();
    (server, client)
}

async fn setup() -> (MockServer, RestClient) {
    setup_with(ClientOptions::default()).await
}

// ── Record envelopes ────────────────────────────────────────────────

#[tokio::test]
async fn get_record_returns_none_for_zero_records() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/storage/volumes"))
        .and(query_param("name", "missing"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"num_records": 0, "records": []})),
        )
        .mount(&server)
        .await;

    let mut query = Query::new();
    query.set("name", "missing");
    let record = client.get_record("storage/volumes", &query).await.unwrap();
    assert!(record.is_none());
}

#[tokio::test]
async fn get_record_returns_single_match() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/storage/volumes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "num_records": 1,
            "records": [{"name": "vol1", "uuid": "028baa66-41bd-11e9-81d5-00a0986138f7"}]
        })))
        .mount(&server)
        .await;

    let record = client
        .get_record("storage/volumes", &Query::new())
        .await
        .unwrap()
        .expect("one record");
    assert_eq!(record["name"], "vol1");
}

#[tokio::test]
async fn get_record_rejects_multiple_matches() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/storage/volumes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "num_records": 2,
            "records": [{"name": "a"}, {"name": "b"}]
        })))
        .mount(&server)
        .await;

    let err = client
        .get_record("storage/volumes", &Query::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TooManyRecords { count: 2 }));
}

// ── Error translation ───────────────────────────────────────────────

#[tokio::test]
async fn missing_svm_translates_to_reference_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/storage/volumes"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": "2621462",
                "message": "SVM \"carchi-test\" does not exist."
            }
        })))
        .mount(&server)
        .await;

    let err = client
        .create("storage/volumes", &json!({"name": "lunTest"}))
        .await
        .unwrap_err();
    match err {
        Error::ReferenceNotFound { code, message } => {
            assert_eq!(code, 2_621_462);
            assert!(message.contains("carchi-test"));
        }
        other => panic!("expected ReferenceNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn unauthorized_translates_to_authentication() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/cluster"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.get_object("cluster", &Query::new()).await.unwrap_err();
    assert!(matches!(err, Error::Authentication { status: 401 }));
}

// ── Version probe ───────────────────────────────────────────────────

#[tokio::test]
async fn version_is_fetched_once_and_cached() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/cluster"))
        .and(query_param("fields", "version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "laurentncluster-2",
            "version": {"generation": 9, "major": 11, "minor": 1, "full": "NetApp Release 9.11.1"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let first = client.version().await.unwrap();
    let second = client.version().await.unwrap();
    assert_eq!(first, second);
    assert_eq!((first.generation, first.major, first.minor), (9, 11, 1));
}

// ── Async jobs ──────────────────────────────────────────────────────

#[tokio::test]
async fn create_waits_on_returned_job() {
    let (server, client) = setup_with(fast_job_options()).await;
    let job_uuid = "5f1b3a22-0000-1111-2222-333344445555";

    Mock::given(method("POST"))
        .and(path("/api/storage/volumes"))
        .respond_with(
            ResponseTemplate::new(202).set_body_json(json!({"job": {"uuid": job_uuid}})),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/api/cluster/jobs/{job_uuid}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"uuid": job_uuid, "state": "success"})),
        )
        .mount(&server)
        .await;

    let created = client
        .create("storage/volumes", &json!({"name": "vol1"}))
        .await
        .unwrap();
    assert!(created.is_none());
}

#[tokio::test]
async fn failed_job_surfaces_translated_code() {
    let (server, client) = setup_with(fast_job_options()).await;
    let job_uuid = "9a9a9a9a-0000-1111-2222-333344445555";

    Mock::given(method("POST"))
        .and(path("/api/storage/volumes"))
        .respond_with(
            ResponseTemplate::new(202).set_body_json(json!({"job": {"uuid": job_uuid}})),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/api/cluster/jobs/{job_uuid}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "uuid": job_uuid,
            "state": "failure",
            "error": {"code": "2621462", "message": "SVM not found"}
        })))
        .mount(&server)
        .await;

    let err = client
        .create("storage/volumes", &json!({"name": "vol1"}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ReferenceNotFound { code: 2_621_462, .. }));
}

#[tokio::test]
async fn job_stuck_running_times_out() {
    let (server, client) = setup_with(fast_job_options()).await;
    let job_uuid = "77777777-0000-1111-2222-333344445555";

    Mock::given(method("GET"))
        .and(path(format!("/api/cluster/jobs/{job_uuid}")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"uuid": job_uuid, "state": "running"})),
        )
        .mount(&server)
        .await;

    let err = client.wait_on_job(job_uuid).await.unwrap_err();
    assert!(matches!(err, Error::JobTimeout { .. }));
}

// ── Mutating query defaults ─────────────────────────────────────────

#[tokio::test]
async fn mutating_calls_set_return_timeout() {
    let (server, client) = setup().await;

    Mock::given(method("PATCH"))
        .and(path("/api/storage/volumes/uuid-1"))
        .and(query_param("return_timeout", "60"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client
        .update("storage/volumes/uuid-1", &json!({"comment": "hi"}))
        .await
        .unwrap();
}
