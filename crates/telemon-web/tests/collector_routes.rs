//! 수집 라우터 동작 검증 (`tower::ServiceExt::oneshot`).

use std::sync::{Arc, OnceLock};

use aes_gcm::aead::OsRng;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{json, Value};
use telemon_codec::{SecurityCodec, HEADER_HASH};
use telemon_core::models::metric::{MetricDto, MetricKind, MetricSample, MetricValue};
use telemon_core::ports::storage::MetricsStorage;
use telemon_storage::memory::MemStorage;
use telemon_web::{router, AppState};
use tower::ServiceExt;

const KEY: &str = "shared-secret";

fn private_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::new(&mut OsRng, 1024).unwrap())
}

fn app(codec: SecurityCodec) -> (Router, Arc<MemStorage>) {
    let storage = Arc::new(MemStorage::new());
    let state = AppState {
        storage: storage.clone(),
        codec: Arc::new(codec),
    };
    (router(state), storage)
}

fn post(uri: &str, codec: &SecurityCodec, payload: &impl serde::Serialize) -> Request<Body> {
    let encoded = codec.encode(payload).unwrap();
    let mut builder = Request::builder().method("POST").uri(uri);
    for (name, value) in encoded.headers.pairs() {
        builder = builder.header(name, value);
    }
    builder.body(Body::from(encoded.body)).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn batch() -> Vec<MetricDto> {
    vec![
        MetricSample::gauge("Alloc", 12.5).into(),
        MetricSample::counter("PollCount", 1).into(),
        MetricSample::counter("PollCount", 2).into(),
    ]
}

#[tokio::test]
async fn plain_batch_is_stored() {
    let (app, storage) = app(SecurityCodec::new().with_compression(false));
    let response = app
        .oneshot(post("/updates/", &SecurityCodec::new().with_compression(false), &batch()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        storage.get(MetricKind::Counter, "PollCount").await.unwrap(),
        MetricValue::Counter(3)
    );
}

#[tokio::test]
async fn sealed_batch_is_stored() {
    let public = RsaPublicKey::from(private_key());
    let agent = SecurityCodec::new()
        .with_integrity_key(KEY)
        .with_public_key(public);
    let (app, storage) = app(
        SecurityCodec::new()
            .with_integrity_key(KEY)
            .with_private_key(private_key().clone()),
    );

    let response = app.oneshot(post("/updates/", &agent, &batch())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        storage.get(MetricKind::Gauge, "Alloc").await.unwrap(),
        MetricValue::Gauge(12.5)
    );
}

#[tokio::test]
async fn integrity_mismatch_is_rejected_with_json_error() {
    let (app, storage) = app(SecurityCodec::new().with_integrity_key(KEY));
    let agent = SecurityCodec::new().with_integrity_key("other-secret");

    let response = app.oneshot(post("/updates/", &agent, &batch())).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["status"], 400);
    assert!(body["error"].as_str().unwrap().contains("무결성"));
    assert!(storage.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn encrypted_body_without_private_key_is_rejected() {
    let agent = SecurityCodec::new().with_public_key(RsaPublicKey::from(private_key()));
    let (app, _) = app(SecurityCodec::new());

    let response = app.oneshot(post("/updates/", &agent, &batch())).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn plaintext_body_with_private_key_is_rejected() {
    let (app, storage) = app(SecurityCodec::new().with_private_key(private_key().clone()));

    let response = app
        .oneshot(post("/updates/", &SecurityCodec::new(), &batch()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(storage.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let (app, _) = app(SecurityCodec::new());
    let empty: Vec<MetricDto> = Vec::new();
    let response = app
        .oneshot(post("/updates/", &SecurityCodec::new(), &empty))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_dto_rejects_whole_batch() {
    let (app, storage) = app(SecurityCodec::new());
    let payload = json!([
        {"id": "Alloc", "type": "gauge", "value": 1.0},
        {"id": "Broken", "type": "gauge", "delta": 1},
    ]);

    let response = app
        .oneshot(post("/updates/", &SecurityCodec::new(), &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(storage.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn single_update_returns_signed_stored_value() {
    let codec = SecurityCodec::new().with_integrity_key(KEY);
    let (app, storage) = app(SecurityCodec::new().with_integrity_key(KEY));
    storage.update_counter("PollCount", 5).await.unwrap();

    let dto = MetricDto::from(MetricSample::counter("PollCount", 2));
    let response = app.oneshot(post("/update/", &codec, &dto)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let hash = response
        .headers()
        .get(HEADER_HASH)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(codec.sign(&bytes).unwrap().unwrap(), hash);

    let stored: MetricDto = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(stored.delta, Some(7));
}

#[tokio::test]
async fn path_update_then_text_value() {
    let (app, _) = app(SecurityCodec::new());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/update/gauge/Alloc/3.25")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/value/gauge/Alloc")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&text[..], b"3.25");
}

#[tokio::test]
async fn path_update_rejects_bad_kind_and_value() {
    let (app, _) = app(SecurityCodec::new());
    for uri in ["/update/histogram/x/1", "/update/counter/x/1.5", "/update/gauge/x/abc"] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn path_update_rejects_non_finite_gauge() {
    let (app, storage) = app(SecurityCodec::new());
    for uri in ["/update/gauge/x/NaN", "/update/gauge/x/inf", "/update/gauge/x/-inf"] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
    assert!(storage.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_value_is_not_found() {
    let (app, _) = app(SecurityCodec::new());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/value/counter/Missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let query = MetricDto::query("Missing", MetricKind::Gauge);
    let response = app
        .oneshot(post("/value/", &SecurityCodec::new(), &query))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["status"], 404);
}

#[tokio::test]
async fn json_value_returns_stored_metric() {
    let (app, storage) = app(SecurityCodec::new());
    storage.update_gauge("Alloc", 9.0).await.unwrap();

    let query = MetricDto::query("Alloc", MetricKind::Gauge);
    let response = app
        .oneshot(post("/value/", &SecurityCodec::new(), &query))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body, json!({"id": "Alloc", "type": "gauge", "value": 9.0}));
}

#[tokio::test]
async fn ping_and_index() {
    let (app, storage) = app(SecurityCodec::new());
    storage.update_gauge("b", 2.0).await.unwrap();
    storage.update_counter("a", 1).await.unwrap();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(
        body_json(response).await,
        json!([
            {"id": "a", "type": "counter", "delta": 1},
            {"id": "b", "type": "gauge", "value": 2.0},
        ])
    );
}
