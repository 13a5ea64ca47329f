use adcsync_daemon::api::create_router;
use adcsync_daemon::api::rest::state::AppState;
use adcsync_daemon::{DaemonConfig, Server};
use adcsync_deployer::MockPoster;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

async fn app(poster: Arc<MockPoster>) -> (Router, AppState) {
    let server = Server::with_poster(DaemonConfig::default(), poster);
    let (state, _task) = server.start_deployer().await.unwrap();
    state.spawn_response_consumer();
    (create_router(state.clone(), true), state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_healthy_on_start() {
    let (router, _state) = app(Arc::new(MockPoster::new())).await;

    let response = router.oneshot(get("/api/v1/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn submitted_request_reaches_appliance() {
    let poster = Arc::new(MockPoster::new());
    let (router, state) = app(poster.clone()).await;
    let mut status = state.deployer.subscribe_status();

    let response = router
        .clone()
        .oneshot(post_json(
            "/api/v1/requests",
            json!({
                "event": "config_map_changed",
                "resources": { "alpha": { "class": "Tenant", "app": { "class": "Application" } } },
                "members": [{ "address": "10.0.0.7", "port": 443 }]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(body_json(response).await["request_id"]
        .as_str()
        .unwrap()
        .starts_with("req:"));

    status.wait_for(|s| s.attempts >= 1).await.unwrap();
    assert_eq!(poster.post_count(), 1);
    assert_eq!(poster.posts()[0].tenants, vec!["alpha".to_string()]);

    let response = router
        .clone()
        .oneshot(get("/api/v1/networking"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["members"][0]["address"], "10.0.0.7");

    let response = router.oneshot(get("/api/v1/status")).await.unwrap();
    let body = body_json(response).await;
    assert_eq!(body["deployer"]["applied_tenants"], json!(["alpha"]));
    assert_eq!(body["appliance"]["release"], "3.45.0-5");
}

#[tokio::test]
async fn non_object_fragment_is_rejected() {
    let poster = Arc::new(MockPoster::new());
    let (router, _state) = app(poster.clone()).await;

    let response = router
        .oneshot(post_json(
            "/api/v1/requests",
            json!({ "resources": { "alpha": [1, 2, 3] } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
    assert_eq!(poster.post_count(), 0);
}

#[tokio::test]
async fn reserved_tenant_name_is_rejected() {
    let poster = Arc::new(MockPoster::new());
    let (router, _state) = app(poster.clone()).await;

    let response = router
        .oneshot(post_json(
            "/api/v1/requests",
            json!({
                "configmaps": [{
                    "namespace": "default",
                    "name": "as3",
                    "validated": true,
                    "tenants": { "schemaVersion": { "class": "Tenant" } }
                }]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(poster.post_count(), 0);
}
