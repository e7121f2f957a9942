//! The axum router: wires every external path through the
//! admission chain except the handful of plain health/doc endpoints that
//! sit in front of it, grounded on
//! `examples/axum-resilient-kv-store`'s `Router::new().route(...).with_state(state)`
//! shape, with an outer `tower::ServiceBuilder` stack (request tracing, a
//! hard per-request timeout) grounded on `lexe-api`'s
//! `middleware_stack`/`HandleErrorLayer` pattern for wiring `tower-http`
//! layers in front of an axum router.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{OriginalUri, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{any, get};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_http::timeout::TimeoutLayer;

use crate::error::DownstreamError;
use crate::pipeline::AdmissionPipeline;

/// Hard ceiling on how long a request may sit in the router's middleware
/// stack before the timeout layer gives up on it. Independent of any
/// per-service circuit breaker timeout, which only bounds the handler call
/// once the request has made it through admission.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AdmissionPipeline>,
}

pub fn build_router(pipeline: Arc<AdmissionPipeline>) -> Router {
    let state = AppState { pipeline };

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/docs", get(docs))
        .route("/openapi.json", get(openapi))
        .route("/mcp", any(ingress))
        .route("/api/v1/*rest", any(ingress))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    REQUEST_TIMEOUT,
                )),
        )
}

async fn health(State(state): State<AppState>, headers: HeaderMap) -> Response {
    state
        .pipeline
        .admit(Method::GET, "/health", &headers, &[], |_body: Vec<u8>| async {
            Ok(Json(serde_json::json!({ "status": "ok" })).into_response())
        })
        .await
}

async fn metrics(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let pipeline = Arc::clone(&state.pipeline);
    state
        .pipeline
        .admit(Method::GET, "/metrics", &headers, &[], move |_body: Vec<u8>| async move {
            let text = pipeline.metrics().snapshot().to_prometheus_text();
            Ok(([("content-type", "text/plain; version=0.0.4")], text).into_response())
        })
        .await
}

async fn docs() -> Response {
    (StatusCode::OK, "see openapi.json").into_response()
}

async fn openapi() -> Response {
    Json(serde_json::json!({ "openapi": "3.0.0", "info": { "title": "admission-gate", "version": "0.1.0" } })).into_response()
}

/// The catch-all ingress path for `/mcp` and `/api/v1/*`: a stand-in
/// downstream handler the real application is expected to replace. It
/// demonstrates the full chain without asserting an opinion about the
/// business payload shape.
async fn ingress(
    State(state): State<AppState>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let raw_path = uri.path_and_query().map(|p| p.as_str()).unwrap_or(uri.path()).to_string();
    state
        .pipeline
        .admit(method, &raw_path, &headers, &body, move |sanitized_body: Vec<u8>| async move {
            if sanitized_body.is_empty() {
                return Ok(Json(serde_json::json!({ "accepted": true })).into_response());
            }
            match serde_json::from_slice::<serde_json::Value>(&sanitized_body) {
                Ok(value) => Ok(Json(serde_json::json!({ "accepted": true, "echo": value })).into_response()),
                Err(_) => Err(DownstreamError::new(StatusCode::UNPROCESSABLE_ENTITY, "body is not valid JSON")),
            }
        })
        .await
}
