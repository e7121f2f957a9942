//! End-to-end admission-chain scenarios, run against [`AdmissionPipeline`]
//! directly rather than over HTTP (the router is a thin axum wrapper around
//! the same `admit` call). Mirrors the concrete scenarios the stage crates'
//! own unit tests build toward, but exercises the full
//! sanitizer -> version -> rate limiter -> circuit breaker -> throttler chain
//! together.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::IntoResponse;
use tokio::sync::Notify;

use admission_circuitbreaker::{BackoffStrategy, CircuitBreakerConfig};
use admission_core::MetricsBus;
use admission_gate::{AdmissionPipeline, DownstreamError, GateConfig};
use admission_throttler::ThrottlerConfig;

fn headers_with(pairs: &[(&str, &str)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        headers.insert(HeaderName::from_bytes(name.as_bytes()).unwrap(), HeaderValue::from_str(value).unwrap());
    }
    headers
}

/// S3 - circuit open then recover: a service failing past its threshold is
/// rejected without reaching the handler, then admits again once the reset
/// timeout elapses and a half-open probe succeeds.
#[tokio::test]
async fn circuit_opens_after_threshold_and_recovers_after_reset_timeout() {
    let breaker_config = CircuitBreakerConfig::builder("default")
        .failure_threshold(3)
        .success_threshold(1)
        .reset_timeout(Duration::from_millis(50))
        .backoff_strategy(BackoffStrategy::Constant)
        .build();
    let config = GateConfig::builder().service_breaker("default", breaker_config).build();
    let pipeline = AdmissionPipeline::new(config, MetricsBus::new());

    let calls = Arc::new(AtomicUsize::new(0));
    let should_fail = Arc::new(std::sync::atomic::AtomicBool::new(true));

    async fn run(
        pipeline: &AdmissionPipeline,
        calls: Arc<AtomicUsize>,
        should_fail: Arc<std::sync::atomic::AtomicBool>,
    ) -> axum::response::Response {
        let headers = headers_with(&[]);
        pipeline
            .admit(Method::POST, "/api/v1/items", &headers, b"{}", move |_body: Vec<u8>| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if should_fail.load(Ordering::SeqCst) {
                    Err(DownstreamError::internal("boom"))
                } else {
                    Ok(StatusCode::OK.into_response())
                }
            })
            .await
    }

    for _ in 0..3 {
        let response = run(&pipeline, Arc::clone(&calls), Arc::clone(&should_fail)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3, "all 3 failures should reach the handler");

    let response = run(&pipeline, Arc::clone(&calls), Arc::clone(&should_fail)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE, "breaker should now be open");
    assert_eq!(calls.load(Ordering::SeqCst), 3, "the open breaker must not invoke the handler");

    tokio::time::sleep(Duration::from_millis(80)).await;
    should_fail.store(false, Ordering::SeqCst);

    let response = run(&pipeline, Arc::clone(&calls), Arc::clone(&should_fail)).await;
    assert_eq!(response.status(), StatusCode::OK, "half-open probe should succeed and close the breaker");
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    let response = run(&pipeline, calls, should_fail).await;
    assert_eq!(response.status(), StatusCode::OK, "breaker should stay closed after recovery");
}

/// The rate-limit janitor sweeps idle windows on its own schedule, without
/// any request needing to trigger the sweep.
#[tokio::test(start_paused = true)]
async fn rate_limit_janitor_runs_without_a_driving_request() {
    let config = GateConfig::builder()
        .rate_limit_janitor_interval(Duration::from_millis(10))
        .build();
    let pipeline = Arc::new(AdmissionPipeline::new(config, MetricsBus::new()));

    let headers = headers_with(&[]);
    let response = pipeline
        .admit(Method::GET, "/api/v1/janitor", &headers, &[], |_body: Vec<u8>| async {
            Ok(StatusCode::OK.into_response())
        })
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let janitor = tokio::spawn(Arc::clone(&pipeline).run_rate_limit_janitor());
    tokio::time::advance(Duration::from_millis(35)).await;
    janitor.abort();
}

/// S5 - sanitizer blocks SQLi: the handler is never invoked when the body
/// carries an injection pattern.
#[tokio::test]
async fn sanitizer_blocks_sql_injection_before_reaching_the_handler() {
    let pipeline = AdmissionPipeline::new(GateConfig::builder().build(), MetricsBus::new());
    let handler_invoked = Arc::new(AtomicUsize::new(0));
    let headers = headers_with(&[("content-type", "application/json")]);
    let body = br#"{"q":"'; DROP TABLE users --"}"#;

    let invoked = Arc::clone(&handler_invoked);
    let response = pipeline
        .admit(Method::POST, "/api/v1/x", &headers, body, move |_body: Vec<u8>| async move {
            invoked.fetch_add(1, Ordering::SeqCst);
            Ok(StatusCode::OK.into_response())
        })
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(handler_invoked.load(Ordering::SeqCst), 0, "downstream handler must not run");
}

/// Invariant 5 (priority non-inversion), exercised through the full
/// pipeline: once a critical request (derived from the internal-service
/// header, same as the health/metrics paths) is queued behind a single busy
/// worker, it is dequeued ahead of any normal-priority request still
/// waiting, even though it arrived later.
#[tokio::test]
async fn critical_requests_preempt_queued_normal_requests() {
    let config = GateConfig::builder()
        .throttler(ThrottlerConfig::builder().worker_count(1).queue_capacity(32).build())
        .build();
    let pipeline = Arc::new(AdmissionPipeline::new(config, MetricsBus::new()));

    let order = Arc::new(tokio::sync::Mutex::new(Vec::<&'static str>::new()));
    let release_warmup = Arc::new(Notify::new());

    let warmup_pipeline = Arc::clone(&pipeline);
    let warmup_release = Arc::clone(&release_warmup);
    let warmup = tokio::spawn(async move {
        let headers = headers_with(&[]);
        warmup_pipeline
            .admit(Method::GET, "/api/v1/warmup", &headers, &[], move |_body: Vec<u8>| async move {
                warmup_release.notified().await;
                Ok(StatusCode::OK.into_response())
            })
            .await
    });

    // Give the single worker a chance to pick up the warm-up job before the
    // rest are enqueued behind it.
    tokio::time::sleep(Duration::from_millis(30)).await;

    let mut normals = Vec::new();
    for _ in 0..5 {
        let pipeline = Arc::clone(&pipeline);
        let order = Arc::clone(&order);
        normals.push(tokio::spawn(async move {
            let headers = headers_with(&[]);
            pipeline
                .admit(Method::GET, "/api/v1/normal", &headers, &[], move |_body: Vec<u8>| async move {
                    order.lock().await.push("normal");
                    Ok(StatusCode::OK.into_response())
                })
                .await
        }));
    }

    let critical_pipeline = Arc::clone(&pipeline);
    let critical_order = Arc::clone(&order);
    let critical = tokio::spawn(async move {
        let headers = headers_with(&[("x-internal-service", "true")]);
        critical_pipeline
            .admit(Method::GET, "/api/v1/critical", &headers, &[], move |_body: Vec<u8>| async move {
                critical_order.lock().await.push("critical");
                Ok(StatusCode::OK.into_response())
            })
            .await
    });

    tokio::time::sleep(Duration::from_millis(30)).await;
    release_warmup.notify_waiters();

    warmup.await.unwrap();
    critical.await.unwrap();
    for handle in normals {
        handle.await.unwrap();
    }

    let order = order.lock().await;
    assert_eq!(order.first(), Some(&"critical"), "critical must run before any queued normal request: {order:?}");
}
