// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Integration tests for the portal gate service.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    routing::post,
    Router,
};
use chrono::Duration;
use portal_gate::{
    clock::{Clock, ManualClock},
    config::{Config, RateLimitConfig, RuleConfig, APPLICATION, SIGN_IN},
    handlers::{router, throttled, AppState, CheckResponse, GuardResponse, Throttle, RATE_LIMIT_REMAINING},
    limiter::{RateLimitRule, RateLimiter},
    metrics::GateMetrics,
    roles::PortalRole,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_test::assert_ok;
use tower::ServiceExt;

fn test_config() -> Config {
    Config {
        rate_limit: RateLimitConfig {
            sign_in: RuleConfig {
                limit: 3,
                window_ms: 1000,
            },
            ..Default::default()
        },
        ..Default::default()
    }
}

fn app_with_clock() -> (Router, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::default());
    let limiter = RateLimiter::with_clock(clock.clone());
    let metrics = GateMetrics::new().unwrap();
    let state = AppState::new(test_config(), limiter, Some(metrics)).unwrap();
    (router(Arc::new(state)), clock)
}

fn post_json(uri: &str, body: Value, forwarded_for: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(ip) = forwarded_for {
        builder = builder.header("x-forwarded-for", ip);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[test]
fn test_default_config_validates() {
    assert_ok!(Config::default().validate());
    assert_ok!(test_config().validate());
}

#[tokio::test]
async fn test_health() {
    let (app, _clock) = app_with_clock();
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "portal-gate");
}

#[tokio::test]
async fn test_check_counts_down_and_resets() {
    let (app, clock) = app_with_clock();
    let request = || post_json("/check", json!({ "namespace": SIGN_IN }), Some("1.2.3.4, 5.6.7.8"));

    for expected in [2, 1, 0] {
        let response = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: CheckResponse = body_json(response).await;
        assert!(body.allowed);
        assert_eq!(body.remaining, expected);
        assert!(body.retry_after_secs.is_none());
    }

    let response = app.clone().oneshot(request()).await.unwrap();
    let body: CheckResponse = body_json(response).await;
    assert!(!body.allowed);
    assert_eq!(body.remaining, 0);
    assert_eq!(body.retry_after_secs, Some(1));
    assert_eq!(body.reset_at, clock.now() + Duration::milliseconds(1000));

    clock.advance(Duration::milliseconds(1000));
    let response = app.clone().oneshot(request()).await.unwrap();
    let body: CheckResponse = body_json(response).await;
    assert!(body.allowed);
    assert_eq!(body.remaining, 2);
}

#[tokio::test]
async fn test_check_namespaces_are_independent() {
    let (app, _clock) = app_with_clock();

    for _ in 0..3 {
        app.clone()
            .oneshot(post_json("/check", json!({ "namespace": SIGN_IN, "key": "10.0.0.1" }), None))
            .await
            .unwrap();
    }

    let response = app
        .clone()
        .oneshot(post_json("/check", json!({ "namespace": APPLICATION, "key": "10.0.0.1" }), None))
        .await
        .unwrap();
    let body: CheckResponse = body_json(response).await;
    assert!(body.allowed);
    assert_eq!(body.remaining, 2);
}

#[tokio::test]
async fn test_check_trims_caller_key() {
    let (app, _clock) = app_with_clock();

    for (key, expected) in [(" 10.0.0.7", 2), ("10.0.0.7", 1), ("10.0.0.7\t", 0)] {
        let response = app
            .clone()
            .oneshot(post_json("/check", json!({ "namespace": SIGN_IN, "key": key }), None))
            .await
            .unwrap();
        let body: CheckResponse = body_json(response).await;
        assert!(body.allowed, "{key:?}");
        assert_eq!(body.remaining, expected, "{key:?}");
    }

    let response = app
        .oneshot(post_json("/check", json!({ "namespace": SIGN_IN, "key": "10.0.0.7 " }), None))
        .await
        .unwrap();
    let body: CheckResponse = body_json(response).await;
    assert!(!body.allowed);
}

#[tokio::test]
async fn test_check_rejects_unknown_namespace() {
    let (app, _clock) = app_with_clock();
    let response = app
        .oneshot(post_json("/check", json!({ "namespace": "journals" }), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = body_json(response).await;
    assert_eq!(body["code"], "UNKNOWN_NAMESPACE");
}

#[tokio::test]
async fn test_guard_redirects() {
    let (app, _clock) = app_with_clock();

    let cases = [
        (json!({ "portal": "admin", "user_id": "u1", "role": "admin" }), true, None),
        (json!({ "portal": "mentor", "user_id": "u2", "role": "faculty" }), true, None),
        (json!({ "portal": "admin", "user_id": "u3", "role": "mentor" }), false, Some("/mentor")),
        (json!({ "portal": "mentor", "user_id": "u4", "role": "Admin" }), false, Some("/learner")),
        (json!({ "portal": "learner", "user_id": "u5" }), true, None),
        (json!({ "portal": "learner" }), false, Some("/login")),
    ];

    for (body, allowed, redirect) in cases {
        let response = app.clone().oneshot(post_json("/guard", body.clone(), None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let verdict: GuardResponse = body_json(response).await;
        assert_eq!(verdict.allowed, allowed, "{body}");
        assert_eq!(verdict.redirect_to.as_deref(), redirect, "{body}");
    }
}

#[tokio::test]
async fn test_guard_reports_resolved_portal() {
    let (app, _clock) = app_with_clock();
    let response = app
        .oneshot(post_json(
            "/guard",
            json!({ "portal": "learner", "user_id": "u1", "email": "m@example.edu", "role": "mentor" }),
            None,
        ))
        .await
        .unwrap();
    let verdict: GuardResponse = body_json(response).await;
    assert_eq!(verdict.portal, Some(PortalRole::Mentor));
}

#[tokio::test]
async fn test_guard_rejects_unknown_portal() {
    let (app, _clock) = app_with_clock();
    let response = app
        .oneshot(post_json("/guard", json!({ "portal": "faculty", "user_id": "u1" }), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _clock) = app_with_clock();
    app.clone()
        .oneshot(post_json("/check", json!({ "namespace": SIGN_IN, "key": "k" }), None))
        .await
        .unwrap();

    let response = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains(r#"portal_gate_admissions_total{namespace="sign-in",outcome="allowed"} 1"#));
}

#[tokio::test]
async fn test_metrics_disabled() {
    let mut config = test_config();
    config.metrics.enabled = false;
    let state = AppState::new(config, RateLimiter::new(), None).unwrap();
    let app = router(Arc::new(state));

    let response = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_throttle_blocks_without_running_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let routes = Router::new().route(
        "/applications",
        post(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                StatusCode::CREATED
            }
        }),
    );

    let clock = Arc::new(ManualClock::default());
    let rule = RateLimitRule::new(APPLICATION, 2, 60_000).unwrap();
    let app = throttled(routes, Throttle::new(RateLimiter::with_clock(clock.clone()), rule));

    let request = || {
        Request::post("/applications")
            .header("x-real-ip", "198.51.100.4")
            .body(Body::empty())
            .unwrap()
    };

    for expected in ["1", "0"] {
        let response = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[RATE_LIMIT_REMAINING], expected);
    }

    let response = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "60");
    let body: Value = body_json(response).await;
    assert_eq!(body["code"], "RATE_LIMITED");
    assert!(body["reset_at"].is_string());

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_throttle_records_admissions() {
    let routes = Router::new().route("/applications", post(|| async { StatusCode::CREATED }));
    let metrics = GateMetrics::new().unwrap();
    let rule = RateLimitRule::new(APPLICATION, 2, 60_000).unwrap();
    let throttle = Throttle::new(RateLimiter::with_clock(Arc::new(ManualClock::default())), rule)
        .with_metrics(metrics.clone());
    let app = throttled(routes, throttle);

    for expected in [StatusCode::CREATED, StatusCode::CREATED, StatusCode::TOO_MANY_REQUESTS] {
        let request = Request::post("/applications")
            .header("x-forwarded-for", "198.51.100.9")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), expected);
    }

    let text = assert_ok!(metrics.render());
    assert!(text.contains(r#"portal_gate_admissions_total{namespace="application",outcome="allowed"} 2"#));
    assert!(text.contains(r#"portal_gate_admissions_total{namespace="application",outcome="limited"} 1"#));
}
