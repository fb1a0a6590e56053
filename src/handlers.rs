// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the portal gate service.
//!
//! Portals and endpoints call `/guard` and `/check` before doing any work of
//! their own. Verdicts are returned with status 200 so the caller can read
//! the body; routes hosted in-process can use [`throttle`] instead.

use crate::config::{Config, APPLICATION, SIGN_IN};
use crate::guard::{self, GuardDecision};
use crate::identity::request_ip;
use crate::limiter::{RateLimitResult, RateLimitRule, RateLimiter};
use crate::metrics::GateMetrics;
use crate::principal::Principal;
use crate::roles::PortalRole;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// Shared application state.
pub struct AppState {
    pub limiter: RateLimiter,
    pub rules: HashMap<String, RateLimitRule>,
    pub metrics: Option<GateMetrics>,
    pub config: Config,
}

impl AppState {
    /// Build state from a validated configuration.
    pub fn new(
        config: Config,
        limiter: RateLimiter,
        metrics: Option<GateMetrics>,
    ) -> crate::Result<Self> {
        let rules = config
            .rate_limit
            .rules()?
            .into_iter()
            .map(|rule| (rule.namespace().to_string(), rule))
            .collect();
        Ok(Self {
            limiter,
            rules,
            metrics,
            config,
        })
    }

    pub fn rule(&self, namespace: &str) -> Option<&RateLimitRule> {
        self.rules.get(namespace)
    }

    fn admit(&self, rule: &RateLimitRule, client: &str) -> RateLimitResult {
        let result = self.limiter.check(rule, client);
        if let Some(metrics) = &self.metrics {
            metrics.record_admission(rule.namespace(), &result);
        }
        result
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_at: Option<DateTime<Utc>>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Rate limit check request.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub namespace: String,
    /// Client key; derived from forwarding headers when omitted
    #[serde(default)]
    pub key: Option<String>,
}

/// Rate limit check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckResponse {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub retry_after_secs: Option<u64>,
}

/// Portal entry request.
#[derive(Debug, Deserialize)]
pub struct GuardRequest {
    pub portal: String,
    /// Absent for anonymous visitors
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Stored role from the caller's profile lookup
    #[serde(default)]
    pub role: Option<String>,
}

/// Portal entry response.
#[derive(Debug, Serialize, Deserialize)]
pub struct GuardResponse {
    pub allowed: bool,
    /// Portal the principal belongs to, if authenticated
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub portal: Option<PortalRole>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub redirect_to: Option<String>,
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/check", post(check))
        .route("/guard", post(guard_entry));

    if state.config.metrics.enabled {
        app = app.route(&state.config.metrics.path, get(metrics));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "portal-gate",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Count one request against a configured rule.
pub async fn check(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CheckRequest>,
) -> Response {
    let Some(rule) = state.rule(&req.namespace) else {
        warn!(namespace = %req.namespace, "Unknown rate limit namespace");
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!(
                    "unknown namespace {:?}, expected {SIGN_IN:?} or {APPLICATION:?}",
                    req.namespace
                ),
                code: "UNKNOWN_NAMESPACE",
                retry_after_secs: None,
                reset_at: None,
            }),
        )
            .into_response();
    };

    let client = match req.key {
        Some(key) if !key.trim().is_empty() => key.trim().to_string(),
        _ => request_ip(&headers),
    };

    let result = state.admit(rule, &client);
    let retry_after_secs =
        (!result.allowed).then(|| retry_after_secs(&result, state.limiter.now()));

    debug!(
        namespace = %rule.namespace(),
        %client,
        allowed = result.allowed,
        remaining = result.remaining,
        "Rate limit check complete"
    );

    Json(CheckResponse {
        allowed: result.allowed,
        remaining: result.remaining,
        reset_at: result.reset_at,
        retry_after_secs,
    })
    .into_response()
}

/// Decide whether the principal may enter the requested portal.
pub async fn guard_entry(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GuardRequest>,
) -> Response {
    let portal: PortalRole = match req.portal.parse() {
        Ok(portal) => portal,
        Err(err) => {
            warn!(portal = %req.portal, "Unknown portal requested");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: err.to_string(),
                    code: "UNKNOWN_PORTAL",
                    retry_after_secs: None,
                    reset_at: None,
                }),
            )
                .into_response();
        }
    };

    let principal = req
        .user_id
        .map(|user_id| Principal::new(user_id, req.role, req.email));
    let decision = guard::enter(portal, principal.as_ref());

    if let Some(metrics) = &state.metrics {
        metrics.record_guard(portal, &decision);
    }

    let resolved = match &decision {
        GuardDecision::Enter { portal } => Some(*portal),
        GuardDecision::Redirect { resolved, .. } => *resolved,
    };

    Json(GuardResponse {
        allowed: decision.is_allowed(),
        portal: resolved,
        redirect_to: decision.redirect_to().map(str::to_string),
    })
    .into_response()
}

/// Prometheus exposition endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let Some(metrics) = &state.metrics else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// State for [`throttle`]: the limiter plus the rule guarding the route.
#[derive(Clone)]
pub struct Throttle {
    pub limiter: RateLimiter,
    pub rule: RateLimitRule,
    pub metrics: Option<GateMetrics>,
}

impl Throttle {
    pub fn new(limiter: RateLimiter, rule: RateLimitRule) -> Self {
        Self {
            limiter,
            rule,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: GateMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Rate-limit a route in-process.
///
/// Rejected requests get `429` and never reach the inner handler.
pub async fn throttle(State(throttle): State<Throttle>, request: Request<Body>, next: Next) -> Response {
    let client = request_ip(request.headers());
    let result = throttle.limiter.check(&throttle.rule, &client);
    if let Some(metrics) = &throttle.metrics {
        metrics.record_admission(throttle.rule.namespace(), &result);
    }

    if !result.allowed {
        let retry_secs = retry_after_secs(&result, throttle.limiter.now());
        info!(
            namespace = %throttle.rule.namespace(),
            %client,
            retry_after_secs = retry_secs,
            "Request rate limited"
        );
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, retry_secs.to_string())],
            Json(ErrorResponse {
                error: "Too many requests, try again later".to_string(),
                code: "RATE_LIMITED",
                retry_after_secs: Some(retry_secs),
                reset_at: Some(result.reset_at),
            }),
        )
            .into_response();
        insert_rate_headers(response.headers_mut(), &result);
        return response;
    }

    let mut response = next.run(request).await;
    insert_rate_headers(response.headers_mut(), &result);
    response
}

/// Wrap `routes` with [`throttle`] under `throttle`'s rule.
pub fn throttled<S>(routes: Router<S>, throttle: Throttle) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    routes.route_layer(middleware::from_fn_with_state(throttle, self::throttle))
}

/// Whole seconds until reset, rounded up so clients never retry early.
fn retry_after_secs(result: &RateLimitResult, now: DateTime<Utc>) -> u64 {
    let wait = result.retry_after(now);
    let secs = wait.as_secs();
    if wait.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

fn insert_rate_headers(headers: &mut HeaderMap, result: &RateLimitResult) {
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(result.remaining));
    headers.insert(RATE_LIMIT_RESET, HeaderValue::from(result.reset_at.timestamp()));
}
