// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Portal Gate Service
//!
//! Answers two questions for the portals sitting in front of it:
//!
//! 1. **May this principal enter this portal?** `POST /guard` resolves the
//!    stored role and returns either "enter" or the path to redirect to.
//!
//! 2. **May this client hit this endpoint again?** `POST /check` counts the
//!    request against the endpoint's fixed-window limit.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `SWEEP_INTERVAL_SECS`: Seconds between bucket sweeps (default: 600)
//! - `SIGN_IN_LIMIT` / `SIGN_IN_WINDOW_MS`: Sign-in limit (default: 5 per 15 min)
//! - `APPLICATION_LIMIT` / `APPLICATION_WINDOW_MS`: Application submission
//!   limit (default: 3 per hour)
//! - `METRICS_ENABLED`: Expose Prometheus metrics (default: true)

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use portal_gate::{
    config::Config,
    handlers::{router, AppState},
    limiter::RateLimiter,
    metrics::GateMetrics,
    sweeper::Sweeper,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = Config::from_env();
    config.validate()?;
    info!(
        bind_addr = %config.bind_addr,
        sign_in_limit = config.rate_limit.sign_in.limit,
        sign_in_window_ms = config.rate_limit.sign_in.window_ms,
        application_limit = config.rate_limit.application.limit,
        application_window_ms = config.rate_limit.application.window_ms,
        sweep_interval_secs = config.rate_limit.sweep_interval_secs,
        "Starting portal gate"
    );

    // Create application state
    let limiter = RateLimiter::new();
    let metrics = if config.metrics.enabled {
        Some(GateMetrics::new()?)
    } else {
        None
    };

    let sweeper = Sweeper::spawn(
        limiter.clone(),
        config.rate_limit.sweep_interval(),
        metrics.clone(),
    );

    let addr = config.socket_addr()?;
    let state = Arc::new(AppState::new(config, limiter, metrics)?);
    let app = router(state);

    // Start server
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.shutdown().await;
    info!("Portal gate stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
