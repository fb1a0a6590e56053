// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the portal gate service.
//!
//! Defaults cover the two throttled endpoints of the portals: credential
//! submission on sign-in and mentor/learner application submission.

use crate::error::{GateError, Result};
use crate::limiter::RateLimitRule;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Namespace of the sign-in rule.
pub const SIGN_IN: &str = "sign-in";
/// Namespace of the application submission rule.
pub const APPLICATION: &str = "application";

/// Configuration for the portal gate service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Seconds between sweeps of expired buckets (default: 600)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Credential submission limit (default: 5 per 15 minutes)
    #[serde(default = "default_sign_in_rule")]
    pub sign_in: RuleConfig,

    /// Application submission limit (default: 3 per hour)
    #[serde(default = "default_application_rule")]
    pub application: RuleConfig,
}

/// One endpoint's limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub limit: u32,
    pub window_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_sweep_interval_secs() -> u64 {
    600
}

fn default_sign_in_rule() -> RuleConfig {
    RuleConfig {
        limit: 5,
        window_ms: 15 * 60 * 1000,
    }
}

fn default_application_rule() -> RuleConfig {
    RuleConfig {
        limit: 3,
        window_ms: 60 * 60 * 1000,
    }
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            rate_limit: RateLimitConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            sign_in: default_sign_in_rule(),
            application: default_application_rule(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();
        let sign_in = defaults.rate_limit.sign_in;
        let application = defaults.rate_limit.application;

        Config {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            rate_limit: RateLimitConfig {
                sweep_interval_secs: parse_var(&lookup, "SWEEP_INTERVAL_SECS")
                    .unwrap_or(defaults.rate_limit.sweep_interval_secs),
                sign_in: RuleConfig {
                    limit: parse_var(&lookup, "SIGN_IN_LIMIT").unwrap_or(sign_in.limit),
                    window_ms: parse_var(&lookup, "SIGN_IN_WINDOW_MS").unwrap_or(sign_in.window_ms),
                },
                application: RuleConfig {
                    limit: parse_var(&lookup, "APPLICATION_LIMIT").unwrap_or(application.limit),
                    window_ms: parse_var(&lookup, "APPLICATION_WINDOW_MS")
                        .unwrap_or(application.window_ms),
                },
            },
            metrics: MetricsConfig {
                enabled: parse_var(&lookup, "METRICS_ENABLED").unwrap_or(defaults.metrics.enabled),
                ..defaults.metrics
            },
        }
    }

    /// Check every value the service relies on.
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        if self.rate_limit.sweep_interval_secs == 0 {
            return Err(GateError::InvalidSweepInterval);
        }
        self.rate_limit.rules()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .map_err(|_| GateError::InvalidBindAddr(self.bind_addr.clone()))
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|v| v.trim().parse().ok())
}

impl RateLimitConfig {
    /// Get the sweep period
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Build the validated sign-in and application rules.
    pub fn rules(&self) -> Result<Vec<RateLimitRule>> {
        Ok(vec![
            RateLimitRule::new(SIGN_IN, self.sign_in.limit, self.sign_in.window_ms)?,
            RateLimitRule::new(APPLICATION, self.application.limit, self.application.window_ms)?,
        ])
    }
}
