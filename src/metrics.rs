// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for admissions, guard decisions and bucket sweeps.

use crate::error::Result;
use crate::guard::GuardDecision;
use crate::limiter::RateLimitResult;
use crate::roles::PortalRole;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Metric handles plus the registry that owns them.
#[derive(Clone)]
pub struct GateMetrics {
    registry: Registry,
    admissions: IntCounterVec,
    guard_decisions: IntCounterVec,
    buckets: IntGauge,
    swept: IntCounter,
}

impl GateMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let admissions = IntCounterVec::new(
            Opts::new("portal_gate_admissions_total", "Rate limit checks by outcome"),
            &["namespace", "outcome"],
        )?;
        let guard_decisions = IntCounterVec::new(
            Opts::new("portal_gate_guard_decisions_total", "Portal entry checks by decision"),
            &["portal", "decision"],
        )?;
        let buckets = IntGauge::new("portal_gate_buckets", "Rate limit buckets currently held")?;
        let swept = IntCounter::new(
            "portal_gate_swept_buckets_total",
            "Expired rate limit buckets removed by the sweeper",
        )?;

        registry.register(Box::new(admissions.clone()))?;
        registry.register(Box::new(guard_decisions.clone()))?;
        registry.register(Box::new(buckets.clone()))?;
        registry.register(Box::new(swept.clone()))?;

        Ok(Self {
            registry,
            admissions,
            guard_decisions,
            buckets,
            swept,
        })
    }

    pub fn record_admission(&self, namespace: &str, result: &RateLimitResult) {
        let outcome = if result.allowed { "allowed" } else { "limited" };
        self.admissions.with_label_values(&[namespace, outcome]).inc();
    }

    pub fn record_guard(&self, portal: PortalRole, decision: &GuardDecision) {
        self.guard_decisions
            .with_label_values(&[portal.as_str(), decision.label()])
            .inc();
    }

    pub fn record_sweep(&self, removed: usize, remaining: usize) {
        self.swept.inc_by(removed as u64);
        self.buckets.set(remaining as i64);
    }

    /// Render all metrics in the text exposition format.
    pub fn render(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
