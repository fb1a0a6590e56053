// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Background sweep of expired rate limit buckets.
//!
//! The sweep only bounds memory. An expired bucket that has not been swept
//! yet is still treated as a fresh window by the next admission check, so
//! ticks may be skipped or delayed freely.

use crate::limiter::RateLimiter;
use crate::metrics::GateMetrics;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Default period between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

/// Handle to a running sweep task.
///
/// Dropping the handle aborts the task. The task never keeps the runtime
/// alive on its own.
pub struct Sweeper {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Start sweeping `limiter` every `period` on the current tokio runtime.
    pub fn spawn(limiter: RateLimiter, period: Duration, metrics: Option<GateMetrics>) -> Self {
        let (shutdown, mut stop) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; nothing can have expired yet.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let removed = limiter.cleanup();
                        let remaining = limiter.tracked_keys();
                        debug!(removed, remaining, "Rate limit sweep finished");
                        if let Some(metrics) = &metrics {
                            metrics.record_sweep(removed, remaining);
                        }
                    }
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        info!(period_secs = period.as_secs(), "Rate limit sweeper started");
        Self {
            shutdown,
            task: Some(task),
        }
    }

    /// Stop the task and wait for it to finish its current sweep.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!("Rate limit sweeper stopped");
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
