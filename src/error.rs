// SPDX-License-Identifier: PMPL-1.0-or-later
//! Error types for portal-gate

use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Invalid rate limit rule for {namespace}: {reason}")]
    InvalidRule {
        namespace: String,
        reason: &'static str,
    },

    #[error("Invalid bind address: {0}")]
    InvalidBindAddr(String),

    #[error("Invalid sweep interval: must be at least one second")]
    InvalidSweepInterval,

    #[error("Profile lookup failed: {0}")]
    ProfileLookup(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, GateError>;
