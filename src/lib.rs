// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Portal Gate
//!
//! Access control and request throttling for the admin, mentor and learner
//! portals:
//!
//! - Stored account roles resolved to exactly one portal (`faculty` is a
//!   legacy alias of `mentor`; anything unrecognized is a learner)
//! - A single entry guard shared by every portal
//! - Fixed-window rate limiting keyed by endpoint namespace and client address
//! - Background sweeping of expired rate limit buckets

pub mod clock;
pub mod config;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod identity;
pub mod limiter;
pub mod metrics;
pub mod principal;
pub mod roles;
pub mod sweeper;

pub use config::Config;
pub use error::{GateError, Result};
pub use guard::GuardDecision;
pub use identity::request_ip;
pub use limiter::{RateLimitResult, RateLimitRule, RateLimiter};
pub use principal::{Principal, ProfileStore, Session};
pub use roles::{is_allowed_admin, resolve_portal_role, PortalRole};
pub use sweeper::Sweeper;
