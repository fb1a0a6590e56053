// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Client identity for rate limit keys.
//!
//! Requests that carry neither forwarding header all share the
//! [`UNKNOWN_CLIENT`] key, and therefore one bucket per namespace. A proxy
//! that strips the headers makes every client behind it look the same.

use axum::http::HeaderMap;
use tracing::warn;

pub const FORWARDED_FOR: &str = "x-forwarded-for";
pub const REAL_IP: &str = "x-real-ip";

/// Key used when no client address can be derived.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derive the client address from request headers.
///
/// Prefers the first entry of `X-Forwarded-For`, then `X-Real-IP`. Values are
/// trimmed; empty or non-UTF-8 values count as absent.
pub fn request_ip(headers: &HeaderMap) -> String {
    let forwarded = header_value(headers, FORWARDED_FOR)
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    let real = header_value(headers, REAL_IP)
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = real {
        return ip.to_string();
    }

    warn!("No client address header, using shared unknown key");
    UNKNOWN_CLIENT.to_string()
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
