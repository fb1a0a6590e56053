// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test data generators for abuse simulation.

use axum::http::{HeaderMap, HeaderValue};
use std::net::{IpAddr, Ipv4Addr};

/// Generate a pool of client addresses.
pub fn generate_ips(count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c))
        })
        .collect()
}

/// Headers as a proxy would set them for `client`.
pub fn forwarded_headers(client: IpAddr, proxies: &[&str]) -> HeaderMap {
    let mut chain = vec![client.to_string()];
    chain.extend(proxies.iter().map(|p| p.to_string()));

    let mut headers = HeaderMap::new();
    headers.insert(
        "x-forwarded-for",
        HeaderValue::from_str(&chain.join(", ")).expect("valid header"),
    );
    headers
}

/// Headers after a proxy stripped every client address.
pub fn stripped_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("user-agent", HeaderValue::from_static("curl/8.5.0"));
    headers
}

/// Role strings that look privileged but are not exact matches.
pub fn near_miss_roles() -> Vec<&'static str> {
    vec![
        "Admin",
        "ADMIN",
        " admin",
        "admin ",
        "admin\n",
        "administrator",
        "admins",
        "root",
        "superuser",
        "Mentor",
        "MENTOR",
        " mentor",
        "Faculty",
        "faculty ",
        "teacher",
        "staff",
        "",
        "null",
        "undefined",
        "admin,mentor",
        "аdmin", // Cyrillic 'а'
    ]
}
