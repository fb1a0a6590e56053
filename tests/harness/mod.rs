// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test harness for abuse simulation against the portal gate.
//!
//! Generates client traffic and role values, and tallies outcomes so the
//! security tests can assert on aggregate behavior.

pub mod generators;
pub mod metrics;
