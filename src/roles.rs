// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Portal role resolution.
//!
//! Every portal entry check goes through [`resolve_portal_role`] and
//! [`is_allowed_admin`]. Stored role strings come from an external profile
//! schema and are normalized into [`StoredRole`] before any decision is made,
//! so a typo or schema drift can only ever land a principal in the learner
//! portal.

use serde::{Deserialize, Serialize};

/// The portal a principal is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortalRole {
    Admin,
    Mentor,
    Learner,
}

impl PortalRole {
    pub const ALL: [PortalRole; 3] = [PortalRole::Admin, PortalRole::Mentor, PortalRole::Learner];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Mentor => "mentor",
            Self::Learner => "learner",
        }
    }

    /// Landing path of the portal.
    pub fn home_path(&self) -> &'static str {
        match self {
            Self::Admin => "/admin",
            Self::Mentor => "/mentor",
            Self::Learner => "/learner",
        }
    }
}

impl std::fmt::Display for PortalRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PortalRole {
    type Err = UnknownPortal;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "mentor" => Ok(Self::Mentor),
            "learner" => Ok(Self::Learner),
            other => Err(UnknownPortal(other.to_string())),
        }
    }
}

/// Portal name that is not one of admin, mentor or learner.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown portal: {0}")]
pub struct UnknownPortal(pub String);

/// Role value as persisted by the profile store, after normalization.
///
/// Matching is exact: `"Admin"` or `" admin"` are [`StoredRole::Unrecognized`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredRole {
    Admin,
    Mentor,
    /// Historical synonym for [`StoredRole::Mentor`].
    Faculty,
    Student,
    Unrecognized,
    Absent,
}

impl StoredRole {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            None => Self::Absent,
            Some("admin") => Self::Admin,
            Some("mentor") => Self::Mentor,
            Some("faculty") => Self::Faculty,
            Some("student") => Self::Student,
            Some(_) => Self::Unrecognized,
        }
    }
}

/// Map a stored role to the portal the principal belongs to.
///
/// Never fails. `email_hint` takes no part in the current rules.
pub fn resolve_portal_role(stored_role: Option<&str>, email_hint: Option<&str>) -> PortalRole {
    let _ = email_hint;
    match StoredRole::parse(stored_role) {
        StoredRole::Admin => PortalRole::Admin,
        StoredRole::Mentor | StoredRole::Faculty => PortalRole::Mentor,
        StoredRole::Student | StoredRole::Unrecognized | StoredRole::Absent => PortalRole::Learner,
    }
}

/// Whether the principal may enter the admin portal.
///
/// Any email-based allow-list belongs here and nowhere else.
pub fn is_allowed_admin(stored_role: Option<&str>, email_hint: Option<&str>) -> bool {
    let _ = email_hint;
    StoredRole::parse(stored_role) == StoredRole::Admin
}
