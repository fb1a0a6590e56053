// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Portal entry guard.
//!
//! Each portal asks the guard at the start of every protected request.
//! Guards never carry their own role logic; everything routes through
//! [`crate::roles`].

use crate::principal::Principal;
use crate::roles::PortalRole;
use serde::Serialize;
use tracing::{debug, info};

/// Where anonymous visitors are sent.
pub const SIGN_IN_PATH: &str = "/login";

/// Outcome of a portal entry check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GuardDecision {
    /// Principal belongs to the requested portal.
    Enter { portal: PortalRole },
    /// Principal belongs elsewhere.
    Redirect {
        to: String,
        /// Portal the principal resolved to, if authenticated
        resolved: Option<PortalRole>,
    },
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Enter { .. })
    }

    pub fn redirect_to(&self) -> Option<&str> {
        match self {
            Self::Enter { .. } => None,
            Self::Redirect { to, .. } => Some(to),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Enter { .. } => "enter",
            Self::Redirect { .. } => "redirect",
        }
    }
}

/// Decide whether `principal` may enter `portal`.
pub fn enter(portal: PortalRole, principal: Option<&Principal>) -> GuardDecision {
    let Some(principal) = principal else {
        debug!(%portal, "Anonymous visitor, redirecting to sign-in");
        return GuardDecision::Redirect {
            to: SIGN_IN_PATH.to_string(),
            resolved: None,
        };
    };

    let resolved = principal.portal();
    let admitted = match portal {
        PortalRole::Admin => principal.is_admin(),
        PortalRole::Mentor | PortalRole::Learner => resolved == portal,
    };

    if admitted {
        debug!(%portal, user_id = %principal.user_id, "Portal entry allowed");
        GuardDecision::Enter { portal }
    } else {
        info!(
            requested = %portal,
            %resolved,
            user_id = %principal.user_id,
            "Principal redirected to resolved portal"
        );
        GuardDecision::Redirect {
            to: resolved.home_path().to_string(),
            resolved: Some(resolved),
        }
    }
}
