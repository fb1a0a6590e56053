// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Principals and the external collaborators they are built from.
//!
//! The identity provider hands us a [`Session`]; the profile store knows the
//! stored role. Neither is implemented here beyond an in-memory store.

use crate::error::Result;
use crate::roles::{is_allowed_admin, resolve_portal_role, PortalRole};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Authenticated session supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Role lookup keyed by user id.
pub trait ProfileStore: Send + Sync {
    /// `Ok(None)` means no profile or no role on it.
    fn stored_role(&self, user_id: &str) -> Result<Option<String>>;
}

/// Profile store held in memory.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    roles: RwLock<HashMap<String, String>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: impl Into<String>, role: impl Into<String>) {
        self.roles.write().insert(user_id.into(), role.into());
    }
}

impl ProfileStore for MemoryProfileStore {
    fn stored_role(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.roles.read().get(user_id).cloned())
    }
}

/// The actor behind one request. Built per request and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub stored_role: Option<String>,
    pub email_hint: Option<String>,
}

impl Principal {
    pub fn new(
        user_id: impl Into<String>,
        stored_role: Option<String>,
        email_hint: Option<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            stored_role,
            email_hint,
        }
    }

    /// Build a principal from a session, looking up its stored role.
    ///
    /// A failed lookup is logged and treated as an absent role.
    pub fn from_session(session: &Session, profiles: &dyn ProfileStore) -> Self {
        let stored_role = match profiles.stored_role(&session.user_id) {
            Ok(role) => role,
            Err(err) => {
                warn!(user_id = %session.user_id, error = %err, "Profile lookup failed, treating role as absent");
                None
            }
        };
        Self {
            user_id: session.user_id.clone(),
            stored_role,
            email_hint: session.email.clone(),
        }
    }

    pub fn portal(&self) -> PortalRole {
        resolve_portal_role(self.stored_role.as_deref(), self.email_hint.as_deref())
    }

    pub fn is_admin(&self) -> bool {
        is_allowed_admin(self.stored_role.as_deref(), self.email_hint.as_deref())
    }
}
