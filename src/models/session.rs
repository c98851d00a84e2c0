// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Derived session state. Never persisted.

use super::claims::Claims;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Which credential is the authority behind an authorized session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum CredentialFamily {
    /// Access/refresh pair issued by the backend's login endpoint
    Local,
    /// Access token issued through the Google redirect
    OAuth,
}

/// Current answer to "is this session authenticated?".
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// True only while an activation is resolving credentials
    pub loading: bool,
    pub is_authorized: bool,
    pub user: Option<Claims>,
    pub authority: Option<CredentialFamily>,
}

impl SessionState {
    /// State before the first activation has finished.
    pub fn loading() -> Self {
        Self {
            loading: true,
            ..Self::unauthenticated()
        }
    }

    pub fn unauthenticated() -> Self {
        Self {
            loading: false,
            is_authorized: false,
            user: None,
            authority: None,
        }
    }

    pub fn authorized(authority: CredentialFamily, claims: Claims) -> Self {
        Self {
            loading: false,
            is_authorized: true,
            user: Some(claims),
            authority: Some(authority),
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::loading()
    }
}

/// Session summary served to the frontend.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionView {
    pub loading: bool,
    pub is_authorized: bool,
    pub authority: Option<CredentialFamily>,
    pub display_name: Option<String>,
    pub is_superuser: bool,
    /// RFC3339
    pub expires_at: Option<String>,
}

impl From<&SessionState> for SessionView {
    fn from(state: &SessionState) -> Self {
        let user = state.user.as_ref();
        Self {
            loading: state.loading,
            is_authorized: state.is_authorized,
            authority: state.authority,
            display_name: user.and_then(Claims::display_name),
            is_superuser: user.is_some_and(Claims::is_superuser),
            expires_at: user.and_then(Claims::expires_at_rfc3339),
        }
    }
}
