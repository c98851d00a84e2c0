// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Protected route gate.

use crate::models::{Claims, CredentialFamily, SessionState};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;

/// Seconds a client should wait before retrying while the session loads.
const LOADING_RETRY_AFTER_SECS: &str = "1";

/// What the gate does with a request, derived from the session alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Loading,
    Authorized,
    Unauthorized,
}

impl GateState {
    pub fn from_session(state: &SessionState) -> Self {
        if state.loading {
            GateState::Loading
        } else if state.is_authorized {
            GateState::Authorized
        } else {
            GateState::Unauthorized
        }
    }
}

/// Session details made available to protected handlers.
#[derive(Debug, Clone)]
pub struct AuthorizedSession {
    pub user: Option<Claims>,
    pub authority: Option<CredentialFamily>,
}

/// Middleware that only lets authorized sessions through.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = state.session.current();

    match GateState::from_session(&session) {
        GateState::Loading => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, LOADING_RETRY_AFTER_SECS)],
            "Loading session",
        )
            .into_response(),
        GateState::Unauthorized => {
            tracing::debug!(path = %request.uri().path(), "Unauthenticated; redirecting to login");
            Redirect::temporary(&state.config.login_route).into_response()
        }
        GateState::Authorized => {
            request.extensions_mut().insert(AuthorizedSession {
                user: session.user,
                authority: session.authority,
            });
            next.run(request).await
        }
    }
}
