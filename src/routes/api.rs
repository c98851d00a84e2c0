// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated sessions.

use crate::error::{Result, SessionError};
use crate::middleware::AuthorizedSession;
use crate::models::{ProfileUpdate, SessionView, UserProfile};
use crate::AppState;
use axum::{
    extract::State,
    routing::get,
    Extension, Json, Router,
};
use std::sync::Arc;
use validator::Validate;

/// Protected routes. The session gate is applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/session", get(get_session))
        .route("/api/me", get(get_me).put(update_me))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<AuthorizedSession>,
) -> Json<SessionView> {
    tracing::debug!(authority = ?session.authority, "Session requested");
    Json(SessionView::from(&state.session.current()))
}

/// Profile of the signed-in user, fetched through the intercepting client.
async fn get_me(State(state): State<Arc<AppState>>) -> Result<Json<UserProfile>> {
    Ok(Json(state.api.current_user().await?))
}

async fn update_me(
    State(state): State<Arc<AppState>>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>> {
    update
        .validate()
        .map_err(|e| SessionError::BadRequest(e.to_string()))?;

    let profile = state.api.update_profile(&update).await?;
    tracing::info!(user_id = profile.id, "Profile updated");
    Ok(Json(profile))
}
