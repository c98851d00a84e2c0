// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Login, registration and OAuth entry routes.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;

use crate::error::Result;
use crate::models::{LoginRequest, RegistrationRequest, SessionView, UserProfile};
use crate::services::{CallbackParams, Destination};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/logout", post(logout))
        .route("/auth/google", get(google_start))
        .route("/login/callback", get(google_callback))
        .route("/login/callback/", get(google_callback))
}

/// Username/password login.
async fn login(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<LoginRequest>,
) -> Result<Json<SessionView>> {
    let session = state.session.login(&credentials).await?;
    Ok(Json(SessionView::from(&session)))
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegistrationRequest>,
) -> Result<(StatusCode, Json<UserProfile>)> {
    let profile = state.session.register(&request).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn logout(State(state): State<Arc<AppState>>) -> Json<SessionView> {
    state.session.logout();
    Json(SessionView::from(&state.session.current()))
}

/// Start OAuth login - redirect to the backend's Google entry point.
async fn google_start(State(state): State<Arc<AppState>>) -> Redirect {
    Redirect::temporary(&state.config.google_login_url())
}

/// Provider redirect lands here with `access_token` or `error`.
async fn google_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let handler = state.redirect_handler();
    let destination = handler.resolve(&params).await;

    if destination == Destination::Home {
        state.session.resync().await;
    }

    let route = state.navigator.route(destination);
    match (destination, &params.error) {
        (Destination::Login, Some(error)) => {
            Redirect::temporary(&format!("{}?error={}", route, urlencoding::encode(error)))
        }
        _ => Redirect::temporary(route),
    }
}
