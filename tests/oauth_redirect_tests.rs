// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth redirect landing tests.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use folio_session::models::CredentialFamily;
use folio_session::services::{CallbackParams, Destination, RedirectState, TokenKind};
use tower::ServiceExt;

mod common;
use common::{create_test_app, test_state, valid_token, MockBackend};

fn with_token(token: &str) -> CallbackParams {
    CallbackParams {
        access_token: Some(token.to_string()),
        error: None,
    }
}

#[tokio::test]
async fn test_confirmed_token_goes_home() {
    let backend = MockBackend::start().await;
    let state = test_state(backend.config());
    let handler = state.redirect_handler();
    let token = valid_token("ada");

    assert_eq!(handler.state().await, RedirectState::Pending);
    let destination = handler.resolve(&with_token(&token)).await;

    assert_eq!(destination, Destination::Home);
    assert_eq!(handler.state().await, RedirectState::Resolved(Destination::Home));
    assert_eq!(state.store.get(TokenKind::GoogleAccess), Some(token.clone()));
    assert_eq!(
        backend.state.user_bearers(),
        vec![Some(format!("Bearer {token}"))]
    );
    assert_eq!(state.navigator.last(), Some(Destination::Home));
}

#[tokio::test]
async fn test_missing_token_goes_to_login() {
    let backend = MockBackend::start().await;
    let state = test_state(backend.config());
    let handler = state.redirect_handler();

    let destination = handler.resolve(&CallbackParams::default()).await;

    assert_eq!(destination, Destination::Login);
    assert!(!state.store.contains(TokenKind::GoogleAccess));
    assert!(backend.state.user_bearers().is_empty());
    assert_eq!(state.navigator.last(), Some(Destination::Login));
}

#[tokio::test]
async fn test_provider_error_goes_to_login() {
    let backend = MockBackend::start().await;
    let state = test_state(backend.config());
    let handler = state.redirect_handler();

    let destination = handler
        .resolve(&CallbackParams {
            access_token: None,
            error: Some("NoSocialAccount".to_string()),
        })
        .await;

    assert_eq!(destination, Destination::Login);
    assert!(backend.state.user_bearers().is_empty());
}

#[tokio::test]
async fn test_unconfirmed_token_is_discarded() {
    let backend = MockBackend::start().await;
    backend.state.set_user_status(401);
    let state = test_state(backend.config());
    let handler = state.redirect_handler();

    let destination = handler.resolve(&with_token(&valid_token("ada"))).await;

    assert_eq!(destination, Destination::Login);
    assert!(!state.store.contains(TokenKind::GoogleAccess));
}

#[tokio::test]
async fn test_resolves_only_once() {
    let backend = MockBackend::start().await;
    let state = test_state(backend.config());
    let handler = state.redirect_handler();

    let first = handler.resolve(&with_token(&valid_token("ada"))).await;
    let second = handler.resolve(&CallbackParams::default()).await;

    assert_eq!(first, Destination::Home);
    assert_eq!(second, Destination::Home);
    assert_eq!(backend.state.user_bearers().len(), 1);
}

#[tokio::test]
async fn test_callback_route_redirects_home_and_authorizes() {
    let backend = MockBackend::start().await;
    let (app, state) = create_test_app(&backend);
    let token = valid_token("ada");

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/login/callback/?access_token={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/");

    let session = state.session.current();
    assert!(session.is_authorized);
    assert_eq!(session.authority, Some(CredentialFamily::OAuth));
}

#[tokio::test]
async fn test_callback_route_passes_provider_error_to_login() {
    let backend = MockBackend::start().await;
    let (app, state) = create_test_app(&backend);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/login/callback?error=NoSocialAccount")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/login?error=NoSocialAccount"
    );
    assert!(!state.store.contains(TokenKind::GoogleAccess));
}
