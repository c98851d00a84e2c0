// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Landing handler for the Google OAuth redirect.

use crate::services::api_client::ApiClient;
use crate::services::navigation::{Destination, Navigator};
use crate::services::token_store::{TokenKind, TokenStore};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Query parameters the provider redirect lands with.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub access_token: Option<String>,
    /// Set instead of `access_token` when the provider login failed
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectState {
    Pending,
    Resolved(Destination),
}

/// Stores the redirected OAuth token and confirms it before sending the
/// user on. Resolves exactly once; later calls return the first outcome.
pub struct OAuthRedirectHandler {
    store: Arc<TokenStore>,
    api: Arc<ApiClient>,
    navigator: Arc<Navigator>,
    state: Mutex<RedirectState>,
}

impl OAuthRedirectHandler {
    pub fn new(store: Arc<TokenStore>, api: Arc<ApiClient>, navigator: Arc<Navigator>) -> Self {
        Self {
            store,
            api,
            navigator,
            state: Mutex::new(RedirectState::Pending),
        }
    }

    pub async fn state(&self) -> RedirectState {
        *self.state.lock().await
    }

    pub async fn resolve(&self, params: &CallbackParams) -> Destination {
        let mut state = self.state.lock().await;
        if let RedirectState::Resolved(destination) = *state {
            return destination;
        }

        let destination = self.complete(params).await;
        *state = RedirectState::Resolved(destination);
        self.navigator.navigate(destination);
        destination
    }

    async fn complete(&self, params: &CallbackParams) -> Destination {
        if let Some(error) = &params.error {
            tracing::warn!(error = %error, "OAuth provider reported an error");
            return Destination::Login;
        }

        let Some(token) = params
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
        else {
            tracing::warn!("OAuth redirect arrived without an access token");
            return Destination::Login;
        };

        self.store.set(TokenKind::GoogleAccess, token);

        match self.api.confirm_identity(token).await {
            Ok(user) => {
                tracing::info!(user_id = user.id, username = %user.username, "OAuth login confirmed");
                Destination::Home
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not confirm OAuth identity; discarding token");
                self.store.clear(TokenKind::GoogleAccess);
                Destination::Login
            }
        }
    }
}
