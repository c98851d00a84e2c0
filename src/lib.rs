// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Folio-Session: session and credential management for the portfolio app
//!
//! This crate decides whether the current session is authenticated across
//! two credential families (a local access/refresh pair and a Google OAuth
//! token), refreshes or invalidates credentials as backend requests are made,
//! and hosts a small app shell that gates protected routes on that decision.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{
    ApiClient, GoogleTokenValidator, Navigator, OAuthRedirectHandler, SessionManager,
    TokenRefresher, TokenStore,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: Arc<TokenStore>,
    pub navigator: Arc<Navigator>,
    pub refresher: Arc<TokenRefresher>,
    pub validator: Arc<GoogleTokenValidator>,
    pub api: Arc<ApiClient>,
    pub session: Arc<SessionManager>,
}

impl AppState {
    /// Wire up every service, with the token store chosen by `config`.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let store = Arc::new(TokenStore::from_config(&config));
        Self::with_store(config, store)
    }

    /// Wire up every service around an existing token store.
    pub fn with_store(config: Config, store: Arc<TokenStore>) -> anyhow::Result<Self> {
        let http = config.http_client()?;

        let navigator = Arc::new(Navigator::new(&config));
        let refresher = Arc::new(TokenRefresher::new(&config, http.clone(), store.clone()));
        let validator = Arc::new(GoogleTokenValidator::new(&config, http.clone()));
        let api = Arc::new(ApiClient::new(
            &config,
            http,
            store.clone(),
            refresher.clone(),
            navigator.clone(),
        ));
        let session = Arc::new(SessionManager::new(
            store.clone(),
            refresher.clone(),
            validator.clone(),
            api.clone(),
        ));

        Ok(Self {
            config,
            store,
            navigator,
            refresher,
            validator,
            api,
            session,
        })
    }

    /// Fresh handler for one OAuth redirect.
    pub fn redirect_handler(&self) -> OAuthRedirectHandler {
        OAuthRedirectHandler::new(self.store.clone(), self.api.clone(), self.navigator.clone())
    }
}
