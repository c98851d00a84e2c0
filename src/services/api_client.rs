// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Backend API client with credential handling.
//!
//! Handles:
//! - Attaching the local bearer token and the OAuth token header
//! - Refreshing an expired access token before the request is sent
//! - Tearing down the whole session when the backend answers 401

use crate::config::{endpoints, Config};
use crate::error::SessionError;
use crate::models::claims;
use crate::models::{LoginRequest, ProfileUpdate, RegistrationRequest, TokenPair, UserProfile};
use crate::services::navigation::{Destination, Navigator};
use crate::services::refresh::{RefreshFailure, TokenRefresher};
use crate::services::token_store::{TokenKind, TokenStore};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Header carrying the OAuth access token alongside the bearer token.
pub const GOOGLE_TOKEN_HEADER: &str = "X-Google-Access-Token";

/// Intercepting client for the portfolio backend.
pub struct ApiClient {
    http: reqwest::Client,
    config: Config,
    store: Arc<TokenStore>,
    refresher: Arc<TokenRefresher>,
    navigator: Arc<Navigator>,
}

impl ApiClient {
    pub fn new(
        config: &Config,
        http: reqwest::Client,
        store: Arc<TokenStore>,
        refresher: Arc<TokenRefresher>,
        navigator: Arc<Navigator>,
    ) -> Self {
        Self {
            http,
            config: config.clone(),
            store,
            refresher,
            navigator,
        }
    }

    /// Exchange username and password for a local token pair.
    pub async fn obtain_token_pair(&self, credentials: &LoginRequest) -> Result<TokenPair, SessionError> {
        let response = self
            .http
            .post(self.config.endpoint(endpoints::LOGIN))
            .json(credentials)
            .send()
            .await?;

        check_response_json(response).await
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, request: &RegistrationRequest) -> Result<UserProfile, SessionError> {
        let response = self
            .http
            .post(self.config.endpoint(endpoints::REGISTER))
            .json(request)
            .send()
            .await?;

        check_response_json(response).await
    }

    /// Fetch the profile behind an explicit OAuth access token.
    pub async fn confirm_identity(&self, oauth_token: &str) -> Result<UserProfile, SessionError> {
        let response = self
            .http
            .get(self.config.endpoint(endpoints::CURRENT_USER))
            .bearer_auth(oauth_token)
            .send()
            .await?;

        check_response_json(response).await
    }

    /// Profile of the signed-in user.
    pub async fn current_user(&self) -> Result<UserProfile, SessionError> {
        self.get_json(endpoints::CURRENT_USER).await
    }

    /// Partially update the signed-in user's profile.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, SessionError> {
        self.put_json(endpoints::CURRENT_USER, update).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, SessionError> {
        let response = self.send(Method::GET, path, None).await?;
        parse_json(response).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, SessionError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(anyhow::Error::from)?;
        let response = self.send(Method::POST, path, Some(body)).await?;
        parse_json(response).await
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, SessionError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body).map_err(anyhow::Error::from)?;
        let response = self.send(Method::PUT, path, Some(body)).await?;
        parse_json(response).await
    }

    /// Send an authenticated request. Returns the response only on success.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, SessionError> {
        let bearer = self.bearer_token().await?;

        let mut request = self.http.request(method.clone(), self.config.endpoint(path));
        if let Some(token) = &bearer {
            request = request.bearer_auth(token);
        }
        if let Some(google) = self.store.get(TokenKind::GoogleAccess) {
            request = request.header(GOOGLE_TOKEN_HEADER, google);
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(method = %method, path, "Backend rejected credentials; ending session");
            self.store.clear_all();
            self.navigator.navigate(Destination::Login);
            return Err(SessionError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    /// Access token to attach, refreshed first if it has expired.
    async fn bearer_token(&self) -> Result<Option<String>, SessionError> {
        let Some(access) = self.store.get(TokenKind::Access) else {
            return Ok(None);
        };

        let decoded = match claims::decode(&access) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding undecodable access token");
                self.store.clear_local();
                return Ok(None);
            }
        };

        if !decoded.is_expired() {
            return Ok(Some(access));
        }

        if !self.store.contains(TokenKind::Refresh) {
            tracing::info!("Access token expired with no refresh token; request not sent");
            return Err(SessionError::SessionExpiredMidRequest);
        }

        match self.refresher.refresh().await {
            Ok(token) => Ok(Some(token)),
            Err(RefreshFailure::MissingRefreshToken) => Err(SessionError::SessionExpiredMidRequest),
            Err(failure) => {
                // The refresher already cleared the store; make sure of it
                self.store.clear_all();
                Err(SessionError::RefreshFailed(failure.to_string()))
            }
        }
    }
}

async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SessionError> {
    response
        .json()
        .await
        .map_err(|e| SessionError::Internal(anyhow::anyhow!("unreadable backend response: {e}")))
}

/// Check response status and parse JSON body.
async fn check_response_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, SessionError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SessionError::Api {
            status: status.as_u16(),
            body,
        });
    }

    parse_json(response).await
}
