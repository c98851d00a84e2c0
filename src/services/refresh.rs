// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Single-flight access token refresh.
//!
//! Both the session manager and the request interceptor obtain new access
//! tokens here. At most one refresh request is outstanding at a time;
//! concurrent callers share its result.

use crate::config::{endpoints, Config};
use crate::models::claims;
use crate::services::token_store::{TokenKind, TokenStore};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Why a refresh did not produce a usable access token.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshFailure {
    #[error("no refresh token stored")]
    MissingRefreshToken,

    #[error("refresh rejected with HTTP {0}")]
    Rejected(u16),

    #[error("refresh request failed: {0}")]
    Network(String),

    #[error("refresh response unusable: {0}")]
    InvalidResponse(String),
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
    /// Present when the backend rotates refresh tokens
    #[serde(default)]
    refresh: Option<String>,
}

type PendingRefresh = Shared<BoxFuture<'static, Result<String, RefreshFailure>>>;

/// Refreshes the local access token, one request at a time.
pub struct TokenRefresher {
    http: reqwest::Client,
    refresh_url: String,
    store: Arc<TokenStore>,
    in_flight: Mutex<Option<PendingRefresh>>,
    requests_sent: Arc<AtomicU64>,
}

impl TokenRefresher {
    pub fn new(config: &Config, http: reqwest::Client, store: Arc<TokenStore>) -> Self {
        Self {
            http,
            refresh_url: config.endpoint(endpoints::REFRESH),
            store,
            in_flight: Mutex::new(None),
            requests_sent: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of refresh requests actually sent to the backend.
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent.load(Ordering::Relaxed)
    }

    /// The stored access token if it decodes and has not expired.
    pub fn current_access_token(&self) -> Option<String> {
        let token = self.store.get(TokenKind::Access)?;
        match claims::decode(&token) {
            Ok(c) if !c.is_expired() => Some(token),
            _ => None,
        }
    }

    /// Obtain a fresh access token.
    ///
    /// Joins the refresh already in flight if there is one. Otherwise the
    /// store is checked again first, since a refresh may have completed
    /// between the caller noticing expiry and getting here.
    ///
    /// Every failure other than [`RefreshFailure::MissingRefreshToken`]
    /// clears all stored credentials before it is reported.
    pub async fn refresh(&self) -> Result<String, RefreshFailure> {
        let pending = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some(pending) => {
                    tracing::debug!("Joining in-flight token refresh");
                    pending.clone()
                }
                None => {
                    if let Some(token) = self.current_access_token() {
                        tracing::debug!("Access token already refreshed");
                        return Ok(token);
                    }

                    let pending = perform_refresh(
                        self.http.clone(),
                        self.refresh_url.clone(),
                        self.store.clone(),
                        self.requests_sent.clone(),
                    )
                    .boxed()
                    .shared();
                    *slot = Some(pending.clone());
                    pending
                }
            }
        };

        let result = pending.clone().await;

        let mut slot = self.in_flight.lock().await;
        if slot.as_ref().is_some_and(|p| p.ptr_eq(&pending)) {
            *slot = None;
        }

        result
    }
}

async fn perform_refresh(
    http: reqwest::Client,
    url: String,
    store: Arc<TokenStore>,
    requests_sent: Arc<AtomicU64>,
) -> Result<String, RefreshFailure> {
    let Some(refresh_token) = store.get(TokenKind::Refresh) else {
        tracing::info!("No refresh token stored; cannot refresh access token");
        return Err(RefreshFailure::MissingRefreshToken);
    };

    requests_sent.fetch_add(1, Ordering::Relaxed);
    let result = request_new_token(&http, &url, &refresh_token).await;

    match result {
        Ok(body) => {
            match &body.refresh {
                Some(rotated) => store.set_local_pair(body.access.clone(), rotated.clone()),
                None => store.set(TokenKind::Access, body.access.clone()),
            }
            tracing::info!(rotated = body.refresh.is_some(), "Access token refreshed");
            Ok(body.access)
        }
        Err(failure) => {
            tracing::warn!(error = %failure, "Token refresh failed, clearing credentials");
            store.clear_all();
            Err(failure)
        }
    }
}

async fn request_new_token(
    http: &reqwest::Client,
    url: &str,
    refresh_token: &str,
) -> Result<RefreshResponse, RefreshFailure> {
    let response = http
        .post(url)
        .json(&RefreshRequest {
            refresh: refresh_token,
        })
        .send()
        .await
        .map_err(|e| RefreshFailure::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(RefreshFailure::Rejected(status.as_u16()));
    }

    let body: RefreshResponse = response
        .json()
        .await
        .map_err(|e| RefreshFailure::InvalidResponse(e.to_string()))?;

    claims::decode(&body.access).map_err(|e| RefreshFailure::InvalidResponse(e.to_string()))?;

    Ok(body)
}
