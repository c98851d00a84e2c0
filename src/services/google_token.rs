// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Remote validation of Google-issued access tokens.

use crate::config::{endpoints, Config};
use crate::models::claims::{self, Claims};
use serde::{Deserialize, Serialize};

/// Result of asking the backend whether an OAuth token is still good.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenValidation {
    pub valid: bool,
    /// Decoded claims, only when `valid`
    pub claims: Option<Claims>,
}

impl TokenValidation {
    pub fn invalid() -> Self {
        Self {
            valid: false,
            claims: None,
        }
    }
}

#[derive(Serialize)]
struct ValidateRequest<'a> {
    access_token: &'a str,
}

#[derive(Deserialize)]
struct ValidateResponse {
    #[serde(default)]
    valid: bool,
}

/// Confirms OAuth tokens with the backend's verification endpoint.
///
/// Uses a plain HTTP client: validation must not trigger the interceptor's
/// refresh or logout handling.
pub struct GoogleTokenValidator {
    http: reqwest::Client,
    validate_url: String,
}

impl GoogleTokenValidator {
    pub fn new(config: &Config, http: reqwest::Client) -> Self {
        Self {
            http,
            validate_url: config.endpoint(endpoints::VALIDATE_GOOGLE_TOKEN),
        }
    }

    /// Validate `token`. Every failure, local or remote, is an invalid answer.
    pub async fn validate(&self, token: &str) -> TokenValidation {
        let decoded = match claims::decode(token) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "OAuth token does not decode");
                return TokenValidation::invalid();
            }
        };

        let response = match self
            .http
            .post(&self.validate_url)
            .json(&ValidateRequest {
                access_token: token,
            })
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "OAuth token validation request failed");
                return TokenValidation::invalid();
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "OAuth token validation rejected");
            return TokenValidation::invalid();
        }

        match response.json::<ValidateResponse>().await {
            Ok(ValidateResponse { valid: true }) => TokenValidation {
                valid: true,
                claims: Some(decoded),
            },
            Ok(_) => {
                tracing::info!("Backend reports OAuth token invalid");
                TokenValidation::invalid()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable OAuth validation response");
                TokenValidation::invalid()
            }
        }
    }
}
