// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Session error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A stored or received credential could not be decoded.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// The refresh endpoint rejected the refresh token or was unreachable.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// The backend rejected the OAuth access token.
    #[error("OAuth token rejected: {0}")]
    ValidationFailed(String),

    /// The access token expired and there is no refresh token to recover it.
    #[error("Session expired")]
    SessionExpiredMidRequest,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Backend returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl SessionError {
    /// Generic message used when a backend error body carries nothing readable.
    pub const FALLBACK_MESSAGE: &'static str = "Something went wrong. Please try again!";

    /// Whether this error tears down the whole session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::Unauthorized
                | SessionError::RefreshFailed(_)
                | SessionError::ValidationFailed(_)
        )
    }

    /// Human-readable messages from a backend error body.
    ///
    /// The backend reports validation problems as `{"field": ["msg", ...]}`;
    /// every message is returned in field order. Anything else yields the
    /// error's own description.
    pub fn api_messages(&self) -> Vec<String> {
        let SessionError::Api { body, .. } = self else {
            return vec![self.to_string()];
        };

        let Ok(serde_json::Value::Object(fields)) = serde_json::from_str(body) else {
            return vec![Self::FALLBACK_MESSAGE.to_string()];
        };

        let mut messages = Vec::new();
        for value in fields.values() {
            match value {
                serde_json::Value::Array(items) => messages.extend(
                    items
                        .iter()
                        .map(|item| item.as_str().map_or_else(|| item.to_string(), String::from)),
                ),
                serde_json::Value::String(msg) => messages.push(msg.clone()),
                other => messages.push(other.to_string()),
            }
        }

        if messages.is_empty() {
            messages.push(Self::FALLBACK_MESSAGE.to_string());
        }
        messages
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            SessionError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            SessionError::SessionExpiredMidRequest => {
                (StatusCode::UNAUTHORIZED, "session_expired", None)
            }
            SessionError::MalformedToken(msg) => {
                (StatusCode::UNAUTHORIZED, "invalid_token", Some(msg.clone()))
            }
            SessionError::RefreshFailed(msg) => {
                (StatusCode::UNAUTHORIZED, "refresh_failed", Some(msg.clone()))
            }
            SessionError::ValidationFailed(msg) => {
                (StatusCode::UNAUTHORIZED, "validation_failed", Some(msg.clone()))
            }
            SessionError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            SessionError::Api { status, .. } => {
                let details = Some(self.api_messages().join("; "));
                let status = StatusCode::from_u16(*status)
                    .ok()
                    .filter(|s| s.is_client_error())
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                (status, "backend_error", details)
            }
            SessionError::Http(err) => {
                tracing::error!(error = %err, "Backend request failed");
                (StatusCode::BAD_GATEWAY, "backend_unreachable", None)
            }
            SessionError::Internal(err) => {
                tracing::error!(error = %err, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
