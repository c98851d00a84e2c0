// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Unverified JWT payload decoding.
//!
//! Tokens are decoded without checking their signature, and the header is
//! never read, so any `alg` is accepted. The resulting claims are only good
//! for display and expiry bookkeeping; the backend re-checks every credential
//! it receives.

use crate::error::SessionError;
use crate::time_utils::{format_utc_rfc3339, now_unix_secs};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

/// base64url, with or without trailing padding.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Expiration time (Unix timestamp). Fractional values are truncated.
    #[serde(deserialize_with = "deserialize_exp")]
    pub exp: i64,
    /// Set on OAuth-issued tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_superuser: Option<bool>,
    /// Every other claim, by name
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Whether the token expired before now. A token expiring this very
    /// second is still usable.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_unix_secs())
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.exp < now
    }

    /// Expiry as a UTC timestamp, if `exp` is in range.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    /// Expiry formatted as RFC3339, for display.
    pub fn expires_at_rfc3339(&self) -> Option<String> {
        self.expires_at().map(format_utc_rfc3339)
    }

    /// Look up any claim by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match name {
            "exp" | "is_superuser" => None,
            _ => self.extra.get(name),
        }
    }

    /// Best human-readable name for the token's subject.
    pub fn display_name(&self) -> Option<String> {
        ["full_name", "username", "name", "email"]
            .iter()
            .filter_map(|key| self.extra.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(String::from)
    }

    pub fn is_superuser(&self) -> bool {
        self.is_superuser.unwrap_or(false)
    }
}

fn deserialize_exp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = Number::deserialize(deserializer)?;
    number
        .as_i64()
        .or_else(|| {
            number
                .as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        })
        .ok_or_else(|| serde::de::Error::custom(format!("exp out of range: {number}")))
}

/// Decode a JWT's payload without verifying its signature.
///
/// Only the second dot-separated segment is looked at. A token without one,
/// whose payload is not base64url JSON, or that lacks a numeric `exp` is
/// reported as [`SessionError::MalformedToken`].
pub fn decode(token: &str) -> Result<Claims, SessionError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(SessionError::MalformedToken("empty token".to_string()));
    }

    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| SessionError::MalformedToken("missing payload segment".to_string()))?;
    let bytes = PAYLOAD_ENGINE
        .decode(payload)
        .map_err(|e| SessionError::MalformedToken(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| SessionError::MalformedToken(format!("invalid payload: {e}")))
}
