// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honored for local development.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Backend endpoint paths, relative to `API_URL`.
pub mod endpoints {
    pub const LOGIN: &str = "token/";
    pub const REFRESH: &str = "token/refresh/";
    pub const REGISTER: &str = "user/register/";
    pub const VALIDATE_GOOGLE_TOKEN: &str = "google/validate_token/";
    pub const CURRENT_USER: &str = "auth/user/";
    pub const GOOGLE_LOGIN: &str = "accounts/google/login/";
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the portfolio backend API (e.g. `http://localhost:8000/api`)
    pub api_url: String,
    /// Login entry point of the app shell
    pub login_route: String,
    /// Authenticated home view of the app shell
    pub home_route: String,
    /// Where credentials are persisted; `None` keeps them in memory only
    pub token_store_path: Option<PathBuf>,
    /// Timeout applied to every backend request
    pub http_timeout: Duration,
    /// App shell port
    pub port: u16,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000/api".to_string(),
            login_route: "/login".to_string(),
            home_route: "/".to_string(),
            token_store_path: None,
            http_timeout: Duration::from_secs(10),
            port: 5173,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let http_timeout_secs = match env::var("HTTP_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                name: "HTTP_TIMEOUT_SECS",
                value: raw,
            })?,
            Err(_) => 10,
        };

        Ok(Self {
            api_url: env::var("API_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("API_URL"))?,
            login_route: env::var("LOGIN_ROUTE").unwrap_or_else(|_| "/login".to_string()),
            home_route: env::var("HOME_ROUTE").unwrap_or_else(|_| "/".to_string()),
            token_store_path: env::var("TOKEN_STORE_PATH")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            http_timeout: Duration::from_secs(http_timeout_secs),
            port: env::var("PORT")
                .unwrap_or_else(|_| "5173".to_string())
                .parse()
                .unwrap_or(5173),
        })
    }

    /// Absolute URL of a backend endpoint.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Where the browser is sent to start the OAuth login.
    pub fn google_login_url(&self) -> String {
        self.endpoint(endpoints::GOOGLE_LOGIN)
    }

    /// Build the HTTP client shared by every backend call.
    pub fn http_client(&self) -> anyhow::Result<reqwest::Client> {
        use anyhow::Context;

        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed building backend HTTP client")
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}
