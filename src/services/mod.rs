// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - session and credential logic.

pub mod api_client;
pub mod google_token;
pub mod navigation;
pub mod oauth_redirect;
pub mod refresh;
pub mod session;
pub mod token_store;

pub use api_client::{ApiClient, GOOGLE_TOKEN_HEADER};
pub use google_token::{GoogleTokenValidator, TokenValidation};
pub use navigation::{Destination, Navigator};
pub use oauth_redirect::{CallbackParams, OAuthRedirectHandler, RedirectState};
pub use refresh::{RefreshFailure, TokenRefresher};
pub use session::{MountedSession, SessionManager};
pub use token_store::{FileBackend, MemoryBackend, StorageBackend, StoreEvent, TokenKind, TokenStore};
