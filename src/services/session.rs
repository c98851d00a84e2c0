// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session manager: decides whether the current session is authenticated.
//!
//! Resolution looks at both credential families. Local credentials take
//! priority over the OAuth token when both are valid, and any branch that
//! ends in a logout makes the whole session unauthenticated.
//!
//! Passes run one at a time. A pass only publishes its result if the store
//! still holds the credentials the result was derived from; otherwise the
//! store changed underneath it and the pass starts over.

use crate::error::SessionError;
use crate::models::claims::{self, Claims};
use crate::models::{CredentialFamily, LoginRequest, RegistrationRequest, SessionState, UserProfile};
use crate::services::api_client::ApiClient;
use crate::services::google_token::GoogleTokenValidator;
use crate::services::refresh::TokenRefresher;
use crate::services::token_store::{StoreEvent, TokenKind, TokenStore};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex, Notify};
use tokio::task::JoinHandle;
use validator::Validate;

/// Passes attempted before giving up on a store that keeps changing.
const MAX_ATTEMPTS: usize = 4;

/// Outcome of resolving one credential family.
#[derive(Debug)]
enum Branch {
    /// No credential of this family is stored
    Absent,
    /// The credential was unusable and dropped without a full logout
    Discarded,
    /// Resolution ended the whole session
    LoggedOut,
    Authorized { claims: Claims, token: String },
}

/// Store contents a resolved state depends on.
#[derive(Debug)]
enum Basis {
    /// Holds whatever the store contains
    Unconditional,
    /// The access token is still `token`
    Local(String),
    /// No access token, and the OAuth token is still `token`
    OAuth(String),
    /// Neither an access token nor an OAuth token
    Empty,
}

impl Basis {
    fn holds(&self, store: &TokenStore) -> bool {
        let access = store.get(TokenKind::Access);
        let google = store.get(TokenKind::GoogleAccess);
        match self {
            Basis::Unconditional => true,
            Basis::Local(token) => access.as_ref() == Some(token),
            Basis::OAuth(token) => access.is_none() && google.as_ref() == Some(token),
            Basis::Empty => access.is_none() && google.is_none(),
        }
    }
}

fn combine(local: Branch, oauth: Branch) -> (SessionState, Basis) {
    match (local, oauth) {
        (Branch::LoggedOut, _) | (_, Branch::LoggedOut) => (SessionState::unauthenticated(), Basis::Empty),
        (Branch::Authorized { claims, token }, _) => (
            SessionState::authorized(CredentialFamily::Local, claims),
            Basis::Local(token),
        ),
        (_, Branch::Authorized { claims, token }) => (
            SessionState::authorized(CredentialFamily::OAuth, claims),
            Basis::OAuth(token),
        ),
        _ => (SessionState::unauthenticated(), Basis::Empty),
    }
}

fn clear_identity(state: &mut SessionState) {
    state.is_authorized = false;
    state.user = None;
    state.authority = None;
}

/// Owns the published [`SessionState`].
pub struct SessionManager {
    store: Arc<TokenStore>,
    refresher: Arc<TokenRefresher>,
    validator: Arc<GoogleTokenValidator>,
    api: Arc<ApiClient>,
    state: watch::Sender<SessionState>,
    /// Held for the whole of a resolution pass
    pass: Mutex<()>,
    /// Wakes the resync worker; permits coalesce while a pass runs
    changed: Notify,
    torn_down: AtomicBool,
}

impl SessionManager {
    pub fn new(
        store: Arc<TokenStore>,
        refresher: Arc<TokenRefresher>,
        validator: Arc<GoogleTokenValidator>,
        api: Arc<ApiClient>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::loading());
        Self {
            store,
            refresher,
            validator,
            api,
            state,
            pass: Mutex::new(()),
            changed: Notify::new(),
            torn_down: AtomicBool::new(false),
        }
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Run a full resolution pass, publishing `loading` while it runs.
    ///
    /// Never fails: every problem degrades to an unauthenticated session,
    /// including a panic inside resolution.
    pub async fn activate(&self) -> SessionState {
        self.publish_with(|s| s.loading = true);

        let state = self.run_pass(false).await;
        tracing::info!(
            is_authorized = state.is_authorized,
            authority = ?state.authority,
            "Session resolved"
        );
        state
    }

    /// Re-resolve after a credential change without flipping `loading`.
    ///
    /// Waits for a pass already in progress and then runs a fresh one, so
    /// the result always reflects the store as of this call.
    pub async fn resync(&self) -> SessionState {
        let state = self.run_pass(true).await;
        tracing::debug!(is_authorized = state.is_authorized, "Session resynced");
        state
    }

    /// Clear every credential and publish an unauthenticated session.
    pub fn logout(&self) {
        tracing::info!("Logging out");
        self.store.clear_all();
        self.publish_with(clear_identity);
    }

    /// Log in with username and password.
    ///
    /// Nothing is stored unless the returned access token decodes.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<SessionState, SessionError> {
        let pair = self.api.obtain_token_pair(credentials).await?;
        let claims = claims::decode(&pair.access)?;

        let basis = Basis::Local(pair.access.clone());
        self.store.set_local_pair(pair.access, pair.refresh);
        let state = SessionState::authorized(CredentialFamily::Local, claims);
        if !self.publish_if_current(state.clone(), &basis, false) {
            tracing::debug!("Login state not published");
        }

        tracing::info!(username = %credentials.username, "Logged in");
        Ok(state)
    }

    /// Create an account after local validation. Does not log in.
    pub async fn register(&self, request: &RegistrationRequest) -> Result<UserProfile, SessionError> {
        request
            .validate()
            .map_err(|e| SessionError::BadRequest(e.to_string()))?;

        let profile = self.api.register(request).await?;
        tracing::info!(username = %profile.username, "Registered new account");
        Ok(profile)
    }

    /// Bind activation and store-change handling to the returned handle.
    pub fn mount(self: &Arc<Self>) -> MountedSession {
        self.torn_down.store(false, Ordering::SeqCst);

        // Subscribe before activating so no change is missed
        let events = self.store.subscribe();
        let listener = tokio::spawn(Arc::clone(self).listen(events));
        let worker = tokio::spawn(Arc::clone(self).resync_worker());

        let manager = Arc::clone(self);
        let activation = tokio::spawn(async move {
            manager.activate().await;
        });

        MountedSession {
            manager: Arc::clone(self),
            tasks: vec![activation, listener, worker],
        }
    }

    /// Apply store changes. A full clear is published at once; every event
    /// also schedules a resync.
    async fn listen(self: Arc<Self>, mut events: broadcast::Receiver<StoreEvent>) {
        loop {
            match events.recv().await {
                Ok(StoreEvent::ClearedAll) => {
                    let mut cleared = self.current();
                    clear_identity(&mut cleared);
                    self.publish_if_current(cleared, &Basis::Empty, true);
                    self.changed.notify_one();
                }
                Ok(event) => {
                    tracing::trace!(event = ?event, "Store changed; scheduling resync");
                    self.changed.notify_one();
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Store events lagged; resyncing");
                    self.changed.notify_one();
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    async fn resync_worker(self: Arc<Self>) {
        loop {
            self.changed.notified().await;
            self.resync().await;
        }
    }

    /// Resolve until the result still matches the store, then publish it.
    async fn run_pass(&self, keep_loading: bool) -> SessionState {
        let _pass = self.pass.lock().await;

        for attempt in 1..=MAX_ATTEMPTS {
            let (state, basis) = self.resolve_guarded().await;
            if self.torn_down.load(Ordering::SeqCst) {
                return state;
            }
            if self.publish_if_current(state.clone(), &basis, keep_loading) {
                return self.current();
            }
            tracing::debug!(attempt, "Credentials changed during resolution; resolving again");
        }

        tracing::warn!("Credentials kept changing during resolution; treating session as unauthenticated");
        let mut state = SessionState::unauthenticated();
        self.publish_with(|s| {
            if keep_loading {
                state.loading = s.loading;
            }
            *s = state.clone();
        });
        state
    }

    async fn resolve_guarded(&self) -> (SessionState, Basis) {
        match AssertUnwindSafe(self.resolve()).catch_unwind().await {
            Ok(resolved) => resolved,
            Err(_) => {
                tracing::error!("Session resolution panicked; treating session as unauthenticated");
                (SessionState::unauthenticated(), Basis::Unconditional)
            }
        }
    }

    async fn resolve(&self) -> (SessionState, Basis) {
        let local = self.resolve_local().await;
        let oauth = self.resolve_oauth().await;
        tracing::debug!(local = ?local, oauth = ?oauth, "Credential families resolved");
        combine(local, oauth)
    }

    async fn resolve_local(&self) -> Branch {
        let Some(access) = self.store.get(TokenKind::Access) else {
            return Branch::Absent;
        };

        let decoded = match claims::decode(&access) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "Stored access token is malformed; discarding local credentials");
                self.store.clear_local();
                return Branch::Discarded;
            }
        };

        if !decoded.is_expired() {
            return Branch::Authorized {
                claims: decoded,
                token: access,
            };
        }

        tracing::info!(exp = decoded.exp, "Access token expired; refreshing");
        let refreshed = match self.refresher.refresh().await {
            Ok(token) => claims::decode(&token).map(|claims| (claims, token)),
            Err(failure) => Err(SessionError::RefreshFailed(failure.to_string())),
        };

        match refreshed {
            Ok((claims, token)) => Branch::Authorized { claims, token },
            Err(e) => {
                tracing::warn!(error = %e, "Could not refresh access token");
                self.logout();
                Branch::LoggedOut
            }
        }
    }

    async fn resolve_oauth(&self) -> Branch {
        let Some(token) = self.store.get(TokenKind::GoogleAccess) else {
            return Branch::Absent;
        };

        let decoded = match claims::decode(&token) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "Stored OAuth token is malformed");
                self.logout();
                return Branch::LoggedOut;
            }
        };

        if decoded.is_expired() {
            tracing::info!(exp = decoded.exp, "OAuth token expired");
            self.logout();
            return Branch::LoggedOut;
        }

        let validation = self.validator.validate(&token).await;
        match validation.claims {
            Some(claims) if validation.valid => Branch::Authorized { claims, token },
            _ => {
                tracing::warn!("OAuth token failed remote validation; resetting session");
                self.logout();
                Branch::LoggedOut
            }
        }
    }

    /// Publish `state` only if `basis` still holds. The check runs under the
    /// channel's write lock, so a concurrent clear is either seen here or
    /// published after this.
    fn publish_if_current(&self, mut state: SessionState, basis: &Basis, keep_loading: bool) -> bool {
        if self.torn_down.load(Ordering::SeqCst) {
            return false;
        }
        self.state.send_if_modified(|current| {
            if !basis.holds(&self.store) {
                return false;
            }
            if keep_loading {
                state.loading = current.loading;
            }
            *current = state;
            true
        })
    }

    fn publish_with(&self, update: impl FnOnce(&mut SessionState)) {
        if self.torn_down.load(Ordering::SeqCst) {
            return;
        }
        self.state.send_modify(update);
    }
}

/// Keeps a [`SessionManager`] mounted. Dropping it aborts in-flight
/// resolution and stops further state publication.
pub struct MountedSession {
    manager: Arc<SessionManager>,
    tasks: Vec<JoinHandle<()>>,
}

impl MountedSession {
    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }
}

impl Drop for MountedSession {
    fn drop(&mut self) {
        self.manager.torn_down.store(true, Ordering::SeqCst);
        for task in &self.tasks {
            task.abort();
        }
    }
}
