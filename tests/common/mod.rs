// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use folio_session::config::Config;
use folio_session::routes::create_router;
use folio_session::services::TokenStore;
use folio_session::AppState;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const GOOD_PASSWORD: &str = "correct-horse";
pub const SEED_REFRESH: &str = "refresh-seed";

/// Mint a token signed with a key the client never sees.
#[allow(dead_code)]
pub fn mint_token(exp_offset_secs: i64, extra: Value) -> String {
    let mut payload = json!({ "exp": folio_session::time_utils::now_unix_secs() + exp_offset_secs });
    if let (Some(map), Value::Object(extra)) = (payload.as_object_mut(), extra) {
        map.extend(extra);
    }
    encode(
        &Header::new(Algorithm::HS256),
        &payload,
        &EncodingKey::from_secret(b"backend-secret"),
    )
    .expect("Failed to mint token")
}

#[allow(dead_code)]
pub fn valid_token(username: &str) -> String {
    mint_token(3600, json!({ "username": username }))
}

#[allow(dead_code)]
pub fn expired_token(username: &str) -> String {
    mint_token(-3600, json!({ "username": username }))
}

/// Knobs and counters of the mock backend.
pub struct MockState {
    pub login_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub validate_calls: AtomicUsize,
    pub user_calls: AtomicUsize,
    pub protected_calls: AtomicUsize,
    pub refresh_status: AtomicU16,
    pub refresh_delay_ms: AtomicU64,
    pub refresh_rotates: AtomicBool,
    pub google_valid: AtomicBool,
    pub validate_delay_ms: AtomicU64,
    pub user_status: AtomicU16,
    pub protected_status: AtomicU16,
    pub protected_delay_ms: AtomicU64,
    pub seen_authorization: Mutex<Vec<Option<String>>>,
    pub seen_google_header: Mutex<Vec<Option<String>>>,
    pub seen_user_bearer: Mutex<Vec<Option<String>>>,
    pub issued_access: Mutex<Vec<String>>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            validate_calls: AtomicUsize::new(0),
            user_calls: AtomicUsize::new(0),
            protected_calls: AtomicUsize::new(0),
            refresh_status: AtomicU16::new(200),
            refresh_delay_ms: AtomicU64::new(0),
            refresh_rotates: AtomicBool::new(false),
            google_valid: AtomicBool::new(true),
            validate_delay_ms: AtomicU64::new(0),
            user_status: AtomicU16::new(200),
            protected_status: AtomicU16::new(200),
            protected_delay_ms: AtomicU64::new(0),
            seen_authorization: Mutex::new(Vec::new()),
            seen_google_header: Mutex::new(Vec::new()),
            seen_user_bearer: Mutex::new(Vec::new()),
            issued_access: Mutex::new(Vec::new()),
        }
    }
}

#[allow(dead_code)]
impl MockState {
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    pub fn protected_calls(&self) -> usize {
        self.protected_calls.load(Ordering::SeqCst)
    }

    pub fn set_refresh_status(&self, status: u16) {
        self.refresh_status.store(status, Ordering::SeqCst);
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        self.refresh_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_google_valid(&self, valid: bool) {
        self.google_valid.store(valid, Ordering::SeqCst);
    }

    pub fn set_validate_delay(&self, delay: Duration) {
        self.validate_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_protected_delay(&self, delay: Duration) {
        self.protected_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_user_status(&self, status: u16) {
        self.user_status.store(status, Ordering::SeqCst);
    }

    pub fn set_protected_status(&self, status: u16) {
        self.protected_status.store(status, Ordering::SeqCst);
    }

    pub fn authorization_headers(&self) -> Vec<Option<String>> {
        self.seen_authorization.lock().unwrap().clone()
    }

    pub fn google_headers(&self) -> Vec<Option<String>> {
        self.seen_google_header.lock().unwrap().clone()
    }

    pub fn user_bearers(&self) -> Vec<Option<String>> {
        self.seen_user_bearer.lock().unwrap().clone()
    }

    pub fn issued_access(&self) -> Vec<String> {
        self.issued_access.lock().unwrap().clone()
    }
}

/// In-process stand-in for the portfolio backend.
pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[allow(dead_code)]
impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());
        let router = Router::new()
            .route("/token/", post(obtain_pair))
            .route("/token/refresh/", post(refresh))
            .route("/google/validate_token/", post(validate_google))
            .route("/auth/user/", get(current_user).put(update_user))
            .route("/user/register/", post(register))
            .route("/protected/", get(protected).post(protected))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock backend");
        let addr = listener.local_addr().expect("mock backend address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn config(&self) -> Config {
        Config {
            api_url: self.url(),
            http_timeout: Duration::from_secs(5),
            ..Config::default()
        }
    }
}

/// Config pointing at a port nothing listens on.
#[allow(dead_code)]
pub fn unreachable_config() -> Config {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    Config {
        api_url: format!("http://{}", addr),
        http_timeout: Duration::from_secs(2),
        ..Config::default()
    }
}

/// Shared state over an in-memory token store.
#[allow(dead_code)]
pub fn test_state(config: Config) -> Arc<AppState> {
    let store = Arc::new(TokenStore::in_memory());
    Arc::new(AppState::with_store(config, store).expect("Failed to build app state"))
}

/// Create a test app against the mock backend.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(backend: &MockBackend) -> (axum::Router, Arc<AppState>) {
    let state = test_state(backend.config());
    (create_router(state.clone()), state)
}

async fn sleep_ms(delay: u64) {
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

fn profile(username: &str) -> Value {
    json!({
        "id": 42,
        "username": username,
        "email": format!("{username}@example.com"),
        "first_name": "Ada",
        "last_name": "Lovelace",
        "full_name": "Ada Lovelace",
        "profile_image": null
    })
}

async fn obtain_pair(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.login_calls.fetch_add(1, Ordering::SeqCst);
    let username = body["username"].as_str().unwrap_or_default().to_string();

    if body["password"] != GOOD_PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "No active account found with the given credentials"})),
        )
            .into_response();
    }

    let access = if username == "malformed" {
        "definitely.not.a-jwt".to_string()
    } else {
        valid_token(&username)
    };
    Json(json!({ "access": access, "refresh": SEED_REFRESH })).into_response()
}

async fn refresh(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let generation = state.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;

    sleep_ms(state.refresh_delay_ms.load(Ordering::SeqCst)).await;

    let status = state.refresh_status.load(Ordering::SeqCst);
    if status != 200 || body["refresh"].as_str().is_none() {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::UNAUTHORIZED);
        return (status, Json(json!({"detail": "Token is invalid or expired"}))).into_response();
    }

    let access = mint_token(3600, json!({ "username": "ada", "generation": generation }));
    state.issued_access.lock().unwrap().push(access.clone());

    if state.refresh_rotates.load(Ordering::SeqCst) {
        Json(json!({ "access": access, "refresh": format!("refresh-{generation}") })).into_response()
    } else {
        Json(json!({ "access": access })).into_response()
    }
}

async fn validate_google(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Json<Value> {
    state.validate_calls.fetch_add(1, Ordering::SeqCst);
    sleep_ms(state.validate_delay_ms.load(Ordering::SeqCst)).await;
    let valid = state.google_valid.load(Ordering::SeqCst) && body["access_token"].is_string();
    Json(json!({ "valid": valid }))
}

async fn current_user(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.user_calls.fetch_add(1, Ordering::SeqCst);
    state
        .seen_user_bearer
        .lock()
        .unwrap()
        .push(header_value(&headers, "authorization"));

    let status = state.user_status.load(Ordering::SeqCst);
    if status != 200 {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::UNAUTHORIZED);
        return (status, Json(json!({"detail": "Authentication credentials were not provided."})))
            .into_response();
    }
    Json(profile("ada")).into_response()
}

async fn update_user(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.user_calls.fetch_add(1, Ordering::SeqCst);
    let mut updated = profile("ada");
    if let (Some(current), Value::Object(changes)) = (updated.as_object_mut(), body) {
        current.extend(changes);
    }
    Json(updated).into_response()
}

async fn register(Json(body): Json<Value>) -> Response {
    let username = body["username"].as_str().unwrap_or_default();
    if username == "taken" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"username": ["A user with that username already exists."]})),
        )
            .into_response();
    }
    (StatusCode::CREATED, Json(profile(username))).into_response()
}

async fn protected(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.protected_calls.fetch_add(1, Ordering::SeqCst);
    state
        .seen_authorization
        .lock()
        .unwrap()
        .push(header_value(&headers, "authorization"));
    state
        .seen_google_header
        .lock()
        .unwrap()
        .push(header_value(&headers, "x-google-access-token"));

    sleep_ms(state.protected_delay_ms.load(Ordering::SeqCst)).await;
    let status = state.protected_status.load(Ordering::SeqCst);
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);
    (status, Json(json!({ "ok": status.is_success() }))).into_response()
}
