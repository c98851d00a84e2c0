// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Process-wide credential storage.
//!
//! The store owns the three credential kinds. Every mutation is written
//! through to a [`StorageBackend`] and then broadcast to subscribers, so the
//! session manager learns about changes made anywhere in the process.

use crate::config::Config;
use anyhow::Context;
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// The credential kinds held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
    GoogleAccess,
}

impl TokenKind {
    pub const ALL: [TokenKind; 3] = [TokenKind::Access, TokenKind::Refresh, TokenKind::GoogleAccess];

    /// Key used in persistent storage.
    pub fn storage_key(self) -> &'static str {
        match self {
            TokenKind::Access => "ACCESS_TOKEN",
            TokenKind::Refresh => "REFRESH_TOKEN",
            TokenKind::GoogleAccess => "GOOGLE_ACCESS_TOKEN",
        }
    }

    pub fn from_storage_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.storage_key() == key)
    }
}

/// Change notification published after a mutation is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    Set(TokenKind),
    Cleared(TokenKind),
    ClearedAll,
}

/// Where the store persists its entries.
pub trait StorageBackend: Send + Sync {
    /// Load all persisted entries, keyed by storage key.
    fn load(&self) -> anyhow::Result<HashMap<String, String>>;

    /// Replace the persisted entries.
    fn save(&self, entries: &HashMap<String, String>) -> anyhow::Result<()>;
}

/// Volatile backend. Credentials do not survive a restart.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    /// Backend pre-populated as if a previous run had saved `entries`.
    pub fn with_entries(entries: HashMap<String, String>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self) -> anyhow::Result<HashMap<String, String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory backend lock poisoned"))?;
        Ok(entries.clone())
    }

    fn save(&self, entries: &HashMap<String, String>) -> anyhow::Result<()> {
        let mut stored = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory backend lock poisoned"))?;
        *stored = entries.clone();
        Ok(())
    }
}

/// JSON file backend.
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn load(&self) -> anyhow::Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }

        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed reading token file {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }

        let values: HashMap<String, serde_json::Value> = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing token file {}", self.path.display()))?;

        Ok(values
            .into_iter()
            .filter_map(|(key, value)| match value {
                serde_json::Value::String(s) => Some((key, s)),
                _ => None,
            })
            .collect())
    }

    fn save(&self, entries: &HashMap<String, String>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }

        let body = serde_json::to_string_pretty(entries).context("failed encoding tokens")?;

        // Write then rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, body)
            .with_context(|| format!("failed writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed replacing {}", self.path.display()))?;
        Ok(())
    }
}

/// Single owner of the stored credentials.
pub struct TokenStore {
    tokens: DashMap<TokenKind, String>,
    backend: Box<dyn StorageBackend>,
    /// Serializes mutate-then-persist so saves never interleave
    write_lock: Mutex<()>,
    events: broadcast::Sender<StoreEvent>,
}

impl TokenStore {
    /// Open a store over `backend`, loading whatever it already holds.
    ///
    /// An unreadable backend is logged and the store starts empty.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        let tokens = DashMap::new();
        match backend.load() {
            Ok(entries) => {
                for (key, value) in entries {
                    match TokenKind::from_storage_key(&key) {
                        Some(kind) if !value.is_empty() => {
                            tokens.insert(kind, value);
                        }
                        Some(_) => {}
                        None => tracing::debug!(key = %key, "Ignoring unknown stored key"),
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to load stored credentials, starting empty"),
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            tokens,
            backend,
            write_lock: Mutex::new(()),
            events,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryBackend::default()))
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        let backend = FileBackend::new(path);
        tracing::info!(path = %backend.path().display(), "Opening token store");
        Self::new(Box::new(backend))
    }

    /// File-backed when `TOKEN_STORE_PATH` is configured, memory otherwise.
    pub fn from_config(config: &Config) -> Self {
        match &config.token_store_path {
            Some(path) => Self::open(path.clone()),
            None => Self::in_memory(),
        }
    }

    pub fn get(&self, kind: TokenKind) -> Option<String> {
        self.tokens.get(&kind).map(|v| v.value().clone())
    }

    pub fn contains(&self, kind: TokenKind) -> bool {
        self.tokens.contains_key(&kind)
    }

    pub fn set(&self, kind: TokenKind, value: impl Into<String>) {
        let value = value.into();
        self.mutate(|tokens| {
            tokens.insert(kind, value);
            vec![StoreEvent::Set(kind)]
        });
    }

    /// Store a freshly issued access/refresh pair as one write.
    pub fn set_local_pair(&self, access: impl Into<String>, refresh: impl Into<String>) {
        let (access, refresh) = (access.into(), refresh.into());
        self.mutate(|tokens| {
            tokens.insert(TokenKind::Access, access);
            tokens.insert(TokenKind::Refresh, refresh);
            vec![
                StoreEvent::Set(TokenKind::Access),
                StoreEvent::Set(TokenKind::Refresh),
            ]
        });
    }

    pub fn clear(&self, kind: TokenKind) {
        self.mutate(|tokens| match tokens.remove(&kind) {
            Some(_) => vec![StoreEvent::Cleared(kind)],
            None => Vec::new(),
        });
    }

    /// Drop the local access/refresh pair, leaving any OAuth token alone.
    pub fn clear_local(&self) {
        self.mutate(|tokens| {
            [TokenKind::Access, TokenKind::Refresh]
                .into_iter()
                .filter(|kind| tokens.remove(kind).is_some())
                .map(StoreEvent::Cleared)
                .collect()
        });
    }

    /// Remove every credential. Always notifies subscribers.
    pub fn clear_all(&self) {
        self.mutate(|tokens| {
            tokens.clear();
            vec![StoreEvent::ClearedAll]
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn mutate<F>(&self, apply: F)
    where
        F: FnOnce(&DashMap<TokenKind, String>) -> Vec<StoreEvent>,
    {
        let events = {
            let _guard = self
                .write_lock
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let events = apply(&self.tokens);
            if !events.is_empty() {
                self.persist();
            }
            events
        };

        for event in events {
            tracing::debug!(event = ?event, "Token store changed");
            // No subscribers is fine
            let _ = self.events.send(event);
        }
    }

    fn persist(&self) {
        let snapshot: HashMap<String, String> = self
            .tokens
            .iter()
            .map(|entry| (entry.key().storage_key().to_string(), entry.value().clone()))
            .collect();

        if let Err(e) = self.backend.save(&snapshot) {
            tracing::warn!(error = %e, "Failed to persist credentials; keeping them in memory");
        }
    }
}
