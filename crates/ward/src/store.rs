// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token store: access credential, refresh credential, and profile snapshot.
//!
//! Readers see an in-memory snapshot that is swapped as a whole, so a
//! concurrent reader never observes a half-written or half-cleared session.
//! Writes go through to a [`SlotBackend`] that survives restarts.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Boxed future returned by [`SlotBackend`] methods.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send + 'a>>;

/// One independently addressable persisted slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Access,
    Refresh,
    Profile,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Access, Slot::Refresh, Slot::Profile];

    /// Stable, versionless storage key.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Access => "access_token",
            Self::Refresh => "refresh_token",
            Self::Profile => "user_profile",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.key() == key)
    }

    /// Whether the slot holds a credential (as opposed to the profile).
    pub fn is_credential(&self) -> bool {
        matches!(self, Self::Access | Self::Refresh)
    }
}

/// Denormalized user snapshot cached next to the credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// Credentials issued by a login or refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access: String,
    pub refresh: String,
    /// `None` keeps the existing profile snapshot.
    pub profile: Option<UserProfile>,
}

/// Consistent copy of all three slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSnapshot {
    pub access: Option<String>,
    pub refresh: Option<String>,
    pub profile: Option<UserProfile>,
}

impl StoreSnapshot {
    pub fn is_empty(&self) -> bool {
        self.access.is_none() && self.refresh.is_none() && self.profile.is_none()
    }
}

/// Persistence collaborator behind [`TokenStore`].
///
/// Object-safe for use as `Box<dyn SlotBackend>`.
pub trait SlotBackend: Send + Sync + 'static {
    fn load(&self, slot: Slot) -> BackendFuture<'_, Option<String>>;

    fn save<'a>(&'a self, slot: Slot, value: &'a str) -> BackendFuture<'a, ()>;

    fn remove(&self, slot: Slot) -> BackendFuture<'_, ()>;

    /// Directory backing the slots, if any. Used to watch for foreign writes.
    fn location(&self) -> Option<&Path> {
        None
    }
}

/// Process-local backend. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryBackend {
    slots: Mutex<HashMap<Slot, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlotBackend for MemoryBackend {
    fn load(&self, slot: Slot) -> BackendFuture<'_, Option<String>> {
        let value = self.slots.lock().get(&slot).cloned();
        Box::pin(async move { Ok(value) })
    }

    fn save<'a>(&'a self, slot: Slot, value: &'a str) -> BackendFuture<'a, ()> {
        self.slots.lock().insert(slot, value.to_owned());
        Box::pin(async { Ok(()) })
    }

    fn remove(&self, slot: Slot) -> BackendFuture<'_, ()> {
        self.slots.lock().remove(&slot);
        Box::pin(async { Ok(()) })
    }
}

/// One file per slot inside a state directory, written atomically.
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, slot: Slot) -> PathBuf {
        self.dir.join(slot.key())
    }
}

impl SlotBackend for FileBackend {
    fn load(&self, slot: Slot) -> BackendFuture<'_, Option<String>> {
        let path = self.path_for(slot);
        Box::pin(async move {
            match tokio::fs::read_to_string(&path).await {
                Ok(s) => Ok(Some(s)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn save<'a>(&'a self, slot: Slot, value: &'a str) -> BackendFuture<'a, ()> {
        Box::pin(async move { write_atomic(&self.dir, &self.path_for(slot), value).await })
    }

    fn remove(&self, slot: Slot) -> BackendFuture<'_, ()> {
        let path = self.path_for(slot);
        Box::pin(async move {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.dir)
    }
}

/// Write tmp + rename. The tmp name is unique per process and call so racing
/// writers never share a half-written file.
async fn write_atomic(dir: &Path, path: &Path, contents: &str) -> anyhow::Result<()> {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    tokio::fs::create_dir_all(dir).await?;
    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        ".{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    tokio::fs::write(&tmp_path, contents).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

/// Owner of the session's credentials and profile snapshot.
pub struct TokenStore {
    backend: Box<dyn SlotBackend>,
    cache: RwLock<StoreSnapshot>,
    /// Serializes writers so compound updates reach the backend in order.
    write: tokio::sync::Mutex<()>,
}

impl TokenStore {
    /// Open a store, seeding the snapshot from whatever the backend holds.
    pub async fn open(backend: impl SlotBackend) -> anyhow::Result<Self> {
        let backend: Box<dyn SlotBackend> = Box::new(backend);
        let access = backend.load(Slot::Access).await?;
        let refresh = backend.load(Slot::Refresh).await?;
        let profile = backend.load(Slot::Profile).await?.and_then(|raw| parse_profile(&raw));
        debug!(
            has_access = access.is_some(),
            has_refresh = refresh.is_some(),
            "token store opened"
        );
        Ok(Self {
            backend,
            cache: RwLock::new(StoreSnapshot { access, refresh, profile }),
            write: tokio::sync::Mutex::new(()),
        })
    }

    /// Empty store over a [`MemoryBackend`].
    pub fn in_memory() -> Self {
        Self {
            backend: Box::new(MemoryBackend::new()),
            cache: RwLock::new(StoreSnapshot::default()),
            write: tokio::sync::Mutex::new(()),
        }
    }

    pub fn access(&self) -> Option<String> {
        self.cache.read().access.clone()
    }

    pub fn refresh(&self) -> Option<String> {
        self.cache.read().refresh.clone()
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.cache.read().profile.clone()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.cache.read().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    /// Raw persisted form of a slot as this context last saw it.
    pub fn raw(&self, slot: Slot) -> Option<String> {
        let cache = self.cache.read();
        match slot {
            Slot::Access => cache.access.clone(),
            Slot::Refresh => cache.refresh.clone(),
            Slot::Profile => cache.profile.as_ref().and_then(|p| serde_json::to_string(p).ok()),
        }
    }

    /// Directory behind the backend, when it has one.
    pub fn location(&self) -> Option<&Path> {
        self.backend.location()
    }

    pub async fn set_access(&self, credential: &str) -> anyhow::Result<()> {
        let _w = self.write.lock().await;
        self.backend.save(Slot::Access, credential).await?;
        self.cache.write().access = Some(credential.to_owned());
        Ok(())
    }

    pub async fn set_refresh(&self, credential: &str) -> anyhow::Result<()> {
        let _w = self.write.lock().await;
        self.backend.save(Slot::Refresh, credential).await?;
        self.cache.write().refresh = Some(credential.to_owned());
        Ok(())
    }

    pub async fn set_profile(&self, profile: &UserProfile) -> anyhow::Result<()> {
        let raw = serde_json::to_string(profile)?;
        let _w = self.write.lock().await;
        self.backend.save(Slot::Profile, &raw).await?;
        self.cache.write().profile = Some(profile.clone());
        Ok(())
    }

    /// Install a freshly issued session as one unit.
    pub async fn replace(&self, tokens: &SessionTokens) -> anyhow::Result<()> {
        let _w = self.write.lock().await;
        self.write_tokens(tokens).await
    }

    /// Install `tokens` only if the stored refresh credential is still
    /// `expected`. Returns `false` (and writes nothing) otherwise.
    pub async fn replace_if_refresh(
        &self,
        expected: &str,
        tokens: &SessionTokens,
    ) -> anyhow::Result<bool> {
        let _w = self.write.lock().await;
        if self.cache.read().refresh.as_deref() != Some(expected) {
            return Ok(false);
        }
        self.write_tokens(tokens).await?;
        Ok(true)
    }

    async fn write_tokens(&self, tokens: &SessionTokens) -> anyhow::Result<()> {
        self.backend.save(Slot::Access, &tokens.access).await?;
        self.backend.save(Slot::Refresh, &tokens.refresh).await?;
        if let Some(ref profile) = tokens.profile {
            let raw = serde_json::to_string(profile)?;
            self.backend.save(Slot::Profile, &raw).await?;
        }

        let mut cache = self.cache.write();
        cache.access = Some(tokens.access.clone());
        cache.refresh = Some(tokens.refresh.clone());
        if let Some(ref profile) = tokens.profile {
            cache.profile = Some(profile.clone());
        }
        Ok(())
    }

    /// Remove all three slots. The snapshot empties in one step before the
    /// backend is touched; backend failures are reported after every slot
    /// has been attempted.
    pub async fn clear(&self) -> anyhow::Result<()> {
        let _w = self.write.lock().await;
        self.clear_locked().await
    }

    /// Clear only if the stored refresh credential is still `expected`, checked
    /// and cleared under one write lock. Returns `false` (and clears nothing)
    /// when a newer session was installed in the meantime.
    pub async fn clear_if_refresh(&self, expected: Option<&str>) -> anyhow::Result<bool> {
        let _w = self.write.lock().await;
        if self.cache.read().refresh.as_deref() != expected {
            return Ok(false);
        }
        self.clear_locked().await?;
        Ok(true)
    }

    async fn clear_locked(&self) -> anyhow::Result<()> {
        *self.cache.write() = StoreSnapshot::default();

        let mut first_err = None;
        for slot in Slot::ALL {
            if let Err(e) = self.backend.remove(slot).await {
                warn!(slot = slot.key(), err = %e, "failed to remove persisted slot");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Adopt a change another context already persisted. Only the snapshot
    /// is updated; the backend already holds the value.
    pub async fn apply_external(&self, slot: Slot, value: Option<&str>) {
        let _w = self.write.lock().await;
        let mut cache = self.cache.write();
        match slot {
            Slot::Access => cache.access = value.map(str::to_owned),
            Slot::Refresh => cache.refresh = value.map(str::to_owned),
            Slot::Profile => cache.profile = value.and_then(parse_profile),
        }
    }
}

fn parse_profile(raw: &str) -> Option<UserProfile> {
    match serde_json::from_str(raw) {
        Ok(p) => Some(p),
        Err(e) => {
            warn!(err = %e, "ignoring unreadable profile snapshot");
            None
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
