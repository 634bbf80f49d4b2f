// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Detects session slots written or removed by other processes.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::monitor::{StorageChange, Trigger};
use crate::store::{Slot, TokenStore};

/// Watches a file-backed store's directory for slots written or removed by
/// other processes. Uses `notify` for filesystem events with a polling
/// fallback.
pub struct StorageWatcher {
    dir: PathBuf,
    store: Arc<TokenStore>,
    seen: HashMap<Slot, Option<String>>,
    poll_interval: Duration,
}

impl StorageWatcher {
    pub fn new(dir: impl Into<PathBuf>, store: Arc<TokenStore>) -> Self {
        let seen = Slot::ALL.into_iter().map(|slot| (slot, store.raw(slot))).collect();
        Self { dir: dir.into(), store, seen, poll_interval: Duration::from_secs(5) }
    }

    /// Watch the directory behind `store`, if its backend has one.
    pub fn for_store(store: Arc<TokenStore>) -> Option<Self> {
        let dir = store.location()?.to_path_buf();
        Some(Self::new(dir, store))
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Read every slot and report those that changed since the last scan and
    /// that this context did not write itself.
    pub fn scan(&mut self) -> anyhow::Result<Vec<StorageChange>> {
        let mut changes = Vec::new();
        for slot in Slot::ALL {
            let value = match std::fs::read_to_string(self.dir.join(slot.key())) {
                Ok(s) => Some(s),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(e.into()),
            };
            if self.seen.get(&slot) == Some(&value) {
                continue;
            }
            self.seen.insert(slot, value.clone());
            if self.store.raw(slot) == value {
                continue;
            }
            debug!(slot = slot.key(), removed = value.is_none(), "foreign slot change");
            changes.push(StorageChange { slot, value });
        }
        Ok(changes)
    }

    /// Forward foreign changes to the monitor until `shutdown` is cancelled
    /// or the channel closes.
    pub async fn run(mut self, tx: mpsc::Sender<Trigger>, shutdown: CancellationToken) {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            warn!(dir = %self.dir.display(), err = %e, "cannot create state directory");
        }
        let (wake_tx, mut wake_rx) = mpsc::channel::<()>(1);
        let _watcher = self.setup_notify_watcher(wake_tx);

        let mut poll_interval = tokio::time::interval(self.poll_interval);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = wake_rx.recv() => {}
                _ = poll_interval.tick() => {}
            }

            let changes = match self.scan() {
                Ok(changes) => changes,
                Err(e) => {
                    warn!(err = %e, "failed to scan state directory");
                    continue;
                }
            };
            for change in changes {
                if tx.send(Trigger::StorageChanged(change)).await.is_err() {
                    return;
                }
            }
        }
    }

    /// Returns the watcher handle (must be kept alive). `None` falls back to
    /// polling alone.
    fn setup_notify_watcher(
        &self,
        wake_tx: mpsc::Sender<()>,
    ) -> Option<notify::RecommendedWatcher> {
        use notify::{RecursiveMode, Watcher};

        let mut watcher = notify::recommended_watcher(move |_: notify::Result<notify::Event>| {
            let _ = wake_tx.try_send(());
        })
        .ok()?;
        watcher.watch(&self.dir, RecursiveMode::NonRecursive).ok()?;
        Some(watcher)
    }
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
