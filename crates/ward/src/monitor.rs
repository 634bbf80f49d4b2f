// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background session checks driven by a timer and environment signals.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::expire::ExpirationHandler;
use crate::refresh::RefreshCoordinator;
use crate::store::{Slot, TokenStore};
use crate::validator::{SessionState, TokenValidator};

/// A slot written or removed by another context sharing the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub slot: Slot,
    /// New raw value, `None` when the slot was removed.
    pub value: Option<String>,
}

/// What woke the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Timer,
    FocusRegained,
    StorageChanged(StorageChange),
}

#[derive(Debug, Default)]
struct MonitorState {
    last_checked_at: Option<Instant>,
    last_result: Option<SessionState>,
}

/// Resets the `checking` flag however the check ends.
struct CheckGuard<'a>(&'a AtomicBool);

impl Drop for CheckGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Proactively refreshes or expires the session outside of any request.
pub struct SessionMonitor {
    store: Arc<TokenStore>,
    validator: TokenValidator,
    coordinator: Arc<RefreshCoordinator>,
    expiration: Arc<ExpirationHandler>,
    interval: Duration,
    throttle: Duration,
    checking: AtomicBool,
    state: Mutex<MonitorState>,
}

impl SessionMonitor {
    pub fn new(
        store: Arc<TokenStore>,
        validator: TokenValidator,
        coordinator: Arc<RefreshCoordinator>,
        expiration: Arc<ExpirationHandler>,
        interval: Duration,
        throttle: Duration,
    ) -> Self {
        Self {
            store,
            validator,
            coordinator,
            expiration,
            interval,
            throttle,
            checking: AtomicBool::new(false),
            state: Mutex::new(MonitorState::default()),
        }
    }

    pub fn last_checked_at(&self) -> Option<Instant> {
        self.state.lock().last_checked_at
    }

    /// Result of the last completed check, or the current classification
    /// when no check has run yet.
    pub fn last_result(&self) -> SessionState {
        match self.state.lock().last_result {
            Some(result) => result,
            None => self.classify(),
        }
    }

    /// Whether a check is running right now.
    pub fn is_checking(&self) -> bool {
        self.checking.load(Ordering::Acquire)
    }

    fn classify(&self) -> SessionState {
        let snap = self.store.snapshot();
        self.validator.classify(snap.access.as_deref(), snap.refresh.as_deref())
    }

    /// React to one trigger and return the resulting session state.
    pub async fn handle(&self, trigger: Trigger) -> SessionState {
        match trigger {
            Trigger::Timer | Trigger::FocusRegained => self.check().await,
            Trigger::StorageChanged(change) => self.storage_changed(change).await,
        }
    }

    async fn storage_changed(&self, change: StorageChange) -> SessionState {
        if self.store.raw(change.slot) == change.value {
            return self.last_result();
        }

        match (change.slot.is_credential(), change.value) {
            (true, None) => {
                info!(slot = change.slot.key(), "credential removed by another context");
                self.store.apply_external(change.slot, None).await;
                self.expiration.expire_if(self.store.refresh().as_deref()).await;
                let result = self.classify();
                self.record(result);
                result
            }
            (true, Some(value)) => {
                debug!(slot = change.slot.key(), "credential updated by another context");
                self.store.apply_external(change.slot, Some(&value)).await;
                self.expiration.arm().await;
                self.check().await
            }
            (false, value) => {
                debug!("profile changed by another context");
                self.store.apply_external(change.slot, value.as_deref()).await;
                self.last_result()
            }
        }
    }

    async fn check(&self) -> SessionState {
        if self.checking.swap(true, Ordering::AcqRel) {
            debug!("check already running");
            return self.last_result();
        }
        let _guard = CheckGuard(&self.checking);

        let throttled = {
            let state = self.state.lock();
            match (state.last_checked_at, state.last_result) {
                (Some(at), Some(result)) if at.elapsed() < self.throttle => Some(result),
                _ => None,
            }
        };
        if let Some(result) = throttled {
            debug!(%result, "session check throttled");
            return result;
        }

        let snap = self.store.snapshot();
        let current = self.validator.classify(snap.access.as_deref(), snap.refresh.as_deref());
        let result = match current {
            SessionState::Expired => {
                if self.expiration.expire_if(snap.refresh.as_deref()).await {
                    SessionState::Expired
                } else {
                    self.classify()
                }
            }
            SessionState::NeedsRefresh => match self.coordinator.ensure_valid().await {
                Some(_) => SessionState::Active,
                None => SessionState::Expired,
            },
            SessionState::Active => SessionState::Active,
        };
        debug!(%result, "session checked");
        self.record(result);
        result
    }

    fn record(&self, result: SessionState) {
        let mut state = self.state.lock();
        state.last_checked_at = Some(Instant::now());
        state.last_result = Some(result);
    }

    /// Check on every tick of the interval timer and on every signal until
    /// `shutdown` is cancelled. The first tick fires immediately.
    pub async fn run(
        self: Arc<Self>,
        mut signals: mpsc::Receiver<Trigger>,
        shutdown: CancellationToken,
    ) {
        let mut timer = tokio::time::interval(self.interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            let trigger = tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => Trigger::Timer,
                Some(trigger) = signals.recv() => trigger,
            };
            let result = self.handle(trigger).await;
            debug!(%result, "monitor cycle complete");
        }
        debug!("session monitor stopped");
    }
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
