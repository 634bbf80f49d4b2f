// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single exit into the logged-out state.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::events::{EventBus, Navigator, Notifier, SessionEvent};
use crate::store::TokenStore;

/// Message shown to the user when their session ends involuntarily.
pub const EXPIRED_MESSAGE: &str = "Your session expired, please log in again.";

struct ExpiryState {
    /// Set while a session exists that has not yet been expired. Lets an
    /// already-cleared store be expired once (e.g. another context removed
    /// the slots) without repeating on every later check.
    armed: bool,
    last_ended: Option<Instant>,
    last_notified: Option<Instant>,
}

/// How the store is cleared on expiry.
enum Clear<'a> {
    Always,
    /// Only while the store still holds this refresh credential.
    IfRefresh(Option<&'a str>),
}

/// Clears the store, emits the signal, notifies, and navigates to login.
pub struct ExpirationHandler {
    store: Arc<TokenStore>,
    events: EventBus,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    debounce: Duration,
    state: Mutex<ExpiryState>,
}

impl ExpirationHandler {
    pub fn new(
        store: Arc<TokenStore>,
        events: EventBus,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        debounce: Duration,
    ) -> Self {
        let armed = !store.is_empty();
        Self {
            store,
            events,
            notifier,
            navigator,
            debounce,
            state: Mutex::new(ExpiryState { armed, last_ended: None, last_notified: None }),
        }
    }

    /// Mark that a session exists again (login, or another context logged in).
    pub async fn arm(&self) {
        self.state.lock().await.armed = true;
    }

    /// End the session involuntarily. Calls arriving within the debounce
    /// window of a previous end, with nothing left to clear, collapse into
    /// it. Returns whether this call did the work.
    pub async fn expire(&self) -> bool {
        self.end(Clear::Always).await
    }

    /// Like [`expire`](Self::expire), but only while the store still holds
    /// `refresh`. A session installed after the caller decided to expire
    /// survives, and `false` is returned.
    pub async fn expire_if(&self, refresh: Option<&str>) -> bool {
        self.end(Clear::IfRefresh(refresh)).await
    }

    async fn end(&self, clear: Clear<'_>) -> bool {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let recently =
            |at: Option<Instant>| at.is_some_and(|at| now.duration_since(at) < self.debounce);
        if !state.armed && self.store.is_empty() && recently(state.last_ended) {
            debug!("session already expired");
            return false;
        }

        let cleared = match clear {
            Clear::Always => self.store.clear().await.map(|()| true),
            Clear::IfRefresh(refresh) => self.store.clear_if_refresh(refresh).await,
        };
        match cleared {
            Ok(true) => {}
            Ok(false) => {
                debug!("session replaced before expiry, keeping it");
                return false;
            }
            Err(e) => warn!(err = %e, "failed to clear persisted session"),
        }
        state.armed = false;
        state.last_ended = Some(now);
        self.events.publish(SessionEvent::SessionExpired);

        if recently(state.last_notified) {
            debug!("expiry notification debounced");
        } else {
            self.notifier.notify(EXPIRED_MESSAGE);
            state.last_notified = Some(now);
        }
        self.navigator.to_login();

        info!("session expired");
        true
    }

    /// Explicit user logout. Always clears; never shows the expiry message.
    pub async fn logout(&self) {
        let mut state = self.state.lock().await;
        if let Err(e) = self.store.clear().await {
            warn!(err = %e, "failed to clear persisted session");
        }
        state.armed = false;
        state.last_ended = Some(Instant::now());
        self.events.publish(SessionEvent::LoggedOut);
        self.navigator.to_login();
        info!("logged out");
    }
}

#[cfg(test)]
#[path = "expire_tests.rs"]
mod tests;
