// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-flight credential refresh.
//!
//! However many callers discover a stale access credential at once, one
//! network refresh runs and every caller receives its outcome. The refresh
//! itself runs on a spawned task: once issued it is never cancelled, so a
//! caller that gives up cannot strand the others.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::auth::AuthService;
use crate::error::RefreshError;
use crate::events::{EventBus, SessionEvent};
use crate::expire::ExpirationHandler;
use crate::store::TokenStore;
use crate::validator::TokenValidator;

/// Initial backoff between transient refresh failures.
const INITIAL_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Maximum backoff between transient refresh failures.
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Outcome handed to every waiter.
type Outcome = Option<String>;

/// In-flight bookkeeping. `waiters` is non-empty only while `in_progress`.
#[derive(Default)]
struct RefreshState {
    in_progress: bool,
    waiters: Vec<oneshot::Sender<Outcome>>,
}

/// Guarantees at most one refresh call in flight and fans out its result.
pub struct RefreshCoordinator {
    store: Arc<TokenStore>,
    validator: TokenValidator,
    service: Arc<dyn AuthService>,
    expiration: Arc<ExpirationHandler>,
    events: EventBus,
    timeout: Duration,
    network_retries: u32,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<TokenStore>,
        validator: TokenValidator,
        service: Arc<dyn AuthService>,
        expiration: Arc<ExpirationHandler>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            validator,
            service,
            expiration,
            events,
            timeout: Duration::from_secs(15),
            network_retries: 0,
            state: Mutex::new(RefreshState::default()),
        }
    }

    /// Bound each refresh call. A timeout counts as a transient failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extra attempts after transient failures before the session expires.
    pub fn with_network_retries(mut self, retries: u32) -> Self {
        self.network_retries = retries;
        self
    }

    /// Whether a refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.state.lock().in_progress
    }

    /// Number of callers awaiting the in-flight refresh.
    pub fn waiter_count(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Return a usable access credential, refreshing first when needed.
    ///
    /// `None` means the session is gone; the expiration handler has already
    /// run (or the user logged out while the refresh was in flight).
    pub async fn ensure_valid(self: &Arc<Self>) -> Option<String> {
        let access = self.store.access();
        if self.usable(access.as_deref()) {
            return access;
        }

        let (tx, rx) = oneshot::channel();
        let lead = {
            let mut state = self.state.lock();
            state.waiters.push(tx);
            if state.in_progress {
                debug!(waiters = state.waiters.len(), "joining in-flight refresh");
                false
            } else {
                state.in_progress = true;
                true
            }
        };

        if lead {
            let this = Arc::clone(self);
            tokio::spawn(async move {
                let outcome = this.run_refresh().await;
                this.settle(outcome);
            });
        }

        rx.await.unwrap_or(None)
    }

    fn usable(&self, access: Option<&str>) -> bool {
        self.validator.is_valid(access) && !self.validator.should_refresh(access)
    }

    /// Reset the state and hand the outcome to every waiter. The flag and
    /// the list are reset together, before anyone is woken.
    fn settle(&self, outcome: Outcome) {
        let waiters = {
            let mut state = self.state.lock();
            state.in_progress = false;
            std::mem::take(&mut state.waiters)
        };
        debug!(waiters = waiters.len(), ok = outcome.is_some(), "refresh settled");
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }

    async fn run_refresh(&self) -> Outcome {
        // A refresh may have settled between the caller's check and taking the lead.
        let access = self.store.access();
        if self.usable(access.as_deref()) {
            return access;
        }

        let stored = self.store.refresh();
        let refresh = match &stored {
            Some(r) if self.validator.is_valid(Some(r)) => r.clone(),
            _ => {
                return self.fail(stored.as_deref(), RefreshError::NoRefreshCredential).await;
            }
        };

        match self.call_with_retries(&refresh).await {
            Ok(tokens) => match self.store.replace_if_refresh(&refresh, &tokens).await {
                Ok(true) => {
                    info!(profile = tokens.profile.is_some(), "credentials refreshed");
                    self.events.publish(SessionEvent::Refreshed);
                    Some(tokens.access)
                }
                Ok(false) => {
                    debug!("session changed during refresh, discarding result");
                    self.current_usable()
                }
                Err(e) => {
                    warn!(err = %e, "failed to store refreshed credentials");
                    self.expiration.expire().await;
                    None
                }
            },
            Err(e) => self.fail(Some(&refresh), e).await,
        }
    }

    async fn call_with_retries(
        &self,
        refresh: &str,
    ) -> Result<crate::store::SessionTokens, RefreshError> {
        let mut backoff = INITIAL_RETRY_BACKOFF;
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(self.timeout, self.service.refresh(refresh))
                .await
            {
                Ok(r) => r,
                Err(_) => Err(RefreshError::TimedOut),
            };
            match result {
                Err(e) if e.is_transient() && attempt < self.network_retries => {
                    attempt += 1;
                    warn!(
                        attempt,
                        max = self.network_retries,
                        err = %e,
                        "refresh failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_RETRY_BACKOFF);
                }
                other => return other,
            }
        }
    }

    fn current_usable(&self) -> Outcome {
        let access = self.store.access();
        if self.validator.is_valid(access.as_deref()) {
            access
        } else {
            None
        }
    }

    /// Expire the session the refresh was attempted for. A session installed
    /// meanwhile survives and its access credential is handed out instead.
    async fn fail(&self, refresh: Option<&str>, err: RefreshError) -> Outcome {
        if self.expiration.expire_if(refresh).await {
            warn!(err = %err, "refresh failed, session expired");
            return None;
        }
        debug!(err = %err, "refresh failed after session changed, ignoring");
        self.current_usable()
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
