// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tokenward: client-side session and credential lifecycle coordinator.

pub mod auth;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod expire;
pub mod gate;
pub mod monitor;
pub mod refresh;
pub mod store;
pub mod test_support;
pub mod validator;
pub mod watch;

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::auth::{AuthService, HttpAuthService};
use crate::config::SessionConfig;
use crate::events::{EventBus, Navigator, Notifier, SessionEvent};
use crate::expire::ExpirationHandler;
use crate::gate::RequestGate;
use crate::monitor::{SessionMonitor, Trigger};
use crate::refresh::RefreshCoordinator;
use crate::store::{FileBackend, SessionTokens, TokenStore};
use crate::validator::{SessionState, TokenValidator};
use crate::watch::StorageWatcher;

/// Install the ring rustls provider as the process default. reqwest needs
/// one even for plain HTTP. Safe to call repeatedly.
pub fn install_crypto_provider() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// One coordinator per client process, shared by every caller.
pub struct AuthContext {
    pub config: SessionConfig,
    pub store: Arc<TokenStore>,
    pub validator: TokenValidator,
    pub events: EventBus,
    pub service: Arc<dyn AuthService>,
    pub expiration: Arc<ExpirationHandler>,
    pub coordinator: Arc<RefreshCoordinator>,
    pub monitor: Arc<SessionMonitor>,
    pub gate: RequestGate,
}

impl AuthContext {
    pub fn new(
        config: SessionConfig,
        store: Arc<TokenStore>,
        service: Arc<dyn AuthService>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let validator = TokenValidator::new(config.refresh_window());
        let events = EventBus::default();
        let expiration = Arc::new(ExpirationHandler::new(
            Arc::clone(&store),
            events.clone(),
            notifier,
            navigator,
            config.notify_debounce(),
        ));
        let coordinator = Arc::new(
            RefreshCoordinator::new(
                Arc::clone(&store),
                validator,
                Arc::clone(&service),
                Arc::clone(&expiration),
                events.clone(),
            )
            .with_timeout(config.refresh_timeout())
            .with_network_retries(config.network_retries),
        );
        let monitor = Arc::new(SessionMonitor::new(
            Arc::clone(&store),
            validator,
            Arc::clone(&coordinator),
            Arc::clone(&expiration),
            config.monitor_interval(),
            config.monitor_throttle(),
        ));

        let http = reqwest::Client::builder().build()?;
        let mut gate = RequestGate::new(http, Arc::clone(&coordinator));
        if let Some(url) = config.refresh_url() {
            gate = gate.with_bypass(&url)?;
        }

        Ok(Self {
            config,
            store,
            validator,
            events,
            service,
            expiration,
            coordinator,
            monitor,
            gate,
        })
    }

    /// Open the persisted session under the configured state directory and
    /// talk to the configured auth service over HTTP.
    pub async fn open(
        config: SessionConfig,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
    ) -> anyhow::Result<Self> {
        let dir = config.state_dir();
        debug!(dir = %dir.display(), "opening session store");
        let store = Arc::new(TokenStore::open(FileBackend::new(dir)).await?);
        let service = Arc::new(HttpAuthService::from_config(&config)?);
        Self::new(config, store, service, notifier, navigator)
    }

    /// Exchange user credentials for a session. A failed login leaves any
    /// existing session untouched.
    pub async fn login(&self, identifier: &str, secret: &str) -> anyhow::Result<SessionTokens> {
        let tokens = self.service.login(identifier, secret).await?;
        self.store.replace(&tokens).await?;
        self.expiration.arm().await;
        self.events.publish(SessionEvent::LoggedIn);
        info!(profile = tokens.profile.is_some(), "logged in");
        Ok(tokens)
    }

    pub async fn logout(&self) {
        self.expiration.logout().await;
    }

    /// Current session state, derived from the store.
    pub fn state(&self) -> SessionState {
        let snap = self.store.snapshot();
        self.validator.classify(snap.access.as_deref(), snap.refresh.as_deref())
    }

    /// Usable access credential, refreshing first when needed.
    pub async fn ensure_valid(&self) -> Option<String> {
        self.coordinator.ensure_valid().await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Spawn the session monitor and, for file-backed stores, the storage
    /// watcher feeding it. Returns the sender for environment signals such
    /// as [`Trigger::FocusRegained`].
    pub fn spawn_monitor(&self, shutdown: CancellationToken) -> mpsc::Sender<Trigger> {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(Arc::clone(&self.monitor).run(rx, shutdown.clone()));

        if let Some(watcher) = StorageWatcher::for_store(Arc::clone(&self.store)) {
            tokio::spawn(watcher.run(tx.clone(), shutdown));
        }
        tx
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
