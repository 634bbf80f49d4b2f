// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session signals and the user-facing sinks they drive.
//!
//! UI layers subscribe to [`SessionEvent`]s on a broadcast channel instead
//! of reaching into the token store. Notification and navigation are
//! injected collaborators so the same coordinator serves a terminal, a
//! desktop shell, or a test harness.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Lifecycle signals. Carry no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEvent {
    LoggedIn,
    Refreshed,
    LoggedOut,
    SessionExpired,
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoggedIn => f.write_str("logged_in"),
            Self::Refreshed => f.write_str("refreshed"),
            Self::LoggedOut => f.write_str("logged_out"),
            Self::SessionExpired => f.write_str("session_expired"),
        }
    }
}

/// Publishes [`SessionEvent`]s. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Surfaces a message to the user.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, message: &str);
}

/// Moves the user to the unauthenticated entry point.
pub trait Navigator: Send + Sync + 'static {
    fn to_login(&self);
}

/// Logs notifications. Default for headless use.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        warn!("{message}");
    }
}

/// Logs navigation requests. Default for headless use.
#[derive(Debug, Default)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn to_login(&self) {
        info!("login required");
    }
}
