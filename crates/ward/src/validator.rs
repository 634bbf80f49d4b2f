// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential validity and proactive-refresh classification.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec;

/// Derived session state. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Access credential valid and outside the refresh window.
    Active,
    /// Access credential invalid or inside the window; refresh credential valid.
    NeedsRefresh,
    /// Refresh credential absent or invalid.
    Expired,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::NeedsRefresh => f.write_str("needs_refresh"),
            Self::Expired => f.write_str("expired"),
        }
    }
}

/// Answers "is this credential usable" and "should it be renewed now".
///
/// Every check is a pure function of the credential and the clock. The
/// `*_at` variants take the clock (epoch millis) explicitly.
#[derive(Debug, Clone, Copy)]
pub struct TokenValidator {
    refresh_window: Duration,
}

impl TokenValidator {
    pub fn new(refresh_window: Duration) -> Self {
        Self { refresh_window }
    }

    pub fn refresh_window(&self) -> Duration {
        self.refresh_window
    }

    pub fn is_valid(&self, credential: Option<&str>) -> bool {
        self.is_valid_at(credential, epoch_ms())
    }

    /// False when absent, undecodable, or `expires_at <= now`.
    pub fn is_valid_at(&self, credential: Option<&str>, now_ms: u64) -> bool {
        let Some(credential) = credential else {
            return false;
        };
        match codec::decode(credential) {
            Ok(claims) => claims.expires_at_ms() > now_ms,
            Err(_) => false,
        }
    }

    pub fn should_refresh(&self, credential: Option<&str>) -> bool {
        self.should_refresh_at(credential, epoch_ms())
    }

    /// True when absent, undecodable, or `expires_at <= now + window`.
    pub fn should_refresh_at(&self, credential: Option<&str>, now_ms: u64) -> bool {
        let Some(credential) = credential else {
            return true;
        };
        match codec::decode(credential) {
            Ok(claims) => {
                let window_ms = u64::try_from(self.refresh_window.as_millis()).unwrap_or(u64::MAX);
                claims.expires_at_ms() <= now_ms.saturating_add(window_ms)
            }
            Err(_) => true,
        }
    }

    pub fn classify(&self, access: Option<&str>, refresh: Option<&str>) -> SessionState {
        self.classify_at(access, refresh, epoch_ms())
    }

    pub fn classify_at(
        &self,
        access: Option<&str>,
        refresh: Option<&str>,
        now_ms: u64,
    ) -> SessionState {
        if self.is_valid_at(access, now_ms) && !self.should_refresh_at(access, now_ms) {
            return SessionState::Active;
        }
        if self.is_valid_at(refresh, now_ms) {
            SessionState::NeedsRefresh
        } else {
            SessionState::Expired
        }
    }

    /// Seconds until the credential expires, `None` if undecodable or past.
    pub fn expires_in_secs(&self, credential: Option<&str>) -> Option<u64> {
        let claims = codec::decode(credential?).ok()?;
        let now = epoch_ms();
        let at = claims.expires_at_ms();
        (at > now).then(|| (at - now) / 1000)
    }
}

/// Current epoch millis.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
#[path = "validator_tests.rs"]
mod tests;
