// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt::Write;
use std::path::Path;

use serde::Serialize;

use tokenward::store::{TokenStore, UserProfile};
use tokenward::validator::{SessionState, TokenValidator};

/// Point-in-time view of the persisted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub state: SessionState,
    pub access_expires_in_secs: Option<u64>,
    pub refresh_expires_in_secs: Option<u64>,
    pub profile: Option<UserProfile>,
    pub state_dir: String,
}

impl StatusReport {
    pub fn collect(store: &TokenStore, validator: &TokenValidator, state_dir: &Path) -> Self {
        let snap = store.snapshot();
        Self {
            state: validator.classify(snap.access.as_deref(), snap.refresh.as_deref()),
            access_expires_in_secs: validator.expires_in_secs(snap.access.as_deref()),
            refresh_expires_in_secs: validator.expires_in_secs(snap.refresh.as_deref()),
            profile: snap.profile,
            state_dir: state_dir.display().to_string(),
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "state:   {}", self.state);
        let _ = writeln!(out, "access:  {}", expiry(self.access_expires_in_secs));
        let _ = writeln!(out, "refresh: {}", expiry(self.refresh_expires_in_secs));
        if let Some(ref p) = self.profile {
            let _ = writeln!(out, "user:    {} <{}> ({})", p.name, p.email, p.role);
        }
        let _ = write!(out, "store:   {}", self.state_dir);
        out
    }
}

fn expiry(secs: Option<u64>) -> String {
    match secs {
        Some(s) => format!("expires in {}", human(s)),
        None => "expired or absent".to_owned(),
    }
}

/// Compact duration such as `2h 5m`, `4m 10s`, or `9s`.
pub fn human(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h {m}m")
    } else if m > 0 {
        format!("{m}m {s}s")
    } else {
        format!("{s}s")
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
