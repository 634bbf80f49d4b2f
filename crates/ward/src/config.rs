// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Session coordinator configuration.
#[derive(Debug, Clone, clap::Args)]
pub struct SessionConfig {
    /// Base URL of the authentication service.
    #[arg(long, env = "TOKENWARD_AUTH_URL")]
    pub auth_url: Option<String>,

    /// Login endpoint path, relative to the auth URL.
    #[arg(long, default_value = "/auth/login", env = "TOKENWARD_LOGIN_PATH")]
    pub login_path: String,

    /// Refresh endpoint path, relative to the auth URL. Requests to it bypass the gate.
    #[arg(long, default_value = "/auth/refresh", env = "TOKENWARD_REFRESH_PATH")]
    pub refresh_path: String,

    /// Renew the access credential this many seconds before it expires.
    #[arg(long, default_value_t = 300, env = "TOKENWARD_REFRESH_WINDOW_SECS")]
    pub refresh_window_secs: u64,

    /// Session check interval in seconds.
    #[arg(long, default_value_t = 60, env = "TOKENWARD_MONITOR_INTERVAL_SECS")]
    pub monitor_interval_secs: u64,

    /// Minimum spacing between session checks in milliseconds.
    #[arg(long, default_value_t = 5000, env = "TOKENWARD_MONITOR_THROTTLE_MS")]
    pub monitor_throttle_ms: u64,

    /// Upper bound on a single refresh call in seconds.
    #[arg(long, default_value_t = 15, env = "TOKENWARD_REFRESH_TIMEOUT_SECS")]
    pub refresh_timeout_secs: u64,

    /// Extra attempts after a transient refresh failure before expiring.
    #[arg(long, default_value_t = 0, env = "TOKENWARD_NETWORK_RETRIES")]
    pub network_retries: u32,

    /// Suppress repeat expiry notifications within this many milliseconds.
    #[arg(long, default_value_t = 3000, env = "TOKENWARD_NOTIFY_DEBOUNCE_MS")]
    pub notify_debounce_ms: u64,

    /// Directory holding the persisted session.
    #[arg(long, env = "TOKENWARD_STATE_DIR")]
    pub state_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auth_url: None,
            login_path: "/auth/login".to_owned(),
            refresh_path: "/auth/refresh".to_owned(),
            refresh_window_secs: 300,
            monitor_interval_secs: 60,
            monitor_throttle_ms: 5000,
            refresh_timeout_secs: 15,
            network_retries: 0,
            notify_debounce_ms: 3000,
            state_dir: None,
        }
    }
}

impl SessionConfig {
    pub fn refresh_window(&self) -> Duration {
        Duration::from_secs(self.refresh_window_secs)
    }

    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }

    pub fn monitor_throttle(&self) -> Duration {
        Duration::from_millis(self.monitor_throttle_ms)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    pub fn notify_debounce(&self) -> Duration {
        Duration::from_millis(self.notify_debounce_ms)
    }

    pub fn login_url(&self) -> Option<String> {
        self.endpoint(&self.login_path)
    }

    /// Requests to this URL are never intercepted by the gate.
    pub fn refresh_url(&self) -> Option<String> {
        self.endpoint(&self.refresh_path)
    }

    fn endpoint(&self, path: &str) -> Option<String> {
        let base = self.auth_url.as_deref()?.trim_end_matches('/');
        Some(format!("{base}{path}"))
    }

    /// Resolve the state directory.
    ///
    /// Checks `--state-dir`, then `$XDG_STATE_HOME/tokenward`, then
    /// `$HOME/.local/state/tokenward`.
    pub fn state_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.state_dir {
            return dir.clone();
        }
        if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
            return PathBuf::from(xdg).join("tokenward");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(".local/state/tokenward");
        }
        PathBuf::from(".tokenward")
    }

    /// Reject settings the coordinator cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.monitor_interval_secs == 0 {
            anyhow::bail!("--monitor-interval-secs must be greater than zero");
        }
        if self.refresh_timeout_secs == 0 {
            anyhow::bail!("--refresh-timeout-secs must be greater than zero");
        }
        if !self.refresh_path.starts_with('/') || !self.login_path.starts_with('/') {
            anyhow::bail!("endpoint paths must start with '/'");
        }
        if let Some(ref url) = self.auth_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!("--auth-url must be an http(s) URL: {url}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
