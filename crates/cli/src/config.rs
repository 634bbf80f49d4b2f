// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::{Parser, Subcommand};
use reqwest::Method;

use tokenward::config::SessionConfig;

/// Client-side session and credential coordinator.
#[derive(Debug, Parser)]
#[command(name = "tokenward", version, about)]
pub struct Config {
    /// Log format (json or text).
    #[arg(long, env = "TOKENWARD_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "TOKENWARD_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    #[command(flatten)]
    pub session: SessionConfig,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Sign in and persist the session.
    Login {
        #[arg(long)]
        identifier: String,

        #[arg(long, env = "TOKENWARD_SECRET", hide_env_values = true)]
        secret: String,
    },
    /// Sign out and remove the persisted session.
    Logout,
    /// Show the session state, credential expiries, and profile.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Send a request with the session's credential attached.
    Request {
        method: String,
        url: String,

        /// JSON request body.
        #[arg(long)]
        data: Option<String>,
    },
    /// Keep the session fresh and print session events until interrupted.
    Watch,
}

impl Config {
    /// Reject invalid flag combinations before anything starts.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !matches!(self.log_format.as_str(), "json" | "text") {
            anyhow::bail!("--log-format must be json or text");
        }
        self.session.validate()?;
        match self.command {
            Command::Login { .. } | Command::Request { .. } | Command::Watch
                if self.session.auth_url.is_none() =>
            {
                anyhow::bail!("--auth-url is required for this command");
            }
            Command::Request { ref method, ref data, .. } => {
                parse_method(method)?;
                if let Some(data) = data {
                    serde_json::from_str::<serde_json::Value>(data)
                        .map_err(|e| anyhow::anyhow!("--data is not valid JSON: {e}"))?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

pub fn parse_method(method: &str) -> anyhow::Result<Method> {
    Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| anyhow::anyhow!("invalid HTTP method: {method}"))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
