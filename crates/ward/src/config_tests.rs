// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use super::SessionConfig;

#[derive(Debug, Parser)]
struct Cli {
    #[command(flatten)]
    session: SessionConfig,
}

fn parse(args: &[&str]) -> SessionConfig {
    Cli::parse_from(args).session
}

#[test]
fn clap_defaults_match_default_impl() {
    let parsed = parse(&["tokenward"]);
    let default = SessionConfig::default();
    assert_eq!(parsed.login_path, default.login_path);
    assert_eq!(parsed.refresh_path, default.refresh_path);
    assert_eq!(parsed.refresh_window_secs, default.refresh_window_secs);
    assert_eq!(parsed.monitor_interval_secs, default.monitor_interval_secs);
    assert_eq!(parsed.monitor_throttle_ms, default.monitor_throttle_ms);
    assert_eq!(parsed.refresh_timeout_secs, default.refresh_timeout_secs);
    assert_eq!(parsed.network_retries, default.network_retries);
    assert_eq!(parsed.notify_debounce_ms, default.notify_debounce_ms);
}

#[test]
fn duration_accessors() -> anyhow::Result<()> {
    let config = parse(&[
        "tokenward",
        "--refresh-window-secs",
        "120",
        "--monitor-throttle-ms",
        "250",
        "--refresh-timeout-secs",
        "7",
    ]);
    config.validate()?;
    assert_eq!(config.refresh_window(), Duration::from_secs(120));
    assert_eq!(config.monitor_throttle(), Duration::from_millis(250));
    assert_eq!(config.refresh_timeout(), Duration::from_secs(7));
    Ok(())
}

#[test]
fn explicit_state_dir_wins() {
    let config = parse(&["tokenward", "--state-dir", "/tmp/tw-state"]);
    assert_eq!(config.state_dir(), PathBuf::from("/tmp/tw-state"));
}

#[yare::parameterized(
    zero_interval = { &["tokenward", "--monitor-interval-secs", "0"] },
    zero_timeout = { &["tokenward", "--refresh-timeout-secs", "0"] },
    relative_path = { &["tokenward", "--refresh-path", "auth/refresh"] },
    bad_scheme = { &["tokenward", "--auth-url", "ftp://auth.example.com"] },
)]
fn invalid_settings_rejected(args: &[&str]) {
    assert!(parse(args).validate().is_err());
}

#[test]
fn https_auth_url_accepted() -> anyhow::Result<()> {
    parse(&["tokenward", "--auth-url", "https://auth.example.com"]).validate()
}

#[test]
fn endpoints_join_base_url() {
    let config = parse(&["tokenward", "--auth-url", "https://auth.example.com/"]);
    assert_eq!(config.login_url().as_deref(), Some("https://auth.example.com/auth/login"));
    assert_eq!(config.refresh_url().as_deref(), Some("https://auth.example.com/auth/refresh"));
    assert_eq!(SessionConfig::default().refresh_url(), None);
}
