// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subcommand execution. Each returns the process exit code.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use tokenward::config::SessionConfig;
use tokenward::events::{EventBus, Navigator, Notifier};
use tokenward::expire::ExpirationHandler;
use tokenward::store::{FileBackend, TokenStore};
use tokenward::validator::TokenValidator;
use tokenward::AuthContext;

use crate::config::{parse_method, Command, Config};
use crate::status::StatusReport;
use crate::terminal::{TerminalNavigator, TerminalNotifier};

pub async fn run(config: Config) -> anyhow::Result<i32> {
    let Config { session, command, .. } = config;
    match command {
        Command::Login { identifier, secret } => login(session, &identifier, &secret).await,
        Command::Logout => logout(session).await,
        Command::Status { json } => status(session, json).await,
        Command::Request { method, url, data } => {
            request(session, &method, &url, data.as_deref()).await
        }
        Command::Watch => watch(session).await,
    }
}

fn sinks() -> (Arc<dyn Notifier>, Arc<dyn Navigator>) {
    (Arc::new(TerminalNotifier), Arc::new(TerminalNavigator))
}

async fn open_store(session: &SessionConfig) -> anyhow::Result<Arc<TokenStore>> {
    let dir = session.state_dir();
    debug!(dir = %dir.display(), "opening session store");
    Ok(Arc::new(TokenStore::open(FileBackend::new(dir)).await?))
}

async fn login(session: SessionConfig, identifier: &str, secret: &str) -> anyhow::Result<i32> {
    let (notifier, navigator) = sinks();
    let ctx = AuthContext::open(session, notifier, navigator).await?;
    let tokens = ctx.login(identifier, secret).await?;
    match tokens.profile {
        Some(p) => println!("logged in as {} <{}>", p.name, p.email),
        None => println!("logged in"),
    }
    Ok(0)
}

async fn logout(session: SessionConfig) -> anyhow::Result<i32> {
    let store = open_store(&session).await?;
    let (notifier, navigator) = sinks();
    let expiration = ExpirationHandler::new(
        store,
        EventBus::default(),
        notifier,
        navigator,
        session.notify_debounce(),
    );
    expiration.logout().await;
    println!("logged out");
    Ok(0)
}

async fn status(session: SessionConfig, json: bool) -> anyhow::Result<i32> {
    let store = open_store(&session).await?;
    let validator = TokenValidator::new(session.refresh_window());
    let report = StatusReport::collect(&store, &validator, &session.state_dir());
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.render_text());
    }
    Ok(0)
}

async fn request(
    session: SessionConfig,
    method: &str,
    url: &str,
    data: Option<&str>,
) -> anyhow::Result<i32> {
    let method = parse_method(method)?;
    let (notifier, navigator) = sinks();
    let ctx = AuthContext::open(session, notifier, navigator).await?;

    let mut builder = ctx.gate.request(method, url);
    if let Some(data) = data {
        builder = builder.json(&serde_json::from_str::<serde_json::Value>(data)?);
    }
    let resp = ctx.gate.send(builder).await?;
    let status = resp.status();
    info!(%status, url, "response received");
    let body = resp.text().await?;

    eprintln!("{status}");
    if !body.is_empty() {
        println!("{body}");
    }
    Ok(if status.is_success() { 0 } else { 1 })
}

async fn watch(session: SessionConfig) -> anyhow::Result<i32> {
    let (notifier, navigator) = sinks();
    let ctx = AuthContext::open(session, notifier, navigator).await?;
    let mut events = ctx.subscribe();
    let shutdown = CancellationToken::new();
    let _signals = ctx.spawn_monitor(shutdown.clone());

    println!("{}", ctx.state());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => println!("{event}"),
                Err(RecvError::Lagged(n)) => debug!(skipped = n, "event receiver lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }
    shutdown.cancel();
    Ok(0)
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
