// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::routing::post;
use axum::Router;
use parking_lot::Mutex;
use tokio::net::TcpListener;

use super::*;

/// Mock auth service answering both endpoints from a scripted response list.
/// Records every request body it receives.
async fn mock_auth_server(
    responses: Vec<(u16, String)>,
) -> (SocketAddr, Arc<AtomicU32>, Arc<Mutex<Vec<serde_json::Value>>>) {
    let call_count = Arc::new(AtomicU32::new(0));
    let bodies = Arc::new(Mutex::new(Vec::new()));
    let responses = Arc::new(responses);

    let handler = {
        let count = Arc::clone(&call_count);
        let bodies = Arc::clone(&bodies);
        move |body: String| {
            let count = Arc::clone(&count);
            let bodies = Arc::clone(&bodies);
            let resps = Arc::clone(&responses);
            async move {
                bodies.lock().push(serde_json::from_str(&body).unwrap_or_default());
                let idx = count.fetch_add(1, Ordering::Relaxed) as usize;
                let (status, body) = resps
                    .get(idx)
                    .or_else(|| resps.last())
                    .cloned()
                    .unwrap_or((500, "{}".to_owned()));
                (
                    axum::http::StatusCode::from_u16(status)
                        .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR),
                    body,
                )
            }
        }
    };

    let app = Router::new()
        .route("/auth/login", post(handler.clone()))
        .route("/auth/refresh", post(handler));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    (addr, call_count, bodies)
}

fn service(addr: SocketAddr) -> HttpAuthService {
    crate::install_crypto_provider();
    HttpAuthService::new(
        &format!("http://{addr}/"),
        "/auth/login",
        "/auth/refresh",
        Duration::from_secs(5),
    )
    .expect("build auth client")
}

#[test]
fn urls_join_base_and_paths() -> anyhow::Result<()> {
    crate::install_crypto_provider();
    let svc = HttpAuthService::new(
        "https://auth.example.com/",
        "/auth/login",
        "/auth/refresh",
        Duration::from_secs(1),
    )?;
    assert_eq!(svc.login_url(), "https://auth.example.com/auth/login");
    assert_eq!(svc.refresh_url(), "https://auth.example.com/auth/refresh");
    Ok(())
}

#[test]
fn from_config_requires_auth_url() {
    crate::install_crypto_provider();
    assert!(HttpAuthService::from_config(&SessionConfig::default()).is_err());
}

#[tokio::test]
async fn login_success_returns_tokens_and_profile() -> anyhow::Result<()> {
    let body = serde_json::json!({
        "access_token": "acc-1",
        "refresh_token": "ref-1",
        "user": { "id": "u-1", "name": "Ada", "email": "ada@example.com", "role": "admin" }
    })
    .to_string();
    let (addr, count, bodies) = mock_auth_server(vec![(200, body)]).await;

    let tokens = service(addr).login("ada@example.com", "hunter2").await?;
    assert_eq!(tokens.access, "acc-1");
    assert_eq!(tokens.refresh, "ref-1");
    assert_eq!(tokens.profile.map(|p| p.role), Some("admin".to_owned()));
    assert_eq!(count.load(Ordering::Relaxed), 1);

    let sent = bodies.lock().clone();
    assert_eq!(sent[0]["identifier"], "ada@example.com");
    assert_eq!(sent[0]["secret"], "hunter2");
    Ok(())
}

#[yare::parameterized(
    unauthorized = { 401 },
    forbidden = { 403 },
    bad_request = { 400 },
)]
#[test_macro(tokio::test)]
async fn login_rejection_is_bad_credentials(status: u16) {
    let (addr, _, _) = mock_auth_server(vec![(status, r#"{"error":"nope"}"#.into())]).await;
    let result = service(addr).login("a", "b").await;
    assert_eq!(result, Err(LoginError::BadCredentials));
}

#[tokio::test]
async fn login_server_error_is_unavailable() {
    let (addr, _, _) = mock_auth_server(vec![(503, r#"{"message":"maintenance"}"#.into())]).await;
    let result = service(addr).login("a", "b").await;
    assert!(
        matches!(result, Err(LoginError::Unavailable(ref m)) if m.contains("maintenance")),
        "got {result:?}"
    );
}

#[tokio::test]
async fn login_unreachable_is_unavailable() -> anyhow::Result<()> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);

    let result = service(addr).login("a", "b").await;
    assert!(matches!(result, Err(LoginError::Unavailable(_))), "got {result:?}");
    Ok(())
}

#[tokio::test]
async fn refresh_success_sends_refresh_token() -> anyhow::Result<()> {
    let body = serde_json::json!({ "access_token": "acc-2", "refresh_token": "ref-2" }).to_string();
    let (addr, _, bodies) = mock_auth_server(vec![(200, body)]).await;

    let tokens = service(addr).refresh("ref-1").await?;
    assert_eq!(tokens.access, "acc-2");
    assert_eq!(tokens.refresh, "ref-2");
    assert_eq!(tokens.profile, None);
    assert_eq!(bodies.lock()[0]["refresh_token"], "ref-1");
    Ok(())
}

#[tokio::test]
async fn refresh_without_rotation_keeps_sent_credential() -> anyhow::Result<()> {
    let body = serde_json::json!({ "access_token": "acc-2" }).to_string();
    let (addr, _, _) = mock_auth_server(vec![(200, body)]).await;

    let tokens = service(addr).refresh("ref-1").await?;
    assert_eq!(tokens.refresh, "ref-1");
    Ok(())
}

#[tokio::test]
async fn refresh_unauthorized_is_rejected() {
    let (addr, _, _) =
        mock_auth_server(vec![(401, r#"{"error":"invalid_grant"}"#.into())]).await;
    let result = service(addr).refresh("dead").await;
    assert_eq!(result, Err(RefreshError::Rejected("invalid_grant".into())));
}

#[tokio::test]
async fn refresh_server_error_is_network_failure() {
    let (addr, _, _) = mock_auth_server(vec![(502, "bad gateway".into())]).await;
    let result = service(addr).refresh("ref").await;
    assert!(matches!(result, Err(RefreshError::Network(_))), "got {result:?}");
    assert!(result.err().is_some_and(|e| e.is_transient()));
}

#[tokio::test]
async fn refresh_garbage_body_is_network_failure() {
    let (addr, _, _) = mock_auth_server(vec![(200, "<html>".into())]).await;
    let result = service(addr).refresh("ref").await;
    assert!(matches!(result, Err(RefreshError::Network(ref m)) if m.contains("parse")));
}
