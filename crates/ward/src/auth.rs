// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote authentication service: login and refresh.
//!
//! [`HttpAuthService`] owns its own HTTP client. It never goes through the
//! [`RequestGate`](crate::gate::RequestGate), which is what keeps a refresh
//! from recursively triggering another refresh.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SessionConfig;
use crate::error::{LoginError, RefreshError};
use crate::store::{SessionTokens, UserProfile};

/// Boxed future returned by [`AuthService`] methods.
pub type AuthFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// The service that issues credentials.
///
/// Object-safe for use as `Arc<dyn AuthService>`.
pub trait AuthService: Send + Sync + 'static {
    fn login<'a>(
        &'a self,
        identifier: &'a str,
        secret: &'a str,
    ) -> AuthFuture<'a, SessionTokens, LoginError>;

    /// Exchange a refresh credential for a new pair. A response without a
    /// profile leaves the stored snapshot untouched.
    fn refresh<'a>(&'a self, refresh_token: &'a str)
        -> AuthFuture<'a, SessionTokens, RefreshError>;
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    identifier: &'a str,
    secret: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Successful login/refresh body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<UserProfile>,
}

/// Error body returned by the service.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorResponse {
    fn describe(body: &str) -> String {
        match serde_json::from_str::<ErrorResponse>(body) {
            Ok(ErrorResponse { message: Some(m), .. }) => m,
            Ok(ErrorResponse { error: Some(e), .. }) => e,
            _ => body.to_owned(),
        }
    }
}

/// JSON-over-HTTP implementation of [`AuthService`].
pub struct HttpAuthService {
    http: reqwest::Client,
    login_url: String,
    refresh_url: String,
}

impl HttpAuthService {
    /// Requires a process-wide rustls provider; see [`crate::install_crypto_provider`].
    pub fn new(
        base_url: &str,
        login_path: &str,
        refresh_path: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let base = base_url.trim_end_matches('/');
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            login_url: format!("{base}{login_path}"),
            refresh_url: format!("{base}{refresh_path}"),
        })
    }

    pub fn from_config(config: &SessionConfig) -> anyhow::Result<Self> {
        let base = config
            .auth_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("no auth URL configured (--auth-url)"))?;
        Self::new(base, &config.login_path, &config.refresh_path, config.refresh_timeout())
    }

    pub fn refresh_url(&self) -> &str {
        &self.refresh_url
    }

    pub fn login_url(&self) -> &str {
        &self.login_url
    }
}

impl AuthService for HttpAuthService {
    fn login<'a>(
        &'a self,
        identifier: &'a str,
        secret: &'a str,
    ) -> AuthFuture<'a, SessionTokens, LoginError> {
        Box::pin(async move {
            let resp = self
                .http
                .post(&self.login_url)
                .json(&LoginRequest { identifier, secret })
                .send()
                .await
                .map_err(|e| LoginError::Unavailable(format!("HTTP error: {e}")))?;

            let status = resp.status();
            let body = resp
                .text()
                .await
                .map_err(|e| LoginError::Unavailable(format!("read body: {e}")))?;

            if !status.is_success() {
                return match status.as_u16() {
                    400 | 401 | 403 => Err(LoginError::BadCredentials),
                    _ => Err(LoginError::Unavailable(format!(
                        "HTTP {status}: {}",
                        ErrorResponse::describe(&body)
                    ))),
                };
            }

            let token: TokenResponse = serde_json::from_str(&body)
                .map_err(|e| LoginError::Unavailable(format!("parse response: {e}")))?;
            let refresh = token
                .refresh_token
                .ok_or_else(|| LoginError::Unavailable("response has no refresh_token".into()))?;

            debug!(url = %self.login_url, "login accepted");
            Ok(SessionTokens { access: token.access_token, refresh, profile: token.user })
        })
    }

    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> AuthFuture<'a, SessionTokens, RefreshError> {
        Box::pin(async move {
            let resp = self
                .http
                .post(&self.refresh_url)
                .json(&RefreshRequest { refresh_token })
                .send()
                .await
                .map_err(|e| RefreshError::Network(format!("HTTP error: {e}")))?;

            let status = resp.status();
            let body =
                resp.text().await.map_err(|e| RefreshError::Network(format!("read body: {e}")))?;

            if !status.is_success() {
                let detail = ErrorResponse::describe(&body);
                return match status.as_u16() {
                    400 | 401 | 403 => Err(RefreshError::Rejected(detail)),
                    _ => Err(RefreshError::Network(format!("HTTP {status}: {detail}"))),
                };
            }

            let token: TokenResponse = serde_json::from_str(&body)
                .map_err(|e| RefreshError::Network(format!("parse response: {e}")))?;

            Ok(SessionTokens {
                access: token.access_token,
                // Services that don't rotate keep the credential we sent.
                refresh: token.refresh_token.unwrap_or_else(|| refresh_token.to_owned()),
                profile: token.user,
            })
        })
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
