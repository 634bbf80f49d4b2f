// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: token minting, a scriptable auth service,
//! and recording sinks.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};

use crate::auth::{AuthFuture, AuthService};
use crate::error::{LoginError, RefreshError};
use crate::events::{Navigator, Notifier};
use crate::store::{SessionTokens, UserProfile};
use crate::validator::epoch_ms;

/// Mint an unsigned JWT-shaped credential expiring at `exp` (epoch seconds).
/// Every call yields a distinct string.
pub fn mint_token(exp: u64) -> String {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let jti = SEQ.fetch_add(1, Ordering::Relaxed);
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD
        .encode(serde_json::json!({ "sub": "user-1", "exp": exp, "jti": jti }).to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// Mint a credential expiring `ttl_secs` from now (negative = already expired).
pub fn mint_in(ttl_secs: i64) -> String {
    let now = (epoch_ms() / 1000) as i64;
    mint_token((now + ttl_secs).max(0) as u64)
}

/// A session whose access and refresh credentials expire after the given TTLs.
pub fn session_tokens(access_ttl: i64, refresh_ttl: i64) -> SessionTokens {
    SessionTokens { access: mint_in(access_ttl), refresh: mint_in(refresh_ttl), profile: None }
}

pub fn sample_profile() -> UserProfile {
    UserProfile {
        id: "u-1".into(),
        name: "Ada Lovelace".into(),
        email: "ada@example.com".into(),
        role: "admin".into(),
    }
}

/// Scriptable [`AuthService`].
///
/// Refresh outcomes are served in push order; an empty script answers
/// `Rejected`. A held service blocks every refresh until [`release`] is
/// called, which lets tests pile waiters onto an in-flight refresh.
///
/// [`release`]: FakeAuthService::release
#[derive(Default)]
pub struct FakeAuthService {
    refresh_calls: AtomicU32,
    login_calls: AtomicU32,
    refresh_script: Mutex<VecDeque<Result<SessionTokens, RefreshError>>>,
    login_result: Mutex<Option<Result<SessionTokens, LoginError>>>,
    sent_refresh: Mutex<Vec<String>>,
    hold: Option<Arc<Semaphore>>,
    delay: Option<Duration>,
    started: Notify,
}

impl FakeAuthService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block refreshes until released.
    pub fn held() -> Self {
        Self { hold: Some(Arc::new(Semaphore::new(0))), ..Self::default() }
    }

    /// Sleep before answering each refresh.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_refresh(&self, outcome: Result<SessionTokens, RefreshError>) -> &Self {
        self.refresh_script.lock().push_back(outcome);
        self
    }

    pub fn set_login(&self, outcome: Result<SessionTokens, LoginError>) {
        *self.login_result.lock() = Some(outcome);
    }

    /// Let `n` held refreshes proceed.
    pub fn release(&self, n: usize) {
        if let Some(ref sem) = self.hold {
            sem.add_permits(n);
        }
    }

    /// Resolves once a refresh call has reached the service.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    pub fn refresh_calls(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> u32 {
        self.login_calls.load(Ordering::SeqCst)
    }

    /// Refresh credentials received, in call order.
    pub fn sent_refresh(&self) -> Vec<String> {
        self.sent_refresh.lock().clone()
    }
}

impl AuthService for FakeAuthService {
    fn login<'a>(
        &'a self,
        _identifier: &'a str,
        _secret: &'a str,
    ) -> AuthFuture<'a, SessionTokens, LoginError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.login_result.lock().clone().unwrap_or(Err(LoginError::BadCredentials));
        Box::pin(async move { result })
    }

    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> AuthFuture<'a, SessionTokens, RefreshError> {
        Box::pin(async move {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            self.sent_refresh.lock().push(refresh_token.to_owned());
            self.started.notify_one();

            if let Some(ref sem) = self.hold {
                if let Ok(permit) = sem.acquire().await {
                    permit.forget();
                }
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let next = self.refresh_script.lock().pop_front();
            next.unwrap_or_else(|| Err(RefreshError::Rejected("no scripted response".into())))
        })
    }
}

/// Records every notification.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        self.messages.lock().push(message.to_owned());
    }
}

/// Counts navigation requests.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    count: AtomicU32,
}

impl RecordingNavigator {
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

impl Navigator for RecordingNavigator {
    fn to_login(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}
