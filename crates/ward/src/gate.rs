// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outbound request interception.
//!
//! Every business request goes through [`RequestGate::execute`], which asks
//! the coordinator for a usable credential and attaches it as a bearer
//! token. Requests to the refresh endpoint are never intercepted.

use std::sync::Arc;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, Request, RequestBuilder, Response, Url};
use tracing::{debug, warn};

use crate::refresh::RefreshCoordinator;

pub struct RequestGate {
    http: reqwest::Client,
    coordinator: Arc<RefreshCoordinator>,
    bypass: Vec<Url>,
}

impl RequestGate {
    pub fn new(http: reqwest::Client, coordinator: Arc<RefreshCoordinator>) -> Self {
        Self { http, coordinator, bypass: Vec::new() }
    }

    /// Never attach credentials to (or refresh for) requests to `url`.
    pub fn with_bypass(mut self, url: &str) -> anyhow::Result<Self> {
        self.bypass.push(Url::parse(url)?);
        Ok(self)
    }

    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http.request(method, url)
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    /// Build and execute through the gate.
    pub async fn send(&self, builder: RequestBuilder) -> reqwest::Result<Response> {
        self.execute(builder.build()?).await
    }

    /// Send without touching credentials, whatever the destination.
    pub async fn send_bypass(&self, builder: RequestBuilder) -> reqwest::Result<Response> {
        self.http.execute(builder.build()?).await
    }

    pub async fn execute(&self, mut request: Request) -> reqwest::Result<Response> {
        if self.is_bypassed(request.url()) {
            debug!(url = %request.url(), "bypassing gate");
            return self.http.execute(request).await;
        }

        match self.coordinator.ensure_valid().await {
            Some(credential) => match HeaderValue::from_str(&format!("Bearer {credential}")) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    request.headers_mut().insert(AUTHORIZATION, value);
                }
                Err(_) => warn!("credential is not a valid header value, sending without"),
            },
            None => debug!(url = %request.url(), "no session, sending without credential"),
        }
        self.http.execute(request).await
    }

    pub fn is_bypassed(&self, url: &Url) -> bool {
        self.bypass.iter().any(|b| same_endpoint(b, url))
    }
}

/// Same origin and path, ignoring query, fragment, and a trailing slash.
fn same_endpoint(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
        && a.path().trim_end_matches('/') == b.path().trim_end_matches('/')
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
