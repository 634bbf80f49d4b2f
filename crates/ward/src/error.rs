// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

/// Why a refresh did not produce a new credential.
///
/// Every variant ends the session once the retry policy is spent; callers of
/// `ensure_valid` only ever see `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The service refused the refresh credential.
    Rejected(String),
    /// Transport failure or service error. Eligible for bounded retry.
    Network(String),
    /// The refresh call did not settle within the configured timeout.
    TimedOut,
    /// No usable refresh credential was stored.
    NoRefreshCredential,
}

impl RefreshError {
    /// Whether another attempt could succeed with the same refresh credential.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::TimedOut)
    }
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected(msg) => write!(f, "refresh rejected: {msg}"),
            Self::Network(msg) => write!(f, "network failure: {msg}"),
            Self::TimedOut => f.write_str("refresh timed out"),
            Self::NoRefreshCredential => f.write_str("no refresh credential"),
        }
    }
}

impl std::error::Error for RefreshError {}

/// Why a login attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginError {
    /// Identifier/secret pair not accepted.
    BadCredentials,
    /// Service unreachable or failing.
    Unavailable(String),
}

impl fmt::Display for LoginError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadCredentials => f.write_str("invalid identifier or secret"),
            Self::Unavailable(msg) => write!(f, "authentication service unavailable: {msg}"),
        }
    }
}

impl std::error::Error for LoginError {}
