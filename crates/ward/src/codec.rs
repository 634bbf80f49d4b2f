// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential decoding: reads the embedded expiry claim without a secret.
//!
//! Credentials are JWT-shaped (`header.payload.signature`). Only the payload
//! is inspected; the signature is never verified here, the issuing service
//! owns that.

use std::fmt;

use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use serde_json::Value;

/// Claims read from a credential's payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Expiry as seconds since the Unix epoch.
    pub expires_at: u64,
    /// Subject, when present.
    pub subject: Option<String>,
}

impl Claims {
    /// Expiry in epoch milliseconds.
    pub fn expires_at_ms(&self) -> u64 {
        self.expires_at.saturating_mul(1000)
    }
}

/// Why a credential could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not three dot-separated segments.
    Malformed,
    /// Payload segment is not valid base64url.
    Encoding,
    /// Payload is not a JSON object.
    Payload,
    /// No usable `exp` claim.
    MissingExpiry,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => f.write_str("credential is not a three-segment token"),
            Self::Encoding => f.write_str("credential payload is not base64url"),
            Self::Payload => f.write_str("credential payload is not a JSON object"),
            Self::MissingExpiry => f.write_str("credential has no numeric exp claim"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Decode a credential's claims.
pub fn decode(credential: &str) -> Result<Claims, DecodeError> {
    let mut parts = credential.split('.');
    let (Some(header), Some(payload), Some(_sig), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(DecodeError::Malformed);
    };
    if header.is_empty() || payload.is_empty() {
        return Err(DecodeError::Malformed);
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| URL_SAFE.decode(payload))
        .map_err(|_| DecodeError::Encoding)?;

    let json: Value = serde_json::from_slice(&bytes).map_err(|_| DecodeError::Payload)?;
    let obj = json.as_object().ok_or(DecodeError::Payload)?;

    let expires_at = match obj.get("exp") {
        Some(Value::Number(n)) => {
            if let Some(secs) = n.as_u64() {
                secs
            } else {
                // Fractional expiries are truncated; negative ones are unusable.
                match n.as_f64() {
                    Some(f) if f.is_finite() && f >= 0.0 => f as u64,
                    _ => return Err(DecodeError::MissingExpiry),
                }
            }
        }
        _ => return Err(DecodeError::MissingExpiry),
    };

    let subject = obj.get("sub").and_then(Value::as_str).map(str::to_owned);

    Ok(Claims { expires_at, subject })
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
