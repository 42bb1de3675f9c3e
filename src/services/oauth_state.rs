// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signed OAuth `state` parameter.
//!
//! The state is `provider|timestamp_hex|signature_hex`, base64url encoded,
//! where the signature is HMAC-SHA256 over `provider|timestamp_hex`. A
//! callback is accepted only for the provider it was issued for and only
//! within [`STATE_MAX_AGE_SECS`] of issue.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::AppError;
use crate::services::session::Provider;

type HmacSha256 = Hmac<Sha256>;

/// How long a consent screen may stay open before its callback is refused.
pub const STATE_MAX_AGE_SECS: i64 = 600;

fn signer(secret: &[u8]) -> Result<HmacSha256, AppError> {
    HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))
}

/// Issue a state value for an OAuth flow with `provider`.
pub fn sign_state(
    provider: Provider,
    secret: &[u8],
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let payload = format!("{}|{:x}", provider.as_str(), now.timestamp_millis());

    let mut mac = signer(secret)?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Check a state value returned to the `provider` callback.
pub fn verify_state(state: &str, provider: Provider, secret: &[u8], now: DateTime<Utc>) -> bool {
    match check(state, provider, secret, now) {
        Ok(()) => true,
        Err(reason) => {
            tracing::warn!(provider = provider.as_str(), reason, "Rejected OAuth state");
            false
        }
    }
}

fn check(
    state: &str,
    provider: Provider,
    secret: &[u8],
    now: DateTime<Utc>,
) -> Result<(), &'static str> {
    let bytes = URL_SAFE_NO_PAD.decode(state).map_err(|_| "not base64")?;
    let decoded = String::from_utf8(bytes).map_err(|_| "not utf-8")?;

    let parts: Vec<&str> = decoded.splitn(3, '|').collect();
    let (issued_for, timestamp_hex, signature_hex) = match parts.as_slice() {
        [provider, timestamp, signature] => (*provider, *timestamp, *signature),
        _ => return Err("malformed"),
    };

    let signature = hex::decode(signature_hex).map_err(|_| "malformed signature")?;
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| "bad key")?;
    mac.update(format!("{}|{}", issued_for, timestamp_hex).as_bytes());
    mac.verify_slice(&signature).map_err(|_| "signature mismatch")?;

    if issued_for != provider.as_str() {
        return Err("issued for another provider");
    }

    let issued_ms = i64::from_str_radix(timestamp_hex, 16).map_err(|_| "malformed timestamp")?;
    let age_ms = now.timestamp_millis() - issued_ms;
    if !(0..=STATE_MAX_AGE_SECS * 1000).contains(&age_ms) {
        return Err("expired");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const SECRET: &[u8] = b"state_key_for_tests";

    #[test]
    fn test_state_accepted_for_issuing_provider() {
        let now = Utc::now();
        let state = sign_state(Provider::Strava, SECRET, now).unwrap();
        assert!(verify_state(&state, Provider::Strava, SECRET, now));
        assert!(verify_state(
            &state,
            Provider::Strava,
            SECRET,
            now + Duration::seconds(STATE_MAX_AGE_SECS)
        ));
    }

    #[test]
    fn test_state_is_url_safe() {
        let state = sign_state(Provider::Google, SECRET, Utc::now()).unwrap();
        assert!(!state.contains('+'));
        assert!(!state.contains('/'));
        assert!(!state.contains('='));
    }

    #[test]
    fn test_state_rejected_for_other_provider() {
        let now = Utc::now();
        let state = sign_state(Provider::Strava, SECRET, now).unwrap();
        assert!(!verify_state(&state, Provider::Google, SECRET, now));
    }

    #[test]
    fn test_state_rejected_with_wrong_secret() {
        let now = Utc::now();
        let state = sign_state(Provider::Google, SECRET, now).unwrap();
        assert!(!verify_state(&state, Provider::Google, b"wrong_key", now));
    }

    #[test]
    fn test_stale_state_rejected() {
        let now = Utc::now();
        let state = sign_state(Provider::Google, SECRET, now).unwrap();
        let later = now + Duration::seconds(STATE_MAX_AGE_SECS + 1);
        assert!(!verify_state(&state, Provider::Google, SECRET, later));
    }

    #[test]
    fn test_tampered_or_malformed_state_rejected() {
        let now = Utc::now();
        let forged = URL_SAFE_NO_PAD.encode(format!("strava|{:x}|deadbeef", now.timestamp_millis()));
        assert!(!verify_state(&forged, Provider::Strava, SECRET, now));
        assert!(!verify_state(&URL_SAFE_NO_PAD.encode("strava|1"), Provider::Strava, SECRET, now));
        assert!(!verify_state("not base64!!", Provider::Strava, SECRET, now));
        assert!(!verify_state("", Provider::Strava, SECRET, now));
    }
}
