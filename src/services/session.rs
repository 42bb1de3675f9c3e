// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory OAuth session shared by the remote clients.
//!
//! Populated by the OAuth callbacks (or bootstrapped from a configured
//! refresh token at startup) and read whenever a client needs a bearer
//! token. One store belongs to one running server; it is passed explicitly
//! to the clients that need it.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;

/// Margin before token expiration when we proactively refresh (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Remote service a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Strava,
    Google,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Strava => "strava",
            Provider::Google => "google",
        }
    }
}

/// Access token with its expiry and (optionally) the refresh token to renew it.
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl SessionToken {
    /// A token that only carries a refresh token, forcing a refresh on first use.
    pub fn from_refresh_token(refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: String::new(),
            refresh_token: Some(refresh_token.into()),
            expires_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// Whether the access token is missing or expires within the margin.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.access_token.is_empty()
            || now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) >= self.expires_at
    }
}

/// Shared token store keyed by provider.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    tokens: Arc<DashMap<Provider, SessionToken>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, provider: Provider) -> Option<SessionToken> {
        self.tokens.get(&provider).map(|t| t.value().clone())
    }

    pub fn insert(&self, provider: Provider, token: SessionToken) {
        self.tokens.insert(provider, token);
    }

    /// Store a refreshed access token, keeping the old refresh token when the
    /// provider does not rotate it.
    pub fn update_access(
        &self,
        provider: Provider,
        access_token: String,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) {
        let previous = self.get(provider).and_then(|t| t.refresh_token);
        self.insert(
            provider,
            SessionToken {
                access_token,
                refresh_token: refresh_token.or(previous),
                expires_at,
            },
        );
    }

    pub fn remove(&self, provider: Provider) {
        self.tokens.remove(&provider);
    }

    pub fn is_connected(&self, provider: Provider) -> bool {
        self.tokens.contains_key(&provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_only_token_needs_refresh() {
        let token = SessionToken::from_refresh_token("r");
        assert!(token.needs_refresh(Utc::now()));
    }

    #[test]
    fn test_margin_applies() {
        let now = Utc::now();
        let token = SessionToken {
            access_token: "a".into(),
            refresh_token: None,
            expires_at: now + Duration::minutes(4),
        };
        assert!(token.needs_refresh(now));

        let token = SessionToken {
            expires_at: now + Duration::hours(1),
            ..token
        };
        assert!(!token.needs_refresh(now));
    }

    #[test]
    fn test_update_keeps_refresh_token() {
        let store = TokenStore::new();
        store.insert(Provider::Google, SessionToken::from_refresh_token("keep-me"));
        store.update_access(
            Provider::Google,
            "fresh".into(),
            None,
            Utc::now() + Duration::hours(1),
        );

        let token = store.get(Provider::Google).unwrap();
        assert_eq!(token.access_token, "fresh");
        assert_eq!(token.refresh_token.as_deref(), Some("keep-me"));
        assert!(!store.is_connected(Provider::Strava));
    }
}
