//! Bearer token representation and expiry logic.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default validity assumed when the identity provider omits `expires_in`.
pub const DEFAULT_EXPIRES_IN: u64 = 3600;

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

/// A short-lived bearer credential with an absolute expiry.
///
/// Tokens are never mutated: a refresh produces a new value that replaces the
/// cached one.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    secret: String,
    /// Expiry as unix seconds.
    expires_at: u64,
}

impl AccessToken {
    /// Create a token expiring `expires_in_secs` seconds from now.
    pub fn new(secret: impl Into<String>, expires_in_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            expires_at: now_secs().saturating_add(expires_in_secs),
        }
    }

    /// Create a token with an explicit unix-seconds expiry.
    pub fn with_expires_at(secret: impl Into<String>, expires_at: u64) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    /// The raw bearer string.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Expiry as unix seconds.
    #[must_use]
    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    /// Remaining validity, zero once expired.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        Duration::from_secs(self.expires_at.saturating_sub(now_secs()))
    }

    /// Return `true` if at least `margin` of validity is left.
    #[must_use]
    pub fn is_fresh(&self, margin: Duration) -> bool {
        self.fresh_at(now_secs(), margin)
    }

    /// An expired token is never fresh, even with a zero margin.
    fn fresh_at(&self, now: u64, margin: Duration) -> bool {
        self.expires_at > now && Duration::from_secs(self.expires_at - now) >= margin
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARGIN: Duration = Duration::from_secs(300);

    #[test]
    fn test_fresh_token() {
        let t = AccessToken::new("tok", 3600);
        assert!(t.is_fresh(MARGIN));
        assert_eq!(t.secret(), "tok");
    }

    #[test]
    fn test_within_margin_is_stale() {
        // 60s left < 300s margin
        let t = AccessToken::new("tok", 60);
        assert!(!t.is_fresh(MARGIN));
        assert!(t.remaining() <= Duration::from_secs(60));
    }

    #[test]
    fn test_expired_token_has_no_remaining() {
        let past = now_secs().saturating_sub(100);
        let t = AccessToken::with_expires_at("old", past);
        assert_eq!(t.remaining(), Duration::ZERO);
        assert!(!t.is_fresh(Duration::ZERO));
    }

    #[test]
    fn test_exactly_margin_left_is_fresh() {
        let t = AccessToken::with_expires_at("tok", 10_000);
        assert!(t.fresh_at(10_000 - 300, MARGIN));
        assert!(!t.fresh_at(10_000 - 299, MARGIN));
        assert!(!t.fresh_at(10_000, Duration::ZERO));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let t = AccessToken::new("super-secret", 3600);
        let dbg = format!("{t:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("redacted"));
    }
}
