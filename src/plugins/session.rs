//! Time-windowed synthetic session identity.
//!
//! # State machine
//! ```text
//! Empty ──get()──▶ Valid(id, expires_at)
//! Valid ──get(), now <  expires_at──▶ Valid (unchanged)
//! Valid ──get(), now >= expires_at──▶ Valid(new id, now + window)
//! ```
//!
//! The identifier is a pure function of wall-clock time: the UTC date plus the
//! index of the current window since the Unix epoch. Callers racing across an
//! expiry derive the same value, so the swap needs no lock.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Default rotation window (12 hours).
pub const DEFAULT_SESSION_WINDOW_SECS: u64 = 12 * 60 * 60;

/// Longest accepted rotation window (10 years).
pub const MAX_SESSION_WINDOW_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionIdentity {
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SessionIdentityCache {
    window: Duration,
    label: String,
    current: ArcSwapOption<SessionIdentity>,
}

impl SessionIdentityCache {
    /// `window_secs` is clamped to `1..=MAX_SESSION_WINDOW_SECS`.
    pub fn new(window_secs: u64, label: impl Into<String>) -> Self {
        let secs = window_secs.clamp(1, MAX_SESSION_WINDOW_SECS) as i64;
        let window = Duration::try_seconds(secs)
            .unwrap_or_else(|| Duration::seconds(DEFAULT_SESSION_WINDOW_SECS as i64));
        Self {
            window,
            label: label.into(),
            current: ArcSwapOption::empty(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn get(&self) -> SessionIdentity {
        self.get_at(Utc::now())
    }

    pub fn get_at(&self, now: DateTime<Utc>) -> SessionIdentity {
        if let Some(cached) = self.current.load_full() {
            if now < cached.expires_at {
                return cached.as_ref().clone();
            }
        }

        let fresh = self.derive(now);
        tracing::debug!(
            user_id = %fresh.user_id,
            expires_at = %fresh.expires_at,
            "Session identity rotated"
        );
        self.current.store(Some(Arc::new(fresh.clone())));
        fresh
    }

    /// Identity for `now`, ignoring the cache.
    pub fn derive(&self, now: DateTime<Utc>) -> SessionIdentity {
        let window_ms = self.window.num_milliseconds().max(1);
        let epoch = now.timestamp_millis().div_euclid(window_ms);
        let date = now.format("%Y-%m-%d");
        SessionIdentity {
            user_id: format!("user_proxy_account__session_{}-{}-{}", self.label, date, epoch),
            expires_at: now
                .checked_add_signed(self.window)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

impl Default for SessionIdentityCache {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_WINDOW_SECS, "cherry")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_stable_within_window() {
        let cache = SessionIdentityCache::default();
        let t0 = at(1_760_000_000);

        let first = cache.get_at(t0);
        let second = cache.get_at(t0 + Duration::seconds(1));
        assert_eq!(first, second);
    }

    #[test]
    fn test_rotates_across_window() {
        let cache = SessionIdentityCache::default();
        let t0 = at(1_760_000_000);
        let t1 = t0 + cache.window();

        let first = cache.get_at(t0);
        let second = cache.get_at(t1);
        assert_ne!(first.user_id, second.user_id);

        let epoch0 = t0.timestamp() / DEFAULT_SESSION_WINDOW_SECS as i64;
        assert_eq!(
            first.user_id,
            format!("user_proxy_account__session_cherry-2025-10-09-{}", epoch0)
        );
        assert_eq!(
            second.user_id,
            format!(
                "user_proxy_account__session_cherry-{}-{}",
                t1.format("%Y-%m-%d"),
                epoch0 + 1
            )
        );
        assert_eq!(second.expires_at, t1 + cache.window());
    }

    #[test]
    fn test_cached_value_survives_epoch_boundary_until_expiry() {
        let cache = SessionIdentityCache::new(3600, "x");
        // 10 seconds before an hour boundary.
        let t0 = at(3600 * 100 - 10);
        let first = cache.get_at(t0);

        // Past the boundary but not past expires_at: cached identity is kept.
        let later = cache.get_at(t0 + Duration::seconds(20));
        assert_eq!(first, later);
        assert!(first.user_id.ends_with("-99"));
    }

    #[test]
    fn test_oversized_window_is_clamped() {
        let cache = SessionIdentityCache::new(u64::MAX, "x");
        assert_eq!(cache.window(), Duration::seconds(MAX_SESSION_WINDOW_SECS as i64));

        let now = at(1_760_000_000);
        let identity = cache.get_at(now);
        assert_eq!(identity.expires_at, now + cache.window());
    }

    #[test]
    fn test_expiry_saturates_near_end_of_time() {
        let cache = SessionIdentityCache::new(MAX_SESSION_WINDOW_SECS, "x");
        let now = DateTime::<Utc>::MAX_UTC - Duration::seconds(60);
        let identity = cache.derive(now);
        assert_eq!(identity.expires_at, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_derive_is_pure() {
        let a = SessionIdentityCache::new(60, "lbl");
        let b = SessionIdentityCache::new(60, "lbl");
        let now = at(1_700_000_123);
        assert_eq!(a.derive(now), b.derive(now));
        assert_eq!(a.get_at(now), b.get_at(now));
    }
}
