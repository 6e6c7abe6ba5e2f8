//! Reissue decisions for cookie tokens.
//!
//! A token is rewritten when the session changed, or when an expiring session was last issued at
//! least `refresh_interval` ago. The second rule keeps a session that is only ever read sliding
//! forward until it goes `expire_after` without a request.

use time::{Duration, OffsetDateTime};

use crate::codec::SessionValue;

/// Default time after which an unchanged, expiring session is reissued.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::minutes(5);

/// Validity window and renewal cadence for issued tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
    expire_after: Option<Duration>,
    refresh_interval: Duration,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            expire_after: None,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

impl LifecyclePolicy {
    /// Policy with no expiry: tokens are valid until the key changes.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_expire_after(mut self, expire_after: Duration) -> Self {
        self.expire_after = Some(expire_after);
        self
    }

    #[must_use]
    pub fn without_expiry(mut self) -> Self {
        self.expire_after = None;
        self
    }

    #[must_use]
    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    pub fn expire_after(&self) -> Option<Duration> {
        self.expire_after
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Whether a new token must be issued for `current`.
    ///
    /// `original` is the value decoded from the request's token, `None` if there was no valid
    /// token; `original_issued_at` is that token's timestamp.
    pub fn should_reissue(
        &self,
        original: Option<&SessionValue>,
        current: &SessionValue,
        original_issued_at: Option<OffsetDateTime>,
        now: OffsetDateTime,
    ) -> bool {
        if original != Some(current) {
            return true;
        }
        self.refresh_due(original_issued_at, now)
    }

    /// Whether an unchanged session issued at `issued_at` is due for renewal.
    pub fn refresh_due(&self, issued_at: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
        match (self.expire_after, issued_at) {
            (Some(_), Some(issued_at)) => now >= issued_at + self.refresh_interval,
            _ => false,
        }
    }
}
