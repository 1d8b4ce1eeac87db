//! Marketplace rules that are tunable per deployment.

use chrono::{DateTime, TimeDelta, Utc};

/// Default minimum time between bumps by the same user.
pub const DEFAULT_BUMP_INTERVAL_SECS: i64 = 3;

/// Tunable marketplace rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketPolicy {
    /// Minimum gap between a user's bumps (and between a listing and a bump).
    pub bump_interval: TimeDelta,
}

impl MarketPolicy {
    pub fn with_bump_interval(bump_interval: TimeDelta) -> Self {
        Self { bump_interval }
    }

    /// Returns true if a user whose last bump was at `last_bump` may bump at `now`.
    pub fn bump_allowed(&self, last_bump: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        last_bump + self.bump_interval <= now
    }
}

impl Default for MarketPolicy {
    fn default() -> Self {
        Self {
            bump_interval: TimeDelta::seconds(DEFAULT_BUMP_INTERVAL_SECS),
        }
    }
}
