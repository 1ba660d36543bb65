//! Expiry Policy Module
//!
//! Decides whether a stored value may still be served: a plain TTL check,
//! optionally ANDed with a "same calendar day" check.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};

use crate::cache::CacheEntry;
use crate::config::CacheConfig;

// == Day Boundary ==
/// Timezone in which a calendar day starts and ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DayBoundary {
    /// The process' local timezone
    #[default]
    Local,
    /// UTC midnight
    Utc,
    /// A fixed offset from UTC
    Fixed(FixedOffset),
}

impl DayBoundary {
    /// The calendar date of `at` in this timezone.
    pub fn calendar_day(&self, at: DateTime<Utc>) -> NaiveDate {
        match self {
            DayBoundary::Local => at.with_timezone(&Local).date_naive(),
            DayBoundary::Utc => at.date_naive(),
            DayBoundary::Fixed(offset) => at.with_timezone(offset).date_naive(),
        }
    }

    /// Formats `at` in this timezone with a chrono format string.
    pub fn format(&self, at: DateTime<Utc>, fmt: &str) -> String {
        match self {
            DayBoundary::Local => at.with_timezone(&Local).format(fmt).to_string(),
            DayBoundary::Utc => at.format(fmt).to_string(),
            DayBoundary::Fixed(offset) => at.with_timezone(offset).format(fmt).to_string(),
        }
    }
}

impl FromStr for DayBoundary {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(DayBoundary::Local),
            "utc" | "z" => Ok(DayBoundary::Utc),
            _ => s
                .parse::<FixedOffset>()
                .map(DayBoundary::Fixed)
                .map_err(|_| format!("expected `local`, `utc` or an offset like +02:00, got {:?}", s)),
        }
    }
}

impl fmt::Display for DayBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayBoundary::Local => write!(f, "local"),
            DayBoundary::Utc => write!(f, "utc"),
            DayBoundary::Fixed(offset) => write!(f, "{}", offset),
        }
    }
}

// == Expiry Policy ==
/// Validity rules derived from a `CacheConfig`.
#[derive(Debug, Clone, Copy)]
pub struct ExpiryPolicy {
    ttl: Duration,
    /// `Some` only when the day-change rule is enabled
    day_rule: Option<DayBoundary>,
}

impl ExpiryPolicy {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self {
            ttl: config.ttl,
            day_rule: config.day_change.then_some(config.day_boundary),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Base TTL rule only: strictly more than `ttl` has elapsed.
    pub fn is_expired(&self, stored_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        elapsed(stored_at, now) > self.ttl
    }

    /// Whether `entry` may be served as a hit at `now`.
    ///
    /// Valid iff the TTL has not lapsed and, with the day rule enabled, the entry
    /// was stored on the same calendar day as `now`.
    pub fn is_valid<V>(&self, entry: &CacheEntry<V>, now: DateTime<Utc>) -> bool {
        if self.is_expired(entry.stored_at, now) {
            return false;
        }
        match self.day_rule {
            Some(boundary) => boundary.calendar_day(entry.stored_at) == boundary.calendar_day(now),
            None => true,
        }
    }
}

/// Time from `stored_at` to `now`. A clock that went backwards counts as zero.
pub fn elapsed(stored_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - stored_at).to_std().unwrap_or(Duration::ZERO)
}
