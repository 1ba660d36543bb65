//! Configuration Module
//!
//! Per-wrapper cache configuration, built in code or loaded from environment
//! variables. Validated once; wrappers take ownership and never mutate it.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CacheError, Result};
use crate::notify::Template;
use crate::policy::DayBoundary;

/// Freshness settings for one memoized callable.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Base freshness window
    pub ttl: Duration,
    /// Also invalidate entries stored on a different calendar day
    pub day_change: bool,
    /// Timezone that defines "calendar day" and renders hit timestamps
    pub day_boundary: DayBoundary,
    /// Message emitted on every hit; `{time}` is replaced by the stored timestamp
    pub notify_template: Option<String>,
}

impl CacheConfig {
    /// Creates a config with the given TTL in seconds.
    ///
    /// The TTL must be finite and strictly positive.
    pub fn new(ttl_seconds: f64) -> Result<Self> {
        Ok(Self {
            ttl: ttl_from_secs(ttl_seconds)?,
            day_change: false,
            day_boundary: DayBoundary::Local,
            notify_template: None,
        })
    }

    /// Enables or disables calendar-day invalidation.
    pub fn with_day_change(mut self, enabled: bool) -> Self {
        self.day_change = enabled;
        self
    }

    /// Sets the timezone used for the day rule.
    pub fn with_day_boundary(mut self, boundary: DayBoundary) -> Self {
        self.day_boundary = boundary;
        self
    }

    /// Sets the hit notification template.
    pub fn with_notify_template(mut self, template: impl Into<String>) -> Self {
        self.notify_template = Some(template.into());
        self
    }

    /// Loads a config from environment variables.
    ///
    /// # Environment Variables
    /// - `MEMO_TTL_SECONDS` - TTL in seconds (default: 300)
    /// - `MEMO_DAY_CHANGE` - `true`/`false` (default: false)
    /// - `MEMO_DAY_BOUNDARY` - `local`, `utc` or `+HH:MM` (default: local)
    /// - `MEMO_NOTIFY_TEMPLATE` - hit message template (default: none)
    ///
    /// Unlike missing variables, malformed ones are an error.
    pub fn from_env() -> Result<Self> {
        let ttl_seconds = parse_var("MEMO_TTL_SECONDS")?.unwrap_or(300.0);
        let day_change = parse_var("MEMO_DAY_CHANGE")?.unwrap_or(false);
        let day_boundary = parse_var("MEMO_DAY_BOUNDARY")?.unwrap_or_default();

        let mut config = Self::new(ttl_seconds)?
            .with_day_change(day_change)
            .with_day_boundary(day_boundary);
        if let Ok(template) = env::var("MEMO_NOTIFY_TEMPLATE") {
            config = config.with_notify_template(template);
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks the TTL and parses the template.
    pub fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(CacheError::InvalidConfig(
                "ttl must be greater than zero".to_string(),
            ));
        }
        if let Some(template) = &self.notify_template {
            Template::parse(template)?;
        }
        Ok(())
    }
}

/// Converts a float TTL, rejecting NaN, infinities, zero and negatives.
fn ttl_from_secs(ttl_seconds: f64) -> Result<Duration> {
    if !ttl_seconds.is_finite() || ttl_seconds <= 0.0 {
        return Err(CacheError::InvalidConfig(format!(
            "ttl_seconds must be a positive finite number, got {}",
            ttl_seconds
        )));
    }
    Duration::try_from_secs_f64(ttl_seconds)
        .map_err(|err| CacheError::InvalidConfig(format!("ttl_seconds out of range: {}", err)))
}

fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|err| CacheError::InvalidConfig(format!("{}={:?}: {}", name, raw, err))),
        Err(_) => Ok(None),
    }
}
