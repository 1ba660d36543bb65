//! Hit Notification Module
//!
//! Optional side effect fired when a call is answered from the cache.
//!
//! Templates understand `{time}` (stored timestamp, `%Y-%m-%d %H:%M:%S%.6f`),
//! `{time:<strftime>}` for a custom chrono format, and `{{` / `}}` for literal
//! braces.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::key::CacheKey;
use crate::policy::DayBoundary;

const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Hook invoked on every cache hit. Must not panic; its outcome is ignored.
pub trait HitNotifier: Send + Sync {
    fn notify(&self, identity: &str, key: &CacheKey, stored_at: DateTime<Utc>);
}

impl<F> HitNotifier for F
where
    F: Fn(&str, &CacheKey, DateTime<Utc>) + Send + Sync,
{
    fn notify(&self, identity: &str, key: &CacheKey, stored_at: DateTime<Utc>) {
        self(identity, key, stored_at)
    }
}

// == Template ==
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Time(Option<String>),
}

/// A parsed notification template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parses `source`, rejecting unknown placeholders, unbalanced braces and
    /// invalid time formats.
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut field = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => field.push(ch),
                            None => return Err(invalid(source, "unclosed `{`")),
                        }
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_field(source, &field)?);
                }
                '}' => return Err(invalid(source, "single `}` outside a placeholder")),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    /// Renders the template for a value stored at `stored_at`.
    pub fn render(&self, stored_at: DateTime<Utc>, boundary: DayBoundary) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Time(fmt) => {
                    let fmt = fmt.as_deref().unwrap_or(DEFAULT_TIME_FORMAT);
                    out.push_str(&boundary.format(stored_at, fmt));
                }
            }
        }
        out
    }
}

fn parse_field(source: &str, field: &str) -> Result<Segment> {
    if field == "time" {
        return Ok(Segment::Time(None));
    }
    match field.strip_prefix("time:") {
        Some(fmt) if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) => {
            Err(invalid(source, &format!("bad time format {:?}", fmt)))
        }
        Some(fmt) => Ok(Segment::Time(Some(fmt.to_string()))),
        None => Err(invalid(source, &format!("unknown placeholder {{{}}}", field))),
    }
}

fn invalid(source: &str, reason: &str) -> CacheError {
    CacheError::InvalidConfig(format!("notify template {:?}: {}", source, reason))
}

// == Template Notifier ==
/// Renders the configured template and logs it at INFO.
#[derive(Debug, Clone)]
pub struct TemplateNotifier {
    template: Template,
    boundary: DayBoundary,
}

impl TemplateNotifier {
    pub fn new(template: Template, boundary: DayBoundary) -> Self {
        Self { template, boundary }
    }

    /// `None` when the config carries no template.
    pub fn from_config(config: &CacheConfig) -> Result<Option<Self>> {
        config
            .notify_template
            .as_deref()
            .map(|source| Ok(Self::new(Template::parse(source)?, config.day_boundary)))
            .transpose()
    }

    pub fn render(&self, stored_at: DateTime<Utc>) -> String {
        self.template.render(stored_at, self.boundary)
    }
}

impl HitNotifier for TemplateNotifier {
    fn notify(&self, identity: &str, _key: &CacheKey, stored_at: DateTime<Utc>) {
        info!(cache = identity, "{}", self.render(stored_at));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 29, 7, 5, 9).unwrap()
    }

    #[test]
    fn test_render_default_time() {
        let template = Template::parse("returned cached f1 at {time}").unwrap();
        assert_eq!(
            template.render(stamp(), DayBoundary::Utc),
            "returned cached f1 at 2024-02-29 07:05:09.000000"
        );
    }

    #[test]
    fn test_render_custom_format() {
        let template = Template::parse("[{time:%H:%M}] cached").unwrap();
        assert_eq!(template.render(stamp(), DayBoundary::Utc), "[07:05] cached");
    }

    #[test]
    fn test_render_escaped_braces() {
        let template = Template::parse("{{cached}} {time:%d}").unwrap();
        assert_eq!(template.render(stamp(), DayBoundary::Utc), "{cached} 29");
    }

    #[test]
    fn test_render_without_placeholder() {
        let template = Template::parse("hit").unwrap();
        assert_eq!(template.render(stamp(), DayBoundary::Utc), "hit");
    }

    #[test]
    fn test_render_repeated_placeholder() {
        let template = Template::parse("{time:%Y}/{time:%m}").unwrap();
        assert_eq!(template.render(stamp(), DayBoundary::Utc), "2024/02");
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["{when}", "open {time", "close }", "{time:%Q}", "{}"] {
            assert!(
                matches!(Template::parse(bad), Err(CacheError::InvalidConfig(_))),
                "{:?} accepted",
                bad
            );
        }
    }

    #[test]
    fn test_notifier_from_config() {
        let config = CacheConfig::new(1.0).unwrap();
        assert!(TemplateNotifier::from_config(&config).unwrap().is_none());

        let config = config
            .with_day_boundary(DayBoundary::Utc)
            .with_notify_template("at {time:%H}");
        let notifier = TemplateNotifier::from_config(&config).unwrap().unwrap();
        assert_eq!(notifier.render(stamp()), "at 07");
    }

    #[test]
    fn test_closure_is_notifier() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = AtomicUsize::new(0);
        let notifier = |_: &str, _: &CacheKey, _: DateTime<Utc>| {
            calls.fetch_add(1, Ordering::SeqCst);
        };
        notifier.notify("f", &CacheKey::from_canonical("k"), stamp());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
