// src/ingest/timestamp.rs
//! Multi-layout timestamp parsing.
//!
//! Feeds in the wild disagree on date formats, so a raw string is tried
//! against an ordered list of layouts and the first one that parses wins.
//! The order is a slice, not a set: a string that happens to satisfy two
//! layouts always resolves to the same instant.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampLayout {
    /// `Mon, 02 Jan 2006 15:04:05 -0700`, including `GMT`/`UT`/US zone names.
    Rfc2822,
    /// `Mon, _2 Jan 2006 15:04:05 MST` with any alphabetic zone abbreviation.
    /// Abbreviations the RFC does not define are read as UTC.
    RssNamedZone,
    /// `2006-01-02T15:04:05Z07:00`
    Rfc3339,
}

/// Priority order used for every feed timestamp.
pub const DEFAULT_LAYOUTS: &[TimestampLayout] = &[
    TimestampLayout::Rfc2822,
    TimestampLayout::RssNamedZone,
    TimestampLayout::Rfc3339,
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("timestamp is missing")]
    Missing,
    #[error("couldn't match timestamp {0:?} to a known format")]
    NoMatchingLayout(String),
}

impl TimestampLayout {
    fn try_parse(&self, raw: &str) -> Option<DateTime<Utc>> {
        match self {
            TimestampLayout::Rfc2822 => OffsetDateTime::parse(raw, &Rfc2822)
                .ok()
                .and_then(offset_to_utc),
            TimestampLayout::Rfc3339 => OffsetDateTime::parse(raw, &Rfc3339)
                .ok()
                .and_then(offset_to_utc),
            TimestampLayout::RssNamedZone => parse_named_zone(raw),
        }
    }
}

/// Parse `raw` with the first layout in `layouts` that accepts it.
pub fn parse_with(raw: &str, layouts: &[TimestampLayout]) -> Result<DateTime<Utc>, FormatError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(FormatError::Missing);
    }
    layouts
        .iter()
        .find_map(|layout| layout.try_parse(raw))
        .ok_or_else(|| FormatError::NoMatchingLayout(raw.to_string()))
}

/// Parse with [`DEFAULT_LAYOUTS`].
pub fn parse(raw: &str) -> Result<DateTime<Utc>, FormatError> {
    parse_with(raw, DEFAULT_LAYOUTS)
}

fn offset_to_utc(dt: OffsetDateTime) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(dt.unix_timestamp(), dt.nanosecond()).single()
}

fn parse_named_zone(raw: &str) -> Option<DateTime<Utc>> {
    let (rest, zone) = raw.rsplit_once(char::is_whitespace)?;
    if zone.is_empty() || !zone.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    // Only the weekday's shape is checked; feeds often get the day itself wrong.
    let rest = match rest.split_once(',') {
        Some((day, date)) if day.len() == 3 && day.chars().all(|c| c.is_ascii_alphabetic()) => {
            date.trim_start()
        }
        Some(_) => return None,
        None => rest,
    };
    let naive = NaiveDateTime::parse_from_str(rest.trim_end(), "%d %b %Y %H:%M:%S").ok()?;
    Some(Utc.from_utc_datetime(&naive))
}
