//! Common utility functions

use std::collections::HashSet;
use chrono::{DateTime, NaiveDateTime, Utc};

/// Timestamp format used by site exports (`2015-09-30T10:15:21Z`)
pub const EXPORT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Convert DateTime to export string format
pub fn format_export_date(dt: &DateTime<Utc>) -> String {
    dt.format(EXPORT_DATE_FORMAT).to_string()
}

/// Parse an export timestamp
pub fn parse_export_date(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, EXPORT_DATE_FORMAT)
        .ok()
        .map(|ndt| DateTime::from_naive_utc_and_offset(ndt, Utc))
}

/// True if the UTF-8 encoding of `s` is one byte per character
pub fn is_plain_ascii(s: &str) -> bool {
    s.is_ascii()
}

/// Remove duplicate and empty domains, keeping first occurrence order
pub fn dedup_urls(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(urls.len());
    urls.into_iter()
        .filter(|u| !u.is_empty() && seen.insert(u.clone()))
        .collect()
}

/// Ordered union: everything in `first`, then new entries from `second`
pub fn union_urls(first: &[String], second: &[String]) -> Vec<String> {
    dedup_urls(first.iter().chain(second.iter()).cloned().collect())
}

/// Split a comma separated domain list as typed in the options table
pub fn parse_url_list(s: &str) -> Vec<String> {
    dedup_urls(s.split(',').map(|u| u.trim().to_string()).collect())
}
