//! Archive file-name templates
//!
//! A template such as `archive_{{date}}.tgz` is resolved against a clock into
//! a concrete archive name. Supported placeholders:
//!
//! - `{{date}}`: `YYYY-MM-DD`
//! - `{{time}}`: `HH:MM:SS`
//! - `{{dateTime}}`: `YYYY-MM-DD_HH:MM:SS`
//!
//! All values are UTC. Unknown placeholders are left in place.

use chrono::{DateTime, Utc};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";
const DATE_TIME_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Source of the current UTC time
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Substitute every known placeholder in `template` with values taken from `now`
pub fn resolve(template: &str, now: DateTime<Utc>) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];

        let Some(end) = after_open.find(CLOSE) else {
            // unterminated placeholder, keep the remainder verbatim
            out.push_str(&rest[start..]);
            return out;
        };

        let name = after_open[..end].trim();
        match placeholder_value(name, now) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + OPEN.len() + end + CLOSE.len()]),
        }
        rest = &after_open[end + CLOSE.len()..];
    }

    out.push_str(rest);
    out
}

fn placeholder_value(name: &str, now: DateTime<Utc>) -> Option<String> {
    let format = match name {
        "date" => DATE_FORMAT,
        "time" => TIME_FORMAT,
        "dateTime" => DATE_TIME_FORMAT,
        _ => return None,
    };
    Some(now.format(format).to_string())
}

/// The literal part of `template` before its first placeholder
///
/// Archives produced from the same template share this prefix, which makes it
/// the key prefix used to look up the most recent archive.
pub fn listing_prefix(template: &str) -> &str {
    match template.find(OPEN) {
        Some(idx) => &template[..idx],
        None => template,
    }
}
