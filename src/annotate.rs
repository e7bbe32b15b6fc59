//! Pure event annotation: turns a raw line + source path into a structured
//! [`Event`]. Deterministic given its inputs except for the freshly
//! generated `client_uuid`.

use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;
use uuid::Uuid;

use crate::event::{CollectorIdentity, Event, Meta};

fn ip_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:(?:25[0-5]|2[0-4]\d|1?\d{1,2})\.){3}(?:25[0-5]|2[0-4]\d|1?\d{1,2})\b")
            .expect("static IP regex is valid")
    })
}

fn user_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:user=|for user |user )([A-Za-z0-9_.\-]+)").expect("static user regex is valid")
    })
}

/// Extracts `{ip, user}` from a line. Missing fields become explicit `None`.
pub fn extract_meta(line: &str) -> Meta {
    let ip = ip_regex().find(line).map(|m| m.as_str().to_string());
    let user = user_regex()
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    Meta { ip, user }
}

/// Builds an [`Event`] from a raw line and its source path.
///
/// `now` and `host` are passed in rather than read from the environment so
/// the function stays pure and testable; callers pass `SystemTime::now()`
/// and the process-lifetime hostname.
pub fn annotate(line: &str, source: &str, now: SystemTime, host: &str) -> Event {
    let ts = now
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    Event {
        client_uuid: Uuid::new_v4(),
        ts,
        source: source.to_string(),
        msg: line.to_string(),
        meta: extract_meta(line),
        collector: CollectorIdentity { host: host.to_string() },
    }
}
