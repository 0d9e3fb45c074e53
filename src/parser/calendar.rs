//! Meeting fields from an iCalendar (`text/calendar`) part.
//!
//! Only `METHOD:REQUEST` invitations produce a [`MeetingFacet`], and only
//! when the first `VEVENT` has both a start and an end.
//!
//! Times carrying a `TZID` are resolved through the matching `VTIMEZONE`
//! when it declares a single fixed offset. Zones that need rule tables
//! (daylight saving) are not resolved and the item gets no meeting facet.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use tracing::{debug, warn};

use super::header::unfold;
use crate::model::mail::MeetingFacet;

/// Zone ids that always mean UTC, with or without a `VTIMEZONE`.
const UTC_ALIASES: &[&str] = &["utc", "gmt", "z", "etc/utc", "etc/gmt", "zulu"];

/// A `DTSTART`/`DTEND` value before its zone is resolved.
struct RawTime {
    tzid: Option<String>,
    value: String,
}

/// Extract the meeting facet from iCalendar text.
pub fn meeting_from_ics(ics: &str) -> Option<MeetingFacet> {
    let mut method = None;
    let mut in_event = false;
    let mut event_done = false;
    let mut location = String::new();
    let mut start = None;
    let mut end = None;

    // tzid → every TZOFFSETTO seen inside that VTIMEZONE
    let mut zones: HashMap<String, Vec<FixedOffset>> = HashMap::new();
    let mut current_zone: Option<String> = None;
    let mut in_timezone = false;

    for (name, value) in unfold(ics) {
        // "dtstart;tzid=europe/madrid" → "dtstart", ["tzid=europe/madrid"]
        let mut parts = name.split(';');
        let prop = parts.next().unwrap_or(&name);

        if in_timezone {
            match prop {
                "tzid" => {
                    let id = value.trim().to_ascii_lowercase();
                    zones.entry(id.clone()).or_default();
                    current_zone = Some(id);
                }
                "tzoffsetto" => match (current_zone.as_ref(), parse_utc_offset(&value)) {
                    (Some(id), Some(offset)) => {
                        let offsets = zones.entry(id.clone()).or_default();
                        if !offsets.contains(&offset) {
                            offsets.push(offset);
                        }
                    }
                    (_, None) => debug!(value = %value, "Unparseable TZOFFSETTO"),
                    (None, Some(_)) => {}
                },
                "end" if value.eq_ignore_ascii_case("vtimezone") => {
                    in_timezone = false;
                    current_zone = None;
                }
                _ => {}
            }
            continue;
        }

        match (prop, in_event) {
            ("method", false) => method = Some(value.to_ascii_uppercase()),
            ("begin", false) if value.eq_ignore_ascii_case("vtimezone") => in_timezone = true,
            ("begin", false) if value.eq_ignore_ascii_case("vevent") && !event_done => {
                in_event = true
            }
            ("end", true) if value.eq_ignore_ascii_case("vevent") => {
                in_event = false;
                event_done = true;
            }
            ("location", true) => location = unescape_text(&value),
            ("dtstart", true) => start = Some(RawTime::new(parts, value)),
            ("dtend", true) => end = Some(RawTime::new(parts, value)),
            _ => {}
        }
    }

    if method.as_deref() != Some("REQUEST") {
        debug!(method = ?method, "Calendar part is not a meeting request");
        return None;
    }

    Some(MeetingFacet {
        location,
        start: resolve_time(start?, &zones)?,
        end: resolve_time(end?, &zones)?,
    })
}

impl RawTime {
    fn new<'a>(params: impl Iterator<Item = &'a str>, value: String) -> Self {
        let tzid = params
            .filter_map(|p| p.strip_prefix("tzid="))
            .map(|id| id.trim_matches('"').to_string())
            .next();
        Self { tzid, value }
    }
}

/// Turn a raw time into UTC, honouring its `TZID` when it can be resolved.
fn resolve_time(raw: RawTime, zones: &HashMap<String, Vec<FixedOffset>>) -> Option<DateTime<Utc>> {
    let value = raw.value.trim();
    let tzid = match raw.tzid {
        // A trailing Z or a plain date carries no zone of its own
        Some(id) if !value.ends_with('Z') && value.contains('T') => id,
        _ => return parse_ics_datetime(value),
    };
    if UTC_ALIASES.contains(&tzid.as_str()) {
        return parse_ics_datetime(value);
    }

    let local = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()?;
    match zones.get(&tzid).map(Vec::as_slice) {
        Some([offset]) => offset
            .from_local_datetime(&local)
            .single()
            .map(|dt| dt.with_timezone(&Utc)),
        Some(offsets) if !offsets.is_empty() => {
            warn!(tzid = %tzid, "Calendar time zone has daylight rules; meeting time not resolved");
            None
        }
        _ => {
            warn!(tzid = %tzid, "Unknown calendar time zone; meeting time not resolved");
            None
        }
    }
}

/// `20240305T140000Z`, floating `20240305T140000` (read as UTC) or a
/// `20240305` all-day date.
fn parse_ics_datetime(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Some(utc) = value.strip_suffix('Z') {
        return NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
            .ok()
            .map(|ndt| Utc.from_utc_datetime(&ndt));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S") {
        return Some(Utc.from_utc_datetime(&ndt));
    }
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| Utc.from_utc_datetime(&ndt))
}

/// `+0530`, `-0800` or `+013000` as in `TZOFFSETTO`.
fn parse_utc_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    let (sign, digits) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };
    if !(digits.len() == 4 || digits.len() == 6) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[0..2].parse().ok()?;
    let minutes: i32 = digits[2..4].parse().ok()?;
    let seconds: i32 = if digits.len() == 6 { digits[4..6].parse().ok()? } else { 0 };
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60 + seconds))
}

/// Undo RFC 5545 TEXT escaping.
fn unescape_text(value: &str) -> String {
    value
        .replace("\\n", "\n")
        .replace("\\N", "\n")
        .replace("\\,", ",")
        .replace("\\;", ";")
        .replace("\\\\", "\\")
}
