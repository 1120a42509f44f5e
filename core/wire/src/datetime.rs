// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

//! ISO-8601 timestamps as spoken by the service.
//!
//! The service emits the compact form `20250115T14:30:00Z`. Decoding also
//! accepts the extended form `2025-01-15T14:30:00Z`, the fully compact
//! `20250115T143000Z`, explicit `±HH:MM` offsets and a missing zone
//! designator, which means UTC. Fractional seconds are accepted and
//! truncated.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

const COMPACT_FORMAT: &str = "%Y%m%dT%H:%M:%SZ";

/// Formats a timestamp in the compact form used on the wire.
pub fn format(ts: &DateTime<Utc>) -> String {
    ts.format(COMPACT_FORMAT).to_string()
}

/// Parses any accepted timestamp form. Returns `None` when malformed.
pub fn parse(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    let (date, time) = text.split_once(['T', 't'])?;

    let date = parse_date(date)?;
    let (time, offset) = split_zone(time)?;
    let time = parse_time(time)?;

    let naive = NaiveDateTime::new(date, time);
    let local = offset.from_local_datetime(&naive).single()?;
    Some(local.with_timezone(&Utc))
}

fn parse_date(date: &str) -> Option<NaiveDate> {
    let digits: String = date.chars().filter(|c| *c != '-').collect();
    if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let year = digits[0..4].parse().ok()?;
    let month = digits[4..6].parse().ok()?;
    let day = digits[6..8].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn split_zone(time: &str) -> Option<(&str, FixedOffset)> {
    let utc = FixedOffset::east_opt(0)?;

    if let Some(rest) = time.strip_suffix(['Z', 'z']) {
        return Some((rest, utc));
    }

    match time.find(['+', '-']) {
        None => Some((time, utc)),
        Some(pos) => {
            let (clock, zone) = time.split_at(pos);
            Some((clock, parse_offset(zone)?))
        }
    }
}

fn parse_offset(zone: &str) -> Option<FixedOffset> {
    let sign = if zone.starts_with('-') { -1 } else { 1 };
    let digits: String = zone[1..].chars().filter(|c| *c != ':').collect();
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let (hours, minutes): (i32, i32) = match digits.len() {
        2 => (digits.parse().ok()?, 0),
        4 => (digits[0..2].parse().ok()?, digits[2..4].parse().ok()?),
        _ => return None,
    };
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn parse_time(time: &str) -> Option<NaiveTime> {
    let (clock, fraction) = match time.split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (time, None),
    };
    if let Some(fraction) = fraction {
        if fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }

    let digits: String = clock.chars().filter(|c| *c != ':').collect();
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let hour = digits[0..2].parse().ok()?;
    let minute = digits[2..4].parse().ok()?;
    let second = digits[4..6].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, second)
}
