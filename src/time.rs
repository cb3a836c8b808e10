//! Resolution of wire timestamps into absolute UTC times.
//!
//! Most time fields in a text product carry no year and no month: a WMO
//! heading or UGC purge time is `DDHHMM`, a tracking line is `HHMMZ`. They
//! are placed in time relative to a reference, normally the transmission
//! timestamp of the product.
//!
//! VTEC times do carry a two-digit year (`YYMMDDTHHMMZ`) and need no
//! reference.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

use crate::parser::{ParseError, ParseResult, parse_digits};

/// Resolve a `DDHHMM` field against `reference`.
///
/// The result has the reference's year and month with the day and time
/// replaced. When the field's day is more than 15 days before the reference
/// day the result rolls into the next month; when it is more than 15 days
/// after, into the previous month. Products are issued close to their
/// transmission time, so this picks the closest plausible date.
///
/// A day exactly 15 days away stays in the reference month.
pub fn resolve_day_hour_minute(
    reference: DateTime<Utc>,
    field: &str,
) -> ParseResult<DateTime<Utc>> {
    if field.len() != 6 || !field.is_ascii() {
        return Err(ParseError::format("day/hour/minute", field));
    }
    let day: u32 = parse_digits("day/hour/minute", &field[0..2])?;
    let hour: u32 = parse_digits("day/hour/minute", &field[2..4])?;
    let minute: u32 = parse_digits("day/hour/minute", &field[4..6])?;

    let ref_day = reference.day();
    let (year, month) = if day + 15 < ref_day {
        next_month(reference.year(), reference.month())
    } else if day > ref_day + 15 {
        previous_month(reference.year(), reference.month())
    } else {
        (reference.year(), reference.month())
    };

    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .ok_or_else(|| ParseError::format("day/hour/minute", field))
}

/// Resolve an `HHMM` field to the occurrence closest to `reference`.
///
/// The time is placed on the reference date, then moved one day back or
/// forward if that leaves it more than twelve hours from the reference.
pub fn resolve_hour_minute(
    reference: DateTime<Utc>,
    field: &str,
) -> ParseResult<DateTime<Utc>> {
    if field.len() != 4 || !field.is_ascii() {
        return Err(ParseError::format("hour/minute", field));
    }
    let hour: u32 = parse_digits("hour/minute", &field[0..2])?;
    let minute: u32 = parse_digits("hour/minute", &field[2..4])?;

    let candidate = reference
        .date_naive()
        .and_hms_opt(hour, minute, 0)
        .ok_or_else(|| ParseError::format("hour/minute", field))?
        .and_utc();

    let offset = candidate - reference;
    if offset > Duration::hours(12) {
        Ok(candidate - Duration::days(1))
    } else if offset < Duration::hours(-12) {
        Ok(candidate + Duration::days(1))
    } else {
        Ok(candidate)
    }
}

/// Parse a VTEC `YYMMDDTHHMMZ` field.
///
/// Returns `Ok(None)` for the "not specified" forms, all zeros
/// (`000000T0000Z`) or all dashes (`------T----Z`).
pub fn parse_vtec_time(field: &str) -> ParseResult<Option<DateTime<Utc>>> {
    let bytes = field.as_bytes();
    if bytes.len() != 12 || !field.is_ascii() || bytes[6] != b'T' || bytes[11] != b'Z' {
        return Err(ParseError::format("VTEC time", field));
    }

    let digits = [&field[0..6], &field[7..11]];
    if digits.iter().all(|part| part.bytes().all(|b| b == b'0'))
        || digits.iter().all(|part| part.bytes().all(|b| b == b'-'))
    {
        return Ok(None);
    }

    let year: i32 = parse_digits("VTEC time", &field[0..2])?;
    let month: u32 = parse_digits("VTEC time", &field[2..4])?;
    let day: u32 = parse_digits("VTEC time", &field[4..6])?;
    let hour: u32 = parse_digits("VTEC time", &field[7..9])?;
    let minute: u32 = parse_digits("VTEC time", &field[9..11])?;

    NaiveDate::from_ymd_opt(2000 + year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .map(|naive| Some(naive.and_utc()))
        .ok_or_else(|| ParseError::format("VTEC time", field))
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}
