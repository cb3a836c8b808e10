//! Parser for Valid Time Event Code lines.
//!
//! # Primary VTEC
//!
//! ```text
//! /k.aaa.cccc.pp.s.####.yymmddThhnnZ-yymmddThhnnZ/
//! /O.NEW.KDDC.TO.W.0045.150605T0056Z-150605T0130Z/
//! ```
//!
//! Product class, action, issuing office, phenomenon, significance, event
//! tracking number, then event begin and end times.
//!
//! # Hydrologic VTEC
//!
//! ```text
//! /nwsli.s.ic.yymmddThhnnZ.yymmddThhnnZ.yymmddThhnnZ.fr/
//! /00000.0.ER.000000T0000Z.000000T0000Z.000000T0000Z.OO/
//! ```
//!
//! Location, flood severity, immediate cause, flood begin, crest and end
//! times, and flood record status.
//!
//! Lines are matched in two steps. A line that does not have the shape of a
//! VTEC string is skipped. A line that does, but whose codes or times are
//! invalid, is an error.

use nom::{
    IResult, Parser,
    bytes::complete::take_while_m_n,
    character::complete::char,
    combinator::{all_consuming, recognize},
    sequence::{delimited, terminated},
};

use crate::parser::{ParseError, ParseResult, is_digit, is_upper, lines_with_offsets};
use crate::product::{HydrologicVtec, PrimaryVtec, ProductClass, VtecAction};
use crate::time::parse_vtec_time;

/// Raw fields of a primary VTEC line.
#[derive(Debug, PartialEq)]
struct PrimaryFields<'a> {
    class: &'a str,
    action: &'a str,
    office_id: &'a str,
    phenomenon: &'a str,
    significance: &'a str,
    event_number: &'a str,
    begin: &'a str,
    end: &'a str,
}

/// Raw fields of a hydrologic VTEC line.
#[derive(Debug, PartialEq)]
struct HydrologicFields<'a> {
    location_id: &'a str,
    severity: &'a str,
    immediate_cause: &'a str,
    begin: &'a str,
    crest: &'a str,
    end: &'a str,
    flood_record_status: &'a str,
}

fn is_time_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

/// `yymmddThhnnZ`, accepting anything digit-like so that bad digits are
/// reported rather than skipped.
fn vtec_time(input: &str) -> IResult<&str, &str> {
    recognize((
        take_while_m_n(6, 6, is_time_char),
        char('T'),
        take_while_m_n(4, 4, is_time_char),
        char('Z'),
    ))
    .parse(input)
}

/// A field followed by the `.` separator.
fn dotted<'a>(
    min: usize,
    max: usize,
    predicate: fn(char) -> bool,
) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    terminated(take_while_m_n(min, max, predicate), char('.'))
}

fn primary_fields(input: &str) -> IResult<&str, PrimaryFields<'_>> {
    let (input, _) = char('/').parse(input)?;
    let (input, class) = dotted(1, 1, is_upper).parse(input)?;
    let (input, action) = dotted(3, 3, is_upper).parse(input)?;
    let (input, office_id) = dotted(4, 4, is_upper).parse(input)?;
    let (input, phenomenon) = dotted(2, 2, is_upper).parse(input)?;
    let (input, significance) = dotted(1, 1, is_upper).parse(input)?;
    let (input, event_number) = dotted(4, 4, is_digit).parse(input)?;
    let (input, begin) = terminated(vtec_time, char('-')).parse(input)?;
    let (input, end) = terminated(vtec_time, char('/')).parse(input)?;

    Ok((
        input,
        PrimaryFields {
            class,
            action,
            office_id,
            phenomenon,
            significance,
            event_number,
            begin,
            end,
        },
    ))
}

fn hydrologic_fields(input: &str) -> IResult<&str, HydrologicFields<'_>> {
    let (input, location_id) = delimited(
        char('/'),
        take_while_m_n(5, 5, |c: char| c.is_ascii_alphanumeric()),
        char('.'),
    )
    .parse(input)?;
    let (input, severity) = dotted(1, 1, |c| c.is_ascii_alphanumeric()).parse(input)?;
    let (input, immediate_cause) = dotted(2, 2, is_upper).parse(input)?;
    let (input, begin) = terminated(vtec_time, char('.')).parse(input)?;
    let (input, crest) = terminated(vtec_time, char('.')).parse(input)?;
    let (input, end) = terminated(vtec_time, char('.')).parse(input)?;
    let (input, flood_record_status) =
        terminated(take_while_m_n(2, 2, is_upper), char('/')).parse(input)?;

    Ok((
        input,
        HydrologicFields {
            location_id,
            severity,
            immediate_cause,
            begin,
            crest,
            end,
            flood_record_status,
        },
    ))
}

fn first_char(field: &str) -> char {
    field.chars().next().unwrap_or_default()
}

fn convert_primary(line: &str, fields: PrimaryFields<'_>) -> ParseResult<PrimaryVtec> {
    let malformed = |reason: String| ParseError::malformed("VTEC", line, reason);
    let time = |field: &str| parse_vtec_time(field).map_err(|e| malformed(e.to_string()));

    Ok(PrimaryVtec {
        product_class: fields.class.parse::<ProductClass>().map_err(malformed)?,
        action: fields.action.parse::<VtecAction>().map_err(malformed)?,
        office_id: fields.office_id.to_string(),
        phenomenon: fields.phenomenon.to_string(),
        significance: first_char(fields.significance),
        event_number: fields
            .event_number
            .parse()
            .map_err(|_| malformed(format!("bad event number {:?}", fields.event_number)))?,
        begin: time(fields.begin)?,
        end: time(fields.end)?,
    })
}

fn convert_hydrologic(line: &str, fields: HydrologicFields<'_>) -> ParseResult<HydrologicVtec> {
    let time = |field: &str| {
        parse_vtec_time(field).map_err(|e| ParseError::malformed("hydrologic VTEC", line, e))
    };

    Ok(HydrologicVtec {
        location_id: fields.location_id.to_string(),
        severity: first_char(fields.severity),
        immediate_cause: fields.immediate_cause.to_string(),
        begin: time(fields.begin)?,
        crest: time(fields.crest)?,
        end: time(fields.end)?,
        flood_record_status: fields.flood_record_status.to_string(),
    })
}

/// Parse a single line as a primary VTEC string.
///
/// Returns `Ok(None)` if the line does not have the shape of one.
pub fn parse_primary_vtec(line: &str) -> ParseResult<Option<PrimaryVtec>> {
    let line = line.trim();
    match all_consuming(primary_fields).parse(line) {
        Ok((_, fields)) => convert_primary(line, fields).map(Some),
        Err(_) => Ok(None),
    }
}

/// Parse a single line as a hydrologic VTEC string.
///
/// Returns `Ok(None)` if the line does not have the shape of one.
pub fn parse_hydrologic_vtec(line: &str) -> ParseResult<Option<HydrologicVtec>> {
    let line = line.trim();
    match all_consuming(hydrologic_fields).parse(line) {
        Ok((_, fields)) => convert_hydrologic(line, fields).map(Some),
        Err(_) => Ok(None),
    }
}

/// Find the first primary VTEC line in `text`.
pub fn find_primary_vtec(text: &str) -> ParseResult<Option<PrimaryVtec>> {
    for (_, line) in lines_with_offsets(text) {
        if let Some(vtec) = parse_primary_vtec(line)? {
            return Ok(Some(vtec));
        }
    }
    Ok(None)
}

/// Find the first hydrologic VTEC line in `text`.
pub fn find_hydrologic_vtec(text: &str) -> ParseResult<Option<HydrologicVtec>> {
    for (_, line) in lines_with_offsets(text) {
        if let Some(vtec) = parse_hydrologic_vtec(line)? {
            return Ok(Some(vtec));
        }
    }
    Ok(None)
}
