//! Parser for the WMO abbreviated heading of a text product.
//!
//! # Header Format
//!
//! ```text
//! TTAAii CCCC DDHHMM [BBB]
//! NNNXXX
//! ```
//!
//! Example:
//! ```text
//! WFUS53 KDDC 050056
//! TORDDC
//! ```
//!
//! The second line is the AFOS product identifier: a three-letter product
//! category followed by a one to three character location.

use chrono::{DateTime, Utc};
use nom::{
    IResult, Parser,
    bytes::complete::{take_till, take_while, take_while_m_n, take_while1},
    character::complete::{char, line_ending},
    combinator::{opt, verify},
    sequence::preceded,
};
use tracing::debug;

use crate::parser::{is_digit, is_upper};
use crate::product::WmoHeader;
use crate::time::resolve_day_hour_minute;

/// Raw header fields, before time resolution.
#[derive(Debug, PartialEq)]
struct HeaderFields<'a> {
    designator: &'a str,
    office_id: &'a str,
    time: &'a str,
    indicator: Option<&'a str>,
    afos: Option<&'a str>,
}

/// Parse `TTAAii`: four letters then two digits.
fn parse_designator(input: &str) -> IResult<&str, &str> {
    verify(
        take_while_m_n(6, 6, |c: char| c.is_ascii_alphanumeric()),
        |s: &str| {
            s[..4].bytes().all(|b| b.is_ascii_uppercase())
                && s[4..].bytes().all(|b| b.is_ascii_digit())
        },
    )
    .parse(input)
}

/// Parse the optional AFOS line: 4 to 6 letters, digits or spaces.
fn parse_afos(input: &str) -> IResult<&str, &str> {
    verify(take_till(|c: char| c == '\r' || c == '\n'), |line: &str| {
        let trimmed = line.trim_end();
        (4..=6).contains(&trimmed.len())
            && trimmed
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b' ')
    })
    .parse(input)
}

fn parse_header_fields(input: &str) -> IResult<&str, HeaderFields<'_>> {
    let (input, designator) = parse_designator(input)?;
    let (input, _) = char(' ').parse(input)?;
    let (input, office_id) = take_while_m_n(4, 4, is_upper).parse(input)?;
    let (input, _) = char(' ').parse(input)?;
    let (input, time) = take_while_m_n(6, 6, is_digit).parse(input)?;
    let (input, indicator) =
        opt(preceded(char(' '), take_while_m_n(3, 3, is_upper))).parse(input)?;
    // Tolerate trailing blanks on the heading line before the AFOS line.
    let (input, _) = opt(take_while1(|c: char| c == ' ')).parse(input)?;
    let (input, afos) = opt(preceded(
        (take_while(|c: char| c == '\r'), line_ending),
        parse_afos,
    ))
    .parse(input)?;

    Ok((
        input,
        HeaderFields {
            designator,
            office_id,
            time,
            indicator,
            afos,
        },
    ))
}

/// Parse the WMO heading at the very start of `content`.
///
/// The issue time is resolved against `reference`, normally the
/// transmission timestamp. If the content does not begin with a heading, or
/// the heading's time is not a valid day/hour/minute, an empty header is
/// returned: many feed files have no heading and that is not an error.
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use emwin_parser::header::parse_wmo_header;
///
/// let reference = Utc.with_ymd_and_hms(2015, 6, 5, 0, 56, 0).unwrap();
/// let header = parse_wmo_header("WFUS53 KDDC 050056\r\nTORDDC\r\n", reference);
/// assert_eq!(header.office_id, "KDDC");
/// assert_eq!(header.afos_pil(), "TORDDC");
/// ```
pub fn parse_wmo_header(content: &str, reference: DateTime<Utc>) -> WmoHeader {
    let Ok((_, fields)) = parse_header_fields(content) else {
        return WmoHeader::default();
    };

    let issued_at = match resolve_day_hour_minute(reference, fields.time) {
        Ok(time) => time,
        Err(e) => {
            debug!("Ignoring WMO heading with unusable time: {}", e);
            return WmoHeader::default();
        }
    };

    let afos = fields.afos.map(str::trim_end).unwrap_or_default();
    let (product_category, location_id) = if afos.len() >= 3 {
        (afos[..3].to_string(), afos[3..].trim().to_string())
    } else {
        (String::new(), String::new())
    };

    WmoHeader {
        data_type: fields.designator[..2].to_string(),
        distribution: fields.designator[2..].to_string(),
        office_id: fields.office_id.to_string(),
        issued_at: Some(issued_at),
        indicator: fields.indicator.unwrap_or_default().to_string(),
        product_category,
        location_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::{TORNADO_WARNING, crlf};
    use chrono::TimeZone;

    fn reference() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2015, 6, 5, 0, 56, 0).unwrap()
    }

    #[test]
    fn test_parse_tornado_header() {
        let header = parse_wmo_header(&crlf(TORNADO_WARNING), reference());

        assert_eq!(header.data_type, "WF");
        assert_eq!(header.distribution, "US53");
        assert_eq!(header.office_id, "KDDC");
        assert_eq!(header.issued_at, Some(reference()));
        assert_eq!(header.indicator, "");
        assert_eq!(header.product_category, "TOR");
        assert_eq!(header.location_id, "DDC");
        assert_eq!(header.afos_pil(), "TORDDC");
    }

    #[test]
    fn test_parse_header_with_indicator() {
        let header = parse_wmo_header("WWUS83 KMKX 212252 CCA\nSPSMKX\n", reference());
        assert_eq!(header.indicator, "CCA");
        assert_eq!(header.product_category, "SPS");
        assert_eq!(header.location_id, "MKX");
        assert_eq!(
            header.issued_at,
            Utc.with_ymd_and_hms(2015, 5, 21, 22, 52, 0).single()
        );
    }

    #[test]
    fn test_parse_header_emwin_line_endings() {
        let header = parse_wmo_header("WFUS53 KDDC 050056\r\r\nTORDDC\r\r\n\r\r\n", reference());
        assert_eq!(header.office_id, "KDDC");
        assert_eq!(header.afos_pil(), "TORDDC");
    }

    #[test]
    fn test_parse_header_short_afos() {
        let header = parse_wmo_header("FXUS61 KBOX 051200\nAFDB\n", reference());
        assert_eq!(header.product_category, "AFD");
        assert_eq!(header.location_id, "B");
    }

    #[test]
    fn test_parse_header_without_afos() {
        let header = parse_wmo_header("SXUS50 KWNO 051200\n\nSOME TEXT", reference());
        assert_eq!(header.office_id, "KWNO");
        assert_eq!(header.product_category, "");
        assert_eq!(header.location_id, "");
    }

    #[test]
    fn test_no_header_is_empty() {
        assert!(parse_wmo_header("KSC101-135-050130-\n", reference()).is_empty());
        assert!(parse_wmo_header("", reference()).is_empty());
        // Not at the start of the content
        assert!(parse_wmo_header("\nWFUS53 KDDC 050056\n", reference()).is_empty());
    }

    #[test]
    fn test_invalid_time_is_empty() {
        assert!(parse_wmo_header("WFUS53 KDDC 002500\nTORDDC\n", reference()).is_empty());
    }
}
