//! Shared parsing primitives and error types.
//!
//! Every sub-format in a text product (WMO header, UGC, VTEC, polygons,
//! tracking lines) has its own grammar module. This module holds what they
//! have in common: the error taxonomy, fixed-width digit fields, the
//! scaled-integer coordinate format, and a line iterator that keeps byte
//! offsets so scanners can slice the original text.
//!
//! The grammars are plain `nom` functions. They carry no state, so they are
//! safe to call from any number of threads at once.

use nom::{
    IResult, Parser,
    bytes::complete::take_while_m_n,
    character::complete::one_of,
    combinator::{opt, recognize},
};
use thiserror::Error;

use crate::product::GeoPoint;

/// Errors that can occur while extracting fields from a product.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A fixed-width numeric or time field held something other than digits,
    /// or digits that do not form a valid value.
    #[error("invalid {field}: {value:?}")]
    Format { field: &'static str, value: String },

    /// A token matched none of the grammar alternatives.
    #[error("unable to parse token '{token}' from {input:?}")]
    UnrecognizedToken { token: String, input: String },

    /// A line had the shape of a known sub-format but its content was invalid.
    #[error("malformed {kind} line {line:?}: {reason}")]
    Malformed {
        kind: &'static str,
        line: String,
        reason: String,
    },
}

impl ParseError {
    pub(crate) fn format(field: &'static str, value: impl Into<String>) -> Self {
        ParseError::Format {
            field,
            value: value.into(),
        }
    }

    pub(crate) fn token(token: impl Into<String>, input: impl Into<String>) -> Self {
        ParseError::UnrecognizedToken {
            token: token.into(),
            input: input.into(),
        }
    }

    pub(crate) fn malformed(
        kind: &'static str,
        line: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        ParseError::Malformed {
            kind,
            line: line.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Parse a field that must consist of ASCII digits only.
///
/// `str::parse` alone would accept a leading `+`, which no wire field allows.
pub(crate) fn parse_digits<T: std::str::FromStr>(
    field: &'static str,
    value: &str,
) -> ParseResult<T> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::format(field, value));
    }
    value.parse().map_err(|_| ParseError::format(field, value))
}

/// ASCII digit predicate for `take_while*` combinators.
pub(crate) fn is_digit(c: char) -> bool {
    c.is_ascii_digit()
}

/// ASCII uppercase predicate for `take_while*` combinators.
pub(crate) fn is_upper(c: char) -> bool {
    c.is_ascii_uppercase()
}

/// Recognize a signed or unsigned run of digits as used in coordinate lists.
///
/// Width is validated by [`coordinate_pair`], not here, so that a pair with a
/// wrong-width member is reported instead of silently ending the list.
pub(crate) fn coordinate_token(input: &str) -> IResult<&str, &str> {
    recognize((opt(one_of("+-")), take_while_m_n(1, 6, is_digit))).parse(input)
}

/// Check whether a whitespace-delimited word is a coordinate token.
pub(crate) fn is_coordinate_token(word: &str) -> bool {
    matches!(coordinate_token(word), Ok(("", _)))
}

/// Convert one latitude/longitude token pair into a point.
///
/// Both values are integers in hundredths of a degree (`3870` is 38.70).
/// Latitudes are north. Longitudes are west, so an unsigned longitude is
/// negated; an explicit sign is honored as written.
pub(crate) fn coordinate_pair(lat: &str, lon: &str) -> ParseResult<GeoPoint> {
    Ok(GeoPoint {
        latitude: scaled_value("latitude", lat, false)?,
        longitude: scaled_value("longitude", lon, true)?,
    })
}

fn scaled_value(field: &'static str, token: &str, west_by_default: bool) -> ParseResult<f64> {
    let (sign, digits) = match token.as_bytes().first() {
        Some(b'-') => (Some(-1.0), &token[1..]),
        Some(b'+') => (Some(1.0), &token[1..]),
        _ => (None, token),
    };
    if !(4..=5).contains(&digits.len()) {
        return Err(ParseError::format(field, token));
    }
    let value: u32 = parse_digits(field, digits)?;
    let sign = sign.unwrap_or(if west_by_default { -1.0 } else { 1.0 });
    Ok(sign * value as f64 / 100.0)
}

/// Iterate over the lines of `text` with the byte offset of each line start.
///
/// Lines are yielded without their `\n` terminator or the carriage returns
/// before it (EMWIN text often ends lines with `\r\r\n`).
pub(crate) fn lines_with_offsets(text: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut offset = 0;
    text.split_inclusive('\n').map(move |raw| {
        let start = offset;
        offset += raw.len();
        let line = raw.strip_suffix('\n').unwrap_or(raw);
        (start, line.trim_end_matches('\r'))
    })
}

/// Normalize an arbitrary byte stream to ASCII text.
///
/// Bytes outside the ASCII range are replaced with `?`, one for one, so that
/// offsets in the decoded text match offsets in the raw bytes.
pub fn ascii_text(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '?' })
        .collect()
}
