//! Parser for Universal Geographic Codes.
//!
//! # UGC Format
//!
//! ```text
//! KSC101-135-050130-
//! WIZ001-002-006>008-212300-
//! ```
//!
//! A UGC string is a `-`-separated list of area tokens ending with a
//! `DDHHMM` purge time. The first token names a state, a type (`C` county or
//! `Z` zone) and a number. Later tokens may repeat that triple, or give only
//! a number that inherits the last state and type. `>` denotes an inclusive
//! range and `ALL` stands for every area of the state (number `0`).
//!
//! Long strings wrap across lines; whitespace inside the string is ignored.

use chrono::{DateTime, Utc};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while_m_n},
    character::complete::{char, digit1, line_ending, one_of, satisfy, space0},
    combinator::{all_consuming, eof, map, map_res, opt, peek, recognize, value},
    multi::many_till,
    sequence::preceded,
};
use std::collections::BTreeMap;
use tracing::debug;

use crate::parser::{ParseError, ParseResult, is_digit, is_upper, lines_with_offsets};
use crate::product::{UgcType, UniversalGeoCode};
use crate::time::resolve_day_hour_minute;

/// One area named by a UGC string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UgcGroup {
    pub state: String,
    pub kind: UgcType,
    /// Zone or county number, `0` for `ALL`.
    pub value: u16,
    pub purge_time: DateTime<Utc>,
}

/// Recognize the start of a UGC string: `SSTnnn`, e.g. `KSC101` or `WIZALL`.
pub(crate) fn ugc_anchor(input: &str) -> IResult<&str, &str> {
    recognize((
        take_while_m_n(2, 2, is_upper),
        one_of("CZ"),
        take_while_m_n(3, 3, |c: char| c.is_ascii_digit() || c == 'A' || c == 'L'),
    ))
    .parse(input)
}

fn is_ugc_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '>' | '-' | '\r' | '\n')
}

/// `DDHHMM-` at the end of a line.
fn purge_terminator(input: &str) -> IResult<&str, &str> {
    recognize((
        take_while_m_n(6, 6, is_digit),
        char('-'),
        space0,
        peek((take_while(|c: char| c == '\r'), alt((line_ending, eof)))),
    ))
    .parse(input)
}

/// Recognize a complete UGC block, from the anchor through the purge time.
///
/// The block may span several lines. Anything other than UGC characters
/// before the purge time means this is not a UGC block.
pub(crate) fn ugc_block(input: &str) -> IResult<&str, &str> {
    recognize((ugc_anchor, many_till(satisfy(is_ugc_char), purge_terminator))).parse(input)
}

/// A single `-`-delimited token, before state and type are carried over.
#[derive(Debug, PartialEq)]
enum UgcToken<'a> {
    Prefixed {
        state: &'a str,
        kind: char,
        first: u16,
        last: Option<u16>,
    },
    Bare {
        first: u16,
        last: Option<u16>,
    },
}

fn ugc_number(input: &str) -> IResult<&str, u16> {
    alt((
        value(0, tag("ALL")),
        map_res(digit1, |digits: &str| digits.parse::<u16>()),
    ))
    .parse(input)
}

fn range_end(input: &str) -> IResult<&str, u16> {
    preceded(char('>'), ugc_number).parse(input)
}

fn ugc_token(input: &str) -> IResult<&str, UgcToken<'_>> {
    alt((
        map(
            (
                take_while_m_n(2, 2, is_upper),
                satisfy(is_upper),
                ugc_number,
                opt(range_end),
            ),
            |(state, kind, first, last)| UgcToken::Prefixed {
                state,
                kind,
                first,
                last,
            },
        ),
        map((ugc_number, opt(range_end)), |(first, last)| UgcToken::Bare {
            first,
            last,
        }),
    ))
    .parse(input)
}

/// Parse a UGC string into its individual areas, in the order given.
///
/// Ranges are expanded inclusively; a range whose start exceeds its end
/// names no areas. Whitespace and line breaks inside the string are ignored.
///
/// # Errors
///
/// Returns [`ParseError::UnrecognizedToken`] for a token that is not a valid
/// area, a bare number before any state is known, or a type letter other
/// than `C` or `Z`. Returns [`ParseError::Format`] for an invalid purge time.
pub fn parse_ugc_groups(ugc: &str, reference: DateTime<Utc>) -> ParseResult<Vec<UgcGroup>> {
    let compact: String = ugc.chars().filter(|c| !c.is_whitespace()).collect();
    let mut tokens: Vec<&str> = compact.split('-').filter(|t| !t.is_empty()).collect();

    let purge = tokens.pop().ok_or_else(|| ParseError::token("", ugc))?;
    let purge_time = resolve_day_hour_minute(reference, purge)?;

    let mut groups = Vec::new();
    let mut current: Option<(&str, UgcType)> = None;

    for token in tokens {
        let Ok((_, parsed)) = all_consuming(ugc_token).parse(token) else {
            return Err(ParseError::token(token, ugc));
        };

        let (state, kind, first, last) = match parsed {
            UgcToken::Prefixed {
                state,
                kind,
                first,
                last,
            } => {
                let kind = UgcType::from_code(kind).ok_or_else(|| ParseError::token(token, ugc))?;
                current = Some((state, kind));
                (state, kind, first, last)
            }
            UgcToken::Bare { first, last } => {
                let (state, kind) = current.ok_or_else(|| ParseError::token(token, ugc))?;
                (state, kind, first, last)
            }
        };

        for number in first..=last.unwrap_or(first) {
            groups.push(UgcGroup {
                state: state.to_string(),
                kind,
                value: number,
                purge_time,
            });
        }
    }

    Ok(groups)
}

/// Collect groups into one geo code per state.
///
/// A state's purge time is that of its first group.
pub fn aggregate(groups: &[UgcGroup]) -> BTreeMap<String, UniversalGeoCode> {
    let mut codes: BTreeMap<String, UniversalGeoCode> = BTreeMap::new();

    for group in groups {
        let code = codes
            .entry(group.state.clone())
            .or_insert_with(|| UniversalGeoCode {
                state: group.state.clone(),
                purge_time: group.purge_time,
                zones: Default::default(),
                counties: Default::default(),
            });
        match group.kind {
            UgcType::Zone => code.zones.insert(group.value),
            UgcType::County => code.counties.insert(group.value),
        };
    }

    codes
}

/// Find every UGC block in `text` and aggregate their areas by state.
///
/// A block must start at the beginning of a line. Text without any block
/// yields an empty map.
pub fn find_geo_codes(
    text: &str,
    reference: DateTime<Utc>,
) -> ParseResult<BTreeMap<String, UniversalGeoCode>> {
    let mut groups = Vec::new();
    let mut resume = 0;

    for (offset, _) in lines_with_offsets(text) {
        if offset < resume {
            continue;
        }
        let Ok((rest, block)) = ugc_block(&text[offset..]) else {
            continue;
        };
        resume = text.len() - rest.len();
        groups.extend(parse_ugc_groups(block, reference)?);
    }

    if groups.is_empty() {
        debug!("No UGC block found");
    }
    Ok(aggregate(&groups))
}
