//! Parsers for the polygon and storm-tracking blocks of a warning.
//!
//! # Polygon
//!
//! ```text
//! LAT...LON 3870 10017 3848 10017 3847 10058 3869 10057
//!       3870 10017
//! ```
//!
//! # Tracking line
//!
//! ```text
//! TIME...MOT...LOC 0055Z 227DEG 17KT 3869 10033
//! ```
//!
//! Coordinates are in hundredths of a degree, longitudes west. A tracking
//! line gives the observation time, the direction the storm moves from, its
//! speed in knots and one or more storm positions.

use chrono::{DateTime, Utc};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while_m_n},
    character::complete::{char, digit1, space0, space1},
    combinator::{eof, peek},
    multi::many1,
    sequence::{preceded, separated_pair, terminated},
};
use tracing::debug;

use crate::parser::{
    ParseError, ParseResult, coordinate_pair, coordinate_token, is_coordinate_token, is_digit,
    lines_with_offsets,
};
use crate::product::{GeoPoint, Polygon, TrackingLine};
use crate::time::resolve_hour_minute;

const POLYGON_MARKER: &str = "LAT...LON";
const TRACKING_MARKER: &str = "TIME...MOT...LOC";

/// A marker word at the start of a line, allowing leading blanks.
fn marker<'a>(
    word: &'static str,
) -> impl Parser<&'a str, Output = &'a str, Error = nom::error::Error<&'a str>> {
    preceded(space0, terminated(tag(word), peek(alt((space1, eof)))))
}

fn points_from_tokens(
    kind: &'static str,
    line: &str,
    tokens: &[&str],
) -> ParseResult<Vec<GeoPoint>> {
    if tokens.len() % 2 != 0 {
        return Err(ParseError::malformed(
            kind,
            line,
            format!("odd number of coordinates ({})", tokens.len()),
        ));
    }
    tokens
        .chunks(2)
        .map(|pair| {
            coordinate_pair(pair[0], pair[1]).map_err(|e| ParseError::malformed(kind, line, e))
        })
        .collect()
}

/// Find the first `LAT...LON` block in `text`.
///
/// The vertex list continues onto following lines for as long as they hold
/// only coordinate numbers. A marker without any coordinates is treated as
/// absent.
///
/// # Errors
///
/// An odd number of coordinates, or a coordinate of the wrong width, is a
/// [`ParseError::Malformed`].
pub fn find_polygon(text: &str) -> ParseResult<Option<Polygon>> {
    let mut lines = lines_with_offsets(text).map(|(_, line)| line);

    while let Some(line) = lines.next() {
        let Ok((rest, _)) = marker(POLYGON_MARKER).parse(line) else {
            continue;
        };

        let mut tokens: Vec<&str> = rest.split_whitespace().collect();
        if let Some(word) = tokens.iter().find(|word| !is_coordinate_token(word)) {
            return Err(ParseError::malformed(
                "polygon",
                line,
                format!("unexpected token {:?}", word),
            ));
        }

        for continuation in lines.by_ref() {
            let words: Vec<&str> = continuation.split_whitespace().collect();
            if words.is_empty() || !words.iter().all(|word| is_coordinate_token(word)) {
                break;
            }
            tokens.extend(words);
        }

        if tokens.is_empty() {
            debug!("Polygon marker without coordinates");
            return Ok(None);
        }

        let vertices = points_from_tokens("polygon", line, &tokens)?;
        return Ok(Some(Polygon { vertices }));
    }

    Ok(None)
}

/// Raw fields of a tracking line.
struct TrackingFields<'a> {
    time: &'a str,
    direction: &'a str,
    speed: &'a str,
    points: Vec<(&'a str, &'a str)>,
}

fn tracking_fields(line: &str) -> IResult<&str, TrackingFields<'_>> {
    let (input, _) = marker(TRACKING_MARKER).parse(line)?;
    let (input, time) =
        preceded(space1, terminated(take_while_m_n(4, 4, is_digit), char('Z'))).parse(input)?;
    let (input, direction) = preceded(space1, terminated(digit1, tag("DEG"))).parse(input)?;
    let (input, speed) = preceded(space1, terminated(digit1, tag("KT"))).parse(input)?;
    let (input, points) = terminated(
        many1(preceded(
            space1,
            separated_pair(coordinate_token, space1, coordinate_token),
        )),
        (space0, eof),
    )
    .parse(input)?;

    Ok((
        input,
        TrackingFields {
            time,
            direction,
            speed,
            points,
        },
    ))
}

/// Find the first `TIME...MOT...LOC` line in `text`.
///
/// The time of day is placed on the date closest to `reference`. Storm
/// positions may wrap onto following lines, which continue the list only
/// while they hold nothing but coordinate numbers.
///
/// # Errors
///
/// A line starting with the marker but not following the grammar, or
/// carrying an invalid time or coordinate, is a [`ParseError::Malformed`].
pub fn find_tracking_line(
    text: &str,
    reference: DateTime<Utc>,
) -> ParseResult<Option<TrackingLine>> {
    let mut lines = lines_with_offsets(text).map(|(_, line)| line);

    while let Some(line) = lines.next() {
        if marker(TRACKING_MARKER).parse(line).is_err() {
            continue;
        }

        let malformed = |reason: String| ParseError::malformed("tracking", line, reason);
        let (_, fields) = tracking_fields(line)
            .map_err(|_| malformed("expected HHMMZ DDDDEG SSKT and positions".to_string()))?;

        let time =
            resolve_hour_minute(reference, fields.time).map_err(|e| malformed(e.to_string()))?;
        let direction_deg = fields
            .direction
            .parse()
            .map_err(|_| malformed(format!("bad direction {:?}", fields.direction)))?;
        let speed_kt = fields
            .speed
            .parse()
            .map_err(|_| malformed(format!("bad speed {:?}", fields.speed)))?;
        let mut points = fields
            .points
            .iter()
            .map(|&(lat, lon)| coordinate_pair(lat, lon).map_err(|e| malformed(e.to_string())))
            .collect::<ParseResult<Vec<_>>>()?;

        let mut wrapped = Vec::new();
        for continuation in lines.by_ref() {
            let words: Vec<&str> = continuation.split_whitespace().collect();
            if words.is_empty() || !words.iter().all(|word| is_coordinate_token(word)) {
                break;
            }
            wrapped.extend(words);
        }
        points.extend(points_from_tokens("tracking", line, &wrapped)?);

        return Ok(Some(TrackingLine {
            time,
            direction_deg,
            speed_kt,
            points,
        }));
    }

    Ok(None)
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
    fn test_tornado_polygon() {
        let polygon = find_polygon(&crlf(TORNADO_WARNING)).unwrap().unwrap();
        assert_eq!(polygon.len(), 5);
        assert_eq!(polygon.vertices[0].latitude, 38.7);
        assert_eq!(polygon.vertices[0].longitude, -100.17);
        assert_eq!(polygon.vertices[2].latitude, 38.47);
        assert_eq!(polygon.vertices[2].longitude, -100.58);
        assert_eq!(polygon.vertices[4], polygon.vertices[0]);
        assert!(polygon.is_closed());
    }

    #[test]
    fn test_polygon_absent() {
        assert_eq!(find_polygon("NO GEOMETRY\n").unwrap(), None);
        assert_eq!(find_polygon("LAT...LON\n\n").unwrap(), None);
        assert_eq!(find_polygon("SEE LAT...LON 3870 10017\n").unwrap(), None);
    }

    #[test]
    fn test_polygon_stops_at_text() {
        let text = "LAT...LON 4135 9630 4135 9580\n4090 9580\nTHIS IS 1234 TEXT\n4090 9630\n";
        let polygon = find_polygon(text).unwrap().unwrap();
        assert_eq!(polygon.len(), 3);
        assert!(!polygon.is_closed());
    }

    #[test]
    fn test_polygon_odd_count_is_error() {
        let err = find_polygon("LAT...LON 3870 10017 3848\n").unwrap_err();
        assert!(matches!(err, ParseError::Malformed { kind: "polygon", .. }));
    }

    #[test]
    fn test_polygon_wrong_width_is_error() {
        assert!(find_polygon("LAT...LON 387 10017 3848 10017\n").is_err());
        assert!(find_polygon("LAT...LON 3870 10017 3848 1001A\n").is_err());
    }

    #[test]
    fn test_tornado_tracking_line() {
        let track = find_tracking_line(&crlf(TORNADO_WARNING), reference())
            .unwrap()
            .unwrap();
        assert_eq!(track.time, Utc.with_ymd_and_hms(2015, 6, 5, 0, 55, 0).unwrap());
        assert_eq!(track.direction_deg, 227);
        assert_eq!(track.speed_kt, 17);
        assert_eq!(
            track.points,
            vec![GeoPoint {
                latitude: 38.69,
                longitude: -100.33
            }]
        );
    }

    #[test]
    fn test_tracking_line_of_storms() {
        let text =
            "TIME...MOT...LOC 2250Z 250DEG 30KT 4360 8940 4355 8960\n  4350 8980\n\n$$\n";
        let reference = Utc.with_ymd_and_hms(2015, 6, 21, 22, 52, 0).unwrap();
        let track = find_tracking_line(text, reference).unwrap().unwrap();
        assert_eq!(track.points.len(), 3);
        assert_eq!(track.points[2].latitude, 43.5);
        assert_eq!(track.points[2].longitude, -89.8);
    }

    #[test]
    fn test_tracking_line_stops_at_text() {
        let text = "TIME...MOT...LOC 0055Z 227DEG 17KT 3869 10033\n10 20 MILES\n$$\n";
        let track = find_tracking_line(text, reference()).unwrap().unwrap();
        assert_eq!(track.points.len(), 1);

        let text = "TIME...MOT...LOC 0055Z 227DEG 17KT 3869 10033\n\n3870 10017\n";
        let track = find_tracking_line(text, reference()).unwrap().unwrap();
        assert_eq!(track.points.len(), 1);
    }

    #[test]
    fn test_tracking_line_odd_wrapped_count_is_error() {
        let text = "TIME...MOT...LOC 0055Z 227DEG 17KT 3869 10033\n3870\n";
        let err = find_tracking_line(text, reference()).unwrap_err();
        assert!(matches!(err, ParseError::Malformed { kind: "tracking", .. }));
    }

    #[test]
    fn test_tracking_line_absent() {
        assert_eq!(find_tracking_line("NOTHING\n", reference()).unwrap(), None);
    }

    #[test]
    fn test_tracking_line_malformed() {
        let err = find_tracking_line("TIME...MOT...LOC 0055Z 227DEG\n", reference()).unwrap_err();
        assert!(matches!(err, ParseError::Malformed { kind: "tracking", .. }));
        let bad_time = "TIME...MOT...LOC 2599Z 227DEG 17KT 3869 10033\n";
        assert!(find_tracking_line(bad_time, reference()).is_err());
        let bad_width = "TIME...MOT...LOC 0055Z 227DEG 17KT 386 10033\n";
        assert!(find_tracking_line(bad_width, reference()).is_err());
    }
}
