//! Assembly of decoded product segments.
//!
//! The [`Decoder`] drives the whole pipeline for one transmission: it reads
//! the WMO heading, cuts the text into bulletins and segments, then runs
//! every field extractor over each segment independently and merges the
//! results into a [`ProductSegment`].

use thiserror::Error;
use tracing::{debug, warn};

use crate::bullets::extract_bullets;
use crate::geometry::{find_polygon, find_tracking_line};
use crate::header::parse_wmo_header;
use crate::parser::{ParseError, ParseResult};
use crate::product::{ProductSegment, RawProduct, Segment, WmoHeader};
use crate::segment::{extract_bulletins, split_segments};
use crate::ugc::find_geo_codes;
use crate::vtec::{find_hydrologic_vtec, find_primary_vtec};

/// A segment that could not be decoded.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("failed to decode segment {sequence} of {filename}")]
pub struct DecodeError {
    /// Derived filename of the failing segment.
    pub filename: String,

    /// Sequence number of the segment within its bulletin.
    pub sequence: u32,

    #[source]
    pub source: ParseError,
}

/// Options controlling how the decoder treats bad fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Fail a segment when any of its fields is malformed. When false the
    /// field is left unset and a warning is logged instead.
    pub strict: bool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// Decoder for raw EMWIN transmissions.
///
/// Holds only its options, so one decoder can be shared freely between
/// threads.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    options: DecoderOptions,
}

impl Decoder {
    /// Create a decoder with the given options.
    pub fn new(options: DecoderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> DecoderOptions {
        self.options
    }

    /// Decode every segment of every bulletin in `product`.
    ///
    /// Results are in document order. A transmission without bulletin
    /// structure yields an empty list.
    pub fn decode(&self, product: &RawProduct) -> Vec<Result<ProductSegment, DecodeError>> {
        let text = product.text();
        let wmo_header = parse_wmo_header(&text, product.timestamp);
        let bulletins = extract_bulletins(&product.filename, &text);

        debug!(
            "{}: {} bulletin(s), header {}",
            product.filename,
            bulletins.len(),
            if wmo_header.is_empty() {
                "absent".to_string()
            } else {
                wmo_header.to_string()
            }
        );

        bulletins
            .iter()
            .flat_map(|bulletin| {
                split_segments(&bulletin.filename, &bulletin.header, &bulletin.body)
            })
            .map(|segment| self.assemble(product, &wmo_header, segment))
            .collect()
    }

    /// Run all field extractors over one segment.
    ///
    /// Every extractor sees the whole segment body. The first VTEC string of
    /// each kind, the first polygon and the first tracking line are kept.
    pub fn assemble(
        &self,
        product: &RawProduct,
        wmo_header: &WmoHeader,
        segment: Segment,
    ) -> Result<ProductSegment, DecodeError> {
        let body = segment.body.as_str();
        let reference = product.timestamp;

        let geo_codes = self.field(&segment, "UGC", find_geo_codes(body, reference))?;
        let primary_vtec = self.field(&segment, "VTEC", find_primary_vtec(body))?;
        let hydrologic_vtec =
            self.field(&segment, "hydrologic VTEC", find_hydrologic_vtec(body))?;
        let polygon = self.field(&segment, "polygon", find_polygon(body))?;
        let tracking_line =
            self.field(&segment, "tracking line", find_tracking_line(body, reference))?;
        let bullets = extract_bullets(body);

        Ok(ProductSegment {
            filename: segment.filename,
            sequence: segment.sequence,
            timestamp: product.timestamp,
            received_at: product.received_at,
            source: product.source.clone(),
            wmo_header: wmo_header.clone(),
            header: segment.header,
            body: segment.body,
            geo_codes,
            primary_vtec,
            hydrologic_vtec,
            polygon,
            tracking_line,
            bullets,
        })
    }

    /// Apply the strictness policy to one extractor result.
    fn field<T: Default>(
        &self,
        segment: &Segment,
        name: &str,
        result: ParseResult<T>,
    ) -> Result<T, DecodeError> {
        match result {
            Ok(value) => Ok(value),
            Err(e) if !self.options.strict => {
                warn!("{}: ignoring bad {} field: {}", segment.filename, name, e);
                Ok(T::default())
            }
            Err(e) => Err(DecodeError {
                filename: segment.filename.clone(),
                sequence: segment.sequence,
                source: e,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::{ProductClass, VtecAction};
    use crate::samples::{FLOOD_WARNING, TORNADO_WARNING, WEATHER_STATEMENT, crlf};
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::BTreeSet;
    use std::error::Error as _;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn tornado_product() -> RawProduct {
        RawProduct::new(
            "TORDDCKS.TXT",
            utc(2015, 6, 5, 0, 56),
            crlf(TORNADO_WARNING),
            utc(2015, 6, 5, 0, 57),
            "test",
        )
    }

    fn decode_all(decoder: &Decoder, product: &RawProduct) -> Vec<ProductSegment> {
        decoder
            .decode(product)
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_decoder_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Decoder>();
    }

    #[test]
    fn test_tornado_warning() {
        let segments = decode_all(&Decoder::default(), &tornado_product());
        assert_eq!(segments.len(), 1);
        let segment = &segments[0];

        assert_eq!(segment.filename, "TORDDCKS.01-01.TXT");
        assert_eq!(segment.sequence, 1);
        assert_eq!(segment.source, "test");
        assert_eq!(segment.received_at, utc(2015, 6, 5, 0, 57));
        assert_eq!(segment.wmo_header.office_id, "KDDC");
        assert_eq!(segment.wmo_header.afos_pil(), "TORDDC");
        assert_eq!(segment.wmo_header.issued_at, Some(utc(2015, 6, 5, 0, 56)));

        // UGC
        assert_eq!(segment.geo_codes.len(), 1);
        let kansas = &segment.geo_codes["KS"];
        assert_eq!(kansas.counties, BTreeSet::from([101, 135]));
        assert!(kansas.zones.is_empty());
        assert_eq!(kansas.purge_time, utc(2015, 6, 5, 1, 30));
        assert_eq!(segment.area_count(), 2);

        // VTEC
        let vtec = segment.primary_vtec.as_ref().unwrap();
        assert_eq!(vtec.product_class, ProductClass::Operational);
        assert_eq!(vtec.action, VtecAction::New);
        assert_eq!(vtec.office_id, "KDDC");
        assert_eq!(vtec.event_key(), "TO.W");
        assert_eq!(vtec.event_number, 45);
        assert_eq!(vtec.begin, Some(utc(2015, 6, 5, 0, 56)));
        assert_eq!(vtec.end, Some(utc(2015, 6, 5, 1, 30)));
        assert!(segment.hydrologic_vtec.is_none());

        // Geometry
        let polygon = segment.polygon.as_ref().unwrap();
        assert_eq!(polygon.len(), 5);
        assert_eq!(polygon.vertices[0].latitude, 38.7);
        assert_eq!(polygon.vertices[0].longitude, -100.17);
        assert_eq!(polygon.vertices[4], polygon.vertices[0]);

        let track = segment.tracking_line.as_ref().unwrap();
        assert_eq!(track.time, utc(2015, 6, 5, 0, 55));
        assert_eq!(track.direction_deg, 227);
        assert_eq!(track.speed_kt, 17);
        assert_eq!(track.points.len(), 1);
        assert_eq!(track.points[0].latitude, 38.69);
        assert_eq!(track.points[0].longitude, -100.33);

        assert_eq!(segment.bullets.len(), 3);
        assert_eq!(segment.office_id(), "KDDC");
    }

    #[test]
    fn test_tornado_display() {
        let segments = decode_all(&Decoder::default(), &tornado_product());
        assert_eq!(
            segments[0].to_string(),
            "[ProductSegment] Filename=TORDDCKS.01-01.TXT Date=2015-06-05 00:56 Sequence=1 \
             /O.NEW.KDDC.TO.W.0045.150605T0056Z-150605T0130Z/"
        );
    }

    #[test]
    fn test_flood_warning() {
        let timestamp = utc(2015, 6, 5, 23, 45);
        let product = RawProduct::new("FLWOAXNE.TXT", timestamp, FLOOD_WARNING, timestamp, "");
        let segments = decode_all(&Decoder::default(), &product);
        assert_eq!(segments.len(), 1);
        let segment = &segments[0];

        let hydro = segment.hydrologic_vtec.as_ref().unwrap();
        assert_eq!(hydro.location_id, "00000");
        assert_eq!(hydro.severity, '0');
        assert_eq!(hydro.immediate_cause, "ER");
        assert_eq!(hydro.flood_record_status, "OO");
        assert_eq!(hydro.begin, None);
        assert_eq!(hydro.crest, None);
        assert_eq!(hydro.end, None);

        let vtec = segment.primary_vtec.as_ref().unwrap();
        assert_eq!(vtec.event_key(), "FA.W");
        assert_eq!(vtec.end, Some(utc(2015, 6, 6, 5, 45)));

        let nebraska = &segment.geo_codes["NE"];
        assert_eq!(nebraska.counties, BTreeSet::from([25, 55, 153]));
        assert_eq!(nebraska.purge_time, utc(2015, 6, 6, 5, 45));

        assert_eq!(segment.polygon.as_ref().map(|p| p.len()), Some(4));
        assert!(segment.tracking_line.is_none());
    }

    #[test]
    fn test_multiple_bulletins() {
        let timestamp = utc(2015, 6, 21, 22, 52);
        let product =
            RawProduct::new("SVSMKXWI.TXT", timestamp, WEATHER_STATEMENT, timestamp, "");
        let segments = decode_all(&Decoder::default(), &product);
        assert_eq!(segments.len(), 2);

        assert_eq!(segments[0].filename, "SVSMKXWI.01-01.TXT");
        assert_eq!(segments[1].filename, "SVSMKXWI.02-01.TXT");

        let cancelled = segments[0].primary_vtec.as_ref().unwrap();
        assert_eq!(cancelled.action, VtecAction::Can);
        assert_eq!(cancelled.begin, None);
        assert!(segments[0].tracking_line.is_none());
        assert_eq!(segments[0].geo_codes["WI"].counties, BTreeSet::from([27, 47]));

        let continued = &segments[1];
        assert_eq!(
            continued.geo_codes["WI"].zones,
            BTreeSet::from([1, 2, 6, 7, 8])
        );
        assert_eq!(continued.tracking_line.as_ref().unwrap().points.len(), 2);
        assert_eq!(continued.wmo_header.afos_pil(), "SVSMKX");
    }

    #[test]
    fn test_no_header_yields_nothing() {
        let now = utc(2015, 6, 5, 0, 56);
        let product = RawProduct::new("X.TXT", now, "KSC101-050130-\nTEXT\n$$\n", now, "");
        assert!(Decoder::default().decode(&product).is_empty());

        let product = RawProduct::new("X.TXT", now, "JUST SOME TEXT\n", now, "");
        assert!(Decoder::default().decode(&product).is_empty());
    }

    #[test]
    fn test_minimal_segment_has_only_ugc() {
        let now = utc(2015, 6, 5, 0, 56);
        let content = "SOME HEADER\nKSC101-050130-\nNOTHING ELSE OF NOTE\n$$\n";
        let product = RawProduct::new("X.TXT", now, content, now, "");
        let segments = decode_all(&Decoder::default(), &product);

        assert_eq!(segments.len(), 1);
        assert!(segments[0].wmo_header.is_empty());
        assert_eq!(segments[0].geo_codes["KS"].counties, BTreeSet::from([101]));
        assert!(segments[0].primary_vtec.is_none());
        assert!(segments[0].polygon.is_none());
        assert!(segments[0].bullets.is_empty());
    }

    const BAD_VTEC: &str = "WFUS53 KDDC 050056\nTORDDC\n\nKSC101-050130-\n\
                            /O.NEW.KDDC.TO.W.0045.151305T0056Z-150605T0130Z/\n\
                            LAT...LON 3870 10017 3848 10017 3847 10058\n$$\n";

    #[test]
    fn test_strict_mode_fails_segment() {
        let now = utc(2015, 6, 5, 0, 56);
        let product = RawProduct::new("BAD.TXT", now, BAD_VTEC, now, "");
        let results = Decoder::default().decode(&product);
        assert_eq!(results.len(), 1);

        let err = results[0].as_ref().unwrap_err();
        assert_eq!(err.filename, "BAD.01-01.TXT");
        assert_eq!(err.sequence, 1);
        assert!(matches!(err.source, ParseError::Malformed { kind: "VTEC", .. }));
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "failed to decode segment 1 of BAD.01-01.TXT");
    }

    #[test]
    fn test_lenient_mode_drops_field() {
        let now = utc(2015, 6, 5, 0, 56);
        let product = RawProduct::new("BAD.TXT", now, BAD_VTEC, now, "");
        let decoder = Decoder::new(DecoderOptions { strict: false });
        let segments = decode_all(&decoder, &product);

        assert_eq!(segments.len(), 1);
        assert!(segments[0].primary_vtec.is_none());
        assert_eq!(segments[0].polygon.as_ref().map(|p| p.len()), Some(3));
        assert!(!segments[0].geo_codes.is_empty());
    }

    #[test]
    fn test_numeric_text_after_tracking_line() {
        let now = utc(2015, 6, 5, 0, 56);
        let content = "WFUS53 KDDC 050056\nTORDDC\n\nKSC101-050130-\n\
                       TIME...MOT...LOC 0055Z 227DEG 17KT 3869 10033\n\
                       10 20 MILES NORTH OF DIGHTON\n$$\n";
        let product = RawProduct::new("TORDDCKS.TXT", now, content, now, "");
        let segments = decode_all(&Decoder::default(), &product);

        assert_eq!(segments.len(), 1);
        let track = segments[0].tracking_line.as_ref().unwrap();
        assert_eq!(track.direction_deg, 227);
        assert_eq!(track.points.len(), 1);
    }

    #[test]
    fn test_filenames_stable_across_decodes() {
        let timestamp = utc(2015, 6, 21, 22, 52);
        let product = RawProduct::new("SVSMKXWI.TXT", timestamp, WEATHER_STATEMENT, timestamp, "");
        let decoder = Decoder::default();

        let names = |segments: Vec<ProductSegment>| {
            segments
                .into_iter()
                .map(|s| (s.filename, s.sequence))
                .collect::<Vec<_>>()
        };
        let first = names(decode_all(&decoder, &product));
        let second = names(decode_all(&decoder, &product));

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![
                ("SVSMKXWI.01-01.TXT".to_string(), 1),
                ("SVSMKXWI.02-01.TXT".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_directory_dropped_from_filenames() {
        let timestamp = utc(2015, 6, 21, 22, 52);
        let product =
            RawProduct::new("inbox/SVSMKXWI.TXT", timestamp, WEATHER_STATEMENT, timestamp, "");
        let filenames: Vec<String> = decode_all(&Decoder::default(), &product)
            .into_iter()
            .map(|s| s.filename)
            .collect();
        assert_eq!(filenames, vec!["SVSMKXWI.01-01.TXT", "SVSMKXWI.02-01.TXT"]);
    }

    #[test]
    fn test_segment_serializes_to_json() {
        let segments = decode_all(&Decoder::default(), &tornado_product());
        let json = serde_json::to_value(&segments[0]).unwrap();

        assert_eq!(json["filename"], "TORDDCKS.01-01.TXT");
        assert_eq!(json["primary_vtec"]["action"], "NEW");
        assert_eq!(json["geo_codes"]["KS"]["counties"], serde_json::json!([101, 135]));
        assert_eq!(json["primary_vtec"]["significance"], "W");
        assert!(json.get("hydrologic_vtec").is_none());
    }
}
