//! Data structures representing decoded EMWIN text products.
//!
//! A received file becomes a [`RawProduct`]. The segmenter cuts it into
//! [`Bulletin`]s and [`Segment`]s, and the decoder turns every segment into a
//! [`ProductSegment`] carrying whatever structured fields could be extracted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::parser::ascii_text;

/// A transmission as handed over by the feed.
///
/// This is the only input the decoder accepts. It is never modified after
/// creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawProduct {
    /// Name of the file the transmission arrived as, e.g. `TORDDCKS.TXT`.
    pub filename: String,

    /// When the transmission was issued. Used as the reference time for
    /// every day/hour/minute field in the product.
    pub timestamp: DateTime<Utc>,

    /// Raw bytes, expected to be ASCII.
    pub content: Vec<u8>,

    /// When the transmission was received locally.
    pub received_at: DateTime<Utc>,

    /// Identifier of the feed or channel the transmission came from.
    pub source: String,
}

impl RawProduct {
    /// Create a new raw product.
    pub fn new(
        filename: impl Into<String>,
        timestamp: DateTime<Utc>,
        content: impl Into<Vec<u8>>,
        received_at: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            timestamp,
            content: content.into(),
            received_at,
            source: source.into(),
        }
    }

    /// The content decoded as ASCII text.
    pub fn text(&self) -> String {
        ascii_text(&self.content)
    }
}

/// The WMO abbreviated heading at the top of a transmission.
///
/// ```text
/// WFUS53 KDDC 050056
/// TORDDC
/// ```
///
/// Fields that are not present are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WmoHeader {
    /// Data type designator (`WF`).
    pub data_type: String,

    /// Geographical/distribution designator (`US53`).
    pub distribution: String,

    /// ICAO identifier of the issuing office (`KDDC`).
    pub office_id: String,

    /// Issue time, resolved against the transmission timestamp.
    pub issued_at: Option<DateTime<Utc>>,

    /// Optional BBB indicator such as `RRA`, `CCA`, `AAB`.
    pub indicator: String,

    /// AFOS product category (`TOR`).
    pub product_category: String,

    /// AFOS location identifier (`DDC`).
    pub location_id: String,
}

impl WmoHeader {
    /// Returns true if no header was found.
    pub fn is_empty(&self) -> bool {
        self.data_type.is_empty() && self.office_id.is_empty()
    }

    /// The AFOS product identifier line, category plus location (`TORDDC`).
    pub fn afos_pil(&self) -> String {
        format!("{}{}", self.product_category, self.location_id)
    }
}

impl fmt::Display for WmoHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} {}", self.data_type, self.distribution, self.office_id)?;
        if let Some(issued_at) = self.issued_at {
            write!(f, " {}", issued_at.format("%d%H%M"))?;
        }
        if !self.indicator.is_empty() {
            write!(f, " {}", self.indicator)?;
        }
        let pil = self.afos_pil();
        if !pil.is_empty() {
            write!(f, " {}", pil)?;
        }
        Ok(())
    }
}

/// One self-contained warning or advisory found inside a transmission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bulletin {
    /// 1-based position within the transmission.
    pub sequence: u32,

    /// Derived filename, `{base}.{sequence:02}{ext}`.
    pub filename: String,

    /// Text that preceded the first bulletin of the transmission.
    pub header: String,

    /// From the leading UGC line through the terminating `$$`.
    pub body: String,
}

impl Bulletin {
    /// Header and body as they would appear in a stand-alone product.
    pub fn content(&self) -> String {
        format!("{}{}", self.header, self.body)
    }
}

/// A `$$`-delimited slice of a bulletin body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// 1-based position within the bulletin.
    pub sequence: u32,

    /// Derived filename, `{base}-{sequence:02}{ext}`.
    pub filename: String,

    /// Header shared with the enclosing bulletin.
    pub header: String,

    /// Trimmed segment text.
    pub body: String,
}

/// Whether a UGC element names a forecast zone or a county.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UgcType {
    /// `Z`: public forecast zone
    Zone,
    /// `C`: county or parish (FIPS)
    County,
}

impl UgcType {
    /// Decode the type letter of a UGC element.
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'Z' => Some(UgcType::Zone),
            'C' => Some(UgcType::County),
            _ => None,
        }
    }

    /// The type letter as it appears on the wire.
    pub fn code(&self) -> char {
        match self {
            UgcType::Zone => 'Z',
            UgcType::County => 'C',
        }
    }
}

/// The zones and counties of one state named by a UGC string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniversalGeoCode {
    /// Two-letter state or marine area code.
    pub state: String,

    /// Time after which the product should no longer be considered active.
    pub purge_time: DateTime<Utc>,

    /// Zone numbers. `0` stands for `ALL`.
    pub zones: BTreeSet<u16>,

    /// County numbers. `0` stands for `ALL`.
    pub counties: BTreeSet<u16>,
}

impl fmt::Display for UniversalGeoCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.state)?;
        if !self.zones.is_empty() {
            write!(f, " zones={:?}", self.zones)?;
        }
        if !self.counties.is_empty() {
            write!(f, " counties={:?}", self.counties)?;
        }
        write!(f, " until {}", self.purge_time.format("%Y-%m-%dT%H:%MZ"))
    }
}

/// VTEC product class, the first character of a primary VTEC string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductClass {
    /// `O`: operational product
    Operational,
    /// `T`: test product
    Test,
    /// `E`: experimental product
    Experimental,
    /// `X`: experimental VTEC in an operational product
    ExperimentalVtec,
}

impl FromStr for ProductClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "O" => Ok(ProductClass::Operational),
            "T" => Ok(ProductClass::Test),
            "E" => Ok(ProductClass::Experimental),
            "X" => Ok(ProductClass::ExperimentalVtec),
            _ => Err(format!("unknown product class {:?}", s)),
        }
    }
}

impl fmt::Display for ProductClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductClass::Operational => write!(f, "O"),
            ProductClass::Test => write!(f, "T"),
            ProductClass::Experimental => write!(f, "E"),
            ProductClass::ExperimentalVtec => write!(f, "X"),
        }
    }
}

/// What a product does to the event it tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VtecAction {
    /// New event
    New,
    /// Event continued
    Con,
    /// Event extended in time
    Ext,
    /// Event extended in area
    Exa,
    /// Event extended in both time and area
    Exb,
    /// Event upgraded
    Upg,
    /// Event cancelled
    Can,
    /// Event expired
    Exp,
    /// Correction
    Cor,
    /// Routine
    Rou,
}

impl FromStr for VtecAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(VtecAction::New),
            "CON" => Ok(VtecAction::Con),
            "EXT" => Ok(VtecAction::Ext),
            "EXA" => Ok(VtecAction::Exa),
            "EXB" => Ok(VtecAction::Exb),
            "UPG" => Ok(VtecAction::Upg),
            "CAN" => Ok(VtecAction::Can),
            "EXP" => Ok(VtecAction::Exp),
            "COR" => Ok(VtecAction::Cor),
            "ROU" => Ok(VtecAction::Rou),
            _ => Err(format!("unknown action code {:?}", s)),
        }
    }
}

impl fmt::Display for VtecAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            VtecAction::New => "NEW",
            VtecAction::Con => "CON",
            VtecAction::Ext => "EXT",
            VtecAction::Exa => "EXA",
            VtecAction::Exb => "EXB",
            VtecAction::Upg => "UPG",
            VtecAction::Can => "CAN",
            VtecAction::Exp => "EXP",
            VtecAction::Cor => "COR",
            VtecAction::Rou => "ROU",
        };
        write!(f, "{}", code)
    }
}

/// Primary Valid Time Event Code.
///
/// ```text
/// /O.NEW.KDDC.TO.W.0045.150605T0056Z-150605T0130Z/
/// ```
///
/// `begin` and `end` are `None` when the wire field is all zeros, which is
/// how VTEC says "not specified" (e.g. an event already in progress).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryVtec {
    pub product_class: ProductClass,
    pub action: VtecAction,
    pub office_id: String,
    pub phenomenon: String,
    pub significance: char,
    pub event_number: u16,
    pub begin: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl PrimaryVtec {
    /// Phenomenon and significance joined with a dot, e.g. `TO.W`.
    pub fn event_key(&self) -> String {
        format!("{}.{}", self.phenomenon, self.significance)
    }
}

impl fmt::Display for PrimaryVtec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/{}.{}.{}.{}.{}.{:04}.{}-{}/",
            self.product_class,
            self.action,
            self.office_id,
            self.phenomenon,
            self.significance,
            self.event_number,
            VtecTimeDisplay(self.begin),
            VtecTimeDisplay(self.end),
        )
    }
}

/// Hydrologic Valid Time Event Code, which follows a primary VTEC line in
/// flood products.
///
/// ```text
/// /00000.0.ER.000000T0000Z.000000T0000Z.000000T0000Z.OO/
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydrologicVtec {
    /// NWS location identifier, `00000` when the product covers an area.
    pub location_id: String,
    /// Flood severity, `N`, `0`, `1`, `2`, `3` or `U`.
    pub severity: char,
    /// Immediate cause (`ER` excessive rainfall, `SM` snowmelt, ...).
    pub immediate_cause: String,
    pub begin: Option<DateTime<Utc>>,
    pub crest: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Flood record status (`NO`, `NR`, `UU`, `OO`).
    pub flood_record_status: String,
}

impl fmt::Display for HydrologicVtec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/{}.{}.{}.{}.{}.{}.{}/",
            self.location_id,
            self.severity,
            self.immediate_cause,
            VtecTimeDisplay(self.begin),
            VtecTimeDisplay(self.crest),
            VtecTimeDisplay(self.end),
            self.flood_record_status,
        )
    }
}

struct VtecTimeDisplay(Option<DateTime<Utc>>);

impl fmt::Display for VtecTimeDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(time) => write!(f, "{}", time.format("%y%m%dT%H%MZ")),
            None => write!(f, "000000T0000Z"),
        }
    }
}

/// A point on the earth in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.latitude, self.longitude)
    }
}

/// Warning area outline from a `LAT...LON` block.
///
/// Vertices are kept in the order given. The outline is not closed
/// automatically; most products repeat the first vertex at the end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub vertices: Vec<GeoPoint>,
}

impl Polygon {
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// True if the last vertex repeats the first.
    pub fn is_closed(&self) -> bool {
        self.vertices.len() > 1 && self.vertices.first() == self.vertices.last()
    }
}

/// Storm position and motion from a `TIME...MOT...LOC` line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingLine {
    /// Observation time of the storm position.
    pub time: DateTime<Utc>,

    /// Direction the storm is moving *from*, in degrees.
    pub direction_deg: u16,

    /// Storm speed in knots.
    pub speed_kt: u16,

    /// Storm location: one point for a cell, several for a line of storms.
    pub points: Vec<GeoPoint>,
}

impl fmt::Display for TrackingLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}DEG {}KT",
            self.time.format("%H%MZ"),
            self.direction_deg,
            self.speed_kt
        )?;
        for point in &self.points {
            write!(f, " {}", point)?;
        }
        Ok(())
    }
}

/// A fully decoded segment: the unit of output of the decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSegment {
    /// Derived filename, `{base}.{bulletin:02}-{segment:02}{ext}`.
    pub filename: String,

    /// 1-based position of the segment within its bulletin.
    pub sequence: u32,

    /// Transmission timestamp of the enclosing product.
    pub timestamp: DateTime<Utc>,

    /// Reception timestamp of the enclosing product.
    pub received_at: DateTime<Utc>,

    /// Feed identifier of the enclosing product.
    pub source: String,

    /// WMO heading of the enclosing product.
    pub wmo_header: WmoHeader,

    /// Header text shared by all segments of the bulletin.
    pub header: String,

    /// Segment text.
    pub body: String,

    /// Affected areas, keyed by state.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub geo_codes: BTreeMap<String, UniversalGeoCode>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_vtec: Option<PrimaryVtec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hydrologic_vtec: Option<HydrologicVtec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<Polygon>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_line: Option<TrackingLine>,

    /// `* ...` bullet paragraphs, whitespace-normalized.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bullets: Vec<String>,
}

impl ProductSegment {
    /// Total number of zones and counties named by the segment.
    pub fn area_count(&self) -> usize {
        self.geo_codes
            .values()
            .map(|code| code.zones.len() + code.counties.len())
            .sum()
    }

    /// Office that issued the segment: the VTEC office if present, otherwise
    /// the WMO header office.
    pub fn office_id(&self) -> &str {
        match &self.primary_vtec {
            Some(vtec) => &vtec.office_id,
            None => &self.wmo_header.office_id,
        }
    }
}

impl fmt::Display for ProductSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[ProductSegment] Filename={} Date={} Sequence={}",
            self.filename,
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.sequence
        )?;
        if let Some(ref vtec) = self.primary_vtec {
            write!(f, " {}", vtec)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_raw_product_text_is_ascii() {
        let now = Utc.with_ymd_and_hms(2015, 6, 5, 0, 56, 0).unwrap();
        let product = RawProduct::new("A.TXT", now, b"KS\xffC".to_vec(), now, "test");
        assert_eq!(product.text(), "KS?C");
    }

    #[test]
    fn test_header_afos_pil() {
        let header = WmoHeader {
            data_type: "WF".to_string(),
            distribution: "US53".to_string(),
            office_id: "KDDC".to_string(),
            issued_at: Utc.with_ymd_and_hms(2015, 6, 5, 0, 56, 0).single(),
            indicator: String::new(),
            product_category: "TOR".to_string(),
            location_id: "DDC".to_string(),
        };
        assert_eq!(header.afos_pil(), "TORDDC");
        assert!(!header.is_empty());
        assert_eq!(header.to_string(), "WFUS53 KDDC 050056 TORDDC");
        assert!(WmoHeader::default().is_empty());
    }

    #[test]
    fn test_vtec_display_round_trips_wire_form() {
        let vtec = PrimaryVtec {
            product_class: ProductClass::Operational,
            action: VtecAction::New,
            office_id: "KDDC".to_string(),
            phenomenon: "TO".to_string(),
            significance: 'W',
            event_number: 45,
            begin: Utc.with_ymd_and_hms(2015, 6, 5, 0, 56, 0).single(),
            end: None,
        };
        assert_eq!(
            vtec.to_string(),
            "/O.NEW.KDDC.TO.W.0045.150605T0056Z-000000T0000Z/"
        );
        assert_eq!(vtec.event_key(), "TO.W");
    }

    #[test]
    fn test_action_codes() {
        assert_eq!("EXP".parse::<VtecAction>(), Ok(VtecAction::Exp));
        assert!("XXX".parse::<VtecAction>().is_err());
        assert_eq!(VtecAction::Upg.to_string(), "UPG");
        assert_eq!("T".parse::<ProductClass>(), Ok(ProductClass::Test));
    }

    #[test]
    fn test_polygon_closed() {
        let a = GeoPoint {
            latitude: 38.7,
            longitude: -100.17,
        };
        let b = GeoPoint {
            latitude: 38.48,
            longitude: -100.17,
        };
        assert!(
            Polygon {
                vertices: vec![a, b, a]
            }
            .is_closed()
        );
        assert!(!Polygon { vertices: vec![a, b] }.is_closed());
        assert!(!Polygon { vertices: vec![a] }.is_closed());
    }

    #[test]
    fn test_ugc_type_codes() {
        assert_eq!(UgcType::from_code('Z'), Some(UgcType::Zone));
        assert_eq!(UgcType::from_code('C'), Some(UgcType::County));
        assert_eq!(UgcType::from_code('X'), None);
        assert_eq!(UgcType::County.code(), 'C');
    }
}
