//! EMWIN Parser - A Rust library and tool for decoding NWS text products
//! received over EMWIN.
//!
//! This crate provides:
//! - nom-based parsers for the WMO heading, UGC lines, VTEC strings,
//!   polygons and storm tracking lines
//! - A decoder that splits transmissions into bulletins and segments
//! - Statistics tracking with HDR histograms
//! - A polling directory inbox for live feeds
//!
//! # Example
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use emwin_parser::{Decoder, RawProduct, stats::DecodeStats};
//!
//! let text = "WFUS53 KDDC 050056\nTORDDC\n\nKSC101-135-050130-\n\
//!             /O.NEW.KDDC.TO.W.0045.150605T0056Z-150605T0130Z/\n\n$$\n";
//! let product = RawProduct::new("TORDDCKS.TXT", Utc::now(), text, Utc::now(), "emwin");
//!
//! let stats = DecodeStats::new();
//! for result in Decoder::default().decode(&product) {
//!     let segment = result.expect("Failed to decode segment");
//!     stats.record_segment(&segment);
//!     println!("{}", segment);
//! }
//!
//! println!("{}", stats.summary());
//! ```

pub mod bullets;
pub mod config;
pub mod decoder;
pub mod filter;
pub mod geometry;
pub mod header;
pub mod inbox;
pub mod metrics;
pub mod parser;
pub mod product;
pub mod segment;
pub mod stats;
pub mod time;
pub mod ugc;
pub mod vtec;

#[cfg(test)]
mod samples;

pub use config::{Config, OutputFormat};
pub use decoder::{DecodeError, Decoder, DecoderOptions};
pub use filter::{ProductFilter, any_filter_matches};
pub use inbox::{Inbox, InboxConfig, InboxEvent, read_product};
pub use parser::{ParseError, ParseResult};
pub use product::{
    Bulletin, GeoPoint, HydrologicVtec, Polygon, PrimaryVtec, ProductClass, ProductSegment,
    RawProduct, Segment, TrackingLine, UgcType, UniversalGeoCode, VtecAction, WmoHeader,
};
pub use stats::{DecodeStats, StatsSummary};
