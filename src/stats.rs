//! Statistics tracking for decoded products.
//!
//! This module provides structures for tracking various metrics about
//! decoded transmissions, including counts, size distributions, and
//! breakdowns by event type, issuing office, and VTEC action.

use hdrhistogram::Histogram;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::product::ProductSegment;

/// Thread-safe statistics collector for the decoder.
#[derive(Debug)]
pub struct DecodeStats {
    /// Total number of transmissions decoded
    pub transmissions: AtomicU64,

    /// Total number of bulletins found
    pub bulletins: AtomicU64,

    /// Total number of segments decoded successfully
    pub segments: AtomicU64,

    /// Total number of segments that failed to decode
    pub decode_failures: AtomicU64,

    /// Transmissions without any bulletin structure
    pub empty_transmissions: AtomicU64,

    /// Total bytes of raw input processed
    pub bytes_processed: AtomicU64,

    /// Histogram of segments per transmission
    segments_histogram: RwLock<Histogram<u64>>,

    /// Histogram of polygon vertex counts
    vertices_histogram: RwLock<Histogram<u64>>,

    /// Histogram of zones and counties per segment
    areas_histogram: RwLock<Histogram<u64>>,

    /// Segments per event (`TO.W`, `SV.A`, ...)
    segments_by_event: RwLock<HashMap<String, u64>>,

    /// Segments per VTEC action
    segments_by_action: RwLock<HashMap<String, u64>>,

    /// Segments per issuing office
    top_offices: RwLock<HashMap<String, u64>>,

    /// Segments printed per output filter
    matches_by_filter: RwLock<HashMap<String, u64>>,

    /// When stats collection started
    start_time: Instant,
}

impl DecodeStats {
    /// Create a new statistics collector.
    pub fn new() -> Self {
        Self {
            transmissions: AtomicU64::new(0),
            bulletins: AtomicU64::new(0),
            segments: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            empty_transmissions: AtomicU64::new(0),
            bytes_processed: AtomicU64::new(0),
            // Segments per transmission: 1 to 1000, 2 significant figures
            segments_histogram: RwLock::new(
                Histogram::new_with_bounds(1, 1_000, 2)
                    .expect("Failed to create segments histogram"),
            ),
            // Polygon vertices: warnings are limited to a few dozen points
            vertices_histogram: RwLock::new(
                Histogram::new_with_bounds(1, 1_000, 2)
                    .expect("Failed to create vertices histogram"),
            ),
            // Areas per segment: 1 to 10000
            areas_histogram: RwLock::new(
                Histogram::new_with_bounds(1, 10_000, 2)
                    .expect("Failed to create areas histogram"),
            ),
            segments_by_event: RwLock::new(HashMap::new()),
            segments_by_action: RwLock::new(HashMap::new()),
            top_offices: RwLock::new(HashMap::new()),
            matches_by_filter: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record a decoded transmission.
    ///
    /// `segments` counts every segment found, whether or not it decoded.
    pub fn record_transmission(&self, bytes: u64, bulletins: usize, segments: usize) {
        self.transmissions.fetch_add(1, Ordering::Relaxed);
        self.bytes_processed.fetch_add(bytes, Ordering::Relaxed);
        self.bulletins.fetch_add(bulletins as u64, Ordering::Relaxed);

        if segments == 0 {
            self.empty_transmissions.fetch_add(1, Ordering::Relaxed);
            return;
        }

        if let Ok(mut hist) = self.segments_histogram.write() {
            let _ = hist.record((segments as u64).clamp(1, 1_000));
        }
    }

    /// Record a successfully decoded segment.
    pub fn record_segment(&self, segment: &ProductSegment) {
        self.segments.fetch_add(1, Ordering::Relaxed);

        let areas = segment.area_count() as u64;
        if areas > 0
            && let Ok(mut hist) = self.areas_histogram.write()
        {
            let _ = hist.record(areas.min(10_000));
        }

        if let Some(ref polygon) = segment.polygon
            && !polygon.is_empty()
            && let Ok(mut hist) = self.vertices_histogram.write()
        {
            let _ = hist.record((polygon.len() as u64).min(1_000));
        }

        if let Some(ref vtec) = segment.primary_vtec {
            if let Ok(mut map) = self.segments_by_event.write() {
                *map.entry(vtec.event_key()).or_insert(0) += 1;
            }
            if let Ok(mut map) = self.segments_by_action.write() {
                *map.entry(vtec.action.to_string()).or_insert(0) += 1;
            }
        }

        let office = segment.office_id();
        if !office.is_empty()
            && let Ok(mut map) = self.top_offices.write()
        {
            *map.entry(office.to_string()).or_insert(0) += 1;
        }
    }

    /// Record a segment that failed to decode.
    pub fn record_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a segment selected by the named output filter.
    pub fn record_filter_match(&self, filter: &str) {
        if let Ok(mut map) = self.matches_by_filter.write() {
            *map.entry(filter.to_string()).or_insert(0) += 1;
        }
    }

    /// Get the elapsed time since stats collection started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get the current segments per second rate.
    pub fn segments_per_second(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.segments.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Generate a summary report.
    pub fn summary(&self) -> StatsSummary {
        let elapsed = self.elapsed();

        let percentiles = |histogram: &RwLock<Histogram<u64>>| {
            histogram
                .read()
                .ok()
                .filter(|h| !h.is_empty())
                .map(|h| HistogramPercentiles {
                    p50: h.value_at_quantile(0.50),
                    p90: h.value_at_quantile(0.90),
                    p99: h.value_at_quantile(0.99),
                    min: h.min(),
                    max: h.max(),
                    mean: h.mean(),
                    count: h.len(),
                })
        };

        let counts = |map: &RwLock<HashMap<String, u64>>| {
            map.read().map(|m| m.clone()).unwrap_or_default()
        };

        // Get top 10 offices
        let top_offices = self
            .top_offices
            .read()
            .map(|m| {
                let mut vec: Vec<_> = m.iter().map(|(k, v)| (k.clone(), *v)).collect();
                vec.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                vec.truncate(10);
                vec
            })
            .unwrap_or_default();

        StatsSummary {
            elapsed_secs: elapsed.as_secs_f64(),
            transmissions: self.transmissions.load(Ordering::Relaxed),
            bulletins: self.bulletins.load(Ordering::Relaxed),
            segments: self.segments.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            empty_transmissions: self.empty_transmissions.load(Ordering::Relaxed),
            bytes_processed: self.bytes_processed.load(Ordering::Relaxed),
            segments_per_second: self.segments_per_second(),
            segments_per_transmission: percentiles(&self.segments_histogram),
            polygon_vertices: percentiles(&self.vertices_histogram),
            areas_per_segment: percentiles(&self.areas_histogram),
            segments_by_event: counts(&self.segments_by_event),
            segments_by_action: counts(&self.segments_by_action),
            matches_by_filter: counts(&self.matches_by_filter),
            top_offices,
        }
    }
}

impl Default for DecodeStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Percentile values from a histogram.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramPercentiles {
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub count: u64,
}

/// Summary of collected statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    pub elapsed_secs: f64,
    pub transmissions: u64,
    pub bulletins: u64,
    pub segments: u64,
    pub decode_failures: u64,
    pub empty_transmissions: u64,
    pub bytes_processed: u64,
    pub segments_per_second: f64,
    pub segments_per_transmission: Option<HistogramPercentiles>,
    pub polygon_vertices: Option<HistogramPercentiles>,
    pub areas_per_segment: Option<HistogramPercentiles>,
    pub segments_by_event: HashMap<String, u64>,
    pub segments_by_action: HashMap<String, u64>,
    pub matches_by_filter: HashMap<String, u64>,
    pub top_offices: Vec<(String, u64)>,
}

fn write_distribution(
    f: &mut std::fmt::Formatter<'_>,
    title: &str,
    p: &HistogramPercentiles,
) -> std::fmt::Result {
    writeln!(f, "{}:", title)?;
    writeln!(f, "  Min: {}, Max: {}, Mean: {:.1}", p.min, p.max, p.mean)?;
    writeln!(f, "  P50: {}, P90: {}, P99: {}", p.p50, p.p90, p.p99)?;
    writeln!(f)
}

fn write_counts(
    f: &mut std::fmt::Formatter<'_>,
    title: &str,
    counts: &HashMap<String, u64>,
) -> std::fmt::Result {
    if counts.is_empty() {
        return Ok(());
    }
    writeln!(f, "{}:", title)?;
    let mut sorted: Vec<_> = counts.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (key, count) in sorted {
        writeln!(f, "  {}: {}", key, count)?;
    }
    writeln!(f)
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "═══════════════════════════════════════════════════════")?;
        writeln!(f, "               EMWIN DECODER STATISTICS")?;
        writeln!(f, "═══════════════════════════════════════════════════════")?;
        writeln!(f)?;
        writeln!(f, "Runtime: {:.1}s", self.elapsed_secs)?;
        writeln!(f, "Transmissions: {}", self.transmissions)?;
        writeln!(f, "  without bulletins: {}", self.empty_transmissions)?;
        writeln!(f, "Bulletins: {}", self.bulletins)?;
        writeln!(f, "Segments: {}", self.segments)?;
        writeln!(
            f,
            "Decode failures: {} ({:.1}%)",
            self.decode_failures,
            if self.segments + self.decode_failures > 0 {
                self.decode_failures as f64 / (self.segments + self.decode_failures) as f64
                    * 100.0
            } else {
                0.0
            }
        )?;
        writeln!(f, "Bytes processed: {} KB", self.bytes_processed / 1024)?;
        writeln!(f, "Rate: {:.1} segments/sec", self.segments_per_second)?;
        writeln!(f)?;

        if let Some(ref p) = self.segments_per_transmission {
            write_distribution(f, "Segments per Transmission", p)?;
        }
        if let Some(ref p) = self.areas_per_segment {
            write_distribution(f, "Areas per Segment", p)?;
        }
        if let Some(ref p) = self.polygon_vertices {
            write_distribution(f, "Polygon Vertices", p)?;
        }

        write_counts(f, "Segments by Event", &self.segments_by_event)?;
        write_counts(f, "Segments by Action", &self.segments_by_action)?;
        write_counts(f, "Filter Matches", &self.matches_by_filter)?;

        if !self.top_offices.is_empty() {
            writeln!(f, "Top 10 Offices:")?;
            for (i, (office, count)) in self.top_offices.iter().enumerate() {
                writeln!(f, "  {}. {}: {}", i + 1, office, count)?;
            }
        }

        Ok(())
    }
}
