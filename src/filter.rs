//! Product filtering for selective output.
//!
//! Allows configuring which decoded segments to print based on criteria
//! like issuing office, event type, VTEC action and affected states.

use serde::Deserialize;
use serde::de::{self, Deserializer, Visitor};
use std::fmt;

use crate::product::{ProductSegment, VtecAction};

/// A list of patterns that deserializes from either a string or array.
///
/// Used for the office and AFOS fields to allow both:
/// - `office = "KDDC"` (single pattern)
/// - `afos = ["TOR*", "SVR*"]` (multiple patterns with OR logic)
#[derive(Debug, Clone, Default)]
pub struct PatternList(Vec<String>);

impl PatternList {
    /// Get the patterns as a slice.
    pub fn patterns(&self) -> &[String] {
        &self.0
    }

    /// Check if any pattern matches the value.
    pub fn matches_any(&self, value: &str) -> bool {
        self.0.iter().any(|p| matches_wildcard(p, value))
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for PatternList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PatternListVisitor;

        impl<'de> Visitor<'de> for PatternListVisitor {
            type Value = PatternList;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a string or array of strings")
            }

            fn visit_str<E>(self, value: &str) -> Result<PatternList, E>
            where
                E: de::Error,
            {
                Ok(PatternList(vec![value.to_string()]))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<PatternList, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut patterns = Vec::new();
                while let Some(value) = seq.next_element::<String>()? {
                    patterns.push(value);
                }
                Ok(PatternList(patterns))
            }
        }

        deserializer.deserialize_any(PatternListVisitor)
    }
}

/// A filter for matching decoded segments.
///
/// All specified fields must match (AND logic).
/// Use multiple filters for OR logic.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductFilter {
    /// Optional name for this filter (used in metrics labels).
    pub name: Option<String>,

    /// Issuing office patterns (supports `*` wildcard for prefix/suffix).
    /// Accepts a single string or array of strings (OR logic within array).
    pub office: Option<PatternList>,

    /// AFOS product identifier patterns, e.g. `"TOR*"`.
    pub afos: Option<PatternList>,

    /// VTEC phenomenon codes to match (e.g., "TO", "SV", "FF").
    pub phenomena: Option<Vec<String>>,

    /// VTEC significance codes to match (e.g., "W", "A").
    pub significance: Option<Vec<String>>,

    /// VTEC actions to match.
    pub actions: Option<Vec<VtecAction>>,

    /// Two-letter state codes; at least one must be affected.
    pub states: Option<Vec<String>>,

    /// Only match segments that carry a warning polygon.
    pub require_polygon: bool,
}

impl ProductFilter {
    /// Check if a segment matches this filter.
    ///
    /// All specified fields must match (AND logic). Criteria on VTEC fields
    /// never match a segment without a primary VTEC string.
    pub fn matches(&self, segment: &ProductSegment) -> bool {
        // Check office patterns (OR logic within array)
        if let Some(ref patterns) = self.office
            && !patterns.is_empty()
            && !patterns.matches_any(segment.office_id())
        {
            return false;
        }

        // Check AFOS patterns
        if let Some(ref patterns) = self.afos
            && !patterns.is_empty()
            && !patterns.matches_any(&segment.wmo_header.afos_pil())
        {
            return false;
        }

        let vtec = segment.primary_vtec.as_ref();

        // Check phenomena
        if let Some(ref phenomena) = self.phenomena {
            match vtec {
                Some(v) if phenomena.iter().any(|p| p.eq_ignore_ascii_case(&v.phenomenon)) => {}
                _ => return false,
            }
        }

        // Check significance
        if let Some(ref significance) = self.significance {
            match vtec {
                Some(v)
                    if significance
                        .iter()
                        .any(|s| s.eq_ignore_ascii_case(&v.significance.to_string())) => {}
                _ => return false,
            }
        }

        // Check actions
        if let Some(ref actions) = self.actions {
            match vtec {
                Some(v) if actions.contains(&v.action) => {}
                _ => return false,
            }
        }

        // Check states
        if let Some(ref states) = self.states
            && !segment
                .geo_codes
                .keys()
                .any(|state| states.iter().any(|s| s.eq_ignore_ascii_case(state)))
        {
            return false;
        }

        if self.require_polygon && segment.polygon.is_none() {
            return false;
        }

        true
    }

    /// Validate the filter configuration.
    ///
    /// Returns an error if any patterns are invalid.
    pub fn validate(&self) -> Result<(), String> {
        for list in [&self.office, &self.afos].into_iter().flatten() {
            for pattern in list.patterns() {
                validate_wildcard_pattern(pattern)?;
            }
        }
        Ok(())
    }

    /// Label used for this filter in logs and metrics.
    pub fn label(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("filter_{}", index))
    }
}

/// Check if any filter in the list matches the segment.
///
/// Returns `true` if at least one filter matches (OR logic).
/// Returns `false` if the list is empty.
pub fn any_filter_matches(filters: &[ProductFilter], segment: &ProductSegment) -> bool {
    filters.iter().any(|f| f.matches(segment))
}

/// Match a string against a wildcard pattern.
///
/// Supports `*` as prefix or suffix wildcard (not both).
/// Matching is case-insensitive.
fn matches_wildcard(pattern: &str, value: &str) -> bool {
    let pattern_upper = pattern.to_ascii_uppercase();
    let value_upper = value.to_ascii_uppercase();

    if let Some(suffix) = pattern_upper.strip_prefix('*') {
        // "*DDC" matches "TORDDC"
        value_upper.ends_with(suffix)
    } else if let Some(prefix) = pattern_upper.strip_suffix('*') {
        // "TOR*" matches "TORDDC"
        value_upper.starts_with(prefix)
    } else {
        pattern_upper == value_upper
    }
}

/// Validate a wildcard pattern.
///
/// Returns an error if the pattern has wildcards in invalid positions.
fn validate_wildcard_pattern(pattern: &str) -> Result<(), String> {
    let wildcard_count = pattern.chars().filter(|&c| c == '*').count();

    if wildcard_count > 1 {
        return Err(format!(
            "Pattern '{}' has multiple wildcards; only one is allowed",
            pattern
        ));
    }

    if wildcard_count == 1 && !pattern.starts_with('*') && !pattern.ends_with('*') {
        return Err(format!(
            "Pattern '{}' has wildcard in middle; only prefix (*DDC) or suffix (TOR*) allowed",
            pattern
        ));
    }

    Ok(())
}
