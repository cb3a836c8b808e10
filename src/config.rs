//! Configuration file support for the EMWIN decoder.
//!
//! Loads settings from `~/.config/emwin-parser/config.toml` on Linux
//! (or platform-appropriate location on other OSes).

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::filter::ProductFilter;

/// How decoded segments are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON object per line
    Json,
    /// One human-readable line per segment
    Text,
}

/// Deserialize a human-readable size string like "10MB" into bytes.
fn deserialize_size<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_size(&s).map_err(serde::de::Error::custom)
}

/// Parse a human-readable size string into bytes.
///
/// Supports: B, KB, MB, GB (case-insensitive).
/// Examples: "100", "500KB", "10MB", "1GB"
pub fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".to_string());
    }

    let s_upper = s.to_ascii_uppercase();

    // Find where the numeric part ends
    let num_end = s_upper
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s_upper.len());

    let (num_str, unit) = s_upper.split_at(num_end);
    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("invalid number in size: {}", s))?;

    let multiplier: usize = match unit.trim() {
        "" | "B" => 1,
        "KB" | "K" => 1024,
        "MB" | "M" => 1024 * 1024,
        "GB" | "G" => 1024 * 1024 * 1024,
        _ => return Err(format!("unknown size unit: {}", unit)),
    };

    Ok((num * multiplier as f64) as usize)
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identifier recorded as the source of every decoded product.
    pub source: String,

    /// Fail a whole segment on a malformed field instead of dropping the field.
    pub strict: bool,

    /// Output format for decoded segments.
    pub format: OutputFormat,

    /// Directory to watch for incoming product files.
    pub watch_dir: Option<PathBuf>,

    /// Seconds between directory scans in watch mode.
    pub poll_interval: u64,

    /// File extensions to pick up (case-insensitive, without the dot).
    /// Empty accepts every file.
    pub extensions: Vec<String>,

    /// Largest file accepted as a product (human-readable, e.g., "1MB").
    #[serde(deserialize_with = "deserialize_size")]
    pub max_product_size: usize,

    /// Print statistics every N seconds in watch mode.
    pub stats_interval: u64,

    /// Enable Prometheus metrics HTTP endpoint.
    pub metrics_enabled: bool,

    /// Port for Prometheus metrics HTTP endpoint.
    pub metrics_port: u16,

    /// Product filters for selective output.
    pub filters: Vec<ProductFilter>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: "emwin".to_string(),
            strict: true,
            format: OutputFormat::Json,
            watch_dir: None,
            poll_interval: 2,
            extensions: vec!["TXT".to_string()],
            max_product_size: 1024 * 1024, // 1MB
            stats_interval: 30,
            metrics_enabled: false,
            metrics_port: 9090,
            filters: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from the default config file location.
    ///
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but is malformed.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Config::default()),
        }
    }

    /// Load configuration from an explicit path, which must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in config file: {}", path.display()))
    }

    /// Returns the path to the config file.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("emwin-parser/config.toml"))
    }

    /// Validate all configuration settings.
    ///
    /// Returns an error if any filters have invalid patterns.
    pub fn validate(&self) -> Result<()> {
        for (i, filter) in self.filters.iter().enumerate() {
            filter
                .validate()
                .map_err(|e| anyhow::anyhow!("Invalid filter [{}]: {}", i, e))?;
        }
        if self.poll_interval == 0 {
            anyhow::bail!("poll_interval must be at least 1 second");
        }
        Ok(())
    }
}
