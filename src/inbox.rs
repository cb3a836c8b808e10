//! Directory inbox for incoming EMWIN product files.
//!
//! Feed receivers drop each transmission into a directory as one file. The
//! inbox polls that directory, waits for every new file to settle, and hands
//! the contents over as [`RawProduct`]s.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::product::RawProduct;

/// Configuration for the inbox poller.
#[derive(Debug, Clone)]
pub struct InboxConfig {
    /// Directory to watch.
    pub dir: PathBuf,

    /// Time between directory scans.
    pub poll_interval: Duration,

    /// Accepted file extensions, case-insensitive. Empty accepts everything.
    pub extensions: Vec<String>,

    /// Largest file accepted as a product, in bytes.
    pub max_product_size: usize,

    /// Source identifier recorded on every product.
    pub source: String,
}

impl InboxConfig {
    /// Create a configuration for `dir` with default settings.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            poll_interval: Duration::from_secs(2),
            extensions: vec!["TXT".to_string()],
            max_product_size: 1024 * 1024,
            source: "emwin".to_string(),
        }
    }

    /// Whether `path` has one of the accepted extensions.
    pub fn accepts(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

/// Events from the inbox.
#[derive(Debug)]
pub enum InboxEvent {
    /// A new product file was read.
    Product(RawProduct),

    /// A file could not be read or the directory could not be scanned.
    Error(String),
}

/// Read a product file into a [`RawProduct`].
///
/// The transmission timestamp is `timestamp` when given, otherwise the
/// file's modification time. Files larger than `max_size` are rejected.
pub fn read_product(
    path: &Path,
    source: &str,
    max_size: usize,
    timestamp: Option<DateTime<Utc>>,
) -> Result<RawProduct> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to stat product file: {}", path.display()))?;

    if metadata.len() > max_size as u64 {
        anyhow::bail!(
            "Product file {} is {} bytes, larger than the {} byte limit",
            path.display(),
            metadata.len(),
            max_size
        );
    }

    let content = fs::read(path)
        .with_context(|| format!("Failed to read product file: {}", path.display()))?;

    let timestamp = match timestamp {
        Some(timestamp) => timestamp,
        None => metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .with_context(|| format!("No modification time for {}", path.display()))?,
    };

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(RawProduct::new(filename, timestamp, content, Utc::now(), source))
}

/// Size and modification time of a file as seen by one scan.
type FileState = (u64, SystemTime);

/// Polling directory watcher.
pub struct Inbox {
    config: InboxConfig,
    pending: HashMap<PathBuf, FileState>,
    delivered: HashSet<PathBuf>,
}

impl Inbox {
    /// Create a new inbox with the given configuration.
    pub fn new(config: InboxConfig) -> Self {
        Self {
            config,
            pending: HashMap::new(),
            delivered: HashSet::new(),
        }
    }

    /// Start polling in a background task.
    ///
    /// Returns a receiver channel that will receive `InboxEvent`s. Polling
    /// stops when the receiver is dropped.
    pub fn start(self) -> mpsc::Receiver<InboxEvent> {
        let (tx, rx) = mpsc::channel(1000);

        tokio::spawn(async move {
            self.run_poll_loop(tx).await;
        });

        rx
    }

    async fn run_poll_loop(mut self, tx: mpsc::Sender<InboxEvent>) {
        info!(
            "Watching {} every {}s",
            self.config.dir.display(),
            self.config.poll_interval.as_secs()
        );
        let mut interval = tokio::time::interval(self.config.poll_interval);

        loop {
            interval.tick().await;

            let ready = match self.scan() {
                Ok(ready) => ready,
                Err(e) => {
                    error!("Inbox scan failed: {:#}", e);
                    if tx.send(InboxEvent::Error(format!("{:#}", e))).await.is_err() {
                        return;
                    }
                    continue;
                }
            };

            for path in ready {
                let event = match read_product(
                    &path,
                    &self.config.source,
                    self.config.max_product_size,
                    None,
                ) {
                    Ok(product) => InboxEvent::Product(product),
                    Err(e) => InboxEvent::Error(format!("{:#}", e)),
                };
                if tx.send(event).await.is_err() {
                    // Receiver dropped
                    return;
                }
            }
        }
    }

    /// Scan the directory once and return the files ready for reading.
    ///
    /// A file is ready once two consecutive scans see the same size and
    /// modification time, so files still being written are left alone.
    /// Each path is returned at most once; a file that disappears is
    /// forgotten.
    pub fn scan(&mut self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.config.dir)
            .with_context(|| format!("Failed to read inbox: {}", self.config.dir.display()))?;

        let mut current = HashMap::new();
        for entry in entries {
            let entry = entry.context("Failed to read inbox entry")?;
            let path = entry.path();
            if !self.config.accepts(&path) {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            current.insert(path, (metadata.len(), modified));
        }

        let mut ready: Vec<PathBuf> = current
            .iter()
            .filter(|(path, state)| {
                !self.delivered.contains(*path) && self.pending.get(*path) == Some(state)
            })
            .map(|(path, _)| path.clone())
            .collect();
        ready.sort();

        self.delivered.retain(|path| current.contains_key(path));
        self.delivered.extend(ready.iter().cloned());
        self.pending = current;

        if !ready.is_empty() {
            debug!("{} new product file(s)", ready.len());
        }
        Ok(ready)
    }
}
