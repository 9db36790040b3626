//! Bounded per-document metadata store with lazy load and debounced flush.
//!
//! The backing file is read on the first `get`/`set` (at most once per
//! store) and written back by the debounce timer: the first mutation arms a
//! one-shot timer, later mutations inside the window ride along. Before each
//! write the least recently accessed documents are evicted down to
//! `max_items`.
//!
//! Nothing here surfaces I/O errors to `get`/`set` callers. A missing or
//! malformed file means an empty store, a failed write is logged and retried
//! on the next armed flush.

use crate::clock::{Clock, SystemClock};
use crate::entry::Entry;
use crate::timer::DebounceTimer;
use crate::xml;
use docmeta_common::{Error, Result, StoreConfig};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Store counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Backing file reads attempted
    pub loads: u64,
    /// Successful writes of the backing file
    pub flushes: u64,
    /// Writes that failed
    pub failed_flushes: u64,
    /// Documents dropped to honour `max_items`
    pub evictions: u64,
}

/// Per-document metadata store
pub struct MetadataStore<C: Clock = SystemClock> {
    /// Backing file; `None` keeps the store in memory only
    path: Option<PathBuf>,
    max_items: usize,
    items: HashMap<String, Entry>,
    loaded: bool,
    timer: DebounceTimer,
    clock: C,
    stats: StoreStats,
}

impl MetadataStore<SystemClock> {
    /// Create a store from configuration, resolving the backing file path
    #[must_use]
    pub fn open(config: &StoreConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> MetadataStore<C> {
    /// Create a store reading time from `clock`
    #[must_use]
    pub fn with_clock(config: &StoreConfig, clock: C) -> Self {
        let path = config.metadata_path();
        match &path {
            Some(path) => debug!("Metadata file: {}", path.display()),
            None => warn!("No user cache directory, metadata will not be persisted"),
        }

        Self {
            path,
            max_items: config.max_items.max(1),
            items: HashMap::new(),
            loaded: false,
            timer: DebounceTimer::new(config.flush_delay()),
            clock,
            stats: StoreStats::default(),
        }
    }

    /// Get the value of `key` for document `uri`
    ///
    /// A hit refreshes the document's access time, so reading metadata keeps
    /// it from being evicted.
    pub fn get(&mut self, uri: impl AsRef<str>, key: impl AsRef<str>) -> Option<String> {
        let (uri, key) = (uri.as_ref(), key.as_ref());
        if uri.is_empty() || key.is_empty() {
            warn!("Ignoring metadata get with empty uri or key");
            return None;
        }

        debug!("URI: {} --- key: {}", uri, key);

        self.ensure_loaded();

        let now = self.clock.now_millis();
        let entry = self.items.get_mut(uri)?;
        entry.touch(now);
        entry.get(key).map(str::to_string)
    }

    /// Set `key` to `value` for document `uri`, or remove it when `value` is `None`
    ///
    /// Creates the document on first use and schedules a flush.
    pub fn set(&mut self, uri: impl AsRef<str>, key: impl AsRef<str>, value: Option<&str>) {
        let (uri, key) = (uri.as_ref(), key.as_ref());
        if uri.is_empty() || key.is_empty() {
            warn!("Ignoring metadata set with empty uri or key");
            return;
        }

        debug!("URI: {} --- key: {} --- value: {:?}", uri, key, value);

        self.ensure_loaded();

        let now = self.clock.now_millis();
        let entry = self
            .items
            .entry(uri.to_string())
            .or_insert_with(|| Entry::new(now));
        entry.set(key, value);
        entry.touch(now);

        self.schedule_flush();
    }

    /// Drop every attribute of document `uri`
    ///
    /// Returns whether the document was known.
    pub fn forget(&mut self, uri: impl AsRef<str>) -> bool {
        let uri = uri.as_ref();
        self.ensure_loaded();

        if self.items.remove(uri).is_none() {
            return false;
        }
        debug!("Forgot metadata for {}", uri);
        self.schedule_flush();
        true
    }

    /// Read the backing file unless that already happened
    pub fn ensure_loaded(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;

        let Some(path) = self.path.clone() else {
            return;
        };

        match self.load_from(&path) {
            Ok(count) => info!("Loaded metadata for {} documents", count),
            Err(e) if e.is_not_found() => debug!("No metadata file at {}", path.display()),
            Err(e) if e.is_malformed_file() => {
                warn!("Ignoring metadata file '{}': {}", file_name(&path), e);
            }
            Err(e) => warn!("Failed to load metadata from {}: {}", path.display(), e),
        }
    }

    fn load_from(&mut self, path: &Path) -> Result<usize> {
        self.stats.loads += 1;

        let text = std::fs::read_to_string(path)?;
        let decoded = xml::decode(&text)?;

        if decoded.skipped_documents > 0 || decoded.skipped_entries > 0 {
            warn!(
                "Skipped {} malformed documents and {} malformed entries in {}",
                decoded.skipped_documents,
                decoded.skipped_entries,
                path.display()
            );
        }

        let count = decoded.documents.len();
        self.items.extend(decoded.documents);
        Ok(count)
    }

    fn schedule_flush(&mut self) {
        if self.timer.arm(Instant::now()) {
            trace!("Metadata flush scheduled in {:?}", self.timer.delay());
        }
    }

    /// Run the flush if the debounce deadline has passed
    ///
    /// Returns whether the timer fired.
    pub fn poll_flush(&mut self) -> bool {
        if !self.timer.fire_if_due(Instant::now()) {
            return false;
        }
        self.flush_logged();
        true
    }

    /// Evict down to `max_items` and write the backing file now
    ///
    /// Cancels a pending debounce timer.
    pub fn flush(&mut self) -> Result<()> {
        self.timer.cancel();
        self.ensure_loaded();
        self.evict();

        let Some(path) = self.path.clone() else {
            return Ok(());
        };

        let contents = xml::encode(self.items.iter().map(|(uri, entry)| (uri.as_str(), entry)))?;
        write_atomic(&path, &contents)?;

        self.stats.flushes += 1;
        debug!(
            "Saved metadata for {} documents to {}",
            self.items.len(),
            path.display()
        );
        Ok(())
    }

    fn flush_logged(&mut self) {
        if let Err(e) = self.flush() {
            self.stats.failed_flushes += 1;
            error!("Failed to save metadata: {}", e);
        }
    }

    /// Remove least recently accessed documents until at most `max_items` remain
    fn evict(&mut self) -> usize {
        let mut evicted = 0;
        while self.items.len() > self.max_items {
            let Some(oldest) = self
                .items
                .iter()
                .min_by_key(|(_, entry)| entry.atime())
                .map(|(uri, _)| uri.clone())
            else {
                break;
            };
            self.items.remove(&oldest);
            debug!("Evicted metadata for {}", oldest);
            evicted += 1;
        }
        self.stats.evictions += evicted as u64;
        evicted
    }

    fn flush_pending(&mut self) {
        if self.timer.cancel() {
            self.flush_logged();
        }
    }

    /// Flush a pending mutation and release the store
    pub fn shutdown(mut self) {
        debug!("Shutting down metadata store");
        self.flush_pending();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn contains(&self, uri: &str) -> bool {
        self.items.contains_key(uri)
    }

    /// Look at a document without refreshing its access time
    #[must_use]
    pub fn entry(&self, uri: &str) -> Option<&Entry> {
        self.items.get(uri)
    }

    /// All documents, in no particular order
    pub fn documents(&self) -> impl Iterator<Item = (&str, &Entry)> {
        self.items.iter().map(|(uri, entry)| (uri.as_str(), entry))
    }

    #[must_use]
    pub const fn stats(&self) -> StoreStats {
        self.stats
    }

    #[must_use]
    pub const fn is_flush_pending(&self) -> bool {
        self.timer.is_armed()
    }

    /// When the pending flush is due, if any
    #[must_use]
    pub const fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub const fn max_items(&self) -> usize {
        self.max_items
    }
}

impl<C: Clock> Drop for MetadataStore<C> {
    fn drop(&mut self) {
        self.flush_pending();
    }
}

/// Write through a temporary sibling and rename over the target
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| Error::CreateDir {
            path: parent.display().to_string(),
            source,
        })?;
    }

    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    let result = write_and_rename(&temp_path, path, contents);
    if result.is_err() {
        // Best effort, the original error is what gets reported
        let _ = std::fs::remove_file(&temp_path);
    }
    result.map_err(Error::from)
}

fn write_and_rename(temp_path: &Path, path: &Path, contents: &str) -> std::io::Result<()> {
    {
        let file = File::create(temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(contents.as_bytes())?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }
    std::fs::rename(temp_path, path)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
