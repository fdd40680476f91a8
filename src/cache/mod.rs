use std::collections::HashMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::config::Config;
use crate::contents::FileContents;
use crate::macros::trace;
use crate::path::RequestPath;
use crate::response::Response;
use crate::Error;

mod fixed_map;
/// Background freshness checks.
pub mod monitor;

pub use fixed_map::FixedMap;


/// A cached file.
#[derive(Debug)]
pub struct CacheEntry {
    state: RwLock<EntryState>,
}

#[derive(Debug)]
struct EntryState {
    contents: FileContents,
    /// Cleared by the monitor once the file changed on disk.
    fresh: bool,
    /// Wall-clock time of the last successful load, in nanoseconds since
    /// the Unix epoch.
    last_refresh_ns: u128,
}

impl CacheEntry {
    fn loaded(contents: FileContents) -> Self {
        let state = EntryState { contents, fresh: true, last_refresh_ns: now_ns() };
        Self { state: RwLock::new(state) }
    }

    /// Renders the entry, reloading it first if it went stale.
    fn render(&self, path: &RequestPath, config: &Config, dir: bool) -> Result<Response, Error> {
        {
            let state = self.state.read();
            if state.fresh {
                trace!(%path, "cache hit");
                return render_contents(&state.contents, config, dir);
            }
        }

        let mut state = self.state.write();
        // Another reader may have reloaded while we waited
        if !state.fresh {
            trace!(%path, "reloading stale cache entry");
            state.contents.clear();
            state.contents.load(path, config)?;
            state.fresh = true;
            state.last_refresh_ns = now_ns();
        }
        let state = RwLockWriteGuard::downgrade(state);
        render_contents(&state.contents, config, dir)
    }

    /// Tests whether the entry is up to date.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.state.read().fresh
    }

    /// Returns the time of the last successful load, in nanoseconds since
    /// the Unix epoch.
    #[must_use]
    pub fn last_refresh_ns(&self) -> u128 {
        self.state.read().last_refresh_ns
    }
}


#[derive(Debug)]
struct Entries {
    files: FixedMap<PathBuf, CacheEntry>,
    /// Pinned entries with no file on disk; never evicted or revalidated.
    generated: HashMap<PathBuf, CacheEntry>,
}


/// A bounded cache of file contents keyed by absolute path.
///
/// Files larger than the per-entry ceiling are read and rendered on every
/// request instead. All rendering happens into an owned [`Response`], so no
/// lock is held once a fetch returns.
#[derive(Debug)]
pub struct FileCache {
    entries: RwLock<Entries>,
    file_max: u64,
}

impl FileCache {
    /// Creates an empty cache holding up to `capacity` files of at most
    /// `file_max` bytes each.
    #[must_use]
    pub fn new(capacity: usize, file_max: u64) -> Self {
        let entries = Entries { files: FixedMap::new(capacity), generated: HashMap::new() };
        Self { entries: RwLock::new(entries), file_max }
    }

    /// Creates a cache sized according to `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.cache_size, config.cache_file_max)
    }

    /// Returns the rendered contents of the file at `path`, whose metadata
    /// the caller already obtained.
    ///
    /// # Errors
    /// Returns an error if the file cannot be loaded or rendered. Files that
    /// fail to load are not cached.
    pub fn fetch(&self, path: &RequestPath, meta: &Metadata, config: &Config, dir: bool) -> Result<Response, Error> {
        let key = path.abs();
        {
            let entries = self.entries.read();
            if let Some(entry) = entries.files.get(key) {
                return entry.render(path, config, dir);
            }
        }

        if meta.len() > self.file_max {
            trace!(%path, size = meta.len(), "file too large to cache");
            let mut contents = FileContents::for_path(path);
            contents.load(path, config)?;
            return render_contents(&contents, config, dir);
        }

        let mut entries = self.entries.write();
        if !entries.files.contains_key(key) {
            trace!(%path, "cache miss");
            let mut contents = FileContents::for_path(path);
            contents.load(path, config)?;
            if let Some((_evicted, _)) = entries.files.insert(key.to_path_buf(), CacheEntry::loaded(contents)) {
                trace!(path = ?_evicted, "evicted oldest cache entry");
            }
        }

        let entries = RwLockWriteGuard::downgrade(entries);
        match entries.files.get(key) {
            Some(entry) => entry.render(path, config, dir),
            None => Err(Error::PathEnumeration),
        }
    }

    /// Renders the generated file registered under `path`, if there is one.
    ///
    /// # Errors
    /// Returns an error if rendering fails.
    pub fn lookup(&self, path: &RequestPath, config: &Config) -> Option<Result<Response, Error>> {
        let entries = self.entries.read();
        let entry = entries.generated.get(path.abs())?;
        let state = entry.state.read();
        Some(render_contents(&state.contents, config, false))
    }

    /// Registers server-generated bytes under `path`. Generated entries do
    /// not count against the capacity.
    pub fn insert_generated(&self, path: impl Into<PathBuf>, data: impl Into<std::sync::Arc<[u8]>>) {
        let entry = CacheEntry::loaded(FileContents::generated(data));
        self.entries.write().generated.insert(path.into(), entry);
    }

    /// Checks every cached file against the filesystem. Files that vanished
    /// are dropped, files modified since their last load are marked stale.
    /// Returns the number of dropped entries.
    pub fn revalidate(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.files.len();
        entries.files.retain(|path, entry| {
            let state = entry.state.get_mut();
            match std::fs::metadata(path) {
                Ok(meta) => {
                    if state.fresh && mtime_ns(&meta) > state.last_refresh_ns {
                        trace!(?path, "cache entry went stale");
                        state.fresh = false;
                    }
                    true
                },
                Err(e) => {
                    let error: &dyn std::error::Error = &e;
                    tracing::debug!(error, ?path, "dropping cache entry");
                    false
                },
            }
        });
        before - entries.files.len()
    }

    /// Returns the number of cached files, not counting generated ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().files.is_empty()
    }

    /// Tests whether the file at `path` is cached.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        let entries = self.entries.read();
        entries.files.contains_key(path) || entries.generated.contains_key(path)
    }

    /// Tests whether the cached file at `path` is up to date.
    #[must_use]
    pub fn is_fresh(&self, path: &Path) -> Option<bool> {
        self.entries.read().files.get(path).map(CacheEntry::is_fresh)
    }

    /// Returns when the cached file at `path` was last loaded.
    #[must_use]
    pub fn last_refresh_ns(&self, path: &Path) -> Option<u128> {
        self.entries.read().files.get(path).map(CacheEntry::last_refresh_ns)
    }
}


fn render_contents(contents: &FileContents, config: &Config, dir: bool) -> Result<Response, Error> {
    let mut resp = Response::new();
    contents.render(config, &mut resp, dir)?;
    Ok(resp)
}

fn now_ns() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_nanos())
}

fn mtime_ns(meta: &Metadata) -> u128 {
    meta.modified().ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_nanos())
}
