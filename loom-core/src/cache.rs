//! The two-tier read/transform cache. Capacity-bounded LRUs protected by a
//! single `parking_lot::Mutex` each — critical sections stay short and
//! synchronous so they are never held across an `.await`.

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use dashmap::DashSet;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::trace;

use crate::error::{CoreError, Result};

pub const DEFAULT_FILE_CACHE_CAPACITY: usize = 10_000;
pub const DEFAULT_REWRITE_CACHE_CAPACITY: usize = 1_024;

#[derive(Debug, Clone)]
pub struct FileCacheEntry {
    pub last_modified_millis: i64,
    pub etag: String,
    pub content: Vec<u8>,
}

/// Outcome of a `FileCache::read` call with HTTP semantics applied.
#[derive(Debug)]
pub enum ReadOutcome {
    /// Full body, freshly read or refreshed from an unchanged mtime.
    Fresh(FileCacheEntry),
    /// `If-None-Match` matched and the URL had already been seen this
    /// session — emit an empty-bodied 304.
    NotModified { etag: String },
}

pub struct FileCache {
    entries: Mutex<LruCache<PathBuf, FileCacheEntry>>,
    /// URLs that have been served at least once this process: a 304 may
    /// never be the *first* response for a given URL.
    seen_urls: DashSet<String>,
}

impl FileCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(
                std::num::NonZeroUsize::new(capacity.max(1)).unwrap(),
            )),
            seen_urls: DashSet::new(),
        }
    }

    /// Stat-and-read with mtime memoization. Does not apply any HTTP
    /// semantics; see `read_for_request` for the conditional-request path.
    pub fn read(&self, abs_path: &Path) -> Result<FileCacheEntry> {
        let metadata =
            std::fs::metadata(abs_path).map_err(|e| map_io_error(abs_path, e))?;
        let modified = metadata
            .modified()
            .map_err(|e| CoreError::io(abs_path, e))?;
        let last_modified_millis = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        {
            let mut guard = self.entries.lock();
            if let Some(cached) = guard.get(&abs_path.to_path_buf()) {
                if cached.last_modified_millis == last_modified_millis {
                    trace!(path = %abs_path.display(), "file cache hit");
                    return Ok(cached.clone());
                }
                trace!(path = %abs_path.display(), "file cache stale, mtime changed");
            }
        }

        trace!(path = %abs_path.display(), "file cache miss, reading from disk");
        let content = std::fs::read(abs_path).map_err(|e| map_io_error(abs_path, e))?;
        let etag = compute_etag(&content);
        let entry = FileCacheEntry {
            last_modified_millis,
            etag,
            content,
        };

        self.entries
            .lock()
            .put(abs_path.to_path_buf(), entry.clone());

        Ok(entry)
    }

    /// Read plus the conditional-request decision: a 304 requires both an
    /// ETag match *and* that the URL has been seen before in this process.
    pub fn read_for_request(
        &self,
        abs_path: &Path,
        public_path: &str,
        if_none_match: Option<&str>,
    ) -> Result<ReadOutcome> {
        let entry = self.read(abs_path)?;
        let previously_seen = self.seen_urls.contains(public_path);
        self.seen_urls.insert(public_path.to_string());

        if previously_seen {
            if let Some(inm) = if_none_match {
                if inm.trim_matches('"') == entry.etag {
                    return Ok(ReadOutcome::NotModified { etag: entry.etag });
                }
            }
        }

        Ok(ReadOutcome::Fresh(entry))
    }

    pub fn has_seen(&self, public_path: &str) -> bool {
        self.seen_urls.contains(public_path)
    }

    /// Drops any cached entry for `abs_path` (used by the watcher's `unlink`
    /// handling and, when explicit invalidation is cheaper than relying on
    /// the mtime check, by `change` handling too).
    pub fn evict(&self, abs_path: &Path) {
        self.entries.lock().pop(&abs_path.to_path_buf());
    }
}

fn map_io_error(path: &Path, e: std::io::Error) -> CoreError {
    if e.kind() == std::io::ErrorKind::NotFound {
        CoreError::NotFound(path.display().to_string())
    } else {
        CoreError::io(path, e)
    }
}

/// Strong ETag: a stable content hash (blake3, applied per-file so it stays
/// cheap under rapid successive saves).
pub fn compute_etag(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

/// Rewrite cache: content-addressed by `(cleanId, hash(body))`, so stale
/// entries are naturally unreachable and eviction-by-prefix is a simple
/// key-prefix scan.
pub struct RewriteCache {
    entries: Mutex<LruCache<String, Vec<u8>>>,
}

impl RewriteCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(
                std::num::NonZeroUsize::new(capacity.max(1)).unwrap(),
            )),
        }
    }

    pub fn key(clean_id: &str, body: &[u8]) -> String {
        format!("{clean_id}\u{0}{}", compute_etag(body))
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let hit = self.entries.lock().get(key).cloned();
        trace!(key, hit = hit.is_some(), "rewrite cache lookup");
        hit
    }

    pub fn put(&self, key: String, value: Vec<u8>) {
        trace!(key = %key, "rewrite cache store");
        self.entries.lock().put(key, value);
    }

    /// Evicts every entry whose key was derived from `clean_id`, regardless
    /// of which body hash it was stored under — guards against evicting the
    /// wrong entry if the file was already re-read before the watcher fires.
    pub fn evict_prefix(&self, clean_id: &str) {
        let prefix = format!("{clean_id}\u{0}");
        let mut guard = self.entries.lock();
        let stale: Vec<String> = guard
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            guard.pop(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn etag_stable_across_unchanged_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.js");
        std::fs::write(&path, b"const a = 1;").unwrap();

        let cache = FileCache::new(DEFAULT_FILE_CACHE_CAPACITY);
        let first = cache.read(&path).unwrap();
        let second = cache.read(&path).unwrap();
        assert_eq!(first.etag, second.etag);
    }

    #[test]
    fn etag_changes_with_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.js");
        std::fs::write(&path, b"const a = 1;").unwrap();

        let cache = FileCache::new(DEFAULT_FILE_CACHE_CAPACITY);
        let first = cache.read(&path).unwrap();

        // Force a distinct mtime before rewriting so the cache doesn't serve
        // the stale entry purely because stat() looks unchanged.
        std::thread::sleep(std::time::Duration::from_millis(10));
        let mut f = std::fs::OpenOptions::new().write(true).truncate(true).open(&path).unwrap();
        f.write_all(b"const a = 2;").unwrap();
        drop(f);

        let second = cache.read(&path).unwrap();
        assert_ne!(first.etag, second.etag);
    }

    #[test]
    fn not_modified_requires_seen_url_and_matching_etag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.js");
        std::fs::write(&path, b"export default 1;").unwrap();

        let cache = FileCache::new(DEFAULT_FILE_CACHE_CAPACITY);

        // First request: never a 304, even with a (guessed) matching etag.
        let entry = cache.read(&path).unwrap();
        let first = cache
            .read_for_request(&path, "/x.js", Some(&entry.etag))
            .unwrap();
        assert!(matches!(first, ReadOutcome::Fresh(_)));

        // Second request with the real etag: now eligible for 304.
        let second = cache
            .read_for_request(&path, "/x.js", Some(&entry.etag))
            .unwrap();
        assert!(matches!(second, ReadOutcome::NotModified { .. }));
    }

    #[test]
    fn rewrite_cache_prefix_eviction() {
        let cache = RewriteCache::new(DEFAULT_REWRITE_CACHE_CAPACITY);
        let key1 = RewriteCache::key("/a.js", b"v1");
        let key2 = RewriteCache::key("/a.js", b"v2");
        let key_other = RewriteCache::key("/b.js", b"v1");

        cache.put(key1.clone(), b"out1".to_vec());
        cache.put(key2.clone(), b"out2".to_vec());
        cache.put(key_other.clone(), b"out3".to_vec());

        cache.evict_prefix("/a.js");

        assert!(cache.get(&key1).is_none());
        assert!(cache.get(&key2).is_none());
        assert!(cache.get(&key_other).is_some());
    }
}
