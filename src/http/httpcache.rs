//! On-disk HTTP cache used by the modern engine.
//!
//! Chromium mapping: net/http/http_cache.h with a simple disk backend.
//!
//! - Cache-Control parsing (max-age, no-store, no-cache)
//! - ETag / Last-Modified revalidation
//! - Size-bounded, oldest entries evicted first
//! - Entries survive process restarts
//! - Cookies are never persisted; credentialed requests bypass the cache

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::http::HttpResponse;
use base64::{engine::general_purpose, Engine as _};
use bytes::Bytes;
use dashmap::DashMap;
use http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use time::OffsetDateTime;
use url::Url;

const ENTRY_EXTENSION: &str = "entry";

/// Caches open in this process, one per canonical directory.
static OPEN_CACHES: Lazy<DashMap<PathBuf, Weak<DiskCache>>> = Lazy::new(DashMap::new);

/// Cache key components. Only the URL (minus fragment) and method matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    url: String,
    method: String,
}

impl CacheKey {
    pub fn new(url: &Url, method: &str) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            url: url.to_string(),
            method: method.to_uppercase(),
        }
    }

    /// Entry file name. Stable across builds so entries outlive upgrades.
    fn file_stem(&self) -> String {
        let key = format!("{} {}", self.method, self.url);
        format!("{:x}", Sha256::digest(key.as_bytes()))
    }
}

/// Requests carrying credentials are neither served from nor stored in the
/// cache; the entry is keyed by URL alone and would leak across sessions.
pub fn is_credentialed(headers: &HeaderMap) -> bool {
    headers.contains_key(COOKIE) || headers.contains_key(AUTHORIZATION)
}

fn persisted_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(name, _)| !is_cookie_header(name))
        .filter_map(|(k, v)| Some((k.to_string(), v.to_str().ok()?.to_string())))
        .collect()
}

fn is_cookie_header(name: &HeaderName) -> bool {
    name == SET_COOKIE || name.as_str() == "set-cookie2"
}

/// On-disk record. The body is base64 so the file stays plain JSON.
#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord {
    url: String,
    method: String,
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
    stored_at: i64,
    max_age: Option<u64>,
    etag: Option<String>,
    last_modified: Option<String>,
}

/// Cached response entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Unix seconds when the entry was stored or last revalidated
    pub stored_at: i64,
    /// Freshness lifetime from max-age
    pub max_age: Option<u64>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl CacheEntry {
    /// Check if the entry is still fresh.
    pub fn is_fresh(&self) -> bool {
        match self.max_age {
            Some(age) => {
                let now = OffsetDateTime::now_utc().unix_timestamp();
                now.saturating_sub(self.stored_at) < age as i64
            }
            None => false,
        }
    }

    /// Stale but carrying a validator.
    pub fn needs_revalidation(&self) -> bool {
        !self.is_fresh() && (self.etag.is_some() || self.last_modified.is_some())
    }

    pub fn into_response(self, url: Url) -> HttpResponse {
        HttpResponse::new(self.status, self.headers, self.body, url).mark_from_cache()
    }

    fn from_record(record: CacheRecord) -> Option<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in record.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
            if is_cookie_header(&name) {
                continue;
            }
            let value = HeaderValue::from_str(&value).ok()?;
            headers.append(name, value);
        }
        let body = general_purpose::STANDARD.decode(record.body).ok()?;
        Some(Self {
            status: StatusCode::from_u16(record.status).ok()?,
            headers,
            body: Bytes::from(body),
            stored_at: record.stored_at,
            max_age: record.max_age,
            etag: record.etag,
            last_modified: record.last_modified,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    size: u64,
    stored_at: i64,
}

/// Disk-backed HTTP cache.
///
/// One JSON file per entry inside the cache directory. The in-memory index
/// tracks sizes so the byte budget can be enforced without touching disk.
pub struct DiskCache {
    dir: PathBuf,
    max_size_bytes: u64,
    current_size: AtomicU64,
    index: DashMap<String, IndexEntry>,
}

impl DiskCache {
    /// Open a cache rooted at an existing directory, indexing what is there.
    pub fn open(dir: impl AsRef<Path>, max_size_bytes: u64) -> Result<Self, NetError> {
        let dir = dir.as_ref().to_path_buf();
        let index = DashMap::new();
        let mut total = 0u64;

        for entry in fs::read_dir(&dir).file_context("read cache directory")? {
            let entry = entry.file_context("read cache directory")?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            let stored_at = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);
            total += meta.len();
            index.insert(
                stem.to_string(),
                IndexEntry {
                    size: meta.len(),
                    stored_at,
                },
            );
        }

        tracing::debug!(dir = %dir.display(), entries = index.len(), bytes = total, "disk cache opened");

        Ok(Self {
            dir,
            max_size_bytes,
            current_size: AtomicU64::new(total),
            index,
        })
    }

    /// Open the cache for `dir`, sharing one instance (one index, one byte
    /// budget) with every other caller in the process using that directory.
    pub fn open_shared(dir: impl AsRef<Path>, max_size_bytes: u64) -> Result<Arc<Self>, NetError> {
        let dir = dir.as_ref();
        let key = fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        let mut slot = OPEN_CACHES.entry(key).or_insert_with(Weak::new);
        if let Some(cache) = slot.upgrade() {
            if cache.max_size_bytes != max_size_bytes {
                tracing::debug!(
                    dir = %dir.display(),
                    budget = cache.max_size_bytes,
                    requested = max_size_bytes,
                    "cache already open, keeping its budget"
                );
            }
            return Ok(cache);
        }
        let cache = Arc::new(Self::open(dir, max_size_bytes)?);
        *slot = Arc::downgrade(&cache);
        Ok(cache)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    fn entry_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", stem, ENTRY_EXTENSION))
    }

    fn read_entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        let stem = key.file_stem();
        if !self.index.contains_key(&stem) {
            return None;
        }
        let json = fs::read_to_string(self.entry_path(&stem)).ok()?;
        let record: CacheRecord = serde_json::from_str(&json).ok()?;
        // Hash collisions are possible; the record carries the full key.
        if record.url != key.url || record.method != key.method {
            return None;
        }
        CacheEntry::from_record(record)
    }

    /// Look up a fresh cached response.
    pub fn get(&self, url: &Url, method: &str) -> Option<CacheEntry> {
        if !is_cacheable_method(method) {
            return None;
        }
        self.read_entry(&CacheKey::new(url, method))
            .filter(CacheEntry::is_fresh)
    }

    /// Get entry for a conditional request (may be stale).
    pub fn get_for_revalidation(&self, url: &Url, method: &str) -> Option<CacheEntry> {
        if !is_cacheable_method(method) {
            return None;
        }
        self.read_entry(&CacheKey::new(url, method))
    }

    /// Store a response if its headers allow it.
    pub fn store(&self, method: &str, response: &HttpResponse) {
        if !is_cacheable_method(method) || !response.status().is_success() {
            return;
        }

        let cache_control = parse_cache_control(response.headers());
        if cache_control.no_store {
            return;
        }
        if cache_control.max_age.is_none() && cache_control.no_cache {
            return;
        }

        let etag = header_string(response.headers(), http::header::ETAG);
        let last_modified = header_string(response.headers(), http::header::LAST_MODIFIED);
        if cache_control.max_age.is_none() && etag.is_none() && last_modified.is_none() {
            return;
        }

        let key = CacheKey::new(response.url(), method);
        let record = CacheRecord {
            url: key.url.clone(),
            method: key.method.clone(),
            status: response.status().as_u16(),
            headers: persisted_headers(response.headers()),
            body: general_purpose::STANDARD.encode(response.bytes()),
            stored_at: OffsetDateTime::now_utc().unix_timestamp(),
            max_age: cache_control.max_age,
            etag,
            last_modified,
        };

        if let Err(e) = self.write_record(&key, &record) {
            tracing::debug!(url = %key.url, error = %e, "cache store skipped");
        }
    }

    fn write_record(&self, key: &CacheKey, record: &CacheRecord) -> Result<(), NetError> {
        let json =
            serde_json::to_vec(record).map_err(|e| NetError::io("serialize cache entry", e))?;
        let size = json.len() as u64;
        if size > self.max_size_bytes {
            return Ok(());
        }

        let stem = key.file_stem();
        self.remove_by_stem(&stem);
        self.maybe_evict(size);

        fs::write(self.entry_path(&stem), json).file_context("write cache entry")?;
        self.current_size.fetch_add(size, Ordering::Relaxed);
        self.index.insert(
            stem,
            IndexEntry {
                size,
                stored_at: record.stored_at,
            },
        );
        Ok(())
    }

    /// Refresh a stale entry after a 304 Not Modified.
    pub fn update_from_not_modified(
        &self,
        url: &Url,
        method: &str,
        headers: &HeaderMap,
    ) -> Option<CacheEntry> {
        let key = CacheKey::new(url, method);
        let mut entry = self.read_entry(&key)?;

        for (name, value) in headers {
            if name == http::header::CACHE_CONTROL
                || name == http::header::ETAG
                || name == http::header::EXPIRES
                || name == http::header::DATE
            {
                entry.headers.insert(name.clone(), value.clone());
            }
        }
        let cache_control = parse_cache_control(headers);
        if cache_control.max_age.is_some() {
            entry.max_age = cache_control.max_age;
        }
        if let Some(etag) = header_string(headers, http::header::ETAG) {
            entry.etag = Some(etag);
        }
        entry.stored_at = OffsetDateTime::now_utc().unix_timestamp();

        let record = CacheRecord {
            url: key.url.clone(),
            method: key.method.clone(),
            status: entry.status.as_u16(),
            headers: persisted_headers(&entry.headers),
            body: general_purpose::STANDARD.encode(&entry.body),
            stored_at: entry.stored_at,
            max_age: entry.max_age,
            etag: entry.etag.clone(),
            last_modified: entry.last_modified.clone(),
        };
        if let Err(e) = self.write_record(&key, &record) {
            tracing::debug!(url = %key.url, error = %e, "cache refresh skipped");
        }
        Some(entry)
    }

    /// Conditional request headers for a stale entry with validators.
    pub fn conditional_headers(&self, url: &Url, method: &str) -> Option<HeaderMap> {
        let entry = self.get_for_revalidation(url, method)?;
        if !entry.needs_revalidation() {
            return None;
        }

        let mut headers = HeaderMap::new();
        if let Some(value) = entry.etag.as_deref().and_then(|e| HeaderValue::from_str(e).ok()) {
            headers.insert(http::header::IF_NONE_MATCH, value);
        }
        if let Some(value) = entry
            .last_modified
            .as_deref()
            .and_then(|l| HeaderValue::from_str(l).ok())
        {
            headers.insert(http::header::IF_MODIFIED_SINCE, value);
        }

        if headers.is_empty() {
            None
        } else {
            Some(headers)
        }
    }

    /// Remove an entry from the cache.
    pub fn remove(&self, url: &Url, method: &str) {
        self.remove_by_stem(&CacheKey::new(url, method).file_stem());
    }

    /// Clear all cached entries.
    pub fn clear(&self) {
        let stems: Vec<String> = self.index.iter().map(|e| e.key().clone()).collect();
        for stem in stems {
            self.remove_by_stem(&stem);
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Bytes currently used on disk.
    pub fn size_bytes(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed)
    }

    fn maybe_evict(&self, new_entry_size: u64) {
        while self.size_bytes() + new_entry_size > self.max_size_bytes && !self.index.is_empty() {
            let oldest = self
                .index
                .iter()
                .min_by_key(|e| e.value().stored_at)
                .map(|e| e.key().clone());
            match oldest {
                Some(stem) => self.remove_by_stem(&stem),
                None => break,
            }
        }
    }

    fn remove_by_stem(&self, stem: &str) {
        if let Some((_, entry)) = self.index.remove(stem) {
            let _ = fs::remove_file(self.entry_path(stem));
            self.current_size.fetch_sub(entry.size, Ordering::Relaxed);
        }
    }
}

fn is_cacheable_method(method: &str) -> bool {
    method.eq_ignore_ascii_case("GET") || method.eq_ignore_ascii_case("HEAD")
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Parsed Cache-Control directive.
#[derive(Debug, Default)]
struct CacheControl {
    no_store: bool,
    no_cache: bool,
    max_age: Option<u64>,
}

/// Parse Cache-Control header.
fn parse_cache_control(headers: &HeaderMap) -> CacheControl {
    let mut cc = CacheControl::default();

    let Some(value) = headers
        .get(http::header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
    else {
        return cc;
    };

    for directive in value.split(',') {
        let directive = directive.trim().to_lowercase();

        if directive == "no-store" {
            cc.no_store = true;
        } else if directive == "no-cache" {
            cc.no_cache = true;
        } else if let Some(age) = directive.strip_prefix("max-age=") {
            cc.max_age = age.parse::<u64>().ok();
        }
    }

    cc
}
