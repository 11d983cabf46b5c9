//! The modern HTTP engine.
//!
//! Keeps HTTP/1.1 connections alive per origin, serves GETs from an on-disk
//! cache, retries once on a fresh connection when a path dies underneath an
//! idempotent request, and decodes Brotli responses.

use crate::base::neterror::NetError;
use crate::http::decode::DecodeSupport;
use crate::http::httpcache::{is_credentialed, DiskCache};
use crate::http::streamfactory::{HttpStream, HttpStreamFactory, SendFailure};
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{Transport, TransportMode};
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt};
use http::header::CONNECTION;
use http::{HeaderMap, Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

/// Which network-path changes the engine survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationOptions {
    /// A pooled connection that died (the default network changed while it
    /// sat idle) is replaced by a fresh one.
    pub default_network: bool,
    /// A fresh connection reset or timed out mid-exchange gets one more try.
    /// Requests with non-idempotent methods are only replayed when the
    /// connection failed before writing them.
    pub path_degradation: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            default_network: true,
            path_degradation: true,
        }
    }
}

impl MigrationOptions {
    pub fn disabled() -> Self {
        Self {
            default_network: false,
            path_degradation: false,
        }
    }
}

/// Engine construction parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory the cache directory is created under. `None` disables the
    /// disk cache. Engines in one process pointing at the same directory
    /// share a single cache and its byte budget.
    pub cache_root: Option<PathBuf>,
    pub cache_dir_name: String,
    pub cache_max_bytes: u64,
    pub migration: MigrationOptions,
    /// Advertise and decode `br` responses.
    pub brotli: bool,
    pub max_idle_per_host: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_root: None,
            cache_dir_name: "httpEngine".to_string(),
            cache_max_bytes: 512 * 1024 * 1024,
            migration: MigrationOptions::default(),
            brotli: true,
            max_idle_per_host: 6,
        }
    }
}

impl EngineConfig {
    pub fn cache_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_root = Some(root.into());
        self
    }

    pub fn cache_max_bytes(mut self, bytes: u64) -> Self {
        self.cache_max_bytes = bytes;
        self
    }

    pub fn migration(mut self, migration: MigrationOptions) -> Self {
        self.migration = migration;
        self
    }

    pub fn brotli(mut self, enabled: bool) -> Self {
        self.brotli = enabled;
        self
    }

    pub fn max_idle_per_host(mut self, max: usize) -> Self {
        self.max_idle_per_host = max;
        self
    }

    /// Where the disk cache lives, if configured.
    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache_root
            .as_ref()
            .map(|root| root.join(&self.cache_dir_name))
    }
}

/// Create the cache directory. Failure only disables caching.
fn open_cache(config: &EngineConfig) -> Option<Arc<DiskCache>> {
    let dir = config.cache_dir()?;
    if let Err(e) = std::fs::create_dir_all(&dir) {
        tracing::warn!(dir = %dir.display(), error = %e, "cache directory unavailable, caching disabled");
        return None;
    }
    if !dir.is_dir() {
        tracing::warn!(dir = %dir.display(), "cache path is not a directory, caching disabled");
        return None;
    }
    DiskCache::open_shared(&dir, config.cache_max_bytes)
        .map_err(|e| tracing::warn!(error = %e, "cache open failed, caching disabled"))
        .ok()
}

struct EngineInner {
    config: EngineConfig,
    factory: HttpStreamFactory,
    idle: DashMap<String, Vec<HttpStream>>,
    cache: Option<Arc<DiskCache>>,
    connections_opened: AtomicUsize,
}

/// Pooled, caching HTTP/1.1 engine. Cheap to clone.
#[derive(Clone)]
pub struct HttpEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for HttpEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEngine")
            .field("cache_enabled", &self.cache_enabled())
            .field("migration", &self.inner.config.migration)
            .field("connections_opened", &self.connections_opened())
            .finish()
    }
}

impl Default for HttpEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl HttpEngine {
    pub fn new(config: EngineConfig) -> Self {
        let cache = open_cache(&config);
        tracing::debug!(
            cache = cache.is_some(),
            brotli = config.brotli,
            "http engine built"
        );
        Self {
            inner: Arc::new(EngineInner {
                config,
                factory: HttpStreamFactory::new(),
                idle: DashMap::new(),
                cache,
                connections_opened: AtomicUsize::new(0),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn cache_enabled(&self) -> bool {
        self.inner.cache.is_some()
    }

    /// Directory backing the disk cache, when enabled.
    pub fn cache_dir(&self) -> Option<&Path> {
        self.inner.cache.as_deref().map(DiskCache::dir)
    }

    pub fn cache(&self) -> Option<&DiskCache> {
        self.inner.cache.as_deref()
    }

    /// Total sockets this engine has opened.
    pub fn connections_opened(&self) -> usize {
        self.inner.connections_opened.load(Ordering::Relaxed)
    }

    /// Idle keep-alive connections parked for `url`'s origin.
    pub fn idle_count(&self, url: &Url) -> usize {
        let origin = url.origin().ascii_serialization();
        self.inner.idle.get(&origin).map(|v| v.len()).unwrap_or(0)
    }

    /// Drop every idle connection.
    pub fn close_idle(&self) {
        self.inner.idle.clear();
    }
}

impl EngineInner {
    fn decode_support(&self) -> DecodeSupport {
        DecodeSupport {
            brotli: self.config.brotli,
            ..DecodeSupport::FULL
        }
    }

    async fn fresh_stream(&self, url: &Url) -> Result<HttpStream, NetError> {
        let stream = self.factory.create_stream(url).await?;
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
        Ok(stream)
    }

    async fn checkout(&self, url: &Url, origin: &str) -> Result<HttpStream, NetError> {
        let pooled = {
            let mut idle = self.idle.entry(origin.to_string()).or_default();
            let mut found = None;
            while let Some(stream) = idle.pop() {
                if stream.is_open() {
                    found = Some(stream);
                    break;
                }
            }
            found
        };
        match pooled {
            Some(stream) => Ok(stream),
            None => self.fresh_stream(url).await,
        }
    }

    fn checkin(&self, origin: &str, mut stream: HttpStream) {
        if !stream.is_open() {
            return;
        }
        stream.mark_reused();
        let mut idle = self.idle.entry(origin.to_string()).or_default();
        if idle.len() < self.config.max_idle_per_host {
            idle.push(stream);
        }
    }

    async fn send_on(
        &self,
        mut stream: HttpStream,
        request: &HttpRequest,
        origin: &str,
    ) -> Result<HttpResponse, SendFailure> {
        let resp = stream.send_request(request.to_hyper()?).await?;
        let keep_alive = !wants_close(resp.headers());
        let decode = request.decode_body.then(|| self.decode_support());
        let response = HttpResponse::collect(resp, request.url.clone(), decode).await?;
        if keep_alive {
            self.checkin(origin, stream);
        }
        Ok(response)
    }

    /// Whether a failed exchange may be replayed on a fresh connection.
    ///
    /// A request that reached the wire is only replayed when its method is
    /// idempotent; a POST the server may already have acted on is surfaced.
    fn should_migrate(&self, request: &HttpRequest, reused: bool, failure: &SendFailure) -> bool {
        if failure.request_sent && !is_idempotent(&request.method) {
            return false;
        }
        let migration = self.config.migration;
        if reused {
            migration.default_network && failure.error.is_connection_error()
        } else {
            migration.path_degradation
                && matches!(
                    failure.error,
                    NetError::ConnectionReset
                        | NetError::ConnectionClosed
                        | NetError::ConnectionTimedOut
                )
        }
    }

    /// One exchange with at most one migration retry.
    async fn send_with_migration(&self, request: &HttpRequest) -> Result<HttpResponse, NetError> {
        let origin = request.origin();
        let stream = self.checkout(&request.url, &origin).await?;
        let reused = stream.is_reused();

        let failure = match self.send_on(stream, request, &origin).await {
            Ok(response) => return Ok(response),
            Err(failure) => failure,
        };
        if !self.should_migrate(request, reused, &failure) {
            return Err(failure.error);
        }

        tracing::debug!(
            url = %request.url,
            error = %failure.error,
            reused,
            request_sent = failure.request_sent,
            "migrating to a fresh connection"
        );
        let stream = self.fresh_stream(&request.url).await?;
        Ok(self.send_on(stream, request, &origin).await?)
    }

    async fn execute(&self, mut request: HttpRequest) -> Result<HttpResponse, NetError> {
        let cacheable = request.method == Method::GET && !is_credentialed(&request.headers);
        let cache = self.cache.as_ref().filter(|_| cacheable);

        if let Some(cache) = cache {
            if let Some(entry) = cache.get(&request.url, "GET") {
                tracing::trace!(url = %request.url, "served from cache");
                return Ok(entry.into_response(request.url.clone()));
            }
            if let Some(conditional) = cache.conditional_headers(&request.url, "GET") {
                for (name, value) in &conditional {
                    if !request.headers.contains_key(name) {
                        request.headers.insert(name.clone(), value.clone());
                    }
                }
            }
        }

        let response = self.send_with_migration(&request).await?;

        if let Some(cache) = cache {
            if response.status() == StatusCode::NOT_MODIFIED {
                if let Some(entry) =
                    cache.update_from_not_modified(&request.url, "GET", response.headers())
                {
                    return Ok(entry.into_response(request.url.clone()));
                }
            } else {
                cache.store("GET", &response);
            }
        }

        Ok(response)
    }
}

fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::PUT | Method::DELETE
    )
}

fn wants_close(headers: &HeaderMap) -> bool {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("close"))
}

impl Transport for HttpEngine {
    fn mode(&self) -> TransportMode {
        TransportMode::Modern
    }

    fn decode_support(&self) -> DecodeSupport {
        self.inner.decode_support()
    }

    fn exchange(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, NetError>> {
        let inner = Arc::clone(&self.inner);
        async move { inner.execute(request).await }.boxed()
    }
}
