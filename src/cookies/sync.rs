//! Session cookie synchronization.
//!
//! The session cookie normally lives in the shared [`CookieStore`]. While that
//! store is inaccessible, a single fallback `Cookie` string kept in
//! preferences stands in for it. Exactly one of the two is used per request.

use crate::base::neterror::NetError;
use crate::cookies::store::CookieStore;
use crate::prefs::{PreferenceStore, KEY_COOKIE};
use crate::transport::Connection;
use std::future::Future;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use url::Url;

/// Where a request's cookies come from and where harvested ones go.
pub trait CookieSource: Send + Sync {
    /// `Cookie` header value to attach for `url`.
    fn load(&self, url: &Url) -> Option<String>;

    /// Record `Set-Cookie` lines received from `url`.
    fn capture(&self, url: &Url, set_cookies: &[&str]);
}

/// Reads and writes the shared cookie store.
pub struct SharedCookieSource {
    store: Arc<dyn CookieStore>,
}

impl SharedCookieSource {
    pub fn new(store: Arc<dyn CookieStore>) -> Self {
        Self { store }
    }
}

impl CookieSource for SharedCookieSource {
    fn load(&self, url: &Url) -> Option<String> {
        self.store.get_cookie(url)
    }

    fn capture(&self, url: &Url, set_cookies: &[&str]) {
        for line in set_cookies {
            self.store.set_cookie(url, line);
        }
    }
}

/// Reads and writes the single fallback string in preferences.
pub struct FallbackCookieSource {
    prefs: Arc<dyn PreferenceStore>,
}

impl FallbackCookieSource {
    pub fn new(prefs: Arc<dyn PreferenceStore>) -> Self {
        Self { prefs }
    }
}

impl CookieSource for FallbackCookieSource {
    fn load(&self, _url: &Url) -> Option<String> {
        self.prefs.get_string(KEY_COOKIE).filter(|c| !c.is_empty())
    }

    fn capture(&self, _url: &Url, set_cookies: &[&str]) {
        let current = self.prefs.get_string(KEY_COOKIE);
        let merged = merge_cookie_header(current.as_deref(), set_cookies);
        if merged == current {
            return;
        }
        if let Err(e) = self.prefs.set_string(KEY_COOKIE, merged.as_deref()) {
            tracing::warn!(error = %e, "failed to store fallback cookie");
        }
    }
}

/// Apply `Set-Cookie` lines to a `Cookie` header value.
///
/// Cookies are replaced by name; an expired cookie (`Max-Age<=0` or an
/// `Expires` in the past) is removed. Returns `None` when nothing is left.
pub fn merge_cookie_header(current: Option<&str>, set_cookies: &[&str]) -> Option<String> {
    let mut pairs: Vec<(String, String)> = current
        .unwrap_or("")
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect();

    let now = OffsetDateTime::now_utc();
    for line in set_cookies {
        let Ok(parsed) = cookie::Cookie::parse(*line) else {
            continue;
        };
        if parsed.name().is_empty() {
            continue;
        }
        let expired = match parsed.max_age() {
            Some(age) => age <= Duration::ZERO,
            None => parsed
                .expires()
                .and_then(|e| e.datetime())
                .is_some_and(|t| t <= now),
        };

        pairs.retain(|(name, _)| name != parsed.name());
        if !expired {
            pairs.push((parsed.name().to_string(), parsed.value().to_string()));
        }
    }

    if pairs.is_empty() {
        return None;
    }
    Some(
        pairs
            .iter()
            .map(|(n, v)| format!("{}={}", n, v))
            .collect::<Vec<_>>()
            .join("; "),
    )
}

/// Keeps session cookies flowing between requests and the two stores.
#[derive(Clone)]
pub struct CookieSynchronizer {
    store: Arc<dyn CookieStore>,
    prefs: Arc<dyn PreferenceStore>,
}

impl CookieSynchronizer {
    pub fn new(store: Arc<dyn CookieStore>, prefs: Arc<dyn PreferenceStore>) -> Self {
        Self { store, prefs }
    }

    pub fn store(&self) -> &Arc<dyn CookieStore> {
        &self.store
    }

    /// The authoritative source right now.
    pub fn source(&self) -> Box<dyn CookieSource> {
        if self.store.is_accessible() {
            Box::new(SharedCookieSource::new(Arc::clone(&self.store)))
        } else {
            Box::new(FallbackCookieSource::new(Arc::clone(&self.prefs)))
        }
    }

    /// Attach cookies to `connection`, run `setup`, then harvest every
    /// `Set-Cookie` from the response into the same source.
    ///
    /// The source is chosen once, before anything is sent.
    pub async fn attach_and_capture<T, F, Fut>(
        &self,
        connection: &Connection,
        setup: F,
    ) -> Result<T, NetError>
    where
        F: FnOnce(Connection) -> Fut,
        Fut: Future<Output = Result<T, NetError>>,
    {
        let source = self.source();
        if let Some(cookie) = source.load(connection.url()) {
            connection.set_header("Cookie", &cookie)?;
        }

        let result = setup(connection.clone()).await;

        if let Some(response) = connection.completed_response() {
            let lines = response.header_all("set-cookie");
            if !lines.is_empty() {
                tracing::trace!(url = %response.url(), count = lines.len(), "harvesting cookies");
                source.capture(response.url(), &lines);
            }
        }

        result
    }

    /// Copy the shared store's cookie for `api_url` into the fallback slot
    /// and flush the shared store. Does nothing while the store is locked.
    pub fn persist_current_session_cookie(&self, api_url: &Url) -> Result<(), NetError> {
        if !self.store.is_accessible() {
            tracing::debug!("cookie store locked, keeping fallback cookie");
            return Ok(());
        }
        let cookie = self.store.get_cookie(api_url);
        self.prefs.set_string(KEY_COOKIE, cookie.as_deref())?;
        self.store.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::store::SharedCookieStore;
    use crate::prefs::MemoryPreferences;

    fn sync() -> (CookieSynchronizer, Arc<SharedCookieStore>, Arc<MemoryPreferences>) {
        let store = Arc::new(SharedCookieStore::in_memory());
        let prefs = Arc::new(MemoryPreferences::new());
        (
            CookieSynchronizer::new(store.clone(), prefs.clone()),
            store,
            prefs,
        )
    }

    #[test]
    fn test_merge_replaces_by_name() {
        let merged = merge_cookie_header(Some("a=1; b=2"), &["b=3; Path=/", "c=4"]);
        assert_eq!(merged.as_deref(), Some("a=1; b=3; c=4"));
    }

    #[test]
    fn test_merge_drops_expired() {
        let merged = merge_cookie_header(Some("a=1; b=2"), &["a=; Max-Age=0"]);
        assert_eq!(merged.as_deref(), Some("b=2"));

        let gone = merge_cookie_header(
            Some("a=1"),
            &["a=x; Expires=Thu, 01 Jan 1970 00:00:00 GMT"],
        );
        assert!(gone.is_none());
    }

    #[test]
    fn test_merge_from_nothing() {
        assert_eq!(
            merge_cookie_header(None, &["sid=abc; HttpOnly"]).as_deref(),
            Some("sid=abc")
        );
        assert!(merge_cookie_header(None, &[]).is_none());
    }

    #[test]
    fn test_source_follows_accessibility() {
        let (sync, store, prefs) = sync();
        let url = Url::parse("https://api.example.com/graphql").unwrap();
        prefs.set_string(KEY_COOKIE, Some("sid=fallback")).unwrap();
        store.set_cookie(&url, "sid=shared");

        assert_eq!(sync.source().load(&url).as_deref(), Some("sid=shared"));
        store.lock();
        assert_eq!(sync.source().load(&url).as_deref(), Some("sid=fallback"));
    }

    #[test]
    fn test_fallback_capture_leaves_shared_store_alone() {
        let (sync, store, prefs) = sync();
        let url = Url::parse("https://api.example.com/graphql").unwrap();
        store.lock();

        sync.source().capture(&url, &["sid=new"]);
        assert_eq!(prefs.get_string(KEY_COOKIE).as_deref(), Some("sid=new"));

        store.unlock();
        assert!(store.get_cookie(&url).is_none());
    }

    #[test]
    fn test_persist_copies_shared_cookie() {
        let (sync, store, prefs) = sync();
        let url = Url::parse("https://api.example.com/graphql").unwrap();
        store.set_cookie(&url, "sid=current");

        sync.persist_current_session_cookie(&url).unwrap();
        assert_eq!(prefs.get_string(KEY_COOKIE).as_deref(), Some("sid=current"));
    }

    #[test]
    fn test_persist_skipped_while_locked() {
        let (sync, store, prefs) = sync();
        let url = Url::parse("https://api.example.com/graphql").unwrap();
        prefs.set_string(KEY_COOKIE, Some("sid=old")).unwrap();
        store.lock();

        sync.persist_current_session_cookie(&url).unwrap();
        assert_eq!(prefs.get_string(KEY_COOKIE).as_deref(), Some("sid=old"));
    }
}
