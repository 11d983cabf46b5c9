use crate::cookies::canonicalcookie::CanonicalCookie;
use dashmap::DashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use url::Url;

/// Maximum cookies per domain (Chromium default).
const MAX_COOKIES_PER_DOMAIN: usize = 50;

/// Maximum total cookies. Chromium uses 3300.
const MAX_COOKIES_TOTAL: usize = 3000;

/// In-memory RFC 6265 cookie jar.
/// Modeled after Chromium's `net::CookieMonster`.
#[derive(Clone)]
pub struct CookieMonster {
    // Domain -> cookies set for it.
    store: Arc<DashMap<String, Vec<CanonicalCookie>>>,
}

impl std::fmt::Debug for CookieMonster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieMonster")
            .field("cookies", &self.total_cookie_count())
            .finish()
    }
}

impl Default for CookieMonster {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieMonster {
    pub fn new() -> Self {
        Self {
            store: Arc::new(DashMap::new()),
        }
    }

    /// Insert or replace a cookie. An already expired cookie deletes any
    /// stored cookie with the same name, domain and path.
    pub fn set_canonical_cookie(&self, cookie: CanonicalCookie) {
        let now = OffsetDateTime::now_utc();
        let mut entry = self.store.entry(cookie.domain.clone()).or_default();

        entry.retain(|c| c.name != cookie.name || c.path != cookie.path);
        if cookie.is_expired(now) {
            return;
        }

        // Per-domain limit: evict the oldest.
        while entry.len() >= MAX_COOKIES_PER_DOMAIN {
            match entry
                .iter()
                .enumerate()
                .min_by_key(|(_, c)| c.creation_time)
                .map(|(i, _)| i)
            {
                Some(oldest_idx) => {
                    entry.remove(oldest_idx);
                }
                None => break,
            }
        }

        entry.push(cookie);
        drop(entry); // Release lock before checking global count

        self.enforce_global_limit();
    }

    /// Enforce the global cookie limit by evicting oldest cookies.
    fn enforce_global_limit(&self) {
        while self.total_cookie_count() > MAX_COOKIES_TOTAL {
            let mut oldest: Option<(String, usize, OffsetDateTime)> = None;

            for entry in self.store.iter() {
                for (idx, cookie) in entry.value().iter().enumerate() {
                    let older = oldest
                        .as_ref()
                        .map_or(true, |(_, _, t)| cookie.creation_time < *t);
                    if older {
                        oldest = Some((entry.key().clone(), idx, cookie.creation_time));
                    }
                }
            }

            let Some((domain, idx, _)) = oldest else {
                break;
            };
            if let Some(mut entry) = self.store.get_mut(&domain) {
                if idx < entry.len() {
                    entry.remove(idx);
                }
            }
        }
    }

    /// Parse a `Set-Cookie` line from `url` and store it. Returns false if
    /// the line was rejected.
    pub fn parse_and_save_cookie(&self, url: &Url, cookie_line: &str) -> bool {
        match CanonicalCookie::from_set_cookie(url, cookie_line, OffsetDateTime::now_utc()) {
            Some(cookie) => {
                self.set_canonical_cookie(cookie);
                true
            }
            None => {
                tracing::debug!(url = %url, "ignoring unparseable Set-Cookie");
                false
            }
        }
    }

    /// Get cookies matching the URL with proper domain suffix matching.
    pub fn get_cookies_for_url(&self, url: &Url) -> Vec<CanonicalCookie> {
        let mut result = Vec::new();
        let host = url.host_str().unwrap_or("").to_ascii_lowercase();
        let now = OffsetDateTime::now_utc();

        for domain in Self::get_matching_domains(&host) {
            if let Some(entry) = self.store.get(&domain) {
                for cookie in entry.iter() {
                    if !Self::domain_matches(&cookie.domain, &host, cookie.host_only) {
                        continue;
                    }
                    if !Self::path_matches(&cookie.path, url.path()) {
                        continue;
                    }
                    if cookie.secure && url.scheme() != "https" {
                        continue;
                    }
                    if cookie.is_expired(now) {
                        continue;
                    }
                    result.push(cookie.clone());
                }
            }
        }

        // Longest path first, then oldest first (RFC 6265 5.4).
        result.sort_by(|a, b| {
            b.path
                .len()
                .cmp(&a.path.len())
                .then_with(|| a.creation_time.cmp(&b.creation_time))
        });

        result
    }

    /// `Cookie` header value for `url`, or `None` when nothing matches.
    pub fn cookie_header_for_url(&self, url: &Url) -> Option<String> {
        let cookies = self.get_cookies_for_url(url);
        if cookies.is_empty() {
            return None;
        }
        Some(
            cookies
                .iter()
                .map(CanonicalCookie::pair)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Check if cookie domain matches request host.
    /// Implements RFC 6265 domain matching.
    fn domain_matches(cookie_domain: &str, request_host: &str, host_only: bool) -> bool {
        if host_only {
            return cookie_domain.eq_ignore_ascii_case(request_host);
        }

        let cookie_domain = cookie_domain.trim_start_matches('.');
        if request_host.eq_ignore_ascii_case(cookie_domain) {
            return true;
        }

        if request_host.len() > cookie_domain.len() {
            let split = request_host.len() - cookie_domain.len();
            return request_host[split..].eq_ignore_ascii_case(cookie_domain)
                && request_host.as_bytes()[split - 1] == b'.';
        }

        false
    }

    /// Check if request path matches cookie path.
    /// Implements RFC 6265 path matching.
    fn path_matches(cookie_path: &str, request_path: &str) -> bool {
        if request_path == cookie_path {
            return true;
        }

        if request_path.starts_with(cookie_path) {
            if cookie_path.ends_with('/') {
                return true;
            }
            return request_path.as_bytes().get(cookie_path.len()) == Some(&b'/');
        }

        false
    }

    /// The host itself and all parent domains.
    fn get_matching_domains(host: &str) -> Vec<String> {
        let mut domains = vec![host.to_string()];

        // "foo.bar.example.com" also checks "bar.example.com", "example.com"
        let parts: Vec<&str> = host.split('.').collect();
        for i in 1..parts.len().saturating_sub(1) {
            domains.push(parts[i..].join("."));
        }

        domains
    }

    /// Get total cookie count.
    pub fn total_cookie_count(&self) -> usize {
        self.store.iter().map(|e| e.value().len()).sum()
    }

    /// Clear all cookies.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Snapshot of every stored cookie (for persistence).
    pub fn iter_all_cookies(&self) -> impl Iterator<Item = CanonicalCookie> + '_ {
        self.store.iter().flat_map(|entry| entry.value().clone())
    }
}
