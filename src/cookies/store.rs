use crate::base::neterror::NetError;
use crate::cookies::monster::CookieMonster;
use crate::cookies::persistence;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use url::Url;

/// The process-wide cookie store shared with the rest of the host.
///
/// Its backing storage may be unavailable for a while (for example before
/// the user unlocks their data); callers check [`is_accessible`] first.
///
/// [`is_accessible`]: CookieStore::is_accessible
pub trait CookieStore: Send + Sync {
    fn is_accessible(&self) -> bool;

    /// `Cookie` header value for `url`.
    fn get_cookie(&self, url: &Url) -> Option<String>;

    /// Store one `Set-Cookie` line received from `url`.
    fn set_cookie(&self, url: &Url, cookie_line: &str);

    /// Persist pending changes.
    fn flush(&self) -> Result<(), NetError>;
}

/// [`CookieMonster`] behind an accessibility switch, optionally persisted
/// to a JSON file.
#[derive(Debug)]
pub struct SharedCookieStore {
    jar: CookieMonster,
    accessible: AtomicBool,
    path: Option<PathBuf>,
}

impl Default for SharedCookieStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl SharedCookieStore {
    /// Accessible, never persisted.
    pub fn in_memory() -> Self {
        Self {
            jar: CookieMonster::new(),
            accessible: AtomicBool::new(true),
            path: None,
        }
    }

    /// Backed by `path`; existing cookies are loaded when the file exists.
    pub fn persistent(path: impl Into<PathBuf>) -> Result<Self, NetError> {
        let path = path.into();
        let jar = CookieMonster::new();
        if path.exists() {
            let loaded = persistence::load_cookies_into(&jar, &path)?;
            tracing::debug!(path = %path.display(), loaded, "cookies loaded");
        }
        Ok(Self {
            jar,
            accessible: AtomicBool::new(true),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn jar(&self) -> &CookieMonster {
        &self.jar
    }

    /// Make the backing storage unavailable.
    pub fn lock(&self) {
        self.accessible.store(false, Ordering::Release);
    }

    pub fn unlock(&self) {
        self.accessible.store(true, Ordering::Release);
    }
}

impl CookieStore for SharedCookieStore {
    fn is_accessible(&self) -> bool {
        self.accessible.load(Ordering::Acquire)
    }

    fn get_cookie(&self, url: &Url) -> Option<String> {
        if !self.is_accessible() {
            return None;
        }
        self.jar.cookie_header_for_url(url)
    }

    fn set_cookie(&self, url: &Url, cookie_line: &str) {
        if !self.is_accessible() {
            tracing::debug!(url = %url, "cookie store locked, dropping Set-Cookie");
            return;
        }
        self.jar.parse_and_save_cookie(url, cookie_line);
    }

    fn flush(&self) -> Result<(), NetError> {
        match &self.path {
            Some(path) if self.is_accessible() => persistence::save_cookies(&self.jar, path),
            _ => Ok(()),
        }
    }
}
