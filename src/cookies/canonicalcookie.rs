use time::{Duration, OffsetDateTime};
use url::Url;

/// Represents a cookie.
/// Modeled after Chromium's `net::CanonicalCookie`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub creation_time: OffsetDateTime,
    pub expiration_time: Option<OffsetDateTime>,
    pub last_access_time: OffsetDateTime,
    pub secure: bool,
    pub http_only: bool,
    pub host_only: bool,
    pub same_site: SameSite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Unspecified,
    NoRestriction,
    Lax,
    Strict,
}

impl CanonicalCookie {
    /// Host-only session cookie on `/`.
    pub fn new(name: String, value: String, domain: String, creation_time: OffsetDateTime) -> Self {
        Self {
            name,
            value,
            domain,
            path: "/".to_string(),
            creation_time,
            expiration_time: None,
            last_access_time: creation_time,
            secure: false,
            http_only: false,
            host_only: true,
            same_site: SameSite::Unspecified,
        }
    }

    /// Parse a `Set-Cookie` line received from `url`.
    ///
    /// Returns `None` for unparseable lines and for a `Domain` attribute the
    /// responding host may not set. `Max-Age` wins over `Expires`; a
    /// non-positive `Max-Age` yields an already expired cookie, which the jar
    /// treats as a deletion.
    pub fn from_set_cookie(url: &Url, line: &str, now: OffsetDateTime) -> Option<Self> {
        let parsed = cookie::Cookie::parse(line).ok()?;
        if parsed.name().is_empty() {
            return None;
        }
        let host = url.host_str()?.to_ascii_lowercase();

        let (domain, host_only) = match parsed.domain() {
            Some(d) => {
                let d = d.trim_start_matches('.').to_ascii_lowercase();
                if !domain_is_settable(&d, &host) {
                    tracing::debug!(domain = %d, host = %host, "rejecting cookie domain");
                    return None;
                }
                (d, false)
            }
            None => (host, true),
        };

        let path = match parsed.path() {
            Some(p) if p.starts_with('/') => p.to_string(),
            _ => default_path(url),
        };

        let expiration_time = match parsed.max_age() {
            Some(age) if age <= Duration::ZERO => Some(now - Duration::seconds(1)),
            Some(age) => Some(now + age),
            None => parsed.expires().and_then(|e| e.datetime()),
        };

        let same_site = match parsed.same_site() {
            Some(cookie::SameSite::Lax) => SameSite::Lax,
            Some(cookie::SameSite::Strict) => SameSite::Strict,
            Some(cookie::SameSite::None) => SameSite::NoRestriction,
            None => SameSite::Unspecified,
        };

        let cookie = CanonicalCookie {
            name: parsed.name().to_string(),
            value: parsed.value().to_string(),
            domain,
            path,
            creation_time: now,
            expiration_time,
            last_access_time: now,
            secure: parsed.secure().unwrap_or(false),
            http_only: parsed.http_only().unwrap_or(false),
            host_only,
            same_site,
        };

        cookie
            .has_valid_prefix(url.scheme() == "https")
            .then_some(cookie)
    }

    pub fn is_expired(&self, current_time: OffsetDateTime) -> bool {
        self.expiration_time
            .is_some_and(|expiry| expiry <= current_time)
    }

    pub fn is_session(&self) -> bool {
        self.expiration_time.is_none()
    }

    /// `__Secure-` and `__Host-` prefix rules (RFC 6265bis).
    pub fn has_valid_prefix(&self, secure_origin: bool) -> bool {
        if self.name.starts_with("__Secure-") && (!self.secure || !secure_origin) {
            return false;
        }
        if self.name.starts_with("__Host-")
            && (!self.secure || self.path != "/" || !self.host_only || !secure_origin)
        {
            return false;
        }
        true
    }

    /// `name=value` as sent in a `Cookie` header.
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// A host may set cookies for itself or a parent domain, never for a bare
/// top-level label.
fn domain_is_settable(domain: &str, host: &str) -> bool {
    if domain.is_empty() {
        return false;
    }
    if domain == host {
        return true;
    }
    domain.contains('.') && host.ends_with(&format!(".{}", domain))
}

/// RFC 6265 default-path: the request path up to its last '/'.
fn default_path(url: &Url) -> String {
    let path = url.path();
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}
