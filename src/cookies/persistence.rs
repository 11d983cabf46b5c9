//! Cookie persistence - save and load cookies to/from disk.
//!
//! Provides JSON-based persistence for CookieMonster.

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::cookies::canonicalcookie::{CanonicalCookie, SameSite};
use crate::cookies::monster::CookieMonster;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use time::OffsetDateTime;

/// Serializable representation of a cookie for persistence.
#[derive(Serialize, Deserialize, Debug, Clone)]
struct PersistentCookie {
    name: String,
    value: String,
    domain: String,
    path: String,
    secure: bool,
    http_only: bool,
    host_only: bool,
    expires_unix_secs: Option<i64>,
    #[serde(default)]
    created_unix_secs: Option<i64>,
}

/// Save every cookie (session cookies included) to `path`, replacing it.
pub fn save_cookies(monster: &CookieMonster, path: &Path) -> Result<(), NetError> {
    let all_cookies: Vec<PersistentCookie> = monster
        .iter_all_cookies()
        .map(|cookie| PersistentCookie {
            expires_unix_secs: cookie.expiration_time.map(|t| t.unix_timestamp()),
            created_unix_secs: Some(cookie.creation_time.unix_timestamp()),
            name: cookie.name,
            value: cookie.value,
            domain: cookie.domain,
            path: cookie.path,
            secure: cookie.secure,
            http_only: cookie.http_only,
            host_only: cookie.host_only,
        })
        .collect();

    let json = serde_json::to_string_pretty(&all_cookies)
        .map_err(|e| NetError::io("serialize cookies", e))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).file_context("create cookie directory")?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json).file_context("write cookies")?;
    fs::rename(&tmp, path).file_context("replace cookie file")
}

/// Load cookies from `path` into `monster`, skipping expired ones.
/// Returns how many were loaded.
pub fn load_cookies_into(monster: &CookieMonster, path: &Path) -> Result<usize, NetError> {
    let json = fs::read_to_string(path).file_context("read cookies")?;
    let persistent_cookies: Vec<PersistentCookie> =
        serde_json::from_str(&json).map_err(|e| NetError::io("parse cookies", e))?;

    let now = OffsetDateTime::now_utc();
    let mut loaded = 0;

    for pc in persistent_cookies {
        let expiration_time = pc
            .expires_unix_secs
            .and_then(|s| OffsetDateTime::from_unix_timestamp(s).ok());
        if expiration_time.is_some_and(|t| t <= now) {
            continue;
        }
        let creation_time = pc
            .created_unix_secs
            .and_then(|s| OffsetDateTime::from_unix_timestamp(s).ok())
            .unwrap_or(now);

        monster.set_canonical_cookie(CanonicalCookie {
            name: pc.name,
            value: pc.value,
            domain: pc.domain,
            path: pc.path,
            creation_time,
            expiration_time,
            last_access_time: now,
            secure: pc.secure,
            http_only: pc.http_only,
            host_only: pc.host_only,
            same_site: SameSite::Lax,
        });
        loaded += 1;
    }

    Ok(loaded)
}

/// Load cookies from a file into a new CookieMonster.
pub fn load_cookies(path: &Path) -> Result<CookieMonster, NetError> {
    let monster = CookieMonster::new();
    load_cookies_into(&monster, path)?;
    Ok(monster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use url::Url;

    #[test]
    fn test_save_load_roundtrip() {
        let monster = CookieMonster::new();
        let url = Url::parse("https://example.com/").unwrap();
        monster.parse_and_save_cookie(&url, "session=abc123; Secure; HttpOnly");
        monster.parse_and_save_cookie(&url, "pref=dark; Max-Age=3600");

        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("cookies.json");
        save_cookies(&monster, &path).unwrap();

        let loaded = load_cookies(&path).unwrap();
        assert_eq!(loaded.total_cookie_count(), 2);
        assert_eq!(
            loaded.cookie_header_for_url(&url).as_deref(),
            Some("session=abc123; pref=dark")
        );
    }

    #[test]
    fn test_expired_cookies_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        fs::write(
            &path,
            r#"[{"name":"old","value":"1","domain":"a.test","path":"/","secure":false,
                "http_only":false,"host_only":true,"expires_unix_secs":1}]"#,
        )
        .unwrap();

        assert_eq!(load_cookies(&path).unwrap().total_cookie_count(), 0);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = load_cookies(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, NetError::Io { .. }));
    }
}
