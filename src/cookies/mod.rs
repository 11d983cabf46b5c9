//! Cookie storage and session cookie synchronization.
//!
//! | Chromium (C++) | adaptnet (Rust) | Responsibility |
//! |----------------|-----------------|----------------|
//! | `net::CookieMonster` | [`CookieMonster`](monster::CookieMonster) | Cookie jar with eviction |
//! | `net::CanonicalCookie` | [`CanonicalCookie`](canonicalcookie::CanonicalCookie) | Single cookie representation |
//! | `net::CookieStore` | [`CookieStore`](store::CookieStore) | Shared store surface |
//! | `SqlitePersistentCookieStore` | [`persistence`] | Disk persistence (JSON here) |
//!
//! [`sync`] decides per request whether the shared store or the fallback
//! preference string is authoritative.

pub mod canonicalcookie;
pub mod monster;
pub mod persistence;
pub mod store;
pub mod sync;

pub use canonicalcookie::CanonicalCookie;
pub use monster::CookieMonster;
pub use store::{CookieStore, SharedCookieStore};
pub use sync::{CookieSource, CookieSynchronizer, FallbackCookieSource, SharedCookieSource};
