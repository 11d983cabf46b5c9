//! Durable key-value preferences.
//!
//! The request layer keeps two pieces of state outside the network stack:
//! whether Brotli request bodies are still allowed, and the fallback copy of
//! the session cookie. Both live behind [`PreferenceStore`] so hosts can plug
//! in whatever persistence they already have.
//!
//! - [`MemoryPreferences`]: process-local, for tests and ephemeral clients
//! - [`FilePreferences`]: JSON file, rewritten on every change

mod file;
mod memory;

pub use file::FilePreferences;
pub use memory::MemoryPreferences;

use crate::base::neterror::NetError;
use serde::{Deserialize, Serialize};

/// Preference key for the "use Brotli" flag.
pub const KEY_BROTLI: &str = "http.brotli";

/// Preference key for the fallback session cookie.
pub const KEY_COOKIE: &str = "cookie.graphql";

/// A stored preference value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Bool(bool),
    String(String),
}

/// Simple durable key-value surface.
pub trait PreferenceStore: Send + Sync {
    fn get_bool(&self, key: &str) -> Option<bool>;

    fn set_bool(&self, key: &str, value: bool) -> Result<(), NetError>;

    fn get_string(&self, key: &str) -> Option<String>;

    /// Store `value`, or remove the key when `None`.
    fn set_string(&self, key: &str, value: Option<&str>) -> Result<(), NetError>;
}
