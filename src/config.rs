//! Client configuration.
//!
//! Everything is optional in JSON; missing fields take their defaults.
//!
//! ```json
//! {
//!   "active_url": "https://maps.example.com",
//!   "engine": { "cache_root": "/var/cache/app", "cache_max_bytes": 268435456 },
//!   "compression": { "brotli_quality": 7 }
//! }
//! ```

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::http::compression::CompressionConfig;
use crate::transport::{CapabilityPolicy, EngineConfig};
use crate::urlrequest::job::DEFAULT_MAX_REDIRECTS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Default `User-Agent`.
pub const DEFAULT_USER_AGENT: &str = concat!("adaptnet/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend base URL. Required before a client can be built.
    pub active_url: Option<String>,
    pub max_redirects: usize,
    pub user_agent: Option<String>,
    pub capability: CapabilityPolicy,
    pub engine: EngineConfig,
    pub compression: CompressionConfig,
    /// JSON preference file. In-memory preferences when unset.
    pub prefs_path: Option<PathBuf>,
    /// JSON cookie file backing the shared store. In-memory when unset.
    pub cookie_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            active_url: None,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            capability: CapabilityPolicy::default(),
            engine: EngineConfig::default(),
            compression: CompressionConfig::default(),
            prefs_path: None,
            cookie_path: None,
        }
    }
}

impl ClientConfig {
    pub fn from_json_str(json: &str) -> Result<Self, NetError> {
        serde_json::from_str(json).map_err(|e| NetError::InvalidConfig(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, NetError> {
        let json = std::fs::read_to_string(path.as_ref()).file_context("read client config")?;
        Self::from_json_str(&json)
    }

    /// The parsed active URL.
    pub fn parsed_active_url(&self) -> Result<Url, NetError> {
        let raw = self
            .active_url
            .as_deref()
            .ok_or_else(|| NetError::InvalidConfig("active_url is not set".to_string()))?;
        let url = Url::parse(raw)
            .map_err(|e| NetError::InvalidConfig(format!("active_url {:?}: {}", raw, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(NetError::InvalidConfig(format!(
                "active_url {:?} is not http(s)",
                raw
            )));
        }
        Ok(url)
    }
}
