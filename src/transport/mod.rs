//! Transport backends and their selection.
//!
//! Two interchangeable backends perform the actual exchange:
//!
//! - [`HttpEngine`]: pooled, cached, migration-aware, decodes Brotli
//! - [`LegacyTransport`]: one fresh socket per request, gzip only
//!
//! [`TransportSelector`] decides once which one a process uses and hands
//! out [`Connection`] handles bound to it.

pub mod capability;
pub mod connection;
pub mod engine;
pub mod legacy;
pub mod selector;

pub use capability::{CapabilityPolicy, PlatformInfo, StaticPlatform};
pub use connection::Connection;
pub use engine::{EngineConfig, HttpEngine, MigrationOptions};
pub use legacy::LegacyTransport;
pub use selector::{default_selector, TransportSelector};

use crate::base::neterror::NetError;
use crate::http::decode::DecodeSupport;
use crate::http::{HttpRequest, HttpResponse};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Which backend a selector settled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportMode {
    Modern,
    Legacy,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Modern => f.write_str("modern"),
            TransportMode::Legacy => f.write_str("legacy"),
        }
    }
}

/// A backend able to carry one request/response hop.
///
/// Redirects, cookies and compression live above this trait; a transport
/// only moves bytes for the URL it is given.
pub trait Transport: Send + Sync {
    fn mode(&self) -> TransportMode;

    /// Response codings this backend undoes.
    fn decode_support(&self) -> DecodeSupport;

    /// Perform a single exchange.
    fn exchange(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, NetError>>;

    /// Called exactly once when a connection bound to `url` is torn down.
    fn release(&self, _url: &Url) {}
}
