use crate::base::neterror::NetError;
use crate::transport::capability::{CapabilityPolicy, PlatformInfo, StaticPlatform};
use crate::transport::connection::{Connection, ConnectionOptions};
use crate::transport::engine::{EngineConfig, HttpEngine};
use crate::transport::legacy::LegacyTransport;
use crate::transport::{Transport, TransportMode};
use http::{HeaderValue, Method};
use once_cell::sync::Lazy;
use std::sync::{Arc, OnceLock};
use url::Url;

/// Picks a backend once and opens connections on it.
///
/// Capability detection and engine construction happen lazily on first use
/// and are cached for the selector's lifetime.
pub struct TransportSelector {
    platform: Box<dyn PlatformInfo>,
    policy: CapabilityPolicy,
    engine_config: EngineConfig,
    options: ConnectionOptions,
    mode: OnceLock<TransportMode>,
    engine: OnceLock<HttpEngine>,
    transport: OnceLock<Arc<dyn Transport>>,
}

impl std::fmt::Debug for TransportSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSelector")
            .field("policy", &self.policy)
            .field("mode", &self.mode.get())
            .finish()
    }
}

impl Default for TransportSelector {
    fn default() -> Self {
        Self::new(StaticPlatform::default())
    }
}

impl TransportSelector {
    pub fn new(platform: impl PlatformInfo + 'static) -> Self {
        Self {
            platform: Box::new(platform),
            policy: CapabilityPolicy::default(),
            engine_config: EngineConfig::default(),
            options: ConnectionOptions::default(),
            mode: OnceLock::new(),
            engine: OnceLock::new(),
            transport: OnceLock::new(),
        }
    }

    /// Bypass capability detection and use a fixed backend.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        let selector = Self::new(StaticPlatform::default());
        let _ = selector.mode.set(transport.mode());
        let _ = selector.transport.set(transport);
        selector
    }

    pub fn policy(mut self, policy: CapabilityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    pub fn max_redirects(mut self, max: usize) -> Self {
        self.options.max_redirects = max;
        self
    }

    /// User-Agent sent when the caller sets none. Invalid values are ignored.
    pub fn user_agent(mut self, agent: &str) -> Self {
        self.options.user_agent = HeaderValue::from_str(agent)
            .map_err(|_| tracing::warn!(agent, "ignoring invalid user agent"))
            .ok();
        self
    }

    /// Whether the modern engine is usable here. Evaluated once.
    pub fn is_modern_available(&self) -> bool {
        self.mode() == TransportMode::Modern
    }

    pub fn mode(&self) -> TransportMode {
        *self.mode.get_or_init(|| {
            let mode = if self.policy.is_modern_available(self.platform.as_ref()) {
                TransportMode::Modern
            } else {
                TransportMode::Legacy
            };
            tracing::debug!(
                %mode,
                sdk = self.platform.sdk_version(),
                "transport selected"
            );
            mode
        })
    }

    /// The modern engine, built on first call. `None` in legacy mode or when
    /// a custom transport was injected.
    pub fn engine(&self) -> Option<&HttpEngine> {
        if let Some(engine) = self.engine.get() {
            return Some(engine);
        }
        if self.transport.get().is_some() || !self.is_modern_available() {
            return None;
        }
        Some(
            self.engine
                .get_or_init(|| HttpEngine::new(self.engine_config.clone())),
        )
    }

    /// The backend every connection from this selector runs on.
    pub fn transport(&self) -> Arc<dyn Transport> {
        let transport = self.transport.get_or_init(|| -> Arc<dyn Transport> {
            match self.engine() {
                Some(engine) => Arc::new(engine.clone()),
                None => Arc::new(LegacyTransport::new()),
            }
        });
        Arc::clone(transport)
    }

    /// Open a connection. Never suspends; nothing touches the network until
    /// the response is requested.
    pub fn open(&self, url: &str, method: Method) -> Result<Connection, NetError> {
        let url = Url::parse(url).map_err(|_| NetError::InvalidUrl)?;
        self.open_url(url, method)
    }

    pub fn open_url(&self, url: Url, method: Method) -> Result<Connection, NetError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(NetError::DisallowedUrlScheme);
        }
        Ok(Connection::with_options(
            url,
            method,
            self.transport(),
            self.options.clone(),
        ))
    }
}

static DEFAULT_SELECTOR: Lazy<TransportSelector> = Lazy::new(TransportSelector::default);

/// The process-wide selector for the current platform.
pub fn default_selector() -> &'static TransportSelector {
    &DEFAULT_SELECTOR
}
