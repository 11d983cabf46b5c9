//! The request layer wired together.
//!
//! # Example
//!
//! ```rust,no_run
//! use adaptnet::client::{ApiOutcome, Client};
//!
//! # async fn run() -> Result<(), adaptnet::base::neterror::NetError> {
//! let client = Client::builder()
//!     .active_url("https://maps.example.com")
//!     .build()?;
//!
//! match client.post_graphql(r#"{"query":"{ viewer { id } }"}"#).await? {
//!     ApiOutcome::Completed(response) => println!("{}", response.text()?),
//!     ApiOutcome::Rejected(error) => eprintln!("{}", error),
//! }
//! # Ok(())
//! # }
//! ```

use crate::base::neterror::NetError;
use crate::config::ClientConfig;
use crate::cookies::{CookieStore, CookieSynchronizer, SharedCookieStore};
use crate::http::compression::{
    CompressionConfig, CompressionNegotiator, CompressionPreference, ContentCoding,
};
use crate::http::errorsurface::{ErrorSurface, RedirectError};
use crate::http::HttpResponse;
use crate::prefs::{FilePreferences, MemoryPreferences, PreferenceStore};
use crate::transport::{
    Connection, EngineConfig, PlatformInfo, StaticPlatform, Transport, TransportMode,
    TransportSelector,
};
use crate::urlrequest::endpoint::ActiveEndpoint;
use crate::urlrequest::runner::RequestRunner;
use http::Method;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// How an API call ended at the HTTP level.
#[derive(Debug, Clone)]
pub enum ApiOutcome {
    /// Any non-redirect response, or a redirect without `Location`.
    Completed(HttpResponse),
    /// The server redirected instead of answering.
    Rejected(RedirectError),
}

impl ApiOutcome {
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            ApiOutcome::Completed(response) => Some(response),
            ApiOutcome::Rejected(_) => None,
        }
    }

    pub fn into_response(self) -> Option<HttpResponse> {
        match self {
            ApiOutcome::Completed(response) => Some(response),
            ApiOutcome::Rejected(_) => None,
        }
    }

    pub fn error(&self) -> Option<&RedirectError> {
        match self {
            ApiOutcome::Completed(_) => None,
            ApiOutcome::Rejected(error) => Some(error),
        }
    }
}

/// Adaptive API client. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Client {
    runner: RequestRunner,
    endpoint: Arc<ActiveEndpoint>,
    cookies: CookieSynchronizer,
    negotiator: CompressionNegotiator,
    errors: ErrorSurface,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("active_url", &self.active_url().as_str())
            .field("mode", &self.transport_mode())
            .field("compression", &self.compression())
            .finish()
    }
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn from_config(config: ClientConfig) -> Result<Self, NetError> {
        ClientBuilder::default().config(config).build()
    }

    pub fn active_url(&self) -> Url {
        self.endpoint.active_url()
    }

    pub fn set_active_url(&self, url: Url) {
        self.endpoint.set_active_url(url);
    }

    /// GraphQL URL of the active backend.
    pub fn api_url(&self) -> Url {
        self.endpoint.api_url()
    }

    pub fn selector(&self) -> &Arc<TransportSelector> {
        self.runner.selector()
    }

    pub fn is_modern_available(&self) -> bool {
        self.selector().is_modern_available()
    }

    pub fn transport_mode(&self) -> TransportMode {
        self.selector().mode()
    }

    /// Codec the next request body will use.
    pub fn compression(&self) -> ContentCoding {
        self.negotiator.preference().current()
    }

    pub fn cookie_store(&self) -> &Arc<dyn CookieStore> {
        self.cookies.store()
    }

    pub fn open(&self, url: &str, method: Method) -> Result<Connection, NetError> {
        self.selector().open(url, method)
    }

    /// See [`RequestRunner::run_cancellable`].
    pub fn run_cancellable<T, F, Fut>(
        &self,
        url: &str,
        method: Method,
        work: F,
    ) -> impl Future<Output = Result<T, NetError>> + Send + 'static
    where
        T: Send + 'static,
        F: FnOnce(Connection) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, NetError>> + Send + 'static,
    {
        self.runner.run_cancellable(url, method, work)
    }

    /// See [`RequestRunner::run_cancellable_with`].
    pub fn run_cancellable_with<T, F, Fut>(
        &self,
        url: &str,
        method: Method,
        cancel: CancellationToken,
        work: F,
    ) -> impl Future<Output = Result<T, NetError>> + Send + 'static
    where
        T: Send + 'static,
        F: FnOnce(Connection) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, NetError>> + Send + 'static,
    {
        self.runner.run_cancellable_with(url, method, cancel, work)
    }

    /// Cancellable request with session cookies attached before `setup` and
    /// harvested after it.
    pub fn connect_with_cookie<T, F, Fut>(
        &self,
        url: &str,
        method: Method,
        setup: F,
    ) -> impl Future<Output = Result<T, NetError>> + Send + 'static
    where
        T: Send + 'static,
        F: FnOnce(Connection) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, NetError>> + Send + 'static,
    {
        let cookies = self.cookies.clone();
        self.runner.run_cancellable(url, method, move |conn| async move {
            cookies.attach_and_capture(&conn, setup).await
        })
    }

    /// Copy the shared session cookie for the API URL into the fallback slot.
    pub fn persist_current_session_cookie(&self) -> Result<(), NetError> {
        self.cookies.persist_current_session_cookie(&self.api_url())
    }

    pub fn write_compressed(
        &self,
        connection: &Connection,
        body: &str,
    ) -> Result<ContentCoding, NetError> {
        self.negotiator.write_compressed(connection, body)
    }

    pub fn detect_error(&self, connection: &Connection) -> Option<String> {
        self.errors.detect_error(connection)
    }

    /// POST a GraphQL document to the active backend: cookies attached,
    /// body compressed, error redirects classified.
    pub async fn post_graphql(&self, body: &str) -> Result<ApiOutcome, NetError> {
        let negotiator = self.negotiator.clone();
        let errors = self.errors.clone();
        let body = body.to_string();

        self.connect_with_cookie(self.api_url().as_str(), Method::POST, move |conn| async move {
            conn.set_header("Content-Type", "application/json")?;
            negotiator.write_compressed(&conn, &body)?;

            let response = conn.response().await?;
            if response.status().is_redirection() {
                if let Some(error) = errors.inspect(&conn) {
                    return Ok(ApiOutcome::Rejected(error));
                }
            }
            Ok(ApiOutcome::Completed(response.clone()))
        })
        .await
    }
}

/// Builder for creating a [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    platform: Option<Box<dyn PlatformInfo>>,
    transport: Option<Arc<dyn Transport>>,
    prefs: Option<Arc<dyn PreferenceStore>>,
    cookie_store: Option<Arc<dyn CookieStore>>,
}

impl ClientBuilder {
    /// Start from a full configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn active_url(mut self, url: &str) -> Self {
        self.config.active_url = Some(url.to_string());
        self
    }

    /// Platform used for capability detection.
    pub fn platform(mut self, platform: impl PlatformInfo + 'static) -> Self {
        self.platform = Some(Box::new(platform));
        self
    }

    /// Use this backend instead of detecting one.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn preferences(mut self, prefs: Arc<dyn PreferenceStore>) -> Self {
        self.prefs = Some(prefs);
        self
    }

    pub fn cookie_store(mut self, store: Arc<dyn CookieStore>) -> Self {
        self.cookie_store = Some(store);
        self
    }

    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.config.engine = config;
        self
    }

    pub fn compression_config(mut self, config: CompressionConfig) -> Self {
        self.config.compression = config;
        self
    }

    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    pub fn user_agent(mut self, agent: &str) -> Self {
        self.config.user_agent = Some(agent.to_string());
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<Client, NetError> {
        let config = self.config;
        let active_url = config.parsed_active_url()?;

        let selector = match self.transport {
            Some(transport) => TransportSelector::with_transport(transport),
            None => {
                let platform = self
                    .platform
                    .unwrap_or_else(|| Box::new(StaticPlatform::default()));
                TransportSelector::new(platform)
                    .policy(config.capability)
                    .engine_config(config.engine.clone())
            }
        };
        let selector = match &config.user_agent {
            Some(agent) => selector.user_agent(agent),
            None => selector,
        }
        .max_redirects(config.max_redirects);

        let prefs: Arc<dyn PreferenceStore> = match (self.prefs, &config.prefs_path) {
            (Some(prefs), _) => prefs,
            (None, Some(path)) => Arc::new(FilePreferences::open(path)?),
            (None, None) => Arc::new(MemoryPreferences::new()),
        };
        let cookie_store: Arc<dyn CookieStore> = match (self.cookie_store, &config.cookie_path) {
            (Some(store), _) => store,
            (None, Some(path)) => Arc::new(SharedCookieStore::persistent(path)?),
            (None, None) => Arc::new(SharedCookieStore::in_memory()),
        };

        let endpoint = Arc::new(ActiveEndpoint::new(active_url));
        let preference = CompressionPreference::new(Arc::clone(&prefs));

        Ok(Client {
            runner: RequestRunner::new(Arc::new(selector)),
            cookies: CookieSynchronizer::new(cookie_store, prefs),
            negotiator: CompressionNegotiator::new(preference.clone(), config.compression),
            errors: ErrorSurface::new(preference, Arc::clone(&endpoint)),
            endpoint,
        })
    }
}
