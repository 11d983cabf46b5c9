use std::sync::{PoisonError, RwLock};
use url::Url;

/// API path served by every backend endpoint.
pub const API_PATH: &str = "/graphql";

/// The GraphQL URL for a backend base URL.
pub fn api_url(base: &Url) -> Url {
    let mut url = base.clone();
    url.set_path(API_PATH);
    url.set_query(None);
    url.set_fragment(None);
    url
}

/// The backend the client currently talks to. Swappable at runtime.
#[derive(Debug)]
pub struct ActiveEndpoint {
    url: RwLock<Url>,
}

impl ActiveEndpoint {
    pub fn new(url: Url) -> Self {
        Self {
            url: RwLock::new(url),
        }
    }

    pub fn active_url(&self) -> Url {
        self.url
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_active_url(&self, url: Url) {
        tracing::debug!(%url, "active endpoint changed");
        *self.url.write().unwrap_or_else(PoisonError::into_inner) = url;
    }

    pub fn api_url(&self) -> Url {
        api_url(&self.active_url())
    }

    pub fn host(&self) -> Option<String> {
        self.url
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .host_str()
            .map(str::to_string)
    }
}
