//! HTTP Response with body access.

use crate::base::neterror::NetError;
use crate::http::decode::{decode_all, DecodeSupport};
use bytes::Bytes;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH};
use http::{HeaderMap, StatusCode, Version};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use url::Url;

/// HTTP Response with its body fully read.
///
/// Connections hand out shared references to one response, so the body is
/// buffered rather than streamed.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    url: Url,
    from_cache: bool,
}

impl HttpResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes, url: Url) -> Self {
        Self {
            status,
            version: Version::HTTP_11,
            headers,
            body,
            url,
            from_cache: false,
        }
    }

    /// Read a hyper response to completion, undoing any content coding the
    /// backend advertised.
    pub async fn collect(
        resp: http::Response<Incoming>,
        url: Url,
        decode: Option<DecodeSupport>,
    ) -> Result<Self, NetError> {
        let (parts, body) = resp.into_parts();
        let collected = body.collect().await.map_err(|e| {
            tracing::debug!(error = %e, "body read failed");
            NetError::from_hyper(&e)
        })?;
        let mut body = collected.to_bytes();
        let mut headers = parts.headers;

        if let Some(support) = decode {
            let coding = headers
                .get(CONTENT_ENCODING)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            if let Some(coding) = coding {
                if let Some(decoded) = decode_all(&coding, body.clone(), support)? {
                    body = decoded;
                    headers.remove(CONTENT_ENCODING);
                    headers.remove(CONTENT_LENGTH);
                }
            }
        }

        Ok(Self {
            status: parts.status,
            version: parts.version,
            headers,
            body,
            url,
            from_cache: false,
        })
    }

    pub(crate) fn mark_from_cache(mut self) -> Self {
        self.from_cache = true;
        self
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the HTTP version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get a reference to the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// All values of a header (e.g. every `Set-Cookie`).
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// URL this response was actually served from (after redirects).
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Whether the response came out of the engine's disk cache.
    pub fn is_from_cache(&self) -> bool {
        self.from_cache
    }

    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Body as UTF-8 text.
    pub fn text(&self) -> Result<&str, NetError> {
        std::str::from_utf8(&self.body).map_err(|_| NetError::InvalidUtf8)
    }

    /// Body deserialized from JSON.
    #[cfg(feature = "json")]
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, NetError> {
        serde_json::from_slice(&self.body).map_err(|_| NetError::HttpBodyError)
    }
}
