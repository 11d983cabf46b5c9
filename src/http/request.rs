//! A single-hop request handed to a transport backend.

use crate::base::neterror::NetError;
use crate::http::RequestBody;
use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_LENGTH, HOST};
use http::{HeaderMap, Method, Request};
use http_body_util::Full;
use url::{Position, Url};

/// One request/response hop. Redirects are resolved above the transport,
/// so a backend only ever sees the URL it must contact.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: RequestBody,
    /// Decode `Content-Encoding` transparently. Off when the caller set
    /// `Accept-Encoding` itself and wants the raw bytes.
    pub decode_body: bool,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            decode_body: true,
        }
    }

    /// `scheme://host:port` used to key pooled connections and cache entries.
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    /// Build the origin-form HTTP/1.1 request hyper puts on the wire.
    pub fn to_hyper(&self) -> Result<Request<Full<Bytes>>, NetError> {
        let target = &self.url[Position::BeforePath..Position::AfterQuery];
        let target = if target.is_empty() { "/" } else { target };

        let mut req = Request::builder()
            .method(self.method.clone())
            .uri(target)
            .body(self.body.to_full())
            .map_err(|_| NetError::InvalidUrl)?;

        *req.headers_mut() = self.headers.clone();

        if !req.headers().contains_key(HOST) {
            let host = self.url.host_str().ok_or(NetError::InvalidUrl)?;
            let value = match self.url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            };
            req.headers_mut().insert(
                HOST,
                HeaderValue::from_str(&value).map_err(|_| NetError::InvalidUrl)?,
            );
        }

        if !self.body.is_empty() || self.method == Method::POST || self.method == Method::PUT {
            req.headers_mut()
                .insert(CONTENT_LENGTH, HeaderValue::from(self.body.len()));
        }

        Ok(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_form_target() {
        let url = Url::parse("https://example.com:8443/graphql?x=1#frag").unwrap();
        let req = HttpRequest::new(Method::GET, url).to_hyper().unwrap();
        assert_eq!(req.uri(), "/graphql?x=1");
        assert_eq!(req.headers()[HOST], "example.com:8443");
    }

    #[test]
    fn test_default_port_omitted_from_host() {
        let url = Url::parse("https://example.com/").unwrap();
        let req = HttpRequest::new(Method::GET, url).to_hyper().unwrap();
        assert_eq!(req.headers()[HOST], "example.com");
        assert!(!req.headers().contains_key(CONTENT_LENGTH));
    }

    #[test]
    fn test_post_carries_exact_length() {
        let url = Url::parse("http://example.com/api").unwrap();
        let mut request = HttpRequest::new(Method::POST, url);
        request.body = RequestBody::from("abc");
        let req = request.to_hyper().unwrap();
        assert_eq!(req.headers()[CONTENT_LENGTH], "3");
    }

    #[test]
    fn test_origin_key() {
        let url = Url::parse("http://127.0.0.1:8080/a/b").unwrap();
        assert_eq!(
            HttpRequest::new(Method::GET, url).origin(),
            "http://127.0.0.1:8080"
        );
    }
}
