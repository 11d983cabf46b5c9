//! Server-driven error redirects.
//!
//! The backend reports request-level failures by redirecting to
//! `/error/<percent-encoded message>`. Anything else in `Location` is an
//! opaque redirect and only gets logged.

use crate::http::compression::CompressionPreference;
use crate::http::HttpResponse;
use crate::transport::Connection;
use crate::urlrequest::endpoint::ActiveEndpoint;
use percent_encoding::percent_decode_str;
use std::fmt;
use std::sync::Arc;
use url::Url;

pub const ERROR_PATH_PREFIX: &str = "/error/";

/// Message the backend sends when it cannot read Brotli request bodies.
pub const BROTLI_UNSUPPORTED: &str = "unsupported content encoding \"br\"";

/// A classified redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectError {
    /// `/error/...` with its decoded message.
    Structured { path: String, message: String },
    /// Any other location, untouched.
    Opaque { location: String },
}

impl RedirectError {
    pub fn classify(location: &str) -> Self {
        match location.strip_prefix(ERROR_PATH_PREFIX) {
            Some(encoded) => RedirectError::Structured {
                path: location.to_string(),
                message: percent_decode_str(encoded).decode_utf8_lossy().into_owned(),
            },
            None => RedirectError::Opaque {
                location: location.to_string(),
            },
        }
    }

    /// The decoded message, or the raw location for opaque redirects.
    pub fn message(&self) -> &str {
        match self {
            RedirectError::Structured { message, .. } => message,
            RedirectError::Opaque { location } => location,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, RedirectError::Structured { .. })
    }
}

impl fmt::Display for RedirectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedirectError::Structured { message, .. } => write!(f, "server error: {}", message),
            RedirectError::Opaque { location } => write!(f, "redirected to {}", location),
        }
    }
}

impl std::error::Error for RedirectError {}

/// Inspects completed exchanges for error redirects.
#[derive(Debug, Clone)]
pub struct ErrorSurface {
    preference: CompressionPreference,
    endpoint: Arc<ActiveEndpoint>,
}

impl ErrorSurface {
    pub fn new(preference: CompressionPreference, endpoint: Arc<ActiveEndpoint>) -> Self {
        Self {
            preference,
            endpoint,
        }
    }

    /// Error message carried by the connection's redirect, if any.
    ///
    /// Reads only an already completed response; a connection whose exchange
    /// has not finished (or failed) yields `None`.
    pub fn detect_error(&self, connection: &Connection) -> Option<String> {
        self.inspect(connection).map(|e| e.message().to_string())
    }

    pub fn inspect(&self, connection: &Connection) -> Option<RedirectError> {
        let response = connection.completed_response()?;
        self.inspect_response(connection.url(), response)
    }

    /// Classify `response`'s `Location`, downgrading compression when the
    /// active endpoint rejected Brotli.
    pub fn inspect_response(&self, target: &Url, response: &HttpResponse) -> Option<RedirectError> {
        let location = response.header("location")?;
        let error = RedirectError::classify(location);

        match &error {
            RedirectError::Structured { message, .. } => {
                let from_active =
                    target.host_str().is_some() && target.host_str() == self.endpoint.host().as_deref();
                if from_active && message == BROTLI_UNSUPPORTED {
                    if let Err(e) = self.preference.downgrade() {
                        tracing::warn!(error = %e, "failed to persist compression downgrade");
                    }
                } else {
                    tracing::debug!(url = %target, message = %message, "server reported error");
                }
            }
            RedirectError::Opaque { location } => {
                tracing::warn!(url = %target, location = %location, "unexpected redirect");
            }
        }

        Some(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::compression::ContentCoding;
    use crate::prefs::MemoryPreferences;
    use bytes::Bytes;
    use http::{HeaderMap, HeaderValue, StatusCode};

    fn surface(active: &str) -> ErrorSurface {
        ErrorSurface::new(
            CompressionPreference::new(Arc::new(MemoryPreferences::new())),
            Arc::new(ActiveEndpoint::new(Url::parse(active).unwrap())),
        )
    }

    fn redirect(location: Option<&'static str>) -> HttpResponse {
        let mut headers = HeaderMap::new();
        if let Some(location) = location {
            headers.insert("location", HeaderValue::from_static(location));
        }
        HttpResponse::new(
            StatusCode::FOUND,
            headers,
            Bytes::new(),
            Url::parse("https://api.example.com/graphql").unwrap(),
        )
    }

    #[test]
    fn test_classify_decodes_message() {
        let error = RedirectError::classify("/error/rate%20limited+again");
        assert_eq!(
            error,
            RedirectError::Structured {
                path: "/error/rate%20limited+again".into(),
                message: "rate limited+again".into(),
            }
        );
    }

    #[test]
    fn test_classify_invalid_utf8_is_replaced() {
        assert_eq!(RedirectError::classify("/error/bad%FF").message(), "bad\u{FFFD}");
    }

    #[test]
    fn test_opaque_location_returned_raw() {
        let error = RedirectError::classify("https://login.example.com/?next=%2F");
        assert!(!error.is_structured());
        assert_eq!(error.message(), "https://login.example.com/?next=%2F");
    }

    #[test]
    fn test_brotli_rejection_from_active_host_downgrades() {
        let surface = surface("https://api.example.com");
        let target = Url::parse("https://api.example.com/graphql").unwrap();
        let response = redirect(Some(
            "/error/unsupported%20content%20encoding%20%22br%22",
        ));

        let error = surface.inspect_response(&target, &response).unwrap();
        assert_eq!(error.message(), BROTLI_UNSUPPORTED);
        assert_eq!(surface.preference.current(), ContentCoding::Deflate);
    }

    #[test]
    fn test_rejection_from_other_host_ignored() {
        let surface = surface("https://api.example.com");
        let target = Url::parse("https://mirror.example.com/graphql").unwrap();
        let response = redirect(Some(
            "/error/unsupported%20content%20encoding%20%22br%22",
        ));

        surface.inspect_response(&target, &response).unwrap();
        assert_eq!(surface.preference.current(), ContentCoding::Brotli);
    }

    #[test]
    fn test_other_message_does_not_downgrade() {
        let surface = surface("https://api.example.com");
        let target = Url::parse("https://api.example.com/graphql").unwrap();
        surface
            .inspect_response(&target, &redirect(Some("/error/quota%20exceeded")))
            .unwrap();
        assert_eq!(surface.preference.current(), ContentCoding::Brotli);
    }

    #[test]
    fn test_missing_location_is_none() {
        let surface = surface("https://api.example.com");
        let target = Url::parse("https://api.example.com/graphql").unwrap();
        assert!(surface.inspect_response(&target, &redirect(None)).is_none());
    }
}
