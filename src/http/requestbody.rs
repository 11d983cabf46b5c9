//! Request body for POST/PUT operations.

use bytes::Bytes;
use http_body_util::Full;

/// Request body for HTTP methods that send data.
///
/// Bodies are always fully materialised, so every request is sent with an
/// exact `Content-Length` and can be replayed on a fresh connection.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    /// No body (GET, HEAD, DELETE).
    #[default]
    Empty,
    /// Body with raw bytes.
    Bytes(Bytes),
}

impl From<String> for RequestBody {
    fn from(s: String) -> Self {
        RequestBody::Bytes(Bytes::from(s))
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(v: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(v))
    }
}

impl From<&str> for RequestBody {
    fn from(s: &str) -> Self {
        RequestBody::Bytes(Bytes::from(s.to_owned()))
    }
}

impl From<Bytes> for RequestBody {
    fn from(b: Bytes) -> Self {
        RequestBody::Bytes(b)
    }
}

impl RequestBody {
    /// Check if the body is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the length of the body in bytes.
    pub fn len(&self) -> usize {
        match self {
            RequestBody::Empty => 0,
            RequestBody::Bytes(b) => b.len(),
        }
    }

    /// Borrow the raw bytes (empty for [`RequestBody::Empty`]).
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            RequestBody::Empty => &[],
            RequestBody::Bytes(b) => b,
        }
    }

    /// Convert into a hyper body with a known exact size.
    pub fn to_full(&self) -> Full<Bytes> {
        match self {
            RequestBody::Empty => Full::new(Bytes::new()),
            RequestBody::Bytes(b) => Full::new(b.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body::Body;

    #[test]
    fn test_empty_body() {
        let body = RequestBody::Empty;
        assert!(body.is_empty());
        assert_eq!(body.len(), 0);
        assert!(body.as_bytes().is_empty());
    }

    #[test]
    fn test_from_conversions() {
        let body: RequestBody = "hello world".to_string().into();
        assert_eq!(body.len(), 11);

        let body: RequestBody = vec![1u8, 2, 3, 4].into();
        assert_eq!(body.len(), 4);

        let body: RequestBody = Bytes::from_static(b"raw").into();
        assert_eq!(body.as_bytes(), b"raw");
    }

    #[test]
    fn test_full_has_exact_size() {
        let body = RequestBody::from("test");
        assert_eq!(body.to_full().size_hint().exact(), Some(4));
        assert_eq!(RequestBody::Empty.to_full().size_hint().exact(), Some(0));
    }

    #[test]
    fn test_clone_shares_bytes() {
        let body1: RequestBody = "data".into();
        let body2 = body1.clone();
        assert_eq!(body1.as_bytes().as_ptr(), body2.as_bytes().as_ptr());
    }
}
