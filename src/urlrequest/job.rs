use crate::base::neterror::NetError;
use crate::http::{HttpRequest, HttpResponse, RequestBody};
use crate::transport::Transport;
use http::header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HOST};
use http::{Method, StatusCode};
use std::sync::Arc;

/// Chromium's redirect limit.
pub const DEFAULT_MAX_REDIRECTS: usize = 20;

/// Drives one request through a transport, following redirects.
/// Roughly net::URLRequestHttpJob.
pub struct RedirectJob {
    transport: Arc<dyn Transport>,
    max_redirects: usize,
    follow: bool,
}

impl RedirectJob {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            follow: true,
        }
    }

    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// When off, the first 3xx is handed back as-is.
    pub fn follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    pub async fn run(&self, mut request: HttpRequest) -> Result<HttpResponse, NetError> {
        let mut remaining = self.max_redirects;
        loop {
            let response = self.transport.exchange(request.clone()).await?;
            if !self.follow || !is_followable(response.status()) {
                return Ok(response);
            }
            let Some(location) = response.header("location") else {
                return Ok(response);
            };

            let next = request
                .url
                .join(location)
                .map_err(|_| NetError::InvalidRedirect)?;
            if !matches!(next.scheme(), "http" | "https") {
                return Err(NetError::InvalidRedirect);
            }
            if remaining == 0 {
                return Err(NetError::TooManyRedirects);
            }
            remaining -= 1;

            tracing::debug!(from = %request.url, to = %next, status = %response.status(), "following redirect");
            request = redirect_request(request, response.status(), next);
        }
    }
}

fn is_followable(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

/// Build the next hop. 303 always becomes GET, and 301/302 turn a POST into
/// a GET the way browsers do. Credentials never cross origins.
fn redirect_request(mut request: HttpRequest, status: StatusCode, next: url::Url) -> HttpRequest {
    let to_get = (status == StatusCode::SEE_OTHER && request.method != Method::HEAD)
        || (matches!(status.as_u16(), 301 | 302) && request.method == Method::POST);
    if to_get {
        request.method = Method::GET;
        request.body = RequestBody::Empty;
        request.headers.remove(CONTENT_TYPE);
        request.headers.remove(CONTENT_LENGTH);
        request.headers.remove(CONTENT_ENCODING);
    }

    if request.url.origin() != next.origin() {
        request.headers.remove(COOKIE);
        request.headers.remove(AUTHORIZATION);
    }
    request.headers.remove(HOST);
    request.url = next;
    request
}
