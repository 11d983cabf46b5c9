//! Per-request connection handle.
//!
//! A [`Connection`] is bound to one URL and one method. Request headers and
//! the body are configured first; the exchange runs the first time the
//! response is asked for. Clones share the same exchange, so a runner can
//! disconnect a connection while the caller's work still holds it.

use crate::base::loadstate::LoadState;
use crate::base::neterror::NetError;
use crate::http::{HttpRequest, HttpResponse, RequestBody};
use crate::transport::{Transport, TransportMode};
use crate::urlrequest::job::{RedirectJob, DEFAULT_MAX_REDIRECTS};
use bytes::{Bytes, BytesMut};
use http::header::{ACCEPT_ENCODING, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use url::Url;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Per-connection knobs handed down by the selector.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub max_redirects: usize,
    pub user_agent: Option<HeaderValue>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: None,
        }
    }
}

struct State {
    headers: HeaderMap,
    body: BytesMut,
    follow_redirects: bool,
    fixed_length: Option<u64>,
    load_state: LoadState,
}

struct Inner {
    id: u64,
    url: Url,
    method: Method,
    transport: Arc<dyn Transport>,
    options: ConnectionOptions,
    abort: CancellationToken,
    closed: AtomicBool,
    state: Mutex<State>,
    outcome: OnceCell<Result<HttpResponse, NetError>>,
}

/// Handle to one request/response exchange.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("method", &self.inner.method)
            .field("url", &self.inner.url.as_str())
            .field("mode", &self.inner.transport.mode())
            .field("load_state", &self.load_state())
            .finish()
    }
}

impl Connection {
    pub fn new(url: Url, method: Method, transport: Arc<dyn Transport>) -> Self {
        Self::with_options(url, method, transport, ConnectionOptions::default())
    }

    pub fn with_options(
        url: Url,
        method: Method,
        transport: Arc<dyn Transport>,
        options: ConnectionOptions,
    ) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(id, %url, %method, mode = %transport.mode(), "connection opened");
        Self {
            inner: Arc::new(Inner {
                id,
                url,
                method,
                transport,
                options,
                abort: CancellationToken::new(),
                closed: AtomicBool::new(false),
                state: Mutex::new(State {
                    headers: HeaderMap::new(),
                    body: BytesMut::new(),
                    follow_redirects: true,
                    fixed_length: None,
                    load_state: LoadState::Idle,
                }),
                outcome: OnceCell::new(),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    pub fn method(&self) -> &Method {
        &self.inner.method
    }

    pub fn transport_mode(&self) -> TransportMode {
        self.inner.transport.mode()
    }

    pub fn load_state(&self) -> LoadState {
        self.inner.lock_state().load_state
    }

    /// Lock the request side for modification, failing once it was sent.
    fn configurable(&self) -> Result<MutexGuard<'_, State>, NetError> {
        if self.is_closed() {
            return Err(NetError::ConnectionAborted);
        }
        let state = self.inner.lock_state();
        if state.load_state.is_started() {
            return Err(NetError::RequestAlreadyStarted);
        }
        Ok(state)
    }

    /// Replace any existing values of a request header.
    pub fn set_header(&self, name: &str, value: &str) -> Result<(), NetError> {
        let (name, value) = parse_header(name, value)?;
        self.configurable()?.headers.insert(name, value);
        Ok(())
    }

    /// Append a request header value.
    pub fn add_header(&self, name: &str, value: &str) -> Result<(), NetError> {
        let (name, value) = parse_header(name, value)?;
        self.configurable()?.headers.append(name, value);
        Ok(())
    }

    pub fn request_header(&self, name: &str) -> Option<String> {
        self.inner
            .lock_state()
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Follow 3xx responses (on by default). When off, the first redirect is
    /// the response.
    pub fn set_follow_redirects(&self, follow: bool) -> Result<(), NetError> {
        self.configurable()?.follow_redirects = follow;
        Ok(())
    }

    /// Declare the exact body length up front; no chunked transfer.
    pub fn set_fixed_length_streaming(&self, len: u64) -> Result<(), NetError> {
        self.configurable()?.fixed_length = Some(len);
        Ok(())
    }

    pub fn fixed_length(&self) -> Option<u64> {
        self.inner.lock_state().fixed_length
    }

    /// Append to the request body. Writing past a declared fixed length
    /// fails with `ContentLengthMismatch`.
    pub fn write_body(&self, data: &[u8]) -> Result<(), NetError> {
        let mut state = self.configurable()?;
        if let Some(limit) = state.fixed_length {
            if (state.body.len() + data.len()) as u64 > limit {
                return Err(NetError::ContentLengthMismatch);
            }
        }
        state.body.extend_from_slice(data);
        Ok(())
    }

    /// Bytes written so far.
    pub fn body_len(&self) -> usize {
        self.inner.lock_state().body.len()
    }

    /// Run the exchange (once) and return the response.
    ///
    /// Later calls, and calls through clones, observe the same outcome.
    pub async fn response(&self) -> Result<&HttpResponse, NetError> {
        self.inner
            .outcome
            .get_or_init(|| self.inner.execute())
            .await
            .as_ref()
            .map_err(Clone::clone)
    }

    /// The response, if the exchange already completed successfully.
    /// Never starts the exchange.
    pub fn completed_response(&self) -> Option<&HttpResponse> {
        self.inner.outcome.get().and_then(|r| r.as_ref().ok())
    }

    /// Abort in-flight I/O and release the connection. Returns true for the
    /// call that actually closed it.
    pub fn disconnect(&self) -> bool {
        self.inner.close()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.abort.cancel();
        self.lock_state().load_state = LoadState::Closed;
        self.transport.release(&self.url);
        tracing::trace!(id = self.id, "connection closed");
        true
    }

    fn build_request(&self) -> Result<(HttpRequest, bool), NetError> {
        let mut state = self.lock_state();
        if let Some(expected) = state.fixed_length {
            if state.body.len() as u64 != expected {
                return Err(NetError::ContentLengthMismatch);
            }
        }
        state.load_state = LoadState::SendingRequest;

        let mut request = HttpRequest::new(self.method.clone(), self.url.clone());
        request.headers = state.headers.clone();
        if !state.body.is_empty() {
            request.body = RequestBody::Bytes(Bytes::copy_from_slice(&state.body));
        }
        Ok((request, state.follow_redirects))
    }

    async fn execute(&self) -> Result<HttpResponse, NetError> {
        if self.abort.is_cancelled() {
            return Err(NetError::ConnectionAborted);
        }
        let (mut request, follow) = self.build_request()?;

        // A caller-chosen Accept-Encoding means the caller wants raw bytes.
        if request.headers.contains_key(ACCEPT_ENCODING) {
            request.decode_body = false;
        } else {
            let accept = self.transport.decode_support().accept_encoding();
            request
                .headers
                .insert(ACCEPT_ENCODING, HeaderValue::from_static(accept));
        }
        if let Some(agent) = &self.options.user_agent {
            if !request.headers.contains_key(USER_AGENT) {
                request.headers.insert(USER_AGENT, agent.clone());
            }
        }

        let job = RedirectJob::new(Arc::clone(&self.transport))
            .max_redirects(self.options.max_redirects)
            .follow(follow);

        let result = tokio::select! {
            biased;
            _ = self.abort.cancelled() => Err(NetError::ConnectionAborted),
            r = job.run(request) => r,
        };

        if let Err(e) = &result {
            tracing::debug!(id = self.id, url = %self.url, error = %e, "exchange failed");
        }
        let mut state = self.lock_state();
        if state.load_state != LoadState::Closed {
            state.load_state = LoadState::Completed;
        }
        result
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.close();
    }
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), NetError> {
    let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| NetError::InvalidArgument)?;
    let value = HeaderValue::from_str(value).map_err(|_| NetError::InvalidArgument)?;
    Ok((name, value))
}
