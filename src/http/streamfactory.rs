use crate::base::neterror::NetError;
use crate::socket::connectjob::ConnectJob;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::spawn;
use url::Url;

/// Wraps an HTTP/1.1 connection ready to carry requests.
/// Equivalent to net::HttpStream.
pub struct HttpStream {
    sender: http1::SendRequest<Full<Bytes>>,
    reused: bool,
}

/// A failed exchange on one stream.
#[derive(Debug)]
pub struct SendFailure {
    pub error: NetError,
    /// False when the connection gave the request back before writing it.
    pub request_sent: bool,
}

impl From<NetError> for SendFailure {
    fn from(error: NetError) -> Self {
        Self {
            error,
            request_sent: true,
        }
    }
}

impl From<SendFailure> for NetError {
    fn from(failure: SendFailure) -> Self {
        failure.error
    }
}

impl HttpStream {
    pub async fn send_request(
        &mut self,
        req: Request<Full<Bytes>>,
    ) -> Result<Response<Incoming>, SendFailure> {
        let reused = self.reused;
        // A pooled connection may have died while idle; nothing was written.
        self.sender.ready().await.map_err(|e| SendFailure {
            error: NetError::from_hyper(&e),
            request_sent: false,
        })?;
        self.sender.try_send_request(req).await.map_err(|mut e| {
            let request_sent = e.take_message().is_none();
            tracing::debug!(error = %e.error(), reused, request_sent, "request failed");
            SendFailure {
                error: NetError::from_hyper(e.error()),
                request_sent,
            }
        })
    }

    /// True if this stream carried an earlier request.
    pub fn is_reused(&self) -> bool {
        self.reused
    }

    pub fn mark_reused(&mut self) {
        self.reused = true;
    }

    /// False once the peer or the driver task has closed the connection.
    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Opens HTTP/1.1 streams over freshly connected sockets.
#[derive(Clone, Default)]
pub struct HttpStreamFactory {
    connect_job: ConnectJob,
}

impl HttpStreamFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_stream(&self, url: &Url) -> Result<HttpStream, NetError> {
        // 1. Get raw socket
        let socket = self.connect_job.connect(url).await?;

        // 2. Handshake
        let io = TokioIo::new(socket);
        let (sender, conn) = http1::handshake(io)
            .await
            .map_err(|_| NetError::ConnectionFailed)?;

        // 3. Spawn the connection driver; it ends when every sender is dropped
        spawn(async move {
            if let Err(e) = conn.await {
                tracing::trace!(error = %e, "connection driver ended");
            }
        });

        Ok(HttpStream {
            sender,
            reused: false,
        })
    }
}
