use crate::base::neterror::NetError;
use crate::http::decode::DecodeSupport;
use crate::http::streamfactory::HttpStreamFactory;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{Transport, TransportMode};
use futures::future::{BoxFuture, FutureExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Baseline URL connection: a new socket for every exchange, no cache, no
/// pooling, no migration. Only gzip responses are decoded.
#[derive(Clone, Default)]
pub struct LegacyTransport {
    factory: HttpStreamFactory,
    connections_opened: Arc<AtomicUsize>,
}

impl std::fmt::Debug for LegacyTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LegacyTransport")
            .field("connections_opened", &self.connections_opened())
            .finish()
    }
}

impl LegacyTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connections_opened(&self) -> usize {
        self.connections_opened.load(Ordering::Relaxed)
    }
}

impl Transport for LegacyTransport {
    fn mode(&self) -> TransportMode {
        TransportMode::Legacy
    }

    fn decode_support(&self) -> DecodeSupport {
        DecodeSupport::BASELINE
    }

    fn exchange(&self, request: HttpRequest) -> BoxFuture<'static, Result<HttpResponse, NetError>> {
        let factory = self.factory.clone();
        let opened = Arc::clone(&self.connections_opened);
        async move {
            let mut stream = factory.create_stream(&request.url).await?;
            opened.fetch_add(1, Ordering::Relaxed);
            let resp = stream.send_request(request.to_hyper()?).await?;
            let decode = request.decode_body.then_some(DecodeSupport::BASELINE);
            // The stream drops here, which closes the socket.
            HttpResponse::collect(resp, request.url, decode).await
        }
        .boxed()
    }
}
