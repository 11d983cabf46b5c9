use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::socket::client::SocketType;
use boring::ssl::{SslConnector, SslMethod};
use tokio::net::TcpStream;
use url::Url;

/// ALPN list: we only speak HTTP/1.1 on the wire.
const ALPN_HTTP11: &[u8] = b"\x08http/1.1";

/// Manages the connection process: DNS -> TCP -> SSL.
/// Roughly equivalent to net::ConnectJob.
#[derive(Clone)]
pub struct ConnectJob {
    tls: Option<SslConnector>,
}

impl Default for ConnectJob {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectJob {
    /// Build the shared TLS connector once; https connects fail with
    /// `SslProtocolError` if BoringSSL could not be initialised.
    pub fn new() -> Self {
        let tls = SslConnector::builder(SslMethod::tls())
            .and_then(|mut builder| {
                builder.set_alpn_protos(ALPN_HTTP11)?;
                Ok(builder.build())
            })
            .map_err(|e| tracing::warn!(error = %e, "TLS connector unavailable"))
            .ok();
        Self { tls }
    }

    pub async fn connect(&self, url: &Url) -> Result<SocketType, NetError> {
        let host = url.host_str().ok_or(NetError::InvalidUrl)?;
        let port = url.port_or_known_default().ok_or(NetError::InvalidUrl)?;

        match url.scheme() {
            "http" | "https" => {}
            _ => return Err(NetError::DisallowedUrlScheme),
        }

        // 1. DNS Resolution
        let addrs: Vec<_> = tokio::net::lookup_host((host, port))
            .await
            .dns_context(host)?
            .collect();
        if addrs.is_empty() {
            return Err(NetError::NameNotResolved);
        }

        // 2. TCP Connect, trying each resolved address in order
        let mut last_err = None;
        let mut stream = None;
        for addr in addrs {
            match TcpStream::connect(addr).await {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }
        let stream = match (stream, last_err) {
            (Some(s), _) => s,
            (None, Some(e)) => return Err(e).connection_context(host, port),
            (None, None) => return Err(NetError::ConnectionFailed),
        };
        let _ = stream.set_nodelay(true);

        tracing::trace!(%host, port, "tcp connected");

        // 3. SSL Handshake (if https)
        if url.scheme() == "https" {
            let connector = self.tls.as_ref().ok_or(NetError::SslProtocolError)?;
            let config = connector
                .configure()
                .map_err(|_| NetError::SslProtocolError)?;

            let tls_stream = tokio_boring::connect(config, host, stream)
                .await
                .map_err(|e| {
                    tracing::debug!(%host, error = ?e, "SSL handshake failed");
                    NetError::SslProtocolError
                })?;

            Ok(SocketType::Ssl(tls_stream))
        } else {
            Ok(SocketType::Tcp(stream))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_non_http_scheme() {
        let job = ConnectJob::new();
        let url = Url::parse("ftp://127.0.0.1/file").unwrap();
        assert_eq!(
            job.connect(&url).await.unwrap_err(),
            NetError::DisallowedUrlScheme
        );
    }

    #[tokio::test]
    async fn test_plain_tcp_connect() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let url = Url::parse(&format!("http://{}/", addr)).unwrap();
        let socket = ConnectJob::new().connect(&url).await.unwrap();
        assert!(!socket.is_tls());
    }

    #[tokio::test]
    async fn test_refused_connection() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{}/", addr)).unwrap();
        assert!(ConnectJob::new().connect(&url).await.is_err());
    }
}
