mod common;

use adaptnet::base::neterror::NetError;
use adaptnet::transport::{
    CapabilityPolicy, EngineConfig, MigrationOptions, StaticPlatform, TransportMode,
    TransportSelector,
};
use common::{ok, reset, response, response_bytes, TestServer};
use http::Method;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn brotli(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    {
        let mut writer = brotli::CompressorWriter::new(&mut out, 4096, 5, 22);
        writer.write_all(data).unwrap();
    }
    out
}

#[tokio::test]
async fn test_legacy_below_thresholds() {
    let server = TestServer::start(|_| ok("legacy")).await;
    let selector = TransportSelector::new(StaticPlatform::new(30, 99));
    assert!(!selector.is_modern_available());
    assert_eq!(selector.mode(), TransportMode::Legacy);
    assert!(selector.engine().is_none());

    let conn = selector.open(&server.url("/"), Method::GET).unwrap();
    assert_eq!(conn.transport_mode(), TransportMode::Legacy);
    assert_eq!(conn.response().await.unwrap().text().unwrap(), "legacy");

    let requests = server.requests();
    assert_eq!(requests[0].header("accept-encoding"), Some("gzip"));
    assert!(requests[0]
        .header("user-agent")
        .is_some_and(|ua| ua.starts_with("adaptnet/")));
}

#[tokio::test]
async fn test_modern_decodes_brotli_responses() {
    let payload = b"{\"data\":{\"tiles\":[1,2,3]}}".to_vec();
    let encoded = brotli(&payload);
    let server = TestServer::start(move |_| {
        response_bytes("200 OK", &[("Content-Encoding", "br")], &encoded)
    })
    .await;

    let selector = TransportSelector::new(StaticPlatform::new(31, 7));
    assert_eq!(selector.mode(), TransportMode::Modern);

    let conn = selector.open(&server.url("/tiles"), Method::GET).unwrap();
    let response = conn.response().await.unwrap();
    assert_eq!(response.bytes().as_ref(), payload.as_slice());
    assert!(response.header("content-encoding").is_none());
    assert_eq!(
        server.requests()[0].header("accept-encoding"),
        Some("gzip, deflate, br")
    );
}

#[tokio::test]
async fn test_custom_policy_thresholds() {
    let selector = TransportSelector::new(StaticPlatform::new(28, 0))
        .policy(CapabilityPolicy::default().native_min_sdk(28));
    assert_eq!(selector.mode(), TransportMode::Modern);
}

#[tokio::test]
async fn test_engine_reuses_keep_alive_connections() {
    let server = TestServer::start(|_| ok("pooled")).await;
    let selector = TransportSelector::new(StaticPlatform::default());
    let url = server.url("/a");

    for _ in 0..3 {
        let conn = selector.open(&url, Method::GET).unwrap();
        assert_eq!(conn.response().await.unwrap().text().unwrap(), "pooled");
    }

    let engine = selector.engine().unwrap();
    assert_eq!(engine.connections_opened(), 1);
    assert_eq!(server.connection_count(), 1);
    assert_eq!(engine.idle_count(&url::Url::parse(&url).unwrap()), 1);
}

#[tokio::test]
async fn test_engine_does_not_pool_connection_close() {
    let server =
        TestServer::start(|_| response("200 OK", &[("Connection", "close")], "once")).await;
    let selector = TransportSelector::new(StaticPlatform::default());

    for _ in 0..2 {
        let conn = selector.open(&server.url("/"), Method::GET).unwrap();
        conn.response().await.unwrap();
    }
    assert_eq!(selector.engine().unwrap().connections_opened(), 2);
    assert_eq!(server.connection_count(), 2);
}

#[tokio::test]
async fn test_legacy_opens_a_socket_per_request() {
    let server = TestServer::start(|_| ok("fresh")).await;
    let selector = TransportSelector::new(StaticPlatform::new(21, 0));

    for _ in 0..2 {
        let conn = selector.open(&server.url("/"), Method::GET).unwrap();
        conn.response().await.unwrap();
    }
    assert_eq!(server.connection_count(), 2);
}

#[tokio::test]
async fn test_engine_serves_fresh_entries_from_disk_cache() {
    let server = TestServer::start(|_| {
        response("200 OK", &[("Cache-Control", "max-age=300")], "cached body")
    })
    .await;
    let root = tempfile::tempdir().unwrap();
    let selector = TransportSelector::new(StaticPlatform::default())
        .engine_config(EngineConfig::default().cache_root(root.path()));

    let first = selector.open(&server.url("/style"), Method::GET).unwrap();
    assert!(!first.response().await.unwrap().is_from_cache());

    let second = selector.open(&server.url("/style"), Method::GET).unwrap();
    let response = second.response().await.unwrap();
    assert!(response.is_from_cache());
    assert_eq!(response.text().unwrap(), "cached body");

    assert_eq!(server.requests().len(), 1);
    assert!(root.path().join("httpEngine").is_dir());
}

#[tokio::test]
async fn test_engine_revalidates_with_etag() {
    let server = TestServer::start(|request| {
        if request.header("if-none-match") == Some("\"v1\"") {
            response("304 Not Modified", &[("ETag", "\"v1\"")], "")
        } else {
            response("200 OK", &[("ETag", "\"v1\"")], "etagged")
        }
    })
    .await;
    let root = tempfile::tempdir().unwrap();
    let selector = TransportSelector::new(StaticPlatform::default())
        .engine_config(EngineConfig::default().cache_root(root.path()));

    let first = selector.open(&server.url("/doc"), Method::GET).unwrap();
    assert_eq!(first.response().await.unwrap().text().unwrap(), "etagged");

    let second = selector.open(&server.url("/doc"), Method::GET).unwrap();
    let response = second.response().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().unwrap(), "etagged");

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].header("if-none-match"), Some("\"v1\""));
}

#[tokio::test]
async fn test_redirects_followed_by_default() {
    let server = TestServer::start(|request| match request.path.as_str() {
        "/start" => response("302 Found", &[("Location", "/target")], ""),
        _ => ok("target"),
    })
    .await;
    let selector = TransportSelector::new(StaticPlatform::new(21, 0));

    let conn = selector.open(&server.url("/start"), Method::GET).unwrap();
    let response = conn.response().await.unwrap();
    assert_eq!(response.url().path(), "/target");
    assert_eq!(response.text().unwrap(), "target");
}

#[tokio::test]
async fn test_redirect_limit() {
    let server =
        TestServer::start(|_| response("302 Found", &[("Location", "/loop")], "")).await;
    let selector = TransportSelector::new(StaticPlatform::new(21, 0)).max_redirects(3);

    let conn = selector.open(&server.url("/loop"), Method::GET).unwrap();
    assert_eq!(conn.response().await.unwrap_err(), NetError::TooManyRedirects);
    assert_eq!(server.requests().len(), 4);
}

#[tokio::test]
async fn test_unreachable_host_is_connection_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/", listener.local_addr().unwrap());
    drop(listener);

    let selector = TransportSelector::new(StaticPlatform::new(21, 0));
    let conn = selector.open(&url, Method::GET).unwrap();
    assert!(conn.response().await.is_err());
}

#[test]
fn test_disallowed_schemes_rejected_at_open() {
    let selector = TransportSelector::new(StaticPlatform::new(21, 0));
    assert_eq!(
        selector.open("ftp://example.com/", Method::GET).unwrap_err(),
        NetError::DisallowedUrlScheme
    );
    assert_eq!(
        selector.open("not a url", Method::GET).unwrap_err(),
        NetError::InvalidUrl
    );
}

#[tokio::test]
async fn test_engine_shares_cache_per_directory() {
    let server = TestServer::start(|_| {
        response("200 OK", &[("Cache-Control", "max-age=300")], "shared")
    })
    .await;
    let root = tempfile::tempdir().unwrap();
    let first = TransportSelector::new(StaticPlatform::default())
        .engine_config(EngineConfig::default().cache_root(root.path()));
    let second = TransportSelector::new(StaticPlatform::default())
        .engine_config(EngineConfig::default().cache_root(root.path()));

    let conn = first.open(&server.url("/shared"), Method::GET).unwrap();
    conn.response().await.unwrap();
    let conn = second.open(&server.url("/shared"), Method::GET).unwrap();
    assert!(conn.response().await.unwrap().is_from_cache());

    let a = first.engine().unwrap().cache().unwrap();
    let b = second.engine().unwrap().cache().unwrap();
    assert!(std::ptr::eq(a, b));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_fresh_connection_reset_retries_get_once() {
    let server = TestServer::start(|request| {
        if request.connection == 0 {
            reset()
        } else {
            ok("recovered")
        }
    })
    .await;
    let selector = TransportSelector::new(StaticPlatform::default());

    let conn = selector.open(&server.url("/tiles"), Method::GET).unwrap();
    assert_eq!(conn.response().await.unwrap().text().unwrap(), "recovered");

    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].connection, 1);
    assert_eq!(selector.engine().unwrap().connections_opened(), 2);
}

#[tokio::test]
async fn test_dead_pooled_connection_retries_get_on_fresh_one() {
    let served = Arc::new(AtomicUsize::new(0));
    let server = TestServer::start(move |request| {
        let n = served.fetch_add(1, Ordering::SeqCst);
        if request.connection == 0 && n == 1 {
            reset()
        } else {
            ok("fine")
        }
    })
    .await;
    let selector = TransportSelector::new(StaticPlatform::default());
    let url = server.url("/a");

    for _ in 0..2 {
        let conn = selector.open(&url, Method::GET).unwrap();
        assert_eq!(conn.response().await.unwrap().text().unwrap(), "fine");
    }

    let connections: Vec<usize> = server.requests().iter().map(|r| r.connection).collect();
    assert_eq!(connections, vec![0, 0, 1]);
}

#[tokio::test]
async fn test_post_is_not_replayed_after_reset() {
    let server = TestServer::start(|_| reset()).await;
    let selector = TransportSelector::new(StaticPlatform::default());

    let conn = selector.open(&server.url("/graphql"), Method::POST).unwrap();
    conn.write_body(br#"{"query":"mutation { save }"}"#).unwrap();
    let err = conn.response().await.unwrap_err();
    assert!(err.is_connection_error(), "{err:?}");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
}

#[tokio::test]
async fn test_pooled_post_is_not_replayed_after_reset() {
    let served = Arc::new(AtomicUsize::new(0));
    let server = TestServer::start(move |_| {
        if served.fetch_add(1, Ordering::SeqCst) == 1 {
            reset()
        } else {
            ok("{}")
        }
    })
    .await;
    let selector = TransportSelector::new(StaticPlatform::default());
    let url = server.url("/graphql");

    let warm = selector.open(&url, Method::GET).unwrap();
    warm.response().await.unwrap();

    let conn = selector.open(&url, Method::POST).unwrap();
    conn.write_body(b"{}").unwrap();
    assert!(conn.response().await.is_err());
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn test_disabled_migration_surfaces_reset() {
    let server = TestServer::start(|request| {
        if request.connection == 0 {
            reset()
        } else {
            ok("unreachable")
        }
    })
    .await;
    let selector = TransportSelector::new(StaticPlatform::default()).engine_config(
        EngineConfig::default().migration(MigrationOptions::disabled()),
    );

    let conn = selector.open(&server.url("/"), Method::GET).unwrap();
    assert!(conn.response().await.is_err());
    assert_eq!(server.requests().len(), 1);
    assert_eq!(server.connection_count(), 1);
}
