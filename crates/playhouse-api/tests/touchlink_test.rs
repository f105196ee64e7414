#![allow(clippy::unwrap_used)]
// Integration tests for the Touchlink line protocol against a fake TCP endpoint.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use playhouse_api::touchlink::{ResetBulb, TouchlinkConfig, reset_nearby_bulb};
use playhouse_api::Error;

// ── Helpers ─────────────────────────────────────────────────────────

/// Accepts one connection, records the first line and replies with `replies`.
/// `None` in place of a reply means "go silent and hold the socket open".
async fn fake_endpoint(replies: Vec<Option<&'static str>>) -> (TouchlinkConfig, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut stream = BufReader::new(stream);
        let mut received = String::new();
        stream.read_line(&mut received).await.unwrap();

        for reply in replies {
            match reply {
                Some(line) => {
                    stream.get_mut().write_all(line.as_bytes()).await.unwrap();
                    stream.get_mut().write_all(b"\n").await.unwrap();
                }
                None => tokio::time::sleep(Duration::from_secs(5)).await,
            }
        }
        received
    });

    let config = TouchlinkConfig {
        port,
        step_timeout: Duration::from_millis(500),
        result_timeout: Duration::from_secs(1),
    };
    (config, handle)
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_reset_success_returns_address_pair() {
    let (config, server) = fake_endpoint(vec![
        Some("[Link,Touchlink]"),
        Some("[Link,Touchlink,success,NwkAddr=AB12,pan=CD34]"),
    ])
    .await;

    let bulb = reset_nearby_bulb("127.0.0.1", &config).await.unwrap();

    assert_eq!(
        bulb,
        ResetBulb {
            nwk_addr: "AB12".into(),
            pan: "CD34".into(),
        }
    );
    assert_eq!(server.await.unwrap(), "[Link,Touchlink]\n");
}

#[tokio::test]
async fn test_echo_mismatch_is_not_completed() {
    let (config, _server) = fake_endpoint(vec![Some("[Link,Other]")]).await;

    let err = reset_nearby_bulb("127.0.0.1", &config).await.unwrap_err();

    assert!(
        matches!(err, Error::ResetNotCompleted { .. }),
        "expected ResetNotCompleted, got: {err:?}"
    );
}

#[tokio::test]
async fn test_failed_result_is_not_completed() {
    let (config, _server) =
        fake_endpoint(vec![Some("[Link,Touchlink]"), Some("[Link,Touchlink,failed]")]).await;

    let err = reset_nearby_bulb("127.0.0.1", &config).await.unwrap_err();

    assert!(matches!(err, Error::ResetNotCompleted { .. }));
}

#[tokio::test]
async fn test_silent_bridge_times_out() {
    let (config, _server) = fake_endpoint(vec![Some("[Link,Touchlink]"), None]).await;

    let started = std::time::Instant::now();
    let err = reset_nearby_bulb("127.0.0.1", &config).await.unwrap_err();

    assert!(matches!(err, Error::ResetNotCompleted { .. }));
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_closed_connection_is_not_completed() {
    let (config, _server) = fake_endpoint(vec![]).await;

    let err = reset_nearby_bulb("127.0.0.1", &config).await.unwrap_err();

    assert!(matches!(err, Error::ResetNotCompleted { .. }));
}

#[tokio::test]
async fn test_refused_connection_is_not_completed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let config = TouchlinkConfig {
        port,
        ..TouchlinkConfig::default()
    };

    let err = reset_nearby_bulb("127.0.0.1", &config).await.unwrap_err();

    assert!(matches!(err, Error::ResetNotCompleted { .. }));
}
