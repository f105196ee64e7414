#![allow(clippy::unwrap_used)]
// Discovery through the remote lookup path, and the SSDP round timing
// against a loopback responder.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;

use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use playhouse_api::discovery::{candidate_addresses, ssdp_search};
use playhouse_api::{DiscoveryConfig, discover};

async fn fake_bridge(serial: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/none/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Philips hue"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/description.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "<root><device><modelDescription>Philips hue Personal Wireless Lighting\
             </modelDescription><serialNumber>{serial}</serialNumber></device></root>"
        )))
        .mount(&server)
        .await;
    server
}

async fn lookup_service(addresses: &[String]) -> MockServer {
    let server = MockServer::start().await;
    let entries: Vec<_> = addresses
        .iter()
        .enumerate()
        .map(|(i, a)| json!({"id": format!("id{i}"), "internalipaddress": a}))
        .collect();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(entries))
        .mount(&server)
        .await;
    server
}

fn config_for(lookup: &MockServer) -> DiscoveryConfig {
    DiscoveryConfig {
        attempts: 0,
        lookup_url: Some(Url::parse(&format!("{}/", lookup.uri())).unwrap()),
        lookup_timeout: Duration::from_secs(2),
        ..DiscoveryConfig::default()
    }
}

#[tokio::test]
async fn test_discover_validates_and_dedupes_by_serial() {
    let first = fake_bridge("001788000001").await;
    let mirror = fake_bridge("001788000001").await;
    let second = fake_bridge("001788000002").await;
    let not_a_bridge = MockServer::start().await;

    let addresses: Vec<String> = [&first, &first, &mirror, &second, &not_a_bridge]
        .iter()
        .map(|s| s.address().to_string())
        .collect();
    let lookup = lookup_service(&addresses).await;

    let mut serials: Vec<String> = discover(&config_for(&lookup))
        .await
        .iter()
        .map(|b| b.serial().to_owned())
        .collect();
    serials.sort();

    assert_eq!(serials, vec!["001788000001", "001788000002"]);
}

#[tokio::test]
async fn test_lookup_failure_is_not_fatal() {
    let lookup = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&lookup)
        .await;

    let config = config_for(&lookup);
    assert!(candidate_addresses(&config).await.is_empty());
    assert!(discover(&config).await.is_empty());
}

#[tokio::test]
async fn test_candidates_are_deduplicated() {
    let addresses = vec!["10.0.0.2".to_owned(), "10.0.0.2".to_owned(), "10.0.0.3".to_owned()];
    let lookup = lookup_service(&addresses).await;

    let candidates = candidate_addresses(&config_for(&lookup)).await;

    assert_eq!(
        candidates.into_iter().collect::<Vec<_>>(),
        vec!["10.0.0.2".to_owned(), "10.0.0.3".to_owned()]
    );
}

/// Answers the first M-SEARCH it sees once from each of `from`, waiting
/// `gap` between replies.
async fn ssdp_responder(from: Vec<Ipv4Addr>, gap: Duration) -> SocketAddr {
    let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0_u8; 1024];
        let (len, searcher) = listener.recv_from(&mut buf).await.unwrap();
        assert!(buf[..len].starts_with(b"M-SEARCH"));
        for (i, ip) in from.into_iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(gap).await;
            }
            let socket = UdpSocket::bind((ip, 0)).await.unwrap();
            socket
                .send_to(b"HTTP/1.1 200 OK\r\nST: my:test\r\n\r\n", searcher)
                .await
                .unwrap();
        }
    });
    addr
}

#[tokio::test]
async fn test_ssdp_round_waits_out_a_burst_of_replies() {
    let responders = vec![
        Ipv4Addr::new(127, 0, 0, 1),
        Ipv4Addr::new(127, 0, 0, 2),
        Ipv4Addr::new(127, 0, 0, 3),
    ];
    let idle_window = Duration::from_millis(300);
    let gap = Duration::from_millis(150);
    let target = ssdp_responder(responders.clone(), gap).await;
    let config = DiscoveryConfig {
        attempts: 1,
        ssdp_addr: target,
        idle_window,
        lookup_url: None,
        ..DiscoveryConfig::default()
    };

    let started = Instant::now();
    let found = ssdp_search(&config).await.unwrap();
    let elapsed = started.elapsed();

    let expected: HashSet<IpAddr> = responders.into_iter().map(IpAddr::V4).collect();
    assert_eq!(found, expected);
    // Last reply lands two gaps in; the round closes one window after it.
    let last_reply = gap * 2;
    assert!(elapsed >= last_reply + idle_window, "ended early: {elapsed:?}");
    assert!(
        elapsed < last_reply + idle_window * 3,
        "ended late: {elapsed:?}"
    );
}

#[tokio::test]
async fn test_ssdp_silence_ends_round_after_one_window() {
    // Bound but never answers.
    let silent = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let config = DiscoveryConfig {
        attempts: 1,
        ssdp_addr: silent.local_addr().unwrap(),
        idle_window: Duration::from_millis(200),
        lookup_url: None,
        ..DiscoveryConfig::default()
    };

    let started = Instant::now();
    let found = ssdp_search(&config).await.unwrap();
    let elapsed = started.elapsed();

    assert!(found.is_empty());
    assert!(elapsed >= Duration::from_millis(200));
    assert!(elapsed < Duration::from_millis(800), "ended late: {elapsed:?}");
}
