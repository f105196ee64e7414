// Bridge discovery
//
// Two candidate sources run side by side: an SSDP M-SEARCH on the local
// segment and the vendor's remote lookup service. Neither is trusted;
// every candidate address goes through the normal bridge identity check.

use std::collections::{BTreeSet, HashSet};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use crate::bridge::models::LookupEntry;
use crate::bridge::{Bridge, BridgeOptions};
use crate::error::Error;
use crate::fanout::settle;

/// Standard SSDP multicast group and port.
pub const SSDP_ADDR: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(239, 255, 255, 250), 1900);

const M_SEARCH: &str = "M-SEARCH * HTTP/1.1\r\n\
    HOST: 239.255.255.250:1900\r\n\
    MAN: \"ssdp:discover\"\r\n\
    ST: my:test\r\n\
    MX: 3\r\n\r\n";

/// Sends per attempt; UDP may drop one.
const SENDS_PER_ATTEMPT: usize = 2;

pub const DEFAULT_LOOKUP_URL: &str = "https://discovery.meethue.com/";

/// Discovery tuning.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// M-SEARCH rounds. `0` disables SSDP.
    pub attempts: u32,
    /// Where M-SEARCH datagrams go.
    pub ssdp_addr: SocketAddr,
    /// A round ends once no datagram arrived for this long.
    pub idle_window: Duration,
    /// Remote lookup endpoint. `None` disables it.
    pub lookup_url: Option<Url>,
    pub lookup_timeout: Duration,
    /// Options for validating candidates.
    pub bridge: BridgeOptions,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            attempts: 2,
            ssdp_addr: SocketAddr::V4(SSDP_ADDR),
            idle_window: Duration::from_secs(2),
            lookup_url: Url::parse(DEFAULT_LOOKUP_URL).ok(),
            lookup_timeout: Duration::from_secs(5),
            bridge: BridgeOptions::default(),
        }
    }
}

/// Find every bridge reachable from this host.
///
/// The result holds one verified, unauthenticated [`Bridge`] per serial.
/// Candidates that fail validation are dropped.
pub async fn discover(config: &DiscoveryConfig) -> Vec<Bridge> {
    let candidates = candidate_addresses(config).await;
    debug!(count = candidates.len(), "validating discovery candidates");

    let settled = settle(candidates.into_iter().map(|address| {
        let options = config.bridge.clone();
        let key = address.clone();
        (key, async move { Bridge::connect(&address, None, options).await })
    }))
    .await;
    for (address, err) in &settled.errors {
        debug!(address, error = %err, "candidate is not a bridge");
    }

    // Sorted by address so the survivor per serial is deterministic.
    let mut found: Vec<(String, Bridge)> = settled.results.into_iter().collect();
    found.sort_by(|a, b| a.0.cmp(&b.0));
    let mut seen = HashSet::new();
    let bridges: Vec<Bridge> = found
        .into_iter()
        .filter_map(|(_, bridge)| seen.insert(bridge.serial().to_owned()).then_some(bridge))
        .collect();

    info!(count = bridges.len(), "discovery finished");
    bridges
}

/// Union of SSDP responders and remote lookup entries, deduplicated.
pub async fn candidate_addresses(config: &DiscoveryConfig) -> BTreeSet<String> {
    let (ssdp, lookup) = tokio::join!(ssdp_search(config), remote_lookup(config));

    let mut candidates = BTreeSet::new();
    match ssdp {
        Ok(ips) => candidates.extend(ips.into_iter().map(|ip| ip.to_string())),
        Err(e) => warn!(error = %e, "SSDP search failed"),
    }
    match lookup {
        Ok(addresses) => candidates.extend(addresses),
        Err(e) => warn!(error = %e, "remote bridge lookup failed"),
    }
    candidates
}

/// Multicast M-SEARCH and collect responder IPs.
pub async fn ssdp_search(config: &DiscoveryConfig) -> Result<HashSet<IpAddr>, Error> {
    let mut responders = HashSet::new();
    if config.attempts == 0 {
        return Ok(responders);
    }

    let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))).await?;
    socket.set_multicast_ttl_v4(2)?;

    let mut buf = [0_u8; 1024];
    for attempt in 1..=config.attempts {
        debug!(attempt, "sending M-SEARCH");
        for _ in 0..SENDS_PER_ATTEMPT {
            socket.send_to(M_SEARCH.as_bytes(), config.ssdp_addr).await?;
        }

        // Each datagram restarts the idle window.
        loop {
            match timeout(config.idle_window, socket.recv_from(&mut buf)).await {
                Ok(Ok((_, from))) => {
                    debug!(%from, "SSDP response");
                    responders.insert(from.ip());
                }
                Ok(Err(e)) => {
                    debug!(error = %e, "SSDP receive failed");
                    break;
                }
                Err(_) => break,
            }
        }
    }
    Ok(responders)
}

/// Ask the remote lookup service for bridges registered from this network.
pub async fn remote_lookup(config: &DiscoveryConfig) -> Result<Vec<String>, Error> {
    let Some(url) = config.lookup_url.clone() else {
        return Ok(Vec::new());
    };
    let http = config
        .bridge
        .transport
        .clone()
        .with_timeout(config.lookup_timeout)
        .build_client()?;

    debug!(%url, "remote bridge lookup");
    let resp = http.get(url.clone()).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    let body = resp.text().await?;
    let entries: Vec<LookupEntry> =
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: body.clone(),
        })?;

    let unique: BTreeSet<String> = entries.into_iter().map(|e| e.internalipaddress).collect();
    Ok(unique.into_iter().collect())
}
