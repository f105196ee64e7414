// ── Reachability monitor ──
//
// Periodically probes every registered bridge, evicts the ones that keep
// failing, and tries to bring evicted bridges back through discovery
// (a rebooted bridge often comes back on a new address).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use playhouse_api::{DiscoveryConfig, discover, settle};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::grid::LightGrid;

/// Observable monitor state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorStatus {
    pub last_cycle: Option<DateTime<Utc>>,
    /// Current consecutive failures per serial; absent means zero.
    pub strikes: HashMap<String, u32>,
    pub evicted_total: u64,
}

/// Outcome of one monitor cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub probed: usize,
    pub evicted: Vec<String>,
    pub readded: Vec<String>,
}

pub struct ReachabilityMonitor {
    grid: LightGrid,
    config: MonitorConfig,
    discovery: DiscoveryConfig,
    strikes: Mutex<HashMap<String, u32>>,
    status: watch::Sender<MonitorStatus>,
}

/// Floor for the cycle period; a zero interval would stop the timer.
const MIN_INTERVAL: Duration = Duration::from_millis(10);

impl ReachabilityMonitor {
    /// Rediscovered bridges are connected with the grid's own bridge
    /// options, whatever `discovery.bridge` says.
    pub fn new(grid: LightGrid, mut config: MonitorConfig, mut discovery: DiscoveryConfig) -> Self {
        if config.interval < MIN_INTERVAL {
            warn!(interval = ?config.interval, min = ?MIN_INTERVAL, "monitor interval raised");
            config.interval = MIN_INTERVAL;
        }
        if config.max_strikes == 0 {
            warn!("max_strikes of 0 treated as 1");
            config.max_strikes = 1;
        }
        discovery.bridge = grid.config().bridge.clone();
        let (status, _) = watch::channel(MonitorStatus::default());
        Self {
            grid,
            config,
            discovery,
            strikes: Mutex::new(HashMap::new()),
            status,
        }
    }

    pub fn status(&self) -> watch::Receiver<MonitorStatus> {
        self.status.subscribe()
    }

    /// Run cycles on the configured interval until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval);
            interval.tick().await; // consume the immediate first tick
            info!(interval = ?self.config.interval, "reachability monitor started");

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let report = self.run_cycle().await;
                        debug!(
                            probed = report.probed,
                            evicted = report.evicted.len(),
                            readded = report.readded.len(),
                            "reachability cycle"
                        );
                    }
                }
            }
            info!("reachability monitor stopped");
        })
    }

    /// Probe every bridge once and apply evictions and rediscovery.
    pub async fn run_cycle(&self) -> CycleReport {
        let bridges = self.grid.bridges();
        let timeout = self.config.probe_timeout;
        let settled = settle(bridges.iter().map(|bridge| {
            let bridge = Arc::clone(bridge);
            (bridge.serial().to_owned(), async move {
                bridge.probe(timeout).await
            })
        }))
        .await;

        let mut evicted = Vec::new();
        {
            let mut strikes = self.strikes.lock().expect("strike lock poisoned");
            // Bridges removed by someone else take their counters with them.
            strikes.retain(|serial, _| bridges.iter().any(|b| b.serial() == serial));
            for serial in settled.results.keys() {
                strikes.remove(serial);
            }
            for (serial, err) in &settled.errors {
                let count = strikes.entry(serial.clone()).or_insert(0);
                *count += 1;
                debug!(serial, strikes = *count, error = %err, "probe failed");
                if *count >= self.config.max_strikes {
                    evicted.push(serial.clone());
                }
            }
            for serial in &evicted {
                strikes.remove(serial);
            }
        }
        evicted.sort();

        for serial in &evicted {
            warn!(serial, "bridge unreachable, evicting");
            self.grid.remove_bridge(serial);
        }

        let readded = if evicted.is_empty() {
            Vec::new()
        } else {
            self.rediscover(&evicted).await
        };

        let strikes = self.strikes.lock().expect("strike lock poisoned").clone();
        let evicted_count = u64::try_from(evicted.len()).unwrap_or(u64::MAX);
        self.status.send_modify(|status| {
            status.last_cycle = Some(Utc::now());
            status.strikes = strikes;
            status.evicted_total = status.evicted_total.saturating_add(evicted_count);
        });

        CycleReport {
            probed: bridges.len(),
            evicted,
            readded,
        }
    }

    /// Run discovery once and re-add any evicted serial it finds.
    async fn rediscover(&self, evicted: &[String]) -> Vec<String> {
        let mut readded = Vec::new();
        for bridge in discover(&self.discovery).await {
            if !evicted.iter().any(|s| s == bridge.serial()) {
                continue;
            }
            let serial = bridge.serial().to_owned();
            match self.grid.insert_bridge(bridge).await {
                Ok(bridge) => {
                    info!(serial, address = bridge.address(), "evicted bridge rediscovered");
                    readded.push(serial);
                }
                Err(e) => warn!(serial, error = %e, "could not re-add rediscovered bridge"),
            }
        }
        readded.sort();
        readded
    }
}
