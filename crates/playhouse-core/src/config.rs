// ── Runtime grid configuration ──
//
// These types describe how the grid and its monitor behave. They never
// touch disk; `playhouse-config` builds them from settings files.

use std::time::Duration;

use playhouse_api::BridgeOptions;

/// Grid behavior.
#[derive(Debug, Clone, Default)]
pub struct GridConfig {
    /// When `false`, every `set_state` commits immediately.
    pub buffered: bool,
    /// Options for every bridge the grid connects to itself.
    pub bridge: BridgeOptions,
}

/// Reachability monitor tuning.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub interval: Duration,
    pub probe_timeout: Duration,
    /// Consecutive failed probes before a bridge is evicted.
    pub max_strikes: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(2),
            max_strikes: 3,
        }
    }
}
