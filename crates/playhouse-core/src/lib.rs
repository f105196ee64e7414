// playhouse-core: Coordinate light grid over many bridges, with self-healing reachability.

pub mod config;
pub mod error;
pub mod grid;
pub mod monitor;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{GridConfig, MonitorConfig};
pub use error::CoreError;
pub use grid::{Cell, Coord, GridSnapshot, Layout, LightGrid};
pub use monitor::{CycleReport, MonitorStatus, ReachabilityMonitor};

// Wire-level types consumers need alongside the grid.
pub use playhouse_api::{Bridge, BridgeOptions, DiscoveryConfig, LightState, Rgb};
