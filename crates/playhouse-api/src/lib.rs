// playhouse-api: Async Rust client for Hue-style lighting bridges (REST, Touchlink, discovery)

pub mod bridge;
pub mod description;
pub mod discovery;
pub mod error;
pub mod fanout;
pub mod state;
pub mod touchlink;
pub mod transport;

pub use bridge::{Bridge, BridgeConfig, BridgeInfo, BridgeOptions, LightRecord, NewLights};
pub use discovery::{DiscoveryConfig, discover};
pub use error::{ApiErrorKind, Error};
pub use fanout::{Settled, settle};
pub use state::{Alert, ColorMode, Effect, LightState, Rgb};
pub use touchlink::{ResetBulb, TouchlinkConfig};
pub use transport::TransportConfig;
