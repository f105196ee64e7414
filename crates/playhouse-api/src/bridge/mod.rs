// Bridge HTTP client
//
// One `Bridge` per physical hub. Construction goes through the identity
// check in `client.rs`; endpoint groups live in sibling files as inherent
// methods so this module only holds state and readers.

mod client;
mod config;
mod lights;
pub mod models;

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use secrecy::SecretString;
use url::Url;

use crate::state::LightState;
use crate::touchlink::TouchlinkConfig;
use crate::transport::TransportConfig;

pub use models::{BridgeConfig, LightRecord, NewLights};

/// Construction options for a [`Bridge`].
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub transport: TransportConfig,
    /// Attributes overlaid under every command (explicit values win).
    pub defaults: LightState,
    pub touchlink: TouchlinkConfig,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            defaults: LightState {
                transitiontime: Some(0),
                ..LightState::default()
            },
            touchlink: TouchlinkConfig::default(),
        }
    }
}

/// Metadata captured by the last successful refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeInfo {
    pub authorized: bool,
    pub name: Option<String>,
    pub mac: Option<String>,
    pub ipaddress: Option<String>,
    pub gateway: Option<String>,
    pub netmask: Option<String>,
}

/// Client for a single verified bridge.
///
/// All mutable state sits behind short-lived std locks; none is held
/// across an `.await`, so a `Bridge` can be shared as `Arc<Bridge>`
/// between the grid, the monitor and request handlers.
pub struct Bridge {
    http: reqwest::Client,
    base_url: Url,
    address: String,
    serial: String,
    touchlink: TouchlinkConfig,
    credential: RwLock<Option<SecretString>>,
    defaults: RwLock<LightState>,
    info: RwLock<BridgeInfo>,
    /// Last known persistent attributes per light id.
    lights: Mutex<HashMap<u32, LightState>>,
    /// Group id → member light ids.
    groups: RwLock<HashMap<u32, Vec<u32>>>,
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("address", &self.address)
            .field("serial", &self.serial)
            .field("authorized", &self.is_authorized())
            .finish_non_exhaustive()
    }
}

impl Bridge {
    /// Network address as given at construction (`host` or `host:port`).
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Serial number from the bridge's device description.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// The configured username, if any.
    pub fn credential(&self) -> Option<SecretString> {
        self.credential
            .read()
            .expect("credential lock poisoned")
            .clone()
    }

    /// `true` only after an authenticated refresh succeeded.
    pub fn is_authorized(&self) -> bool {
        self.info.read().expect("info lock poisoned").authorized
    }

    pub fn info(&self) -> BridgeInfo {
        self.info.read().expect("info lock poisoned").clone()
    }

    pub fn defaults(&self) -> LightState {
        self.defaults.read().expect("defaults lock poisoned").clone()
    }

    /// Replace the default attribute overlay.
    pub fn set_defaults(&self, defaults: LightState) {
        *self.defaults.write().expect("defaults lock poisoned") = defaults;
    }

    /// Cached attributes of one light, as last confirmed by the bridge.
    pub fn cached_light(&self, id: u32) -> Option<LightState> {
        self.lights
            .lock()
            .expect("light cache lock poisoned")
            .get(&id)
            .cloned()
    }

    /// Known light ids, sorted.
    pub fn light_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .lights
            .lock()
            .expect("light cache lock poisoned")
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Member light ids of a group. Group 0 is every light on the bridge.
    pub fn group_members(&self, group: u32) -> Vec<u32> {
        if group == 0 {
            return self.light_ids();
        }
        self.groups
            .read()
            .expect("group lock poisoned")
            .get(&group)
            .cloned()
            .unwrap_or_default()
    }
}
