// Bridge API response types
//
// Serde models for the JSON documents the bridge returns. Field sets vary
// by firmware, so everything beyond what the client reads is optional.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::state::LightState;

/// One element of the list a bridge returns for writes and errors.
#[derive(Debug, Deserialize)]
pub(crate) struct ResponseItem {
    #[serde(default)]
    pub success: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<ErrorItem>,
}

/// `{"type": 1, "address": "/", "description": "unauthorized user"}`
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorItem {
    #[serde(rename = "type")]
    pub kind: u16,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub description: String,
}

/// Bridge configuration as returned by `/api/{username}/config`.
///
/// Without a valid username only `name` and a few version fields are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub ipaddress: Option<String>,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub netmask: Option<String>,
    #[serde(default)]
    pub swversion: Option<String>,
}

/// Full datastore returned by `GET /api/{username}`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct FullState {
    #[serde(default)]
    pub config: BridgeConfig,
    #[serde(default)]
    pub lights: HashMap<String, LightRecord>,
    #[serde(default)]
    pub groups: HashMap<String, GroupRecord>,
}

/// A light as listed by the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightRecord {
    #[serde(default)]
    pub state: LightState,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub light_type: Option<String>,
    #[serde(default)]
    pub modelid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GroupRecord {
    #[serde(default)]
    pub lights: Vec<String>,
}

/// Result of `GET /lights/new`: lights found by the last search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewLights {
    /// `"active"`, `"none"` or the timestamp of the last finished scan.
    pub lastscan: Option<String>,
    /// Light id → name.
    pub lights: HashMap<u32, String>,
}

impl NewLights {
    /// Whether a search is still running on the bridge.
    pub fn is_scanning(&self) -> bool {
        self.lastscan.as_deref() == Some("active")
    }

    pub(crate) fn from_value(value: &serde_json::Value) -> Self {
        let mut out = Self::default();
        let Some(map) = value.as_object() else {
            return out;
        };
        for (key, entry) in map {
            if key == "lastscan" {
                out.lastscan = entry.as_str().map(String::from);
            } else if let Ok(id) = key.parse::<u32>() {
                let name = entry
                    .get("name")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or_default();
                out.lights.insert(id, name.to_owned());
            }
        }
        out
    }
}

/// Remote lookup service entry. Only the address is used; the `id` the
/// service also sends is ignored.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LookupEntry {
    pub internalipaddress: String,
}
