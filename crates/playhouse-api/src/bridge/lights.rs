// Light and group endpoints
//
// Commands are prepared against the default overlay, reduced against the
// cache and only then sent. The cache is updated after the bridge accepted
// the write, never before.

use std::collections::HashMap;

use reqwest::Method;
use tracing::{debug, trace};

use super::Bridge;
use super::models::{LightRecord, NewLights};
use crate::error::Error;
use crate::state::LightState;
use crate::touchlink::{self, ResetBulb};

impl Bridge {
    /// Apply `changes` to one light.
    ///
    /// Persistent attributes equal to the cached value are dropped. If that
    /// leaves nothing the caller asked for, no request is sent.
    pub async fn set_state(&self, light: u32, changes: &LightState) -> Result<(), Error> {
        let prepared = LightState::prepare(&self.defaults(), changes);
        let cached = self.cached_light(light).unwrap_or_default();
        let command = prepared.reduce_against(&cached);

        if is_noop(&command, changes) {
            trace!(serial = %self.serial, light, "state unchanged, skipping");
            return Ok(());
        }

        let _: serde_json::Value = self
            .write(Method::PUT, &format!("lights/{light}/state"), &command)
            .await?;

        self.lights
            .lock()
            .expect("light cache lock poisoned")
            .entry(light)
            .or_default()
            .merge(&command.persistent());
        Ok(())
    }

    /// Apply `changes` to a group. Group 0 addresses every light.
    ///
    /// A persistent attribute is sent when any member's cached value
    /// differs; on success every member's cache takes the new values.
    pub async fn set_group(&self, group: u32, changes: &LightState) -> Result<(), Error> {
        let prepared = LightState::prepare(&self.defaults(), changes);
        let members = self.group_members(group);
        let command = {
            let cache = self.lights.lock().expect("light cache lock poisoned");
            let empty = LightState::default();
            let cached: Vec<&LightState> = members
                .iter()
                .map(|id| cache.get(id).unwrap_or(&empty))
                .collect();
            prepared.reduce_against_all(cached)
        };

        if is_noop(&command, changes) {
            trace!(serial = %self.serial, group, "group state unchanged, skipping");
            return Ok(());
        }

        let _: serde_json::Value = self
            .write(Method::PUT, &format!("groups/{group}/action"), &command)
            .await?;

        let persistent = command.persistent();
        let mut cache = self.lights.lock().expect("light cache lock poisoned");
        for id in members {
            cache.entry(id).or_default().merge(&persistent);
        }
        Ok(())
    }

    /// All lights known to the bridge, keyed by id.
    pub async fn get_lights(&self) -> Result<HashMap<u32, LightRecord>, Error> {
        let raw: HashMap<String, LightRecord> = self.get("lights").await?;
        Ok(raw
            .into_iter()
            .filter_map(|(k, v)| k.parse().ok().map(|id| (id, v)))
            .collect())
    }

    /// Lights found by the most recent search.
    pub async fn get_new_lights(&self) -> Result<NewLights, Error> {
        let raw: serde_json::Value = self.get("lights/new").await?;
        Ok(NewLights::from_value(&raw))
    }

    /// Start a search for new lights. Results appear in [`get_new_lights`](Self::get_new_lights).
    pub async fn search_lights(&self) -> Result<(), Error> {
        let _: serde_json::Value = self
            .write(Method::POST, "lights", &serde_json::json!({}))
            .await?;
        debug!(serial = %self.serial, "light search started");
        Ok(())
    }

    /// Touchlink-reset whichever bulb is physically closest to this bridge.
    pub async fn reset_nearby_bulb(&self) -> Result<ResetBulb, Error> {
        touchlink::reset_nearby_bulb(&self.host(), &self.touchlink).await
    }
}

// Default-only transient attributes (the overlay's transitiontime) never
// justify a request on their own.
fn is_noop(command: &LightState, explicit: &LightState) -> bool {
    command.persistent().is_empty() && explicit.transient().is_empty()
}
