// Credential lifecycle and metadata refresh
//
// `refresh` is the only place that flips `authorized`. It rebuilds the
// light cache and group table from the full datastore on every call.

use std::collections::HashMap;

use secrecy::SecretString;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::models::{FullState, ResponseItem};
use super::{Bridge, BridgeInfo};
use crate::error::Error;

#[derive(Serialize)]
struct CreateUserRequest<'a> {
    devicetype: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
}

impl Bridge {
    /// Re-read the full bridge state.
    ///
    /// On [`Error::Unauthorized`] the bridge is marked unauthorized and its
    /// metadata cleared; the configured credential stays in place.
    pub async fn refresh(&self) -> Result<(), Error> {
        let full: FullState = match self.get("").await {
            Ok(full) => full,
            Err(e) if e.is_unauthorized() => {
                self.mark_unauthorized();
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let lights: HashMap<u32, _> = full
            .lights
            .into_iter()
            .filter_map(|(k, v)| k.parse().ok().map(|id| (id, v.state.persistent())))
            .collect();
        let groups: HashMap<u32, Vec<u32>> = full
            .groups
            .into_iter()
            .filter_map(|(k, g)| {
                let id = k.parse().ok()?;
                let members = g.lights.iter().filter_map(|l| l.parse().ok()).collect();
                Some((id, members))
            })
            .collect();

        let light_count = lights.len();
        *self.lights.lock().expect("light cache lock poisoned") = lights;
        *self.groups.write().expect("group lock poisoned") = groups;

        let config = full.config;
        *self.info.write().expect("info lock poisoned") = BridgeInfo {
            authorized: true,
            name: config.name,
            mac: config.mac,
            ipaddress: config.ipaddress,
            gateway: config.gateway,
            netmask: config.netmask,
        };
        debug!(serial = %self.serial, lights = light_count, "bridge state refreshed");
        Ok(())
    }

    /// Install a new credential (or clear it) and refresh.
    pub async fn set_credential(&self, credential: Option<SecretString>) -> Result<(), Error> {
        let has_credential = credential.is_some();
        *self.credential.write().expect("credential lock poisoned") = credential;
        if !has_credential {
            self.mark_unauthorized();
            return Ok(());
        }
        self.refresh().await
    }

    /// Ask the bridge for a new username.
    ///
    /// The link button must have been pressed shortly before, otherwise the
    /// bridge answers with [`LinkButtonNotPressed`](crate::ApiErrorKind::LinkButtonNotPressed).
    /// On success the new username is installed and returned.
    pub async fn create_user(
        &self,
        devicetype: &str,
        username: Option<&str>,
    ) -> Result<SecretString, Error> {
        let items: Vec<ResponseItem> = self
            .post_root(&CreateUserRequest {
                devicetype,
                username,
            })
            .await?;

        let created = items
            .iter()
            .filter_map(|item| item.success.as_ref())
            .find_map(|s| s.get("username").and_then(serde_json::Value::as_str))
            .ok_or_else(|| Error::Deserialization {
                message: "user creation response carried no username".into(),
                body: String::new(),
            })?;

        let credential = SecretString::from(created.to_owned());
        info!(serial = %self.serial, "bridge user created");
        if let Err(e) = self.set_credential(Some(credential.clone())).await {
            warn!(serial = %self.serial, error = %e, "refresh after user creation failed");
            return Err(e);
        }
        Ok(credential)
    }

    fn mark_unauthorized(&self) {
        let mut info = self.info.write().expect("info lock poisoned");
        if info.authorized {
            warn!(serial = %self.serial, "bridge rejected its username");
        }
        *info = BridgeInfo::default();
    }
}
