// Bridge construction and request plumbing
//
// Identity verification, URL building and the response check that turns
// bridge error items into typed errors. Endpoint methods in the sibling
// files only ever go through `get` and `write`.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, trace};
use url::{Host, Url};

use super::models::{BridgeConfig, ResponseItem};
use super::{Bridge, BridgeInfo, BridgeOptions};
use crate::description::DeviceDescription;
use crate::error::{ApiErrorKind, Error};

/// `name` reported by `/api/none/config` on every genuine bridge.
const BRIDGE_NAME: &str = "Philips hue";

impl Bridge {
    /// Verify that `address` hosts a bridge and build a client for it.
    ///
    /// Identity is checked without credentials: the unauthenticated config
    /// must name itself a bridge and the device description must carry the
    /// bridge model description. Anything else is
    /// [`Error::BridgeNotFound`]. On success a metadata refresh runs; an
    /// unauthorized refresh is fine, other failures abort construction.
    pub async fn connect(
        address: &str,
        credential: Option<SecretString>,
        options: BridgeOptions,
    ) -> Result<Self, Error> {
        let not_found = || Error::BridgeNotFound {
            address: address.to_owned(),
        };
        let base_url = Url::parse(&format!("http://{address}/")).map_err(|_| not_found())?;
        let http = options.transport.build_client()?;

        let serial = match verify_identity(&http, &base_url).await {
            Ok(Some(serial)) => serial,
            Ok(None) => {
                debug!(address, "identity check failed: not a bridge");
                return Err(not_found());
            }
            Err(e) => {
                debug!(address, error = %e, "identity check failed");
                return Err(not_found());
            }
        };

        let bridge = Self {
            http,
            base_url,
            address: address.to_owned(),
            serial,
            touchlink: options.touchlink,
            credential: RwLock::new(credential),
            defaults: RwLock::new(options.defaults),
            info: RwLock::new(BridgeInfo::default()),
            lights: Mutex::new(HashMap::new()),
            groups: RwLock::new(HashMap::new()),
        };

        match bridge.refresh().await {
            Ok(()) => {}
            Err(e) if e.is_unauthorized() => {
                debug!(serial = %bridge.serial, "bridge verified without a valid username");
            }
            Err(e) => return Err(e),
        }

        info!(
            serial = %bridge.serial,
            address = %bridge.address,
            authorized = bridge.is_authorized(),
            "bridge connected"
        );
        Ok(bridge)
    }

    /// Cheap unauthenticated liveness check, bounded by `timeout`.
    ///
    /// The answer must still be a bridge config naming itself a bridge;
    /// anything else counts as a failure.
    pub async fn probe(&self, timeout: Duration) -> Result<(), Error> {
        let url = self.base_url.join("api/none/config")?;
        trace!(serial = %self.serial, "probe");
        let resp = self.http.get(url).timeout(timeout).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                url: "/api/none/config".into(),
            });
        }
        let body = resp.text().await?;
        let config: BridgeConfig = decode(&body)?;
        if config.name.as_deref() != Some(BRIDGE_NAME) {
            return Err(Error::Deserialization {
                message: format!("probe answered as {:?}, not a bridge", config.name),
                body: String::new(),
            });
        }
        Ok(())
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `http://{address}/api/{username}/{resource}`.
    ///
    /// Fails fast with [`Error::Unauthorized`] when no username is set.
    fn user_url(&self, resource: &str) -> Result<Url, Error> {
        let guard = self.credential.read().expect("credential lock poisoned");
        let Some(user) = guard.as_ref() else {
            return Err(Error::Unauthorized {
                address: self.address.clone(),
            });
        };
        let path = if resource.is_empty() {
            format!("api/{}", user.expose_secret())
        } else {
            format!("api/{}/{resource}", user.expose_secret())
        };
        Ok(self.base_url.join(&path)?)
    }

    fn root_url(&self) -> Result<Url, Error> {
        Ok(self.base_url.join("api")?)
    }

    pub(crate) fn host(&self) -> String {
        socket_host(&self.base_url).unwrap_or_else(|| self.address.clone())
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// GET a user-scoped resource.
    pub(crate) async fn get<T: DeserializeOwned>(&self, resource: &str) -> Result<T, Error> {
        let url = self.user_url(resource)?;
        debug!(serial = %self.serial, resource, "GET");
        let resp = self.http.get(url).send().await?;
        self.parse_response(resp, resource).await
    }

    /// PUT/POST a JSON body to a user-scoped resource.
    pub(crate) async fn write<T: DeserializeOwned>(
        &self,
        method: Method,
        resource: &str,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        let url = self.user_url(resource)?;
        debug!(serial = %self.serial, %method, resource, "write");
        let resp = self.http.request(method, url).json(body).send().await?;
        self.parse_response(resp, resource).await
    }

    /// POST to the unauthenticated `/api` root (user creation).
    pub(crate) async fn post_root<T: DeserializeOwned>(
        &self,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        let url = self.root_url()?;
        debug!(serial = %self.serial, "POST /api");
        let resp = self.http.post(url).json(body).send().await?;
        self.parse_response(resp, "").await
    }

    /// Check status, decode JSON and surface the first bridge error item.
    async fn parse_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
        resource: &str,
    ) -> Result<T, Error> {
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                url: format!("/{resource}"),
            });
        }

        let body = resp.text().await?;
        let value: serde_json::Value = decode(&body)?;

        if let Some(err) = self.first_error(&value) {
            return Err(err);
        }

        serde_json::from_value(value).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    /// Bridges report failures as a list of `{"error": {...}}` items, even with HTTP 200.
    fn first_error(&self, value: &serde_json::Value) -> Option<Error> {
        let items = value.as_array()?;
        items.iter().find_map(|item| {
            let item: ResponseItem = serde_json::from_value(item.clone()).ok()?;
            let err = item.error?;
            Some(if err.kind == 1 {
                Error::Unauthorized {
                    address: self.address.clone(),
                }
            } else {
                Error::Api {
                    kind: ApiErrorKind::from_code(err.kind),
                    address: err.address,
                    description: err.description,
                }
            })
        })
    }
}

/// Returns the bridge serial, `None` if the device answered but is not a bridge.
async fn verify_identity(http: &reqwest::Client, base_url: &Url) -> Result<Option<String>, Error> {
    let resp = http.get(base_url.join("api/none/config")?).send().await?;
    if !resp.status().is_success() {
        return Ok(None);
    }
    let body = resp.text().await?;
    let Ok(config) = serde_json::from_str::<BridgeConfig>(&body) else {
        return Ok(None);
    };
    if config.name.as_deref() != Some(BRIDGE_NAME) {
        return Ok(None);
    }

    let resp = http.get(base_url.join("description.xml")?).send().await?;
    if resp.status() != reqwest::StatusCode::OK {
        return Ok(None);
    }
    let xml = resp.text().await?;
    Ok(DeviceDescription::parse(&xml)
        .bridge_serial()
        .map(str::to_owned))
}

/// Host part of `url` in a form `TcpStream::connect` accepts: IPv6
/// addresses lose their brackets.
fn socket_host(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Ipv6(ip) => Some(ip.to_string()),
        Host::Ipv4(ip) => Some(ip.to_string()),
        Host::Domain(domain) => Some(domain.to_owned()),
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body: body.to_owned(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_of(address: &str) -> Option<String> {
        socket_host(&Url::parse(&format!("http://{address}/")).expect("valid url"))
    }

    #[test]
    fn socket_host_strips_ipv6_brackets() {
        assert_eq!(host_of("[::1]:8080").as_deref(), Some("::1"));
        assert_eq!(host_of("[fe80::1]").as_deref(), Some("fe80::1"));
    }

    #[test]
    fn socket_host_keeps_ipv4_and_names() {
        assert_eq!(host_of("192.168.1.20").as_deref(), Some("192.168.1.20"));
        assert_eq!(host_of("bridge.local:80").as_deref(), Some("bridge.local"));
    }
}
