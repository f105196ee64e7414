//! Shared configuration for playhouse.
//!
//! TOML settings layered with `PLAYHOUSE_` environment variables, the
//! translation into the runtime config types of `playhouse-core`, and the
//! `bridge_setup.json` document that remembers layout, addresses and
//! usernames between runs.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use playhouse_api::{TouchlinkConfig, TransportConfig};
use playhouse_core::{
    BridgeOptions, DiscoveryConfig, GridConfig, GridSnapshot, Layout, LightState, MonitorConfig,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const SETUP_FILE_NAME: &str = "bridge_setup.json";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("invalid bridge setup document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML settings ───────────────────────────────────────────────────

/// Top-level TOML settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Where `bridge_setup.json` lives. Defaults to the platform data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup_file: Option<PathBuf>,

    #[serde(default)]
    pub grid: GridSection,

    #[serde(default)]
    pub network: NetworkSection,

    #[serde(default)]
    pub monitor: MonitorSection,

    #[serde(default)]
    pub discovery: DiscoverySection,

    #[serde(default)]
    pub touchlink: TouchlinkSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GridSection {
    #[serde(default = "default_true")]
    pub buffered: bool,

    /// Default transition time (×100 ms) overlaid on every command.
    #[serde(default)]
    pub transitiontime: u16,
}

impl Default for GridSection {
    fn default() -> Self {
        Self {
            buffered: true,
            transitiontime: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetworkSection {
    #[serde(default = "default_request_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MonitorSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_monitor_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default = "default_max_strikes")]
    pub max_strikes: u32,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_monitor_interval_secs(),
            probe_timeout_ms: default_request_timeout_ms(),
            max_strikes: default_max_strikes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DiscoverySection {
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default = "default_request_timeout_ms")]
    pub idle_window_ms: u64,

    /// Remote lookup service; an empty string disables it.
    #[serde(default = "default_lookup_url")]
    pub lookup_url: String,

    #[serde(default = "default_lookup_timeout_secs")]
    pub lookup_timeout_secs: u64,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            idle_window_ms: default_request_timeout_ms(),
            lookup_url: default_lookup_url(),
            lookup_timeout_secs: default_lookup_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TouchlinkSection {
    #[serde(default = "default_touchlink_port")]
    pub port: u16,

    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,

    #[serde(default = "default_result_timeout_secs")]
    pub result_timeout_secs: u64,
}

impl Default for TouchlinkSection {
    fn default() -> Self {
        Self {
            port: default_touchlink_port(),
            step_timeout_secs: default_step_timeout_secs(),
            result_timeout_secs: default_result_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_request_timeout_ms() -> u64 {
    2000
}
fn default_monitor_interval_secs() -> u64 {
    10
}
fn default_max_strikes() -> u32 {
    3
}
fn default_attempts() -> u32 {
    2
}
fn default_lookup_url() -> String {
    playhouse_api::discovery::DEFAULT_LOOKUP_URL.into()
}
fn default_lookup_timeout_secs() -> u64 {
    5
}
fn default_touchlink_port() -> u16 {
    30000
}
fn default_step_timeout_secs() -> u64 {
    5
}
fn default_result_timeout_secs() -> u64 {
    30
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "playhouse", "playhouse")
}

/// Resolve the settings file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || PathBuf::from("playhouse.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn default_setup_path() -> PathBuf {
    project_dirs().map_or_else(
        || PathBuf::from(SETUP_FILE_NAME),
        |dirs| dirs.data_dir().join(SETUP_FILE_NAME),
    )
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load settings from the canonical file plus environment.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(&config_path())
}

/// Defaults, then the TOML file at `path` (if present), then `PLAYHOUSE_*`.
///
/// Nested keys use a double underscore: `PLAYHOUSE_MONITOR__INTERVAL_SECS=5`.
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PLAYHOUSE_").split("__"));

    let settings: Settings = figment.extract()?;
    debug!(path = %path.display(), "settings loaded");
    Ok(settings)
}

// ── Translation to runtime config ───────────────────────────────────

impl Settings {
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn setup_path(&self) -> PathBuf {
        self.setup_file.clone().unwrap_or_else(default_setup_path)
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            timeout: Duration::from_millis(self.network.timeout_ms),
            connect_timeout: Duration::from_millis(self.network.connect_timeout_ms),
        }
    }

    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            transport: self.transport(),
            defaults: LightState {
                transitiontime: Some(self.grid.transitiontime),
                ..LightState::default()
            },
            touchlink: TouchlinkConfig {
                port: self.touchlink.port,
                step_timeout: Duration::from_secs(self.touchlink.step_timeout_secs),
                result_timeout: Duration::from_secs(self.touchlink.result_timeout_secs),
            },
        }
    }

    pub fn grid_config(&self) -> GridConfig {
        GridConfig {
            buffered: self.grid.buffered,
            bridge: self.bridge_options(),
        }
    }

    pub fn monitor_config(&self) -> Result<MonitorConfig, ConfigError> {
        let monitor = &self.monitor;
        for (field, value) in [
            ("monitor.interval_secs", monitor.interval_secs),
            ("monitor.probe_timeout_ms", monitor.probe_timeout_ms),
            ("monitor.max_strikes", u64::from(monitor.max_strikes)),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation {
                    field: field.into(),
                    reason: "must be greater than zero".into(),
                });
            }
        }
        Ok(MonitorConfig {
            interval: Duration::from_secs(monitor.interval_secs),
            probe_timeout: Duration::from_millis(monitor.probe_timeout_ms),
            max_strikes: monitor.max_strikes,
        })
    }

    pub fn discovery_config(&self) -> Result<DiscoveryConfig, ConfigError> {
        let lookup_url = if self.discovery.lookup_url.trim().is_empty() {
            None
        } else {
            Some(
                self.discovery
                    .lookup_url
                    .parse()
                    .map_err(|e: url::ParseError| ConfigError::Validation {
                        field: "discovery.lookup_url".into(),
                        reason: e.to_string(),
                    })?,
            )
        };
        Ok(DiscoveryConfig {
            attempts: self.discovery.attempts,
            idle_window: Duration::from_millis(self.discovery.idle_window_ms),
            lookup_url,
            lookup_timeout: Duration::from_secs(self.discovery.lookup_timeout_secs),
            bridge: self.bridge_options(),
            ..DiscoveryConfig::default()
        })
    }
}

// ── Bridge setup document ───────────────────────────────────────────

/// Contents of `bridge_setup.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BridgeSetup {
    #[serde(default)]
    pub grid: Layout,

    /// Serial → username. Stored in plain text, like the bridges do.
    #[serde(default)]
    pub usernames: BTreeMap<String, String>,

    #[serde(default)]
    pub ips: Vec<String>,
}

impl BridgeSetup {
    /// Read the document, falling back to an empty setup on any problem.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(setup) => setup,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "bridge setup not usable, starting empty");
                Self::default()
            }
        }
    }

    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "bridge setup saved");
        Ok(())
    }

    /// Usernames as a credential registry.
    pub fn credentials(&self) -> HashMap<String, SecretString> {
        self.usernames
            .iter()
            .map(|(serial, user)| (serial.clone(), SecretString::from(user.clone())))
            .collect()
    }

    /// Fold a grid snapshot in: the layout is replaced, addresses are
    /// unioned and usernames are added without dropping old ones.
    pub fn merge_snapshot(&mut self, snapshot: &GridSnapshot) {
        self.grid.clone_from(&snapshot.grid);

        let ips: BTreeSet<String> = self
            .ips
            .drain(..)
            .chain(snapshot.ips.iter().cloned())
            .collect();
        self.ips = ips.into_iter().collect();

        for (serial, user) in &snapshot.usernames {
            self.usernames
                .insert(serial.clone(), user.expose_secret().to_owned());
        }
    }
}

/// Merge `snapshot` into the document at `path` and write it back.
///
/// Returns the merged document so the caller can refresh its credential
/// registry from it.
pub fn persist_snapshot(path: &Path, snapshot: &GridSnapshot) -> Result<BridgeSetup, ConfigError> {
    let mut setup = BridgeSetup::load(path);
    setup.merge_snapshot(snapshot);
    setup.save(path)?;
    Ok(setup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use playhouse_core::Cell;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_runtime_defaults() {
        let settings = Settings::default();
        assert!(settings.grid.buffered);
        let monitor = settings.monitor_config().expect("valid defaults");
        assert_eq!(monitor.interval, Duration::from_secs(10));
        assert_eq!(monitor.max_strikes, 3);
        assert_eq!(settings.bridge_options().touchlink.port, 30000);
        assert_eq!(
            settings.bridge_options().defaults.transitiontime,
            Some(0)
        );
        let discovery = settings.discovery_config().expect("valid defaults");
        assert_eq!(discovery.attempts, 2);
        assert!(discovery.lookup_url.is_some());
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[grid]\nbuffered = false\n\n[monitor]\ninterval_secs = 30\n\n[discovery]\nlookup_url = \"\"\n",
        )
        .expect("write");

        let settings = load_settings_from(&path).expect("load");

        assert!(!settings.grid.buffered);
        assert_eq!(settings.monitor.interval_secs, 30);
        assert_eq!(settings.monitor.max_strikes, 3);
        assert!(settings.discovery_config().expect("valid").lookup_url.is_none());
    }

    #[test]
    fn invalid_lookup_url_is_a_validation_error() {
        let mut settings = Settings::default();
        settings.discovery.lookup_url = "not a url".into();
        assert!(matches!(
            settings.discovery_config(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn zero_monitor_values_are_rejected() {
        let tweaks: [fn(&mut Settings); 3] = [
            |s| s.monitor.interval_secs = 0,
            |s| s.monitor.probe_timeout_ms = 0,
            |s| s.monitor.max_strikes = 0,
        ];
        for tweak in tweaks {
            let mut settings = Settings::default();
            tweak(&mut settings);
            assert!(matches!(
                settings.monitor_config(),
                Err(ConfigError::Validation { .. })
            ));
        }
    }

    #[test]
    fn settings_render_as_toml() {
        let rendered = Settings::default().to_toml().expect("toml");
        assert!(rendered.contains("[monitor]"));
        assert!(rendered.contains("interval_secs = 10"));
    }

    #[test]
    fn missing_or_invalid_setup_falls_back_to_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.json");
        assert_eq!(BridgeSetup::load(&missing), BridgeSetup::default());

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{not json").expect("write");
        assert_eq!(BridgeSetup::load(&broken), BridgeSetup::default());
    }

    #[test]
    fn setup_document_uses_pair_cells() {
        let setup: BridgeSetup = serde_json::from_str(
            r#"{"grid": [[["001788aa", 1], null]], "usernames": {"001788aa": "alice"}, "ips": ["10.0.0.2"]}"#,
        )
        .expect("parse");
        assert_eq!(setup.grid, vec![vec![Some(Cell::new("001788aa", 1)), None]]);
        assert_eq!(
            setup.credentials()["001788aa"].expose_secret(),
            "alice"
        );
    }

    #[test]
    fn persist_keeps_old_usernames_and_unions_ips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(SETUP_FILE_NAME);
        BridgeSetup {
            grid: Vec::new(),
            usernames: BTreeMap::from([("old".to_owned(), "olduser".to_owned())]),
            ips: vec!["10.0.0.9".into(), "10.0.0.2".into()],
        }
        .save(&path)
        .expect("save");

        let snapshot = GridSnapshot {
            grid: vec![vec![Some(Cell::new("new", 4))]],
            ips: vec!["10.0.0.2".into(), "10.0.0.3".into()],
            usernames: HashMap::from([(
                "new".to_owned(),
                SecretString::from("newuser".to_owned()),
            )]),
        };
        let merged = persist_snapshot(&path, &snapshot).expect("persist");

        assert_eq!(merged.ips, vec!["10.0.0.2", "10.0.0.3", "10.0.0.9"]);
        assert_eq!(merged.usernames.len(), 2);
        assert_eq!(merged.usernames["new"], "newuser");
        assert_eq!(merged.grid, snapshot.grid);
        assert_eq!(BridgeSetup::try_load(&path).expect("reload"), merged);
    }
}
