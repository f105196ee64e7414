//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use playhouse_api::ApiErrorKind;
use playhouse_config::ConfigError;
use playhouse_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("No bridge found at {address}")]
    #[diagnostic(
        code(playhouse::bridge_not_found),
        help(
            "Check that the address points at a Hue bridge on this network.\n\
             Try: playhouse discover"
        )
    )]
    BridgeNotFound { address: String },

    #[error("Could not reach the bridge: {reason}")]
    #[diagnostic(
        code(playhouse::connection_failed),
        help("Check the network path to the bridge, or raise --timeout-ms.")
    )]
    ConnectionFailed { reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Bridge at {address} does not know our username")]
    #[diagnostic(
        code(playhouse::unauthorized),
        help("Pair with it first: playhouse pair {address}")
    )]
    Unauthorized { address: String },

    #[error("Link button on the bridge at {address} was not pressed")]
    #[diagnostic(
        code(playhouse::link_button),
        help("Press the round button on top of the bridge, then run the command again within 30 seconds.")
    )]
    LinkButtonNotPressed { address: String },

    // ── Bridge ───────────────────────────────────────────────────────
    #[error("Bridge rejected the request ({kind}) at {address}: {message}")]
    #[diagnostic(code(playhouse::bridge_api))]
    BridgeApi {
        kind: String,
        address: String,
        message: String,
    },

    #[error("Bulb reset did not complete: {reason}")]
    #[diagnostic(
        code(playhouse::reset_failed),
        help(
            "Place the bulb within a few centimeters of the bridge, power it on,\n\
             and make sure the bridge firmware exposes the Touchlink port."
        )
    )]
    ResetFailed { reason: String },

    #[error("{resource_type} '{identifier}' already exists")]
    #[diagnostic(code(playhouse::conflict))]
    Conflict {
        resource_type: String,
        identifier: String,
    },

    #[error("Grid error: {message}")]
    #[diagnostic(code(playhouse::grid))]
    Grid { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(playhouse::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(playhouse::config),
        help("Inspect the effective settings with: playhouse config show")
    )]
    Config(Box<figment::Error>),

    #[error("Could not write {path}: {reason}")]
    #[diagnostic(code(playhouse::setup_file))]
    SetupFile { path: String, reason: String },

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Unauthorized { .. } | Self::LinkButtonNotPressed { .. } => exit_code::AUTH,
            Self::BridgeNotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError ───────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Figment(err) => Self::Config(err),
            ConfigError::Io(err) => Self::Io(err),
            other => Self::SetupFile {
                path: "bridge setup".into(),
                reason: other.to_string(),
            },
        }
    }
}

// ── CoreError → CliError ─────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::BridgeNotFound { address } => Self::BridgeNotFound { address },
            CoreError::Unauthorized { address } => Self::Unauthorized { address },
            CoreError::BridgeApi {
                kind: ApiErrorKind::LinkButtonNotPressed,
                address,
                ..
            } => Self::LinkButtonNotPressed { address },
            CoreError::BridgeApi {
                kind,
                address,
                description,
            } => Self::BridgeApi {
                kind: kind.to_string(),
                address,
                message: description,
            },
            CoreError::ResetNotCompleted { reason } => Self::ResetFailed { reason },
            CoreError::Unreachable { reason } => Self::ConnectionFailed { reason },
            CoreError::Api { message, .. } => Self::ConnectionFailed { reason: message },
            CoreError::BridgeAlreadyAdded { serial } => Self::Conflict {
                resource_type: "bridge".into(),
                identifier: serial,
            },
            other @ (CoreError::OutsideGrid { .. }
            | CoreError::NoBridgeAtCoordinate { .. }
            | CoreError::UnknownBridge { .. }) => Self::Grid {
                message: other.to_string(),
            },
        }
    }
}

impl From<playhouse_api::Error> for CliError {
    fn from(err: playhouse_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_button_maps_to_auth_exit_code() {
        let err: CliError = CoreError::BridgeApi {
            kind: ApiErrorKind::LinkButtonNotPressed,
            address: "10.0.0.2".into(),
            description: "link button not pressed".into(),
        }
        .into();
        assert!(matches!(err, CliError::LinkButtonNotPressed { .. }));
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn not_found_and_unreachable_exit_codes() {
        let not_found: CliError = CoreError::BridgeNotFound {
            address: "10.0.0.2".into(),
        }
        .into();
        assert_eq!(not_found.exit_code(), exit_code::NOT_FOUND);

        let unreachable: CliError = CoreError::Unreachable {
            reason: "timed out".into(),
        }
        .into();
        assert_eq!(unreachable.exit_code(), exit_code::CONNECTION);
    }

    #[test]
    fn config_validation_is_a_usage_error() {
        let err: CliError = ConfigError::Validation {
            field: "discovery.lookup_url".into(),
            reason: "relative URL without a base".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
