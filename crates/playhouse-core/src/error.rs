// ── Core error types ──
//
// Grid-level errors. Coordinate and registry failures originate here;
// bridge failures arrive as `playhouse_api::Error` and are translated by
// the `From` impl so callers match on one enum.

use playhouse_api::ApiErrorKind;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Grid errors ──────────────────────────────────────────────────
    #[error("({x}, {y}) is outside the grid")]
    OutsideGrid { x: usize, y: usize },

    #[error("No bridge {serial} registered for ({x}, {y})")]
    NoBridgeAtCoordinate { x: usize, y: usize, serial: String },

    // ── Registry errors ──────────────────────────────────────────────
    #[error("Bridge {serial} is already added")]
    BridgeAlreadyAdded { serial: String },

    #[error("Bridge {serial} is not registered")]
    UnknownBridge { serial: String },

    // ── Bridge errors (translated) ───────────────────────────────────
    #[error("No bridge found at {address}")]
    BridgeNotFound { address: String },

    #[error("Bridge at {address} has no valid username")]
    Unauthorized { address: String },

    #[error("Bridge rejected the request ({kind}) at {address}: {description}")]
    BridgeApi {
        kind: ApiErrorKind,
        address: String,
        description: String,
    },

    #[error("Bulb not reset: {reason}")]
    ResetNotCompleted { reason: String },

    #[error("Bridge unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("Bridge error: {message}")]
    Api { message: String, status: Option<u16> },
}

impl CoreError {
    /// Errors caused by the request itself rather than the bridge's health.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::OutsideGrid { .. } | Self::NoBridgeAtCoordinate { .. } | Self::BridgeApi { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<playhouse_api::Error> for CoreError {
    fn from(err: playhouse_api::Error) -> Self {
        match err {
            playhouse_api::Error::BridgeNotFound { address } => Self::BridgeNotFound { address },
            playhouse_api::Error::Unauthorized { address } => Self::Unauthorized { address },
            playhouse_api::Error::Api {
                kind,
                address,
                description,
            } => Self::BridgeApi {
                kind,
                address,
                description,
            },
            playhouse_api::Error::ResetNotCompleted { reason } => {
                Self::ResetNotCompleted { reason }
            }
            playhouse_api::Error::UnexpectedStatus { status, url } => Self::Api {
                message: format!("HTTP {status} from {url}"),
                status: Some(status),
            },
            playhouse_api::Error::Transport(ref e) if e.is_timeout() || e.is_connect() => {
                Self::Unreachable {
                    reason: e.to_string(),
                }
            }
            playhouse_api::Error::Io(e) => Self::Unreachable {
                reason: e.to_string(),
            },
            other => Self::Api {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_keeps_kind() {
        let err: CoreError = playhouse_api::Error::Api {
            kind: ApiErrorKind::DeviceOff,
            address: "/lights/1/state/bri".into(),
            description: "device is off".into(),
        }
        .into();
        assert!(matches!(
            err,
            CoreError::BridgeApi {
                kind: ApiErrorKind::DeviceOff,
                ..
            }
        ));
        assert!(err.is_client_error());
    }

    #[test]
    fn unauthorized_translates() {
        let err: CoreError = playhouse_api::Error::Unauthorized {
            address: "10.0.0.2".into(),
        }
        .into();
        assert_eq!(err.to_string(), "Bridge at 10.0.0.2 has no valid username");
    }
}
