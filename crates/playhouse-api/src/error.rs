use std::fmt;

use thiserror::Error;

/// Top-level error type for the `playhouse-api` crate.
///
/// Covers every failure mode of the wire-level clients: bridge identity,
/// credentials, the bridge's numeric error taxonomy, transport, the
/// Touchlink line protocol, and discovery sockets. `playhouse-core` maps
/// these into grid-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Identity ────────────────────────────────────────────────────
    /// Nothing at this address passed the bridge identity check.
    #[error("No bridge found at {address}")]
    BridgeNotFound { address: String },

    // ── Authentication ──────────────────────────────────────────────
    /// The bridge has no username configured, or rejected the one it has.
    #[error("Unauthorized: bridge at {address} has no valid username")]
    Unauthorized { address: String },

    // ── Bridge API ──────────────────────────────────────────────────
    /// Error item returned by the bridge (`[{"error": {type, address, description}}]`).
    #[error("Bridge API error ({kind}) at {address}: {description}")]
    Api {
        kind: ApiErrorKind,
        address: String,
        description: String,
    },

    /// Non-2xx HTTP status from the bridge.
    #[error("Unexpected HTTP {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    // ── Touchlink ───────────────────────────────────────────────────
    /// The Touchlink exchange did not complete with a success line.
    #[error("Bulb not reset: {reason}")]
    ResetNotCompleted { reason: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, timeout, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Socket error outside of reqwest (discovery, Touchlink).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the bridge refused the request for lack of a valid username.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// Returns `true` if the link button must be pressed before retrying.
    pub fn is_link_button_not_pressed(&self) -> bool {
        matches!(
            self,
            Self::Api {
                kind: ApiErrorKind::LinkButtonNotPressed,
                ..
            }
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Io(_) => true,
            _ => false,
        }
    }

    /// The bridge's numeric error category, if this came from an error item.
    pub fn api_error_code(&self) -> Option<u16> {
        match self {
            Self::Api { kind, .. } => Some(kind.code()),
            Self::Unauthorized { .. } => Some(1),
            _ => None,
        }
    }
}

// ── Bridge error taxonomy ───────────────────────────────────────────

/// Numeric error categories reported by the bridge.
///
/// Type 1 (unauthorized user) never appears here -- it is surfaced as
/// [`Error::Unauthorized`] so that fail-fast and remote rejections look alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    /// 2: body contains invalid JSON.
    InvalidJson,
    /// 3: resource not available.
    ResourceNotAvailable,
    /// 4: method not available for resource.
    MethodNotAvailable,
    /// 5: missing parameters in body.
    MissingParameter,
    /// 6: parameter not available.
    ParameterNotAvailable,
    /// 7: invalid value for parameter.
    InvalidValue,
    /// 8: parameter is not modifiable.
    ParameterReadOnly,
    /// 101: link button not pressed.
    LinkButtonNotPressed,
    /// 201: parameter not modifiable while the device is off.
    DeviceOff,
    /// 301: group could not be created, group table full.
    GroupCreationFailed,
    /// 901: internal error on the bridge.
    InternalError,
    /// Any category this client does not know about.
    Other(u16),
}

impl ApiErrorKind {
    /// Map a raw `type` field to its kind.
    pub fn from_code(code: u16) -> Self {
        match code {
            2 => Self::InvalidJson,
            3 => Self::ResourceNotAvailable,
            4 => Self::MethodNotAvailable,
            5 => Self::MissingParameter,
            6 => Self::ParameterNotAvailable,
            7 => Self::InvalidValue,
            8 => Self::ParameterReadOnly,
            101 => Self::LinkButtonNotPressed,
            201 => Self::DeviceOff,
            301 => Self::GroupCreationFailed,
            901 => Self::InternalError,
            other => Self::Other(other),
        }
    }

    /// The raw numeric category.
    pub fn code(self) -> u16 {
        match self {
            Self::InvalidJson => 2,
            Self::ResourceNotAvailable => 3,
            Self::MethodNotAvailable => 4,
            Self::MissingParameter => 5,
            Self::ParameterNotAvailable => 6,
            Self::InvalidValue => 7,
            Self::ParameterReadOnly => 8,
            Self::LinkButtonNotPressed => 101,
            Self::DeviceOff => 201,
            Self::GroupCreationFailed => 301,
            Self::InternalError => 901,
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvalidJson => "invalid JSON",
            Self::ResourceNotAvailable => "resource not available",
            Self::MethodNotAvailable => "method not available",
            Self::MissingParameter => "missing parameter",
            Self::ParameterNotAvailable => "parameter not available",
            Self::InvalidValue => "invalid value",
            Self::ParameterReadOnly => "parameter not modifiable",
            Self::LinkButtonNotPressed => "link button not pressed",
            Self::DeviceOff => "device is off",
            Self::GroupCreationFailed => "group could not be created",
            Self::InternalError => "internal error",
            Self::Other(code) => return write!(f, "type {code}"),
        };
        f.write_str(label)
    }
}
