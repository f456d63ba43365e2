//! Bridge errors

use thiserror::Error;

/// Bridge result type
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors raised by the telephony transport framer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    #[error("Stream ended mid-frame: expected {expected} payload bytes, got {got}")]
    Truncated { expected: usize, got: usize },

    #[error("Declared payload length {0} exceeds maximum")]
    PayloadTooLarge(usize),

    #[error("Unknown frame type: 0x{0:02x}")]
    UnknownType(u8),

    #[error("Payload of {got} bytes exceeds the {max}-byte frame bound")]
    PayloadUnencodable { got: usize, max: usize },
}

/// Errors local to a single call session
///
/// Every variant here is session-scoped: handling any of them tears down
/// one session's legs and registry entry, never the process.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("No routing strategy produced a dialed number")]
    RoutingUnresolved,

    #[error("Transcode error: {0}")]
    Transcode(String),

    #[error("Upstream disconnected: {0}")]
    UpstreamDisconnect(String),

    #[error("Session setup window elapsed without routing signal")]
    SetupTimeout,

    #[error("No audio in either direction within the idle window")]
    IdleTimeout,

    #[error("Invalid state transition: {from} + {event}")]
    InvalidTransition { from: String, event: String },

    #[error("Directory lookup failed: {0}")]
    Directory(String),

    #[error("AI leg error: {0}")]
    AiLeg(String),

    #[error("Session already registered: {0}")]
    DuplicateSession(String),

    #[error("No such session: {0}")]
    SessionNotFound(String),
}
