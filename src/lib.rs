//! voxbridge - realtime telephony-to-AI voice bridge
//!
//! Accepts framed call audio from a telephony trunk, transcodes it, and
//! relays it bidirectionally to a cloud realtime-voice API, tracking
//! each call's lifecycle and routing it to the business that owns the
//! dialed number.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;

// Re-export commonly used types
pub use domain::error::{BridgeError, FramingError};
pub use domain::Result;
