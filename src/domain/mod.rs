//! Domain layer - call sessions, routing, lifecycle

pub mod audio;
pub mod error;
pub mod registry;
pub mod routing;
pub mod session;

// Re-export commonly used types
pub use audio::{AudioEncoding, AudioFrame};
pub use error::{BridgeError, FramingError, Result};
pub use registry::{SessionRegistry, SessionSnapshot};
pub use routing::{resolve_caller, resolve_dialed_number, RoutingAttributes, RoutingContext};
pub use session::{CallDirection, CallSession, SessionEvent, SessionState};
