//! Application layer - per-session orchestration

pub mod bridge;
pub mod runner;

pub use bridge::{run_bridge, BridgeEnd};
pub use runner::{IdentifierOnlySource, MetadataSource, SessionRunner, SessionTimeouts};
