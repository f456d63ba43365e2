//! Telephony transport protocol

pub mod frame;

pub use frame::{read_frame, write_frame, Frame, FrameType, MAX_PAYLOAD};
