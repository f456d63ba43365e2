//! Audio transcoding between trunk and AI sample formats

pub mod mulaw;
pub mod transcode;

pub use transcode::{ai_to_telephony, Upsampler};
