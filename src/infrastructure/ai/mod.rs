//! AI realtime-voice leg

pub mod client;
pub mod messages;

pub use client::{
    connect_ai_leg, AiAudioSink, AiConnector, AiEventSource, AiLegConfig, RealtimeConnector,
};
pub use messages::{AiSessionConfig, ClientEvent, ServerEvent};
