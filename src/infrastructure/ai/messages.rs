//! AI realtime API wire envelopes
//!
//! JSON messages over the persistent WebSocket to the realtime-voice
//! API. The schema belongs to the external API and is versioned; only
//! the events the bridge actually produces or consumes are modeled
//! here, everything else deserializes into `Ignored`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Session configuration sent after connect
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSessionConfig {
    /// Response modalities
    pub modalities: Vec<String>,
    /// System instructions (business context for this call)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Input audio format (PCM16 @ 16 kHz from the bridge)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,
    /// Output audio format (PCM16 @ 24 kHz from the model)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

impl AiSessionConfig {
    pub fn for_call(instructions: Option<String>, voice: Option<String>) -> Self {
        Self {
            modalities: vec!["text".to_string(), "audio".to_string()],
            instructions,
            input_audio_format: Some("pcm16".to_string()),
            output_audio_format: Some("pcm16".to_string()),
            voice,
        }
    }
}

/// Events the bridge sends to the AI API
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate { session: AiSessionConfig },

    /// Append caller audio to the input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioAppend {
        /// Base64-encoded PCM16LE @ 16 kHz
        audio: String,
    },
}

impl ClientEvent {
    /// Audio append event from raw PCM bytes
    pub fn audio_append(pcm: &[u8]) -> Self {
        ClientEvent::InputAudioAppend {
            audio: BASE64.encode(pcm),
        }
    }
}

/// Events the bridge consumes from the AI API
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Model audio chunk
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        /// Base64-encoded PCM16LE @ 24 kHz
        delta: String,
    },

    /// Model finished a response turn
    #[serde(rename = "response.done")]
    ResponseDone,

    #[serde(rename = "error")]
    Error { error: ApiError },

    /// Anything else the API emits is irrelevant to audio bridging
    #[serde(other)]
    Ignored,
}

impl ServerEvent {
    /// Decode the audio payload of an `AudioDelta`
    pub fn decode_audio(&self) -> Option<Vec<u8>> {
        match self {
            ServerEvent::AudioDelta { delta } => BASE64.decode(delta).ok(),
            _ => None,
        }
    }
}

/// Decode a base64 audio field from any envelope
pub fn decode_audio_b64(data: &str) -> Option<Vec<u8>> {
    BASE64.decode(data).ok()
}

/// Error details from the AI API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}
