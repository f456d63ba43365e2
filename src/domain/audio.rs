//! Audio frame value types

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Audio sample encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEncoding {
    /// 8-bit µ-law companded samples (telephony side)
    Mulaw,
    /// 16-bit little-endian signed linear PCM (AI side)
    Pcm16Le,
}

impl AudioEncoding {
    /// Bytes per sample for this encoding
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            AudioEncoding::Mulaw => 1,
            AudioEncoding::Pcm16Le => 2,
        }
    }
}

/// An immutable chunk of raw audio samples
///
/// Produced by either leg's receive path, consumed by the transcoder,
/// never mutated in place.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw sample bytes
    pub data: Bytes,
    /// Sample encoding
    pub encoding: AudioEncoding,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Channel count (always 1 for both legs)
    pub channels: u8,
    /// When the frame was received
    pub received_at: DateTime<Utc>,
}

impl AudioFrame {
    /// Telephony-side frame: µ-law at 8 kHz, mono
    pub fn mulaw_8k(data: Bytes) -> Self {
        Self {
            data,
            encoding: AudioEncoding::Mulaw,
            sample_rate: 8000,
            channels: 1,
            received_at: Utc::now(),
        }
    }

    /// AI-side frame: PCM16 at the given rate, mono
    pub fn pcm16(data: Bytes, sample_rate: u32) -> Self {
        Self {
            data,
            encoding: AudioEncoding::Pcm16Le,
            sample_rate,
            channels: 1,
            received_at: Utc::now(),
        }
    }

    /// Number of samples in this frame
    pub fn sample_count(&self) -> usize {
        self.data.len() / self.encoding.bytes_per_sample()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_count() {
        let mulaw = AudioFrame::mulaw_8k(Bytes::from(vec![0u8; 160]));
        assert_eq!(mulaw.sample_count(), 160);

        let pcm = AudioFrame::pcm16(Bytes::from(vec![0u8; 640]), 16000);
        assert_eq!(pcm.sample_count(), 320);
    }
}
