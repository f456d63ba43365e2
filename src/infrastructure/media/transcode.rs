//! Sample-rate transcoding between the trunk and the AI leg
//!
//! Uplink: 8-bit µ-law @ 8 kHz -> 16-bit LE PCM @ 16 kHz (2x linear
//! interpolation). Downlink: 16-bit LE PCM @ 24 kHz -> µ-law @ 8 kHz
//! (decimate by 3). Pure transforms apart from the single-sample carry
//! that keeps interpolation continuous across consecutive frames of one
//! stream.

use super::mulaw;
use bytes::{BufMut, BytesMut};

/// Uplink transcoder state for one telephony stream
///
/// Carries the last emitted sample so the interpolated midpoint at a
/// frame boundary uses the real previous sample, not a reset value.
/// One instance per session; never shared across streams.
#[derive(Debug, Default)]
pub struct Upsampler {
    last: i16,
}

impl Upsampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// µ-law @ 8 kHz -> PCM16LE @ 16 kHz
    ///
    /// For every input sample, emits the midpoint with the previous
    /// sample followed by the sample itself: exactly 2N output samples
    /// (4N bytes) for N input bytes.
    pub fn telephony_to_ai(&mut self, mulaw_bytes: &[u8]) -> Vec<u8> {
        let mut out = BytesMut::with_capacity(mulaw_bytes.len() * 4);

        for &byte in mulaw_bytes {
            let sample = mulaw::decode_sample(byte);
            let midpoint = (((self.last as i32) + (sample as i32)) / 2) as i16;
            out.put_i16_le(midpoint);
            out.put_i16_le(sample);
            self.last = sample;
        }

        out.to_vec()
    }
}

/// PCM16LE @ 24 kHz -> µ-law @ 8 kHz
///
/// Keeps every 3rd sample and discards the other two; no anti-alias
/// filter (matches the trunk-observed behavior). A trailing group of
/// fewer than 3 samples is dropped, as is a trailing odd byte.
pub fn ai_to_telephony(pcm_bytes: &[u8]) -> Vec<u8> {
    let sample_count = pcm_bytes.len() / 2;
    let mut out = Vec::with_capacity(sample_count / 3);

    for group in 0..(sample_count / 3) {
        let offset = group * 6;
        let sample = i16::from_le_bytes([pcm_bytes[offset], pcm_bytes[offset + 1]]);
        out.push(mulaw::encode_sample(sample));
    }

    out
}
