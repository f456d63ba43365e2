//! G.711 µ-law companding
//!
//! The telephony trunk carries 8-bit µ-law samples at 8 kHz. Decoding
//! goes through a 256-entry lookup table built into the binary; encoding
//! uses the bias-33 exponent/mantissa quantizer (max magnitude 0x1FFF,
//! eight exponent bands).

/// µ-law decompression lookup table
///
/// Shared read-only across all sessions; standard G.711 constants.
pub const ULAW_DECODE_TABLE: [i16; 256] = [
    -32124, -31100, -30076, -29052, -28028, -27004, -25980, -24956,
    -23932, -22908, -21884, -20860, -19836, -18812, -17788, -16764,
    -15996, -15484, -14972, -14460, -13948, -13436, -12924, -12412,
    -11900, -11388, -10876, -10364, -9852, -9340, -8828, -8316,
    -7932, -7676, -7420, -7164, -6908, -6652, -6396, -6140,
    -5884, -5628, -5372, -5116, -4860, -4604, -4348, -4092,
    -3900, -3772, -3644, -3516, -3388, -3260, -3132, -3004,
    -2876, -2748, -2620, -2492, -2364, -2236, -2108, -1980,
    -1884, -1820, -1756, -1692, -1628, -1564, -1500, -1436,
    -1372, -1308, -1244, -1180, -1116, -1052, -988, -924,
    -876, -844, -812, -780, -748, -716, -684, -652,
    -620, -588, -556, -524, -492, -460, -428, -396,
    -372, -356, -340, -324, -308, -292, -276, -260,
    -244, -228, -212, -196, -180, -164, -148, -132,
    -120, -112, -104, -96, -88, -80, -72, -64,
    -56, -48, -40, -32, -24, -16, -8, 0,
    32124, 31100, 30076, 29052, 28028, 27004, 25980, 24956,
    23932, 22908, 21884, 20860, 19836, 18812, 17788, 16764,
    15996, 15484, 14972, 14460, 13948, 13436, 12924, 12412,
    11900, 11388, 10876, 10364, 9852, 9340, 8828, 8316,
    7932, 7676, 7420, 7164, 6908, 6652, 6396, 6140,
    5884, 5628, 5372, 5116, 4860, 4604, 4348, 4092,
    3900, 3772, 3644, 3516, 3388, 3260, 3132, 3004,
    2876, 2748, 2620, 2492, 2364, 2236, 2108, 1980,
    1884, 1820, 1756, 1692, 1628, 1564, 1500, 1436,
    1372, 1308, 1244, 1180, 1116, 1052, 988, 924,
    876, 844, 812, 780, 748, 716, 684, 652,
    620, 588, 556, 524, 492, 460, 428, 396,
    372, 356, 340, 324, 308, 292, 276, 260,
    244, 228, 212, 196, 180, 164, 148, 132,
    120, 112, 104, 96, 88, 80, 72, 64,
    56, 48, 40, 32, 24, 16, 8, 0,
];

const BIAS: u16 = 33;
const MAX_MAGNITUDE: u16 = 0x1FFF;

/// Decode one µ-law byte to a 16-bit linear sample
#[inline]
pub fn decode_sample(byte: u8) -> i16 {
    ULAW_DECODE_TABLE[byte as usize]
}

/// Encode one 16-bit linear sample to µ-law
#[inline]
pub fn encode_sample(sample: i16) -> u8 {
    let (sign, magnitude) = if sample < 0 {
        (0x80u8, sample.unsigned_abs())
    } else {
        (0x00u8, sample as u16)
    };

    let biased = (magnitude.saturating_add(BIAS)).min(MAX_MAGNITUDE);

    // Find the exponent band: highest set bit position between 12 and 5
    let mut mask = 0x1000u16;
    let mut position = 12u8;
    while (biased & mask) != mask && position > 5 {
        mask >>= 1;
        position -= 1;
    }

    let mantissa = ((biased >> (position - 4)) & 0x0F) as u8;
    !(sign | ((position - 5) << 4) | mantissa)
}

/// Decode a µ-law byte slice to linear samples
pub fn decode(mulaw: &[u8]) -> Vec<i16> {
    mulaw.iter().map(|&b| decode_sample(b)).collect()
}

/// Encode linear samples to µ-law bytes
pub fn encode(pcm: &[i16]) -> Vec<u8> {
    pcm.iter().map(|&s| encode_sample(s)).collect()
}
