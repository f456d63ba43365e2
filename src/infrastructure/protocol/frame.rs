//! Telephony transport framing
//!
//! The trunk speaks length-prefixed binary frames over a persistent
//! connection per call:
//!
//! ```text
//! [type: u8][length: u16 big-endian][payload: length bytes]
//! type 0x00 = hangup   (payload empty)
//! type 0x01 = identity (payload = session id)
//! type 0x10 = audio    (payload = 8-bit mu-law samples, 8kHz)
//! type 0xFF = error    (payload = UTF-8 diagnostic text)
//! ```

use crate::domain::error::FramingError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Frame header size: type byte plus length field
pub const HEADER_SIZE: usize = 3;

/// Sane upper bound on declared payload length
///
/// Real audio frames are 160 bytes (20ms at 8kHz); anything past 8 KiB
/// is a malformed or malicious stream.
pub const MAX_PAYLOAD: usize = 8 * 1024;

/// Frame type tags (protocol constants)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Terminates the session
    Hangup = 0x00,
    /// Opaque session identifier
    Identity = 0x01,
    /// Raw µ-law audio payload
    Audio = 0x10,
    /// UTF-8 diagnostic text
    Error = 0xFF,
}

impl FrameType {
    pub fn from_byte(byte: u8) -> Result<Self, FramingError> {
        match byte {
            0x00 => Ok(FrameType::Hangup),
            0x01 => Ok(FrameType::Identity),
            0x10 => Ok(FrameType::Audio),
            0xFF => Ok(FrameType::Error),
            other => Err(FramingError::UnknownType(other)),
        }
    }

    pub fn as_byte(&self) -> u8 {
        *self as u8
    }
}

/// A decoded unit of the telephony transport protocol
///
/// Invariant: `payload.len()` always matches the wire length field; a
/// mismatch on the wire is a protocol violation, not a recoverable frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub frame_type: FrameType,
    pub payload: Bytes,
}

impl Frame {
    /// Build a frame, enforcing the payload bound
    ///
    /// The bound matches the decoder's, so any frame this constructor
    /// accepts survives an encode/decode round trip.
    pub fn new(frame_type: FrameType, payload: Bytes) -> Result<Self, FramingError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(FramingError::PayloadUnencodable {
                got: payload.len(),
                max: MAX_PAYLOAD,
            });
        }
        Ok(Self {
            frame_type,
            payload,
        })
    }

    pub fn hangup() -> Self {
        Self {
            frame_type: FrameType::Hangup,
            payload: Bytes::new(),
        }
    }

    pub fn audio(payload: Bytes) -> Result<Self, FramingError> {
        Self::new(FrameType::Audio, payload)
    }

    pub fn identity(session_id: &str) -> Result<Self, FramingError> {
        Self::new(FrameType::Identity, Bytes::copy_from_slice(session_id.as_bytes()))
    }

    /// Encode to wire format: 3-byte header followed by the payload
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.payload.len());
        buf.put_u8(self.frame_type.as_byte());
        buf.put_u16(self.payload.len() as u16);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Incremental decode from a receive buffer
    ///
    /// Returns `Ok(None)` when the buffer holds less than a complete
    /// frame; consumed bytes are removed from the buffer only once a
    /// whole frame is available. Restartable per connection.
    pub fn parse(buf: &mut BytesMut) -> Result<Option<Frame>, FramingError> {
        if buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        let frame_type = FrameType::from_byte(buf[0])?;
        let length = u16::from_be_bytes([buf[1], buf[2]]) as usize;
        if length > MAX_PAYLOAD {
            return Err(FramingError::PayloadTooLarge(length));
        }

        if buf.len() < HEADER_SIZE + length {
            return Ok(None);
        }

        buf.advance(HEADER_SIZE);
        let payload = buf.split_to(length).freeze();
        Ok(Some(Frame {
            frame_type,
            payload,
        }))
    }
}

/// Read one frame from an async byte stream
///
/// Fails with `Truncated` when the stream ends mid-frame and with
/// `PayloadTooLarge` before allocating for an insane length field.
pub async fn read_frame<R>(reader: &mut R) -> Result<Frame, FramingError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_SIZE];
    read_exact_or_truncated(reader, &mut header).await?;

    let frame_type = FrameType::from_byte(header[0])?;
    let length = u16::from_be_bytes([header[1], header[2]]) as usize;
    if length > MAX_PAYLOAD {
        return Err(FramingError::PayloadTooLarge(length));
    }

    let mut payload = vec![0u8; length];
    read_exact_or_truncated(reader, &mut payload).await?;

    Ok(Frame {
        frame_type,
        payload: Bytes::from(payload),
    })
}

/// Write one frame to an async byte stream
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&frame.encode()).await?;
    writer.flush().await
}

async fn read_exact_or_truncated<R>(reader: &mut R, buf: &mut [u8]) -> Result<(), FramingError>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader
            .read(&mut buf[filled..])
            .await
            .map_err(|_| FramingError::Truncated {
                expected: buf.len(),
                got: filled,
            })?;
        if n == 0 {
            return Err(FramingError::Truncated {
                expected: buf.len(),
                got: filled,
            });
        }
        filled += n;
    }
    Ok(())
}
