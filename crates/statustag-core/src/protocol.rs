//! Binary wire framing between server and device.
//!
//! Every server message is one WebSocket binary frame: a little-endian u16
//! type tag followed by a kind-specific payload. Devices send exactly two
//! bytes, the little-endian sequence number of the patch they want next.
//!
//! | Tag | Message   | Payload                                               |
//! |-----|-----------|-------------------------------------------------------|
//! | 1   | NEW       | none; restart pulls at 0                              |
//! | 2   | RAW_BYTES | opaque container fragment                             |
//! | 3   | EOF       | none; no patch at the requested index                 |
//! | 4   | PIXELS    | `originX, originY, width, rows` then `width*rows` colors |
//! | 5   | DELAY     | one u16 frame duration in milliseconds                |
//!
//! DELAY precedes the PIXELS patches of the frame it times.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::patch::{Patch, PixelBand};

/// Patch list invalidated.
pub const TAG_NEW: u16 = 1;
/// Raw animated container fragment.
pub const TAG_RAW_BYTES: u16 = 2;
/// No patch at the requested index.
pub const TAG_EOF: u16 = 3;
/// Pixel band.
pub const TAG_PIXELS: u16 = 4;
/// Frame delay.
pub const TAG_DELAY: u16 = 5;

/// Size of the type tag.
pub const TAG_BYTES: usize = 2;
/// Size of the four PIXELS header fields.
pub const PIXELS_HEADER_BYTES: usize = 8;
/// Bytes a PIXELS frame spends before its first color.
pub const PIXELS_OVERHEAD_BYTES: usize = TAG_BYTES + PIXELS_HEADER_BYTES;
/// Size of one encoded color.
pub const COLOR_BYTES: usize = 2;
/// Size of a device pull request.
pub const PULL_REQUEST_BYTES: usize = 2;

/// Malformed server frame (device-side decoding).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer bytes than the tag or header requires.
    #[error("frame truncated: {len} bytes")]
    Truncated {
        /// Received length.
        len: usize,
    },
    /// Tag outside the known set.
    #[error("unknown frame tag {0}")]
    UnknownTag(u16),
    /// PIXELS body length disagrees with its header.
    #[error("pixel payload holds {actual} colors, header declares {expected}")]
    PixelCountMismatch {
        /// `width * rows` from the header.
        expected: usize,
        /// Colors actually present.
        actual: usize,
    },
    /// Control frame carried a payload.
    #[error("unexpected payload on tag {0}")]
    UnexpectedPayload(u16),
}

/// A server-to-device message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// Patch list invalidated.
    New,
    /// Requested index is past the end.
    Eof,
    /// One patch.
    Patch(Patch),
}

impl Frame {
    /// Encode to wire bytes.
    pub fn encode(&self) -> Bytes {
        match self {
            Self::New => control(TAG_NEW),
            Self::Eof => control(TAG_EOF),
            Self::Patch(patch) => encode_patch(patch),
        }
    }

    /// Decode wire bytes (the device's side of the protocol).
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < TAG_BYTES {
            return Err(ProtocolError::Truncated { len: buf.len() });
        }
        let tag = read_u16(buf, 0);
        let body = &buf[TAG_BYTES..];
        match tag {
            TAG_NEW | TAG_EOF => {
                if !body.is_empty() {
                    return Err(ProtocolError::UnexpectedPayload(tag));
                }
                Ok(if tag == TAG_NEW { Self::New } else { Self::Eof })
            }
            TAG_RAW_BYTES => Ok(Self::Patch(Patch::RawBytes(Bytes::copy_from_slice(body)))),
            TAG_DELAY => {
                if body.len() != 2 {
                    return Err(ProtocolError::Truncated { len: buf.len() });
                }
                Ok(Self::Patch(Patch::Delay {
                    duration_ms: read_u16(body, 0),
                }))
            }
            TAG_PIXELS => {
                if body.len() < PIXELS_HEADER_BYTES {
                    return Err(ProtocolError::Truncated { len: buf.len() });
                }
                let origin_x = read_u16(body, 0);
                let origin_y = read_u16(body, 2);
                let width = read_u16(body, 4);
                let rows = read_u16(body, 6);
                let payload = &body[PIXELS_HEADER_BYTES..];
                let expected = usize::from(width) * usize::from(rows);
                let actual = payload.len() / COLOR_BYTES;
                if payload.len() % COLOR_BYTES != 0 || actual != expected {
                    return Err(ProtocolError::PixelCountMismatch { expected, actual });
                }
                let colors = payload
                    .chunks_exact(COLOR_BYTES)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect();
                Ok(Self::Patch(Patch::Pixels(PixelBand {
                    origin_x,
                    origin_y,
                    width,
                    rows,
                    colors,
                })))
            }
            other => Err(ProtocolError::UnknownTag(other)),
        }
    }
}

/// Encode one patch with its type tag.
pub fn encode_patch(patch: &Patch) -> Bytes {
    let mut buf = BytesMut::with_capacity(framed_len(patch));
    match patch {
        Patch::Pixels(band) => {
            buf.put_u16_le(TAG_PIXELS);
            buf.put_u16_le(band.origin_x);
            buf.put_u16_le(band.origin_y);
            buf.put_u16_le(band.width);
            buf.put_u16_le(band.rows);
            for &color in &band.colors {
                buf.put_u16_le(color);
            }
        }
        Patch::Delay { duration_ms } => {
            buf.put_u16_le(TAG_DELAY);
            buf.put_u16_le(*duration_ms);
        }
        Patch::RawBytes(octets) => {
            buf.put_u16_le(TAG_RAW_BYTES);
            buf.put_slice(octets);
        }
    }
    buf.freeze()
}

/// Length of a patch once framed, without encoding it.
pub fn framed_len(patch: &Patch) -> usize {
    match patch {
        Patch::Pixels(band) => PIXELS_OVERHEAD_BYTES + band.colors.len() * COLOR_BYTES,
        Patch::Delay { .. } => TAG_BYTES + 2,
        Patch::RawBytes(octets) => TAG_BYTES + octets.len(),
    }
}

/// Parse a device pull request. Any length other than two bytes is not a pull.
pub fn parse_pull(buf: &[u8]) -> Option<u16> {
    (buf.len() == PULL_REQUEST_BYTES).then(|| read_u16(buf, 0))
}

/// Encode a pull request (the device's side of the protocol).
pub fn encode_pull(seq: u16) -> [u8; PULL_REQUEST_BYTES] {
    seq.to_le_bytes()
}

fn control(tag: u16) -> Bytes {
    Bytes::copy_from_slice(&tag.to_le_bytes())
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}
