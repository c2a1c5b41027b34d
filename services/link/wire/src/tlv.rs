//! Type-length-value messages carried inside frame DATA.
//!
//! Layout: `id(1) | len(1) | value(len)`. The value must leave room for the
//! two header bytes within one frame, so it caps at [`MAX_VALUE`] bytes.
//! Decoding tolerates trailing bytes past the declared value, which lets a
//! TLV ride in a padded frame.

use crate::frame::MAX_PAYLOAD;
use bytes::{BufMut, Bytes, BytesMut};

/// Header bytes in front of the value
pub const TLV_OVERHEAD: usize = 2;
/// Largest value one frame can carry
pub const MAX_VALUE: usize = MAX_PAYLOAD - TLV_OVERHEAD;

/// Version report message id
pub const TLV_VERSION: u8 = 0x00;
/// Error report message id
pub const TLV_ERROR: u8 = 0x01;

/// One TLV message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvMsg {
    /// Message id; unknown ids round-trip untouched
    pub id: u8,
    /// Raw value bytes
    pub value: Bytes,
}

impl TlvMsg {
    /// Create a message from an id and value bytes.
    pub fn new(id: u8, value: impl Into<Bytes>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }

    /// Encode into frame-ready DATA bytes.
    pub fn encode(&self) -> Result<Bytes, crate::WireError> {
        if self.value.len() > MAX_VALUE {
            return Err(crate::WireError::ValueSize(self.value.len()));
        }

        let mut buf = BytesMut::with_capacity(TLV_OVERHEAD + self.value.len());
        buf.put_u8(self.id);
        buf.put_u8(self.value.len() as u8);
        buf.put_slice(&self.value);
        Ok(buf.freeze())
    }

    /// Decode from a frame's DATA bytes.
    pub fn decode(data: &[u8]) -> Result<Self, crate::WireError> {
        if data.len() < TLV_OVERHEAD {
            return Err(crate::WireError::Truncated);
        }

        let len = data[1] as usize;
        if len > MAX_VALUE {
            return Err(crate::WireError::ValueSize(len));
        }
        if data.len() < TLV_OVERHEAD + len {
            return Err(crate::WireError::ValueOverrun);
        }

        Ok(Self {
            id: data[0],
            value: Bytes::copy_from_slice(&data[TLV_OVERHEAD..TLV_OVERHEAD + len]),
        })
    }
}

/// Read a little-endian u16 from the front of a value.
///
/// TLV values use little-endian integers, unlike the big-endian frame and
/// segment headers. Writers use [`BytesMut::put_u16_le`] directly.
pub fn get_u16_le(value: &[u8]) -> Option<u16> {
    if value.len() < 2 {
        return None;
    }
    Some(u16::from_le_bytes([value[0], value[1]]))
}
